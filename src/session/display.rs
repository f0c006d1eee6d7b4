//! Display refresh-rate negotiation and performance hints.

use crate::error::{XrError, XrResult};
use crate::handle::SessionHandle;
use crate::runtime::{live_session_mut, Instance};
use crate::session::events::Event;
use crate::two_call;
use crate::validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerfDomain {
    Cpu,
    Gpu,
}

impl PerfDomain {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(PerfDomain::Cpu),
            2 => Some(PerfDomain::Gpu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerfLevel {
    PowerSavings,
    SustainedLow,
    SustainedHigh,
    Boost,
}

impl PerfLevel {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PerfLevel::PowerSavings),
            25 => Some(PerfLevel::SustainedLow),
            50 => Some(PerfLevel::SustainedHigh),
            75 => Some(PerfLevel::Boost),
            _ => None,
        }
    }
}

/// Rates are compared at two decimal places; 59.999 and 60.00 are the same
/// rate, 59.94 is not.
pub fn same_refresh_rate(requested: f32, supported: f32) -> bool {
    centi_hz(requested) == centi_hz(supported)
}

fn centi_hz(hz: f32) -> i64 {
    (f64::from(hz) * 100.0).round() as i64
}

impl Instance {
    /// Two-call enumeration; headless systems report no rates.
    pub fn enumerate_display_refresh_rates(
        &self,
        session: SessionHandle,
        output: &mut [f32],
    ) -> XrResult<usize> {
        const CALL: &str = "xrEnumerateDisplayRefreshRatesFB";
        self.live_session(CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;
        let Some(compositor) = self.system.compositor() else {
            return Ok(0);
        };
        Ok(two_call::fill(&compositor.refresh_rates(), output))
    }

    /// Zero on headless systems.
    pub fn get_display_refresh_rate(&self, session: SessionHandle) -> XrResult<f32> {
        const CALL: &str = "xrGetDisplayRefreshRateFB";
        self.live_session(CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;
        let Some(compositor) = self.system.compositor() else {
            return Ok(0.0);
        };
        if compositor.refresh_rates().is_empty() {
            return Err(XrError::RuntimeFailure {
                call: CALL,
                reason: "compositor reports no refresh rates".into(),
            });
        }
        Ok(compositor.current_refresh_rate())
    }

    /// A request of exactly zero expresses no preference and never changes
    /// anything. Headless systems accept every request without effect.
    pub fn request_display_refresh_rate(
        &mut self,
        session: SessionHandle,
        hz: f32,
    ) -> XrResult<()> {
        const CALL: &str = "xrRequestDisplayRefreshRateFB";
        self.live_session(CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;
        if hz == 0.0 {
            return Ok(());
        }
        let Some(compositor) = self.system.compositor() else {
            log::debug!("[display] headless, ignoring {hz} Hz request");
            return Ok(());
        };
        if !hz.is_finite() || hz < 0.0 {
            return Err(validate::failure(
                CALL,
                format!("(displayRefreshRate == {hz}) is not a valid rate"),
            ));
        }

        let Some(matched) = compositor
            .refresh_rates()
            .into_iter()
            .find(|supported| same_refresh_rate(hz, *supported))
        else {
            log::warn!("[display] {hz} Hz is not a supported refresh rate");
            return Err(XrError::DisplayRefreshRateUnsupported {
                call: CALL,
                requested: hz,
            });
        };

        let from_hz = compositor.current_refresh_rate();
        compositor
            .request_refresh_rate(matched)
            .map_err(|err| err.into_xr(CALL))?;
        if !same_refresh_rate(from_hz, matched) {
            log::info!("[display] refresh rate {from_hz} Hz -> {matched} Hz");
            self.events.push(Event::DisplayRefreshRateChanged {
                session,
                from_hz,
                to_hz: matched,
            });
        }
        Ok(())
    }

    pub fn set_performance_level(
        &mut self,
        session: SessionHandle,
        domain: PerfDomain,
        level: PerfLevel,
    ) -> XrResult<()> {
        const CALL: &str = "xrPerfSettingsSetPerformanceLevelEXT";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;

        found.record_performance_level(domain, level);
        if let Some(compositor) = self.system.compositor() {
            compositor
                .set_performance_level(domain, level)
                .map_err(|err| err.into_xr(CALL))?;
        }
        log::debug!("[display] {domain:?} performance level {level:?}");
        Ok(())
    }

    /// Entry for callers holding wire values rather than typed enums.
    pub fn set_performance_level_raw(
        &mut self,
        session: SessionHandle,
        domain: u32,
        level: u32,
    ) -> XrResult<()> {
        const CALL: &str = "xrPerfSettingsSetPerformanceLevelEXT";
        self.live_session(CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;
        let domain = PerfDomain::from_raw(domain).ok_or_else(|| {
            validate::failure(CALL, format!("invalid domain {domain}, must be 1 (CPU) or 2 (GPU)"))
        })?;
        let level = PerfLevel::from_raw(level).ok_or_else(|| {
            validate::failure(
                CALL,
                format!("invalid level {level}, must be 0, 25, 50 or 75"),
            )
        })?;
        self.set_performance_level(session, domain, level)
    }
}
