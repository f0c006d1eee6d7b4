//! The instance: process-wide root that owns the system, every session and
//! the handle registry.
//!
//! Entrypoints are methods on [`Instance`]. Each takes `&self` or `&mut self`,
//! so one caller drives an instance at a time and the borrow checker stands in
//! for the session-list lock.

pub mod config;
pub mod system;

use crate::device::{DeviceRole, SimulatedCompositor, SystemCompositor, XrDevice};
use crate::error::XrResult;
use crate::extensions::ExtensionRegistry;
use crate::handle::{Handle, HandleRegistry, SessionHandle};
use crate::session::events::{Event, EventQueue};
use crate::session::{Session, SessionState};
use crate::time::{TimeKeeper, XrTime};
use crate::validate;
use config::RuntimeConfig;
use std::sync::Arc;
use system::{System, SystemId, SystemProperties};

const SYSTEM_ID: SystemId = SystemId(1);

pub struct InstanceBuilder {
    config: RuntimeConfig,
    devices: Vec<Arc<dyn XrDevice>>,
    compositor: Option<Arc<dyn SystemCompositor>>,
    clock: Option<TimeKeeper>,
}

impl InstanceBuilder {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            devices: Vec::new(),
            compositor: None,
            clock: None,
        }
    }

    /// Makes `device` available for the role table by name.
    pub fn device(mut self, device: Arc<dyn XrDevice>) -> Self {
        self.devices.push(device);
        self
    }

    /// Replaces the default simulated compositor. Ignored for headless
    /// configurations.
    pub fn compositor(mut self, compositor: Arc<dyn SystemCompositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    pub fn clock(mut self, clock: TimeKeeper) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> XrResult<Instance> {
        const CALL: &str = "xrCreateInstance";
        let extensions = ExtensionRegistry::from_names(self.config.extensions.as_slice())?;
        let compositor = self.compositor.unwrap_or_else(|| {
            Arc::new(SimulatedCompositor::new(self.config.refresh_rates_hz.clone()))
        });
        let system = System::from_config(SYSTEM_ID, &self.config, &self.devices, Some(compositor))
            .map_err(|err| err.in_call(CALL))?;

        log::info!(
            "[instance] '{}' created with {} extension(s), {} system{}",
            self.config.application_name,
            self.config.extensions.len(),
            system.id(),
            if system.is_headless() { " (headless)" } else { "" }
        );

        Ok(Instance {
            registry: HandleRegistry::with_limit(self.config.max_handles),
            config: self.config,
            extensions,
            system,
            clock: self.clock.unwrap_or_default(),
            sessions: Vec::new(),
            events: EventQueue::new(),
        })
    }
}

#[derive(Debug)]
pub struct Instance {
    pub(crate) config: RuntimeConfig,
    pub(crate) extensions: ExtensionRegistry,
    pub(crate) system: System,
    pub(crate) clock: TimeKeeper,
    pub(crate) registry: HandleRegistry,
    /// Live sessions in creation order.
    pub(crate) sessions: Vec<SessionHandle>,
    pub(crate) events: EventQueue,
}

impl Instance {
    pub fn builder(config: RuntimeConfig) -> InstanceBuilder {
        InstanceBuilder::new(config)
    }

    pub fn new(config: RuntimeConfig) -> XrResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn clock(&self) -> &TimeKeeper {
        &self.clock
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &[SessionHandle] {
        &self.sessions
    }

    pub fn get_system(&self) -> SystemId {
        self.system.id()
    }

    pub fn get_system_properties(&self, system: SystemId) -> XrResult<SystemProperties> {
        self.check_system("xrGetSystemProperties", system)?;
        Ok(self.system.properties())
    }

    /// Rebinds a device role. Trackers created earlier keep their device.
    pub fn bind_role(&mut self, role: DeviceRole, device: Arc<dyn XrDevice>) {
        self.system.roles_mut().bind(role, device);
    }

    pub fn unbind_role(&mut self, role: DeviceRole) {
        self.system.roles_mut().unbind(role);
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        if let Event::SessionStateChanged {
            session,
            state: SessionState::LossPending,
            ..
        } = event
        {
            if let Ok(lost) = self.registry.session_mut("xrPollEvent", session) {
                lost.finish_loss(session);
            }
        }
        Some(event)
    }

    pub fn set_debug_name(&mut self, handle: Handle, name: impl Into<String>) -> XrResult<()> {
        self.registry
            .set_debug_name("xrSetDebugUtilsObjectNameEXT", handle, name)
    }

    pub fn convert_time_to_monotonic_ns(&self, time: XrTime) -> XrResult<u64> {
        const CALL: &str = "xrConvertTimeToTimespecTimeKHR";
        validate::time(CALL, time)?;
        Ok(self.clock.ts_to_monotonic_ns(time))
    }

    pub fn convert_monotonic_ns_to_time(&self, monotonic_ns: u64) -> XrTime {
        self.clock.monotonic_to_ts(monotonic_ns)
    }

    /// Destroys every live session, oldest first, and with them all of their
    /// children. Returns how many handles were destroyed.
    pub fn destroy(&mut self) -> usize {
        let sessions = std::mem::take(&mut self.sessions);
        let mut destroyed = 0;
        for session in sessions {
            match self.registry.destroy("xrDestroyInstance", session.raw()) {
                Ok(count) => destroyed += count,
                Err(err) => log::warn!("[instance] {err}"),
            }
            self.events.discard_session(session);
        }
        if destroyed > 0 {
            log::info!("[instance] destroyed {destroyed} handle(s)");
        }
        destroyed
    }

    pub(crate) fn check_system(&self, call: &'static str, system: SystemId) -> XrResult<()> {
        if system != self.system.id() {
            return Err(validate::failure(call, format!("({system}) is not a valid system")));
        }
        Ok(())
    }

    /// A session that exists and has not been lost.
    pub(crate) fn live_session(&self, call: &'static str, session: SessionHandle) -> XrResult<&Session> {
        let found = self.registry.session(call, session)?;
        validate::session_not_lost(call, found)?;
        Ok(found)
    }

    pub(crate) fn now(&self) -> XrTime {
        self.clock.now()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Session lookup that keeps the rest of the instance borrowable.
pub(crate) fn live_session_mut<'a>(
    registry: &'a mut HandleRegistry,
    call: &'static str,
    session: SessionHandle,
) -> XrResult<&'a mut Session> {
    let found = registry.session_mut(call, session)?;
    validate::session_not_lost(call, found)?;
    Ok(found)
}
