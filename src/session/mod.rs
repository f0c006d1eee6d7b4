//! Session lifecycle: creation, begin/end, exit requests, loss and teardown.

pub mod display;
pub mod events;
pub mod frame;
pub mod views;

use crate::error::{XrError, XrResult};
use crate::extensions::Extension;
use crate::handle::{HandleObject, SessionHandle};
use crate::runtime::system::{SystemId, ViewConfigurationType};
use crate::runtime::{live_session_mut, Instance};
use crate::time::XrTime;
use crate::validate::{self, typed_struct, StructureType};
use display::{PerfDomain, PerfLevel};
use events::{Event, EventQueue};
use frame::{FixedRatePacer, FrameCoordinator, FramePacer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
    Lost,
}

impl SessionState {
    /// Legal edges of the lifecycle graph. Loss is reachable from anywhere.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Lost, _) => false,
            (LossPending, Lost) => true,
            (LossPending, _) => false,
            (_, LossPending) => true,
            (Idle, Ready | Exiting)
            | (Ready, Synchronized)
            | (Synchronized, Visible | Stopping)
            | (Visible, Focused | Synchronized)
            | (Focused, Visible)
            | (Stopping, Idle) => true,
            _ => false,
        }
    }

    pub fn is_running_state(self) -> bool {
        matches!(
            self,
            SessionState::Synchronized | SessionState::Visible | SessionState::Focused
        )
    }
}

/// Graphics API the application renders with. Only its presence is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicsBinding {
    Vulkan,
    OpenGl,
    OpenGlEs,
    D3d11,
    D3d12,
}

#[derive(Debug, Clone)]
pub struct SessionCreateInfo {
    pub ty: StructureType,
    pub system_id: SystemId,
    pub graphics_binding: Option<GraphicsBinding>,
}

impl SessionCreateInfo {
    pub fn new(system_id: SystemId, graphics_binding: Option<GraphicsBinding>) -> Self {
        Self {
            ty: StructureType::SessionCreateInfo,
            system_id,
            graphics_binding,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionBeginInfo {
    pub ty: StructureType,
    pub primary_view_configuration_type: ViewConfigurationType,
}

impl SessionBeginInfo {
    pub fn new(primary_view_configuration_type: ViewConfigurationType) -> Self {
        Self {
            ty: StructureType::SessionBeginInfo,
            primary_view_configuration_type,
        }
    }
}

typed_struct!(SessionCreateInfo => SessionCreateInfo, SessionBeginInfo => SessionBeginInfo);

#[derive(Debug)]
pub struct Session {
    system: SystemId,
    state: SessionState,
    has_begun: bool,
    exit_requested: bool,
    lost: bool,
    view_configuration: Option<ViewConfigurationType>,
    pub(crate) frames: FrameCoordinator,
    perf_levels: HashMap<PerfDomain, PerfLevel>,
}

impl Session {
    pub(crate) fn new(system: SystemId, pacer: Box<dyn FramePacer>) -> Self {
        Self {
            system,
            state: SessionState::Idle,
            has_begun: false,
            exit_requested: false,
            lost: false,
            view_configuration: None,
            frames: FrameCoordinator::new(pacer),
            perf_levels: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            SystemId(1),
            Box::new(FixedRatePacer::new(
                crate::time::TimeKeeper::default(),
                1_000_000,
            )),
        )
    }

    pub fn system(&self) -> SystemId {
        self.system
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.has_begun
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn view_configuration(&self) -> Option<ViewConfigurationType> {
        self.view_configuration
    }

    pub fn performance_level(&self, domain: PerfDomain) -> Option<PerfLevel> {
        self.perf_levels.get(&domain).copied()
    }

    pub(crate) fn record_performance_level(&mut self, domain: PerfDomain, level: PerfLevel) {
        self.perf_levels.insert(domain, level);
    }

    /// Moves along one legal edge and queues the matching event. Illegal
    /// edges are refused and leave the state untouched.
    pub(crate) fn transition(
        &mut self,
        handle: SessionHandle,
        next: SessionState,
        events: &mut EventQueue,
        time: XrTime,
    ) -> bool {
        if !self.state.can_transition_to(next) {
            log::error!(
                "[session] {} refused {:?} -> {next:?}",
                handle.raw(),
                self.state
            );
            return false;
        }
        log::info!("[session] {} {:?} -> {next:?}", handle.raw(), self.state);
        self.state = next;
        events.push(Event::SessionStateChanged {
            session: handle,
            state: next,
            time,
        });
        true
    }

    /// Walks down from any running state to `Stopping`.
    fn step_down_to_stopping(&mut self, handle: SessionHandle, events: &mut EventQueue, time: XrTime) {
        if self.state == SessionState::Focused {
            self.transition(handle, SessionState::Visible, events, time);
        }
        if self.state == SessionState::Visible {
            self.transition(handle, SessionState::Synchronized, events, time);
        }
        if self.state == SessionState::Synchronized {
            self.transition(handle, SessionState::Stopping, events, time);
        }
    }

    /// The first frame wait of a synchronized session makes it visible and
    /// focused.
    pub(crate) fn on_frame_waited(&mut self, handle: SessionHandle, events: &mut EventQueue, time: XrTime) {
        if self.state == SessionState::Synchronized && !self.exit_requested {
            self.transition(handle, SessionState::Visible, events, time);
            self.transition(handle, SessionState::Focused, events, time);
        }
    }

    /// Flags the session as lost. Every later call except destroy fails.
    pub(crate) fn begin_loss(&mut self, handle: SessionHandle, events: &mut EventQueue, time: XrTime) {
        if self.lost {
            return;
        }
        self.lost = true;
        self.transition(handle, SessionState::LossPending, events, time);
    }

    /// Completes a loss once the application has seen the pending event.
    pub(crate) fn finish_loss(&mut self, handle: SessionHandle) {
        if self.state == SessionState::LossPending {
            log::info!("[session] {} LossPending -> Lost", handle.raw());
            self.state = SessionState::Lost;
        }
    }

    pub(crate) fn finalize(&mut self) {
        self.has_begun = false;
        self.frames.reset();
        log::debug!("[session] finalized in state {:?}", self.state);
    }
}

impl Instance {
    pub fn create_session(&mut self, info: Option<&SessionCreateInfo>) -> XrResult<SessionHandle> {
        const CALL: &str = "xrCreateSession";
        let info = validate::arg_type(CALL, info, "createInfo")?;
        self.check_system(CALL, info.system_id)?;
        if info.graphics_binding.is_none() && !self.extensions.is_enabled(Extension::Headless) {
            return Err(validate::failure(
                CALL,
                format!(
                    "no graphics binding given and {} is not enabled",
                    Extension::Headless
                ),
            ));
        }

        let pacer = FixedRatePacer::new(self.clock.clone(), self.system.frame_period_ns());
        let session = Session::new(info.system_id, Box::new(pacer));
        let raw = self.registry.allocate(
            CALL,
            None,
            format!("session#{}", self.sessions.len()),
            HandleObject::Session(session),
        )?;
        let handle = SessionHandle::from_raw(raw);
        self.sessions.push(handle);

        let time = self.clock.now();
        self.events.push(Event::SessionStateChanged {
            session: handle,
            state: SessionState::Idle,
            time,
        });
        let session = self.registry.session_mut(CALL, handle)?;
        session.transition(handle, SessionState::Ready, &mut self.events, time);
        log::info!("[session] {} created", handle.raw());
        Ok(handle)
    }

    /// Always succeeds for a live handle, lost or not.
    pub fn destroy_session(&mut self, session: SessionHandle) -> XrResult<()> {
        const CALL: &str = "xrDestroySession";
        self.registry.session(CALL, session)?;
        self.sessions.retain(|live| *live != session);
        let destroyed = self.registry.destroy(CALL, session.raw())?;
        self.events.discard_session(session);
        log::info!("[session] {} destroyed with {} handle(s)", session.raw(), destroyed);
        Ok(())
    }

    pub fn begin_session(
        &mut self,
        session: SessionHandle,
        info: Option<&SessionBeginInfo>,
    ) -> XrResult<()> {
        const CALL: &str = "xrBeginSession";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        let info = validate::arg_type(CALL, info, "beginInfo")?;
        let system_view = self.system.view_configuration();
        if info.primary_view_configuration_type != system_view {
            return Err(XrError::ViewConfigurationTypeUnsupported {
                call: CALL,
                requested: format!("{:?}", info.primary_view_configuration_type),
            });
        }
        if found.has_begun {
            return Err(XrError::SessionRunning { call: CALL });
        }
        if found.state != SessionState::Ready {
            return Err(XrError::CallOrderInvalid {
                call: CALL,
                reason: format!("session is {:?}, not Ready", found.state),
            });
        }

        found.has_begun = true;
        found.view_configuration = Some(info.primary_view_configuration_type);
        let time = self.clock.now();
        found.transition(session, SessionState::Synchronized, &mut self.events, time);
        Ok(())
    }

    pub fn end_session(&mut self, session: SessionHandle) -> XrResult<()> {
        const CALL: &str = "xrEndSession";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        validate::session_running(CALL, found)?;

        let time = self.clock.now();
        found.step_down_to_stopping(session, &mut self.events, time);
        found.transition(session, SessionState::Idle, &mut self.events, time);
        found.has_begun = false;
        found.view_configuration = None;
        found.frames.reset();
        let next = if found.exit_requested {
            SessionState::Exiting
        } else {
            SessionState::Ready
        };
        found.transition(session, next, &mut self.events, time);
        Ok(())
    }

    pub fn request_exit_session(&mut self, session: SessionHandle) -> XrResult<()> {
        const CALL: &str = "xrRequestExitSession";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        validate::session_running(CALL, found)?;

        found.exit_requested = true;
        let time = self.clock.now();
        found.step_down_to_stopping(session, &mut self.events, time);
        Ok(())
    }

    /// Reports that the session can no longer be used, e.g. after a device
    /// disconnect. Destroying the session is the only remaining option.
    ///
    /// Idempotent: marking a lost session again succeeds and queues nothing.
    pub fn mark_session_lost(&mut self, session: SessionHandle) -> XrResult<()> {
        const CALL: &str = "xrMarkSessionLost";
        let found = self.registry.session_mut(CALL, session)?;
        let time = self.clock.now();
        found.begin_loss(session, &mut self.events, time);
        Ok(())
    }

    pub fn session_state(&self, session: SessionHandle) -> XrResult<SessionState> {
        Ok(self.registry.session("xrGetSessionState", session)?.state())
    }
}
