use std::sync::Arc;
use theta_xr::device::{DeviceRole, SimulatedDevice};
use theta_xr::runtime::system::{EnvironmentBlendMode, ViewConfigurationType};
use theta_xr::session::frame::{FrameEndInfo, FrameWaitInfo};
use theta_xr::session::{GraphicsBinding, SessionBeginInfo, SessionCreateInfo};
use theta_xr::space::relation::Pose;
use theta_xr::space::{ReferenceSpaceCreateInfo, ReferenceSpaceType, SpaceLocation};
use theta_xr::tracking::hand::{Hand, HandJointLocations, HandJointsLocateInfo, HandTrackerCreateInfo};
use theta_xr::{Event, Extension, Instance, RuntimeConfig, SessionHandle, SessionState, XrResultCode};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn instance() -> Instance {
    init_logging();
    let config = RuntimeConfig::builder()
        .application_name("lifecycle")
        .extension(Extension::HandTracking)
        .frame_period_ns(1_000_000)
        .role(DeviceRole::Head, "rig")
        .role(DeviceRole::HandTrackingLeft, "rig")
        .build();
    Instance::builder(config)
        .device(Arc::new(SimulatedDevice::full_rig("rig")))
        .build()
        .expect("instance")
}

fn create_session(instance: &mut Instance) -> SessionHandle {
    let info = SessionCreateInfo::new(instance.get_system(), Some(GraphicsBinding::Vulkan));
    instance.create_session(Some(&info)).expect("session")
}

fn begin(instance: &mut Instance, session: SessionHandle) -> theta_xr::XrResult<()> {
    let info = SessionBeginInfo::new(ViewConfigurationType::PrimaryStereo);
    instance.begin_session(session, Some(&info))
}

fn drain_states(instance: &mut Instance) -> Vec<SessionState> {
    std::iter::from_fn(|| instance.poll_event())
        .filter_map(|event| match event {
            Event::SessionStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect()
}

#[test]
fn created_session_reports_idle_then_ready() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Ready);
    assert_eq!(
        drain_states(&mut instance),
        vec![SessionState::Idle, SessionState::Ready]
    );
}

#[test]
fn frame_calls_before_begin_fail_without_side_effects() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    drain_states(&mut instance);

    let err = instance
        .wait_frame(session, Some(&FrameWaitInfo::default()))
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionNotRunning);
    let err = instance.begin_frame(session, None).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionNotRunning);
    let end = FrameEndInfo::new(1, EnvironmentBlendMode::Opaque);
    let err = instance.end_frame(session, Some(&end)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionNotRunning);

    assert_eq!(instance.session_state(session).unwrap(), SessionState::Ready);
    assert!(drain_states(&mut instance).is_empty());
}

#[test]
fn second_begin_reports_running_and_changes_nothing() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();
    let after_first = instance.session_state(session).unwrap();
    drain_states(&mut instance);

    let err = begin(&mut instance, session).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionRunning);
    assert_eq!(instance.session_state(session).unwrap(), after_first);
    assert!(drain_states(&mut instance).is_empty());
}

#[test]
fn begin_with_other_view_configuration_is_rejected() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    let info = SessionBeginInfo::new(ViewConfigurationType::PrimaryMono);
    let err = instance.begin_session(session, Some(&info)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::ViewConfigurationTypeUnsupported);
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Ready);
}

#[test]
fn frame_loop_runs_and_focuses_the_session() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();

    let first = instance.wait_frame(session, None).unwrap();
    assert!(first.should_render);
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Focused);
    assert_eq!(instance.begin_frame(session, None).unwrap(), XrResultCode::Success);
    let end = FrameEndInfo::new(first.predicted_display_time, EnvironmentBlendMode::Opaque);
    instance.end_frame(session, Some(&end)).unwrap();

    assert_eq!(
        drain_states(&mut instance),
        vec![
            SessionState::Idle,
            SessionState::Ready,
            SessionState::Synchronized,
            SessionState::Visible,
            SessionState::Focused,
        ]
    );
}

#[test]
fn consecutive_waits_never_predict_backwards() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();

    let first = instance.wait_frame(session, None).unwrap();
    let second = instance.wait_frame(session, None).unwrap();
    assert!(second.predicted_display_time >= first.predicted_display_time);
    assert!(first.predicted_display_period > 0);
}

#[test]
fn end_frame_checks_blend_mode_and_time() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();
    let state = instance.wait_frame(session, None).unwrap();
    instance.begin_frame(session, None).unwrap();

    let additive = FrameEndInfo::new(state.predicted_display_time, EnvironmentBlendMode::Additive);
    let err = instance.end_frame(session, Some(&additive)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::EnvironmentBlendModeUnsupported);

    let zero = FrameEndInfo::new(0, EnvironmentBlendMode::Opaque);
    let err = instance.end_frame(session, Some(&zero)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::TimeInvalid);

    let good = FrameEndInfo::new(state.predicted_display_time, EnvironmentBlendMode::Opaque);
    instance.end_frame(session, Some(&good)).unwrap();
}

#[test]
fn exit_request_ends_in_exiting() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();
    instance.wait_frame(session, None).unwrap();
    drain_states(&mut instance);

    instance.request_exit_session(session).unwrap();
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Stopping);
    instance.end_session(session).unwrap();
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Exiting);
    assert_eq!(
        drain_states(&mut instance),
        vec![
            SessionState::Visible,
            SessionState::Synchronized,
            SessionState::Stopping,
            SessionState::Idle,
            SessionState::Exiting,
        ]
    );
}

#[test]
fn end_without_exit_returns_to_ready_and_can_begin_again() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();
    instance.end_session(session).unwrap();
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Ready);
    begin(&mut instance, session).unwrap();
    assert_eq!(
        instance.session_state(session).unwrap(),
        SessionState::Synchronized
    );
}

#[test]
fn lost_session_rejects_everything_but_destroy() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    begin(&mut instance, session).unwrap();
    drain_states(&mut instance);

    instance.mark_session_lost(session).unwrap();
    assert_eq!(
        drain_states(&mut instance),
        vec![SessionState::LossPending]
    );
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Lost);

    let err = instance.wait_frame(session, None).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionLost);
    let err = instance.end_session(session).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionLost);
    let info = HandTrackerCreateInfo::new(Hand::Left);
    let err = instance.create_hand_tracker(session, Some(&info)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::SessionLost);

    instance.destroy_session(session).unwrap();
    assert!(instance.sessions().is_empty());
}

#[test]
fn marking_a_lost_session_again_queues_nothing() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    drain_states(&mut instance);

    instance.mark_session_lost(session).unwrap();
    instance.mark_session_lost(session).unwrap();
    assert_eq!(
        drain_states(&mut instance),
        vec![SessionState::LossPending]
    );
    instance.mark_session_lost(session).unwrap();
    assert!(drain_states(&mut instance).is_empty());
    assert_eq!(instance.session_state(session).unwrap(), SessionState::Lost);
}

#[test]
fn destroying_a_session_invalidates_its_children() {
    let mut instance = instance();
    let session = create_session(&mut instance);
    let space_info = ReferenceSpaceCreateInfo::new(ReferenceSpaceType::Local, Pose::identity());
    let space = instance
        .create_reference_space(session, Some(&space_info))
        .unwrap();
    let tracker = instance
        .create_hand_tracker(session, Some(&HandTrackerCreateInfo::new(Hand::Left)))
        .unwrap();
    assert_eq!(instance.registry().live_count(), 3);

    instance.destroy_session(session).unwrap();
    assert_eq!(instance.registry().live_count(), 0);

    let mut locations = HandJointLocations::with_capacity(26);
    let err = instance
        .locate_hand_joints(
            tracker,
            Some(&HandJointsLocateInfo::new(space, 1)),
            Some(&mut locations),
        )
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::HandleInvalid);
    let mut location = SpaceLocation::default();
    let err = instance
        .locate_space(space, space, 1, Some(&mut location))
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::HandleInvalid);
    let err = instance.destroy_session(session).unwrap_err();
    assert_eq!(err.code(), XrResultCode::HandleInvalid);
}

#[test]
fn instance_teardown_destroys_every_session() {
    let mut instance = instance();
    let first = create_session(&mut instance);
    let second = create_session(&mut instance);
    instance
        .create_hand_tracker(second, Some(&HandTrackerCreateInfo::new(Hand::Left)))
        .unwrap();

    assert_eq!(instance.destroy(), 3);
    assert!(instance.session_state(first).is_err());
    assert!(instance.session_state(second).is_err());
    assert_eq!(instance.destroy(), 0);
}

#[test]
fn session_without_graphics_needs_headless() {
    let mut instance = instance();
    let info = SessionCreateInfo::new(instance.get_system(), None);
    let err = instance.create_session(Some(&info)).unwrap_err();
    assert_eq!(err.code(), XrResultCode::ValidationFailure);
    assert!(instance.sessions().is_empty());
}
