use std::sync::Arc;
use theta_xr::device::{SimulatedCompositor, SystemCompositor};
use theta_xr::runtime::system::ViewConfigurationType;
use theta_xr::session::display::{PerfDomain, PerfLevel};
use theta_xr::session::{GraphicsBinding, SessionBeginInfo, SessionCreateInfo};
use theta_xr::{Event, Extension, Instance, RuntimeConfig, SessionHandle, XrResultCode};

fn instance_with(headless: bool, rates: Vec<f32>) -> (Instance, Arc<SimulatedCompositor>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let compositor = Arc::new(SimulatedCompositor::new(rates));
    let config = RuntimeConfig::builder()
        .extensions([
            Extension::Headless,
            Extension::DisplayRefreshRate,
            Extension::PerformanceSettings,
        ])
        .headless(headless)
        .frame_period_ns(1_000_000)
        .build();
    let instance = Instance::builder(config)
        .compositor(compositor.clone())
        .build()
        .expect("instance");
    (instance, compositor)
}

fn session(instance: &mut Instance) -> SessionHandle {
    let info = SessionCreateInfo::new(instance.get_system(), Some(GraphicsBinding::Vulkan));
    instance.create_session(Some(&info)).expect("session")
}

fn refresh_events(instance: &mut Instance) -> Vec<(f32, f32)> {
    std::iter::from_fn(|| instance.poll_event())
        .filter_map(|event| match event {
            Event::DisplayRefreshRateChanged { from_hz, to_hz, .. } => Some((from_hz, to_hz)),
            _ => None,
        })
        .collect()
}

#[test]
fn rates_enumerate_with_two_calls() {
    let (mut instance, _) = instance_with(false, vec![90.0, 72.0, 60.0]);
    let session = session(&mut instance);

    let count = instance
        .enumerate_display_refresh_rates(session, &mut [])
        .unwrap();
    assert_eq!(count, 3);
    let mut rates = vec![0.0; count];
    instance
        .enumerate_display_refresh_rates(session, &mut rates)
        .unwrap();
    assert_eq!(rates, vec![90.0, 72.0, 60.0]);
    assert_eq!(instance.get_display_refresh_rate(session).unwrap(), 90.0);
}

#[test]
fn zero_request_changes_nothing_in_any_state() {
    let (mut instance, compositor) = instance_with(false, vec![90.0, 60.0]);
    let session = session(&mut instance);
    instance.poll_event();
    instance.poll_event();

    instance.request_display_refresh_rate(session, 0.0).unwrap();
    let info = SessionBeginInfo::new(ViewConfigurationType::PrimaryStereo);
    instance.begin_session(session, Some(&info)).unwrap();
    instance.request_display_refresh_rate(session, 0.0).unwrap();
    instance.wait_frame(session, None).unwrap();
    instance.request_display_refresh_rate(session, 0.0).unwrap();

    assert_eq!(compositor.current_refresh_rate(), 90.0);
    assert!(refresh_events(&mut instance).is_empty());
}

#[test]
fn near_rates_match_at_two_decimals() {
    let (mut instance, _) = instance_with(false, vec![90.0, 60.0]);
    let session = session(&mut instance);

    instance.request_display_refresh_rate(session, 59.999).unwrap();
    assert_eq!(instance.get_display_refresh_rate(session).unwrap(), 60.0);
    assert_eq!(refresh_events(&mut instance), vec![(90.0, 60.0)]);

    let err = instance
        .request_display_refresh_rate(session, 59.94)
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::DisplayRefreshRateUnsupported);
    assert_eq!(instance.get_display_refresh_rate(session).unwrap(), 60.0);
}

#[test]
fn requesting_the_current_rate_queues_no_event() {
    let (mut instance, _) = instance_with(false, vec![72.0]);
    let session = session(&mut instance);
    instance.request_display_refresh_rate(session, 72.0).unwrap();
    assert!(refresh_events(&mut instance).is_empty());
}

#[test]
fn headless_never_fails_refresh_calls() {
    let (mut instance, _) = instance_with(true, vec![90.0]);
    assert!(instance.system().is_headless());
    let info = SessionCreateInfo::new(instance.get_system(), None);
    let session = instance.create_session(Some(&info)).unwrap();

    assert_eq!(
        instance
            .enumerate_display_refresh_rates(session, &mut [])
            .unwrap(),
        0
    );
    assert_eq!(instance.get_display_refresh_rate(session).unwrap(), 0.0);
    instance.request_display_refresh_rate(session, 0.0).unwrap();
    instance.request_display_refresh_rate(session, 120.0).unwrap();
    instance.request_display_refresh_rate(session, -1.0).unwrap();
    instance.request_display_refresh_rate(session, f32::NAN).unwrap();
}

#[test]
fn negative_rate_is_rejected_with_a_compositor() {
    let (mut instance, compositor) = instance_with(false, vec![90.0]);
    let session = session(&mut instance);
    let err = instance
        .request_display_refresh_rate(session, -1.0)
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::ValidationFailure);
    assert_eq!(compositor.current_refresh_rate(), 90.0);
}

#[test]
fn refresh_calls_need_their_extension() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RuntimeConfig::builder().build();
    let mut instance = Instance::new(config).unwrap();
    let session = session(&mut instance);
    let err = instance.get_display_refresh_rate(session).unwrap_err();
    assert_eq!(err.code(), XrResultCode::FunctionUnsupported);
}

#[test]
fn performance_levels_are_recorded_and_forwarded() {
    let (mut instance, compositor) = instance_with(false, vec![90.0]);
    let session = session(&mut instance);

    instance
        .set_performance_level(session, PerfDomain::Gpu, PerfLevel::Boost)
        .unwrap();
    assert_eq!(
        compositor.performance_level(PerfDomain::Gpu),
        Some(PerfLevel::Boost)
    );
    instance.set_performance_level_raw(session, 1, 25).unwrap();
    assert_eq!(
        compositor.performance_level(PerfDomain::Cpu),
        Some(PerfLevel::SustainedLow)
    );

    let err = instance
        .set_performance_level_raw(session, 3, 25)
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::ValidationFailure);
    let err = instance
        .set_performance_level_raw(session, 1, 30)
        .unwrap_err();
    assert_eq!(err.code(), XrResultCode::ValidationFailure);
}
