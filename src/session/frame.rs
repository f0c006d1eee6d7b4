//! Frame timing: wait, begin and end of the render loop.

use crate::error::{XrError, XrResult, XrResultCode};
use crate::handle::{SessionHandle, SpaceHandle};
use crate::runtime::system::{EnvironmentBlendMode, MAX_LAYER_COUNT};
use crate::runtime::{live_session_mut, Instance};
use crate::time::{TimeKeeper, XrTime};
use crate::validate::{self, typed_struct, StructureType};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Predictions kept for matching against `end_frame` display times.
const PREDICTION_HISTORY: usize = 8;

/// Display timing for one frame, in monotonic nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub display_ns: u64,
    pub period_ns: u64,
}

/// Source of frame timing. `wait` blocks the caller until the next frame
/// should begin.
pub trait FramePacer: Send + fmt::Debug {
    fn wait(&mut self) -> FrameTiming;
}

/// Paces frames at a fixed period on the monotonic clock.
#[derive(Debug)]
pub struct FixedRatePacer {
    clock: TimeKeeper,
    period_ns: u64,
    last_display_ns: Option<u64>,
}

impl FixedRatePacer {
    pub fn new(clock: TimeKeeper, period_ns: u64) -> Self {
        Self {
            clock,
            period_ns: period_ns.max(1),
            last_display_ns: None,
        }
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    fn next_display_ns(&self, now: u64) -> u64 {
        let Some(last) = self.last_display_ns else {
            return now + self.period_ns;
        };
        let mut display = last + self.period_ns;
        if display < now {
            let behind = (now - display) / self.period_ns + 1;
            display += behind * self.period_ns;
        }
        display
    }
}

impl FramePacer for FixedRatePacer {
    fn wait(&mut self) -> FrameTiming {
        let now = self.clock.monotonic_now_ns();
        let display_ns = self.next_display_ns(now);
        let wake_ns = display_ns - self.period_ns;
        if wake_ns > now {
            std::thread::sleep(Duration::from_nanos(wake_ns - now));
        }
        self.last_display_ns = Some(display_ns);
        FrameTiming {
            display_ns,
            period_ns: self.period_ns,
        }
    }
}

/// Per-session bookkeeping of the wait/begin/end sequence.
#[derive(Debug)]
pub struct FrameCoordinator {
    pacer: Box<dyn FramePacer>,
    waited: bool,
    in_frame: bool,
    predictions: VecDeque<XrTime>,
    last_predicted: XrTime,
    frames_ended: u64,
}

impl FrameCoordinator {
    pub fn new(pacer: Box<dyn FramePacer>) -> Self {
        Self {
            pacer,
            waited: false,
            in_frame: false,
            predictions: VecDeque::with_capacity(PREDICTION_HISTORY),
            last_predicted: 0,
            frames_ended: 0,
        }
    }

    /// Blocks on the pacer and records the prediction it hands out.
    pub fn wait(&mut self, clock: &TimeKeeper) -> (XrTime, i64) {
        let timing = self.pacer.wait();
        let predicted = clock
            .monotonic_to_ts(timing.display_ns)
            .max(self.last_predicted);
        self.last_predicted = predicted;
        if self.predictions.len() == PREDICTION_HISTORY {
            if let Some(evicted) = self.predictions.pop_front() {
                log::debug!("[frame] prediction {evicted} evicted, frame was never ended");
            }
        }
        self.predictions.push_back(predicted);
        self.waited = true;
        let period = i64::try_from(timing.period_ns).unwrap_or(i64::MAX);
        (predicted, period)
    }

    /// Returns `FrameDiscarded` when a begun frame is replaced.
    pub fn begin(&mut self, call: &'static str) -> XrResult<XrResultCode> {
        if !self.waited {
            return Err(XrError::CallOrderInvalid {
                call,
                reason: "no frame wait precedes this frame".into(),
            });
        }
        self.waited = false;
        if self.in_frame {
            log::debug!("[frame] previous frame discarded");
            return Ok(XrResultCode::FrameDiscarded);
        }
        self.in_frame = true;
        Ok(XrResultCode::Success)
    }

    pub fn end(&mut self, call: &'static str, display_time: XrTime) -> XrResult<()> {
        if !self.in_frame {
            return Err(XrError::CallOrderInvalid {
                call,
                reason: "no frame has begun".into(),
            });
        }
        let Some(position) = self
            .predictions
            .iter()
            .position(|predicted| *predicted == display_time)
        else {
            return Err(XrError::TimeInvalid {
                call,
                time: display_time,
            });
        };
        self.predictions.drain(..=position);
        self.in_frame = false;
        self.frames_ended += 1;
        log::trace!("[frame] frame {} ended at {display_time}", self.frames_ended);
        Ok(())
    }

    pub fn frames_ended(&self) -> u64 {
        self.frames_ended
    }

    pub fn reset(&mut self) {
        self.waited = false;
        self.in_frame = false;
        self.predictions.clear();
    }
}

#[derive(Debug, Clone)]
pub struct FrameWaitInfo {
    pub ty: StructureType,
}

impl Default for FrameWaitInfo {
    fn default() -> Self {
        Self {
            ty: StructureType::FrameWaitInfo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub predicted_display_time: XrTime,
    pub predicted_display_period: i64,
    pub should_render: bool,
}

#[derive(Debug, Clone)]
pub struct FrameBeginInfo {
    pub ty: StructureType,
}

impl Default for FrameBeginInfo {
    fn default() -> Self {
        Self {
            ty: StructureType::FrameBeginInfo,
        }
    }
}

/// Submitted content is opaque to this runtime; only its space is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionLayer {
    pub space: SpaceHandle,
}

#[derive(Debug, Clone)]
pub struct FrameEndInfo {
    pub ty: StructureType,
    pub display_time: XrTime,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub layers: Vec<CompositionLayer>,
}

impl FrameEndInfo {
    pub fn new(display_time: XrTime, environment_blend_mode: EnvironmentBlendMode) -> Self {
        Self {
            ty: StructureType::FrameEndInfo,
            display_time,
            environment_blend_mode,
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: CompositionLayer) -> Self {
        self.layers.push(layer);
        self
    }
}

typed_struct!(
    FrameWaitInfo => FrameWaitInfo,
    FrameBeginInfo => FrameBeginInfo,
    FrameEndInfo => FrameEndInfo,
);

impl Instance {
    /// Blocks until the next frame is due.
    pub fn wait_frame(
        &mut self,
        session: SessionHandle,
        info: Option<&FrameWaitInfo>,
    ) -> XrResult<FrameState> {
        const CALL: &str = "xrWaitFrame";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        validate::session_running(CALL, found)?;
        validate::arg_type_can_be_null(CALL, info, "frameWaitInfo")?;

        let (predicted_display_time, predicted_display_period) = found.frames.wait(&self.clock);
        let now = self.clock.now();
        found.on_frame_waited(session, &mut self.events, now);
        let should_render = matches!(
            found.state(),
            super::SessionState::Visible | super::SessionState::Focused
        );
        log::trace!("[frame] {} predicted {predicted_display_time}", session.raw());
        Ok(FrameState {
            predicted_display_time,
            predicted_display_period,
            should_render,
        })
    }

    /// Returns `FrameDiscarded` instead of `Success` when an unfinished frame
    /// was replaced.
    pub fn begin_frame(
        &mut self,
        session: SessionHandle,
        info: Option<&FrameBeginInfo>,
    ) -> XrResult<XrResultCode> {
        const CALL: &str = "xrBeginFrame";
        let found = live_session_mut(&mut self.registry, CALL, session)?;
        validate::session_running(CALL, found)?;
        validate::arg_type_can_be_null(CALL, info, "frameBeginInfo")?;
        found.frames.begin(CALL)
    }

    pub fn end_frame(&mut self, session: SessionHandle, info: Option<&FrameEndInfo>) -> XrResult<()> {
        const CALL: &str = "xrEndFrame";
        let found = self.live_session(CALL, session)?;
        validate::session_running(CALL, found)?;
        let info = validate::arg_type(CALL, info, "frameEndInfo")?;
        validate::time(CALL, info.display_time)?;

        if info.layers.len() > MAX_LAYER_COUNT {
            return Err(XrError::LayerLimitExceeded {
                call: CALL,
                count: info.layers.len(),
                max: MAX_LAYER_COUNT,
            });
        }
        if info.environment_blend_mode != self.system.blend_mode() {
            return Err(XrError::EnvironmentBlendModeUnsupported {
                call: CALL,
                reason: format!(
                    "{:?} requested, system uses {:?}",
                    info.environment_blend_mode,
                    self.system.blend_mode()
                ),
            });
        }
        for layer in &info.layers {
            self.session_space(CALL, layer.space, session)?;
        }

        let found = live_session_mut(&mut self.registry, CALL, session)?;
        found.frames.end(CALL, info.display_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StepPacer {
        next: u64,
    }

    impl FramePacer for StepPacer {
        fn wait(&mut self) -> FrameTiming {
            self.next += 10;
            FrameTiming {
                display_ns: self.next,
                period_ns: 10,
            }
        }
    }

    fn coordinator() -> FrameCoordinator {
        FrameCoordinator::new(Box::new(StepPacer { next: 0 }))
    }

    #[test]
    fn begin_requires_wait() {
        let mut frames = coordinator();
        let err = frames.begin("xrBeginFrame").unwrap_err();
        assert_eq!(err.code(), XrResultCode::CallOrderInvalid);
    }

    #[test]
    fn second_begin_discards_previous_frame() {
        let clock = TimeKeeper::new(100);
        let mut frames = coordinator();
        frames.wait(&clock);
        assert_eq!(frames.begin("xrBeginFrame").unwrap(), XrResultCode::Success);
        frames.wait(&clock);
        assert_eq!(
            frames.begin("xrBeginFrame").unwrap(),
            XrResultCode::FrameDiscarded
        );
    }

    #[test]
    fn end_matches_handed_out_prediction() {
        let clock = TimeKeeper::new(100);
        let mut frames = coordinator();
        let (predicted, _) = frames.wait(&clock);
        frames.begin("xrBeginFrame").unwrap();

        let err = frames.end("xrEndFrame", predicted + 1).unwrap_err();
        assert_eq!(err.code(), XrResultCode::TimeInvalid);
        frames.end("xrEndFrame", predicted).unwrap();
        assert_eq!(frames.frames_ended(), 1);

        let err = frames.end("xrEndFrame", predicted).unwrap_err();
        assert_eq!(err.code(), XrResultCode::CallOrderInvalid);
    }

    #[test]
    fn oldest_prediction_is_forgotten_once_history_is_full() {
        let clock = TimeKeeper::new(100);
        let mut frames = coordinator();
        let handed_out: Vec<XrTime> = (0..=PREDICTION_HISTORY)
            .map(|_| frames.wait(&clock).0)
            .collect();
        frames.begin("xrBeginFrame").unwrap();

        let err = frames.end("xrEndFrame", handed_out[0]).unwrap_err();
        assert_eq!(err.code(), XrResultCode::TimeInvalid);
        frames.end("xrEndFrame", handed_out[1]).unwrap();
    }

    #[test]
    fn predictions_never_go_backwards() {
        let clock = TimeKeeper::new(100);
        let mut frames = coordinator();
        let (first, _) = frames.wait(&clock);
        let (second, _) = frames.wait(&clock);
        assert!(second >= first);
    }

    #[test]
    fn fixed_rate_pacer_advances_by_period() {
        let mut pacer = FixedRatePacer::new(TimeKeeper::default(), 1_000_000);
        let first = pacer.wait();
        let second = pacer.wait();
        assert!(second.display_ns >= first.display_ns + pacer.period_ns());
    }

    #[test]
    fn fixed_rate_pacer_skips_missed_frames() {
        let pacer = FixedRatePacer {
            clock: TimeKeeper::default(),
            period_ns: 10,
            last_display_ns: Some(100),
        };
        assert_eq!(pacer.next_display_ns(105), 110);
        assert_eq!(pacer.next_display_ns(135), 140);
    }
}
