use super::{
    BodyJointSet, BodyTrackingFidelity, DeviceCapabilities, DeviceError, DeviceResult,
    FacialExpressionSet, ForceFeedbackCurl, HandJoint, HandJointSet, InputName, RestSkeleton,
    SkeletonJoint, SystemCompositor, XrDevice, BODY_JOINT_COUNT, EYE_EXPRESSION_COUNT,
    FULL_BODY_JOINT_COUNT, HAND_JOINT_COUNT, LIP_EXPRESSION_COUNT,
};
use crate::session::display::{PerfDomain, PerfLevel};
use crate::space::relation::{Pose, SpaceRelation, Vec3};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_HEAD_HEIGHT_M: f32 = 1.6;
const DEFAULT_JOINT_RADIUS_M: f32 = 0.01;

/// Scriptable device used when no hardware is attached and in tests.
///
/// Every query answers from the last value set through the `set_*` methods,
/// falling back to a rest pose generated from the device's inputs.
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    inputs: Vec<InputName>,
    capabilities: DeviceCapabilities,
    state: Mutex<SimulatedState>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    poses: HashMap<InputName, SpaceRelation>,
    hands: HashMap<InputName, HandJointSet>,
    bodies: HashMap<InputName, BodyJointSet>,
    skeleton: Option<RestSkeleton>,
    faces: HashMap<InputName, FacialExpressionSet>,
    fidelity: BodyTrackingFidelity,
    curls: HashMap<InputName, Vec<ForceFeedbackCurl>>,
    failure: Option<String>,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            capabilities: DeviceCapabilities::default(),
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// A head-mounted display exposing only a head pose.
    pub fn headset(name: impl Into<String>) -> Self {
        Self::new(name).with_input(InputName::HeadPose)
    }

    /// A device exposing every input and capability.
    pub fn full_rig(name: impl Into<String>) -> Self {
        Self::new(name)
            .with_input(InputName::HeadPose)
            .with_input(InputName::HandTrackingLeft)
            .with_input(InputName::HandTrackingRight)
            .with_input(InputName::BodyTracking)
            .with_input(InputName::FullBodyTracking)
            .with_input(InputName::EyeFaceTracking)
            .with_input(InputName::LipFaceTracking)
            .with_capabilities(DeviceCapabilities {
                hand_tracking: true,
                force_feedback: true,
                body_tracking: true,
                full_body_tracking: true,
                body_tracking_fidelity: true,
                face_tracking: true,
            })
    }

    pub fn with_input(mut self, input: InputName) -> Self {
        if !self.inputs.contains(&input) {
            self.inputs.push(input);
        }
        self
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn set_pose(&self, input: InputName, relation: SpaceRelation) -> DeviceResult<()> {
        self.state()?.poses.insert(input, relation);
        Ok(())
    }

    pub fn set_hand(&self, input: InputName, joints: HandJointSet) -> DeviceResult<()> {
        self.state()?.hands.insert(input, joints);
        Ok(())
    }

    pub fn set_body(&self, input: InputName, joints: BodyJointSet) -> DeviceResult<()> {
        self.state()?.bodies.insert(input, joints);
        Ok(())
    }

    pub fn set_skeleton(&self, skeleton: Option<RestSkeleton>) -> DeviceResult<()> {
        self.state()?.skeleton = skeleton;
        Ok(())
    }

    pub fn set_face(&self, input: InputName, expressions: FacialExpressionSet) -> DeviceResult<()> {
        self.state()?.faces.insert(input, expressions);
        Ok(())
    }

    /// Makes every later query fail until cleared with `None`.
    pub fn set_failure(&self, failure: Option<String>) -> DeviceResult<()> {
        self.state()?.failure = failure;
        Ok(())
    }

    pub fn fidelity(&self) -> DeviceResult<BodyTrackingFidelity> {
        Ok(self.state()?.fidelity)
    }

    /// Curls last applied to `input`, if any.
    pub fn applied_curls(&self, input: InputName) -> DeviceResult<Vec<ForceFeedbackCurl>> {
        Ok(self.state()?.curls.get(&input).cloned().unwrap_or_default())
    }

    fn state(&self) -> DeviceResult<MutexGuard<'_, SimulatedState>> {
        self.state
            .lock()
            .map_err(|_| DeviceError::Failure(format!("'{}' state poisoned", self.name)))
    }

    fn checked_state(&self, input: InputName) -> DeviceResult<MutexGuard<'_, SimulatedState>> {
        if !self.has_input(input) {
            return Err(DeviceError::Failure(format!(
                "'{}' has no {input:?} input",
                self.name
            )));
        }
        let state = self.state()?;
        if let Some(reason) = &state.failure {
            return Err(DeviceError::Failure(reason.clone()));
        }
        Ok(state)
    }
}

fn rest_pose(input: InputName) -> SpaceRelation {
    let translation = match input {
        InputName::HeadPose | InputName::EyeFaceTracking | InputName::LipFaceTracking => {
            Vec3::new(0.0, DEFAULT_HEAD_HEIGHT_M, 0.0)
        }
        InputName::HandTrackingLeft => Vec3::new(-0.2, 1.2, -0.3),
        InputName::HandTrackingRight => Vec3::new(0.2, 1.2, -0.3),
        InputName::BodyTracking | InputName::FullBodyTracking => Vec3::zero(),
    };
    SpaceRelation::from_pose(Pose::from_translation(translation))
}

fn rest_hand(input: InputName, at_ns: u64) -> HandJointSet {
    let joints = (0..HAND_JOINT_COUNT)
        .map(|index| HandJoint {
            relation: SpaceRelation::from_pose(Pose::from_translation(Vec3::new(
                0.0,
                0.0,
                -0.01 * index as f32,
            ))),
            radius: DEFAULT_JOINT_RADIUS_M,
        })
        .collect();
    HandJointSet {
        is_active: true,
        sample_time_ns: at_ns,
        hand_pose: rest_pose(input),
        joints,
    }
}

fn body_joint_count(input: InputName) -> usize {
    match input {
        InputName::FullBodyTracking => FULL_BODY_JOINT_COUNT,
        _ => BODY_JOINT_COUNT,
    }
}

fn rest_body(input: InputName, at_ns: u64, fidelity: BodyTrackingFidelity) -> BodyJointSet {
    let joints = (0..body_joint_count(input))
        .map(|index| {
            SpaceRelation::from_pose(Pose::from_translation(Vec3::new(
                0.0,
                0.025 * index as f32,
                0.0,
            )))
        })
        .collect();
    BodyJointSet {
        is_active: true,
        sample_time_ns: at_ns,
        confidence: 1.0,
        skeleton_changed_count: 1,
        fidelity,
        joints,
    }
}

fn rest_skeleton(count: usize) -> RestSkeleton {
    let joints = (0..count as u32)
        .map(|joint| SkeletonJoint {
            pose: Pose::from_translation(Vec3::new(0.0, 0.025 * joint as f32, 0.0)),
            joint,
            parent_joint: joint.saturating_sub(1),
        })
        .collect();
    RestSkeleton { joints }
}

fn rest_face(input: InputName) -> FacialExpressionSet {
    let count = match input {
        InputName::LipFaceTracking => LIP_EXPRESSION_COUNT,
        _ => EYE_EXPRESSION_COUNT,
    };
    FacialExpressionSet {
        is_active: true,
        sample_time_ns: 0,
        weights: vec![0.0; count],
    }
}

impl XrDevice for SimulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[InputName] {
        &self.inputs
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn get_tracked_pose(&self, input: InputName, _at_ns: u64) -> DeviceResult<SpaceRelation> {
        let state = self.checked_state(input)?;
        Ok(state
            .poses
            .get(&input)
            .copied()
            .unwrap_or_else(|| rest_pose(input)))
    }

    fn get_hand_tracking(&self, input: InputName, at_ns: u64) -> DeviceResult<HandJointSet> {
        if !self.capabilities.hand_tracking {
            return Err(DeviceError::Unsupported("hand tracking"));
        }
        let state = self.checked_state(input)?;
        Ok(state
            .hands
            .get(&input)
            .cloned()
            .unwrap_or_else(|| rest_hand(input, at_ns)))
    }

    fn get_body_joints(&self, input: InputName, at_ns: u64) -> DeviceResult<BodyJointSet> {
        if !self.capabilities.body_tracking {
            return Err(DeviceError::Unsupported("body joints"));
        }
        let state = self.checked_state(input)?;
        Ok(state
            .bodies
            .get(&input)
            .cloned()
            .unwrap_or_else(|| rest_body(input, at_ns, state.fidelity)))
    }

    fn get_body_skeleton(&self, input: InputName) -> DeviceResult<RestSkeleton> {
        if !self.capabilities.body_tracking {
            return Err(DeviceError::Unsupported("body skeleton"));
        }
        let state = self.checked_state(input)?;
        Ok(state
            .skeleton
            .clone()
            .unwrap_or_else(|| rest_skeleton(body_joint_count(input))))
    }

    fn get_face_tracking(&self, input: InputName) -> DeviceResult<FacialExpressionSet> {
        if !self.capabilities.face_tracking {
            return Err(DeviceError::Unsupported("face tracking"));
        }
        let state = self.checked_state(input)?;
        Ok(state
            .faces
            .get(&input)
            .cloned()
            .unwrap_or_else(|| rest_face(input)))
    }

    fn set_body_tracking_fidelity(&self, fidelity: BodyTrackingFidelity) -> DeviceResult<()> {
        if !self.capabilities.body_tracking_fidelity {
            return Err(DeviceError::Unsupported("body tracking fidelity"));
        }
        self.state()?.fidelity = fidelity;
        log::debug!("[device] '{}' body fidelity now {fidelity:?}", self.name);
        Ok(())
    }

    fn set_force_feedback(&self, input: InputName, curls: &[ForceFeedbackCurl]) -> DeviceResult<()> {
        if !self.capabilities.force_feedback {
            return Err(DeviceError::Unsupported("force feedback"));
        }
        self.checked_state(input)?.curls.insert(input, curls.to_vec());
        Ok(())
    }
}

/// Compositor stand-in with a fixed set of refresh rates.
#[derive(Debug)]
pub struct SimulatedCompositor {
    rates: Vec<f32>,
    state: Mutex<CompositorState>,
}

#[derive(Debug, Default)]
struct CompositorState {
    current: f32,
    levels: HashMap<PerfDomain, PerfLevel>,
}

impl SimulatedCompositor {
    /// The first rate is the initial one.
    pub fn new(rates: Vec<f32>) -> Self {
        let current = rates.first().copied().unwrap_or(0.0);
        Self {
            rates,
            state: Mutex::new(CompositorState {
                current,
                levels: HashMap::new(),
            }),
        }
    }

    pub fn performance_level(&self, domain: PerfDomain) -> Option<PerfLevel> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.levels.get(&domain).copied())
    }

    fn state(&self) -> DeviceResult<MutexGuard<'_, CompositorState>> {
        self.state
            .lock()
            .map_err(|_| DeviceError::Failure("compositor state poisoned".into()))
    }
}

impl Default for SimulatedCompositor {
    fn default() -> Self {
        Self::new(vec![90.0, 72.0, 60.0])
    }
}

impl SystemCompositor for SimulatedCompositor {
    fn refresh_rates(&self) -> Vec<f32> {
        self.rates.clone()
    }

    fn current_refresh_rate(&self) -> f32 {
        self.state.lock().map(|state| state.current).unwrap_or(0.0)
    }

    fn request_refresh_rate(&self, hz: f32) -> DeviceResult<()> {
        self.state()?.current = hz;
        Ok(())
    }

    fn set_performance_level(&self, domain: PerfDomain, level: PerfLevel) -> DeviceResult<()> {
        self.state()?.levels.insert(domain, level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_hand_has_full_joint_set() {
        let device = SimulatedDevice::full_rig("rig");
        let hand = device
            .get_hand_tracking(InputName::HandTrackingLeft, 42)
            .expect("hand");
        assert!(hand.is_active);
        assert_eq!(hand.joints.len(), HAND_JOINT_COUNT);
        assert_eq!(hand.sample_time_ns, 42);
    }

    #[test]
    fn body_joint_count_follows_input() {
        let device = SimulatedDevice::full_rig("rig");
        let body = device
            .get_body_joints(InputName::BodyTracking, 1)
            .expect("body");
        let full = device
            .get_body_joints(InputName::FullBodyTracking, 1)
            .expect("full body");
        assert_eq!(body.joints.len(), BODY_JOINT_COUNT);
        assert_eq!(full.joints.len(), FULL_BODY_JOINT_COUNT);
    }

    #[test]
    fn missing_input_is_a_failure() {
        let device = SimulatedDevice::headset("hmd");
        let err = device
            .get_tracked_pose(InputName::HandTrackingLeft, 0)
            .expect_err("no hand input");
        assert!(matches!(err, DeviceError::Failure(_)));
    }

    #[test]
    fn capabilities_gate_optional_queries() {
        let device = SimulatedDevice::headset("hmd");
        assert_eq!(
            device.get_face_tracking(InputName::EyeFaceTracking),
            Err(DeviceError::Unsupported("face tracking"))
        );
        assert!(device
            .set_body_tracking_fidelity(BodyTrackingFidelity::High)
            .is_err());
    }

    #[test]
    fn scripted_failure_applies_until_cleared() {
        let device = SimulatedDevice::full_rig("rig");
        device.set_failure(Some("unplugged".into())).expect("set");
        assert!(device.get_body_skeleton(InputName::BodyTracking).is_err());
        device.set_failure(None).expect("clear");
        assert!(device.get_body_skeleton(InputName::BodyTracking).is_ok());
    }

    #[test]
    fn compositor_tracks_requested_rate() {
        let compositor = SimulatedCompositor::new(vec![72.0, 90.0]);
        assert_eq!(compositor.current_refresh_rate(), 72.0);
        compositor.request_refresh_rate(90.0).expect("request");
        assert_eq!(compositor.current_refresh_rate(), 90.0);
    }
}
