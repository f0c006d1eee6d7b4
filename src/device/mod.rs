pub mod simulated;

use crate::error::XrError;
use crate::session::display::{PerfDomain, PerfLevel};
use crate::space::relation::{Pose, SpaceRelation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use simulated::{SimulatedCompositor, SimulatedDevice};

pub const HAND_JOINT_COUNT: usize = 26;
pub const BODY_JOINT_COUNT: usize = 70;
pub const FULL_BODY_JOINT_COUNT: usize = 84;
pub const EYE_EXPRESSION_COUNT: usize = 14;
pub const LIP_EXPRESSION_COUNT: usize = 37;

/// Named inputs a device can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputName {
    HeadPose,
    HandTrackingLeft,
    HandTrackingRight,
    BodyTracking,
    FullBodyTracking,
    EyeFaceTracking,
    LipFaceTracking,
}

/// Functions a device may serve. Devices are bound to roles per system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceRole {
    Head,
    HandTrackingLeft,
    HandTrackingRight,
    Body,
    Face,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub hand_tracking: bool,
    pub force_feedback: bool,
    pub body_tracking: bool,
    pub full_body_tracking: bool,
    pub body_tracking_fidelity: bool,
    pub face_tracking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyTrackingFidelity {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandJoint {
    /// Joint relative to the hand pose.
    pub relation: SpaceRelation,
    pub radius: f32,
}

#[derive(Debug, Clone)]
pub struct HandJointSet {
    pub is_active: bool,
    pub sample_time_ns: u64,
    /// Hand relative to the device tracking origin.
    pub hand_pose: SpaceRelation,
    pub joints: Vec<HandJoint>,
}

#[derive(Debug, Clone)]
pub struct BodyJointSet {
    pub is_active: bool,
    pub sample_time_ns: u64,
    pub confidence: f32,
    pub skeleton_changed_count: u32,
    pub fidelity: BodyTrackingFidelity,
    /// Joints relative to the body device pose.
    pub joints: Vec<SpaceRelation>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonJoint {
    pub pose: Pose,
    pub joint: u32,
    pub parent_joint: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RestSkeleton {
    pub joints: Vec<SkeletonJoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacialExpressionSet {
    pub is_active: bool,
    pub sample_time_ns: u64,
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceFeedbackLocation {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceFeedbackCurl {
    pub location: ForceFeedbackLocation,
    pub value: f32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device does not implement {0}")]
    Unsupported(&'static str),
    #[error("device failure: {0}")]
    Failure(String),
}

impl DeviceError {
    /// Surfaces a collaborator error at the entrypoint boundary.
    pub(crate) fn into_xr(self, call: &'static str) -> XrError {
        let err = match self {
            DeviceError::Unsupported(what) => XrError::FeatureUnsupported {
                call,
                reason: format!("device does not implement {what}"),
            },
            DeviceError::Failure(reason) => XrError::RuntimeFailure { call, reason },
        };
        log::warn!("[device] {err}");
        err
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Collaborator contract for tracked hardware.
///
/// All relations are expressed relative to the device's tracking origin at the
/// requested monotonic time.
pub trait XrDevice: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn inputs(&self) -> &[InputName];

    fn capabilities(&self) -> DeviceCapabilities;

    fn has_input(&self, input: InputName) -> bool {
        self.inputs().contains(&input)
    }

    fn get_tracked_pose(&self, input: InputName, at_ns: u64) -> DeviceResult<SpaceRelation>;

    fn get_hand_tracking(&self, _input: InputName, _at_ns: u64) -> DeviceResult<HandJointSet> {
        Err(DeviceError::Unsupported("hand tracking"))
    }

    fn get_body_joints(&self, _input: InputName, _at_ns: u64) -> DeviceResult<BodyJointSet> {
        Err(DeviceError::Unsupported("body joints"))
    }

    fn get_body_skeleton(&self, _input: InputName) -> DeviceResult<RestSkeleton> {
        Err(DeviceError::Unsupported("body skeleton"))
    }

    fn get_face_tracking(&self, _input: InputName) -> DeviceResult<FacialExpressionSet> {
        Err(DeviceError::Unsupported("face tracking"))
    }

    fn set_body_tracking_fidelity(&self, _fidelity: BodyTrackingFidelity) -> DeviceResult<()> {
        Err(DeviceError::Unsupported("body tracking fidelity"))
    }

    fn set_force_feedback(
        &self,
        _input: InputName,
        _curls: &[ForceFeedbackCurl],
    ) -> DeviceResult<()> {
        Err(DeviceError::Unsupported("force feedback"))
    }
}

/// Display and system-control collaborator. Absent on headless systems.
pub trait SystemCompositor: Send + Sync + fmt::Debug {
    fn refresh_rates(&self) -> Vec<f32>;

    fn current_refresh_rate(&self) -> f32;

    fn request_refresh_rate(&self, hz: f32) -> DeviceResult<()>;

    fn set_performance_level(&self, _domain: PerfDomain, _level: PerfLevel) -> DeviceResult<()> {
        Ok(())
    }
}

/// Role bindings of one system. Rebinding a role never touches trackers that
/// already captured the previous device.
#[derive(Debug, Clone, Default)]
pub struct DeviceRoles {
    bindings: BTreeMap<DeviceRole, Arc<dyn XrDevice>>,
}

impl DeviceRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, role: DeviceRole, device: Arc<dyn XrDevice>) -> Option<Arc<dyn XrDevice>> {
        log::info!("[device] role {role:?} bound to '{}'", device.name());
        self.bindings.insert(role, device)
    }

    pub fn unbind(&mut self, role: DeviceRole) -> Option<Arc<dyn XrDevice>> {
        log::info!("[device] role {role:?} unbound");
        self.bindings.remove(&role)
    }

    pub fn get(&self, role: DeviceRole) -> Option<&Arc<dyn XrDevice>> {
        self.bindings.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceRole, &Arc<dyn XrDevice>)> {
        self.bindings.iter().map(|(role, device)| (*role, device))
    }
}
