//! Body tracking: joint locations, the rest-pose skeleton and fidelity
//! requests.

use super::{clear_joint_flags, joint_in_base, query_failure, JointLocation, TrackerBinding};
use crate::device::{
    BodyTrackingFidelity, DeviceRole, InputName, SkeletonJoint, XrDevice, BODY_JOINT_COUNT,
    FULL_BODY_JOINT_COUNT,
};
use crate::error::{XrError, XrResult};
use crate::extensions::Extension;
use crate::handle::{BodyTrackerHandle, HandleObject, SessionHandle, SpaceHandle};
use crate::runtime::Instance;
use crate::space::relation::{Pose, RelationChain};
use crate::time::XrTime;
use crate::validate::{self, typed_struct, StructureType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyJointSetKind {
    #[default]
    Default,
    FullBody,
}

impl BodyJointSetKind {
    pub fn joint_count(self) -> usize {
        match self {
            BodyJointSetKind::Default => BODY_JOINT_COUNT,
            BodyJointSetKind::FullBody => FULL_BODY_JOINT_COUNT,
        }
    }

    fn input(self) -> InputName {
        match self {
            BodyJointSetKind::Default => InputName::BodyTracking,
            BodyJointSetKind::FullBody => InputName::FullBodyTracking,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyTrackerCreateInfo {
    pub ty: StructureType,
    pub body_joint_set: BodyJointSetKind,
}

impl BodyTrackerCreateInfo {
    pub fn new(body_joint_set: BodyJointSetKind) -> Self {
        Self {
            ty: StructureType::BodyTrackerCreateInfo,
            body_joint_set,
        }
    }
}

#[derive(Debug)]
pub struct BodyTracker {
    binding: TrackerBinding,
    joint_set: BodyJointSetKind,
}

impl BodyTracker {
    pub fn binding(&self) -> &TrackerBinding {
        &self.binding
    }

    pub fn joint_set(&self) -> BodyJointSetKind {
        self.joint_set
    }

    pub(crate) fn finalize(&mut self) {
        self.binding.release();
    }
}

#[derive(Debug, Clone)]
pub struct BodyJointsLocateInfo {
    pub ty: StructureType,
    pub base_space: SpaceHandle,
    pub time: XrTime,
}

impl BodyJointsLocateInfo {
    pub fn new(base_space: SpaceHandle, time: XrTime) -> Self {
        Self {
            ty: StructureType::BodyJointsLocateInfo,
            base_space,
            time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyJointLocations {
    pub ty: StructureType,
    pub is_active: bool,
    pub confidence: f32,
    pub skeleton_changed_count: u32,
    /// Sample time of the joints, in caller time.
    pub time: XrTime,
    pub joint_locations: Vec<JointLocation>,
}

impl BodyJointLocations {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            ty: StructureType::BodyJointLocations,
            is_active: false,
            confidence: 0.0,
            skeleton_changed_count: 0,
            time: 0,
            joint_locations: vec![JointLocation::default(); count],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyTrackingFidelityStatus {
    pub ty: StructureType,
    pub fidelity: BodyTrackingFidelity,
}

impl Default for BodyTrackingFidelityStatus {
    fn default() -> Self {
        Self {
            ty: StructureType::BodyTrackingFidelityStatus,
            fidelity: BodyTrackingFidelity::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodySkeleton {
    pub ty: StructureType,
    pub joints: Vec<SkeletonJoint>,
}

impl BodySkeleton {
    pub fn with_capacity(count: usize) -> Self {
        let unset = SkeletonJoint {
            pose: Pose::identity(),
            joint: 0,
            parent_joint: 0,
        };
        Self {
            ty: StructureType::BodySkeleton,
            joints: vec![unset; count],
        }
    }
}

typed_struct!(
    BodyTrackerCreateInfo => BodyTrackerCreateInfo,
    BodyJointsLocateInfo => BodyJointsLocateInfo,
    BodyJointLocations => BodyJointLocations,
    BodyTrackingFidelityStatus => BodyTrackingFidelityStatus,
    BodySkeleton => BodySkeleton,
);

impl Instance {
    pub fn create_body_tracker(
        &mut self,
        session: SessionHandle,
        info: Option<&BodyTrackerCreateInfo>,
    ) -> XrResult<BodyTrackerHandle> {
        const CALL: &str = "xrCreateBodyTrackerFB";
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "createInfo")?;
        validate::extension(CALL, &self.extensions, Extension::BodyTracking)?;
        let full_body = info.body_joint_set == BodyJointSetKind::FullBody;
        if full_body {
            validate::extension(CALL, &self.extensions, Extension::FullBodyTracking)?;
        }

        let tracking = self.system.tracking();
        if !tracking.body_tracking {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: "system does not support body tracking".into(),
            });
        }
        if full_body && !tracking.full_body_tracking {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: "system does not support full body tracking".into(),
            });
        }

        let input = info.body_joint_set.input();
        let device = self.role_device(CALL, DeviceRole::Body, "body tracking", |caps| {
            caps.body_tracking && (!full_body || caps.full_body_tracking)
        })?;
        if !device.has_input(input) {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: format!("device '{}' has no {input:?} input", device.name()),
            });
        }

        let tracker = BodyTracker {
            binding: TrackerBinding::new(session, Some(device), input),
            joint_set: info.body_joint_set,
        };
        let handle = self.allocate_tracker(
            CALL,
            session,
            format!("{:?} body tracker", info.body_joint_set),
            HandleObject::BodyTracker(tracker),
        )?;
        Ok(BodyTrackerHandle::from_raw(handle))
    }

    pub fn destroy_body_tracker(&mut self, tracker: BodyTrackerHandle) -> XrResult<()> {
        const CALL: &str = "xrDestroyBodyTrackerFB";
        self.registry.body_tracker(CALL, tracker)?;
        self.registry.destroy(CALL, tracker.raw())?;
        Ok(())
    }

    /// Locates every joint of the tracker's set in the base space. When
    /// `fidelity` is given the device's current fidelity is reported too.
    pub fn locate_body_joints(
        &self,
        tracker: BodyTrackerHandle,
        info: Option<&BodyJointsLocateInfo>,
        locations: Option<&mut BodyJointLocations>,
        fidelity: Option<&mut BodyTrackingFidelityStatus>,
    ) -> XrResult<()> {
        const CALL: &str = "xrLocateBodyJointsFB";
        let found = self.registry.body_tracker(CALL, tracker)?;
        let session = found.binding.session();
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "locateInfo")?;
        let locations = validate::arg_type_mut(CALL, locations, "locations")?;
        let fidelity = match fidelity {
            Some(status) => Some(validate::arg_type_mut(CALL, Some(status), "fidelityStatus")?),
            None => None,
        };
        validate::extension(CALL, &self.extensions, Extension::BodyTracking)?;
        let base = self.session_space(CALL, info.base_space, session)?;

        let joint_count = found.joint_set.joint_count();
        validate::capacity(CALL, joint_count, locations.joint_locations.len())?;
        validate::time(CALL, info.time)?;

        let Some(device) = found.binding.device() else {
            return Err(XrError::FunctionUnsupported {
                call: CALL,
                reason: "tracker has no body tracking device".into(),
            });
        };
        if fidelity.is_some() {
            self.check_fidelity_support(CALL, device.as_ref())?;
        }

        let input = found.binding.input();
        let at_ns = self.clock.ts_to_monotonic_ns(info.time);
        let set = device
            .get_body_joints(input, at_ns)
            .map_err(|err| query_failure(CALL, "body joint set", err))?;
        let body_in_origin = device
            .get_tracked_pose(input, at_ns)
            .map_err(|err| query_failure(CALL, "body pose", err))?;
        let base_in_origin = self.space_in_origin(CALL, base, at_ns)?;

        let mut chain = RelationChain::new();
        chain
            .push_relation(&body_in_origin)
            .push_inverted_relation(&base_in_origin);
        let body_in_base = chain.resolve();

        if !set.is_active || !body_in_base.is_valid() || set.joints.len() < joint_count {
            locations.is_active = false;
            clear_joint_flags(&mut locations.joint_locations);
            return Ok(());
        }

        locations.is_active = true;
        locations.time = self.clock.monotonic_to_ts(set.sample_time_ns);
        locations.confidence = set.confidence;
        locations.skeleton_changed_count = set.skeleton_changed_count;
        for (location, joint) in locations
            .joint_locations
            .iter_mut()
            .zip(set.joints.iter().take(joint_count))
        {
            let located = joint_in_base(joint, &body_in_base);
            *location = JointLocation {
                location_flags: located.flags.location(),
                pose: located.pose,
                radius: 0.0,
            };
        }
        if let Some(status) = fidelity {
            status.fidelity = set.fidelity;
        }
        Ok(())
    }

    /// Writes the device's rest-pose skeleton into the leading entries of
    /// `skeleton.joints`, which must hold the tracker's whole joint set.
    pub fn get_body_skeleton(
        &self,
        tracker: BodyTrackerHandle,
        skeleton: Option<&mut BodySkeleton>,
    ) -> XrResult<()> {
        const CALL: &str = "xrGetBodySkeletonFB";
        let found = self.registry.body_tracker(CALL, tracker)?;
        self.live_session(CALL, found.binding.session())?;
        let skeleton = validate::arg_type_mut(CALL, skeleton, "skeleton")?;
        validate::extension(CALL, &self.extensions, Extension::BodyTracking)?;

        let Some(device) = found.binding.device() else {
            return Err(XrError::FunctionUnsupported {
                call: CALL,
                reason: "tracker has no body tracking device".into(),
            });
        };
        let joint_count = found.joint_set.joint_count();
        validate::capacity(CALL, joint_count, skeleton.joints.len())?;

        let rest = device
            .get_body_skeleton(found.binding.input())
            .map_err(|err| query_failure(CALL, "body skeleton", err))?;
        if rest.joints.len() < joint_count {
            return Err(XrError::RuntimeFailure {
                call: CALL,
                reason: format!(
                    "device skeleton has {} joints, expected {joint_count}",
                    rest.joints.len()
                ),
            });
        }
        for (output, joint) in skeleton.joints.iter_mut().zip(rest.joints) {
            *output = joint;
        }
        Ok(())
    }

    pub fn request_body_tracking_fidelity(
        &self,
        tracker: BodyTrackerHandle,
        fidelity: BodyTrackingFidelity,
    ) -> XrResult<()> {
        const CALL: &str = "xrRequestBodyTrackingFidelityMETA";
        let found = self.registry.body_tracker(CALL, tracker)?;
        self.live_session(CALL, found.binding.session())?;
        validate::extension(CALL, &self.extensions, Extension::BodyTrackingFidelity)?;

        let Some(device) = found.binding.device() else {
            return Err(XrError::FunctionUnsupported {
                call: CALL,
                reason: "tracker has no body tracking device".into(),
            });
        };
        self.check_fidelity_support(CALL, device.as_ref())?;
        device
            .set_body_tracking_fidelity(fidelity)
            .map_err(|err| err.into_xr(CALL))?;
        log::debug!("[tracking] body fidelity {fidelity:?} requested");
        Ok(())
    }

    /// Fidelity needs its extension, system support and a capable device.
    fn check_fidelity_support(&self, call: &'static str, device: &dyn XrDevice) -> XrResult<()> {
        validate::extension(call, &self.extensions, Extension::BodyTrackingFidelity)?;
        if !self.system.tracking().body_tracking_fidelity {
            return Err(XrError::FeatureUnsupported {
                call,
                reason: "system does not support body tracking fidelity".into(),
            });
        }
        if !device.capabilities().body_tracking_fidelity {
            return Err(XrError::FeatureUnsupported {
                call,
                reason: format!("device '{}' does not support fidelity", device.name()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_sets_select_input_and_count() {
        assert_eq!(BodyJointSetKind::Default.joint_count(), 70);
        assert_eq!(BodyJointSetKind::FullBody.joint_count(), 84);
        assert_eq!(BodyJointSetKind::FullBody.input(), InputName::FullBodyTracking);
    }

    #[test]
    fn skeleton_buffer_is_presized() {
        let skeleton = BodySkeleton::with_capacity(BODY_JOINT_COUNT);
        assert_eq!(skeleton.joints.len(), BODY_JOINT_COUNT);
        assert_eq!(skeleton.ty, StructureType::BodySkeleton);
    }
}
