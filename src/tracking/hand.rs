//! Articulated hand tracking and finger force feedback.

use super::{clear_joint_flags, joint_in_base, query_failure, JointLocation, TrackerBinding};
use crate::device::{
    DeviceRole, ForceFeedbackCurl, ForceFeedbackLocation, InputName, HAND_JOINT_COUNT,
};
use crate::error::{XrError, XrResult};
use crate::extensions::Extension;
use crate::handle::{HandTrackerHandle, HandleObject, SessionHandle, SpaceHandle};
use crate::runtime::Instance;
use crate::space::relation::{RelationChain, RelationFlags, Vec3};
use crate::time::XrTime;
use crate::validate::{self, typed_struct, StructureType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Hand::Left),
            2 => Some(Hand::Right),
            _ => None,
        }
    }

    fn role(self) -> DeviceRole {
        match self {
            Hand::Left => DeviceRole::HandTrackingLeft,
            Hand::Right => DeviceRole::HandTrackingRight,
        }
    }

    fn input(self) -> InputName {
        match self {
            Hand::Left => InputName::HandTrackingLeft,
            Hand::Right => InputName::HandTrackingRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandJointSetKind {
    #[default]
    Default,
}

impl HandJointSetKind {
    pub fn joint_count(self) -> usize {
        match self {
            HandJointSetKind::Default => HAND_JOINT_COUNT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandTrackerCreateInfo {
    pub ty: StructureType,
    pub hand: Hand,
    pub hand_joint_set: HandJointSetKind,
}

impl HandTrackerCreateInfo {
    pub fn new(hand: Hand) -> Self {
        Self {
            ty: StructureType::HandTrackerCreateInfo,
            hand,
            hand_joint_set: HandJointSetKind::Default,
        }
    }
}

#[derive(Debug)]
pub struct HandTracker {
    binding: TrackerBinding,
    hand: Hand,
    joint_set: HandJointSetKind,
}

impl HandTracker {
    pub fn binding(&self) -> &TrackerBinding {
        &self.binding
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn joint_set(&self) -> HandJointSetKind {
        self.joint_set
    }

    pub(crate) fn finalize(&mut self) {
        self.binding.release();
    }
}

#[derive(Debug, Clone)]
pub struct HandJointsLocateInfo {
    pub ty: StructureType,
    pub base_space: SpaceHandle,
    pub time: XrTime,
}

impl HandJointsLocateInfo {
    pub fn new(base_space: SpaceHandle, time: XrTime) -> Self {
        Self {
            ty: StructureType::HandJointsLocateInfo,
            base_space,
            time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandJointVelocity {
    pub velocity_flags: RelationFlags,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for HandJointVelocity {
    fn default() -> Self {
        Self {
            velocity_flags: RelationFlags::empty(),
            linear_velocity: Vec3::zero(),
            angular_velocity: Vec3::zero(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandJointVelocities {
    pub ty: StructureType,
    pub joint_velocities: Vec<HandJointVelocity>,
}

impl HandJointVelocities {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            ty: StructureType::HandJointVelocities,
            joint_velocities: vec![HandJointVelocity::default(); count],
        }
    }
}

/// Output of [`Instance::locate_hand_joints`]. The joint buffer length is the
/// caller's capacity.
#[derive(Debug, Clone)]
pub struct HandJointLocations {
    pub ty: StructureType,
    pub is_active: bool,
    pub joint_locations: Vec<JointLocation>,
    pub velocities: Option<HandJointVelocities>,
}

impl HandJointLocations {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            ty: StructureType::HandJointLocations,
            is_active: false,
            joint_locations: vec![JointLocation::default(); count],
            velocities: None,
        }
    }

    pub fn with_velocities(mut self, count: usize) -> Self {
        self.velocities = Some(HandJointVelocities::with_capacity(count));
        self
    }

    fn mark_inactive(&mut self) {
        self.is_active = false;
        clear_joint_flags(&mut self.joint_locations);
        if let Some(velocities) = &mut self.velocities {
            for velocity in &mut velocities.joint_velocities {
                velocity.velocity_flags = RelationFlags::empty();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForceFeedbackCurlApplyLocations {
    pub ty: StructureType,
    pub locations: Vec<ForceFeedbackCurl>,
}

impl ForceFeedbackCurlApplyLocations {
    pub fn new(locations: impl IntoIterator<Item = (ForceFeedbackLocation, f32)>) -> Self {
        Self {
            ty: StructureType::ForceFeedbackCurlApplyLocations,
            locations: locations
                .into_iter()
                .map(|(location, value)| ForceFeedbackCurl { location, value })
                .collect(),
        }
    }
}

typed_struct!(
    HandTrackerCreateInfo => HandTrackerCreateInfo,
    HandJointsLocateInfo => HandJointsLocateInfo,
    HandJointLocations => HandJointLocations,
    HandJointVelocities => HandJointVelocities,
    ForceFeedbackCurlApplyLocations => ForceFeedbackCurlApplyLocations,
);

impl Instance {
    pub fn create_hand_tracker(
        &mut self,
        session: SessionHandle,
        info: Option<&HandTrackerCreateInfo>,
    ) -> XrResult<HandTrackerHandle> {
        const CALL: &str = "xrCreateHandTrackerEXT";
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "createInfo")?;
        validate::extension(CALL, &self.extensions, Extension::HandTracking)?;

        if !self.system.tracking().hand_tracking {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: "system does not support hand tracking".into(),
            });
        }

        let input = info.hand.input();
        let bound = match self.system.device_for(info.hand.role()) {
            Some(device) if device.capabilities().hand_tracking && device.has_input(input) => {
                Some(Arc::clone(device))
            }
            Some(device) => {
                log::warn!(
                    "[tracking] '{}' is bound to the {:?} hand but has no hand tracking input",
                    device.name(),
                    info.hand
                );
                None
            }
            None => {
                log::debug!("[tracking] no device bound to the {:?} hand", info.hand);
                None
            }
        };

        let tracker = HandTracker {
            binding: TrackerBinding::new(session, bound, input),
            hand: info.hand,
            joint_set: info.hand_joint_set,
        };
        let handle = self.allocate_tracker(
            CALL,
            session,
            format!("{:?} hand tracker", info.hand),
            HandleObject::HandTracker(tracker),
        )?;
        Ok(HandTrackerHandle::from_raw(handle))
    }

    /// Same as [`Instance::create_hand_tracker`] for callers holding the wire
    /// value of the hand.
    pub fn create_hand_tracker_raw(
        &mut self,
        session: SessionHandle,
        hand: u32,
    ) -> XrResult<HandTrackerHandle> {
        const CALL: &str = "xrCreateHandTrackerEXT";
        self.live_session(CALL, session)?;
        let hand = Hand::from_raw(hand)
            .ok_or_else(|| validate::failure(CALL, format!("invalid hand value {hand}")))?;
        self.create_hand_tracker(session, Some(&HandTrackerCreateInfo::new(hand)))
    }

    pub fn destroy_hand_tracker(&mut self, tracker: HandTrackerHandle) -> XrResult<()> {
        const CALL: &str = "xrDestroyHandTrackerEXT";
        self.registry.hand_tracker(CALL, tracker)?;
        self.registry.destroy(CALL, tracker.raw())?;
        Ok(())
    }

    pub fn locate_hand_joints(
        &self,
        tracker: HandTrackerHandle,
        info: Option<&HandJointsLocateInfo>,
        locations: Option<&mut HandJointLocations>,
    ) -> XrResult<()> {
        const CALL: &str = "xrLocateHandJointsEXT";
        let found = self.registry.hand_tracker(CALL, tracker)?;
        let session = found.binding.session();
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "locateInfo")?;
        let locations = validate::arg_type_mut(CALL, locations, "locations")?;
        validate::extension(CALL, &self.extensions, Extension::HandTracking)?;
        let base = self.session_space(CALL, info.base_space, session)?;
        validate::time(CALL, info.time)?;

        let joint_count = found.joint_set.joint_count();
        validate::exact_count(
            CALL,
            "joint count",
            joint_count,
            locations.joint_locations.len(),
        )?;
        if let Some(velocities) = &locations.velocities {
            if velocities.ty != StructureType::HandJointVelocities {
                return Err(validate::failure(
                    CALL,
                    format!(
                        "(velocities->type == {:?}) expected HandJointVelocities",
                        velocities.ty
                    ),
                ));
            }
            if velocities.joint_velocities.is_empty() {
                return Err(validate::failure(
                    CALL,
                    "velocities joint count must be > 0",
                ));
            }
            validate::exact_count(
                CALL,
                "velocities joint count",
                joint_count,
                velocities.joint_velocities.len(),
            )?;
        }

        let Some(device) = found.binding.device() else {
            locations.mark_inactive();
            return Ok(());
        };

        let at_ns = self.clock.ts_to_monotonic_ns(info.time);
        let set = device
            .get_hand_tracking(found.binding.input(), at_ns)
            .map_err(|err| query_failure(CALL, "hand joints", err))?;
        let base_in_origin = self.space_in_origin(CALL, base, at_ns)?;

        let mut chain = RelationChain::new();
        chain
            .push_relation(&set.hand_pose)
            .push_inverted_relation(&base_in_origin);
        let hand_in_base = chain.resolve();

        if !set.is_active || !hand_in_base.is_valid() || set.joints.len() < joint_count {
            locations.mark_inactive();
            return Ok(());
        }

        locations.is_active = true;
        for (index, joint) in set.joints.iter().take(joint_count).enumerate() {
            let located = joint_in_base(&joint.relation, &hand_in_base);
            locations.joint_locations[index] = JointLocation {
                location_flags: located.flags.location(),
                pose: located.pose,
                radius: joint.radius,
            };
            if let Some(velocities) = &mut locations.velocities {
                velocities.joint_velocities[index] = HandJointVelocity {
                    velocity_flags: located.flags.velocity(),
                    linear_velocity: located.linear_velocity,
                    angular_velocity: located.angular_velocity,
                };
            }
        }
        Ok(())
    }

    /// Forwards finger curl values to the tracker's device. A tracker without
    /// a device accepts the call and does nothing.
    pub fn apply_force_feedback_curl(
        &self,
        tracker: HandTrackerHandle,
        locations: Option<&ForceFeedbackCurlApplyLocations>,
    ) -> XrResult<()> {
        const CALL: &str = "xrApplyForceFeedbackCurlMNDX";
        let found = self.registry.hand_tracker(CALL, tracker)?;
        self.live_session(CALL, found.binding.session())?;
        let locations = validate::arg_type(CALL, locations, "locations")?;
        validate::extension(CALL, &self.extensions, Extension::ForceFeedbackCurl)?;
        for curl in &locations.locations {
            validate::unit_interval(CALL, &format!("{:?} curl", curl.location), curl.value)?;
        }

        let Some(device) = found.binding.device() else {
            log::debug!("[tracking] {:?} hand has no device, curl ignored", found.hand);
            return Ok(());
        };
        device
            .set_force_feedback(found.binding.input(), &locations.locations)
            .map_err(|err| err.into_xr(CALL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_hand_values() {
        assert_eq!(Hand::from_raw(1), Some(Hand::Left));
        assert_eq!(Hand::from_raw(2), Some(Hand::Right));
        assert_eq!(Hand::from_raw(0), None);
        assert_eq!(Hand::from_raw(3), None);
    }

    #[test]
    fn hands_map_to_their_own_role_and_input() {
        assert_eq!(Hand::Left.role(), DeviceRole::HandTrackingLeft);
        assert_eq!(Hand::Right.input(), InputName::HandTrackingRight);
    }

    #[test]
    fn inactive_clears_velocity_flags_too() {
        let mut locations = HandJointLocations::with_capacity(2).with_velocities(2);
        locations.is_active = true;
        locations.joint_locations[0].location_flags = RelationFlags::all();
        if let Some(velocities) = &mut locations.velocities {
            velocities.joint_velocities[1].velocity_flags = RelationFlags::all();
        }
        locations.mark_inactive();
        assert!(!locations.is_active);
        assert!(locations.joint_locations[0].location_flags.is_empty());
        let velocities = locations.velocities.unwrap();
        assert!(velocities.joint_velocities[1].velocity_flags.is_empty());
    }
}
