pub mod relation;

use crate::device::InputName;
use crate::error::XrResult;
use crate::handle::{HandleObject, SessionHandle, SpaceHandle};
use crate::runtime::Instance;
use crate::time::XrTime;
use crate::two_call;
use crate::validate::{self, typed_struct, StructureType};
use relation::{Pose, RelationChain, RelationFlags, SpaceRelation, Vec3};
use serde::{Deserialize, Serialize};

const POSE_NORMALIZATION_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSpaceType {
    View,
    Local,
    Stage,
}

#[derive(Debug, Clone)]
pub struct ReferenceSpaceCreateInfo {
    pub ty: StructureType,
    pub reference_space_type: ReferenceSpaceType,
    pub pose_in_reference_space: Pose,
}

impl ReferenceSpaceCreateInfo {
    pub fn new(reference_space_type: ReferenceSpaceType, pose_in_reference_space: Pose) -> Self {
        Self {
            ty: StructureType::ReferenceSpaceCreateInfo,
            reference_space_type,
            pose_in_reference_space,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceVelocity {
    pub velocity_flags: RelationFlags,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

#[derive(Debug, Clone)]
pub struct SpaceLocation {
    pub ty: StructureType,
    pub location_flags: RelationFlags,
    pub pose: Pose,
    /// Filled in when present.
    pub velocity: Option<SpaceVelocity>,
}

impl Default for SpaceLocation {
    fn default() -> Self {
        Self {
            ty: StructureType::SpaceLocation,
            location_flags: RelationFlags::empty(),
            pose: Pose::identity(),
            velocity: None,
        }
    }
}

impl SpaceLocation {
    pub fn with_velocity() -> Self {
        Self {
            velocity: Some(SpaceVelocity {
                velocity_flags: RelationFlags::empty(),
                linear_velocity: Vec3::zero(),
                angular_velocity: Vec3::zero(),
            }),
            ..Self::default()
        }
    }

    fn write(&mut self, relation: &SpaceRelation) {
        self.location_flags = relation.flags.location();
        self.pose = relation.pose;
        if let Some(velocity) = &mut self.velocity {
            velocity.velocity_flags = relation.flags.velocity();
            velocity.linear_velocity = relation.linear_velocity;
            velocity.angular_velocity = relation.angular_velocity;
        }
    }
}

typed_struct!(ReferenceSpaceCreateInfo => ReferenceSpaceCreateInfo, SpaceLocation => SpaceLocation);

/// A reference frame owned by a session.
#[derive(Debug)]
pub struct Space {
    session: SessionHandle,
    kind: ReferenceSpaceType,
    offset: Pose,
}

impl Space {
    pub fn new(session: SessionHandle, kind: ReferenceSpaceType, offset: Pose) -> Self {
        Self {
            session,
            kind,
            offset,
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.session
    }

    pub fn kind(&self) -> ReferenceSpaceType {
        self.kind
    }

    pub fn offset(&self) -> Pose {
        self.offset
    }

    pub(crate) fn finalize(&mut self) {
        log::trace!("[space] releasing {:?} space", self.kind);
    }
}

fn pose_is_normalized(pose: &Pose) -> bool {
    let q = pose.rotation;
    let norm = (q.i * q.i + q.j * q.j + q.k * q.k + q.r * q.r).sqrt();
    (norm - 1.0).abs() <= POSE_NORMALIZATION_TOLERANCE
}

impl Instance {
    pub fn enumerate_reference_spaces(
        &self,
        session: SessionHandle,
        output: &mut [ReferenceSpaceType],
    ) -> XrResult<usize> {
        const CALL: &str = "xrEnumerateReferenceSpaces";
        self.live_session(CALL, session)?;
        Ok(two_call::fill(&self.system.reference_spaces(), output))
    }

    pub fn create_reference_space(
        &mut self,
        session: SessionHandle,
        info: Option<&ReferenceSpaceCreateInfo>,
    ) -> XrResult<SpaceHandle> {
        const CALL: &str = "xrCreateReferenceSpace";
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "createInfo")?;

        if !self
            .system
            .reference_spaces()
            .contains(&info.reference_space_type)
        {
            return Err(validate::failure(
                CALL,
                format!(
                    "(createInfo->referenceSpaceType == {:?}) unsupported",
                    info.reference_space_type
                ),
            ));
        }
        if !pose_is_normalized(&info.pose_in_reference_space) {
            return Err(validate::failure(
                CALL,
                "(createInfo->poseInReferenceSpace.orientation) is not normalized",
            ));
        }

        let space = Space::new(
            session,
            info.reference_space_type,
            info.pose_in_reference_space,
        );
        let handle = self.registry.allocate(
            CALL,
            Some(session.raw()),
            format!("{:?} space", info.reference_space_type),
            HandleObject::Space(space),
        )?;
        Ok(SpaceHandle::from_raw(handle))
    }

    pub fn destroy_space(&mut self, space: SpaceHandle) -> XrResult<()> {
        const CALL: &str = "xrDestroySpace";
        self.registry.space(CALL, space)?;
        self.registry.destroy(CALL, space.raw())?;
        Ok(())
    }

    /// Locates `space` relative to `base_space` at `time`.
    pub fn locate_space(
        &self,
        space: SpaceHandle,
        base_space: SpaceHandle,
        time: XrTime,
        location: Option<&mut SpaceLocation>,
    ) -> XrResult<()> {
        const CALL: &str = "xrLocateSpace";
        let located = self.registry.space(CALL, space)?;
        self.live_session(CALL, located.session())?;
        let base = self.session_space(CALL, base_space, located.session())?;
        let location = validate::arg_type_mut(CALL, location, "location")?;
        validate::time(CALL, time)?;

        let at_ns = self.clock.ts_to_monotonic_ns(time);
        let mut chain = RelationChain::new();
        chain
            .push_relation(&self.space_in_origin(CALL, located, at_ns)?)
            .push_inverted_relation(&self.space_in_origin(CALL, base, at_ns)?);
        location.write(&chain.resolve());
        Ok(())
    }

    /// Looks up a space that must belong to `session`.
    pub(crate) fn session_space(
        &self,
        call: &'static str,
        space: SpaceHandle,
        session: SessionHandle,
    ) -> XrResult<&Space> {
        let found = self.registry.space(call, space)?;
        if found.session() != session {
            return Err(validate::failure(
                call,
                format!("{} belongs to a different session", space.raw()),
            ));
        }
        Ok(found)
    }

    /// The space's pose relative to the system tracking origin.
    pub(crate) fn space_in_origin(
        &self,
        call: &'static str,
        space: &Space,
        at_ns: u64,
    ) -> XrResult<SpaceRelation> {
        let mut chain = RelationChain::new();
        chain.push_pose(&space.offset());
        match space.kind() {
            ReferenceSpaceType::Local => {}
            ReferenceSpaceType::Stage => {
                chain.push_pose(&self.system.stage_origin());
            }
            ReferenceSpaceType::View => {
                chain.push_relation(&self.head_relation(call, at_ns)?);
            }
        }
        Ok(chain.resolve())
    }

    /// The head device's pose in the tracking origin; untracked without one.
    pub(crate) fn head_relation(&self, call: &'static str, at_ns: u64) -> XrResult<SpaceRelation> {
        match self.system.head_device() {
            Some(device) => device
                .get_tracked_pose(InputName::HeadPose, at_ns)
                .map_err(|err| err.into_xr(call)),
            None => Ok(SpaceRelation::untracked()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relation::{pose_from_parts, quat_from_axis_angle};

    #[test]
    fn unit_orientation_is_accepted() {
        let pose = pose_from_parts(
            quat_from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.2),
            Vec3::new(1.0, 2.0, 3.0),
        );
        assert!(pose_is_normalized(&pose));
    }

    #[test]
    fn zero_orientation_is_rejected() {
        let pose = Pose::new(relation::Quat::quaternion(0.0, 0.0, 0.0, 0.0), Vec3::zero());
        assert!(!pose_is_normalized(&pose));
    }

    #[test]
    fn location_copies_flags_by_component() {
        let relation = SpaceRelation::identity().with_flags(
            RelationFlags::ORIENTATION_VALID | RelationFlags::LINEAR_VELOCITY_VALID,
        );
        let mut location = SpaceLocation::with_velocity();
        location.write(&relation);
        assert_eq!(location.location_flags, RelationFlags::ORIENTATION_VALID);
        let velocity = location.velocity.expect("velocity requested");
        assert_eq!(velocity.velocity_flags, RelationFlags::LINEAR_VELOCITY_VALID);
    }
}
