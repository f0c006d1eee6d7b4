use bitflags::bitflags;
use euclid::{RigidTransform3D, Rotation3D, UnknownUnit, Vector3D};

pub type Pose = RigidTransform3D<f32, UnknownUnit, UnknownUnit>;
pub type Vec3 = Vector3D<f32, UnknownUnit>;
pub type Quat = Rotation3D<f32, UnknownUnit, UnknownUnit>;

bitflags! {
    /// Which components of a [`SpaceRelation`] carry meaningful data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RelationFlags: u32 {
        const ORIENTATION_VALID = 1 << 0;
        const POSITION_VALID = 1 << 1;
        const LINEAR_VELOCITY_VALID = 1 << 2;
        const ANGULAR_VELOCITY_VALID = 1 << 3;
        const ORIENTATION_TRACKED = 1 << 4;
        const POSITION_TRACKED = 1 << 5;
    }
}

impl RelationFlags {
    pub const LOCATION: RelationFlags = RelationFlags::ORIENTATION_VALID
        .union(RelationFlags::POSITION_VALID)
        .union(RelationFlags::ORIENTATION_TRACKED)
        .union(RelationFlags::POSITION_TRACKED);

    pub const VELOCITY: RelationFlags =
        RelationFlags::LINEAR_VELOCITY_VALID.union(RelationFlags::ANGULAR_VELOCITY_VALID);

    pub fn location(self) -> RelationFlags {
        self & RelationFlags::LOCATION
    }

    pub fn velocity(self) -> RelationFlags {
        self & RelationFlags::VELOCITY
    }
}

/// A pose of one frame expressed in another, with velocities expressed in the
/// outer frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceRelation {
    pub pose: Pose,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub flags: RelationFlags,
}

impl Default for SpaceRelation {
    fn default() -> Self {
        Self::untracked()
    }
}

impl SpaceRelation {
    /// Identity pose with no valid components.
    pub fn untracked() -> Self {
        Self {
            pose: Pose::identity(),
            linear_velocity: Vec3::zero(),
            angular_velocity: Vec3::zero(),
            flags: RelationFlags::empty(),
        }
    }

    /// A fixed transform: every component is known, velocities are zero.
    pub fn from_pose(pose: Pose) -> Self {
        Self {
            pose,
            linear_velocity: Vec3::zero(),
            angular_velocity: Vec3::zero(),
            flags: RelationFlags::all(),
        }
    }

    pub fn identity() -> Self {
        Self::from_pose(Pose::identity())
    }

    pub fn with_flags(mut self, flags: RelationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_velocities(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.flags.location().is_empty()
    }

    /// Composes `self` (a frame relative to some middle frame) with `outer`
    /// (that middle frame relative to a base), yielding the frame relative to
    /// the base. Validity is the intersection of both inputs.
    pub fn then(&self, outer: &SpaceRelation) -> SpaceRelation {
        let rotation = outer.pose.rotation;
        let offset = rotation.transform_vector3d(self.pose.translation);
        SpaceRelation {
            pose: self.pose.then(&outer.pose),
            linear_velocity: outer.linear_velocity
                + rotation.transform_vector3d(self.linear_velocity)
                + outer.angular_velocity.cross(offset),
            angular_velocity: outer.angular_velocity
                + rotation.transform_vector3d(self.angular_velocity),
            flags: self.flags & outer.flags,
        }
    }

    /// The base frame expressed in this relation's frame.
    pub fn inverse(&self) -> SpaceRelation {
        let inv_rotation = self.pose.rotation.inverse();
        let omega = self.angular_velocity;
        let position = self.pose.translation;
        SpaceRelation {
            pose: self.pose.inverse(),
            linear_velocity: inv_rotation
                .transform_vector3d(omega.cross(position) - self.linear_velocity),
            angular_velocity: -inv_rotation.transform_vector3d(omega),
            flags: self.flags,
        }
    }
}

/// Ordered relations, innermost first, resolved into a single relation.
#[derive(Debug, Clone, Default)]
pub struct RelationChain {
    steps: Vec<SpaceRelation>,
}

impl RelationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_relation(&mut self, relation: &SpaceRelation) -> &mut Self {
        self.steps.push(*relation);
        self
    }

    pub fn push_inverted_relation(&mut self, relation: &SpaceRelation) -> &mut Self {
        self.steps.push(relation.inverse());
        self
    }

    pub fn push_pose(&mut self, pose: &Pose) -> &mut Self {
        self.steps.push(SpaceRelation::from_pose(*pose));
        self
    }

    pub fn push_inverted_pose(&mut self, pose: &Pose) -> &mut Self {
        self.steps.push(SpaceRelation::from_pose(pose.inverse()));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// An empty chain resolves to an untracked identity.
    pub fn resolve(&self) -> SpaceRelation {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return SpaceRelation::untracked();
        };
        steps.fold(*first, |acc, step| acc.then(step))
    }
}

pub fn quat_from_axis_angle(axis: Vec3, radians: f32) -> Quat {
    let axis = axis.normalize();
    let (sin, cos) = (radians * 0.5).sin_cos();
    Quat::quaternion(axis.x * sin, axis.y * sin, axis.z * sin, cos)
}

pub fn pose_from_parts(rotation: Quat, translation: Vec3) -> Pose {
    Pose::new(rotation, translation)
}
