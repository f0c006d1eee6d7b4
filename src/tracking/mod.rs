//! Tracked-entity trackers: hand, body and face.
//!
//! Every tracker is a child handle of its session. The device serving the
//! tracker's role is resolved once at creation; later role changes do not
//! reach existing trackers.

pub mod body;
pub mod face;
pub mod hand;

use crate::device::{DeviceCapabilities, DeviceError, DeviceRole, InputName, XrDevice};
use crate::error::{XrError, XrResult};
use crate::handle::{Handle, HandleObject, SessionHandle};
use crate::runtime::Instance;
use crate::space::relation::{Pose, RelationChain, RelationFlags, SpaceRelation};
use std::sync::Arc;

/// The device and input a tracker was bound to at creation.
#[derive(Debug, Clone)]
pub struct TrackerBinding {
    session: SessionHandle,
    device: Option<Arc<dyn XrDevice>>,
    input: InputName,
}

impl TrackerBinding {
    pub(crate) fn new(
        session: SessionHandle,
        device: Option<Arc<dyn XrDevice>>,
        input: InputName,
    ) -> Self {
        Self {
            session,
            device,
            input,
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.session
    }

    pub fn device(&self) -> Option<&Arc<dyn XrDevice>> {
        self.device.as_ref()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.as_deref().map(|device| device.name())
    }

    pub fn input(&self) -> InputName {
        self.input
    }

    /// Drops the device reference; the tracker is about to be reclaimed.
    pub(crate) fn release(&mut self) {
        self.device = None;
    }
}

/// A joint pose in the caller's base space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLocation {
    pub location_flags: RelationFlags,
    pub pose: Pose,
    pub radius: f32,
}

impl Default for JointLocation {
    fn default() -> Self {
        Self {
            location_flags: RelationFlags::empty(),
            pose: Pose::identity(),
            radius: 0.0,
        }
    }
}

/// Writes an inactive result: every joint keeps its pose, none is valid.
fn clear_joint_flags(joints: &mut [JointLocation]) {
    for joint in joints {
        joint.location_flags = RelationFlags::empty();
    }
}

/// `joint` is relative to `parent`, which is already expressed in the base
/// space.
fn joint_in_base(joint: &SpaceRelation, parent_in_base: &SpaceRelation) -> SpaceRelation {
    let mut chain = RelationChain::new();
    chain.push_relation(joint).push_relation(parent_in_base);
    chain.resolve()
}

/// Collaborator failures during a query are reported as runtime failures.
fn query_failure(call: &'static str, what: &str, err: DeviceError) -> XrError {
    log::warn!("[tracking] {call}: {what}: {err}");
    XrError::RuntimeFailure {
        call,
        reason: format!("failed to get {what}: {err}"),
    }
}

impl Instance {
    /// The device bound to `role`, which must report `supported`.
    pub(crate) fn role_device(
        &self,
        call: &'static str,
        role: DeviceRole,
        what: &str,
        supported: impl Fn(&DeviceCapabilities) -> bool,
    ) -> XrResult<Arc<dyn XrDevice>> {
        let Some(device) = self.system.device_for(role) else {
            return Err(XrError::FeatureUnsupported {
                call,
                reason: format!("no device found for {role:?} role"),
            });
        };
        if !supported(&device.capabilities()) {
            return Err(XrError::FeatureUnsupported {
                call,
                reason: format!("device '{}' does not support {what}", device.name()),
            });
        }
        Ok(Arc::clone(device))
    }

    pub(crate) fn allocate_tracker(
        &mut self,
        call: &'static str,
        session: SessionHandle,
        name: String,
        object: HandleObject,
    ) -> XrResult<Handle> {
        let handle = self
            .registry
            .allocate(call, Some(session.raw()), name, object)?;
        log::debug!("[tracking] {call} -> {handle}");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::relation::tests::relation_close;
    use crate::space::relation::Vec3;

    #[test]
    fn joint_is_carried_into_base() {
        let parent = SpaceRelation::from_pose(Pose::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        let joint = SpaceRelation::from_pose(Pose::from_translation(Vec3::new(0.1, 0.0, 0.0)));
        let expected =
            SpaceRelation::from_pose(Pose::from_translation(Vec3::new(0.1, 1.0, 0.0)));
        assert!(relation_close(&joint_in_base(&joint, &parent), &expected));
    }

    #[test]
    fn untracked_parent_invalidates_joint() {
        let joint = SpaceRelation::identity();
        let located = joint_in_base(&joint, &SpaceRelation::untracked());
        assert!(located.flags.is_empty());
    }

    #[test]
    fn clearing_keeps_poses() {
        let mut joints = vec![
            JointLocation {
                location_flags: RelationFlags::all(),
                ..JointLocation::default()
            };
            3
        ];
        clear_joint_flags(&mut joints);
        assert!(joints.iter().all(|joint| joint.location_flags.is_empty()));
    }
}
