//! Eye and lip expression weights.

use super::{query_failure, TrackerBinding};
use crate::device::{DeviceRole, InputName, EYE_EXPRESSION_COUNT, LIP_EXPRESSION_COUNT};
use crate::error::{XrError, XrResult};
use crate::extensions::Extension;
use crate::handle::{FaceTrackerHandle, HandleObject, SessionHandle};
use crate::runtime::Instance;
use crate::time::XrTime;
use crate::validate::{self, typed_struct, StructureType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacialTrackingType {
    Eye,
    Lip,
}

impl FacialTrackingType {
    pub fn expression_count(self) -> usize {
        match self {
            FacialTrackingType::Eye => EYE_EXPRESSION_COUNT,
            FacialTrackingType::Lip => LIP_EXPRESSION_COUNT,
        }
    }

    fn input(self) -> InputName {
        match self {
            FacialTrackingType::Eye => InputName::EyeFaceTracking,
            FacialTrackingType::Lip => InputName::LipFaceTracking,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FacialTrackerCreateInfo {
    pub ty: StructureType,
    pub facial_tracking_type: FacialTrackingType,
}

impl FacialTrackerCreateInfo {
    pub fn new(facial_tracking_type: FacialTrackingType) -> Self {
        Self {
            ty: StructureType::FacialTrackerCreateInfo,
            facial_tracking_type,
        }
    }
}

#[derive(Debug)]
pub struct FaceTracker {
    binding: TrackerBinding,
    tracking_type: FacialTrackingType,
}

impl FaceTracker {
    pub fn binding(&self) -> &TrackerBinding {
        &self.binding
    }

    pub fn tracking_type(&self) -> FacialTrackingType {
        self.tracking_type
    }

    pub(crate) fn finalize(&mut self) {
        self.binding.release();
    }
}

#[derive(Debug, Clone)]
pub struct FacialExpressions {
    pub ty: StructureType,
    pub is_active: bool,
    pub sample_time: XrTime,
    pub expression_weightings: Vec<f32>,
}

impl FacialExpressions {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            ty: StructureType::FacialExpressions,
            is_active: false,
            sample_time: 0,
            expression_weightings: vec![0.0; count],
        }
    }
}

typed_struct!(
    FacialTrackerCreateInfo => FacialTrackerCreateInfo,
    FacialExpressions => FacialExpressions,
);

impl Instance {
    pub fn create_facial_tracker(
        &mut self,
        session: SessionHandle,
        info: Option<&FacialTrackerCreateInfo>,
    ) -> XrResult<FaceTrackerHandle> {
        const CALL: &str = "xrCreateFacialTrackerHTC";
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "createInfo")?;
        validate::extension(CALL, &self.extensions, Extension::FacialTracking)?;

        let tracking = self.system.tracking();
        let supported = match info.facial_tracking_type {
            FacialTrackingType::Eye => tracking.eye_tracking,
            FacialTrackingType::Lip => tracking.lip_tracking,
        };
        if !supported {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: format!(
                    "system does not support {:?} facial tracking",
                    info.facial_tracking_type
                ),
            });
        }

        let input = info.facial_tracking_type.input();
        let device = self.role_device(CALL, DeviceRole::Face, "facial tracking", |caps| {
            caps.face_tracking
        })?;
        if !device.has_input(input) {
            return Err(XrError::FeatureUnsupported {
                call: CALL,
                reason: format!("device '{}' has no {input:?} input", device.name()),
            });
        }

        let tracker = FaceTracker {
            binding: TrackerBinding::new(session, Some(device), input),
            tracking_type: info.facial_tracking_type,
        };
        let handle = self.allocate_tracker(
            CALL,
            session,
            format!("{:?} facial tracker", info.facial_tracking_type),
            HandleObject::FaceTracker(tracker),
        )?;
        Ok(FaceTrackerHandle::from_raw(handle))
    }

    pub fn destroy_facial_tracker(&mut self, tracker: FaceTrackerHandle) -> XrResult<()> {
        const CALL: &str = "xrDestroyFacialTrackerHTC";
        self.registry.face_tracker(CALL, tracker)?;
        self.registry.destroy(CALL, tracker.raw())?;
        Ok(())
    }

    /// Fills the leading weights for the tracker's type. Inactive tracking
    /// leaves the weights and sample time untouched.
    pub fn get_facial_expressions(
        &self,
        tracker: FaceTrackerHandle,
        expressions: Option<&mut FacialExpressions>,
    ) -> XrResult<()> {
        const CALL: &str = "xrGetFacialExpressionsHTC";
        let found = self.registry.face_tracker(CALL, tracker)?;
        self.live_session(CALL, found.binding.session())?;
        let expressions = validate::arg_type_mut(CALL, expressions, "facialExpressions")?;
        validate::extension(CALL, &self.extensions, Extension::FacialTracking)?;

        let Some(device) = found.binding.device() else {
            return Err(validate::failure(CALL, "tracker has no facial tracking device"));
        };
        let count = found.tracking_type.expression_count();
        validate::capacity(CALL, count, expressions.expression_weightings.len())?;

        let set = device
            .get_face_tracking(found.binding.input())
            .map_err(|err| query_failure(CALL, "facial expressions", err))?;
        expressions.is_active = set.is_active;
        if !set.is_active {
            return Ok(());
        }

        expressions.sample_time = self.clock.monotonic_to_ts(set.sample_time_ns);
        let written = set.weights.len().min(count);
        expressions.expression_weightings[..written].copy_from_slice(&set.weights[..written]);
        expressions.expression_weightings[written..count].fill(0.0);
        Ok(())
    }
}
