use super::config::RuntimeConfig;
use crate::device::{DeviceRole, DeviceRoles, SystemCompositor, XrDevice};
use crate::error::{XrError, XrResult};
use crate::space::ReferenceSpaceType;
use crate::space::relation::{Pose, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const MAX_LAYER_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u64);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewConfigurationType {
    PrimaryMono,
    PrimaryStereo,
}

impl ViewConfigurationType {
    pub fn view_count(self) -> usize {
        match self {
            ViewConfigurationType::PrimaryMono => 1,
            ViewConfigurationType::PrimaryStereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentBlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

/// Tracking variants the system advertises, independent of which devices are
/// currently bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSupport {
    pub hand_tracking: bool,
    pub body_tracking: bool,
    pub full_body_tracking: bool,
    pub body_tracking_fidelity: bool,
    pub eye_tracking: bool,
    pub lip_tracking: bool,
    pub stage: bool,
}

impl Default for TrackingSupport {
    fn default() -> Self {
        Self {
            hand_tracking: true,
            body_tracking: true,
            full_body_tracking: true,
            body_tracking_fidelity: true,
            eye_tracking: true,
            lip_tracking: true,
            stage: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemProperties {
    pub system_id: SystemId,
    pub system_name: String,
    pub max_layer_count: usize,
    pub view_configuration: ViewConfigurationType,
    pub tracking: TrackingSupport,
}

/// The one hardware configuration reachable from an instance.
#[derive(Debug)]
pub struct System {
    id: SystemId,
    name: String,
    view_configuration: ViewConfigurationType,
    blend_mode: EnvironmentBlendMode,
    compositor: Option<Arc<dyn SystemCompositor>>,
    roles: DeviceRoles,
    stage_origin: Pose,
    ipd_m: f32,
    frame_period_ns: u64,
    tracking: TrackingSupport,
}

impl System {
    pub(crate) fn from_config(
        id: SystemId,
        config: &RuntimeConfig,
        devices: &[Arc<dyn XrDevice>],
        compositor: Option<Arc<dyn SystemCompositor>>,
    ) -> XrResult<Self> {
        let mut roles = DeviceRoles::new();
        for (role, device_name) in &config.roles {
            let device = devices
                .iter()
                .find(|device| device.name() == device_name.as_str())
                .ok_or_else(|| XrError::RuntimeFailure {
                    call: "xrCreateInstance",
                    reason: format!("no device named '{device_name}' for role {role:?}"),
                })?;
            roles.bind(*role, Arc::clone(device));
        }

        let compositor = if config.headless { None } else { compositor };
        let [x, y, z] = config.stage_offset_m;
        Ok(Self {
            id,
            name: format!("{} system", config.application_name),
            view_configuration: config.view_configuration,
            blend_mode: config.blend_mode,
            compositor,
            roles,
            stage_origin: Pose::from_translation(Vec3::new(x, y, z)),
            ipd_m: config.ipd_m,
            frame_period_ns: config.frame_period_ns.max(1),
            tracking: config.tracking,
        })
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn view_configuration(&self) -> ViewConfigurationType {
        self.view_configuration
    }

    pub fn blend_mode(&self) -> EnvironmentBlendMode {
        self.blend_mode
    }

    pub fn is_headless(&self) -> bool {
        self.compositor.is_none()
    }

    pub fn compositor(&self) -> Option<&Arc<dyn SystemCompositor>> {
        self.compositor.as_ref()
    }

    pub fn roles(&self) -> &DeviceRoles {
        &self.roles
    }

    pub(crate) fn roles_mut(&mut self) -> &mut DeviceRoles {
        &mut self.roles
    }

    pub fn device_for(&self, role: DeviceRole) -> Option<&Arc<dyn XrDevice>> {
        self.roles.get(role)
    }

    pub fn head_device(&self) -> Option<&Arc<dyn XrDevice>> {
        self.device_for(DeviceRole::Head)
    }

    pub fn stage_origin(&self) -> Pose {
        self.stage_origin
    }

    pub fn ipd_m(&self) -> f32 {
        self.ipd_m
    }

    pub fn frame_period_ns(&self) -> u64 {
        self.frame_period_ns
    }

    pub fn tracking(&self) -> TrackingSupport {
        self.tracking
    }

    pub fn reference_spaces(&self) -> Vec<ReferenceSpaceType> {
        let mut spaces = vec![ReferenceSpaceType::View, ReferenceSpaceType::Local];
        if self.tracking.stage {
            spaces.push(ReferenceSpaceType::Stage);
        }
        spaces
    }

    pub fn properties(&self) -> SystemProperties {
        SystemProperties {
            system_id: self.id,
            system_name: self.name.clone(),
            max_layer_count: MAX_LAYER_COUNT,
            view_configuration: self.view_configuration,
            tracking: self.tracking,
        }
    }
}
