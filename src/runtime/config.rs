use super::system::{EnvironmentBlendMode, TrackingSupport, ViewConfigurationType};
use crate::device::DeviceRole;
use crate::extensions::Extension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const DEFAULT_FRAME_PERIOD_NS: u64 = 11_111_111;
const DEFAULT_IPD_M: f32 = 0.063;
const DEFAULT_MAX_HANDLES: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read runtime config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything needed to stand up an instance and its single system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub application_name: String,
    /// Extension registry names, e.g. `XR_EXT_hand_tracking`.
    pub extensions: Vec<String>,
    pub view_configuration: ViewConfigurationType,
    pub blend_mode: EnvironmentBlendMode,
    /// No compositor is bound when set.
    pub headless: bool,
    pub refresh_rates_hz: Vec<f32>,
    pub frame_period_ns: u64,
    pub ipd_m: f32,
    pub stage_offset_m: [f32; 3],
    pub max_handles: usize,
    pub tracking: TrackingSupport,
    /// Device names bound to each role at startup.
    pub roles: BTreeMap<DeviceRole, String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            application_name: "theta_xr".to_string(),
            extensions: Vec::new(),
            view_configuration: ViewConfigurationType::PrimaryStereo,
            blend_mode: EnvironmentBlendMode::Opaque,
            headless: false,
            refresh_rates_hz: vec![90.0, 72.0, 60.0],
            frame_period_ns: DEFAULT_FRAME_PERIOD_NS,
            ipd_m: DEFAULT_IPD_M,
            stage_offset_m: [0.0; 3],
            max_handles: DEFAULT_MAX_HANDLES,
            tracking: TrackingSupport::default(),
            roles: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        log::info!("[config] loaded runtime config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        let name = extension.name().to_string();
        if !self.config.extensions.contains(&name) {
            self.config.extensions.push(name);
        }
        self
    }

    pub fn extensions(self, extensions: impl IntoIterator<Item = Extension>) -> Self {
        extensions
            .into_iter()
            .fold(self, |builder, extension| builder.extension(extension))
    }

    pub fn view_configuration(mut self, view_configuration: ViewConfigurationType) -> Self {
        self.config.view_configuration = view_configuration;
        self
    }

    pub fn blend_mode(mut self, blend_mode: EnvironmentBlendMode) -> Self {
        self.config.blend_mode = blend_mode;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn refresh_rates(mut self, rates_hz: Vec<f32>) -> Self {
        self.config.refresh_rates_hz = rates_hz;
        self
    }

    pub fn frame_period_ns(mut self, period_ns: u64) -> Self {
        self.config.frame_period_ns = period_ns;
        self
    }

    pub fn ipd(mut self, ipd_m: f32) -> Self {
        self.config.ipd_m = ipd_m;
        self
    }

    pub fn stage_offset(mut self, offset_m: [f32; 3]) -> Self {
        self.config.stage_offset_m = offset_m;
        self
    }

    pub fn max_handles(mut self, max_handles: usize) -> Self {
        self.config.max_handles = max_handles;
        self
    }

    pub fn tracking(mut self, tracking: TrackingSupport) -> Self {
        self.config.tracking = tracking;
        self
    }

    pub fn role(mut self, role: DeviceRole, device_name: impl Into<String>) -> Self {
        self.config.roles.insert(role, device_name.into());
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}
