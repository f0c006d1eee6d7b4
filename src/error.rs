use openxr::sys;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-facing result code, one per outcome an entrypoint can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XrResultCode {
    Success,
    FrameDiscarded,
    HandleInvalid,
    SessionLost,
    SessionNotRunning,
    SessionRunning,
    ValidationFailure,
    SizeInsufficient,
    TimeInvalid,
    FeatureUnsupported,
    FunctionUnsupported,
    RuntimeFailure,
    OutOfMemory,
    ViewConfigurationTypeUnsupported,
    DisplayRefreshRateUnsupported,
    ExtensionNotPresent,
    CallOrderInvalid,
    LayerLimitExceeded,
    EnvironmentBlendModeUnsupported,
}

impl XrResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, XrResultCode::Success | XrResultCode::FrameDiscarded)
    }

    /// Wire value as defined by the OpenXR registry.
    pub fn to_raw(self) -> sys::Result {
        match self {
            XrResultCode::Success => sys::Result::SUCCESS,
            XrResultCode::FrameDiscarded => sys::Result::FRAME_DISCARDED,
            XrResultCode::HandleInvalid => sys::Result::ERROR_HANDLE_INVALID,
            XrResultCode::SessionLost => sys::Result::ERROR_SESSION_LOST,
            XrResultCode::SessionNotRunning => sys::Result::ERROR_SESSION_NOT_RUNNING,
            XrResultCode::SessionRunning => sys::Result::ERROR_SESSION_RUNNING,
            XrResultCode::ValidationFailure => sys::Result::ERROR_VALIDATION_FAILURE,
            XrResultCode::SizeInsufficient => sys::Result::ERROR_SIZE_INSUFFICIENT,
            XrResultCode::TimeInvalid => sys::Result::ERROR_TIME_INVALID,
            XrResultCode::FeatureUnsupported => sys::Result::ERROR_FEATURE_UNSUPPORTED,
            XrResultCode::FunctionUnsupported => sys::Result::ERROR_FUNCTION_UNSUPPORTED,
            XrResultCode::RuntimeFailure => sys::Result::ERROR_RUNTIME_FAILURE,
            XrResultCode::OutOfMemory => sys::Result::ERROR_OUT_OF_MEMORY,
            XrResultCode::ViewConfigurationTypeUnsupported => {
                sys::Result::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
            }
            XrResultCode::DisplayRefreshRateUnsupported => {
                sys::Result::ERROR_DISPLAY_REFRESH_RATE_UNSUPPORTED_FB
            }
            XrResultCode::ExtensionNotPresent => sys::Result::ERROR_EXTENSION_NOT_PRESENT,
            XrResultCode::CallOrderInvalid => sys::Result::ERROR_CALL_ORDER_INVALID,
            XrResultCode::LayerLimitExceeded => sys::Result::ERROR_LAYER_LIMIT_EXCEEDED,
            XrResultCode::EnvironmentBlendModeUnsupported => {
                sys::Result::ERROR_ENVIRONMENT_BLEND_MODE_UNSUPPORTED
            }
        }
    }
}

/// Errors returned by runtime entrypoints. `call` names the entrypoint that
/// produced the error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum XrError {
    #[error("{call}: handle invalid: {reason}")]
    HandleInvalid { call: &'static str, reason: String },
    #[error("{call}: session is lost")]
    SessionLost { call: &'static str },
    #[error("{call}: session is not running")]
    SessionNotRunning { call: &'static str },
    #[error("{call}: session is already running")]
    SessionRunning { call: &'static str },
    #[error("{call}: validation failure: {reason}")]
    ValidationFailure { call: &'static str, reason: String },
    #[error("{call}: size insufficient: need {required}, got {provided}")]
    SizeInsufficient {
        call: &'static str,
        required: usize,
        provided: usize,
    },
    #[error("{call}: (time == {time}) is not a valid time")]
    TimeInvalid { call: &'static str, time: i64 },
    #[error("{call}: feature unsupported: {reason}")]
    FeatureUnsupported { call: &'static str, reason: String },
    #[error("{call}: function unsupported: {reason}")]
    FunctionUnsupported { call: &'static str, reason: String },
    #[error("{call}: runtime failure: {reason}")]
    RuntimeFailure { call: &'static str, reason: String },
    #[error("{call}: out of memory: {reason}")]
    OutOfMemory { call: &'static str, reason: String },
    #[error("{call}: view configuration type {requested:?} unsupported")]
    ViewConfigurationTypeUnsupported { call: &'static str, requested: String },
    #[error("{call}: display refresh rate {requested} Hz unsupported")]
    DisplayRefreshRateUnsupported { call: &'static str, requested: f32 },
    #[error("{call}: extension {name} not present")]
    ExtensionNotPresent { call: &'static str, name: String },
    #[error("{call}: call order invalid: {reason}")]
    CallOrderInvalid { call: &'static str, reason: String },
    #[error("{call}: layer limit exceeded ({count} > {max})")]
    LayerLimitExceeded {
        call: &'static str,
        count: usize,
        max: usize,
    },
    #[error("{call}: environment blend mode unsupported: {reason}")]
    EnvironmentBlendModeUnsupported { call: &'static str, reason: String },
}

impl XrError {
    pub fn code(&self) -> XrResultCode {
        match self {
            XrError::HandleInvalid { .. } => XrResultCode::HandleInvalid,
            XrError::SessionLost { .. } => XrResultCode::SessionLost,
            XrError::SessionNotRunning { .. } => XrResultCode::SessionNotRunning,
            XrError::SessionRunning { .. } => XrResultCode::SessionRunning,
            XrError::ValidationFailure { .. } => XrResultCode::ValidationFailure,
            XrError::SizeInsufficient { .. } => XrResultCode::SizeInsufficient,
            XrError::TimeInvalid { .. } => XrResultCode::TimeInvalid,
            XrError::FeatureUnsupported { .. } => XrResultCode::FeatureUnsupported,
            XrError::FunctionUnsupported { .. } => XrResultCode::FunctionUnsupported,
            XrError::RuntimeFailure { .. } => XrResultCode::RuntimeFailure,
            XrError::OutOfMemory { .. } => XrResultCode::OutOfMemory,
            XrError::ViewConfigurationTypeUnsupported { .. } => {
                XrResultCode::ViewConfigurationTypeUnsupported
            }
            XrError::DisplayRefreshRateUnsupported { .. } => {
                XrResultCode::DisplayRefreshRateUnsupported
            }
            XrError::ExtensionNotPresent { .. } => XrResultCode::ExtensionNotPresent,
            XrError::CallOrderInvalid { .. } => XrResultCode::CallOrderInvalid,
            XrError::LayerLimitExceeded { .. } => XrResultCode::LayerLimitExceeded,
            XrError::EnvironmentBlendModeUnsupported { .. } => {
                XrResultCode::EnvironmentBlendModeUnsupported
            }
        }
    }

    pub fn call(&self) -> &'static str {
        match self {
            XrError::HandleInvalid { call, .. }
            | XrError::SessionLost { call }
            | XrError::SessionNotRunning { call }
            | XrError::SessionRunning { call }
            | XrError::ValidationFailure { call, .. }
            | XrError::SizeInsufficient { call, .. }
            | XrError::TimeInvalid { call, .. }
            | XrError::FeatureUnsupported { call, .. }
            | XrError::FunctionUnsupported { call, .. }
            | XrError::RuntimeFailure { call, .. }
            | XrError::OutOfMemory { call, .. }
            | XrError::ViewConfigurationTypeUnsupported { call, .. }
            | XrError::DisplayRefreshRateUnsupported { call, .. }
            | XrError::ExtensionNotPresent { call, .. }
            | XrError::CallOrderInvalid { call, .. }
            | XrError::LayerLimitExceeded { call, .. }
            | XrError::EnvironmentBlendModeUnsupported { call, .. } => call,
        }
    }

    /// Rebinds the error to the entrypoint that is about to return it.
    pub(crate) fn in_call(mut self, name: &'static str) -> Self {
        match &mut self {
            XrError::HandleInvalid { call, .. }
            | XrError::SessionLost { call }
            | XrError::SessionNotRunning { call }
            | XrError::SessionRunning { call }
            | XrError::ValidationFailure { call, .. }
            | XrError::SizeInsufficient { call, .. }
            | XrError::TimeInvalid { call, .. }
            | XrError::FeatureUnsupported { call, .. }
            | XrError::FunctionUnsupported { call, .. }
            | XrError::RuntimeFailure { call, .. }
            | XrError::OutOfMemory { call, .. }
            | XrError::ViewConfigurationTypeUnsupported { call, .. }
            | XrError::DisplayRefreshRateUnsupported { call, .. }
            | XrError::ExtensionNotPresent { call, .. }
            | XrError::CallOrderInvalid { call, .. }
            | XrError::LayerLimitExceeded { call, .. }
            | XrError::EnvironmentBlendModeUnsupported { call, .. } => *call = name,
        }
        self
    }
}

pub type XrResult<T> = Result<T, XrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_registry_values() {
        let err = XrError::SessionLost { call: "xrBeginSession" };
        assert_eq!(err.code(), XrResultCode::SessionLost);
        assert_eq!(err.code().to_raw(), sys::Result::ERROR_SESSION_LOST);
        assert_eq!(XrResultCode::Success.to_raw(), sys::Result::SUCCESS);
    }

    #[test]
    fn message_names_the_entrypoint() {
        let err = XrError::TimeInvalid {
            call: "xrLocateHandJointsEXT",
            time: 0,
        };
        let message = err.to_string();
        assert!(message.starts_with("xrLocateHandJointsEXT"));
        assert!(message.contains("time == 0"));
    }

    #[test]
    fn in_call_rebinds_entrypoint_name() {
        let err = XrError::RuntimeFailure {
            call: "device",
            reason: "no skeleton".into(),
        }
        .in_call("xrGetBodySkeletonFB");
        assert_eq!(err.call(), "xrGetBodySkeletonFB");
        assert_eq!(err.code(), XrResultCode::RuntimeFailure);
    }

    #[test]
    fn frame_discarded_is_a_success_code() {
        assert!(XrResultCode::FrameDiscarded.is_success());
        assert!(!XrResultCode::CallOrderInvalid.is_success());
    }
}
