use crate::error::{XrError, XrResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Optional capability extensions known to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Extension {
    Headless,
    HandTracking,
    ForceFeedbackCurl,
    BodyTracking,
    FullBodyTracking,
    BodyTrackingFidelity,
    FacialTracking,
    DisplayRefreshRate,
    PerformanceSettings,
    VisibilityMask,
}

impl Extension {
    pub const fn all() -> [Extension; 10] {
        [
            Extension::Headless,
            Extension::HandTracking,
            Extension::ForceFeedbackCurl,
            Extension::BodyTracking,
            Extension::FullBodyTracking,
            Extension::BodyTrackingFidelity,
            Extension::FacialTracking,
            Extension::DisplayRefreshRate,
            Extension::PerformanceSettings,
            Extension::VisibilityMask,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Extension::Headless => "XR_MND_headless",
            Extension::HandTracking => "XR_EXT_hand_tracking",
            Extension::ForceFeedbackCurl => "XR_MNDX_force_feedback_curl",
            Extension::BodyTracking => "XR_FB_body_tracking",
            Extension::FullBodyTracking => "XR_META_body_tracking_full_body",
            Extension::BodyTrackingFidelity => "XR_META_body_tracking_fidelity",
            Extension::FacialTracking => "XR_HTC_facial_tracking",
            Extension::DisplayRefreshRate => "XR_FB_display_refresh_rate",
            Extension::PerformanceSettings => "XR_EXT_performance_settings",
            Extension::VisibilityMask => "XR_KHR_visibility_mask",
        }
    }

    pub fn from_name(name: &str) -> Option<Extension> {
        Extension::all().into_iter().find(|ext| ext.name() == name)
    }

    /// Entrypoints that only exist while this extension is enabled.
    pub fn calls(self) -> &'static [&'static str] {
        match self {
            Extension::Headless => &[],
            Extension::HandTracking => &[
                "xrCreateHandTrackerEXT",
                "xrDestroyHandTrackerEXT",
                "xrLocateHandJointsEXT",
            ],
            Extension::ForceFeedbackCurl => &["xrApplyForceFeedbackCurlMNDX"],
            Extension::BodyTracking => &[
                "xrCreateBodyTrackerFB",
                "xrDestroyBodyTrackerFB",
                "xrGetBodySkeletonFB",
                "xrLocateBodyJointsFB",
            ],
            Extension::FullBodyTracking => &[],
            Extension::BodyTrackingFidelity => &["xrRequestBodyTrackingFidelityMETA"],
            Extension::FacialTracking => &[
                "xrCreateFacialTrackerHTC",
                "xrDestroyFacialTrackerHTC",
                "xrGetFacialExpressionsHTC",
            ],
            Extension::DisplayRefreshRate => &[
                "xrEnumerateDisplayRefreshRatesFB",
                "xrGetDisplayRefreshRateFB",
                "xrRequestDisplayRefreshRateFB",
            ],
            Extension::PerformanceSettings => &["xrPerfSettingsSetPerformanceLevelEXT"],
            Extension::VisibilityMask => &["xrGetVisibilityMaskKHR"],
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability registry consulted by every extension-gated entrypoint.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    enabled: BTreeSet<Extension>,
    gated_calls: HashMap<&'static str, Extension>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        let mut gated_calls = HashMap::new();
        for extension in Extension::all() {
            for call in extension.calls() {
                gated_calls.insert(*call, extension);
            }
        }
        Self {
            enabled: BTreeSet::new(),
            gated_calls,
        }
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(extensions: impl IntoIterator<Item = Extension>) -> Self {
        let mut registry = Self::new();
        for extension in extensions {
            registry.enable(extension);
        }
        registry
    }

    /// Enables extensions by registry name, rejecting unknown names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> XrResult<Self> {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            let extension = Extension::from_name(name).ok_or_else(|| {
                XrError::ExtensionNotPresent {
                    call: "xrCreateInstance",
                    name: name.to_string(),
                }
            })?;
            registry.enable(extension);
        }
        Ok(registry)
    }

    pub fn enable(&mut self, extension: Extension) {
        if self.enabled.insert(extension) {
            log::debug!("[extensions] enabled {extension}");
        }
    }

    pub fn is_enabled(&self, extension: Extension) -> bool {
        self.enabled.contains(&extension)
    }

    pub fn enabled(&self) -> impl Iterator<Item = Extension> + '_ {
        self.enabled.iter().copied()
    }

    /// The extension an entrypoint belongs to, if it is extension-gated.
    pub fn gating_extension(&self, call: &str) -> Option<Extension> {
        self.gated_calls.get(call).copied()
    }

    /// Core calls are always available; gated calls need their extension.
    pub fn is_call_available(&self, call: &str) -> bool {
        self.gating_extension(call)
            .is_none_or(|extension| self.is_enabled(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for extension in Extension::all() {
            assert_eq!(Extension::from_name(extension.name()), Some(extension));
        }
        assert_eq!(Extension::from_name("XR_KHR_nonexistent"), None);
    }

    #[test]
    fn gated_calls_follow_enabled_set() {
        let mut registry = ExtensionRegistry::new();
        assert!(!registry.is_call_available("xrCreateHandTrackerEXT"));
        assert!(registry.is_call_available("xrBeginSession"));

        registry.enable(Extension::HandTracking);
        assert!(registry.is_call_available("xrLocateHandJointsEXT"));
        assert_eq!(
            registry.gating_extension("xrGetFacialExpressionsHTC"),
            Some(Extension::FacialTracking)
        );
    }

    #[test]
    fn unknown_extension_name_is_rejected() {
        let err = ExtensionRegistry::from_names(&["XR_EXT_hand_tracking", "XR_FOO_bar"])
            .expect_err("unknown extension");
        assert!(matches!(err, XrError::ExtensionNotPresent { ref name, .. } if name == "XR_FOO_bar"));
    }
}
