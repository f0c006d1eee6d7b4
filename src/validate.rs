//! Precondition checks shared by every entrypoint.
//!
//! Each check is read-only and returns the error an entrypoint should hand
//! back unchanged. Entrypoints run them in a fixed order: handle, session
//! loss, argument shape, extension, then call-specific ranges.

use crate::error::{XrError, XrResult};
use crate::extensions::{Extension, ExtensionRegistry};
use crate::session::Session;
use crate::time::XrTime;
use serde::{Deserialize, Serialize};

/// Discriminant carried by every structured argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureType {
    Unknown,
    SessionCreateInfo,
    SessionBeginInfo,
    FrameWaitInfo,
    FrameState,
    FrameBeginInfo,
    FrameEndInfo,
    ReferenceSpaceCreateInfo,
    SpaceLocation,
    ViewLocateInfo,
    ViewState,
    View,
    VisibilityMask,
    HandTrackerCreateInfo,
    HandJointsLocateInfo,
    HandJointLocations,
    HandJointVelocities,
    ForceFeedbackCurlApplyLocations,
    BodyTrackerCreateInfo,
    BodyJointsLocateInfo,
    BodyJointLocations,
    BodySkeleton,
    BodyTrackingFidelityStatus,
    FacialTrackerCreateInfo,
    FacialExpressions,
}

/// A structured argument whose `ty` field must match [`TypedStruct::TYPE`].
pub trait TypedStruct {
    const TYPE: StructureType;

    fn structure_type(&self) -> StructureType;
}

macro_rules! typed_struct {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl $crate::validate::TypedStruct for $ty {
                const TYPE: $crate::validate::StructureType = $crate::validate::StructureType::$tag;

                fn structure_type(&self) -> $crate::validate::StructureType {
                    self.ty
                }
            }
        )*
    };
}
pub(crate) use typed_struct;

fn reject(err: XrError) -> XrError {
    log::warn!("[validate] {err}");
    err
}

/// Argument must be present and carry the expected structure type.
pub fn arg_type<'a, T: TypedStruct>(
    call: &'static str,
    arg: Option<&'a T>,
    name: &str,
) -> XrResult<&'a T> {
    let arg = arg.ok_or_else(|| {
        reject(XrError::ValidationFailure {
            call,
            reason: format!("({name} == NULL)"),
        })
    })?;
    check_type(call, arg, name)?;
    Ok(arg)
}

/// Output argument must be present and carry the expected structure type.
pub fn arg_type_mut<'a, T: TypedStruct>(
    call: &'static str,
    arg: Option<&'a mut T>,
    name: &str,
) -> XrResult<&'a mut T> {
    let arg = arg.ok_or_else(|| {
        reject(XrError::ValidationFailure {
            call,
            reason: format!("({name} == NULL)"),
        })
    })?;
    check_type(call, &*arg, name)?;
    Ok(arg)
}

/// Argument may be absent; when present it must carry the expected type.
pub fn arg_type_can_be_null<T: TypedStruct>(
    call: &'static str,
    arg: Option<&T>,
    name: &str,
) -> XrResult<()> {
    match arg {
        Some(arg) => check_type(call, arg, name),
        None => Ok(()),
    }
}

fn check_type<T: TypedStruct>(call: &'static str, arg: &T, name: &str) -> XrResult<()> {
    let actual = arg.structure_type();
    if actual != T::TYPE {
        return Err(reject(XrError::ValidationFailure {
            call,
            reason: format!("({name}->type == {actual:?}) expected {:?}", T::TYPE),
        }));
    }
    Ok(())
}

pub fn session_not_lost(call: &'static str, session: &Session) -> XrResult<()> {
    if session.is_lost() {
        return Err(reject(XrError::SessionLost { call }));
    }
    Ok(())
}

pub fn session_running(call: &'static str, session: &Session) -> XrResult<()> {
    if !session.is_running() {
        return Err(reject(XrError::SessionNotRunning { call }));
    }
    Ok(())
}

pub fn extension(
    call: &'static str,
    registry: &ExtensionRegistry,
    extension: Extension,
) -> XrResult<()> {
    if !registry.is_enabled(extension) {
        return Err(reject(XrError::FunctionUnsupported {
            call,
            reason: format!("{extension} not enabled"),
        }));
    }
    Ok(())
}

/// Rejects extension-gated entrypoints whose extension is disabled.
pub fn call_available(call: &'static str, registry: &ExtensionRegistry) -> XrResult<()> {
    match registry.gating_extension(call) {
        Some(gate) => extension(call, registry, gate),
        None => Ok(()),
    }
}

pub fn time(call: &'static str, time: XrTime) -> XrResult<()> {
    if time <= 0 {
        return Err(reject(XrError::TimeInvalid { call, time }));
    }
    Ok(())
}

/// Caller buffer must hold at least `required` elements.
pub fn capacity(call: &'static str, required: usize, provided: usize) -> XrResult<()> {
    if provided < required {
        return Err(reject(XrError::SizeInsufficient {
            call,
            required,
            provided,
        }));
    }
    Ok(())
}

/// Caller buffer must hold exactly `expected` elements.
pub fn exact_count(
    call: &'static str,
    what: &str,
    expected: usize,
    provided: usize,
) -> XrResult<()> {
    capacity(call, expected, provided)?;
    if provided != expected {
        return Err(reject(XrError::ValidationFailure {
            call,
            reason: format!("{what} must be {expected}, not {provided}"),
        }));
    }
    Ok(())
}

pub fn unit_interval(call: &'static str, what: &str, value: f32) -> XrResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(reject(XrError::ValidationFailure {
            call,
            reason: format!("({what} == {value}) must be within [0, 1]"),
        }));
    }
    Ok(())
}

pub fn failure(call: &'static str, reason: impl Into<String>) -> XrError {
    reject(XrError::ValidationFailure {
        call,
        reason: reason.into(),
    })
}
