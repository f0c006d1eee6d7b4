//! XR session lifecycle and tracked-entity runtime.
//!
//! An [`Instance`] owns one [`runtime::system::System`], its sessions and every
//! child handle. Hardware sits behind the [`device::XrDevice`] and
//! [`device::SystemCompositor`] traits; [`device::SimulatedDevice`] and
//! [`device::SimulatedCompositor`] stand in for real hardware.

pub mod device;
pub mod error;
pub mod extensions;
pub mod handle;
pub mod runtime;
pub mod session;
pub mod space;
pub mod time;
pub mod tracking;
pub mod two_call;
pub mod validate;

pub use error::{XrError, XrResult, XrResultCode};
pub use extensions::{Extension, ExtensionRegistry};
pub use handle::{
    BodyTrackerHandle, FaceTrackerHandle, HandTrackerHandle, Handle, SessionHandle, SpaceHandle,
};
pub use runtime::config::RuntimeConfig;
pub use runtime::{Instance, InstanceBuilder};
pub use session::events::Event;
pub use session::SessionState;
pub use time::XrTime;
