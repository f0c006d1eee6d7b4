//! Generational handle registry shared by every runtime object.
//!
//! Each slot holds its object by exclusive ownership. Destroying a handle
//! finalizes its children first, then itself, and bumps the slot generation so
//! stale handles are rejected on every later lookup.

use crate::error::{XrError, XrResult};
use crate::session::Session;
use crate::space::Space;
use crate::tracking::body::BodyTracker;
use crate::tracking::face::FaceTracker;
use crate::tracking::hand::HandTracker;
use std::fmt;

const DEFAULT_HANDLE_LIMIT: usize = 4096;

/// Opaque reference to a runtime-owned object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub const NULL: Handle = Handle {
        index: 0,
        generation: 0,
    };

    pub const fn is_null(self) -> bool {
        self.generation == 0
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into the 64-bit value handed across the API boundary.
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.to_bits())
    }
}

/// Type tag stored with every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Session,
    Space,
    HandTracker,
    BodyTracker,
    FaceTracker,
}

impl HandleKind {
    pub fn label(self) -> &'static str {
        match self {
            HandleKind::Session => "XrSession",
            HandleKind::Space => "XrSpace",
            HandleKind::HandTracker => "XrHandTrackerEXT",
            HandleKind::BodyTracker => "XrBodyTrackerFB",
            HandleKind::FaceTracker => "XrFacialTrackerHTC",
        }
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(Handle);

        impl $name {
            pub const NULL: $name = $name(Handle::NULL);
            pub const KIND: HandleKind = HandleKind::$kind;

            pub const fn raw(self) -> Handle {
                self.0
            }

            /// Reinterprets a raw handle. Lookups still check liveness and kind.
            pub const fn from_raw(handle: Handle) -> Self {
                Self(handle)
            }
        }

        impl From<$name> for Handle {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

typed_handle!(SessionHandle => Session);
typed_handle!(SpaceHandle => Space);
typed_handle!(HandTrackerHandle => HandTracker);
typed_handle!(BodyTrackerHandle => BodyTracker);
typed_handle!(FaceTrackerHandle => FaceTracker);

/// The object owned by a handle slot.
#[derive(Debug)]
pub enum HandleObject {
    Session(Session),
    Space(Space),
    HandTracker(HandTracker),
    BodyTracker(BodyTracker),
    FaceTracker(FaceTracker),
}

impl HandleObject {
    pub fn kind(&self) -> HandleKind {
        match self {
            HandleObject::Session(_) => HandleKind::Session,
            HandleObject::Space(_) => HandleKind::Space,
            HandleObject::HandTracker(_) => HandleKind::HandTracker,
            HandleObject::BodyTracker(_) => HandleKind::BodyTracker,
            HandleObject::FaceTracker(_) => HandleKind::FaceTracker,
        }
    }

    /// Releases type-specific resources. Called exactly once per handle.
    fn finalize(&mut self) {
        match self {
            HandleObject::Session(session) => session.finalize(),
            HandleObject::Space(space) => space.finalize(),
            HandleObject::HandTracker(tracker) => tracker.finalize(),
            HandleObject::BodyTracker(tracker) => tracker.finalize(),
            HandleObject::FaceTracker(tracker) => tracker.finalize(),
        }
    }
}

#[derive(Debug)]
struct HandleRecord {
    name: String,
    parent: Option<Handle>,
    children: Vec<Handle>,
    object: HandleObject,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    record: Option<HandleRecord>,
}

#[derive(Debug)]
pub struct HandleRegistry {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    limit: usize,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HANDLE_LIMIT)
    }
}

macro_rules! typed_accessors {
    ($get:ident, $get_mut:ident, $handle:ty, $variant:ident, $ty:ty) => {
        pub fn $get(&self, call: &'static str, handle: $handle) -> XrResult<&$ty> {
            match &self.record(call, handle.raw())?.object {
                HandleObject::$variant(object) => Ok(object),
                other => Err(wrong_kind(call, handle.raw(), other.kind(), <$handle>::KIND)),
            }
        }

        pub fn $get_mut(&mut self, call: &'static str, handle: $handle) -> XrResult<&mut $ty> {
            match &mut self.record_mut(call, handle.raw())?.object {
                HandleObject::$variant(object) => Ok(object),
                other => Err(wrong_kind(call, handle.raw(), other.kind(), <$handle>::KIND)),
            }
        }
    };
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses to hold more than `limit` live handles.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            limit,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Inserts `object` as a child of `parent`. On failure nothing changes.
    pub fn allocate(
        &mut self,
        call: &'static str,
        parent: Option<Handle>,
        name: impl Into<String>,
        object: HandleObject,
    ) -> XrResult<Handle> {
        if self.live >= self.limit {
            return Err(XrError::OutOfMemory {
                call,
                reason: format!("handle limit of {} reached", self.limit),
            });
        }

        if let Some(parent) = parent {
            self.record_mut(call, parent)?
                .children
                .try_reserve(1)
                .map_err(|err| XrError::OutOfMemory {
                    call,
                    reason: err.to_string(),
                })?;
        }

        let kind = object.kind();
        let record = HandleRecord {
            name: name.into(),
            parent,
            children: Vec::new(),
            object,
        };

        let handle = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.try_reserve(1).map_err(|err| XrError::OutOfMemory {
                call,
                reason: err.to_string(),
            })?;
            let index = u32::try_from(self.slots.len()).map_err(|_| XrError::OutOfMemory {
                call,
                reason: "handle index space exhausted".into(),
            })?;
            self.slots.push(Slot {
                generation: 1,
                record: Some(record),
            });
            Handle {
                index,
                generation: 1,
            }
        };

        if let Some(parent) = parent {
            if let Some(parent_record) = self.slot_record_mut(parent) {
                parent_record.children.push(handle);
            }
        }

        self.live += 1;
        log::debug!("[handle] allocated {} {handle} ({call})", kind.label());
        Ok(handle)
    }

    /// Destroys `handle` and every descendant, children first. Returns how
    /// many handles were destroyed.
    pub fn destroy(&mut self, call: &'static str, handle: Handle) -> XrResult<usize> {
        self.record(call, handle)?;
        Ok(self.destroy_subtree(handle))
    }

    fn destroy_subtree(&mut self, handle: Handle) -> usize {
        let children = match self.slot_record_mut(handle) {
            Some(record) => std::mem::take(&mut record.children),
            None => return 0,
        };

        let mut destroyed = 0;
        for child in children {
            destroyed += self.destroy_subtree(child);
        }

        let Some(record) = self.slot_record_mut(handle) else {
            return destroyed;
        };
        record.object.finalize();
        let parent = record.parent;

        if let Some(parent_record) = parent.and_then(|parent| self.slot_record_mut(parent)) {
            parent_record.children.retain(|child| *child != handle);
        }

        let slot = &mut self.slots[handle.index as usize];
        let record = slot.record.take();
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free_list.push(handle.index);
        self.live -= 1;

        if let Some(record) = record {
            log::debug!(
                "[handle] destroyed {} {handle} '{}'",
                record.object.kind().label(),
                record.name
            );
        }
        destroyed + 1
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slot_record(handle).is_some()
    }

    pub fn kind_of(&self, handle: Handle) -> Option<HandleKind> {
        self.slot_record(handle).map(|record| record.object.kind())
    }

    pub fn parent_of(&self, handle: Handle) -> Option<Handle> {
        self.slot_record(handle).and_then(|record| record.parent)
    }

    pub fn children_of(&self, handle: Handle) -> &[Handle] {
        self.slot_record(handle)
            .map(|record| record.children.as_slice())
            .unwrap_or_default()
    }

    pub fn debug_name(&self, handle: Handle) -> Option<&str> {
        self.slot_record(handle).map(|record| record.name.as_str())
    }

    pub fn set_debug_name(
        &mut self,
        call: &'static str,
        handle: Handle,
        name: impl Into<String>,
    ) -> XrResult<()> {
        self.record_mut(call, handle)?.name = name.into();
        Ok(())
    }

    typed_accessors!(session, session_mut, SessionHandle, Session, Session);
    typed_accessors!(space, space_mut, SpaceHandle, Space, Space);
    typed_accessors!(hand_tracker, hand_tracker_mut, HandTrackerHandle, HandTracker, HandTracker);
    typed_accessors!(body_tracker, body_tracker_mut, BodyTrackerHandle, BodyTracker, BodyTracker);
    typed_accessors!(face_tracker, face_tracker_mut, FaceTrackerHandle, FaceTracker, FaceTracker);

    fn record(&self, call: &'static str, handle: Handle) -> XrResult<&HandleRecord> {
        if handle.is_null() {
            return Err(null_handle(call));
        }
        self.slot_record(handle).ok_or_else(|| stale_handle(call, handle))
    }

    fn record_mut(&mut self, call: &'static str, handle: Handle) -> XrResult<&mut HandleRecord> {
        if handle.is_null() {
            return Err(null_handle(call));
        }
        self.slot_record_mut(handle)
            .ok_or_else(|| stale_handle(call, handle))
    }

    fn slot_record(&self, handle: Handle) -> Option<&HandleRecord> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    fn slot_record_mut(&mut self, handle: Handle) -> Option<&mut HandleRecord> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_mut())
    }
}

fn null_handle(call: &'static str) -> XrError {
    XrError::HandleInvalid {
        call,
        reason: "handle is null".into(),
    }
}

fn stale_handle(call: &'static str, handle: Handle) -> XrError {
    XrError::HandleInvalid {
        call,
        reason: format!("{handle} is not alive"),
    }
}

fn wrong_kind(call: &'static str, handle: Handle, actual: HandleKind, expected: HandleKind) -> XrError {
    XrError::HandleInvalid {
        call,
        reason: format!(
            "{handle} is a {} but a {} was expected",
            actual.label(),
            expected.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XrResultCode;
    use crate::session::Session;
    use crate::space::relation::Pose;
    use crate::space::{ReferenceSpaceType, Space};

    fn session_object() -> HandleObject {
        HandleObject::Session(Session::for_tests())
    }

    fn space_object(owner: Handle) -> HandleObject {
        HandleObject::Space(Space::new(
            SessionHandle::from_raw(owner),
            ReferenceSpaceType::Local,
            Pose::identity(),
        ))
    }

    #[test]
    fn allocate_links_child_into_parent() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        let space = registry
            .allocate("test", Some(session), "space", space_object(session))
            .unwrap();

        assert_eq!(registry.children_of(session), &[space]);
        assert_eq!(registry.parent_of(space), Some(session));
        assert_eq!(registry.kind_of(space), Some(HandleKind::Space));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn destroy_cascades_to_children() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        let a = registry
            .allocate("test", Some(session), "a", space_object(session))
            .unwrap();
        let b = registry
            .allocate("test", Some(session), "b", space_object(session))
            .unwrap();

        assert_eq!(registry.destroy("test", session).unwrap(), 3);
        assert!(!registry.contains(session));
        assert!(!registry.contains(a));
        assert!(!registry.contains(b));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn destroying_child_unlinks_it_from_parent() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        let space = registry
            .allocate("test", Some(session), "space", space_object(session))
            .unwrap();

        registry.destroy("test", space).unwrap();
        assert!(registry.children_of(session).is_empty());
        assert!(registry.contains(session));
    }

    #[test]
    fn second_destroy_is_rejected() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        registry.destroy("test", session).unwrap();

        let err = registry.destroy("xrDestroySession", session).unwrap_err();
        assert_eq!(err.code(), XrResultCode::HandleInvalid);
    }

    #[test]
    fn reused_slot_rejects_stale_handle() {
        let mut registry = HandleRegistry::new();
        let first = registry
            .allocate("test", None, "first", session_object())
            .unwrap();
        registry.destroy("test", first).unwrap();
        let second = registry
            .allocate("test", None, "second", session_object())
            .unwrap();

        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(registry.session("test", SessionHandle::from_raw(first)).is_err());
        assert!(registry.session("test", SessionHandle::from_raw(second)).is_ok());
    }

    #[test]
    fn wrong_kind_is_handle_invalid() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        let err = registry
            .space("xrLocateSpace", SpaceHandle::from_raw(session))
            .unwrap_err();
        assert_eq!(err.code(), XrResultCode::HandleInvalid);
        assert!(err.to_string().contains("XrSpace"));
    }

    #[test]
    fn null_handle_is_rejected() {
        let registry = HandleRegistry::new();
        let err = registry.session("xrBeginSession", SessionHandle::NULL).unwrap_err();
        assert_eq!(err.code(), XrResultCode::HandleInvalid);
    }

    #[test]
    fn limit_failure_leaves_parent_untouched() {
        let mut registry = HandleRegistry::with_limit(1);
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        let err = registry
            .allocate("test", Some(session), "space", space_object(session))
            .unwrap_err();

        assert_eq!(err.code(), XrResultCode::OutOfMemory);
        assert!(registry.children_of(session).is_empty());
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn allocation_under_dead_parent_fails() {
        let mut registry = HandleRegistry::new();
        let session = registry
            .allocate("test", None, "session", session_object())
            .unwrap();
        registry.destroy("test", session).unwrap();
        let err = registry
            .allocate("test", Some(session), "space", space_object(session))
            .unwrap_err();
        assert_eq!(err.code(), XrResultCode::HandleInvalid);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn bits_round_trip() {
        let handle = Handle {
            index: 7,
            generation: 3,
        };
        assert_eq!(Handle::from_bits(handle.to_bits()), handle);
        assert!(Handle::from_bits(0).is_null());
    }
}
