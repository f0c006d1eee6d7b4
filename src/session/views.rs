use crate::error::{XrError, XrResult};
use crate::handle::{SessionHandle, SpaceHandle};
use crate::runtime::system::ViewConfigurationType;
use crate::runtime::Instance;
use crate::space::relation::{Pose, RelationChain, RelationFlags, Vec3};
use crate::time::XrTime;
use crate::two_call;
use crate::validate::{self, typed_struct, StructureType};
use euclid::{Point2D, UnknownUnit};
use serde::{Deserialize, Serialize};

const DEFAULT_HALF_FOV_RAD: f32 = std::f32::consts::FRAC_PI_4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Default for Fov {
    fn default() -> Self {
        Self {
            angle_left: -DEFAULT_HALF_FOV_RAD,
            angle_right: DEFAULT_HALF_FOV_RAD,
            angle_up: DEFAULT_HALF_FOV_RAD,
            angle_down: -DEFAULT_HALF_FOV_RAD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewLocateInfo {
    pub ty: StructureType,
    pub view_configuration_type: ViewConfigurationType,
    pub display_time: XrTime,
    pub space: SpaceHandle,
}

impl ViewLocateInfo {
    pub fn new(
        view_configuration_type: ViewConfigurationType,
        display_time: XrTime,
        space: SpaceHandle,
    ) -> Self {
        Self {
            ty: StructureType::ViewLocateInfo,
            view_configuration_type,
            display_time,
            space,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub ty: StructureType,
    pub view_state_flags: RelationFlags,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            ty: StructureType::ViewState,
            view_state_flags: RelationFlags::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct View {
    pub ty: StructureType,
    pub pose: Pose,
    pub fov: Fov,
}

impl Default for View {
    fn default() -> Self {
        Self {
            ty: StructureType::View,
            pose: Pose::identity(),
            fov: Fov::default(),
        }
    }
}

/// Mask vertex in tangent space: `x`/`y` at unit distance in front of the eye.
pub type MaskVertex = Point2D<f32, UnknownUnit>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityMaskType {
    HiddenTriangleMesh,
    VisibleTriangleMesh,
    LineLoop,
}

impl VisibilityMaskType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(VisibilityMaskType::HiddenTriangleMesh),
            2 => Some(VisibilityMaskType::VisibleTriangleMesh),
            3 => Some(VisibilityMaskType::LineLoop),
            _ => None,
        }
    }
}

/// Caller-owned mask buffers. The lengths of `vertices` and `indices` are
/// their capacities; a zero-length buffer asks only for its count.
#[derive(Debug, Clone)]
pub struct VisibilityMask {
    pub ty: StructureType,
    pub vertices: Vec<MaskVertex>,
    pub indices: Vec<u32>,
    pub vertex_count_output: usize,
    pub index_count_output: usize,
}

impl VisibilityMask {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            ty: StructureType::VisibilityMask,
            vertices: vec![MaskVertex::origin(); vertices],
            indices: vec![0; indices],
            vertex_count_output: 0,
            index_count_output: 0,
        }
    }
}

impl Default for VisibilityMask {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}

typed_struct!(
    ViewLocateInfo => ViewLocateInfo,
    ViewState => ViewState,
    View => View,
    VisibilityMask => VisibilityMask,
);

/// Mask geometry for a view whose whole rectangular field of view is visible,
/// so the hidden mesh is empty.
fn mask_geometry(mask_type: VisibilityMaskType, fov: &Fov) -> (Vec<MaskVertex>, Vec<u32>) {
    let corners = vec![
        MaskVertex::new(fov.angle_left.tan(), fov.angle_down.tan()),
        MaskVertex::new(fov.angle_right.tan(), fov.angle_down.tan()),
        MaskVertex::new(fov.angle_right.tan(), fov.angle_up.tan()),
        MaskVertex::new(fov.angle_left.tan(), fov.angle_up.tan()),
    ];
    match mask_type {
        VisibilityMaskType::HiddenTriangleMesh => (Vec::new(), Vec::new()),
        VisibilityMaskType::VisibleTriangleMesh => (corners, vec![0, 1, 2, 0, 2, 3]),
        VisibilityMaskType::LineLoop => (corners, vec![0, 1, 2, 3]),
    }
}

/// Per-eye offsets from the head pose, left to right.
fn eye_offsets(view_configuration: ViewConfigurationType, ipd_m: f32) -> Vec<Vec3> {
    match view_configuration {
        ViewConfigurationType::PrimaryMono => vec![Vec3::zero()],
        ViewConfigurationType::PrimaryStereo => vec![
            Vec3::new(-ipd_m / 2.0, 0.0, 0.0),
            Vec3::new(ipd_m / 2.0, 0.0, 0.0),
        ],
    }
}

impl Instance {
    pub fn enumerate_view_configurations(&self, output: &mut [ViewConfigurationType]) -> usize {
        two_call::fill(&[self.system.view_configuration()], output)
    }

    /// Two-call view location. An empty `views` slice returns only the view
    /// count; otherwise the slice must hold every view.
    pub fn locate_views(
        &self,
        session: SessionHandle,
        info: Option<&ViewLocateInfo>,
        state: Option<&mut ViewState>,
        views: &mut [View],
    ) -> XrResult<usize> {
        const CALL: &str = "xrLocateViews";
        self.live_session(CALL, session)?;
        let info = validate::arg_type(CALL, info, "viewLocateInfo")?;
        let base = self.session_space(CALL, info.space, session)?;
        let state = validate::arg_type_mut(CALL, state, "viewState")?;
        for (index, view) in views.iter().enumerate() {
            if view.ty != StructureType::View {
                return Err(validate::failure(
                    CALL,
                    format!("(views[{index}]->type == {:?}) expected View", view.ty),
                ));
            }
        }
        validate::time(CALL, info.display_time)?;

        let view_configuration = self.system.view_configuration();
        if info.view_configuration_type != view_configuration {
            return Err(XrError::ViewConfigurationTypeUnsupported {
                call: CALL,
                requested: format!("{:?}", info.view_configuration_type),
            });
        }

        let count = view_configuration.view_count();
        if views.is_empty() {
            return Ok(count);
        }
        validate::capacity(CALL, count, views.len())?;

        let at_ns = self.clock.ts_to_monotonic_ns(info.display_time);
        let head = self.head_relation(CALL, at_ns)?;
        let base_in_origin = self.space_in_origin(CALL, base, at_ns)?;

        let mut merged = RelationFlags::all();
        for (view, offset) in views
            .iter_mut()
            .zip(eye_offsets(view_configuration, self.system.ipd_m()))
        {
            let mut chain = RelationChain::new();
            chain
                .push_pose(&Pose::from_translation(offset))
                .push_relation(&head)
                .push_inverted_relation(&base_in_origin);
            let resolved = chain.resolve();
            merged &= resolved.flags;
            view.pose = resolved.pose;
            view.fov = Fov::default();
        }
        state.view_state_flags = merged.location();
        Ok(count)
    }

    pub fn get_visibility_mask(
        &self,
        session: SessionHandle,
        view_configuration_type: ViewConfigurationType,
        view_index: u32,
        mask_type: VisibilityMaskType,
        mask: Option<&mut VisibilityMask>,
    ) -> XrResult<()> {
        self.visibility_mask(session, view_configuration_type, view_index, Ok(mask_type), mask)
    }

    /// Same as [`Instance::get_visibility_mask`] for callers holding the wire
    /// value of the mask type.
    pub fn get_visibility_mask_raw(
        &self,
        session: SessionHandle,
        view_configuration_type: ViewConfigurationType,
        view_index: u32,
        mask_type: u32,
        mask: Option<&mut VisibilityMask>,
    ) -> XrResult<()> {
        let mask_type = VisibilityMaskType::from_raw(mask_type).ok_or(mask_type);
        self.visibility_mask(session, view_configuration_type, view_index, mask_type, mask)
    }

    fn visibility_mask(
        &self,
        session: SessionHandle,
        view_configuration_type: ViewConfigurationType,
        view_index: u32,
        mask_type: Result<VisibilityMaskType, u32>,
        mask: Option<&mut VisibilityMask>,
    ) -> XrResult<()> {
        const CALL: &str = "xrGetVisibilityMaskKHR";
        self.live_session(CALL, session)?;
        validate::call_available(CALL, &self.extensions)?;

        let view_configuration = self.system.view_configuration();
        if view_configuration_type != view_configuration {
            return Err(XrError::ViewConfigurationTypeUnsupported {
                call: CALL,
                requested: format!("{view_configuration_type:?}"),
            });
        }
        let view_count = view_configuration.view_count();
        if view_index as usize >= view_count {
            return Err(validate::failure(
                CALL,
                format!("(viewIndex == {view_index}) must be less than {view_count}"),
            ));
        }
        let mask_type = mask_type.map_err(|raw| {
            validate::failure(CALL, format!("(visibilityMaskType == {raw}) is invalid"))
        })?;
        let mask = validate::arg_type_mut(CALL, mask, "visibilityMask")?;
        mask.vertex_count_output = 0;
        mask.index_count_output = 0;

        let (vertices, indices) = mask_geometry(mask_type, &Fov::default());
        if !mask.vertices.is_empty() {
            validate::capacity(CALL, vertices.len(), mask.vertices.len())?;
        }
        if !mask.indices.is_empty() {
            validate::capacity(CALL, indices.len(), mask.indices.len())?;
        }
        mask.vertex_count_output = vertices.len();
        mask.index_count_output = indices.len();
        if !mask.vertices.is_empty() {
            mask.vertices[..vertices.len()].copy_from_slice(&vertices);
        }
        if !mask.indices.is_empty() {
            mask.indices[..indices.len()].copy_from_slice(&indices);
        }
        log::trace!("[views] {mask_type:?} mask for view {view_index}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_eyes_straddle_the_head() {
        let offsets = eye_offsets(ViewConfigurationType::PrimaryStereo, 0.064);
        assert_eq!(offsets.len(), 2);
        assert!((offsets[1].x - offsets[0].x - 0.064).abs() < 1e-6);
        assert_eq!(offsets[0].x, -offsets[1].x);
    }

    #[test]
    fn visible_mesh_covers_the_field_of_view() {
        let fov = Fov::default();
        let (vertices, indices) = mask_geometry(VisibilityMaskType::VisibleTriangleMesh, &fov);
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices.len(), 6);
        assert!(indices.iter().all(|index| (*index as usize) < vertices.len()));
        assert!((vertices[2].x - fov.angle_right.tan()).abs() < 1e-6);

        let (hidden_vertices, hidden_indices) =
            mask_geometry(VisibilityMaskType::HiddenTriangleMesh, &fov);
        assert!(hidden_vertices.is_empty() && hidden_indices.is_empty());
    }

    #[test]
    fn mask_types_follow_wire_encoding() {
        assert_eq!(
            VisibilityMaskType::from_raw(3),
            Some(VisibilityMaskType::LineLoop)
        );
        assert_eq!(VisibilityMaskType::from_raw(0), None);
        assert_eq!(VisibilityMaskType::from_raw(4), None);
    }

    #[test]
    fn mono_view_sits_on_the_head() {
        assert_eq!(
            eye_offsets(ViewConfigurationType::PrimaryMono, 0.064),
            vec![Vec3::zero()]
        );
    }
}
