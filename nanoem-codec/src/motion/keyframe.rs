use std::collections::HashMap;

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
};

use super::track::Keyframe;

pub(crate) const DEFAULT_INTERPOLATION: [u8; 4] = [20u8, 20u8, 107u8, 107u8];
pub(crate) const VMD_BONE_KEYFRAME_NAME_LENGTH: usize = 15;
pub(crate) const VMD_MORPH_KEYFRAME_NAME_LENGTH: usize = 15;
pub(crate) const PMD_BONE_NAME_LENGTH: usize = 20;

/// Shift_JIS name of a fixed-width VMD field. Writers often cut a name in the
/// middle of a double byte character, so a dangling lead byte is dropped
/// instead of failing the whole keyframe.
pub(crate) fn read_fixed_name(buffer: &mut Buffer, width: usize) -> Result<String, Status> {
    let src = buffer.read_buffer(width)?;
    let src = match src.iter().position(|c| *c == 0u8) {
        Some(pos) => &src[..pos],
        None => src,
    };
    let (cow, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(src);
    if !had_errors {
        return Ok(cow.into_owned());
    }
    if let Some((_, head)) = src.split_last() {
        let (cow, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(head);
        if !had_errors {
            log::warn!("dropping truncated character at the end of a {width} bytes name");
            return Ok(cow.into_owned());
        }
    }
    Err(Status::ErrorDecodeJisStringFailed)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionKeyframeBase {
    pub index: usize,
    pub frame_index: u32,
    pub is_selected: bool,
    pub annotations: HashMap<String, String>,
}

impl MotionKeyframeBase {
    pub(crate) fn with_frame_index(frame_index: u32) -> Self {
        Self {
            frame_index,
            ..Default::default()
        }
    }

    pub(crate) fn compare(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.frame_index.cmp(&b.frame_index)
    }
}

macro_rules! impl_keyframe {
    ($($typ: ty),*) => {
        $(
            impl Keyframe for $typ {
                fn frame_index(&self) -> u32 {
                    self.base.frame_index
                }

                fn set_index(&mut self, index: usize) {
                    self.base.index = index;
                }
            }

            impl $typ {
                pub fn get_frame_index(&self) -> u32 {
                    self.base.frame_index
                }

                pub fn set_frame_index(&mut self, value: u32) {
                    self.base.frame_index = value;
                }

                pub fn get_index(&self) -> usize {
                    self.base.index
                }

                pub fn is_selected(&self) -> bool {
                    self.base.is_selected
                }

                pub fn set_selected(&mut self, value: bool) {
                    self.base.is_selected = value;
                }

                pub fn get_annotation(&self, key: &str) -> Option<&String> {
                    self.base.annotations.get(key)
                }

                pub fn set_annotation(&mut self, key: &str, value: &str) {
                    self.base.annotations.insert(key.to_owned(), value.to_owned());
                }
            }
        )*
    };
}

impl_keyframe!(
    MotionAccessoryKeyframe,
    MotionBoneKeyframe,
    MotionCameraKeyframe,
    MotionLightKeyframe,
    MotionModelKeyframe,
    MotionMorphKeyframe,
    MotionSelfShadowKeyframe
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionEffectParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector4(F128),
}

impl Default for MotionEffectParameterValue {
    fn default() -> Self {
        MotionEffectParameterValue::Bool(false)
    }
}

/// Named effect (shader) parameter attached to an accessory or model keyframe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionEffectParameter {
    pub(crate) name: String,
    pub(crate) value: MotionEffectParameterValue,
}

impl MotionEffectParameter {
    pub fn create(name: &str, value: MotionEffectParameterValue) -> Self {
        Self {
            name: name.to_owned(),
            value,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> MotionEffectParameterValue {
        self.value
    }

    pub fn set_name(&mut self, value: &str) {
        self.name = value.to_owned();
    }

    pub fn set_value(&mut self, value: MotionEffectParameterValue) {
        self.value = value;
    }
}

/// Binds a bone of this model (the subject) to a bone of another object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MotionOutsideParent {
    pub(crate) subject_bone_name: String,
    pub(crate) target_object_name: String,
    pub(crate) target_bone_name: String,
}

impl MotionOutsideParent {
    pub fn create(subject_bone_name: &str, target_object_name: &str, target_bone_name: &str) -> Self {
        Self {
            subject_bone_name: subject_bone_name.to_owned(),
            target_object_name: target_object_name.to_owned(),
            target_bone_name: target_bone_name.to_owned(),
        }
    }

    pub fn get_subject_bone_name(&self) -> &str {
        &self.subject_bone_name
    }

    pub fn get_target_object_name(&self) -> &str {
        &self.target_object_name
    }

    pub fn get_target_bone_name(&self) -> &str {
        &self.target_bone_name
    }

    pub fn set_subject_bone_name(&mut self, value: &str) {
        self.subject_bone_name = value.to_owned();
    }

    pub fn set_target_object_name(&mut self, value: &str) {
        self.target_object_name = value.to_owned();
    }

    pub fn set_target_bone_name(&mut self, value: &str) {
        self.target_bone_name = value.to_owned();
    }
}

fn insert_effect_parameter(
    parameters: &mut Vec<MotionEffectParameter>,
    parameter: MotionEffectParameter,
) -> Result<(), Status> {
    if parameters.iter().any(|p| p.name == parameter.name) {
        return Err(Status::ErrorEffectParameterAlreadyExists);
    }
    parameters.push(parameter);
    Ok(())
}

fn remove_effect_parameter(
    parameters: &mut Vec<MotionEffectParameter>,
    name: &str,
) -> Result<MotionEffectParameter, Status> {
    match parameters.iter().position(|p| p.name == name) {
        Some(pos) => Ok(parameters.remove(pos)),
        None => Err(Status::ErrorEffectParameterNotFound),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionAccessoryKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) translation: F128,
    pub(crate) orientation: F128,
    pub(crate) scale_factor: f32,
    pub(crate) opacity: f32,
    pub(crate) is_add_blending_enabled: bool,
    pub(crate) is_shadow_enabled: bool,
    pub(crate) visible: bool,
    pub(crate) effect_parameters: Vec<MotionEffectParameter>,
    pub(crate) outside_parent: Option<MotionOutsideParent>,
}

impl Default for MotionAccessoryKeyframe {
    fn default() -> Self {
        Self {
            base: MotionKeyframeBase::default(),
            translation: F128::default(),
            orientation: F128::default(),
            scale_factor: 0f32,
            opacity: 0f32,
            is_add_blending_enabled: false,
            is_shadow_enabled: true,
            visible: true,
            effect_parameters: vec![],
            outside_parent: None,
        }
    }
}

impl MotionAccessoryKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub fn get_translation(&self) -> F128 {
        self.translation
    }

    pub fn get_orientation(&self) -> F128 {
        self.orientation
    }

    pub fn get_scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn get_opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_add_blending_enabled(&self) -> bool {
        self.is_add_blending_enabled
    }

    pub fn is_shadow_enabled(&self) -> bool {
        self.is_shadow_enabled
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn get_all_effect_parameter_objects(&self) -> &[MotionEffectParameter] {
        &self.effect_parameters
    }

    pub fn get_outside_parent_object(&self) -> Option<&MotionOutsideParent> {
        self.outside_parent.as_ref()
    }

    pub fn set_translation(&mut self, value: F128) {
        self.translation = value;
    }

    pub fn set_orientation(&mut self, value: F128) {
        self.orientation = value;
    }

    pub fn set_scale_factor(&mut self, value: f32) {
        self.scale_factor = value;
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.opacity = value;
    }

    pub fn set_add_blending_enabled(&mut self, value: bool) {
        self.is_add_blending_enabled = value;
    }

    pub fn set_shadow_enabled(&mut self, value: bool) {
        self.is_shadow_enabled = value;
    }

    pub fn set_visible(&mut self, value: bool) {
        self.visible = value;
    }

    pub fn set_outside_parent_object(&mut self, value: Option<MotionOutsideParent>) {
        self.outside_parent = value;
    }

    pub fn add_effect_parameter_object(
        &mut self,
        parameter: MotionEffectParameter,
    ) -> Result<(), Status> {
        insert_effect_parameter(&mut self.effect_parameters, parameter)
    }

    pub fn remove_effect_parameter_object(
        &mut self,
        name: &str,
    ) -> Result<MotionEffectParameter, Status> {
        remove_effect_parameter(&mut self.effect_parameters, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionBoneKeyframeInterpolationType {
    TranslationX,
    TranslationY,
    TranslationZ,
    Orientation,
}

impl MotionBoneKeyframeInterpolationType {
    pub fn all() -> &'static [MotionBoneKeyframeInterpolationType] {
        &[
            Self::TranslationX,
            Self::TranslationY,
            Self::TranslationZ,
            Self::Orientation,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionBoneKeyframeInterpolation {
    pub translation_x: [u8; 4],
    pub translation_y: [u8; 4],
    pub translation_z: [u8; 4],
    pub orientation: [u8; 4],
}

impl Default for MotionBoneKeyframeInterpolation {
    fn default() -> Self {
        Self {
            translation_x: DEFAULT_INTERPOLATION,
            translation_y: DEFAULT_INTERPOLATION,
            translation_z: DEFAULT_INTERPOLATION,
            orientation: DEFAULT_INTERPOLATION,
        }
    }
}

impl MotionBoneKeyframeInterpolation {
    pub fn get(&self, typ: MotionBoneKeyframeInterpolationType) -> [u8; 4] {
        match typ {
            MotionBoneKeyframeInterpolationType::TranslationX => self.translation_x,
            MotionBoneKeyframeInterpolationType::TranslationY => self.translation_y,
            MotionBoneKeyframeInterpolationType::TranslationZ => self.translation_z,
            MotionBoneKeyframeInterpolationType::Orientation => self.orientation,
        }
    }

    pub fn get_mut(&mut self, typ: MotionBoneKeyframeInterpolationType) -> &mut [u8; 4] {
        match typ {
            MotionBoneKeyframeInterpolationType::TranslationX => &mut self.translation_x,
            MotionBoneKeyframeInterpolationType::TranslationY => &mut self.translation_y,
            MotionBoneKeyframeInterpolationType::TranslationZ => &mut self.translation_z,
            MotionBoneKeyframeInterpolationType::Orientation => &mut self.orientation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionBoneKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) translation: F128,
    pub(crate) orientation: F128,
    pub(crate) interpolation: MotionBoneKeyframeInterpolation,
    pub(crate) stage_index: u32,
    pub(crate) is_physics_simulation_enabled: bool,
}

impl Default for MotionBoneKeyframe {
    fn default() -> Self {
        Self {
            base: MotionKeyframeBase::default(),
            translation: F128::default(),
            orientation: F128::default(),
            interpolation: MotionBoneKeyframeInterpolation::default(),
            stage_index: 0,
            is_physics_simulation_enabled: true,
        }
    }
}

impl MotionBoneKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(
        buffer: &mut Buffer,
        offset: u32,
    ) -> Result<(MotionBoneKeyframe, String), Status> {
        let name = read_fixed_name(buffer, VMD_BONE_KEYFRAME_NAME_LENGTH)?;
        let mut keyframe = MotionBoneKeyframe::default();
        keyframe.base.frame_index = buffer.read_u32_little_endian()?.saturating_add(offset);
        keyframe.translation = buffer.read_f32_3_little_endian()?;
        keyframe.orientation = buffer.read_f32_4_little_endian()?;
        for i in 0..4 {
            for typ in MotionBoneKeyframeInterpolationType::all() {
                keyframe.interpolation.get_mut(*typ)[i] = buffer.read_byte()?;
            }
        }
        buffer.skip(48usize)?;
        Ok((keyframe, name))
    }

    pub(crate) fn save_to_buffer_vmd(
        &self,
        name: &str,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        buffer.write_fixed_string(name, VMD_BONE_KEYFRAME_NAME_LENGTH)?;
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_4_little_endian(self.orientation)?;
        for i in 0..4 {
            for typ in MotionBoneKeyframeInterpolationType::all() {
                buffer.write_byte(self.interpolation.get(*typ)[i])?;
            }
        }
        buffer.write_byte_array(&[0u8; 48])?;
        Ok(())
    }

    pub fn get_translation(&self) -> F128 {
        self.translation
    }

    pub fn get_orientation(&self) -> F128 {
        self.orientation
    }

    pub fn get_interpolation(&self) -> &MotionBoneKeyframeInterpolation {
        &self.interpolation
    }

    pub fn get_stage_index(&self) -> u32 {
        self.stage_index
    }

    pub fn is_physics_simulation_enabled(&self) -> bool {
        self.is_physics_simulation_enabled
    }

    pub fn set_translation(&mut self, value: F128) {
        self.translation = value;
    }

    pub fn set_orientation(&mut self, value: F128) {
        self.orientation = value;
    }

    pub fn set_interpolation(&mut self, typ: MotionBoneKeyframeInterpolationType, value: [u8; 4]) {
        *self.interpolation.get_mut(typ) = value;
    }

    pub fn set_stage_index(&mut self, value: u32) {
        self.stage_index = value;
    }

    pub fn set_physics_simulation_enabled(&mut self, value: bool) {
        self.is_physics_simulation_enabled = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionCameraKeyframeInterpolationType {
    LookAtX,
    LookAtY,
    LookAtZ,
    Angle,
    Fov,
    Distance,
}

impl MotionCameraKeyframeInterpolationType {
    pub fn all() -> &'static [MotionCameraKeyframeInterpolationType] {
        &[
            Self::LookAtX,
            Self::LookAtY,
            Self::LookAtZ,
            Self::Angle,
            Self::Fov,
            Self::Distance,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionCameraKeyframeInterpolation {
    pub lookat_x: [u8; 4],
    pub lookat_y: [u8; 4],
    pub lookat_z: [u8; 4],
    pub angle: [u8; 4],
    pub fov: [u8; 4],
    pub distance: [u8; 4],
}

impl Default for MotionCameraKeyframeInterpolation {
    fn default() -> Self {
        Self {
            lookat_x: DEFAULT_INTERPOLATION,
            lookat_y: DEFAULT_INTERPOLATION,
            lookat_z: DEFAULT_INTERPOLATION,
            angle: DEFAULT_INTERPOLATION,
            fov: DEFAULT_INTERPOLATION,
            distance: DEFAULT_INTERPOLATION,
        }
    }
}

impl MotionCameraKeyframeInterpolation {
    pub fn get(&self, typ: MotionCameraKeyframeInterpolationType) -> [u8; 4] {
        match typ {
            MotionCameraKeyframeInterpolationType::LookAtX => self.lookat_x,
            MotionCameraKeyframeInterpolationType::LookAtY => self.lookat_y,
            MotionCameraKeyframeInterpolationType::LookAtZ => self.lookat_z,
            MotionCameraKeyframeInterpolationType::Angle => self.angle,
            MotionCameraKeyframeInterpolationType::Fov => self.fov,
            MotionCameraKeyframeInterpolationType::Distance => self.distance,
        }
    }

    pub fn get_mut(&mut self, typ: MotionCameraKeyframeInterpolationType) -> &mut [u8; 4] {
        match typ {
            MotionCameraKeyframeInterpolationType::LookAtX => &mut self.lookat_x,
            MotionCameraKeyframeInterpolationType::LookAtY => &mut self.lookat_y,
            MotionCameraKeyframeInterpolationType::LookAtZ => &mut self.lookat_z,
            MotionCameraKeyframeInterpolationType::Angle => &mut self.angle,
            MotionCameraKeyframeInterpolationType::Fov => &mut self.fov,
            MotionCameraKeyframeInterpolationType::Distance => &mut self.distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionCameraKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) look_at: F128,
    pub(crate) angle: F128,
    pub(crate) distance: f32,
    pub(crate) fov: i32,
    pub(crate) interpolation: MotionCameraKeyframeInterpolation,
    pub(crate) is_perspective_view: bool,
    pub(crate) stage_index: u32,
    pub(crate) outside_parent: Option<MotionOutsideParent>,
}

impl Default for MotionCameraKeyframe {
    fn default() -> Self {
        Self {
            base: MotionKeyframeBase::default(),
            look_at: F128::default(),
            angle: F128::default(),
            distance: 0f32,
            fov: 0,
            interpolation: MotionCameraKeyframeInterpolation::default(),
            is_perspective_view: true,
            stage_index: 0,
            outside_parent: None,
        }
    }
}

impl MotionCameraKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(buffer: &mut Buffer, offset: u32) -> Result<MotionCameraKeyframe, Status> {
        let mut keyframe = MotionCameraKeyframe {
            base: MotionKeyframeBase::with_frame_index(
                buffer.read_u32_little_endian()?.saturating_add(offset),
            ),
            distance: buffer.read_f32_little_endian()?,
            look_at: buffer.read_f32_3_little_endian()?,
            angle: buffer.read_f32_3_little_endian()?,
            ..Default::default()
        };
        for i in 0..4 {
            for typ in MotionCameraKeyframeInterpolationType::all() {
                keyframe.interpolation.get_mut(*typ)[i] = buffer.read_byte()?;
            }
        }
        keyframe.fov = buffer.read_i32_little_endian()?;
        // stored as "orthographic" flag
        keyframe.is_perspective_view = buffer.read_byte()? == 0u8;
        Ok(keyframe)
    }

    pub(crate) fn save_to_buffer_vmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_f32_little_endian(self.distance)?;
        buffer.write_f32_3_little_endian(self.look_at)?;
        buffer.write_f32_3_little_endian(self.angle)?;
        for i in 0..4 {
            for typ in MotionCameraKeyframeInterpolationType::all() {
                buffer.write_byte(self.interpolation.get(*typ)[i])?;
            }
        }
        buffer.write_i32_little_endian(self.fov)?;
        buffer.write_byte(!self.is_perspective_view as u8)?;
        Ok(())
    }

    pub fn get_look_at(&self) -> F128 {
        self.look_at
    }

    pub fn get_angle(&self) -> F128 {
        self.angle
    }

    pub fn get_distance(&self) -> f32 {
        self.distance
    }

    pub fn get_fov(&self) -> i32 {
        self.fov
    }

    pub fn get_interpolation(&self) -> &MotionCameraKeyframeInterpolation {
        &self.interpolation
    }

    pub fn is_perspective_view(&self) -> bool {
        self.is_perspective_view
    }

    pub fn get_stage_index(&self) -> u32 {
        self.stage_index
    }

    pub fn get_outside_parent_object(&self) -> Option<&MotionOutsideParent> {
        self.outside_parent.as_ref()
    }

    pub fn set_look_at(&mut self, value: F128) {
        self.look_at = value;
    }

    pub fn set_angle(&mut self, value: F128) {
        self.angle = value;
    }

    pub fn set_distance(&mut self, value: f32) {
        self.distance = value;
    }

    pub fn set_fov(&mut self, value: i32) {
        self.fov = value;
    }

    pub fn set_interpolation(
        &mut self,
        typ: MotionCameraKeyframeInterpolationType,
        value: [u8; 4],
    ) {
        *self.interpolation.get_mut(typ) = value;
    }

    pub fn set_perspective_view(&mut self, value: bool) {
        self.is_perspective_view = value;
    }

    pub fn set_stage_index(&mut self, value: u32) {
        self.stage_index = value;
    }

    pub fn set_outside_parent_object(&mut self, value: Option<MotionOutsideParent>) {
        self.outside_parent = value;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionLightKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) color: F128,
    pub(crate) direction: F128,
}

impl MotionLightKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(buffer: &mut Buffer, offset: u32) -> Result<MotionLightKeyframe, Status> {
        Ok(MotionLightKeyframe {
            base: MotionKeyframeBase::with_frame_index(
                buffer.read_u32_little_endian()?.saturating_add(offset),
            ),
            color: buffer.read_f32_3_little_endian()?,
            direction: buffer.read_f32_3_little_endian()?,
        })
    }

    pub(crate) fn save_to_buffer_vmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_f32_3_little_endian(self.color)?;
        buffer.write_f32_3_little_endian(self.direction)?;
        Ok(())
    }

    pub fn get_color(&self) -> F128 {
        self.color
    }

    pub fn get_direction(&self) -> F128 {
        self.direction
    }

    pub fn set_color(&mut self, value: F128) {
        self.color = value;
    }

    pub fn set_direction(&mut self, value: F128) {
        self.direction = value;
    }
}

/// Enable state of the IK constraint rooted at the named bone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MotionModelKeyframeConstraintState {
    pub(crate) bone_name: String,
    pub(crate) enabled: bool,
}

impl MotionModelKeyframeConstraintState {
    pub fn create(bone_name: &str, enabled: bool) -> Self {
        Self {
            bone_name: bone_name.to_owned(),
            enabled,
        }
    }

    fn parse_vmd(buffer: &mut Buffer) -> Result<Self, Status> {
        Ok(Self {
            bone_name: read_fixed_name(buffer, PMD_BONE_NAME_LENGTH)?,
            enabled: buffer.read_byte()? != 0,
        })
    }

    fn save_to_buffer_vmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_fixed_string(&self.bone_name, PMD_BONE_NAME_LENGTH)?;
        buffer.write_byte(self.enabled as u8)
    }

    pub fn get_bone_name(&self) -> &str {
        &self.bone_name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_bone_name(&mut self, value: &str) {
        self.bone_name = value.to_owned();
    }

    pub fn set_enabled(&mut self, value: bool) {
        self.enabled = value;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionModelKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) visible: bool,
    pub(crate) constraint_states: Vec<MotionModelKeyframeConstraintState>,
    pub(crate) effect_parameters: Vec<MotionEffectParameter>,
    pub(crate) outside_parents: Vec<MotionOutsideParent>,
    pub(crate) has_edge_option: bool,
    pub(crate) edge_scale_factor: f32,
    pub(crate) edge_color: F128,
    pub(crate) is_add_blending_enabled: bool,
    pub(crate) is_physics_simulation_enabled: bool,
}

impl Default for MotionModelKeyframe {
    fn default() -> Self {
        Self {
            base: MotionKeyframeBase::default(),
            visible: true,
            constraint_states: vec![],
            effect_parameters: vec![],
            outside_parents: vec![],
            has_edge_option: false,
            edge_scale_factor: 0f32,
            edge_color: F128::default(),
            is_add_blending_enabled: false,
            is_physics_simulation_enabled: true,
        }
    }
}

impl MotionModelKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(buffer: &mut Buffer, offset: u32) -> Result<MotionModelKeyframe, Status> {
        let mut keyframe = MotionModelKeyframe {
            base: MotionKeyframeBase::with_frame_index(
                buffer.read_u32_little_endian()?.saturating_add(offset),
            ),
            visible: buffer.read_byte()? != 0,
            ..Default::default()
        };
        let num_constraint_states = buffer.read_len()?;
        for _ in 0..num_constraint_states {
            keyframe
                .constraint_states
                .push(MotionModelKeyframeConstraintState::parse_vmd(buffer)?);
        }
        Ok(keyframe)
    }

    pub(crate) fn save_to_buffer_vmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_byte(self.visible as u8)?;
        buffer.write_u32_little_endian(self.constraint_states.len() as u32)?;
        for state in &self.constraint_states {
            state.save_to_buffer_vmd(buffer)?;
        }
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn get_all_constraint_state_objects(&self) -> &[MotionModelKeyframeConstraintState] {
        &self.constraint_states
    }

    pub fn get_all_effect_parameter_objects(&self) -> &[MotionEffectParameter] {
        &self.effect_parameters
    }

    pub fn get_all_outside_parent_objects(&self) -> &[MotionOutsideParent] {
        &self.outside_parents
    }

    pub fn has_edge_option(&self) -> bool {
        self.has_edge_option
    }

    pub fn get_edge_scale_factor(&self) -> f32 {
        self.edge_scale_factor
    }

    pub fn get_edge_color(&self) -> F128 {
        self.edge_color
    }

    pub fn is_add_blending_enabled(&self) -> bool {
        self.is_add_blending_enabled
    }

    pub fn is_physics_simulation_enabled(&self) -> bool {
        self.is_physics_simulation_enabled
    }

    pub fn set_visible(&mut self, value: bool) {
        self.visible = value;
    }

    pub fn set_edge_option(&mut self, value: bool) {
        self.has_edge_option = value;
    }

    pub fn set_edge_scale_factor(&mut self, value: f32) {
        self.edge_scale_factor = value;
    }

    pub fn set_edge_color(&mut self, value: F128) {
        self.edge_color = value;
    }

    pub fn set_add_blending_enabled(&mut self, value: bool) {
        self.is_add_blending_enabled = value;
    }

    pub fn set_physics_simulation_enabled(&mut self, value: bool) {
        self.is_physics_simulation_enabled = value;
    }

    pub fn add_constraint_state_object(
        &mut self,
        state: MotionModelKeyframeConstraintState,
    ) -> Result<(), Status> {
        if self
            .constraint_states
            .iter()
            .any(|s| s.bone_name == state.bone_name)
        {
            return Err(Status::ErrorModelConstraintStateAlreadyExists);
        }
        self.constraint_states.push(state);
        Ok(())
    }

    pub fn remove_constraint_state_object(
        &mut self,
        bone_name: &str,
    ) -> Result<MotionModelKeyframeConstraintState, Status> {
        match self
            .constraint_states
            .iter()
            .position(|s| s.bone_name == bone_name)
        {
            Some(pos) => Ok(self.constraint_states.remove(pos)),
            None => Err(Status::ErrorModelConstraintStateNotFound),
        }
    }

    pub fn add_effect_parameter_object(
        &mut self,
        parameter: MotionEffectParameter,
    ) -> Result<(), Status> {
        insert_effect_parameter(&mut self.effect_parameters, parameter)
    }

    pub fn remove_effect_parameter_object(
        &mut self,
        name: &str,
    ) -> Result<MotionEffectParameter, Status> {
        remove_effect_parameter(&mut self.effect_parameters, name)
    }

    pub fn add_outside_parent_object(
        &mut self,
        outside_parent: MotionOutsideParent,
    ) -> Result<(), Status> {
        if self
            .outside_parents
            .iter()
            .any(|op| op.subject_bone_name == outside_parent.subject_bone_name)
        {
            return Err(Status::ErrorModelBindingAlreadyExists);
        }
        self.outside_parents.push(outside_parent);
        Ok(())
    }

    pub fn remove_outside_parent_object(
        &mut self,
        subject_bone_name: &str,
    ) -> Result<MotionOutsideParent, Status> {
        match self
            .outside_parents
            .iter()
            .position(|op| op.subject_bone_name == subject_bone_name)
        {
            Some(pos) => Ok(self.outside_parents.remove(pos)),
            None => Err(Status::ErrorModelBindingNotFound),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionMorphKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) weight: f32,
}

impl MotionMorphKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(
        buffer: &mut Buffer,
        offset: u32,
    ) -> Result<(MotionMorphKeyframe, String), Status> {
        let name = read_fixed_name(buffer, VMD_MORPH_KEYFRAME_NAME_LENGTH)?;
        let keyframe = MotionMorphKeyframe {
            base: MotionKeyframeBase::with_frame_index(
                buffer.read_u32_little_endian()?.saturating_add(offset),
            ),
            weight: buffer.read_f32_little_endian()?,
        };
        Ok((keyframe, name))
    }

    pub(crate) fn save_to_buffer_vmd(
        &self,
        name: &str,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        buffer.write_fixed_string(name, VMD_MORPH_KEYFRAME_NAME_LENGTH)?;
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_f32_little_endian(self.weight)
    }

    pub fn get_weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, value: f32) {
        self.weight = value;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSelfShadowKeyframe {
    pub base: MotionKeyframeBase,
    pub(crate) distance: f32,
    pub(crate) mode: i32,
}

impl MotionSelfShadowKeyframe {
    pub fn create(frame_index: u32) -> Self {
        Self {
            base: MotionKeyframeBase::with_frame_index(frame_index),
            ..Default::default()
        }
    }

    pub(crate) fn parse_vmd(
        buffer: &mut Buffer,
        offset: u32,
    ) -> Result<MotionSelfShadowKeyframe, Status> {
        Ok(MotionSelfShadowKeyframe {
            base: MotionKeyframeBase::with_frame_index(
                buffer.read_u32_little_endian()?.saturating_add(offset),
            ),
            mode: buffer.read_byte()? as i32,
            distance: buffer.read_f32_little_endian()?,
        })
    }

    pub(crate) fn save_to_buffer_vmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_u32_little_endian(self.base.frame_index)?;
        buffer.write_byte(self.mode as u8)?;
        buffer.write_f32_little_endian(self.distance)
    }

    pub fn get_distance(&self) -> f32 {
        self.distance
    }

    pub fn get_mode(&self) -> i32 {
        self.mode
    }

    pub fn set_distance(&mut self, value: f32) {
        self.distance = value;
    }

    pub fn set_mode(&mut self, value: i32) {
        self.mode = value;
    }
}

#[test]
fn test_keyframe_defaults() {
    let bone = MotionBoneKeyframe::create(1);
    assert_eq!(DEFAULT_INTERPOLATION, bone.get_interpolation().orientation);
    assert!(bone.is_physics_simulation_enabled());
    let camera = MotionCameraKeyframe::create(2);
    assert!(camera.is_perspective_view());
    assert_eq!(DEFAULT_INTERPOLATION, camera.get_interpolation().distance);
    let accessory = MotionAccessoryKeyframe::create(3);
    assert!(accessory.is_visible());
    assert!(accessory.is_shadow_enabled());
    let model = MotionModelKeyframe::create(4);
    assert!(model.is_visible());
    assert!(model.is_physics_simulation_enabled());
    assert_eq!(4, model.get_frame_index());
}

#[test]
fn test_camera_keyframe_perspective_vmd() -> Result<(), Status> {
    let mut keyframe = MotionCameraKeyframe::create(5);
    keyframe.set_perspective_view(false);
    keyframe.set_fov(30);
    keyframe.set_interpolation(MotionCameraKeyframeInterpolationType::Fov, [1, 2, 3, 4]);
    let mut mutable_buffer = MutableBuffer::create()?;
    keyframe.save_to_buffer_vmd(&mut mutable_buffer)?;
    assert_eq!(61, mutable_buffer.len());
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let parsed = MotionCameraKeyframe::parse_vmd(&mut buffer, 0)?;
    assert!(buffer.is_end());
    assert!(!parsed.is_perspective_view());
    assert_eq!(30, parsed.get_fov());
    assert_eq!([1, 2, 3, 4], parsed.get_interpolation().fov);
    Ok(())
}

#[test]
fn test_model_keyframe_sub_objects() {
    let mut keyframe = MotionModelKeyframe::create(0);
    let state = MotionModelKeyframeConstraintState::create("left_leg_ik", false);
    assert_eq!(Ok(()), keyframe.add_constraint_state_object(state.clone()));
    assert_eq!(
        Err(Status::ErrorModelConstraintStateAlreadyExists),
        keyframe.add_constraint_state_object(state)
    );
    assert!(keyframe.remove_constraint_state_object("left_leg_ik").is_ok());
    assert_eq!(
        Err(Status::ErrorModelConstraintStateNotFound),
        keyframe.remove_constraint_state_object("left_leg_ik")
    );
    let parameter = MotionEffectParameter::create("Tr", MotionEffectParameterValue::Float(0.5));
    assert_eq!(Ok(()), keyframe.add_effect_parameter_object(parameter.clone()));
    assert_eq!(
        Err(Status::ErrorEffectParameterAlreadyExists),
        keyframe.add_effect_parameter_object(parameter)
    );
    assert_eq!(
        Err(Status::ErrorEffectParameterNotFound),
        keyframe.remove_effect_parameter_object("Si")
    );
    let outside_parent = MotionOutsideParent::create("center", "stage", "root");
    assert_eq!(Ok(()), keyframe.add_outside_parent_object(outside_parent.clone()));
    assert_eq!(
        Err(Status::ErrorModelBindingAlreadyExists),
        keyframe.add_outside_parent_object(outside_parent)
    );
    assert_eq!(
        Ok(MotionOutsideParent::create("center", "stage", "root")),
        keyframe.remove_outside_parent_object("center")
    );
    assert_eq!(
        Err(Status::ErrorModelBindingNotFound),
        keyframe.remove_outside_parent_object("center")
    );
}

#[test]
fn test_read_fixed_name_drops_split_character() -> Result<(), Status> {
    // "あ" followed by the lead byte of "い"
    let mut buffer = Buffer::create(vec![0x82u8, 0xa0, 0x82, 0, 0]);
    assert_eq!("あ", read_fixed_name(&mut buffer, 5)?);
    assert!(buffer.is_end());
    Ok(())
}
