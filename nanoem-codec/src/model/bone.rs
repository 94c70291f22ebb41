use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
};

use super::{Info, Model, ModelObject, ObjectRef, PMD_BONE_NAME_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelBoneType {
    #[default]
    Rotatable,
    RotatableAndMovable,
    ConstraintEffector,
    Unknown,
    ConstraintJoint,
    InherentOrientationJoint,
    ConstraintRoot,
    Invisible,
    FixedAxis,
    InherentOrientationEffector,
}

impl From<u8> for ModelBoneType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelBoneType::Rotatable,
            1 => ModelBoneType::RotatableAndMovable,
            2 => ModelBoneType::ConstraintEffector,
            4 => ModelBoneType::ConstraintJoint,
            5 => ModelBoneType::InherentOrientationJoint,
            6 => ModelBoneType::ConstraintRoot,
            7 => ModelBoneType::Invisible,
            8 => ModelBoneType::FixedAxis,
            9 => ModelBoneType::InherentOrientationEffector,
            _ => ModelBoneType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelBoneFlags {
    pub has_destination_bone_index: bool,
    pub is_rotatable: bool,
    pub is_movable: bool,
    pub is_visible: bool,
    pub is_user_handleable: bool,
    pub has_constraint: bool,
    pub has_local_inherent: bool,
    pub has_inherent_orientation: bool,
    pub has_inherent_translation: bool,
    pub has_fixed_axis: bool,
    pub has_local_axes: bool,
    pub is_affected_by_physics_simulation: bool,
    pub has_external_parent_bone: bool,
}

impl ModelBoneFlags {
    /// Bit 6 and the two top bits are padding.
    fn from_raw(u: u16) -> ModelBoneFlags {
        let bit = |n: u16| u & (1 << n) != 0;
        ModelBoneFlags {
            has_destination_bone_index: bit(0),
            is_rotatable: bit(1),
            is_movable: bit(2),
            is_visible: bit(3),
            is_user_handleable: bit(4),
            has_constraint: bit(5),
            has_local_inherent: bit(7),
            has_inherent_orientation: bit(8),
            has_inherent_translation: bit(9),
            has_fixed_axis: bit(10),
            has_local_axes: bit(11),
            is_affected_by_physics_simulation: bit(12),
            has_external_parent_bone: bit(13),
        }
    }

    fn to_raw(self) -> u16 {
        [
            (0, self.has_destination_bone_index),
            (1, self.is_rotatable),
            (2, self.is_movable),
            (3, self.is_visible),
            (4, self.is_user_handleable),
            (5, self.has_constraint),
            (7, self.has_local_inherent),
            (8, self.has_inherent_orientation),
            (9, self.has_inherent_translation),
            (10, self.has_fixed_axis),
            (11, self.has_local_axes),
            (12, self.is_affected_by_physics_simulation),
            (13, self.has_external_parent_bone),
        ]
        .iter()
        .fold(0u16, |acc, (bit, flag)| acc | ((*flag as u16) << bit))
    }
}

#[derive(Debug, Clone)]
pub struct ModelBone {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) constraint: Option<Rc<RefCell<ModelConstraint>>>,
    pub(crate) origin: F128,
    pub(crate) destination_origin: F128,
    pub(crate) fixed_axis: F128,
    pub(crate) local_x_axis: F128,
    pub(crate) local_z_axis: F128,
    pub(crate) inherent_coefficient: f32,
    pub(crate) parent_bone: ObjectRef<ModelBone>,
    pub(crate) parent_inherent_bone: ObjectRef<ModelBone>,
    pub(crate) effector_bone: ObjectRef<ModelBone>,
    pub(crate) target_bone: ObjectRef<ModelBone>,
    pub(crate) global_bone_index: i32,
    pub(crate) stage_index: i32,
    pub(crate) typ: ModelBoneType,
    pub(crate) flags: ModelBoneFlags,
}

impl Default for ModelBone {
    fn default() -> Self {
        Self {
            base: ModelObject::default(),
            name_ja: String::default(),
            name_en: String::default(),
            constraint: None,
            origin: F128::default(),
            destination_origin: F128::default(),
            fixed_axis: F128::default(),
            local_x_axis: F128::UNIT_X,
            local_z_axis: F128::UNIT_Z,
            inherent_coefficient: 1.0f32,
            parent_bone: ObjectRef::none(),
            parent_inherent_bone: ObjectRef::none(),
            effector_bone: ObjectRef::none(),
            target_bone: ObjectRef::none(),
            global_bone_index: 0,
            stage_index: 0,
            typ: ModelBoneType::default(),
            flags: ModelBoneFlags::default(),
        }
    }
}

impl ModelBone {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelBone, Status> {
        let bone_index_size = info.bone_index_size as usize;
        let mut bone = ModelBone {
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            origin: buffer.read_f32_3_little_endian()?,
            parent_bone: ObjectRef::from_index(buffer.read_integer_nullable(bone_index_size)?),
            stage_index: buffer.read_i32_little_endian()?,
            flags: ModelBoneFlags::from_raw(buffer.read_u16_little_endian()?),
            ..Default::default()
        };
        if bone.flags.has_destination_bone_index {
            bone.target_bone = ObjectRef::from_index(buffer.read_integer_nullable(bone_index_size)?);
        } else {
            bone.destination_origin = buffer.read_f32_3_little_endian()?;
        }
        if bone.flags.has_inherent_orientation || bone.flags.has_inherent_translation {
            bone.parent_inherent_bone =
                ObjectRef::from_index(buffer.read_integer_nullable(bone_index_size)?);
            bone.inherent_coefficient = buffer.read_f32_little_endian()?;
        }
        if bone.flags.has_fixed_axis {
            bone.fixed_axis = buffer.read_f32_3_little_endian()?;
        }
        if bone.flags.has_local_axes {
            bone.local_x_axis = buffer.read_f32_3_little_endian()?;
            bone.local_z_axis = buffer.read_f32_3_little_endian()?;
        }
        if bone.flags.has_external_parent_bone {
            bone.global_bone_index = buffer.read_i32_little_endian()?;
        }
        if bone.flags.has_constraint {
            bone.constraint = Some(Rc::new(RefCell::new(ModelConstraint::parse_pmx(
                info, buffer,
            )?)));
        }
        Ok(bone)
    }

    /// `fallback` is a standalone constraint targeting this bone, which is
    /// embedded when the bone has none of its own. A disabled constraint of
    /// the bone itself is not written.
    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        fallback: Option<&Rc<RefCell<ModelConstraint>>>,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        let bone_index_size = info.bone_index_size as usize;
        let constraint = match self.constraint.as_ref() {
            Some(constraint) => self.flags.has_constraint.then_some(constraint),
            None => fallback,
        };
        let mut flags = self.flags;
        flags.has_constraint = constraint.is_some();
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_f32_3_little_endian(self.origin)?;
        buffer.write_integer(self.parent_bone.save_index(), bone_index_size)?;
        buffer.write_i32_little_endian(self.stage_index)?;
        buffer.write_u16_little_endian(flags.to_raw())?;
        if flags.has_destination_bone_index {
            buffer.write_integer(self.target_bone.save_index(), bone_index_size)?;
        } else {
            buffer.write_f32_3_little_endian(self.destination_origin)?;
        }
        if flags.has_inherent_orientation || flags.has_inherent_translation {
            buffer.write_integer(self.parent_inherent_bone.save_index(), bone_index_size)?;
            buffer.write_f32_little_endian(self.inherent_coefficient)?;
        }
        if flags.has_fixed_axis {
            buffer.write_f32_3_little_endian(self.fixed_axis)?;
        }
        if flags.has_local_axes {
            buffer.write_f32_3_little_endian(self.local_x_axis)?;
            buffer.write_f32_3_little_endian(self.local_z_axis)?;
        }
        if flags.has_external_parent_bone {
            buffer.write_i32_little_endian(self.global_bone_index)?;
        }
        if let Some(constraint) = constraint {
            constraint.borrow().save_to_buffer_pmx(info, buffer)?;
        }
        Ok(())
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelBone, Status> {
        let mut bone = ModelBone {
            name_ja: buffer
                .read_string_from_cp932(PMD_BONE_NAME_LENGTH)
                .map_err(|_| Status::ErrorModelBoneCorrupted)?,
            ..Default::default()
        };
        bone.parent_bone = ObjectRef::from_index(buffer.read_i16_little_endian()? as i32);
        let target_bone_index = buffer.read_i16_little_endian()? as i32;
        bone.typ = ModelBoneType::from(buffer.read_byte()?);
        let effector_bone_index = buffer.read_i16_little_endian()? as i32;
        bone.origin = buffer.read_f32_3_little_endian()?;
        bone.flags.is_rotatable = true;
        bone.flags.is_visible = true;
        bone.flags.is_user_handleable = true;
        match bone.typ {
            ModelBoneType::Rotatable | ModelBoneType::ConstraintJoint => {
                bone.flags.has_destination_bone_index = true;
            }
            ModelBoneType::RotatableAndMovable => {
                bone.flags.is_movable = true;
                bone.flags.has_destination_bone_index = true;
            }
            ModelBoneType::ConstraintEffector => {
                bone.flags.is_movable = true;
                bone.flags.has_destination_bone_index = true;
                bone.flags.has_constraint = true;
            }
            ModelBoneType::InherentOrientationJoint => {
                bone.flags.has_inherent_orientation = true;
                bone.flags.has_destination_bone_index = true;
                bone.parent_inherent_bone = ObjectRef::from_index(effector_bone_index);
            }
            ModelBoneType::ConstraintRoot => {
                bone.flags.has_destination_bone_index = true;
                bone.flags.is_visible = false;
            }
            ModelBoneType::Invisible => {
                bone.flags.is_visible = false;
            }
            ModelBoneType::FixedAxis => {
                bone.flags.has_fixed_axis = true;
            }
            ModelBoneType::InherentOrientationEffector => {
                bone.flags.has_inherent_orientation = true;
                bone.flags.is_visible = false;
                bone.parent_inherent_bone = ObjectRef::from_index(target_bone_index);
                bone.inherent_coefficient = effector_bone_index as f32 * 0.01f32;
            }
            ModelBoneType::Unknown => {}
        }
        if bone.typ != ModelBoneType::InherentOrientationEffector && target_bone_index > 0 {
            bone.target_bone = ObjectRef::from_index(target_bone_index);
        }
        if !matches!(
            bone.typ,
            ModelBoneType::InherentOrientationJoint | ModelBoneType::InherentOrientationEffector
        ) {
            bone.effector_bone = ObjectRef::from_index(effector_bone_index);
        }
        Ok(bone)
    }

    fn type_pmd(&self) -> ModelBoneType {
        let flags = &self.flags;
        if flags.has_inherent_orientation && !flags.is_visible {
            ModelBoneType::InherentOrientationEffector
        } else if flags.has_inherent_orientation {
            ModelBoneType::InherentOrientationJoint
        } else if flags.has_fixed_axis {
            ModelBoneType::FixedAxis
        } else if flags.has_constraint && flags.is_movable {
            ModelBoneType::ConstraintEffector
        } else if !flags.is_visible && flags.has_destination_bone_index {
            ModelBoneType::ConstraintRoot
        } else if !flags.is_visible {
            ModelBoneType::Invisible
        } else if flags.is_movable {
            ModelBoneType::RotatableAndMovable
        } else if self.typ == ModelBoneType::ConstraintJoint {
            ModelBoneType::ConstraintJoint
        } else {
            ModelBoneType::Rotatable
        }
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        let typ = self.type_pmd();
        let (target_bone_index, effector_bone_index) = match typ {
            ModelBoneType::InherentOrientationJoint => (
                self.target_bone.save_index(),
                self.parent_inherent_bone.save_index(),
            ),
            ModelBoneType::InherentOrientationEffector => (
                self.parent_inherent_bone.save_index(),
                (self.inherent_coefficient * 100.0f32).round() as i32,
            ),
            _ => (self.target_bone.save_index(), self.effector_bone.save_index()),
        };
        buffer.write_fixed_string(&self.name_ja, PMD_BONE_NAME_LENGTH)?;
        buffer.write_i16_little_endian(self.parent_bone.save_index() as i16)?;
        buffer.write_i16_little_endian(target_bone_index.max(0) as i16)?;
        buffer.write_byte(typ as u8)?;
        buffer.write_i16_little_endian(effector_bone_index.max(0) as i16)?;
        buffer.write_f32_3_little_endian(self.origin)
    }

    /// `this` is the shared handle of `self`, which becomes the target of
    /// the embedded constraint.
    pub(crate) fn resolve(&mut self, parent_model: &Model, this: &Rc<RefCell<ModelBone>>) {
        let bones = &parent_model.bones;
        self.parent_bone.resolve(bones);
        self.parent_inherent_bone.resolve(bones);
        self.effector_bone.resolve(bones);
        self.target_bone.resolve(bones);
        if let Some(constraint) = &self.constraint {
            let mut constraint = constraint.borrow_mut();
            constraint.resolve(parent_model);
            constraint.target_bone = ObjectRef::from_object(Some(this));
        }
    }

    impl_name_accessors!();

    pub fn get_origin(&self) -> F128 {
        self.origin
    }

    pub fn get_destination_origin(&self) -> F128 {
        if self.flags.has_destination_bone_index {
            F128::ZERO
        } else {
            self.destination_origin
        }
    }

    pub fn get_fixed_axis(&self) -> F128 {
        if self.flags.has_fixed_axis {
            self.fixed_axis
        } else {
            F128::ZERO
        }
    }

    pub fn get_local_x_axis(&self) -> F128 {
        if self.flags.has_local_axes {
            self.local_x_axis
        } else {
            F128::UNIT_X
        }
    }

    pub fn get_local_z_axis(&self) -> F128 {
        if self.flags.has_local_axes {
            self.local_z_axis
        } else {
            F128::UNIT_Z
        }
    }

    pub fn get_inherent_coefficient(&self) -> f32 {
        if self.has_inherent() {
            self.inherent_coefficient
        } else {
            1.0f32
        }
    }

    pub fn get_stage_index(&self) -> i32 {
        self.stage_index
    }

    pub fn get_global_bone_index(&self) -> i32 {
        self.global_bone_index
    }

    pub fn get_type(&self) -> ModelBoneType {
        self.typ
    }

    pub fn get_flags(&self) -> ModelBoneFlags {
        self.flags
    }

    fn has_inherent(&self) -> bool {
        self.flags.has_inherent_orientation || self.flags.has_inherent_translation
    }

    pub fn get_parent_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.parent_bone.get()
    }

    pub fn get_parent_inherent_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        if self.has_inherent() {
            self.parent_inherent_bone.get()
        } else {
            None
        }
    }

    pub fn get_effector_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.effector_bone.get()
    }

    pub fn get_target_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        if self.flags.has_destination_bone_index {
            self.target_bone.get()
        } else {
            None
        }
    }

    pub fn get_constraint_object(&self) -> Option<Rc<RefCell<ModelConstraint>>> {
        if self.flags.has_constraint {
            self.constraint.clone()
        } else {
            None
        }
    }

    pub fn is_rotatable(&self) -> bool {
        self.flags.is_rotatable
    }

    pub fn is_movable(&self) -> bool {
        self.flags.is_movable
    }

    pub fn is_visible(&self) -> bool {
        self.flags.is_visible
    }

    pub fn is_user_handleable(&self) -> bool {
        self.flags.is_user_handleable
    }

    pub fn has_constraint(&self) -> bool {
        self.flags.has_constraint
    }

    pub fn has_local_inherent(&self) -> bool {
        self.flags.has_local_inherent
    }

    pub fn has_inherent_orientation(&self) -> bool {
        self.flags.has_inherent_orientation
    }

    pub fn has_inherent_translation(&self) -> bool {
        self.flags.has_inherent_translation
    }

    pub fn has_fixed_axis(&self) -> bool {
        self.flags.has_fixed_axis
    }

    pub fn has_local_axes(&self) -> bool {
        self.flags.has_local_axes
    }

    pub fn is_affected_by_physics_simulation(&self) -> bool {
        self.flags.is_affected_by_physics_simulation
    }

    pub fn has_external_parent_bone(&self) -> bool {
        self.flags.has_external_parent_bone
    }

    pub(crate) fn set_origin(&mut self, value: F128) {
        self.origin = value;
    }

    pub(crate) fn set_destination_origin(&mut self, value: F128) {
        self.destination_origin = value;
    }

    pub(crate) fn set_fixed_axis(&mut self, value: F128) {
        self.fixed_axis = value;
    }

    pub(crate) fn set_local_x_axis(&mut self, value: F128) {
        self.local_x_axis = value;
    }

    pub(crate) fn set_local_z_axis(&mut self, value: F128) {
        self.local_z_axis = value;
    }

    pub(crate) fn set_inherent_coefficient(&mut self, value: f32) {
        self.inherent_coefficient = value;
    }

    pub(crate) fn set_stage_index(&mut self, value: i32) {
        self.stage_index = value;
    }

    pub(crate) fn set_global_bone_index(&mut self, value: i32) {
        self.global_bone_index = value;
    }

    pub(crate) fn set_type(&mut self, value: ModelBoneType) {
        self.typ = value;
    }

    pub(crate) fn set_parent_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.parent_bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_parent_inherent_bone_object(
        &mut self,
        value: Option<&Rc<RefCell<ModelBone>>>,
    ) {
        self.parent_inherent_bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_effector_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.effector_bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_target_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.target_bone = ObjectRef::from_object(value);
        self.flags.has_destination_bone_index = value.is_some();
    }

    pub(crate) fn set_constraint_object(&mut self, value: Option<&Rc<RefCell<ModelConstraint>>>) {
        self.constraint = value.cloned();
        self.flags.has_constraint = value.is_some();
    }

    pub(crate) fn set_constraint_enabled(&mut self, value: bool) {
        self.flags.has_constraint = value;
    }

    pub(crate) fn set_rotatable(&mut self, value: bool) {
        self.flags.is_rotatable = value;
    }

    pub(crate) fn set_movable(&mut self, value: bool) {
        self.flags.is_movable = value;
    }

    pub(crate) fn set_visible(&mut self, value: bool) {
        self.flags.is_visible = value;
    }

    pub(crate) fn set_user_handleable(&mut self, value: bool) {
        self.flags.is_user_handleable = value;
    }

    pub(crate) fn set_local_inherent_enabled(&mut self, value: bool) {
        self.flags.has_local_inherent = value;
    }

    pub(crate) fn set_inherent_orientation_enabled(&mut self, value: bool) {
        self.flags.has_inherent_orientation = value;
    }

    pub(crate) fn set_inherent_translation_enabled(&mut self, value: bool) {
        self.flags.has_inherent_translation = value;
    }

    pub(crate) fn set_fixed_axis_enabled(&mut self, value: bool) {
        self.flags.has_fixed_axis = value;
    }

    pub(crate) fn set_local_axes_enabled(&mut self, value: bool) {
        self.flags.has_local_axes = value;
    }

    pub(crate) fn set_affected_by_physics_simulation(&mut self, value: bool) {
        self.flags.is_affected_by_physics_simulation = value;
    }

    pub(crate) fn set_external_parent_bone_enabled(&mut self, value: bool) {
        self.flags.has_external_parent_bone = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelConstraintJoint {
    pub base: ModelObject,
    pub(crate) bone: ObjectRef<ModelBone>,
    pub(crate) has_angle_limit: bool,
    pub(crate) lower_limit: F128,
    pub(crate) upper_limit: F128,
}

impl ModelConstraintJoint {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelConstraintJoint, Status> {
        let mut joint = ModelConstraintJoint {
            bone: ObjectRef::from_index(
                buffer.read_integer_nullable(info.bone_index_size as usize)?,
            ),
            has_angle_limit: buffer.read_byte()? != 0u8,
            ..Default::default()
        };
        if joint.has_angle_limit {
            joint.lower_limit = buffer.read_f32_3_little_endian()?;
            joint.upper_limit = buffer.read_f32_3_little_endian()?;
        }
        Ok(joint)
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.bone.save_index(), info.bone_index_size as usize)?;
        buffer.write_byte(self.has_angle_limit as u8)?;
        if self.has_angle_limit {
            buffer.write_f32_3_little_endian(self.lower_limit)?;
            buffer.write_f32_3_little_endian(self.upper_limit)?;
        }
        Ok(())
    }

    pub fn get_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.bone.get()
    }

    pub fn has_angle_limit(&self) -> bool {
        self.has_angle_limit
    }

    pub fn get_lower_limit(&self) -> F128 {
        self.lower_limit
    }

    pub fn get_upper_limit(&self) -> F128 {
        self.upper_limit
    }

    pub(crate) fn set_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_angle_limit_enabled(&mut self, value: bool) {
        self.has_angle_limit = value;
    }

    pub(crate) fn set_lower_limit(&mut self, value: F128) {
        self.lower_limit = value;
    }

    pub(crate) fn set_upper_limit(&mut self, value: F128) {
        self.upper_limit = value;
    }
}

/// Inverse kinematics chain. PMX embeds it in the bone it belongs to, PMD
/// keeps a separate list where each entry names its target bone.
#[derive(Debug, Clone, Default)]
pub struct ModelConstraint {
    pub base: ModelObject,
    pub(crate) effector_bone: ObjectRef<ModelBone>,
    pub(crate) target_bone: ObjectRef<ModelBone>,
    pub(crate) num_iterations: i32,
    pub(crate) angle_limit: f32,
    pub(crate) joints: Vec<Rc<RefCell<ModelConstraintJoint>>>,
}

impl ModelConstraint {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelConstraint, Status> {
        let mut constraint = ModelConstraint {
            effector_bone: ObjectRef::from_index(
                buffer.read_integer_nullable(info.bone_index_size as usize)?,
            ),
            num_iterations: buffer.read_i32_little_endian()?,
            angle_limit: buffer.read_f32_little_endian()?,
            ..Default::default()
        };
        let num_joints = buffer.read_len()?;
        for i in 0..num_joints {
            let mut joint = ModelConstraintJoint::parse_pmx(info, buffer)?;
            joint.base.index = i as i32;
            constraint.joints.push(Rc::new(RefCell::new(joint)));
        }
        Ok(constraint)
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.effector_bone.save_index(), info.bone_index_size as usize)?;
        buffer.write_i32_little_endian(self.num_iterations)?;
        buffer.write_f32_little_endian(self.angle_limit)?;
        buffer.write_u32_little_endian(self.joints.len() as u32)?;
        for joint in &self.joints {
            joint.borrow().save_to_buffer_pmx(info, buffer)?;
        }
        Ok(())
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelConstraint, Status> {
        let mut constraint = ModelConstraint {
            target_bone: ObjectRef::from_index(buffer.read_i16_little_endian()? as i32),
            effector_bone: ObjectRef::from_index(buffer.read_i16_little_endian()? as i32),
            ..Default::default()
        };
        let num_joints = buffer.read_byte()? as usize;
        constraint.num_iterations = buffer.read_u16_little_endian()? as i32;
        constraint.angle_limit = buffer.read_f32_little_endian()?;
        for i in 0..num_joints {
            let joint = ModelConstraintJoint {
                base: ModelObject { index: i as i32 },
                bone: ObjectRef::from_index(buffer.read_i16_little_endian()? as i32),
                ..Default::default()
            };
            constraint.joints.push(Rc::new(RefCell::new(joint)));
        }
        Ok(constraint)
    }

    pub(crate) fn save_to_buffer_pmd(
        &self,
        target_bone_index: i32,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        let joints: Vec<_> = self.joints.iter().take(u8::MAX as usize).collect();
        if joints.len() < self.joints.len() {
            log::warn!(
                "PMD keeps only {} of {} constraint joints",
                joints.len(),
                self.joints.len()
            );
        }
        buffer.write_i16_little_endian(target_bone_index as i16)?;
        buffer.write_i16_little_endian(self.effector_bone.save_index() as i16)?;
        buffer.write_byte(joints.len() as u8)?;
        buffer.write_u16_little_endian(self.num_iterations.clamp(0, u16::MAX as i32) as u16)?;
        buffer.write_f32_little_endian(self.angle_limit)?;
        for joint in joints {
            buffer.write_i16_little_endian(joint.borrow().bone.save_index() as i16)?;
        }
        Ok(())
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        let bones = &parent_model.bones;
        self.effector_bone.resolve(bones);
        self.target_bone.resolve(bones);
        for joint in &self.joints {
            joint.borrow_mut().bone.resolve(bones);
        }
    }

    pub fn get_effector_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.effector_bone.get()
    }

    pub fn get_target_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.target_bone.get()
    }

    pub fn get_num_iterations(&self) -> i32 {
        self.num_iterations
    }

    pub fn get_angle_limit(&self) -> f32 {
        self.angle_limit
    }

    pub fn get_all_joint_objects(&self) -> &[Rc<RefCell<ModelConstraintJoint>>] {
        &self.joints
    }

    pub(crate) fn set_effector_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.effector_bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_target_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.target_bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_num_iterations(&mut self, value: i32) {
        self.num_iterations = value;
    }

    pub(crate) fn set_angle_limit(&mut self, value: f32) {
        self.angle_limit = value;
    }

    pub(crate) fn insert_joint_object(
        &mut self,
        joint: &Rc<RefCell<ModelConstraintJoint>>,
        index: i32,
    ) -> Result<(), Status> {
        super::insert_object(
            &mut self.joints,
            joint,
            index,
            Status::ErrorModelConstraintAlreadyExists,
        )
    }

    pub(crate) fn remove_joint_object(
        &mut self,
        joint: &Rc<RefCell<ModelConstraintJoint>>,
    ) -> Result<(), Status> {
        super::remove_object(
            &mut self.joints,
            joint,
            Status::ErrorModelConstraintJointNotFound,
        )
    }
}

#[test]
fn test_model_bone_flags_from_value() {
    let f = ModelBoneFlags::from_raw(33);
    assert!(f.has_destination_bone_index);
    assert!(f.has_constraint);
    assert!(!f.has_inherent_translation);
    assert_eq!(33, f.to_raw());
    // padding bit is dropped
    assert_eq!(0, ModelBoneFlags::from_raw(1 << 6).to_raw());
}

#[test]
fn test_model_bone_conditional_defaults() {
    let mut bone = ModelBone {
        destination_origin: F128([1.0, 2.0, 3.0, 0.0]),
        fixed_axis: F128([0.0, 1.0, 0.0, 0.0]),
        local_x_axis: F128([0.0, 0.0, 1.0, 0.0]),
        inherent_coefficient: 0.5,
        ..Default::default()
    };
    assert_eq!(F128([1.0, 2.0, 3.0, 0.0]), bone.get_destination_origin());
    assert_eq!(F128::ZERO, bone.get_fixed_axis());
    assert_eq!(F128::UNIT_X, bone.get_local_x_axis());
    assert_eq!(1.0, bone.get_inherent_coefficient());
    bone.flags.has_destination_bone_index = true;
    bone.flags.has_fixed_axis = true;
    bone.flags.has_local_axes = true;
    bone.flags.has_inherent_translation = true;
    assert_eq!(F128::ZERO, bone.get_destination_origin());
    assert_eq!(F128([0.0, 1.0, 0.0, 0.0]), bone.get_fixed_axis());
    assert_eq!(F128([0.0, 0.0, 1.0, 0.0]), bone.get_local_x_axis());
    assert_eq!(0.5, bone.get_inherent_coefficient());
}

#[test]
fn test_model_bone_target_sets_destination_flag() {
    let target = Rc::new(RefCell::new(ModelBone::default()));
    let mut bone = ModelBone::default();
    bone.set_target_bone_object(Some(&target));
    assert!(bone.flags.has_destination_bone_index);
    assert!(bone.get_target_bone_object().is_some());
    bone.set_target_bone_object(None);
    assert!(!bone.flags.has_destination_bone_index);
    assert!(bone.get_target_bone_object().is_none());
}

#[test]
fn test_model_bone_pmd_inherent_orientation_effector() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_fixed_string("bone", PMD_BONE_NAME_LENGTH)?;
    mutable_buffer.write_i16_little_endian(-1)?;
    mutable_buffer.write_i16_little_endian(3)?;
    mutable_buffer.write_byte(9)?;
    mutable_buffer.write_i16_little_endian(40)?;
    mutable_buffer.write_f32_3_little_endian(F128::ZERO)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let bone = ModelBone::parse_pmd(&mut buffer)?;
    assert!(buffer.is_end());
    assert_eq!(ModelBoneType::InherentOrientationEffector, bone.get_type());
    assert!(bone.has_inherent_orientation());
    assert!(!bone.is_visible());
    assert!((bone.get_inherent_coefficient() - 0.4).abs() < 1e-6);
    assert_eq!(ModelBoneType::InherentOrientationEffector, bone.type_pmd());
    Ok(())
}
