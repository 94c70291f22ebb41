use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
};

use super::{
    Info, Model, ModelBone, ModelObject, ObjectRef, PMD_JOINT_NAME_LENGTH,
    PMD_RIGID_BODY_NAME_LENGTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelRigidBodyShapeType {
    Unknown = -1,
    #[default]
    Sphere,
    Box,
    Capsule,
}

impl From<u8> for ModelRigidBodyShapeType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelRigidBodyShapeType::Sphere,
            1 => ModelRigidBodyShapeType::Box,
            2 => ModelRigidBodyShapeType::Capsule,
            _ => ModelRigidBodyShapeType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelRigidBodyTransformType {
    Unknown = -1,
    #[default]
    FromBoneToSimulation,
    FromSimulationToBone,
    FromBoneOrientationAndSimulationToBone,
}

impl From<u8> for ModelRigidBodyTransformType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelRigidBodyTransformType::FromBoneToSimulation,
            1 => ModelRigidBodyTransformType::FromSimulationToBone,
            2 => ModelRigidBodyTransformType::FromBoneOrientationAndSimulationToBone,
            _ => ModelRigidBodyTransformType::Unknown,
        }
    }
}

/// PMD rigid bodies are positioned relative to their bone, PMX ones are
/// in model space.
#[derive(Debug, Clone, Default)]
pub struct ModelRigidBody {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) bone: ObjectRef<ModelBone>,
    pub(crate) collision_group_id: i32,
    pub(crate) collision_mask: i32,
    pub(crate) shape_type: ModelRigidBodyShapeType,
    pub(crate) size: F128,
    pub(crate) origin: F128,
    pub(crate) orientation: F128,
    pub(crate) mass: f32,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) restitution: f32,
    pub(crate) friction: f32,
    pub(crate) transform_type: ModelRigidBodyTransformType,
    pub(crate) is_bone_relative: bool,
}

impl ModelRigidBody {
    fn read_body(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        self.collision_group_id = buffer.read_byte()? as i32;
        self.collision_mask = buffer.read_u16_little_endian()? as i32;
        self.shape_type = buffer.read_byte()?.into();
        self.size = buffer.read_f32_3_little_endian()?;
        self.origin = buffer.read_f32_3_little_endian()?;
        self.orientation = buffer.read_f32_3_little_endian()?;
        self.mass = buffer.read_f32_little_endian()?;
        self.linear_damping = buffer.read_f32_little_endian()?;
        self.angular_damping = buffer.read_f32_little_endian()?;
        self.restitution = buffer.read_f32_little_endian()?;
        self.friction = buffer.read_f32_little_endian()?;
        self.transform_type = buffer.read_byte()?.into();
        Ok(())
    }

    fn write_body(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_byte(self.collision_group_id as u8)?;
        buffer.write_u16_little_endian(self.collision_mask as u16)?;
        buffer.write_byte(self.shape_type as u8)?;
        buffer.write_f32_3_little_endian(self.size)?;
        buffer.write_f32_3_little_endian(self.origin)?;
        buffer.write_f32_3_little_endian(self.orientation)?;
        buffer.write_f32_little_endian(self.mass)?;
        buffer.write_f32_little_endian(self.linear_damping)?;
        buffer.write_f32_little_endian(self.angular_damping)?;
        buffer.write_f32_little_endian(self.restitution)?;
        buffer.write_f32_little_endian(self.friction)?;
        buffer.write_byte(self.transform_type as u8)
    }

    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelRigidBody, Status> {
        let mut rigid_body = ModelRigidBody {
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            bone: ObjectRef::from_index(
                buffer.read_integer_nullable(info.bone_index_size as usize)?,
            ),
            ..Default::default()
        };
        rigid_body.read_body(buffer)?;
        Ok(rigid_body)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_integer(self.bone.save_index(), info.bone_index_size as usize)?;
        self.write_body(buffer)
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelRigidBody, Status> {
        let mut rigid_body = ModelRigidBody {
            name_ja: buffer
                .read_string_from_cp932(PMD_RIGID_BODY_NAME_LENGTH)
                .map_err(|_| Status::ErrorModelRigidBodyCorrupted)?,
            bone: ObjectRef::from_index(buffer.read_i16_little_endian()? as i32),
            is_bone_relative: true,
            ..Default::default()
        };
        rigid_body.read_body(buffer)?;
        Ok(rigid_body)
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_fixed_string(&self.name_ja, PMD_RIGID_BODY_NAME_LENGTH)?;
        buffer.write_i16_little_endian(self.bone.save_index() as i16)?;
        self.write_body(buffer)
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        self.bone.resolve(&parent_model.bones);
    }

    impl_name_accessors!();

    pub fn get_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.bone.get()
    }

    pub fn get_collision_group_id(&self) -> i32 {
        self.collision_group_id
    }

    pub fn get_collision_mask(&self) -> i32 {
        self.collision_mask
    }

    pub fn get_shape_type(&self) -> ModelRigidBodyShapeType {
        self.shape_type
    }

    pub fn get_size(&self) -> F128 {
        self.size
    }

    pub fn get_origin(&self) -> F128 {
        self.origin
    }

    pub fn get_orientation(&self) -> F128 {
        self.orientation
    }

    pub fn get_mass(&self) -> f32 {
        self.mass
    }

    pub fn get_linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn get_angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn get_restitution(&self) -> f32 {
        self.restitution
    }

    pub fn get_friction(&self) -> f32 {
        self.friction
    }

    pub fn get_transform_type(&self) -> ModelRigidBodyTransformType {
        self.transform_type
    }

    pub fn is_bone_relative(&self) -> bool {
        self.is_bone_relative
    }

    pub(crate) fn set_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_collision_group_id(&mut self, value: i32) {
        self.collision_group_id = value;
    }

    pub(crate) fn set_collision_mask(&mut self, value: i32) {
        self.collision_mask = value;
    }

    pub(crate) fn set_shape_type(&mut self, value: ModelRigidBodyShapeType) {
        self.shape_type = value;
    }

    pub(crate) fn set_size(&mut self, value: F128) {
        self.size = value;
    }

    pub(crate) fn set_origin(&mut self, value: F128) {
        self.origin = value;
    }

    pub(crate) fn set_orientation(&mut self, value: F128) {
        self.orientation = value;
    }

    pub(crate) fn set_mass(&mut self, value: f32) {
        self.mass = value;
    }

    pub(crate) fn set_linear_damping(&mut self, value: f32) {
        self.linear_damping = value;
    }

    pub(crate) fn set_angular_damping(&mut self, value: f32) {
        self.angular_damping = value;
    }

    pub(crate) fn set_restitution(&mut self, value: f32) {
        self.restitution = value;
    }

    pub(crate) fn set_friction(&mut self, value: f32) {
        self.friction = value;
    }

    pub(crate) fn set_transform_type(&mut self, value: ModelRigidBodyTransformType) {
        self.transform_type = value;
    }

    pub(crate) fn set_bone_relative(&mut self, value: bool) {
        self.is_bone_relative = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelJointType {
    Unknown = -1,
    #[default]
    Generic6dofSpringConstraint,
    Generic6dofConstraint,
    Point2pointConstraint,
    ConeTwistConstraint,
    SliderConstraint,
    HingeConstraint,
}

impl From<u8> for ModelJointType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelJointType::Generic6dofSpringConstraint,
            1 => ModelJointType::Generic6dofConstraint,
            2 => ModelJointType::Point2pointConstraint,
            3 => ModelJointType::ConeTwistConstraint,
            4 => ModelJointType::SliderConstraint,
            5 => ModelJointType::HingeConstraint,
            _ => ModelJointType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelJoint {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) rigid_body_a: ObjectRef<ModelRigidBody>,
    pub(crate) rigid_body_b: ObjectRef<ModelRigidBody>,
    pub(crate) typ: ModelJointType,
    pub(crate) origin: F128,
    pub(crate) orientation: F128,
    pub(crate) linear_lower_limit: F128,
    pub(crate) linear_upper_limit: F128,
    pub(crate) angular_lower_limit: F128,
    pub(crate) angular_upper_limit: F128,
    pub(crate) linear_stiffness: F128,
    pub(crate) angular_stiffness: F128,
}

impl ModelJoint {
    fn read_body(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        self.origin = buffer.read_f32_3_little_endian()?;
        self.orientation = buffer.read_f32_3_little_endian()?;
        self.linear_lower_limit = buffer.read_f32_3_little_endian()?;
        self.linear_upper_limit = buffer.read_f32_3_little_endian()?;
        self.angular_lower_limit = buffer.read_f32_3_little_endian()?;
        self.angular_upper_limit = buffer.read_f32_3_little_endian()?;
        self.linear_stiffness = buffer.read_f32_3_little_endian()?;
        self.angular_stiffness = buffer.read_f32_3_little_endian()?;
        Ok(())
    }

    fn write_body(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        for value in [
            self.origin,
            self.orientation,
            self.linear_lower_limit,
            self.linear_upper_limit,
            self.angular_lower_limit,
            self.angular_upper_limit,
            self.linear_stiffness,
            self.angular_stiffness,
        ] {
            buffer.write_f32_3_little_endian(value)?;
        }
        Ok(())
    }

    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelJoint, Status> {
        let rigid_body_index_size = info.rigid_body_index_size as usize;
        let mut joint = ModelJoint {
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            typ: buffer.read_byte()?.into(),
            rigid_body_a: ObjectRef::from_index(
                buffer.read_integer_nullable(rigid_body_index_size)?,
            ),
            rigid_body_b: ObjectRef::from_index(
                buffer.read_integer_nullable(rigid_body_index_size)?,
            ),
            ..Default::default()
        };
        joint.read_body(buffer)?;
        Ok(joint)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        let rigid_body_index_size = info.rigid_body_index_size as usize;
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_byte(self.typ as u8)?;
        buffer.write_integer(self.rigid_body_a.save_index(), rigid_body_index_size)?;
        buffer.write_integer(self.rigid_body_b.save_index(), rigid_body_index_size)?;
        self.write_body(buffer)
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelJoint, Status> {
        let mut joint = ModelJoint {
            name_ja: buffer
                .read_string_from_cp932(PMD_JOINT_NAME_LENGTH)
                .map_err(|_| Status::ErrorModelJointCorrupted)?,
            rigid_body_a: ObjectRef::from_index(buffer.read_i32_little_endian()?),
            rigid_body_b: ObjectRef::from_index(buffer.read_i32_little_endian()?),
            typ: ModelJointType::Generic6dofSpringConstraint,
            ..Default::default()
        };
        joint.read_body(buffer)?;
        Ok(joint)
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_fixed_string(&self.name_ja, PMD_JOINT_NAME_LENGTH)?;
        buffer.write_i32_little_endian(self.rigid_body_a.save_index())?;
        buffer.write_i32_little_endian(self.rigid_body_b.save_index())?;
        self.write_body(buffer)
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        self.rigid_body_a.resolve(&parent_model.rigid_bodies);
        self.rigid_body_b.resolve(&parent_model.rigid_bodies);
    }

    impl_name_accessors!();

    pub fn get_rigid_body_a_object(&self) -> Option<Rc<RefCell<ModelRigidBody>>> {
        self.rigid_body_a.get()
    }

    pub fn get_rigid_body_b_object(&self) -> Option<Rc<RefCell<ModelRigidBody>>> {
        self.rigid_body_b.get()
    }

    pub fn get_type(&self) -> ModelJointType {
        self.typ
    }

    pub fn get_origin(&self) -> F128 {
        self.origin
    }

    pub fn get_orientation(&self) -> F128 {
        self.orientation
    }

    pub fn get_linear_lower_limit(&self) -> F128 {
        self.linear_lower_limit
    }

    pub fn get_linear_upper_limit(&self) -> F128 {
        self.linear_upper_limit
    }

    pub fn get_angular_lower_limit(&self) -> F128 {
        self.angular_lower_limit
    }

    pub fn get_angular_upper_limit(&self) -> F128 {
        self.angular_upper_limit
    }

    pub fn get_linear_stiffness(&self) -> F128 {
        self.linear_stiffness
    }

    pub fn get_angular_stiffness(&self) -> F128 {
        self.angular_stiffness
    }

    pub(crate) fn set_rigid_body_a_object(&mut self, value: Option<&Rc<RefCell<ModelRigidBody>>>) {
        self.rigid_body_a = ObjectRef::from_object(value);
    }

    pub(crate) fn set_rigid_body_b_object(&mut self, value: Option<&Rc<RefCell<ModelRigidBody>>>) {
        self.rigid_body_b = ObjectRef::from_object(value);
    }

    pub(crate) fn set_type(&mut self, value: ModelJointType) {
        self.typ = value;
    }

    pub(crate) fn set_origin(&mut self, value: F128) {
        self.origin = value;
    }

    pub(crate) fn set_orientation(&mut self, value: F128) {
        self.orientation = value;
    }

    pub(crate) fn set_linear_lower_limit(&mut self, value: F128) {
        self.linear_lower_limit = value;
    }

    pub(crate) fn set_linear_upper_limit(&mut self, value: F128) {
        self.linear_upper_limit = value;
    }

    pub(crate) fn set_angular_lower_limit(&mut self, value: F128) {
        self.angular_lower_limit = value;
    }

    pub(crate) fn set_angular_upper_limit(&mut self, value: F128) {
        self.angular_upper_limit = value;
    }

    pub(crate) fn set_linear_stiffness(&mut self, value: F128) {
        self.linear_stiffness = value;
    }

    pub(crate) fn set_angular_stiffness(&mut self, value: F128) {
        self.angular_stiffness = value;
    }
}

#[test]
fn test_model_rigid_body_unknown_shape_kept_raw() -> Result<(), Status> {
    let rigid_body = ModelRigidBody {
        shape_type: ModelRigidBodyShapeType::Unknown,
        ..Default::default()
    };
    let mut mutable_buffer = MutableBuffer::create()?;
    rigid_body.save_to_buffer_pmd(&mut mutable_buffer)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let loaded = ModelRigidBody::parse_pmd(&mut buffer)?;
    assert!(buffer.is_end());
    assert_eq!(ModelRigidBodyShapeType::Unknown, loaded.get_shape_type());
    assert!(loaded.is_bone_relative());
    Ok(())
}
