use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
};

use super::{Info, Model, ModelBone, ModelObject, ObjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelVertexType {
    Unknown = -1,
    #[default]
    BDEF1,
    BDEF2,
    BDEF4,
    SDEF,
    QDEF,
}

impl From<i32> for ModelVertexType {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::BDEF1,
            1 => Self::BDEF2,
            2 => Self::BDEF4,
            3 => Self::SDEF,
            4 => Self::QDEF,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelVertex {
    pub base: ModelObject,
    pub(crate) origin: F128,
    pub(crate) normal: F128,
    pub(crate) uv: F128,
    pub(crate) additional_uv: [F128; 4],
    pub(crate) typ: ModelVertexType,
    pub(crate) bones: [ObjectRef<ModelBone>; 4],
    pub(crate) bone_weights: F128,
    pub(crate) sdef_c: F128,
    pub(crate) sdef_r0: F128,
    pub(crate) sdef_r1: F128,
    pub(crate) edge_size: f32,
}

impl ModelVertex {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelVertex, Status> {
        let mut vertex = ModelVertex {
            origin: buffer.read_f32_3_little_endian()?,
            normal: buffer.read_f32_3_little_endian()?,
            uv: buffer.read_f32_2_little_endian()?,
            ..Default::default()
        };
        for i in 0..info.additional_uv_size as usize {
            vertex.additional_uv[i] = buffer.read_f32_4_little_endian()?;
        }
        vertex.typ = ModelVertexType::from(buffer.read_byte()? as i32);
        let bone_index_size = info.bone_index_size as usize;
        let read_bone = |buffer: &mut Buffer| -> Result<ObjectRef<ModelBone>, Status> {
            Ok(ObjectRef::from_index(
                buffer.read_integer_nullable(bone_index_size)?,
            ))
        };
        match vertex.typ {
            ModelVertexType::Unknown => return Err(Status::ErrorModelVertexCorrupted),
            ModelVertexType::BDEF1 => {
                vertex.bones[0] = read_bone(buffer)?;
                vertex.bone_weights.0[0] = 1.0f32;
            }
            ModelVertexType::BDEF2 => {
                vertex.bones[0] = read_bone(buffer)?;
                vertex.bones[1] = read_bone(buffer)?;
                vertex.bone_weights.0[0] = buffer.read_clamped_little_endian()?;
                vertex.bone_weights.0[1] = 1.0f32 - vertex.bone_weights.0[0];
            }
            ModelVertexType::BDEF4 | ModelVertexType::QDEF => {
                for bone in vertex.bones.iter_mut() {
                    *bone = read_bone(buffer)?;
                }
                vertex.bone_weights = buffer.read_f32_4_little_endian()?;
            }
            ModelVertexType::SDEF => {
                vertex.bones[0] = read_bone(buffer)?;
                vertex.bones[1] = read_bone(buffer)?;
                vertex.bone_weights.0[0] = buffer.read_clamped_little_endian()?;
                vertex.bone_weights.0[1] = 1.0f32 - vertex.bone_weights.0[0];
                vertex.sdef_c = buffer.read_f32_3_little_endian()?;
                vertex.sdef_c.0[3] = 1.0f32;
                vertex.sdef_r0 = buffer.read_f32_3_little_endian()?;
                vertex.sdef_r0.0[3] = 1.0f32;
                vertex.sdef_r1 = buffer.read_f32_3_little_endian()?;
                vertex.sdef_r1.0[3] = 1.0f32;
            }
        }
        vertex.edge_size = buffer.read_f32_little_endian()?;
        Ok(vertex)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        buffer.write_f32_3_little_endian(self.origin)?;
        buffer.write_f32_3_little_endian(self.normal)?;
        buffer.write_f32_2_little_endian(self.uv)?;
        for i in 0..info.additional_uv_size as usize {
            buffer.write_f32_4_little_endian(self.additional_uv[i])?;
        }
        let bone_index_size = info.bone_index_size as usize;
        let num_bones = match self.typ {
            ModelVertexType::Unknown => return Err(Status::ErrorModelVertexCorrupted),
            ModelVertexType::BDEF1 => 1,
            ModelVertexType::BDEF2 | ModelVertexType::SDEF => 2,
            ModelVertexType::BDEF4 | ModelVertexType::QDEF => 4,
        };
        buffer.write_byte(self.typ as u8)?;
        for bone in self.bones.iter().take(num_bones) {
            buffer.write_integer(bone.save_index(), bone_index_size)?;
        }
        match self.typ {
            ModelVertexType::BDEF2 => {
                buffer.write_f32_little_endian(self.bone_weights.0[0])?;
            }
            ModelVertexType::BDEF4 | ModelVertexType::QDEF => {
                buffer.write_f32_4_little_endian(self.bone_weights)?;
            }
            ModelVertexType::SDEF => {
                buffer.write_f32_little_endian(self.bone_weights.0[0])?;
                buffer.write_f32_3_little_endian(self.sdef_c)?;
                buffer.write_f32_3_little_endian(self.sdef_r0)?;
                buffer.write_f32_3_little_endian(self.sdef_r1)?;
            }
            ModelVertexType::BDEF1 | ModelVertexType::Unknown => {}
        }
        buffer.write_f32_little_endian(self.edge_size)
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelVertex, Status> {
        let mut vertex = ModelVertex {
            origin: buffer.read_f32_3_little_endian()?,
            normal: buffer.read_f32_3_little_endian()?,
            uv: buffer.read_f32_2_little_endian()?,
            typ: ModelVertexType::BDEF2,
            ..Default::default()
        };
        vertex.bones[0] = ObjectRef::from_index(buffer.read_i16_little_endian()? as i32);
        vertex.bones[1] = ObjectRef::from_index(buffer.read_i16_little_endian()? as i32);
        vertex.bone_weights.0[0] = buffer.read_byte()? as f32 / 100.0f32;
        vertex.bone_weights.0[1] = 1.0f32 - vertex.bone_weights.0[0];
        vertex.edge_size = if buffer.read_byte()? == 0 {
            1.0f32
        } else {
            0.0f32
        };
        Ok(vertex)
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_f32_3_little_endian(self.origin)?;
        buffer.write_f32_3_little_endian(self.normal)?;
        buffer.write_f32_2_little_endian(self.uv)?;
        buffer.write_i16_little_endian(self.bones[0].save_index() as i16)?;
        buffer.write_i16_little_endian(self.bones[1].save_index() as i16)?;
        let weight = if self.typ == ModelVertexType::BDEF1 {
            1.0f32
        } else {
            self.bone_weights.0[0]
        };
        buffer.write_byte((weight.clamp(0.0f32, 1.0f32) * 100.0f32).round() as u8)?;
        buffer.write_byte(if self.edge_size == 0.0f32 { 1 } else { 0 })
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        for bone in &mut self.bones {
            bone.resolve(&parent_model.bones);
        }
    }

    pub fn get_origin(&self) -> F128 {
        self.origin
    }

    pub fn get_normal(&self) -> F128 {
        self.normal
    }

    pub fn get_tex_coord(&self) -> F128 {
        self.uv
    }

    pub fn get_additional_uv(&self, index: usize) -> F128 {
        self.additional_uv.get(index).copied().unwrap_or_default()
    }

    pub fn get_sdef_c(&self) -> F128 {
        self.sdef_c
    }

    pub fn get_sdef_r0(&self) -> F128 {
        self.sdef_r0
    }

    pub fn get_sdef_r1(&self) -> F128 {
        self.sdef_r1
    }

    pub fn get_bone_object(&self, index: usize) -> Option<Rc<RefCell<ModelBone>>> {
        self.bones.get(index).and_then(|bone| bone.get())
    }

    pub fn get_bone_weight(&self, index: usize) -> f32 {
        self.bone_weights.0.get(index).copied().unwrap_or(0.0f32)
    }

    pub fn get_edge_size(&self) -> f32 {
        self.edge_size
    }

    pub fn get_type(&self) -> ModelVertexType {
        self.typ
    }

    pub(crate) fn set_origin(&mut self, value: F128) {
        self.origin = value;
    }

    pub(crate) fn set_normal(&mut self, value: F128) {
        self.normal = value;
    }

    pub(crate) fn set_tex_coord(&mut self, value: F128) {
        self.uv = value;
    }

    pub(crate) fn set_additional_uv(&mut self, value: F128, index: usize) {
        if let Some(uv) = self.additional_uv.get_mut(index) {
            *uv = value;
        }
    }

    pub(crate) fn set_sdef_c(&mut self, value: F128) {
        self.sdef_c = value;
    }

    pub(crate) fn set_sdef_r0(&mut self, value: F128) {
        self.sdef_r0 = value;
    }

    pub(crate) fn set_sdef_r1(&mut self, value: F128) {
        self.sdef_r1 = value;
    }

    pub(crate) fn set_bone_object(
        &mut self,
        value: Option<&Rc<RefCell<ModelBone>>>,
        index: usize,
    ) {
        if let Some(bone) = self.bones.get_mut(index) {
            *bone = ObjectRef::from_object(value);
        }
    }

    pub(crate) fn set_bone_weight(&mut self, value: f32, index: usize) {
        if let Some(weight) = self.bone_weights.0.get_mut(index) {
            *weight = value;
        }
    }

    pub(crate) fn set_edge_size(&mut self, value: f32) {
        self.edge_size = value;
    }

    pub(crate) fn set_type(&mut self, value: ModelVertexType) {
        self.typ = value;
    }
}
