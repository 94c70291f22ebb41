use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
};

use super::{
    insert_object, remove_object, Info, Model, ModelBone, ModelFormatType, ModelMaterial,
    ModelObject, ModelRigidBody, ModelVertex, ObjectRef, PMD_MORPH_NAME_LENGTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelMorphCategory {
    Unknown = -1,
    Base,
    Eyebrow,
    Eye,
    Lip,
    #[default]
    Other,
}

impl From<u8> for ModelMorphCategory {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelMorphCategory::Base,
            1 => ModelMorphCategory::Eyebrow,
            2 => ModelMorphCategory::Eye,
            3 => ModelMorphCategory::Lip,
            4 => ModelMorphCategory::Other,
            _ => ModelMorphCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelMorphType {
    Unknown = -1,
    Group,
    #[default]
    Vertex,
    Bone,
    Texture,
    Uva1,
    Uva2,
    Uva3,
    Uva4,
    Material,
    Flip,
    Impulse,
}

impl From<u8> for ModelMorphType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelMorphType::Group,
            1 => ModelMorphType::Vertex,
            2 => ModelMorphType::Bone,
            3 => ModelMorphType::Texture,
            4 => ModelMorphType::Uva1,
            5 => ModelMorphType::Uva2,
            6 => ModelMorphType::Uva3,
            7 => ModelMorphType::Uva4,
            8 => ModelMorphType::Material,
            9 => ModelMorphType::Flip,
            10 => ModelMorphType::Impulse,
            _ => ModelMorphType::Unknown,
        }
    }
}

impl ModelMorphType {
    fn is_uv(&self) -> bool {
        matches!(
            self,
            ModelMorphType::Texture
                | ModelMorphType::Uva1
                | ModelMorphType::Uva2
                | ModelMorphType::Uva3
                | ModelMorphType::Uva4
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelMorphMaterialOperationType {
    Unknown = -1,
    #[default]
    Multiply,
    Add,
}

impl From<u8> for ModelMorphMaterialOperationType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelMorphMaterialOperationType::Multiply,
            1 => ModelMorphMaterialOperationType::Add,
            _ => ModelMorphMaterialOperationType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorphBone {
    pub base: ModelObject,
    pub(crate) bone: ObjectRef<ModelBone>,
    pub(crate) translation: F128,
    pub(crate) orientation: F128,
}

impl ModelMorphBone {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphBone, Status> {
        Ok(ModelMorphBone {
            base: ModelObject::default(),
            bone: ObjectRef::from_index(
                buffer.read_integer_nullable(info.bone_index_size as usize)?,
            ),
            translation: buffer.read_f32_3_little_endian()?,
            orientation: buffer.read_f32_4_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.bone.save_index(), info.bone_index_size as usize)?;
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_4_little_endian(self.orientation)
    }

    pub fn get_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        self.bone.get()
    }

    pub fn get_translation(&self) -> F128 {
        self.translation
    }

    pub fn get_orientation(&self) -> F128 {
        self.orientation
    }

    pub(crate) fn set_bone_object(&mut self, value: Option<&Rc<RefCell<ModelBone>>>) {
        self.bone = ObjectRef::from_object(value);
    }

    pub(crate) fn set_translation(&mut self, value: F128) {
        self.translation = value;
    }

    pub(crate) fn set_orientation(&mut self, value: F128) {
        self.orientation = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorphGroup {
    pub base: ModelObject,
    pub(crate) morph: ObjectRef<ModelMorph>,
    pub(crate) weight: f32,
}

impl ModelMorphGroup {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphGroup, Status> {
        Ok(ModelMorphGroup {
            base: ModelObject::default(),
            morph: ObjectRef::from_index(
                buffer.read_integer_nullable(info.morph_index_size as usize)?,
            ),
            weight: buffer.read_f32_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.morph.save_index(), info.morph_index_size as usize)?;
        buffer.write_f32_little_endian(self.weight)
    }

    pub fn get_morph_object(&self) -> Option<Rc<RefCell<ModelMorph>>> {
        self.morph.get()
    }

    pub fn get_weight(&self) -> f32 {
        self.weight
    }

    pub(crate) fn set_morph_object(&mut self, value: Option<&Rc<RefCell<ModelMorph>>>) {
        self.morph = ObjectRef::from_object(value);
    }

    pub(crate) fn set_weight(&mut self, value: f32) {
        self.weight = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorphFlip {
    pub base: ModelObject,
    pub(crate) morph: ObjectRef<ModelMorph>,
    pub(crate) weight: f32,
}

impl ModelMorphFlip {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphFlip, Status> {
        Ok(ModelMorphFlip {
            base: ModelObject::default(),
            morph: ObjectRef::from_index(
                buffer.read_integer_nullable(info.morph_index_size as usize)?,
            ),
            weight: buffer.read_f32_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.morph.save_index(), info.morph_index_size as usize)?;
        buffer.write_f32_little_endian(self.weight)
    }

    pub fn get_morph_object(&self) -> Option<Rc<RefCell<ModelMorph>>> {
        self.morph.get()
    }

    pub fn get_weight(&self) -> f32 {
        self.weight
    }

    pub(crate) fn set_morph_object(&mut self, value: Option<&Rc<RefCell<ModelMorph>>>) {
        self.morph = ObjectRef::from_object(value);
    }

    pub(crate) fn set_weight(&mut self, value: f32) {
        self.weight = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorphImpulse {
    pub base: ModelObject,
    pub(crate) rigid_body: ObjectRef<ModelRigidBody>,
    pub(crate) is_local: bool,
    pub(crate) velocity: F128,
    pub(crate) torque: F128,
}

impl ModelMorphImpulse {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphImpulse, Status> {
        Ok(ModelMorphImpulse {
            base: ModelObject::default(),
            rigid_body: ObjectRef::from_index(
                buffer.read_integer_nullable(info.rigid_body_index_size as usize)?,
            ),
            is_local: buffer.read_byte()? != 0,
            velocity: buffer.read_f32_3_little_endian()?,
            torque: buffer.read_f32_3_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(
            self.rigid_body.save_index(),
            info.rigid_body_index_size as usize,
        )?;
        buffer.write_byte(self.is_local as u8)?;
        buffer.write_f32_3_little_endian(self.velocity)?;
        buffer.write_f32_3_little_endian(self.torque)
    }

    pub fn get_rigid_body_object(&self) -> Option<Rc<RefCell<ModelRigidBody>>> {
        self.rigid_body.get()
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn get_velocity(&self) -> F128 {
        self.velocity
    }

    pub fn get_torque(&self) -> F128 {
        self.torque
    }

    pub(crate) fn set_rigid_body_object(&mut self, value: Option<&Rc<RefCell<ModelRigidBody>>>) {
        self.rigid_body = ObjectRef::from_object(value);
    }

    pub(crate) fn set_local(&mut self, value: bool) {
        self.is_local = value;
    }

    pub(crate) fn set_velocity(&mut self, value: F128) {
        self.velocity = value;
    }

    pub(crate) fn set_torque(&mut self, value: F128) {
        self.torque = value;
    }
}

/// A missing material targets every material of the model.
#[derive(Debug, Clone, Default)]
pub struct ModelMorphMaterial {
    pub base: ModelObject,
    pub(crate) material: ObjectRef<ModelMaterial>,
    pub(crate) operation: ModelMorphMaterialOperationType,
    pub(crate) diffuse_color: F128,
    pub(crate) diffuse_opacity: f32,
    pub(crate) specular_color: F128,
    pub(crate) specular_power: f32,
    pub(crate) ambient_color: F128,
    pub(crate) edge_color: F128,
    pub(crate) edge_opacity: f32,
    pub(crate) edge_size: f32,
    pub(crate) diffuse_texture_blend: F128,
    pub(crate) sphere_map_texture_blend: F128,
    pub(crate) toon_texture_blend: F128,
}

impl ModelMorphMaterial {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphMaterial, Status> {
        Ok(ModelMorphMaterial {
            base: ModelObject::default(),
            material: ObjectRef::from_index(
                buffer.read_integer_nullable(info.material_index_size as usize)?,
            ),
            operation: buffer.read_byte()?.into(),
            diffuse_color: buffer.read_f32_3_little_endian()?,
            diffuse_opacity: buffer.read_f32_little_endian()?,
            specular_color: buffer.read_f32_3_little_endian()?,
            specular_power: buffer.read_f32_little_endian()?,
            ambient_color: buffer.read_f32_3_little_endian()?,
            edge_color: buffer.read_f32_3_little_endian()?,
            edge_opacity: buffer.read_f32_little_endian()?,
            edge_size: buffer.read_f32_little_endian()?,
            diffuse_texture_blend: buffer.read_f32_4_little_endian()?,
            sphere_map_texture_blend: buffer.read_f32_4_little_endian()?,
            toon_texture_blend: buffer.read_f32_4_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(
            self.material.save_index(),
            info.material_index_size as usize,
        )?;
        buffer.write_byte(self.operation as u8)?;
        buffer.write_f32_3_little_endian(self.diffuse_color)?;
        buffer.write_f32_little_endian(self.diffuse_opacity)?;
        buffer.write_f32_3_little_endian(self.specular_color)?;
        buffer.write_f32_little_endian(self.specular_power)?;
        buffer.write_f32_3_little_endian(self.ambient_color)?;
        buffer.write_f32_3_little_endian(self.edge_color)?;
        buffer.write_f32_little_endian(self.edge_opacity)?;
        buffer.write_f32_little_endian(self.edge_size)?;
        buffer.write_f32_4_little_endian(self.diffuse_texture_blend)?;
        buffer.write_f32_4_little_endian(self.sphere_map_texture_blend)?;
        buffer.write_f32_4_little_endian(self.toon_texture_blend)
    }

    pub fn get_material_object(&self) -> Option<Rc<RefCell<ModelMaterial>>> {
        self.material.get()
    }

    pub fn get_operation_type(&self) -> ModelMorphMaterialOperationType {
        self.operation
    }

    pub fn get_diffuse_color(&self) -> F128 {
        self.diffuse_color
    }

    pub fn get_diffuse_opacity(&self) -> f32 {
        self.diffuse_opacity
    }

    pub fn get_specular_color(&self) -> F128 {
        self.specular_color
    }

    pub fn get_specular_power(&self) -> f32 {
        self.specular_power
    }

    pub fn get_ambient_color(&self) -> F128 {
        self.ambient_color
    }

    pub fn get_edge_color(&self) -> F128 {
        self.edge_color
    }

    pub fn get_edge_opacity(&self) -> f32 {
        self.edge_opacity
    }

    pub fn get_edge_size(&self) -> f32 {
        self.edge_size
    }

    pub fn get_diffuse_texture_blend(&self) -> F128 {
        self.diffuse_texture_blend
    }

    pub fn get_sphere_map_texture_blend(&self) -> F128 {
        self.sphere_map_texture_blend
    }

    pub fn get_toon_texture_blend(&self) -> F128 {
        self.toon_texture_blend
    }

    pub(crate) fn set_material_object(&mut self, value: Option<&Rc<RefCell<ModelMaterial>>>) {
        self.material = ObjectRef::from_object(value);
    }

    pub(crate) fn set_operation_type(&mut self, value: ModelMorphMaterialOperationType) {
        self.operation = value;
    }

    pub(crate) fn set_diffuse_color(&mut self, value: F128) {
        self.diffuse_color = value;
    }

    pub(crate) fn set_diffuse_opacity(&mut self, value: f32) {
        self.diffuse_opacity = value;
    }

    pub(crate) fn set_specular_color(&mut self, value: F128) {
        self.specular_color = value;
    }

    pub(crate) fn set_specular_power(&mut self, value: f32) {
        self.specular_power = value;
    }

    pub(crate) fn set_ambient_color(&mut self, value: F128) {
        self.ambient_color = value;
    }

    pub(crate) fn set_edge_color(&mut self, value: F128) {
        self.edge_color = value;
    }

    pub(crate) fn set_edge_opacity(&mut self, value: f32) {
        self.edge_opacity = value;
    }

    pub(crate) fn set_edge_size(&mut self, value: f32) {
        self.edge_size = value;
    }

    pub(crate) fn set_diffuse_texture_blend(&mut self, value: F128) {
        self.diffuse_texture_blend = value;
    }

    pub(crate) fn set_sphere_map_texture_blend(&mut self, value: F128) {
        self.sphere_map_texture_blend = value;
    }

    pub(crate) fn set_toon_texture_blend(&mut self, value: F128) {
        self.toon_texture_blend = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorphUv {
    pub base: ModelObject,
    pub(crate) vertex: ObjectRef<ModelVertex>,
    pub(crate) position: F128,
}

impl ModelMorphUv {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphUv, Status> {
        Ok(ModelMorphUv {
            base: ModelObject::default(),
            vertex: ObjectRef::from_index(buffer.read_integer(info.vertex_index_size as usize)?),
            position: buffer.read_f32_4_little_endian()?,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.vertex.save_index(), info.vertex_index_size as usize)?;
        buffer.write_f32_4_little_endian(self.position)
    }

    pub fn get_vertex_object(&self) -> Option<Rc<RefCell<ModelVertex>>> {
        self.vertex.get()
    }

    pub fn get_position(&self) -> F128 {
        self.position
    }

    pub(crate) fn set_vertex_object(&mut self, value: Option<&Rc<RefCell<ModelVertex>>>) {
        self.vertex = ObjectRef::from_object(value);
    }

    pub(crate) fn set_position(&mut self, value: F128) {
        self.position = value;
    }
}

/// `relative_index` is the position inside the base morph that a PMD file
/// used to address the vertex, kept for writing it back.
#[derive(Debug, Clone)]
pub struct ModelMorphVertex {
    pub base: ModelObject,
    pub(crate) vertex: ObjectRef<ModelVertex>,
    pub(crate) relative_index: i32,
    pub(crate) position: F128,
}

impl Default for ModelMorphVertex {
    fn default() -> Self {
        Self {
            base: ModelObject::default(),
            vertex: ObjectRef::none(),
            relative_index: -1,
            position: F128::default(),
        }
    }
}

impl ModelMorphVertex {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorphVertex, Status> {
        Ok(ModelMorphVertex {
            vertex: ObjectRef::from_index(buffer.read_integer(info.vertex_index_size as usize)?),
            position: buffer.read_f32_3_little_endian()?,
            ..Default::default()
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(self.vertex.save_index(), info.vertex_index_size as usize)?;
        buffer.write_f32_3_little_endian(self.position)
    }

    fn parse_pmd(buffer: &mut Buffer) -> Result<ModelMorphVertex, Status> {
        Ok(ModelMorphVertex {
            vertex: ObjectRef::from_index(buffer.read_i32_little_endian()?),
            position: buffer.read_f32_3_little_endian()?,
            ..Default::default()
        })
    }

    fn vertex_index(&self) -> i32 {
        if self.vertex.pending_index >= 0 {
            self.vertex.pending_index
        } else {
            self.vertex.save_index()
        }
    }

    pub fn get_vertex_object(&self) -> Option<Rc<RefCell<ModelVertex>>> {
        self.vertex.get()
    }

    pub fn get_position(&self) -> F128 {
        self.position
    }

    pub(crate) fn set_vertex_object(&mut self, value: Option<&Rc<RefCell<ModelVertex>>>) {
        self.vertex = ObjectRef::from_object(value);
    }

    pub(crate) fn set_position(&mut self, value: F128) {
        self.position = value;
    }
}

#[derive(Debug, Clone)]
pub enum ModelMorphU {
    Groups(Vec<Rc<RefCell<ModelMorphGroup>>>),
    Vertices(Vec<Rc<RefCell<ModelMorphVertex>>>),
    Bones(Vec<Rc<RefCell<ModelMorphBone>>>),
    Uvs(Vec<Rc<RefCell<ModelMorphUv>>>),
    Materials(Vec<Rc<RefCell<ModelMorphMaterial>>>),
    Flips(Vec<Rc<RefCell<ModelMorphFlip>>>),
    Impulses(Vec<Rc<RefCell<ModelMorphImpulse>>>),
}

impl ModelMorphU {
    fn empty_for(typ: ModelMorphType) -> ModelMorphU {
        match typ {
            ModelMorphType::Group => ModelMorphU::Groups(vec![]),
            ModelMorphType::Bone => ModelMorphU::Bones(vec![]),
            ModelMorphType::Material => ModelMorphU::Materials(vec![]),
            ModelMorphType::Flip => ModelMorphU::Flips(vec![]),
            ModelMorphType::Impulse => ModelMorphU::Impulses(vec![]),
            ModelMorphType::Texture
            | ModelMorphType::Uva1
            | ModelMorphType::Uva2
            | ModelMorphType::Uva3
            | ModelMorphType::Uva4 => ModelMorphU::Uvs(vec![]),
            ModelMorphType::Vertex | ModelMorphType::Unknown => ModelMorphU::Vertices(vec![]),
        }
    }

    fn len(&self) -> usize {
        match self {
            ModelMorphU::Groups(v) => v.len(),
            ModelMorphU::Vertices(v) => v.len(),
            ModelMorphU::Bones(v) => v.len(),
            ModelMorphU::Uvs(v) => v.len(),
            ModelMorphU::Materials(v) => v.len(),
            ModelMorphU::Flips(v) => v.len(),
            ModelMorphU::Impulses(v) => v.len(),
        }
    }
}

impl Default for ModelMorphU {
    fn default() -> Self {
        ModelMorphU::Vertices(vec![])
    }
}

fn parse_children<T, F>(
    buffer: &mut Buffer,
    num_objects: usize,
    parse: F,
) -> Result<Vec<Rc<RefCell<T>>>, Status>
where
    T: super::ModelObjectBase,
    F: Fn(&mut Buffer) -> Result<T, Status>,
{
    super::parse_objects(buffer, num_objects, parse)
}

#[derive(Debug, Clone, Default)]
pub struct ModelMorph {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) typ: ModelMorphType,
    pub(crate) category: ModelMorphCategory,
    pub(crate) u: ModelMorphU,
}

macro_rules! impl_morph_children {
    ($variant:ident, $typ:ty, $get:ident, $insert:ident, $remove:ident, $matches:expr, $min_format:expr, $not_found:expr) => {
        pub fn $get(&self) -> &[Rc<RefCell<$typ>>] {
            match &self.u {
                ModelMorphU::$variant(items) => items,
                _ => &[],
            }
        }

        pub(crate) fn $insert(
            &mut self,
            child: &Rc<RefCell<$typ>>,
            index: i32,
            format_type: ModelFormatType,
        ) -> Result<(), Status> {
            let matches: fn(ModelMorphType) -> bool = $matches;
            if !matches(self.typ) {
                return Err(Status::ErrorModelMorphTypeMismatch);
            }
            if format_type < $min_format {
                return Err(Status::ErrorModelVersionIncompatible);
            }
            match &mut self.u {
                ModelMorphU::$variant(items) => {
                    insert_object(items, child, index, Status::ErrorModelMorphAlreadyExists)
                }
                _ => Err(Status::ErrorModelMorphTypeMismatch),
            }
        }

        pub(crate) fn $remove(&mut self, child: &Rc<RefCell<$typ>>) -> Result<(), Status> {
            match &mut self.u {
                ModelMorphU::$variant(items) => remove_object(items, child, $not_found),
                _ => Err(Status::ErrorModelMorphTypeMismatch),
            }
        }
    };
}

impl ModelMorph {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMorph, Status> {
        let mut morph = ModelMorph {
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            category: ModelMorphCategory::from(buffer.read_byte()?),
            typ: ModelMorphType::from(buffer.read_byte()?),
            ..Default::default()
        };
        let num_objects = buffer.read_len()?;
        morph.u = match morph.typ {
            ModelMorphType::Bone => ModelMorphU::Bones(parse_children(buffer, num_objects, |b| {
                ModelMorphBone::parse_pmx(info, b)
            })?),
            ModelMorphType::Flip => ModelMorphU::Flips(parse_children(buffer, num_objects, |b| {
                ModelMorphFlip::parse_pmx(info, b)
            })?),
            ModelMorphType::Group => {
                ModelMorphU::Groups(parse_children(buffer, num_objects, |b| {
                    ModelMorphGroup::parse_pmx(info, b)
                })?)
            }
            ModelMorphType::Impulse => {
                ModelMorphU::Impulses(parse_children(buffer, num_objects, |b| {
                    ModelMorphImpulse::parse_pmx(info, b)
                })?)
            }
            ModelMorphType::Material => {
                ModelMorphU::Materials(parse_children(buffer, num_objects, |b| {
                    ModelMorphMaterial::parse_pmx(info, b)
                })?)
            }
            ModelMorphType::Texture
            | ModelMorphType::Uva1
            | ModelMorphType::Uva2
            | ModelMorphType::Uva3
            | ModelMorphType::Uva4 => ModelMorphU::Uvs(parse_children(buffer, num_objects, |b| {
                ModelMorphUv::parse_pmx(info, b)
            })?),
            ModelMorphType::Vertex => {
                ModelMorphU::Vertices(parse_children(buffer, num_objects, |b| {
                    ModelMorphVertex::parse_pmx(info, b)
                })?)
            }
            ModelMorphType::Unknown => return Err(Status::ErrorModelMorphCorrupted),
        };
        Ok(morph)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        if self.typ == ModelMorphType::Unknown {
            return Err(Status::ErrorModelMorphCorrupted);
        }
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_byte(self.category as u8)?;
        buffer.write_byte(self.typ as u8)?;
        buffer.write_u32_little_endian(self.u.len() as u32)?;
        match &self.u {
            ModelMorphU::Groups(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Vertices(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Bones(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Uvs(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Materials(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Flips(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
            ModelMorphU::Impulses(items) => {
                for item in items {
                    item.borrow().save_to_buffer_pmx(info, buffer)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelMorph, Status> {
        let name_ja = buffer
            .read_string_from_cp932(PMD_MORPH_NAME_LENGTH)
            .map_err(|_| Status::ErrorModelMorphCorrupted)?;
        let num_vertices = buffer.read_len()?;
        let category = match ModelMorphCategory::from(buffer.read_byte()?) {
            ModelMorphCategory::Unknown => return Err(Status::ErrorModelMorphCorrupted),
            category => category,
        };
        let vertices = parse_children(buffer, num_vertices, ModelMorphVertex::parse_pmd)?;
        Ok(ModelMorph {
            base: ModelObject::default(),
            name_ja,
            name_en: String::default(),
            typ: ModelMorphType::Vertex,
            category,
            u: ModelMorphU::Vertices(vertices),
        })
    }

    /// Absolute vertex indices of a vertex morph, in item order.
    pub(crate) fn pmd_vertex_indices(&self) -> Vec<i32> {
        self.get_all_vertex_morph_objects()
            .iter()
            .map(|item| item.borrow().vertex_index())
            .collect()
    }

    /// PMD addresses vertices of every non-base morph by their position in
    /// the base morph.
    pub(crate) fn apply_pmd_base_vertex_indices(&mut self, base_vertex_indices: &[i32]) {
        for item in self.get_all_vertex_morph_objects() {
            let mut item = item.borrow_mut();
            let relative_index = item.vertex.pending_index;
            item.relative_index = relative_index;
            item.vertex = match usize::try_from(relative_index)
                .ok()
                .and_then(|index| base_vertex_indices.get(index))
            {
                Some(vertex_index) => ObjectRef::from_index(*vertex_index),
                None => {
                    log::warn!(
                        "morph {} refers to base vertex {} out of {}",
                        self.name_ja,
                        relative_index,
                        base_vertex_indices.len()
                    );
                    ObjectRef::none()
                }
            };
        }
    }

    /// `base_vertex_indices` is given for every morph except the base one.
    pub(crate) fn save_to_buffer_pmd(
        &self,
        base_vertex_indices: Option<&[i32]>,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        let items = self.get_all_vertex_morph_objects();
        if items.is_empty() && self.u.len() > 0 {
            log::warn!(
                "PMD cannot store {:?} morph {}, saved as empty",
                self.typ,
                self.name_ja
            );
        }
        buffer.write_fixed_string(&self.name_ja, PMD_MORPH_NAME_LENGTH)?;
        buffer.write_u32_little_endian(items.len() as u32)?;
        let category = match self.category {
            ModelMorphCategory::Unknown => ModelMorphCategory::Other,
            category => category,
        };
        buffer.write_byte(category as u8)?;
        for item in items {
            let item = item.borrow();
            let vertex_index = item.vertex_index();
            let stored_index = match base_vertex_indices {
                Some(base) => match base.iter().position(|index| *index == vertex_index) {
                    Some(position) => position as i32,
                    None if item.relative_index >= 0 => item.relative_index,
                    None => {
                        log::warn!(
                            "vertex {} of morph {} is not in the base morph",
                            vertex_index,
                            self.name_ja
                        );
                        0
                    }
                },
                None => vertex_index,
            };
            buffer.write_i32_little_endian(stored_index)?;
            buffer.write_f32_3_little_endian(item.position)?;
        }
        Ok(())
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        match &self.u {
            ModelMorphU::Groups(items) => {
                for item in items {
                    item.borrow_mut().morph.resolve(&parent_model.morphs);
                }
            }
            ModelMorphU::Flips(items) => {
                for item in items {
                    item.borrow_mut().morph.resolve(&parent_model.morphs);
                }
            }
            ModelMorphU::Vertices(items) => {
                for item in items {
                    item.borrow_mut().vertex.resolve(&parent_model.vertices);
                }
            }
            ModelMorphU::Uvs(items) => {
                for item in items {
                    item.borrow_mut().vertex.resolve(&parent_model.vertices);
                }
            }
            ModelMorphU::Bones(items) => {
                for item in items {
                    item.borrow_mut().bone.resolve(&parent_model.bones);
                }
            }
            ModelMorphU::Materials(items) => {
                for item in items {
                    item.borrow_mut().material.resolve(&parent_model.materials);
                }
            }
            ModelMorphU::Impulses(items) => {
                for item in items {
                    item.borrow_mut()
                        .rigid_body
                        .resolve(&parent_model.rigid_bodies);
                }
            }
        }
    }

    impl_name_accessors!();

    pub fn get_type(&self) -> ModelMorphType {
        self.typ
    }

    pub fn get_category(&self) -> ModelMorphCategory {
        self.category
    }

    pub fn get_u(&self) -> &ModelMorphU {
        &self.u
    }

    /// Switching to another kind of morph drops the current items.
    pub(crate) fn set_type(&mut self, value: ModelMorphType) {
        let same_kind = self.typ == value || (self.typ.is_uv() && value.is_uv());
        self.typ = value;
        if !same_kind {
            self.u = ModelMorphU::empty_for(value);
        }
    }

    pub(crate) fn set_category(&mut self, value: ModelMorphCategory) {
        self.category = value;
    }

    impl_morph_children!(
        Bones,
        ModelMorphBone,
        get_all_bone_morph_objects,
        insert_bone_morph_object,
        remove_bone_morph_object,
        |typ| typ == ModelMorphType::Bone,
        ModelFormatType::Pmx2_0,
        Status::ErrorModelMorphBoneNotFound
    );

    impl_morph_children!(
        Groups,
        ModelMorphGroup,
        get_all_group_morph_objects,
        insert_group_morph_object,
        remove_group_morph_object,
        |typ| typ == ModelMorphType::Group,
        ModelFormatType::Pmx2_0,
        Status::ErrorModelMorphGroupNotFound
    );

    impl_morph_children!(
        Flips,
        ModelMorphFlip,
        get_all_flip_morph_objects,
        insert_flip_morph_object,
        remove_flip_morph_object,
        |typ| typ == ModelMorphType::Flip,
        ModelFormatType::Pmx2_1,
        Status::ErrorModelMorphFlipNotFound
    );

    impl_morph_children!(
        Impulses,
        ModelMorphImpulse,
        get_all_impulse_morph_objects,
        insert_impulse_morph_object,
        remove_impulse_morph_object,
        |typ| typ == ModelMorphType::Impulse,
        ModelFormatType::Pmx2_1,
        Status::ErrorModelMorphImpulseNotFound
    );

    impl_morph_children!(
        Materials,
        ModelMorphMaterial,
        get_all_material_morph_objects,
        insert_material_morph_object,
        remove_material_morph_object,
        |typ| typ == ModelMorphType::Material,
        ModelFormatType::Pmx2_0,
        Status::ErrorModelMorphMaterialNotFound
    );

    impl_morph_children!(
        Uvs,
        ModelMorphUv,
        get_all_uv_morph_objects,
        insert_uv_morph_object,
        remove_uv_morph_object,
        |typ| typ.is_uv(),
        ModelFormatType::Pmx2_0,
        Status::ErrorModelMorphUvNotFound
    );

    impl_morph_children!(
        Vertices,
        ModelMorphVertex,
        get_all_vertex_morph_objects,
        insert_vertex_morph_object,
        remove_vertex_morph_object,
        |typ| typ == ModelMorphType::Vertex,
        ModelFormatType::Pmd1_0,
        Status::ErrorModelMorphVertexNotFound
    );
}

#[test]
fn test_model_morph_insert_type_and_version_gating() {
    let mut morph = ModelMorph::default();
    morph.set_type(ModelMorphType::Bone);
    let bone = Rc::new(RefCell::new(ModelMorphBone::default()));
    let vertex = Rc::new(RefCell::new(ModelMorphVertex::default()));
    assert_eq!(
        Err(Status::ErrorModelMorphTypeMismatch),
        morph.insert_vertex_morph_object(&vertex, -1, ModelFormatType::Pmx2_0)
    );
    assert_eq!(
        Err(Status::ErrorModelVersionIncompatible),
        morph.insert_bone_morph_object(&bone, -1, ModelFormatType::Pmd1_0)
    );
    assert_eq!(
        Ok(()),
        morph.insert_bone_morph_object(&bone, -1, ModelFormatType::Pmx2_0)
    );
    assert_eq!(
        Err(Status::ErrorModelMorphAlreadyExists),
        morph.insert_bone_morph_object(&bone, -1, ModelFormatType::Pmx2_0)
    );
    assert_eq!(Ok(()), morph.remove_bone_morph_object(&bone));
    assert_eq!(
        Err(Status::ErrorModelMorphBoneNotFound),
        morph.remove_bone_morph_object(&bone)
    );
    morph.set_type(ModelMorphType::Flip);
    let flip = Rc::new(RefCell::new(ModelMorphFlip::default()));
    assert_eq!(
        Err(Status::ErrorModelVersionIncompatible),
        morph.insert_flip_morph_object(&flip, -1, ModelFormatType::Pmx2_0)
    );
    assert_eq!(
        Ok(()),
        morph.insert_flip_morph_object(&flip, -1, ModelFormatType::Pmx2_1)
    );
    assert!(morph.get_all_bone_morph_objects().is_empty());
    assert_eq!(1, morph.get_all_flip_morph_objects().len());
}

#[test]
fn test_model_morph_set_type_keeps_uv_items() {
    let mut morph = ModelMorph::default();
    morph.set_type(ModelMorphType::Uva1);
    let uv = Rc::new(RefCell::new(ModelMorphUv::default()));
    assert_eq!(
        Ok(()),
        morph.insert_uv_morph_object(&uv, -1, ModelFormatType::Pmx2_0)
    );
    morph.set_type(ModelMorphType::Uva2);
    assert_eq!(1, morph.get_all_uv_morph_objects().len());
    morph.set_type(ModelMorphType::Vertex);
    assert!(morph.get_all_uv_morph_objects().is_empty());
}

#[test]
fn test_model_morph_pmd_relative_indices() -> Result<(), Status> {
    let mut morph = ModelMorph::default();
    for index in [2, 0] {
        let vertex = ModelMorphVertex {
            vertex: ObjectRef::from_index(index),
            ..Default::default()
        };
        let vertex = Rc::new(RefCell::new(vertex));
        morph.insert_vertex_morph_object(&vertex, -1, ModelFormatType::Pmd1_0)?;
    }
    morph.apply_pmd_base_vertex_indices(&[5, 6, 7]);
    assert_eq!(vec![7, 5], morph.pmd_vertex_indices());
    let mut mutable_buffer = MutableBuffer::create()?;
    morph.save_to_buffer_pmd(Some(&[5, 6, 7]), &mut mutable_buffer)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let loaded = ModelMorph::parse_pmd(&mut buffer)?;
    assert_eq!(vec![2, 0], loaded.pmd_vertex_indices());
    Ok(())
}
