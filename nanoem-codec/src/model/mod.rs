use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    common::{Buffer, LanguageType, Status},
    mutable::common::MutableBuffer,
    utils::{fourcc, CodecType},
};

/// `get_name`/`set_name` for entities carrying `name_ja`/`name_en`.
macro_rules! impl_name_accessors {
    () => {
        pub fn get_name(&self, language_type: $crate::common::LanguageType) -> &str {
            match language_type {
                $crate::common::LanguageType::Japanese => &self.name_ja,
                $crate::common::LanguageType::English => &self.name_en,
                $crate::common::LanguageType::Unknown => "",
            }
        }

        pub(crate) fn set_name(&mut self, value: &str, language_type: $crate::common::LanguageType) {
            match language_type {
                $crate::common::LanguageType::Japanese => self.name_ja = value.to_owned(),
                $crate::common::LanguageType::English => self.name_en = value.to_owned(),
                $crate::common::LanguageType::Unknown => {}
            }
        }
    };
}

pub mod bone;
pub mod label;
pub mod material;
pub mod morph;
pub mod rigid_body;
pub mod soft_body;
pub mod vertex;

pub use bone::*;
pub use label::*;
pub use material::*;
pub use morph::*;
pub use rigid_body::*;
pub use soft_body::*;
pub use vertex::*;

pub(crate) const PMD_SIGNATURE: &[u8; 3] = b"Pmd";
pub(crate) const PMD_MODEL_NAME_LENGTH: usize = 20;
pub(crate) const PMD_MODEL_COMMENT_LENGTH: usize = 256;
pub(crate) const PMD_BONE_NAME_LENGTH: usize = 20;
pub(crate) const PMD_MORPH_NAME_LENGTH: usize = 20;
pub(crate) const PMD_BONE_CATEGORY_NAME_LENGTH: usize = 50;
pub(crate) const PMD_TOON_TEXTURE_PATH_LENGTH: usize = 100;
pub(crate) const PMD_MATERIAL_DIFFUSE_TEXTURE_NAME_LENGTH: usize = 20;
pub(crate) const PMD_RIGID_BODY_NAME_LENGTH: usize = 20;
pub(crate) const PMD_JOINT_NAME_LENGTH: usize = 20;
pub(crate) const PMD_NUM_CUSTOM_TOON_TEXTURES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ModelFormatType {
    Unknown = -1,
    #[default]
    Pmd1_0,
    Pmx2_0,
    Pmx2_1,
}

impl From<i32> for ModelFormatType {
    fn from(value: i32) -> Self {
        match value {
            10 => ModelFormatType::Pmd1_0,
            20 => ModelFormatType::Pmx2_0,
            21 => ModelFormatType::Pmx2_1,
            _ => ModelFormatType::Unknown,
        }
    }
}

impl ModelFormatType {
    pub fn is_pmx(&self) -> bool {
        matches!(self, ModelFormatType::Pmx2_0 | ModelFormatType::Pmx2_1)
    }
}

/// PMX header block. Index sizes are 1, 2 or 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    pub codec_type: u8,
    pub additional_uv_size: u8,
    pub vertex_index_size: u8,
    pub texture_index_size: u8,
    pub material_index_size: u8,
    pub bone_index_size: u8,
    pub morph_index_size: u8,
    pub rigid_body_index_size: u8,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            codec_type: 1,
            additional_uv_size: 0,
            vertex_index_size: 1,
            texture_index_size: 1,
            material_index_size: 1,
            bone_index_size: 1,
            morph_index_size: 1,
            rigid_body_index_size: 1,
        }
    }
}

impl Info {
    const LENGTH: u8 = 8;

    fn vertex_index_size_for(count: usize) -> u8 {
        if count < 0x100 {
            1
        } else if count < 0x10000 {
            2
        } else {
            4
        }
    }

    fn object_index_size_for(count: usize) -> u8 {
        if count < 0x80 {
            1
        } else if count < 0x8000 {
            2
        } else {
            4
        }
    }

    fn is_valid(&self) -> bool {
        let valid_size = |size: u8| matches!(size, 1 | 2 | 4);
        self.codec_type <= 1
            && self.additional_uv_size <= 4
            && valid_size(self.vertex_index_size)
            && valid_size(self.texture_index_size)
            && valid_size(self.material_index_size)
            && valid_size(self.bone_index_size)
            && valid_size(self.morph_index_size)
            && valid_size(self.rigid_body_index_size)
    }

    pub fn get_codec_type(&self) -> CodecType {
        if self.codec_type == 1 {
            CodecType::Utf8
        } else {
            CodecType::Utf16
        }
    }

    pub(crate) fn read_string(&self, buffer: &mut Buffer) -> Result<String, Status> {
        let length = buffer.read_len()?;
        let src = buffer.read_buffer(length)?;
        self.get_codec_type().decode(src)
    }

    pub(crate) fn write_string(&self, value: &str, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_string(value, self.get_codec_type())
    }
}

/// Position of an entity inside its parent collection, `-1` while detached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelObject {
    pub index: i32,
}

impl Default for ModelObject {
    fn default() -> Self {
        Self { index: -1 }
    }
}

pub trait ModelObjectBase {
    fn base(&self) -> &ModelObject;
    fn base_mut(&mut self) -> &mut ModelObject;

    fn get_index(&self) -> i32 {
        self.base().index
    }
}

macro_rules! impl_model_object_base {
    ($($typ:ty),+ $(,)?) => {
        $(
            impl ModelObjectBase for $typ {
                fn base(&self) -> &ModelObject {
                    &self.base
                }

                fn base_mut(&mut self) -> &mut ModelObject {
                    &mut self.base
                }
            }
        )+
    };
}

impl_model_object_base!(
    ModelVertex,
    ModelMaterial,
    ModelTexture,
    ModelBone,
    ModelConstraint,
    ModelConstraintJoint,
    ModelMorph,
    ModelMorphBone,
    ModelMorphFlip,
    ModelMorphGroup,
    ModelMorphImpulse,
    ModelMorphMaterial,
    ModelMorphUv,
    ModelMorphVertex,
    ModelLabel,
    ModelLabelItem,
    ModelRigidBody,
    ModelJoint,
    ModelSoftBody,
    ModelSoftBodyAnchor,
);

/// Non-owning reference to a sibling entity.
///
/// Right after parsing only the stored index is known; [`ObjectRef::resolve`]
/// turns it into a weak pointer once every collection is loaded. Saving
/// writes the target's current index, so references survive reordering.
pub struct ObjectRef<T> {
    pending_index: i32,
    object: Weak<RefCell<T>>,
}

impl<T> std::fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRef")
            .field("pending_index", &self.pending_index)
            .field("is_alive", &(self.object.strong_count() > 0))
            .finish()
    }
}

impl<T> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        Self {
            pending_index: self.pending_index,
            object: self.object.clone(),
        }
    }
}

impl<T> Default for ObjectRef<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> ObjectRef<T> {
    pub fn none() -> Self {
        Self {
            pending_index: -1,
            object: Weak::new(),
        }
    }

    pub(crate) fn from_index(index: i32) -> Self {
        Self {
            pending_index: index,
            object: Weak::new(),
        }
    }

    pub fn from_object(object: Option<&Rc<RefCell<T>>>) -> Self {
        match object {
            Some(rc) => Self {
                pending_index: -1,
                object: Rc::downgrade(rc),
            },
            None => Self::none(),
        }
    }

    pub fn get(&self) -> Option<Rc<RefCell<T>>> {
        self.object.upgrade()
    }

    pub fn is_some(&self) -> bool {
        self.object.strong_count() > 0
    }

    pub(crate) fn resolve(&mut self, objects: &[Rc<RefCell<T>>]) {
        if self.pending_index < 0 {
            return;
        }
        match objects.get(self.pending_index as usize) {
            Some(rc) => self.object = Rc::downgrade(rc),
            None => {
                log::warn!(
                    "reference index {} is out of range (0..{}), treated as none",
                    self.pending_index,
                    objects.len()
                );
                self.object = Weak::new();
            }
        }
        self.pending_index = -1;
    }
}

impl<T: ModelObjectBase> ObjectRef<T> {
    pub(crate) fn save_index(&self) -> i32 {
        self.object
            .upgrade()
            .and_then(|rc| rc.try_borrow().ok().map(|object| object.get_index()))
            .unwrap_or(-1)
    }

    pub fn is_same(&self, other: &Rc<RefCell<T>>) -> bool {
        self.object
            .upgrade()
            .map(|rc| Rc::ptr_eq(&rc, other))
            .unwrap_or(false)
    }
}

pub(crate) fn reindex_objects<T: ModelObjectBase>(objects: &[Rc<RefCell<T>>]) {
    for (index, object) in objects.iter().enumerate() {
        object.borrow_mut().base_mut().index = index as i32;
    }
}

/// Inserts at `index` when it is inside the collection, otherwise appends.
pub(crate) fn insert_object<T: ModelObjectBase>(
    objects: &mut Vec<Rc<RefCell<T>>>,
    object: &Rc<RefCell<T>>,
    index: i32,
    already_exists: Status,
) -> Result<(), Status> {
    if objects.iter().any(|o| Rc::ptr_eq(o, object)) {
        return Err(already_exists);
    }
    if index >= 0 && (index as usize) < objects.len() {
        objects.insert(index as usize, object.clone());
    } else {
        objects.push(object.clone());
    }
    reindex_objects(objects);
    Ok(())
}

pub(crate) fn remove_object<T: ModelObjectBase>(
    objects: &mut Vec<Rc<RefCell<T>>>,
    object: &Rc<RefCell<T>>,
    not_found: Status,
) -> Result<(), Status> {
    let position = objects
        .iter()
        .position(|o| Rc::ptr_eq(o, object))
        .ok_or(not_found)?;
    let removed = objects.remove(position);
    removed.borrow_mut().base_mut().index = -1;
    reindex_objects(objects);
    Ok(())
}

fn parse_objects<T, F>(
    buffer: &mut Buffer,
    num_objects: usize,
    mut parse: F,
) -> Result<Vec<Rc<RefCell<T>>>, Status>
where
    T: ModelObjectBase,
    F: FnMut(&mut Buffer) -> Result<T, Status>,
{
    let mut objects = Vec::with_capacity(num_objects);
    for i in 0..num_objects {
        let mut object = parse(buffer)?;
        object.base_mut().index = i as i32;
        objects.push(Rc::new(RefCell::new(object)));
    }
    Ok(objects)
}

#[derive(Debug, Default)]
pub struct Model {
    pub(crate) format_type: ModelFormatType,
    pub(crate) codec_type: CodecType,
    pub(crate) additional_uv_size: usize,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) comment_ja: String,
    pub(crate) comment_en: String,
    pub(crate) vertices: Vec<Rc<RefCell<ModelVertex>>>,
    pub(crate) vertex_indices: Vec<u32>,
    pub(crate) materials: Vec<Rc<RefCell<ModelMaterial>>>,
    pub(crate) bones: Vec<Rc<RefCell<ModelBone>>>,
    pub(crate) constraints: Vec<Rc<RefCell<ModelConstraint>>>,
    pub(crate) textures: Vec<Rc<RefCell<ModelTexture>>>,
    pub(crate) morphs: Vec<Rc<RefCell<ModelMorph>>>,
    pub(crate) labels: Vec<Rc<RefCell<ModelLabel>>>,
    pub(crate) rigid_bodies: Vec<Rc<RefCell<ModelRigidBody>>>,
    pub(crate) joints: Vec<Rc<RefCell<ModelJoint>>>,
    pub(crate) soft_bodies: Vec<Rc<RefCell<ModelSoftBody>>>,
}

impl Model {
    pub fn create() -> Model {
        Model::default()
    }

    pub fn load_from_buffer(buffer: &mut Buffer) -> Result<Model, Status> {
        let mut model = Model::default();
        let start = buffer.offset();
        let signature = buffer.read_u32_little_endian()?;
        if signature == fourcc(b'P', b'M', b'X', b' ')
            || signature == fourcc(b'P', b'M', b'X', 0xa0u8)
        {
            model.load_from_pmx(buffer)?;
        } else {
            buffer.seek(start)?;
            if buffer.read_buffer(PMD_SIGNATURE.len())? == PMD_SIGNATURE {
                model.load_from_pmd(buffer)?;
            } else {
                return Err(Status::ErrorInvalidSignature);
            }
        }
        Ok(model)
    }

    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        match self.format_type {
            ModelFormatType::Pmd1_0 => self.save_to_buffer_pmd(buffer),
            ModelFormatType::Pmx2_0 | ModelFormatType::Pmx2_1 => self.save_to_buffer_pmx(buffer),
            ModelFormatType::Unknown => Err(Status::ErrorModelVersionIncompatible),
        }
    }

    fn resolve_references(&mut self) {
        let model: &Model = self;
        for vertex in &model.vertices {
            vertex.borrow_mut().resolve(model);
        }
        if model.format_type.is_pmx() {
            for material in &model.materials {
                material.borrow_mut().resolve(model);
            }
        }
        for bone in &model.bones {
            bone.borrow_mut().resolve(model, bone);
        }
        for constraint in &model.constraints {
            constraint.borrow_mut().resolve(model);
        }
        for morph in &model.morphs {
            morph.borrow_mut().resolve(model);
        }
        for label in &model.labels {
            label.borrow().resolve(model);
        }
        for rigid_body in &model.rigid_bodies {
            rigid_body.borrow_mut().resolve(model);
        }
        for joint in &model.joints {
            joint.borrow_mut().resolve(model);
        }
        for soft_body in &model.soft_bodies {
            soft_body.borrow_mut().resolve(model);
        }
    }

    fn parse_vertex_index_block(
        &mut self,
        buffer: &mut Buffer,
        vertex_index_size: usize,
    ) -> Result<(), Status> {
        let num_vertex_indices = buffer.read_len()?;
        let num_vertices = self.vertices.len();
        if (num_vertex_indices == 0 && num_vertices > 0) || num_vertex_indices % 3 != 0 {
            return Err(Status::ErrorModelFaceCorrupted);
        }
        let mut vertex_indices = Vec::with_capacity(num_vertex_indices);
        for _ in 0..num_vertex_indices {
            let vertex_index = buffer
                .read_integer(vertex_index_size)
                .map_err(|_| Status::ErrorModelFaceCorrupted)? as u32;
            vertex_indices.push(if (vertex_index as usize) < num_vertices {
                vertex_index
            } else {
                0
            });
        }
        self.vertex_indices = vertex_indices;
        Ok(())
    }

    fn parse_pmx(&mut self, info: &Info, buffer: &mut Buffer) -> Result<(), Status> {
        let num_vertices = buffer.read_len()?;
        self.vertices = parse_objects(buffer, num_vertices, |b| ModelVertex::parse_pmx(info, b))?;
        self.parse_vertex_index_block(buffer, info.vertex_index_size as usize)?;
        let num_textures = buffer.read_len()?;
        self.textures = parse_objects(buffer, num_textures, |b| ModelTexture::parse_pmx(info, b))?;
        let num_materials = buffer.read_len()?;
        self.materials =
            parse_objects(buffer, num_materials, |b| ModelMaterial::parse_pmx(info, b))?;
        let num_bones = buffer.read_len()?;
        self.bones = parse_objects(buffer, num_bones, |b| ModelBone::parse_pmx(info, b))?;
        let num_morphs = buffer.read_len()?;
        self.morphs = parse_objects(buffer, num_morphs, |b| ModelMorph::parse_pmx(info, b))?;
        let num_labels = buffer.read_len()?;
        self.labels = parse_objects(buffer, num_labels, |b| ModelLabel::parse_pmx(info, b))?;
        let num_rigid_bodies = buffer.read_len()?;
        self.rigid_bodies =
            parse_objects(buffer, num_rigid_bodies, |b| ModelRigidBody::parse_pmx(info, b))?;
        let num_joints = buffer.read_len()?;
        self.joints = parse_objects(buffer, num_joints, |b| ModelJoint::parse_pmx(info, b))?;
        if self.format_type == ModelFormatType::Pmx2_1 && !buffer.is_end() {
            let num_soft_bodies = buffer.read_len()?;
            self.soft_bodies =
                parse_objects(buffer, num_soft_bodies, |b| ModelSoftBody::parse_pmx(info, b))?;
        }
        log::debug!(
            "PMX loaded: vertices={} indices={} textures={} materials={} bones={} morphs={} labels={} rigid_bodies={} joints={} soft_bodies={}",
            self.vertices.len(),
            self.vertex_indices.len(),
            self.textures.len(),
            self.materials.len(),
            self.bones.len(),
            self.morphs.len(),
            self.labels.len(),
            self.rigid_bodies.len(),
            self.joints.len(),
            self.soft_bodies.len()
        );
        if buffer.is_end() {
            Ok(())
        } else {
            Err(Status::ErrorBufferNotEnd)
        }
    }

    fn load_from_pmx(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        let version = buffer.read_f32_little_endian()?;
        self.format_type = ModelFormatType::from((version * 10.0f32).round() as i32);
        if !self.format_type.is_pmx() {
            return Err(Status::ErrorPmxInfoCorruputed);
        }
        if buffer.read_byte()? != Info::LENGTH {
            return Err(Status::ErrorPmxInfoCorruputed);
        }
        let info = Info {
            codec_type: buffer.read_byte()?,
            additional_uv_size: buffer.read_byte()?,
            vertex_index_size: buffer.read_byte()?,
            texture_index_size: buffer.read_byte()?,
            material_index_size: buffer.read_byte()?,
            bone_index_size: buffer.read_byte()?,
            morph_index_size: buffer.read_byte()?,
            rigid_body_index_size: buffer.read_byte()?,
        };
        if !info.is_valid() {
            return Err(Status::ErrorPmxInfoCorruputed);
        }
        self.codec_type = info.get_codec_type();
        self.additional_uv_size = info.additional_uv_size as usize;
        self.name_ja = info.read_string(buffer)?;
        self.name_en = info.read_string(buffer)?;
        self.comment_ja = info.read_string(buffer)?;
        self.comment_en = info.read_string(buffer)?;
        self.parse_pmx(&info, buffer)?;
        self.resolve_references();
        Ok(())
    }

    fn info(&self) -> Info {
        Info {
            codec_type: if self.codec_type == CodecType::Utf16 {
                0
            } else {
                1
            },
            additional_uv_size: self.additional_uv_size.min(4) as u8,
            vertex_index_size: Info::vertex_index_size_for(self.vertices.len()),
            texture_index_size: Info::object_index_size_for(self.textures.len()),
            material_index_size: Info::object_index_size_for(self.materials.len()),
            bone_index_size: Info::object_index_size_for(self.bones.len()),
            morph_index_size: Info::object_index_size_for(self.morphs.len()),
            rigid_body_index_size: Info::object_index_size_for(self.rigid_bodies.len()),
        }
    }

    /// Standalone (PMD style) constraint whose target is `bone`.
    fn find_constraint_targeting(
        &self,
        bone: &Rc<RefCell<ModelBone>>,
    ) -> Option<Rc<RefCell<ModelConstraint>>> {
        self.constraints
            .iter()
            .find(|constraint| constraint.borrow().target_bone.is_same(bone))
            .cloned()
    }

    fn save_to_buffer_pmx(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        let info = self.info();
        buffer.write_u32_little_endian(fourcc(b'P', b'M', b'X', b' '))?;
        buffer.write_f32_little_endian(if self.format_type == ModelFormatType::Pmx2_1 {
            2.1f32
        } else {
            2.0f32
        })?;
        buffer.write_byte(Info::LENGTH)?;
        buffer.write_byte_array(&[
            info.codec_type,
            info.additional_uv_size,
            info.vertex_index_size,
            info.texture_index_size,
            info.material_index_size,
            info.bone_index_size,
            info.morph_index_size,
            info.rigid_body_index_size,
        ])?;
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        info.write_string(&self.comment_ja, buffer)?;
        info.write_string(&self.comment_en, buffer)?;
        buffer.write_u32_little_endian(self.vertices.len() as u32)?;
        for vertex in &self.vertices {
            vertex.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.vertex_indices.len() as u32)?;
        for vertex_index in &self.vertex_indices {
            buffer.write_integer(*vertex_index as i32, info.vertex_index_size as usize)?;
        }
        buffer.write_u32_little_endian(self.textures.len() as u32)?;
        for texture in &self.textures {
            texture.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.materials.len() as u32)?;
        for material in &self.materials {
            material.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.bones.len() as u32)?;
        for bone in &self.bones {
            let fallback = self.find_constraint_targeting(bone);
            bone.borrow()
                .save_to_buffer_pmx(&info, fallback.as_ref(), buffer)?;
        }
        buffer.write_u32_little_endian(self.morphs.len() as u32)?;
        for morph in &self.morphs {
            morph.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.labels.len() as u32)?;
        for label in &self.labels {
            label.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.rigid_bodies.len() as u32)?;
        for rigid_body in &self.rigid_bodies {
            rigid_body.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        buffer.write_u32_little_endian(self.joints.len() as u32)?;
        for joint in &self.joints {
            joint.borrow().save_to_buffer_pmx(&info, buffer)?;
        }
        if self.format_type == ModelFormatType::Pmx2_1 {
            buffer.write_u32_little_endian(self.soft_bodies.len() as u32)?;
            for soft_body in &self.soft_bodies {
                soft_body.borrow().save_to_buffer_pmx(&info, buffer)?;
            }
        }
        log::debug!(
            "PMX saved: vertices={} materials={} bones={} morphs={} labels={} rigid_bodies={} joints={}",
            self.vertices.len(),
            self.materials.len(),
            self.bones.len(),
            self.morphs.len(),
            self.labels.len(),
            self.rigid_bodies.len(),
            self.joints.len()
        );
        Ok(())
    }

    fn parse_morph_block_pmd(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        let num_morphs = buffer.read_u16_little_endian()? as usize;
        self.morphs = parse_objects(buffer, num_morphs, ModelMorph::parse_pmd)?;
        // non-base vertex morphs address vertices through the base morph
        let base_vertex_indices = match self.morphs.first() {
            Some(base) if base.borrow().category == ModelMorphCategory::Base => {
                base.borrow().pmd_vertex_indices()
            }
            _ => return Ok(()),
        };
        for morph in self.morphs.iter().skip(1) {
            morph
                .borrow_mut()
                .apply_pmd_base_vertex_indices(&base_vertex_indices);
        }
        Ok(())
    }

    fn parse_label_block_pmd(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        let mut morph_label = ModelLabel {
            is_special: true,
            ..Default::default()
        };
        let num_morph_labels = buffer.read_byte()? as usize;
        for _ in 0..num_morph_labels {
            let morph_index = buffer.read_u16_little_endian()? as i32;
            morph_label
                .items
                .push(Rc::new(RefCell::new(ModelLabelItem::from_pmd_morph_index(
                    morph_index,
                ))));
        }
        let num_bone_category_names = buffer.read_byte()? as usize;
        let mut labels = vec![morph_label];
        for _ in 0..num_bone_category_names {
            labels.push(ModelLabel {
                name_ja: buffer.read_string_from_cp932(PMD_BONE_CATEGORY_NAME_LENGTH)?,
                ..Default::default()
            });
        }
        let num_bone_labels = buffer.read_len()?;
        for _ in 0..num_bone_labels {
            let bone_index = buffer.read_i16_little_endian()? as i32;
            let label_index = buffer.read_byte()? as usize;
            if label_index > 0 && label_index <= num_bone_category_names {
                labels[label_index]
                    .items
                    .push(Rc::new(RefCell::new(ModelLabelItem::from_pmd_bone_index(
                        bone_index,
                    ))));
            }
        }
        self.labels = labels
            .into_iter()
            .enumerate()
            .map(|(index, mut label)| {
                label.base.index = index as i32;
                reindex_objects(&label.items);
                Rc::new(RefCell::new(label))
            })
            .collect();
        Ok(())
    }

    fn parse_english_block_pmd(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        if buffer.read_byte()? == 0 {
            return Ok(());
        }
        let corrupted = |_| Status::ErrorPmdEnglishCorrupted;
        self.name_en = buffer
            .read_string_from_cp932(PMD_MODEL_NAME_LENGTH)
            .map_err(corrupted)?;
        self.comment_en = buffer
            .read_string_from_cp932(PMD_MODEL_COMMENT_LENGTH)
            .map_err(corrupted)?;
        for bone in &self.bones {
            bone.borrow_mut().name_en = buffer
                .read_string_from_cp932(PMD_BONE_NAME_LENGTH)
                .map_err(corrupted)?;
        }
        // the first one is the base morph
        for morph in self.morphs.iter().skip(1) {
            morph.borrow_mut().name_en = buffer
                .read_string_from_cp932(PMD_MORPH_NAME_LENGTH)
                .map_err(corrupted)?;
        }
        // the first one is the reserved morph label
        for label in self.labels.iter().skip(1) {
            label.borrow_mut().name_en = buffer
                .read_string_from_cp932(PMD_BONE_CATEGORY_NAME_LENGTH)
                .map_err(corrupted)?;
        }
        Ok(())
    }

    fn parse_pmd(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        let num_vertices = buffer.read_len()?;
        self.vertices = parse_objects(buffer, num_vertices, ModelVertex::parse_pmd)?;
        self.parse_vertex_index_block(buffer, 2)?;
        let num_materials = buffer.read_len()?;
        self.materials = parse_objects(buffer, num_materials, ModelMaterial::parse_pmd)?;
        let num_bones = buffer.read_u16_little_endian()? as usize;
        self.bones = parse_objects(buffer, num_bones, ModelBone::parse_pmd)?;
        let num_constraints = buffer.read_u16_little_endian()? as usize;
        self.constraints = parse_objects(buffer, num_constraints, ModelConstraint::parse_pmd)?;
        self.parse_morph_block_pmd(buffer)?;
        self.parse_label_block_pmd(buffer)?;
        log::debug!(
            "PMD loaded: vertices={} materials={} bones={} constraints={} morphs={} labels={}",
            self.vertices.len(),
            self.materials.len(),
            self.bones.len(),
            self.constraints.len(),
            self.morphs.len(),
            self.labels.len()
        );
        if buffer.is_end() {
            log::warn!("PMD has no english, toon texture and physics blocks");
            return Ok(());
        }
        self.parse_english_block_pmd(buffer)?;
        self.textures = parse_objects(
            buffer,
            PMD_NUM_CUSTOM_TOON_TEXTURES,
            ModelTexture::parse_pmd,
        )?;
        if buffer.is_end() {
            log::warn!("PMD has no physics blocks");
            return Ok(());
        }
        let num_rigid_bodies = buffer.read_len()?;
        self.rigid_bodies = parse_objects(buffer, num_rigid_bodies, ModelRigidBody::parse_pmd)?;
        let num_joints = buffer.read_len()?;
        self.joints = parse_objects(buffer, num_joints, ModelJoint::parse_pmd)?;
        log::debug!(
            "PMD physics loaded: rigid_bodies={} joints={}",
            self.rigid_bodies.len(),
            self.joints.len()
        );
        Ok(())
    }

    fn load_from_pmd(&mut self, buffer: &mut Buffer) -> Result<(), Status> {
        let version = buffer.read_f32_little_endian()?;
        if version != 1.0f32 {
            return Err(Status::ErrorInvalidSignature);
        }
        self.format_type = ModelFormatType::Pmd1_0;
        self.codec_type = CodecType::Sjis;
        self.name_ja = buffer.read_string_from_cp932(PMD_MODEL_NAME_LENGTH)?;
        self.comment_ja = buffer.read_string_from_cp932(PMD_MODEL_COMMENT_LENGTH)?;
        self.parse_pmd(buffer)?;
        self.resolve_references();
        Ok(())
    }

    /// Standalone constraints followed by the ones embedded in bones.
    fn collect_constraints_pmd(&self) -> Vec<(Rc<RefCell<ModelConstraint>>, i32)> {
        let mut constraints: Vec<(Rc<RefCell<ModelConstraint>>, i32)> = self
            .constraints
            .iter()
            .map(|constraint| {
                let target_index = constraint.borrow().target_bone.save_index();
                (constraint.clone(), target_index)
            })
            .collect();
        for bone in &self.bones {
            let bone = bone.borrow();
            if let Some(constraint) = bone.get_constraint_object() {
                if !constraints.iter().any(|(c, _)| Rc::ptr_eq(c, &constraint)) {
                    constraints.push((constraint, bone.base.index));
                }
            }
        }
        constraints
    }

    fn save_label_block_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        let mut morph_indices = vec![];
        for label in &self.labels {
            for item in &label.borrow().items {
                if let ModelLabelItemU::Morph(morph) = &item.borrow().u {
                    morph_indices.push(morph.save_index());
                }
            }
        }
        if morph_indices.len() > u8::MAX as usize {
            log::warn!(
                "PMD keeps only {} of {} morph label items",
                u8::MAX,
                morph_indices.len()
            );
            morph_indices.truncate(u8::MAX as usize);
        }
        buffer.write_byte(morph_indices.len() as u8)?;
        for morph_index in morph_indices {
            buffer.write_u16_little_endian(morph_index as u16)?;
        }
        let bone_labels: Vec<&Rc<RefCell<ModelLabel>>> =
            self.labels.iter().skip(1).take(u8::MAX as usize).collect();
        buffer.write_byte(bone_labels.len() as u8)?;
        for label in &bone_labels {
            buffer.write_fixed_string(&label.borrow().name_ja, PMD_BONE_CATEGORY_NAME_LENGTH)?;
        }
        let mut bone_entries = vec![];
        for (label_index, label) in bone_labels.iter().enumerate() {
            for item in &label.borrow().items {
                if let ModelLabelItemU::Bone(bone) = &item.borrow().u {
                    bone_entries.push((bone.save_index(), label_index + 1));
                }
            }
        }
        buffer.write_u32_little_endian(bone_entries.len() as u32)?;
        for (bone_index, label_index) in bone_entries {
            buffer.write_i16_little_endian(bone_index as i16)?;
            buffer.write_byte(label_index as u8)?;
        }
        Ok(())
    }

    fn save_english_block_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_byte(1)?;
        buffer.write_fixed_string(&self.name_en, PMD_MODEL_NAME_LENGTH)?;
        buffer.write_fixed_string(&self.comment_en, PMD_MODEL_COMMENT_LENGTH)?;
        for bone in &self.bones {
            buffer.write_fixed_string(&bone.borrow().name_en, PMD_BONE_NAME_LENGTH)?;
        }
        for morph in self.morphs.iter().skip(1) {
            buffer.write_fixed_string(&morph.borrow().name_en, PMD_MORPH_NAME_LENGTH)?;
        }
        for label in self.labels.iter().skip(1).take(u8::MAX as usize) {
            buffer.write_fixed_string(&label.borrow().name_en, PMD_BONE_CATEGORY_NAME_LENGTH)?;
        }
        Ok(())
    }

    fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_byte_array(PMD_SIGNATURE)?;
        buffer.write_f32_little_endian(1.0f32)?;
        buffer.write_fixed_string(&self.name_ja, PMD_MODEL_NAME_LENGTH)?;
        buffer.write_fixed_string(&self.comment_ja, PMD_MODEL_COMMENT_LENGTH)?;
        buffer.write_u32_little_endian(self.vertices.len() as u32)?;
        for vertex in &self.vertices {
            vertex.borrow().save_to_buffer_pmd(buffer)?;
        }
        buffer.write_u32_little_endian(self.vertex_indices.len() as u32)?;
        for vertex_index in &self.vertex_indices {
            buffer.write_u16_little_endian(*vertex_index as u16)?;
        }
        buffer.write_u32_little_endian(self.materials.len() as u32)?;
        for material in &self.materials {
            material.borrow().save_to_buffer_pmd(buffer)?;
        }
        buffer.write_u16_little_endian(self.bones.len() as u16)?;
        for bone in &self.bones {
            bone.borrow().save_to_buffer_pmd(buffer)?;
        }
        let constraints = self.collect_constraints_pmd();
        buffer.write_u16_little_endian(constraints.len() as u16)?;
        for (constraint, target_bone_index) in &constraints {
            constraint
                .borrow()
                .save_to_buffer_pmd(*target_bone_index, buffer)?;
        }
        buffer.write_u16_little_endian(self.morphs.len() as u16)?;
        let base_morph = self
            .morphs
            .first()
            .filter(|morph| morph.borrow().category == ModelMorphCategory::Base)
            .map(|morph| morph.borrow().pmd_vertex_indices())
            .unwrap_or_default();
        for (index, morph) in self.morphs.iter().enumerate() {
            let base = if index > 0 && !base_morph.is_empty() {
                Some(base_morph.as_slice())
            } else {
                None
            };
            morph.borrow().save_to_buffer_pmd(base, buffer)?;
        }
        self.save_label_block_pmd(buffer)?;
        self.save_english_block_pmd(buffer)?;
        for i in 0..PMD_NUM_CUSTOM_TOON_TEXTURES {
            match self.textures.get(i) {
                Some(texture) => texture.borrow().save_to_buffer_pmd(buffer)?,
                None => buffer.write_fixed_string(
                    &format!("toon{:02}.bmp", i + 1),
                    PMD_TOON_TEXTURE_PATH_LENGTH,
                )?,
            }
        }
        buffer.write_u32_little_endian(self.rigid_bodies.len() as u32)?;
        for rigid_body in &self.rigid_bodies {
            rigid_body.borrow().save_to_buffer_pmd(buffer)?;
        }
        buffer.write_u32_little_endian(self.joints.len() as u32)?;
        for joint in &self.joints {
            joint.borrow().save_to_buffer_pmd(buffer)?;
        }
        log::debug!(
            "PMD saved: vertices={} materials={} bones={} constraints={} morphs={} labels={}",
            self.vertices.len(),
            self.materials.len(),
            self.bones.len(),
            constraints.len(),
            self.morphs.len(),
            self.labels.len()
        );
        Ok(())
    }

    pub fn get_format_type(&self) -> ModelFormatType {
        self.format_type
    }

    pub fn get_codec_type(&self) -> CodecType {
        self.codec_type
    }

    pub fn get_additional_uv_size(&self) -> usize {
        self.additional_uv_size
    }

    pub fn get_name(&self, language_type: LanguageType) -> &str {
        match language_type {
            LanguageType::Japanese => &self.name_ja,
            LanguageType::English => &self.name_en,
            LanguageType::Unknown => "",
        }
    }

    pub fn get_comment(&self, language_type: LanguageType) -> &str {
        match language_type {
            LanguageType::Japanese => &self.comment_ja,
            LanguageType::English => &self.comment_en,
            LanguageType::Unknown => "",
        }
    }

    pub fn get_all_vertex_objects(&self) -> &[Rc<RefCell<ModelVertex>>] {
        &self.vertices
    }

    pub fn get_all_vertex_indices(&self) -> &[u32] {
        &self.vertex_indices
    }

    pub fn get_all_material_objects(&self) -> &[Rc<RefCell<ModelMaterial>>] {
        &self.materials
    }

    pub fn get_all_bone_objects(&self) -> &[Rc<RefCell<ModelBone>>] {
        &self.bones
    }

    pub fn get_all_constraint_objects(&self) -> &[Rc<RefCell<ModelConstraint>>] {
        &self.constraints
    }

    pub fn get_all_texture_objects(&self) -> &[Rc<RefCell<ModelTexture>>] {
        &self.textures
    }

    pub fn get_all_morph_objects(&self) -> &[Rc<RefCell<ModelMorph>>] {
        &self.morphs
    }

    pub fn get_all_label_objects(&self) -> &[Rc<RefCell<ModelLabel>>] {
        &self.labels
    }

    pub fn get_all_rigid_body_objects(&self) -> &[Rc<RefCell<ModelRigidBody>>] {
        &self.rigid_bodies
    }

    pub fn get_all_joint_objects(&self) -> &[Rc<RefCell<ModelJoint>>] {
        &self.joints
    }

    pub fn get_all_soft_body_objects(&self) -> &[Rc<RefCell<ModelSoftBody>>] {
        &self.soft_bodies
    }

    pub fn get_one_bone_object(&self, index: i32) -> Option<Rc<RefCell<ModelBone>>> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.bones.get(index).cloned())
    }

    pub fn get_one_morph_object(&self, index: i32) -> Option<Rc<RefCell<ModelMorph>>> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.morphs.get(index).cloned())
    }

    pub fn find_bone_object(&self, name: &str) -> Option<Rc<RefCell<ModelBone>>> {
        self.bones
            .iter()
            .find(|bone| bone.borrow().name_ja == name)
            .cloned()
    }

    pub fn find_morph_object(&self, name: &str) -> Option<Rc<RefCell<ModelMorph>>> {
        self.morphs
            .iter()
            .find(|morph| morph.borrow().name_ja == name)
            .cloned()
    }

    pub(crate) fn set_format_type(&mut self, value: ModelFormatType) {
        self.format_type = value;
    }

    pub(crate) fn set_codec_type(&mut self, value: CodecType) {
        self.codec_type = value;
    }

    pub(crate) fn set_additional_uv_size(&mut self, value: usize) {
        self.additional_uv_size = value.min(4);
    }

    pub(crate) fn set_name(&mut self, value: &str, language_type: LanguageType) {
        match language_type {
            LanguageType::Japanese => self.name_ja = value.to_owned(),
            LanguageType::English => self.name_en = value.to_owned(),
            LanguageType::Unknown => {}
        }
    }

    pub(crate) fn set_comment(&mut self, value: &str, language_type: LanguageType) {
        match language_type {
            LanguageType::Japanese => self.comment_ja = value.to_owned(),
            LanguageType::English => self.comment_en = value.to_owned(),
            LanguageType::Unknown => {}
        }
    }

    pub(crate) fn set_vertex_indices(&mut self, value: &[u32]) -> Result<(), Status> {
        if value.len() % 3 != 0 {
            return Err(Status::ErrorModelFaceCorrupted);
        }
        self.vertex_indices = value.to_vec();
        Ok(())
    }
}

#[test]
fn test_insert_object_order_and_uniqueness() {
    let first = Rc::new(RefCell::new(ModelTexture::default()));
    let second = Rc::new(RefCell::new(ModelTexture::default()));
    let third = Rc::new(RefCell::new(ModelTexture::default()));
    let mut textures = vec![];
    let status = Status::ErrorModelTextureAlreadyExists;
    assert_eq!(Ok(()), insert_object(&mut textures, &first, -1, status));
    assert_eq!(Ok(()), insert_object(&mut textures, &second, 1, status));
    assert_eq!(Ok(()), insert_object(&mut textures, &third, 0, status));
    assert_eq!(Err(status), insert_object(&mut textures, &first, 0, status));
    assert_eq!(3, textures.len());
    assert!(Rc::ptr_eq(&third, &textures[0]));
    assert!(Rc::ptr_eq(&first, &textures[1]));
    assert!(Rc::ptr_eq(&second, &textures[2]));
    assert_eq!(1, first.borrow().get_index());
    let status = Status::ErrorModelTextureNotFound;
    assert_eq!(Ok(()), remove_object(&mut textures, &third, status));
    assert_eq!(Err(status), remove_object(&mut textures, &third, status));
    assert_eq!(-1, third.borrow().get_index());
    assert_eq!(0, first.borrow().get_index());
}

#[test]
fn test_object_ref_resolve_out_of_range() {
    let textures = vec![Rc::new(RefCell::new(ModelTexture::default()))];
    let mut reference = ObjectRef::<ModelTexture>::from_index(3);
    reference.resolve(&textures);
    assert!(reference.get().is_none());
    assert_eq!(-1, reference.save_index());
    let mut reference = ObjectRef::<ModelTexture>::from_index(0);
    reference.resolve(&textures);
    textures[0].borrow_mut().base.index = 0;
    assert!(reference.is_same(&textures[0]));
    assert_eq!(0, reference.save_index());
}

#[test]
fn test_info_index_size() {
    assert_eq!(1, Info::vertex_index_size_for(255));
    assert_eq!(2, Info::vertex_index_size_for(256));
    assert_eq!(4, Info::vertex_index_size_for(65536));
    assert_eq!(1, Info::object_index_size_for(127));
    assert_eq!(2, Info::object_index_size_for(128));
    assert_eq!(4, Info::object_index_size_for(32768));
}

#[test]
fn test_load_invalid_signature() {
    let mut buffer = Buffer::create(b"ABCDEFGH".to_vec());
    assert_eq!(
        Some(Status::ErrorInvalidSignature),
        Model::load_from_buffer(&mut buffer).err()
    );
}

#[test]
fn test_empty_model_round_trip() -> Result<(), Status> {
    for format_type in [
        ModelFormatType::Pmd1_0,
        ModelFormatType::Pmx2_0,
        ModelFormatType::Pmx2_1,
    ] {
        let mut model = Model::create();
        model.set_format_type(format_type);
        model.set_name("model", LanguageType::Japanese);
        model.set_comment("comment", LanguageType::Japanese);
        let mut mutable_buffer = MutableBuffer::create()?;
        model.save_to_buffer(&mut mutable_buffer)?;
        let mut buffer = mutable_buffer.create_buffer_object()?;
        let loaded = Model::load_from_buffer(&mut buffer)?;
        assert_eq!(format_type, loaded.get_format_type());
        assert_eq!("model", loaded.get_name(LanguageType::Japanese));
        assert_eq!("comment", loaded.get_comment(LanguageType::Japanese));
    }
    Ok(())
}
