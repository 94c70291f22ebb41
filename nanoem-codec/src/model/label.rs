use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status},
    mutable::common::MutableBuffer,
};

use super::{
    insert_object, parse_objects, remove_object, Info, Model, ModelBone, ModelMorph, ModelObject,
    ObjectRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelLabelItemType {
    Unknown = -1,
    Bone,
    Morph,
}

impl From<u8> for ModelLabelItemType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelLabelItemType::Bone,
            1 => ModelLabelItemType::Morph,
            _ => ModelLabelItemType::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ModelLabelItemU {
    Bone(ObjectRef<ModelBone>),
    Morph(ObjectRef<ModelMorph>),
}

#[derive(Debug, Clone)]
pub struct ModelLabelItem {
    pub base: ModelObject,
    pub(crate) u: ModelLabelItemU,
}

impl ModelLabelItem {
    pub(crate) fn from_pmd_bone_index(index: i32) -> ModelLabelItem {
        ModelLabelItem {
            base: ModelObject::default(),
            u: ModelLabelItemU::Bone(ObjectRef::from_index(index)),
        }
    }

    pub(crate) fn from_pmd_morph_index(index: i32) -> ModelLabelItem {
        ModelLabelItem {
            base: ModelObject::default(),
            u: ModelLabelItemU::Morph(ObjectRef::from_index(index)),
        }
    }

    pub fn create_from_bone_object(bone: &Rc<RefCell<ModelBone>>) -> ModelLabelItem {
        ModelLabelItem {
            base: ModelObject::default(),
            u: ModelLabelItemU::Bone(ObjectRef::from_object(Some(bone))),
        }
    }

    pub fn create_from_morph_object(morph: &Rc<RefCell<ModelMorph>>) -> ModelLabelItem {
        ModelLabelItem {
            base: ModelObject::default(),
            u: ModelLabelItemU::Morph(ObjectRef::from_object(Some(morph))),
        }
    }

    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelLabelItem, Status> {
        let u = match ModelLabelItemType::from(buffer.read_byte()?) {
            ModelLabelItemType::Bone => ModelLabelItemU::Bone(ObjectRef::from_index(
                buffer.read_integer_nullable(info.bone_index_size as usize)?,
            )),
            ModelLabelItemType::Morph => ModelLabelItemU::Morph(ObjectRef::from_index(
                buffer.read_integer_nullable(info.morph_index_size as usize)?,
            )),
            ModelLabelItemType::Unknown => return Err(Status::ErrorModelLabelCorrupted),
        };
        Ok(ModelLabelItem {
            base: ModelObject::default(),
            u,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        match &self.u {
            ModelLabelItemU::Bone(bone) => {
                buffer.write_byte(ModelLabelItemType::Bone as u8)?;
                buffer.write_integer(bone.save_index(), info.bone_index_size as usize)
            }
            ModelLabelItemU::Morph(morph) => {
                buffer.write_byte(ModelLabelItemType::Morph as u8)?;
                buffer.write_integer(morph.save_index(), info.morph_index_size as usize)
            }
        }
    }

    fn resolve(&mut self, parent_model: &Model) {
        match &mut self.u {
            ModelLabelItemU::Bone(bone) => bone.resolve(&parent_model.bones),
            ModelLabelItemU::Morph(morph) => morph.resolve(&parent_model.morphs),
        }
    }

    pub fn get_type(&self) -> ModelLabelItemType {
        match self.u {
            ModelLabelItemU::Bone(_) => ModelLabelItemType::Bone,
            ModelLabelItemU::Morph(_) => ModelLabelItemType::Morph,
        }
    }

    pub fn get_bone_object(&self) -> Option<Rc<RefCell<ModelBone>>> {
        match &self.u {
            ModelLabelItemU::Bone(bone) => bone.get(),
            ModelLabelItemU::Morph(_) => None,
        }
    }

    pub fn get_morph_object(&self) -> Option<Rc<RefCell<ModelMorph>>> {
        match &self.u {
            ModelLabelItemU::Morph(morph) => morph.get(),
            ModelLabelItemU::Bone(_) => None,
        }
    }
}

/// Display frame. PMD keeps morphs in the first, special label and bones in
/// the named categories following it.
#[derive(Debug, Clone, Default)]
pub struct ModelLabel {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) is_special: bool,
    pub(crate) items: Vec<Rc<RefCell<ModelLabelItem>>>,
}

impl ModelLabel {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelLabel, Status> {
        let name_ja = info.read_string(buffer)?;
        let name_en = info.read_string(buffer)?;
        let is_special = buffer.read_byte()? != 0;
        let num_items = buffer.read_len()?;
        let items = parse_objects(buffer, num_items, |b| ModelLabelItem::parse_pmx(info, b))?;
        Ok(ModelLabel {
            base: ModelObject::default(),
            name_ja,
            name_en,
            is_special,
            items,
        })
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_byte(self.is_special as u8)?;
        buffer.write_u32_little_endian(self.items.len() as u32)?;
        for item in &self.items {
            item.borrow().save_to_buffer_pmx(info, buffer)?;
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, parent_model: &Model) {
        for item in &self.items {
            item.borrow_mut().resolve(parent_model);
        }
    }

    impl_name_accessors!();

    pub fn is_special(&self) -> bool {
        self.is_special
    }

    pub fn get_all_item_objects(&self) -> &[Rc<RefCell<ModelLabelItem>>] {
        &self.items
    }

    pub(crate) fn set_special(&mut self, value: bool) {
        self.is_special = value;
    }

    pub(crate) fn insert_item_object(
        &mut self,
        item: &Rc<RefCell<ModelLabelItem>>,
        index: i32,
    ) -> Result<(), Status> {
        insert_object(
            &mut self.items,
            item,
            index,
            Status::ErrorModelLabelAlreadyExists,
        )
    }

    pub(crate) fn remove_item_object(
        &mut self,
        item: &Rc<RefCell<ModelLabelItem>>,
    ) -> Result<(), Status> {
        remove_object(&mut self.items, item, Status::ErrorModelLabelItemNotFound)
    }
}

#[test]
fn test_model_label_item_unknown_type() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_string("label", crate::utils::CodecType::Utf8)?;
    mutable_buffer.write_string("", crate::utils::CodecType::Utf8)?;
    mutable_buffer.write_byte(0)?;
    mutable_buffer.write_u32_little_endian(1)?;
    mutable_buffer.write_byte(2)?;
    mutable_buffer.write_byte(0)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    assert_eq!(
        Some(Status::ErrorModelLabelCorrupted),
        ModelLabel::parse_pmx(&Info::default(), &mut buffer).err()
    );
    Ok(())
}

#[test]
fn test_model_label_items_insert_remove() {
    let bone = Rc::new(RefCell::new(ModelBone::default()));
    let morph = Rc::new(RefCell::new(ModelMorph::default()));
    let bone_item = Rc::new(RefCell::new(ModelLabelItem::create_from_bone_object(&bone)));
    let morph_item = Rc::new(RefCell::new(ModelLabelItem::create_from_morph_object(
        &morph,
    )));
    let mut label = ModelLabel::default();
    assert_eq!(Ok(()), label.insert_item_object(&bone_item, -1));
    assert_eq!(Ok(()), label.insert_item_object(&morph_item, 0));
    assert_eq!(
        Err(Status::ErrorModelLabelAlreadyExists),
        label.insert_item_object(&bone_item, -1)
    );
    assert_eq!(ModelLabelItemType::Morph, label.items[0].borrow().get_type());
    assert!(label.items[1].borrow().get_bone_object().is_some());
    assert!(label.items[1].borrow().get_morph_object().is_none());
    assert_eq!(Ok(()), label.remove_item_object(&morph_item));
    assert_eq!(
        Err(Status::ErrorModelLabelItemNotFound),
        label.remove_item_object(&morph_item)
    );
}
