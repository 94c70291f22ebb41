use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status, F128},
    mutable::common::MutableBuffer,
    utils::CodecType,
};

use super::{
    Info, Model, ModelObject, ModelObjectBase, PMD_MATERIAL_DIFFUSE_TEXTURE_NAME_LENGTH,
    PMD_TOON_TEXTURE_PATH_LENGTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelMaterialFlags {
    pub is_culling_disabled: bool,
    pub is_casting_shadow_enabled: bool,
    pub is_casting_shadow_map_enabled: bool,
    pub is_shadow_map_enabled: bool,
    pub is_edge_enabled: bool,
    pub is_vertex_color_enabled: bool,
    pub is_point_draw_enabled: bool,
    pub is_line_draw_enabled: bool,
}

impl ModelMaterialFlags {
    fn from_u8(value: u8) -> ModelMaterialFlags {
        ModelMaterialFlags {
            is_culling_disabled: value & 0x1 != 0,
            is_casting_shadow_enabled: value & 0x2 != 0,
            is_casting_shadow_map_enabled: value & 0x4 != 0,
            is_shadow_map_enabled: value & 0x8 != 0,
            is_edge_enabled: value & 0x10 != 0,
            is_vertex_color_enabled: value & 0x20 != 0,
            is_point_draw_enabled: value & 0x40 != 0,
            is_line_draw_enabled: value & 0x80 != 0,
        }
    }

    fn to_u8(self) -> u8 {
        [
            self.is_culling_disabled,
            self.is_casting_shadow_enabled,
            self.is_casting_shadow_map_enabled,
            self.is_shadow_map_enabled,
            self.is_edge_enabled,
            self.is_vertex_color_enabled,
            self.is_point_draw_enabled,
            self.is_line_draw_enabled,
        ]
        .iter()
        .enumerate()
        .fold(0u8, |acc, (bit, flag)| acc | ((*flag as u8) << bit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelMaterialSphereMapTextureType {
    Unknown = -1,
    #[default]
    TypeNone,
    TypeMultiply,
    TypeAdd,
    TypeSubTexture,
}

impl From<i32> for ModelMaterialSphereMapTextureType {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::TypeNone,
            1 => Self::TypeMultiply,
            2 => Self::TypeAdd,
            3 => Self::TypeSubTexture,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelTexture {
    pub base: ModelObject,
    pub(crate) path: String,
}

impl ModelTexture {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelTexture, Status> {
        Ok(ModelTexture {
            base: ModelObject::default(),
            path: info.read_string(buffer)?,
        })
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        info.write_string(&self.path, buffer)
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelTexture, Status> {
        Ok(ModelTexture {
            base: ModelObject::default(),
            path: buffer
                .read_string_from_cp932(PMD_TOON_TEXTURE_PATH_LENGTH)
                .map_err(|_| Status::ErrorModelTextureCorrupted)?,
        })
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_fixed_string(&self.path, PMD_TOON_TEXTURE_PATH_LENGTH)
    }

    pub fn get_path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, value: &str) {
        self.path = value.to_owned();
    }
}

/// Material of one run of vertex indices.
///
/// PMX materials share textures with the model's texture list; PMD
/// materials own theirs, so textures are held strongly.
#[derive(Debug, Clone)]
pub struct ModelMaterial {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) diffuse_color: F128,
    pub(crate) diffuse_opacity: f32,
    pub(crate) specular_power: f32,
    pub(crate) specular_color: F128,
    pub(crate) ambient_color: F128,
    pub(crate) edge_color: F128,
    pub(crate) edge_opacity: f32,
    pub(crate) edge_size: f32,
    pub(crate) diffuse_texture: Option<Rc<RefCell<ModelTexture>>>,
    pub(crate) sphere_map_texture: Option<Rc<RefCell<ModelTexture>>>,
    pub(crate) toon_texture: Option<Rc<RefCell<ModelTexture>>>,
    diffuse_texture_index: i32,
    sphere_map_texture_index: i32,
    pub(crate) toon_texture_index: i32,
    pub(crate) sphere_map_texture_type: ModelMaterialSphereMapTextureType,
    pub(crate) is_toon_shared: bool,
    pub(crate) num_vertex_indices: usize,
    pub(crate) flags: ModelMaterialFlags,
    pub(crate) clob: String,
}

impl Default for ModelMaterial {
    fn default() -> Self {
        Self {
            base: ModelObject::default(),
            name_ja: String::default(),
            name_en: String::default(),
            diffuse_color: F128::default(),
            diffuse_opacity: 0.0f32,
            specular_power: 0.0f32,
            specular_color: F128::default(),
            ambient_color: F128::default(),
            edge_color: F128::default(),
            edge_opacity: 0.0f32,
            edge_size: 0.0f32,
            diffuse_texture: None,
            sphere_map_texture: None,
            toon_texture: None,
            diffuse_texture_index: -1,
            sphere_map_texture_index: -1,
            toon_texture_index: -1,
            sphere_map_texture_type: ModelMaterialSphereMapTextureType::TypeNone,
            is_toon_shared: false,
            num_vertex_indices: 0,
            flags: ModelMaterialFlags::default(),
            clob: String::default(),
        }
    }
}

fn texture_index(texture: &Option<Rc<RefCell<ModelTexture>>>) -> i32 {
    texture
        .as_ref()
        .and_then(|texture| texture.try_borrow().ok().map(|t| t.get_index()))
        .unwrap_or(-1)
}

fn find_texture(textures: &[Rc<RefCell<ModelTexture>>], index: i32) -> Option<Rc<RefCell<ModelTexture>>> {
    if index < 0 {
        return None;
    }
    let texture = textures.get(index as usize).cloned();
    if texture.is_none() {
        log::warn!("texture index {} is out of range, treated as none", index);
    }
    texture
}

impl ModelMaterial {
    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelMaterial, Status> {
        let texture_index_size = info.texture_index_size as usize;
        let mut material = ModelMaterial {
            base: ModelObject::default(),
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            diffuse_color: buffer.read_f32_3_little_endian()?,
            diffuse_opacity: buffer.read_f32_little_endian()?,
            specular_color: buffer.read_f32_3_little_endian()?,
            specular_power: buffer.read_f32_little_endian()?,
            ambient_color: buffer.read_f32_3_little_endian()?,
            flags: ModelMaterialFlags::from_u8(buffer.read_byte()?),
            edge_color: buffer.read_f32_3_little_endian()?,
            edge_opacity: buffer.read_f32_little_endian()?,
            edge_size: buffer.read_f32_little_endian()?,
            diffuse_texture_index: buffer.read_integer_nullable(texture_index_size)?,
            sphere_map_texture_index: buffer.read_integer_nullable(texture_index_size)?,
            ..Default::default()
        };
        if material.flags.is_point_draw_enabled {
            material.flags.is_casting_shadow_enabled = false;
            material.flags.is_casting_shadow_map_enabled = false;
            material.flags.is_shadow_map_enabled = false;
        } else if material.flags.is_line_draw_enabled {
            material.flags.is_edge_enabled = false;
        }
        let sphere_map_texture_type_raw = buffer.read_byte()?;
        material.sphere_map_texture_type = if sphere_map_texture_type_raw == 0xffu8 {
            ModelMaterialSphereMapTextureType::TypeNone
        } else {
            ModelMaterialSphereMapTextureType::from(sphere_map_texture_type_raw as i32)
        };
        if material.sphere_map_texture_type == ModelMaterialSphereMapTextureType::Unknown {
            return Err(Status::ErrorModelMaterialCorrupted);
        }
        material.is_toon_shared = buffer.read_byte()? != 0u8;
        material.toon_texture_index = if material.is_toon_shared {
            buffer.read_byte()? as i32
        } else {
            buffer.read_integer_nullable(texture_index_size)?
        };
        material.clob = info.read_string(buffer)?;
        material.num_vertex_indices = buffer.read_i32_little_endian()?.max(0) as usize;
        Ok(material)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        let texture_index_size = info.texture_index_size as usize;
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_f32_3_little_endian(self.diffuse_color)?;
        buffer.write_f32_little_endian(self.diffuse_opacity)?;
        buffer.write_f32_3_little_endian(self.specular_color)?;
        buffer.write_f32_little_endian(self.specular_power)?;
        buffer.write_f32_3_little_endian(self.ambient_color)?;
        buffer.write_byte(self.flags.to_u8())?;
        buffer.write_f32_3_little_endian(self.edge_color)?;
        buffer.write_f32_little_endian(self.edge_opacity)?;
        buffer.write_f32_little_endian(self.edge_size)?;
        buffer.write_integer(texture_index(&self.diffuse_texture), texture_index_size)?;
        let sphere_map_texture_type = match self.sphere_map_texture_type {
            ModelMaterialSphereMapTextureType::Unknown => {
                ModelMaterialSphereMapTextureType::TypeNone
            }
            value => value,
        };
        let sphere_map_texture_index =
            if sphere_map_texture_type == ModelMaterialSphereMapTextureType::TypeNone {
                -1
            } else {
                texture_index(&self.sphere_map_texture)
            };
        buffer.write_integer(sphere_map_texture_index, texture_index_size)?;
        buffer.write_byte(sphere_map_texture_type as u8)?;
        buffer.write_byte(self.is_toon_shared as u8)?;
        if self.is_toon_shared {
            buffer.write_byte(self.toon_texture_index as u8)?;
        } else {
            let toon_texture_index = match texture_index(&self.toon_texture) {
                index if index >= 0 => index,
                _ => self.toon_texture_index,
            };
            buffer.write_integer(toon_texture_index, texture_index_size)?;
        }
        info.write_string(&self.clob, buffer)?;
        buffer.write_i32_little_endian(self.num_vertex_indices as i32)
    }

    fn set_texture_pmd(&mut self, name: &[u8]) -> Result<(), Status> {
        let path = CodecType::Sjis.decode(name)?;
        let texture = Some(Rc::new(RefCell::new(ModelTexture {
            base: ModelObject::default(),
            path,
        })));
        if name.ends_with(b".spa") {
            self.sphere_map_texture = texture;
            self.sphere_map_texture_type = ModelMaterialSphereMapTextureType::TypeAdd;
        } else if name.ends_with(b".sph") {
            self.sphere_map_texture = texture;
            self.sphere_map_texture_type = ModelMaterialSphereMapTextureType::TypeMultiply;
        } else {
            self.diffuse_texture = texture;
        }
        Ok(())
    }

    pub(crate) fn parse_pmd(buffer: &mut Buffer) -> Result<ModelMaterial, Status> {
        let mut material = ModelMaterial {
            diffuse_color: buffer.read_f32_3_little_endian()?,
            diffuse_opacity: buffer.read_f32_little_endian()?,
            specular_power: buffer.read_f32_little_endian()?,
            specular_color: buffer.read_f32_3_little_endian()?,
            ambient_color: buffer.read_f32_3_little_endian()?,
            edge_size: 1.0f32,
            edge_opacity: 1.0f32,
            ..Default::default()
        };
        material.toon_texture_index = buffer.read_byte()? as i32;
        material.is_toon_shared = material.toon_texture_index != 0xff;
        if !material.is_toon_shared {
            material.toon_texture_index = -1;
        }
        material.flags.is_edge_enabled = buffer.read_byte()? != 0;
        material.num_vertex_indices = buffer.read_i32_little_endian()?.max(0) as usize;
        let opacity = material.diffuse_opacity;
        material.flags.is_culling_disabled = opacity < 1.0f32;
        material.flags.is_casting_shadow_enabled = material.flags.is_edge_enabled;
        material.flags.is_casting_shadow_map_enabled = !(0.98f32..0.99f32).contains(&opacity);
        material.flags.is_shadow_map_enabled = true;
        let name = buffer
            .read_buffer(PMD_MATERIAL_DIFFUSE_TEXTURE_NAME_LENGTH)
            .map_err(|_| Status::ErrorModelMaterialCorrupted)?
            .to_vec();
        let name = match name.iter().position(|c| *c == 0u8) {
            Some(pos) => &name[..pos],
            None => &name[..],
        };
        if !name.is_empty() {
            match name.iter().position(|c| *c == b'*') {
                Some(pos) => {
                    material.set_texture_pmd(&name[..pos])?;
                    material.set_texture_pmd(&name[pos + 1..])?;
                }
                None => material.set_texture_pmd(name)?,
            }
        }
        Ok(material)
    }

    pub(crate) fn save_to_buffer_pmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_f32_3_little_endian(self.diffuse_color)?;
        buffer.write_f32_little_endian(self.diffuse_opacity)?;
        buffer.write_f32_little_endian(self.specular_power)?;
        buffer.write_f32_3_little_endian(self.specular_color)?;
        buffer.write_f32_3_little_endian(self.ambient_color)?;
        buffer.write_byte(if self.is_toon_shared {
            self.toon_texture_index as u8
        } else {
            0xff
        })?;
        buffer.write_byte(self.flags.is_edge_enabled as u8)?;
        buffer.write_i32_little_endian(self.num_vertex_indices as i32)?;
        let diffuse = self.diffuse_texture.as_ref().map(|t| t.borrow().path.clone());
        let sphere = match self.sphere_map_texture_type {
            ModelMaterialSphereMapTextureType::TypeNone
            | ModelMaterialSphereMapTextureType::Unknown => None,
            _ => self
                .sphere_map_texture
                .as_ref()
                .map(|t| t.borrow().path.clone()),
        };
        let name = match (diffuse, sphere) {
            (Some(diffuse), Some(sphere)) => format!("{}*{}", diffuse, sphere),
            (Some(path), None) | (None, Some(path)) => path,
            (None, None) => String::new(),
        };
        buffer.write_fixed_string(&name, PMD_MATERIAL_DIFFUSE_TEXTURE_NAME_LENGTH)
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        let textures = &parent_model.textures;
        self.diffuse_texture = find_texture(textures, self.diffuse_texture_index);
        self.sphere_map_texture = find_texture(textures, self.sphere_map_texture_index);
        if !self.is_toon_shared {
            self.toon_texture = find_texture(textures, self.toon_texture_index);
        }
        self.diffuse_texture_index = -1;
        self.sphere_map_texture_index = -1;
    }

    impl_name_accessors!();

    pub fn get_diffuse_texture_object(&self) -> Option<Rc<RefCell<ModelTexture>>> {
        self.diffuse_texture.clone()
    }

    pub fn get_sphere_map_texture_object(&self) -> Option<Rc<RefCell<ModelTexture>>> {
        self.sphere_map_texture.clone()
    }

    /// Only a non-shared toon refers to a texture object; a shared toon is
    /// an index into the application's built-in toon table.
    pub fn get_toon_texture_object(&self) -> Option<Rc<RefCell<ModelTexture>>> {
        if self.is_toon_shared {
            None
        } else {
            self.toon_texture.clone()
        }
    }

    pub fn get_toon_texture_index(&self) -> i32 {
        self.toon_texture_index
    }

    pub fn get_clob(&self) -> &str {
        &self.clob
    }

    pub fn get_ambient_color(&self) -> F128 {
        self.ambient_color
    }

    pub fn get_diffuse_color(&self) -> F128 {
        self.diffuse_color
    }

    pub fn get_specular_color(&self) -> F128 {
        self.specular_color
    }

    pub fn get_edge_color(&self) -> F128 {
        self.edge_color
    }

    pub fn get_diffuse_opacity(&self) -> f32 {
        self.diffuse_opacity
    }

    pub fn get_edge_opacity(&self) -> f32 {
        self.edge_opacity
    }

    pub fn get_edge_size(&self) -> f32 {
        self.edge_size
    }

    pub fn get_specular_power(&self) -> f32 {
        self.specular_power
    }

    pub fn get_sphere_map_texture_type(&self) -> ModelMaterialSphereMapTextureType {
        self.sphere_map_texture_type
    }

    pub fn get_num_vertex_indices(&self) -> usize {
        self.num_vertex_indices
    }

    pub fn get_flags(&self) -> ModelMaterialFlags {
        self.flags
    }

    pub fn is_toon_shared(&self) -> bool {
        self.is_toon_shared
    }

    pub fn is_culling_disabled(&self) -> bool {
        self.flags.is_culling_disabled
    }

    pub fn is_casting_shadow_enabled(&self) -> bool {
        self.flags.is_casting_shadow_enabled
    }

    pub fn is_casting_shadow_map_enabled(&self) -> bool {
        self.flags.is_casting_shadow_map_enabled
    }

    pub fn is_shadow_map_enabled(&self) -> bool {
        self.flags.is_shadow_map_enabled
    }

    pub fn is_edge_enabled(&self) -> bool {
        self.flags.is_edge_enabled
    }

    pub fn is_vertex_color_enabled(&self) -> bool {
        self.flags.is_vertex_color_enabled
    }

    pub fn is_point_draw_enabled(&self) -> bool {
        self.flags.is_point_draw_enabled
    }

    pub fn is_line_draw_enabled(&self) -> bool {
        self.flags.is_line_draw_enabled
    }

    pub(crate) fn set_diffuse_texture_object(&mut self, value: Option<&Rc<RefCell<ModelTexture>>>) {
        self.diffuse_texture = value.cloned();
    }

    pub(crate) fn set_sphere_map_texture_object(
        &mut self,
        value: Option<&Rc<RefCell<ModelTexture>>>,
    ) {
        self.sphere_map_texture = value.cloned();
    }

    pub(crate) fn set_toon_texture_object(&mut self, value: Option<&Rc<RefCell<ModelTexture>>>) {
        self.toon_texture = value.cloned();
    }

    pub(crate) fn set_toon_texture_index(&mut self, value: i32) {
        self.toon_texture_index = value;
        self.toon_texture = None;
    }

    pub(crate) fn set_clob(&mut self, value: &str) {
        self.clob = value.to_owned();
    }

    pub(crate) fn set_ambient_color(&mut self, value: F128) {
        self.ambient_color = value;
    }

    pub(crate) fn set_diffuse_color(&mut self, value: F128) {
        self.diffuse_color = value;
    }

    pub(crate) fn set_specular_color(&mut self, value: F128) {
        self.specular_color = value;
    }

    pub(crate) fn set_edge_color(&mut self, value: F128) {
        self.edge_color = value;
    }

    pub(crate) fn set_diffuse_opacity(&mut self, value: f32) {
        self.diffuse_opacity = value;
    }

    pub(crate) fn set_edge_opacity(&mut self, value: f32) {
        self.edge_opacity = value;
    }

    pub(crate) fn set_edge_size(&mut self, value: f32) {
        self.edge_size = value;
    }

    pub(crate) fn set_specular_power(&mut self, value: f32) {
        self.specular_power = value;
    }

    pub(crate) fn set_sphere_map_texture_type(&mut self, value: ModelMaterialSphereMapTextureType) {
        self.sphere_map_texture_type = value;
    }

    pub(crate) fn set_num_vertex_indices(&mut self, value: usize) {
        self.num_vertex_indices = value;
    }

    pub(crate) fn set_toon_shared(&mut self, value: bool) {
        self.is_toon_shared = value;
    }

    pub(crate) fn set_flags(&mut self, value: ModelMaterialFlags) {
        self.flags = value;
    }
}

#[test]
fn test_model_material_flags_bits() {
    let flags = ModelMaterialFlags::from_u8(0b1001_0011);
    assert!(flags.is_culling_disabled);
    assert!(flags.is_casting_shadow_enabled);
    assert!(!flags.is_casting_shadow_map_enabled);
    assert!(flags.is_edge_enabled);
    assert!(flags.is_line_draw_enabled);
    assert_eq!(0b1001_0011, flags.to_u8());
}

#[test]
fn test_model_material_parse_pmd_texture_names() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_f32_3_little_endian(F128([1.0, 1.0, 1.0, 0.0]))?;
    mutable_buffer.write_f32_little_endian(0.985)?;
    mutable_buffer.write_f32_little_endian(5.0)?;
    mutable_buffer.write_f32_3_little_endian(F128::default())?;
    mutable_buffer.write_f32_3_little_endian(F128::default())?;
    mutable_buffer.write_byte(0xff)?;
    mutable_buffer.write_byte(1)?;
    mutable_buffer.write_i32_little_endian(3)?;
    mutable_buffer.write_fixed_string("face.png*env.spa", 20)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let material = ModelMaterial::parse_pmd(&mut buffer)?;
    assert!(buffer.is_end());
    assert_eq!(
        Some("face.png".to_owned()),
        material
            .get_diffuse_texture_object()
            .map(|t| t.borrow().get_path().to_owned())
    );
    assert_eq!(
        ModelMaterialSphereMapTextureType::TypeAdd,
        material.get_sphere_map_texture_type()
    );
    assert!(!material.is_toon_shared());
    assert!(material.is_culling_disabled());
    assert!(!material.is_casting_shadow_map_enabled());
    assert!(material.is_edge_enabled());
    assert_eq!(3, material.get_num_vertex_indices());
    Ok(())
}
