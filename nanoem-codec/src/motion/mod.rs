use std::{cmp::Ordering, collections::HashMap};

use crate::{
    common::{Buffer, Status},
    mutable::common::MutableBuffer,
    utils::compare,
};

pub mod keyframe;
mod nmd;
pub mod track;

pub use keyframe::{
    MotionAccessoryKeyframe, MotionBoneKeyframe, MotionBoneKeyframeInterpolation,
    MotionBoneKeyframeInterpolationType, MotionCameraKeyframe, MotionCameraKeyframeInterpolation,
    MotionCameraKeyframeInterpolationType, MotionEffectParameter, MotionEffectParameterValue,
    MotionKeyframeBase, MotionLightKeyframe, MotionModelKeyframe,
    MotionModelKeyframeConstraintState, MotionMorphKeyframe, MotionOutsideParent,
    MotionSelfShadowKeyframe,
};
pub use track::{Keyframe, MotionTrack, MotionTrackBundle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionFormatType {
    #[default]
    Unknown = -1,
    Vmd,
    Nmd,
}

impl From<i32> for MotionFormatType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Vmd,
            1 => Self::Nmd,
            _ => Self::Unknown,
        }
    }
}

/// Nearest keyframe strictly before `frame_index` and nearest strictly after
/// it (or the last one) in a frame sorted slice.
fn search_closest_in<K: Keyframe>(keyframes: &[K], frame_index: u32) -> (Option<&K>, Option<&K>) {
    let before = keyframes.partition_point(|keyframe| keyframe.frame_index() < frame_index);
    let not_after = keyframes.partition_point(|keyframe| keyframe.frame_index() <= frame_index);
    (
        before.checked_sub(1).and_then(|pos| keyframes.get(pos)),
        keyframes.get(not_after).or(keyframes.last()),
    )
}

fn find_in<K: Keyframe>(keyframes: &[K], frame_index: u32) -> Option<&K> {
    keyframes
        .binary_search_by(|keyframe| keyframe.frame_index().cmp(&frame_index))
        .ok()
        .and_then(|pos| keyframes.get(pos))
}

fn find_mut_in<K: Keyframe>(keyframes: &mut [K], frame_index: u32) -> Option<&mut K> {
    keyframes
        .binary_search_by(|keyframe| keyframe.frame_index().cmp(&frame_index))
        .ok()
        .and_then(|pos| keyframes.get_mut(pos))
}

fn reindex_keyframes<K: Keyframe>(keyframes: &mut [K]) {
    for (index, keyframe) in keyframes.iter_mut().enumerate() {
        keyframe.set_index(index);
    }
}

fn insert_sorted<K: Keyframe>(
    keyframes: &mut Vec<K>,
    keyframe: K,
    already_exists: Status,
) -> Result<(), Status> {
    match keyframes.binary_search_by(|k| k.frame_index().cmp(&keyframe.frame_index())) {
        Ok(_) => Err(already_exists),
        Err(pos) => {
            keyframes.insert(pos, keyframe);
            reindex_keyframes(keyframes);
            Ok(())
        }
    }
}

fn remove_sorted<K: Keyframe>(
    keyframes: &mut Vec<K>,
    frame_index: u32,
    not_found: Status,
) -> Result<K, Status> {
    match keyframes.binary_search_by(|k| k.frame_index().cmp(&frame_index)) {
        Ok(pos) => {
            let keyframe = keyframes.remove(pos);
            reindex_keyframes(keyframes);
            Ok(keyframe)
        }
        Err(_) => Err(not_found),
    }
}

/// Parses a count prefixed block of frame indexed keyframes, sorted by frame.
fn parse_keyframe_block_vmd<K, F>(
    buffer: &mut Buffer,
    offset: u32,
    tweak_length: usize,
    mut parse: F,
) -> Result<Vec<K>, Status>
where
    K: Keyframe,
    F: FnMut(&mut Buffer, u32) -> Result<K, Status>,
{
    let num_keyframes = buffer.read_len()?;
    let mut keyframes = Vec::with_capacity(num_keyframes);
    for _ in 0..num_keyframes {
        keyframes.push(parse(buffer, offset)?);
    }
    if num_keyframes == 0 && buffer.len() - buffer.offset() == tweak_length {
        // some exporters leave a single zeroed record after an empty block
        buffer.skip(tweak_length)?;
    }
    keyframes.sort_by_key(|keyframe| keyframe.frame_index());
    reindex_keyframes(&mut keyframes);
    Ok(keyframes)
}

/// Keyframe animation of one model, or of the camera, light and accessories
/// of a scene.
#[derive(Debug, Clone)]
pub struct Motion {
    pub(crate) annotations: HashMap<String, String>,
    pub(crate) target_model_name: String,
    pub(crate) accessory_keyframes: Vec<MotionAccessoryKeyframe>,
    pub(crate) camera_keyframes: Vec<MotionCameraKeyframe>,
    pub(crate) light_keyframes: Vec<MotionLightKeyframe>,
    pub(crate) model_keyframes: Vec<MotionModelKeyframe>,
    pub(crate) self_shadow_keyframes: Vec<MotionSelfShadowKeyframe>,
    pub(crate) local_bone_motion_track_bundle: MotionTrackBundle<MotionBoneKeyframe>,
    pub(crate) local_morph_motion_track_bundle: MotionTrackBundle<MotionMorphKeyframe>,
    pub(crate) typ: MotionFormatType,
    pub(crate) max_frame_index: u32,
    pub(crate) preferred_fps: f32,
}

impl Default for Motion {
    fn default() -> Self {
        Self::empty()
    }
}

impl Motion {
    const VMD_SIGNATURE_SIZE: usize = 30;
    const VMD_SIGNATURE_TYPE2: &'static [u8] = b"Vocaloid Motion Data 0002\0";
    const VMD_SIGNATURE_TYPE1: &'static [u8] = b"Vocaloid Motion Data file\0";
    const VMD_TARGET_MODEL_NAME_LENGTH_V2: usize = 20;
    const VMD_TARGET_MODEL_NAME_LENGTH_V1: usize = 10;
    const VMD_CAMERA_KEYFRAME_TWEAK_LENGTH: usize = 61;
    const VMD_LIGHT_KEYFRAME_TWEAK_LENGTH: usize = 28;
    const VMD_SELF_SHADOW_KEYFRAME_TWEAK_LENGTH: usize = 9;
    const DEFAULT_FPS: f32 = 30f32;

    pub fn empty() -> Self {
        Self {
            annotations: HashMap::new(),
            target_model_name: "".to_owned(),
            accessory_keyframes: vec![],
            camera_keyframes: vec![],
            light_keyframes: vec![],
            model_keyframes: vec![],
            self_shadow_keyframes: vec![],
            local_bone_motion_track_bundle: MotionTrackBundle::new(),
            local_morph_motion_track_bundle: MotionTrackBundle::new(),
            typ: MotionFormatType::Unknown,
            max_frame_index: 0,
            preferred_fps: Self::DEFAULT_FPS,
        }
    }

    /// Loads a VMD motion; every stored frame index is shifted by `offset`.
    pub fn load_from_buffer(buffer: &mut Buffer, offset: u32) -> Result<Self, Status> {
        Self::load_from_buffer_vmd(buffer, offset)
    }

    pub fn load_from_buffer_nmd(buffer: &mut Buffer, offset: u32) -> Result<Self, Status> {
        let mut motion = Self::empty();
        nmd::load(&mut motion, buffer, offset)?;
        motion.typ = MotionFormatType::Nmd;
        motion.update_max_frame_index();
        Ok(motion)
    }

    fn load_from_buffer_vmd(buffer: &mut Buffer, offset: u32) -> Result<Self, Status> {
        let mut motion = Self::empty();
        let sig = buffer
            .read_buffer(Self::VMD_SIGNATURE_SIZE)
            .map_err(|_| Status::ErrorInvalidSignature)?;
        let name_length = if compare(
            &sig[0..Self::VMD_SIGNATURE_TYPE2.len()],
            Self::VMD_SIGNATURE_TYPE2,
        ) == Ordering::Equal
        {
            Self::VMD_TARGET_MODEL_NAME_LENGTH_V2
        } else if compare(
            &sig[0..Self::VMD_SIGNATURE_TYPE1.len()],
            Self::VMD_SIGNATURE_TYPE1,
        ) == Ordering::Equal
        {
            Self::VMD_TARGET_MODEL_NAME_LENGTH_V1
        } else {
            return Err(Status::ErrorInvalidSignature);
        };
        motion.typ = MotionFormatType::Vmd;
        motion.target_model_name = keyframe::read_fixed_name(buffer, name_length)
            .map_err(|_| Status::ErrorMotionTargetNameCorrupted)?;
        motion.parse_vmd(buffer, offset)?;
        Ok(motion)
    }

    fn parse_vmd(&mut self, buffer: &mut Buffer, offset: u32) -> Result<(), Status> {
        self.parse_bone_keyframe_block_vmd(buffer, offset)
            .map_err(|_| Status::ErrorMotionBoneKeyframeCorrupted)?;
        self.parse_morph_keyframe_block_vmd(buffer, offset)
            .map_err(|_| Status::ErrorMotionMorphKeyframeCorrupted)?;
        log::debug!(
            "VMD {}: {} bone keyframes, {} morph keyframes",
            self.target_model_name,
            self.local_bone_motion_track_bundle.keyframe_len(),
            self.local_morph_motion_track_bundle.keyframe_len()
        );
        if !buffer.is_end() {
            self.camera_keyframes = parse_keyframe_block_vmd(
                buffer,
                offset,
                Self::VMD_CAMERA_KEYFRAME_TWEAK_LENGTH,
                MotionCameraKeyframe::parse_vmd,
            )
            .map_err(|_| Status::ErrorMotionCameraKeyframeCorrupted)?;
        }
        if !buffer.is_end() {
            self.light_keyframes = parse_keyframe_block_vmd(
                buffer,
                offset,
                Self::VMD_LIGHT_KEYFRAME_TWEAK_LENGTH,
                MotionLightKeyframe::parse_vmd,
            )
            .map_err(|_| Status::ErrorMotionLightKeyframeCorrupted)?;
        }
        if !buffer.is_end() {
            self.self_shadow_keyframes = parse_keyframe_block_vmd(
                buffer,
                offset,
                Self::VMD_SELF_SHADOW_KEYFRAME_TWEAK_LENGTH,
                MotionSelfShadowKeyframe::parse_vmd,
            )
            .map_err(|_| Status::ErrorMotionSelfShadowKeyframeCorrupted)?;
        }
        if !buffer.is_end() {
            self.model_keyframes =
                parse_keyframe_block_vmd(buffer, offset, 0, MotionModelKeyframe::parse_vmd)
                    .map_err(|_| Status::ErrorMotionModelKeyframeCorrupted)?;
        } else {
            log::debug!("VMD {} has no model keyframe block", self.target_model_name);
        }
        self.update_max_frame_index();
        if buffer.is_end() {
            Ok(())
        } else {
            Err(Status::ErrorBufferNotEnd)
        }
    }

    fn parse_bone_keyframe_block_vmd(
        &mut self,
        buffer: &mut Buffer,
        offset: u32,
    ) -> Result<(), Status> {
        let num_bone_keyframes = buffer.read_len()?;
        self.local_bone_motion_track_bundle.clear();
        for _ in 0..num_bone_keyframes {
            let (keyframe, bone_name) = MotionBoneKeyframe::parse_vmd(buffer, offset)?;
            let frame_index = keyframe.base.frame_index;
            if self
                .local_bone_motion_track_bundle
                .force_add_keyframe(keyframe, &bone_name)
                .is_some()
            {
                log::warn!("duplicated bone keyframe {bone_name} at {frame_index}, last one wins");
            }
        }
        self.local_bone_motion_track_bundle.reindex();
        Ok(())
    }

    fn parse_morph_keyframe_block_vmd(
        &mut self,
        buffer: &mut Buffer,
        offset: u32,
    ) -> Result<(), Status> {
        let num_morph_keyframes = buffer.read_len()?;
        self.local_morph_motion_track_bundle.clear();
        for _ in 0..num_morph_keyframes {
            let (keyframe, morph_name) = MotionMorphKeyframe::parse_vmd(buffer, offset)?;
            let frame_index = keyframe.base.frame_index;
            if self
                .local_morph_motion_track_bundle
                .force_add_keyframe(keyframe, &morph_name)
                .is_some()
            {
                log::warn!("duplicated morph keyframe {morph_name} at {frame_index}, last one wins");
            }
        }
        self.local_morph_motion_track_bundle.reindex();
        Ok(())
    }

    pub(crate) fn update_max_frame_index(&mut self) {
        fn last_frame<K: Keyframe>(keyframes: &[K]) -> u32 {
            keyframes.last().map_or(0, |keyframe| keyframe.frame_index())
        }
        self.max_frame_index = self
            .local_bone_motion_track_bundle
            .max_frame_index()
            .unwrap_or(0)
            .max(
                self.local_morph_motion_track_bundle
                    .max_frame_index()
                    .unwrap_or(0),
            )
            .max(last_frame(&self.accessory_keyframes))
            .max(last_frame(&self.camera_keyframes))
            .max(last_frame(&self.light_keyframes))
            .max(last_frame(&self.self_shadow_keyframes))
            .max(last_frame(&self.model_keyframes));
    }

    /// Writes the motion as VMD. Frame indices are written as stored.
    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_byte_array(Self::VMD_SIGNATURE_TYPE2)?;
        buffer.write_byte_array(
            &[0u8; Self::VMD_SIGNATURE_SIZE][Self::VMD_SIGNATURE_TYPE2.len()..],
        )?;
        buffer.write_fixed_string(
            &self.target_model_name,
            Self::VMD_TARGET_MODEL_NAME_LENGTH_V2,
        )?;
        buffer.write_u32_little_endian(self.local_bone_motion_track_bundle.keyframe_len() as u32)?;
        for (name, keyframe) in self.local_bone_motion_track_bundle.iter_with_name() {
            keyframe.save_to_buffer_vmd(name, buffer)?;
        }
        buffer
            .write_u32_little_endian(self.local_morph_motion_track_bundle.keyframe_len() as u32)?;
        for (name, keyframe) in self.local_morph_motion_track_bundle.iter_with_name() {
            keyframe.save_to_buffer_vmd(name, buffer)?;
        }
        buffer.write_u32_little_endian(self.camera_keyframes.len() as u32)?;
        for keyframe in &self.camera_keyframes {
            keyframe.save_to_buffer_vmd(buffer)?;
        }
        buffer.write_u32_little_endian(self.light_keyframes.len() as u32)?;
        for keyframe in &self.light_keyframes {
            keyframe.save_to_buffer_vmd(buffer)?;
        }
        buffer.write_u32_little_endian(self.self_shadow_keyframes.len() as u32)?;
        for keyframe in &self.self_shadow_keyframes {
            keyframe.save_to_buffer_vmd(buffer)?;
        }
        buffer.write_u32_little_endian(self.model_keyframes.len() as u32)?;
        for keyframe in &self.model_keyframes {
            keyframe.save_to_buffer_vmd(buffer)?;
        }
        if !self.accessory_keyframes.is_empty() {
            log::warn!(
                "{} accessory keyframes are not representable in VMD",
                self.accessory_keyframes.len()
            );
        }
        Ok(())
    }

    pub fn save_to_buffer_nmd(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_byte_array(&nmd::save(self)?)
    }
}

macro_rules! impl_frame_keyframes {
    ($typ: ty, $field: ident, $find: ident, $find_mut: ident, $search: ident, $add: ident, $remove: ident, $already_exists: expr, $not_found: expr) => {
        pub fn $find(&self, frame_index: u32) -> Option<&$typ> {
            find_in(&self.$field, frame_index)
        }

        pub(crate) fn $find_mut(&mut self, frame_index: u32) -> Option<&mut $typ> {
            find_mut_in(&mut self.$field, frame_index)
        }

        pub fn $search(&self, frame_index: u32) -> (Option<&$typ>, Option<&$typ>) {
            search_closest_in(&self.$field, frame_index)
        }

        pub(crate) fn $add(&mut self, mut keyframe: $typ, frame_index: u32) -> Result<(), Status> {
            keyframe.base.frame_index = frame_index;
            insert_sorted(&mut self.$field, keyframe, $already_exists)?;
            self.update_max_frame_index();
            Ok(())
        }

        pub(crate) fn $remove(&mut self, frame_index: u32) -> Result<$typ, Status> {
            let keyframe = remove_sorted(&mut self.$field, frame_index, $not_found)?;
            self.update_max_frame_index();
            Ok(keyframe)
        }
    };
}

macro_rules! impl_named_keyframes {
    ($typ: ty, $bundle: ident, $find: ident, $find_mut: ident, $search: ident, $add: ident, $remove: ident, $already_exists: expr, $not_found: expr) => {
        pub fn $find(&self, name: &str, frame_index: u32) -> Option<&$typ> {
            self.$bundle.find(name, frame_index)
        }

        pub(crate) fn $find_mut(&mut self, name: &str, frame_index: u32) -> Option<&mut $typ> {
            self.$bundle.find_mut(name, frame_index)
        }

        pub fn $search(&self, name: &str, frame_index: u32) -> (Option<&$typ>, Option<&$typ>) {
            self.$bundle.search_closest(name, frame_index)
        }

        pub(crate) fn $add(
            &mut self,
            mut keyframe: $typ,
            name: &str,
            frame_index: u32,
        ) -> Result<(), Status> {
            if self.$bundle.contains(name, frame_index) {
                return Err($already_exists);
            }
            keyframe.base.frame_index = frame_index;
            self.$bundle.force_add_keyframe(keyframe, name);
            self.$bundle.reindex();
            self.update_max_frame_index();
            Ok(())
        }

        pub(crate) fn $remove(&mut self, name: &str, frame_index: u32) -> Result<$typ, Status> {
            let keyframe = self
                .$bundle
                .remove_keyframe(frame_index, name)
                .ok_or($not_found)?;
            self.$bundle.reindex();
            self.update_max_frame_index();
            Ok(keyframe)
        }
    };
}

impl Motion {
    pub fn get_format_type(&self) -> MotionFormatType {
        self.typ
    }

    pub fn get_target_model_name(&self) -> &str {
        &self.target_model_name
    }

    pub fn get_max_frame_index(&self) -> u32 {
        self.max_frame_index
    }

    pub fn get_preferred_fps(&self) -> f32 {
        self.preferred_fps
    }

    pub fn get_annotation(&self, key: &str) -> Option<&String> {
        self.annotations.get(key)
    }

    pub fn get_all_accessory_keyframe_objects(&self) -> &[MotionAccessoryKeyframe] {
        &self.accessory_keyframes
    }

    pub fn get_all_bone_keyframe_objects(&self) -> impl Iterator<Item = &MotionBoneKeyframe> {
        self.local_bone_motion_track_bundle.iter()
    }

    pub fn get_all_camera_keyframe_objects(&self) -> &[MotionCameraKeyframe] {
        &self.camera_keyframes
    }

    pub fn get_all_light_keyframe_objects(&self) -> &[MotionLightKeyframe] {
        &self.light_keyframes
    }

    pub fn get_all_model_keyframe_objects(&self) -> &[MotionModelKeyframe] {
        &self.model_keyframes
    }

    pub fn get_all_morph_keyframe_objects(&self) -> impl Iterator<Item = &MotionMorphKeyframe> {
        self.local_morph_motion_track_bundle.iter()
    }

    pub fn get_all_self_shadow_keyframe_objects(&self) -> &[MotionSelfShadowKeyframe] {
        &self.self_shadow_keyframes
    }

    pub fn get_all_bone_track_names(&self) -> impl Iterator<Item = &String> {
        self.local_bone_motion_track_bundle.track_names()
    }

    pub fn get_all_morph_track_names(&self) -> impl Iterator<Item = &String> {
        self.local_morph_motion_track_bundle.track_names()
    }

    /// Keyframes of one bone track in frame order.
    pub fn extract_bone_track_keyframes(
        &self,
        name: &str,
    ) -> Option<impl Iterator<Item = &MotionBoneKeyframe>> {
        self.local_bone_motion_track_bundle
            .get_by_name(name)
            .map(|track| track.iter())
    }

    pub fn extract_morph_track_keyframes(
        &self,
        name: &str,
    ) -> Option<impl Iterator<Item = &MotionMorphKeyframe>> {
        self.local_morph_motion_track_bundle
            .get_by_name(name)
            .map(|track| track.iter())
    }

    impl_frame_keyframes!(
        MotionAccessoryKeyframe,
        accessory_keyframes,
        find_accessory_keyframe_object,
        find_accessory_keyframe_object_mut,
        search_closest_accessory_keyframes,
        add_accessory_keyframe,
        remove_accessory_keyframe,
        Status::ErrorMotionAccessoryKeyframeAlreadyExists,
        Status::ErrorMotionAccessoryKeyframeNotFound
    );
    impl_frame_keyframes!(
        MotionCameraKeyframe,
        camera_keyframes,
        find_camera_keyframe_object,
        find_camera_keyframe_object_mut,
        search_closest_camera_keyframes,
        add_camera_keyframe,
        remove_camera_keyframe,
        Status::ErrorMotionCameraKeyframeAlreadyExists,
        Status::ErrorMotionCameraKeyframeNotFound
    );
    impl_frame_keyframes!(
        MotionLightKeyframe,
        light_keyframes,
        find_light_keyframe_object,
        find_light_keyframe_object_mut,
        search_closest_light_keyframes,
        add_light_keyframe,
        remove_light_keyframe,
        Status::ErrorMotionLightKeyframeAlreadyExists,
        Status::ErrorMotionLightKeyframeNotFound
    );
    impl_frame_keyframes!(
        MotionModelKeyframe,
        model_keyframes,
        find_model_keyframe_object,
        find_model_keyframe_object_mut,
        search_closest_model_keyframes,
        add_model_keyframe,
        remove_model_keyframe,
        Status::ErrorMotionModelKeyframeAlreadyExists,
        Status::ErrorMotionModelKeyframeNotFound
    );
    impl_frame_keyframes!(
        MotionSelfShadowKeyframe,
        self_shadow_keyframes,
        find_self_shadow_keyframe_object,
        find_self_shadow_keyframe_object_mut,
        search_closest_self_shadow_keyframes,
        add_self_shadow_keyframe,
        remove_self_shadow_keyframe,
        Status::ErrorMotionSelfShadowKeyframeAlreadyExists,
        Status::ErrorMotionSelfShadowKeyframeNotFound
    );
    impl_named_keyframes!(
        MotionBoneKeyframe,
        local_bone_motion_track_bundle,
        find_bone_keyframe_object,
        find_bone_keyframe_object_mut,
        search_closest_bone_keyframes,
        add_bone_keyframe,
        remove_bone_keyframe,
        Status::ErrorMotionBoneKeyframeAlreadyExists,
        Status::ErrorMotionBoneKeyframeNotFound
    );
    impl_named_keyframes!(
        MotionMorphKeyframe,
        local_morph_motion_track_bundle,
        find_morph_keyframe_object,
        find_morph_keyframe_object_mut,
        search_closest_morph_keyframes,
        add_morph_keyframe,
        remove_morph_keyframe,
        Status::ErrorMotionMorphKeyframeAlreadyExists,
        Status::ErrorMotionMorphKeyframeNotFound
    );

    pub(crate) fn set_target_model_name(&mut self, value: &str) {
        self.target_model_name = value.to_owned();
    }

    pub(crate) fn set_preferred_fps(&mut self, value: f32) {
        self.preferred_fps = value;
    }

    pub(crate) fn set_annotation(&mut self, key: &str, value: &str) {
        self.annotations.insert(key.to_owned(), value.to_owned());
    }

    pub(crate) fn set_format_type(&mut self, value: MotionFormatType) {
        self.typ = value;
    }

    /// Re-sorts the frame indexed keyframes after their frame indices were
    /// edited in place.
    pub(crate) fn sort_all_keyframes(&mut self) {
        self.accessory_keyframes
            .sort_by(|a, b| MotionKeyframeBase::compare(&a.base, &b.base));
        self.camera_keyframes
            .sort_by(|a, b| MotionKeyframeBase::compare(&a.base, &b.base));
        self.light_keyframes
            .sort_by(|a, b| MotionKeyframeBase::compare(&a.base, &b.base));
        self.model_keyframes
            .sort_by(|a, b| MotionKeyframeBase::compare(&a.base, &b.base));
        self.self_shadow_keyframes
            .sort_by(|a, b| MotionKeyframeBase::compare(&a.base, &b.base));
        reindex_keyframes(&mut self.accessory_keyframes);
        reindex_keyframes(&mut self.camera_keyframes);
        reindex_keyframes(&mut self.light_keyframes);
        reindex_keyframes(&mut self.model_keyframes);
        reindex_keyframes(&mut self.self_shadow_keyframes);
        self.update_max_frame_index();
    }
}

#[test]
fn test_sig_len() {
    assert_eq!(Motion::VMD_SIGNATURE_TYPE2.len(), 26usize);
    assert_eq!(Motion::VMD_SIGNATURE_TYPE1.len(), 26usize);
}

#[test]
fn test_load_invalid_signature() {
    let mut buffer = Buffer::create(vec![0u8; 64]);
    assert_eq!(
        Some(Status::ErrorInvalidSignature),
        Motion::load_from_buffer(&mut buffer, 0).err()
    );
    let mut buffer = Buffer::create(b"Vocaloid".to_vec());
    assert_eq!(
        Some(Status::ErrorInvalidSignature),
        Motion::load_from_buffer(&mut buffer, 0).err()
    );
}

#[test]
fn test_empty_motion_round_trip() -> Result<(), Status> {
    let mut motion = Motion::empty();
    motion.set_target_model_name("model");
    let mut mutable_buffer = MutableBuffer::create()?;
    motion.save_to_buffer(&mut mutable_buffer)?;
    // signature, name and six empty blocks
    assert_eq!(30 + 20 + 6 * 4, mutable_buffer.len());
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let loaded = Motion::load_from_buffer(&mut buffer, 0)?;
    assert_eq!(MotionFormatType::Vmd, loaded.get_format_type());
    assert_eq!("model", loaded.get_target_model_name());
    assert_eq!(0, loaded.get_max_frame_index());
    Ok(())
}

#[test]
fn test_optional_trailing_blocks() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_byte_array(Motion::VMD_SIGNATURE_TYPE1)?;
    mutable_buffer.write_byte_array(&[0u8; 4])?;
    mutable_buffer.write_fixed_string("legacy", Motion::VMD_TARGET_MODEL_NAME_LENGTH_V1)?;
    mutable_buffer.write_u32_little_endian(0)?;
    mutable_buffer.write_u32_little_endian(1)?;
    MotionMorphKeyframe::create(8).save_to_buffer_vmd("smile", &mut mutable_buffer)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let motion = Motion::load_from_buffer(&mut buffer, 2)?;
    assert_eq!("legacy", motion.get_target_model_name());
    assert!(motion.find_morph_keyframe_object("smile", 10).is_some());
    assert_eq!(10, motion.get_max_frame_index());
    assert!(motion.get_all_camera_keyframe_objects().is_empty());
    Ok(())
}

#[test]
fn test_trailing_garbage() -> Result<(), Status> {
    let motion = Motion::empty();
    let mut mutable_buffer = MutableBuffer::create()?;
    motion.save_to_buffer(&mut mutable_buffer)?;
    mutable_buffer.write_byte(0)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    assert_eq!(
        Some(Status::ErrorBufferNotEnd),
        Motion::load_from_buffer(&mut buffer, 0).err()
    );
    Ok(())
}

#[test]
fn test_camera_block_tweak() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_byte_array(Motion::VMD_SIGNATURE_TYPE2)?;
    mutable_buffer.write_byte_array(&[0u8; 4])?;
    mutable_buffer.write_fixed_string("", Motion::VMD_TARGET_MODEL_NAME_LENGTH_V2)?;
    mutable_buffer.write_u32_little_endian(0)?;
    mutable_buffer.write_u32_little_endian(0)?;
    mutable_buffer.write_u32_little_endian(0)?;
    mutable_buffer.write_byte_array(&[0u8; Motion::VMD_CAMERA_KEYFRAME_TWEAK_LENGTH])?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    let motion = Motion::load_from_buffer(&mut buffer, 0)?;
    assert!(motion.get_all_camera_keyframe_objects().is_empty());
    Ok(())
}

#[test]
fn test_search_closest_frame_keyframes() -> Result<(), Status> {
    let mut motion = Motion::empty();
    assert_eq!((None, None), motion.search_closest_light_keyframes(10));
    for frame_index in [30u32, 10, 20] {
        motion.add_light_keyframe(MotionLightKeyframe::default(), frame_index)?;
    }
    assert_eq!(
        vec![10, 20, 30],
        motion
            .get_all_light_keyframe_objects()
            .iter()
            .map(|keyframe| keyframe.get_frame_index())
            .collect::<Vec<_>>()
    );
    assert_eq!(2, motion.get_all_light_keyframe_objects()[2].get_index());
    let (prev, next) = motion.search_closest_light_keyframes(20);
    assert_eq!(Some(10), prev.map(|k| k.get_frame_index()));
    assert_eq!(Some(30), next.map(|k| k.get_frame_index()));
    let (prev, next) = motion.search_closest_light_keyframes(35);
    assert_eq!(Some(30), prev.map(|k| k.get_frame_index()));
    assert_eq!(Some(30), next.map(|k| k.get_frame_index()));
    let (prev, next) = motion.search_closest_light_keyframes(5);
    assert!(prev.is_none());
    assert_eq!(Some(10), next.map(|k| k.get_frame_index()));
    Ok(())
}
