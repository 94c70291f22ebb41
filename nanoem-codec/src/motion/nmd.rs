//! NMD container: the motion as one protobuf message. Names are interned in
//! track tables and keyframes refer to them by id.

use std::collections::HashMap;

use prost::Message;

use crate::common::{Buffer, Status, F128};

use super::{
    keyframe::{
        MotionBoneKeyframeInterpolation, MotionCameraKeyframeInterpolation, MotionKeyframeBase,
    },
    Motion, MotionAccessoryKeyframe, MotionBoneKeyframe, MotionCameraKeyframe,
    MotionEffectParameter, MotionEffectParameterValue, MotionLightKeyframe, MotionModelKeyframe,
    MotionModelKeyframeConstraintState, MotionMorphKeyframe, MotionOutsideParent,
    MotionSelfShadowKeyframe,
};

#[cfg(test)]
use super::MotionFormatType;

pub(crate) mod proto {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Annotation {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Track {
        #[prost(int32, tag = "1")]
        pub id: i32,
        #[prost(string, tag = "2")]
        pub name: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct KeyframeCommon {
        #[prost(uint32, tag = "1")]
        pub frame_index: u32,
        #[prost(bool, tag = "2")]
        pub is_selected: bool,
        #[prost(message, repeated, tag = "3")]
        pub annotations: Vec<Annotation>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Interpolation {
        #[prost(uint32, tag = "1")]
        pub x0: u32,
        #[prost(uint32, tag = "2")]
        pub y0: u32,
        #[prost(uint32, tag = "3")]
        pub x1: u32,
        #[prost(uint32, tag = "4")]
        pub y1: u32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Vector {
        #[prost(float, tag = "1")]
        pub x: f32,
        #[prost(float, tag = "2")]
        pub y: f32,
        #[prost(float, tag = "3")]
        pub z: f32,
        #[prost(float, tag = "4")]
        pub w: f32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct OutsideParent {
        #[prost(int32, tag = "1")]
        pub local_bone_track: i32,
        #[prost(int32, tag = "2")]
        pub global_object_track: i32,
        #[prost(int32, tag = "3")]
        pub global_bone_track: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct EffectParameter {
        #[prost(int32, tag = "1")]
        pub global_track: i32,
        #[prost(oneof = "effect_parameter::Value", tags = "2, 3, 4, 5")]
        pub value: Option<effect_parameter::Value>,
    }

    pub mod effect_parameter {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Value {
            #[prost(int32, tag = "2")]
            Bool(i32),
            #[prost(int32, tag = "3")]
            Int(i32),
            #[prost(float, tag = "4")]
            Float(f32),
            #[prost(message, tag = "5")]
            Vector(super::Vector),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct BoneKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(int32, tag = "2")]
        pub track: i32,
        #[prost(message, optional, tag = "3")]
        pub translation: Option<Vector>,
        #[prost(message, optional, tag = "4")]
        pub orientation: Option<Vector>,
        #[prost(message, optional, tag = "5")]
        pub interpolation_x: Option<Interpolation>,
        #[prost(message, optional, tag = "6")]
        pub interpolation_y: Option<Interpolation>,
        #[prost(message, optional, tag = "7")]
        pub interpolation_z: Option<Interpolation>,
        #[prost(message, optional, tag = "8")]
        pub interpolation_orientation: Option<Interpolation>,
        #[prost(uint32, tag = "9")]
        pub stage_index: u32,
        #[prost(bool, optional, tag = "10")]
        pub is_physics_simulation_enabled: Option<bool>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct MorphKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(int32, tag = "2")]
        pub track: i32,
        #[prost(float, tag = "3")]
        pub weight: f32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct CameraKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(message, optional, tag = "2")]
        pub look_at: Option<Vector>,
        #[prost(message, optional, tag = "3")]
        pub angle: Option<Vector>,
        #[prost(float, tag = "4")]
        pub distance: f32,
        #[prost(int32, tag = "5")]
        pub fov: i32,
        #[prost(bool, optional, tag = "6")]
        pub is_perspective_view: Option<bool>,
        #[prost(message, optional, tag = "7")]
        pub interpolation_lookat_x: Option<Interpolation>,
        #[prost(message, optional, tag = "8")]
        pub interpolation_lookat_y: Option<Interpolation>,
        #[prost(message, optional, tag = "9")]
        pub interpolation_lookat_z: Option<Interpolation>,
        #[prost(message, optional, tag = "10")]
        pub interpolation_angle: Option<Interpolation>,
        #[prost(message, optional, tag = "11")]
        pub interpolation_fov: Option<Interpolation>,
        #[prost(message, optional, tag = "12")]
        pub interpolation_distance: Option<Interpolation>,
        #[prost(uint32, tag = "13")]
        pub stage_index: u32,
        #[prost(message, optional, tag = "14")]
        pub outside_parent: Option<OutsideParent>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct LightKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(message, optional, tag = "2")]
        pub color: Option<Vector>,
        #[prost(message, optional, tag = "3")]
        pub direction: Option<Vector>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SelfShadowKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(float, tag = "2")]
        pub distance: f32,
        #[prost(int32, tag = "3")]
        pub mode: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ConstraintState {
        #[prost(int32, tag = "1")]
        pub track: i32,
        #[prost(bool, tag = "2")]
        pub enabled: bool,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ModelKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(bool, optional, tag = "2")]
        pub visible: Option<bool>,
        #[prost(message, repeated, tag = "3")]
        pub constraint_states: Vec<ConstraintState>,
        #[prost(message, repeated, tag = "4")]
        pub effect_parameters: Vec<EffectParameter>,
        #[prost(message, repeated, tag = "5")]
        pub outside_parents: Vec<OutsideParent>,
        #[prost(bool, tag = "6")]
        pub is_add_blending_enabled: bool,
        #[prost(bool, optional, tag = "7")]
        pub is_physics_simulation_enabled: Option<bool>,
        #[prost(float, tag = "8")]
        pub edge_scale_factor: f32,
        #[prost(message, optional, tag = "9")]
        pub edge_color: Option<Vector>,
        #[prost(bool, tag = "10")]
        pub has_edge_option: bool,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AccessoryKeyframe {
        #[prost(message, optional, tag = "1")]
        pub common: Option<KeyframeCommon>,
        #[prost(message, optional, tag = "2")]
        pub translation: Option<Vector>,
        #[prost(message, optional, tag = "3")]
        pub orientation: Option<Vector>,
        #[prost(float, tag = "4")]
        pub scale_factor: f32,
        #[prost(float, tag = "5")]
        pub opacity: f32,
        #[prost(bool, tag = "6")]
        pub is_add_blending_enabled: bool,
        #[prost(bool, optional, tag = "7")]
        pub is_shadow_enabled: Option<bool>,
        #[prost(bool, optional, tag = "8")]
        pub visible: Option<bool>,
        #[prost(message, optional, tag = "9")]
        pub outside_parent: Option<OutsideParent>,
        #[prost(message, repeated, tag = "10")]
        pub effect_parameters: Vec<EffectParameter>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Motion {
        #[prost(message, repeated, tag = "1")]
        pub annotations: Vec<Annotation>,
        #[prost(string, tag = "2")]
        pub target_model_name: String,
        #[prost(float, tag = "3")]
        pub preferred_fps: f32,
        #[prost(message, repeated, tag = "4")]
        pub global_tracks: Vec<Track>,
        #[prost(message, repeated, tag = "5")]
        pub local_bone_tracks: Vec<Track>,
        #[prost(message, repeated, tag = "6")]
        pub local_morph_tracks: Vec<Track>,
        #[prost(message, repeated, tag = "7")]
        pub bone_keyframes: Vec<BoneKeyframe>,
        #[prost(message, repeated, tag = "8")]
        pub morph_keyframes: Vec<MorphKeyframe>,
        #[prost(message, repeated, tag = "9")]
        pub model_keyframes: Vec<ModelKeyframe>,
        #[prost(message, repeated, tag = "10")]
        pub camera_keyframes: Vec<CameraKeyframe>,
        #[prost(message, repeated, tag = "11")]
        pub light_keyframes: Vec<LightKeyframe>,
        #[prost(message, repeated, tag = "12")]
        pub self_shadow_keyframes: Vec<SelfShadowKeyframe>,
        #[prost(message, repeated, tag = "13")]
        pub accessory_keyframes: Vec<AccessoryKeyframe>,
    }
}

/// Name to id table used while saving.
#[derive(Debug, Default)]
struct TrackTable {
    ids: HashMap<String, i32>,
    tracks: Vec<proto::Track>,
    next_id: i32,
}

impl TrackTable {
    fn intern(&mut self, name: &str) -> i32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        self.next_id += 1;
        self.insert(self.next_id, name);
        self.next_id
    }

    fn insert(&mut self, id: i32, name: &str) {
        self.next_id = self.next_id.max(id);
        self.ids.insert(name.to_owned(), id);
        self.tracks.push(proto::Track {
            id,
            name: name.to_owned(),
        });
    }

    fn into_tracks(mut self) -> Vec<proto::Track> {
        self.tracks.sort_by_key(|track| track.id);
        self.tracks
    }
}

/// Id to name table used while loading.
struct TrackNames(HashMap<i32, String>);

impl TrackNames {
    fn new(tracks: &[proto::Track]) -> Self {
        TrackNames(
            tracks
                .iter()
                .map(|track| (track.id, track.name.clone()))
                .collect(),
        )
    }

    fn resolve(&self, id: i32, corrupted: Status) -> Result<String, Status> {
        self.0.get(&id).cloned().ok_or_else(|| {
            log::warn!("NMD track {id} is not declared");
            corrupted
        })
    }
}

fn to_vector(value: F128) -> Option<proto::Vector> {
    Some(proto::Vector {
        x: value.0[0],
        y: value.0[1],
        z: value.0[2],
        w: value.0[3],
    })
}

fn from_vector(value: Option<&proto::Vector>) -> F128 {
    value.map_or(F128::default(), |v| F128([v.x, v.y, v.z, v.w]))
}

fn to_interpolation(value: [u8; 4]) -> Option<proto::Interpolation> {
    Some(proto::Interpolation {
        x0: value[0] as u32,
        y0: value[1] as u32,
        x1: value[2] as u32,
        y1: value[3] as u32,
    })
}

/// Missing curves keep the value the keyframe was created with.
fn read_interpolation(target: &mut [u8; 4], value: Option<&proto::Interpolation>) {
    if let Some(v) = value {
        *target = [
            v.x0.min(u8::MAX as u32) as u8,
            v.y0.min(u8::MAX as u32) as u8,
            v.x1.min(u8::MAX as u32) as u8,
            v.y1.min(u8::MAX as u32) as u8,
        ];
    }
}

fn to_common(base: &MotionKeyframeBase) -> Option<proto::KeyframeCommon> {
    let mut annotations = base
        .annotations
        .iter()
        .map(|(name, value)| proto::Annotation {
            name: name.clone(),
            value: value.clone(),
        })
        .collect::<Vec<_>>();
    annotations.sort_by(|a, b| a.name.cmp(&b.name));
    Some(proto::KeyframeCommon {
        frame_index: base.frame_index,
        is_selected: base.is_selected,
        annotations,
    })
}

fn from_common(common: Option<&proto::KeyframeCommon>, offset: u32) -> MotionKeyframeBase {
    match common {
        Some(common) => MotionKeyframeBase {
            index: 0,
            frame_index: common.frame_index.saturating_add(offset),
            is_selected: common.is_selected,
            annotations: common
                .annotations
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
        },
        None => MotionKeyframeBase::with_frame_index(offset),
    }
}

fn to_outside_parent(
    outside_parent: &MotionOutsideParent,
    local_bone_tracks: &mut TrackTable,
    global_tracks: &mut TrackTable,
) -> proto::OutsideParent {
    proto::OutsideParent {
        local_bone_track: local_bone_tracks.intern(&outside_parent.subject_bone_name),
        global_object_track: global_tracks.intern(&outside_parent.target_object_name),
        global_bone_track: global_tracks.intern(&outside_parent.target_bone_name),
    }
}

fn from_outside_parent(
    outside_parent: &proto::OutsideParent,
    local_bone_tracks: &TrackNames,
    global_tracks: &TrackNames,
    corrupted: Status,
) -> Result<MotionOutsideParent, Status> {
    Ok(MotionOutsideParent {
        subject_bone_name: local_bone_tracks.resolve(outside_parent.local_bone_track, corrupted)?,
        target_object_name: global_tracks.resolve(outside_parent.global_object_track, corrupted)?,
        target_bone_name: global_tracks.resolve(outside_parent.global_bone_track, corrupted)?,
    })
}

fn to_effect_parameter(
    parameter: &MotionEffectParameter,
    global_tracks: &mut TrackTable,
) -> proto::EffectParameter {
    use proto::effect_parameter::Value;
    let value = match parameter.value {
        MotionEffectParameterValue::Bool(v) => Value::Bool(v as i32),
        MotionEffectParameterValue::Int(v) => Value::Int(v),
        MotionEffectParameterValue::Float(v) => Value::Float(v),
        MotionEffectParameterValue::Vector4(v) => Value::Vector(proto::Vector {
            x: v.0[0],
            y: v.0[1],
            z: v.0[2],
            w: v.0[3],
        }),
    };
    proto::EffectParameter {
        global_track: global_tracks.intern(&parameter.name),
        value: Some(value),
    }
}

fn from_effect_parameter(
    parameter: &proto::EffectParameter,
    global_tracks: &TrackNames,
    corrupted: Status,
) -> Result<MotionEffectParameter, Status> {
    use proto::effect_parameter::Value;
    let value = match &parameter.value {
        Some(Value::Bool(v)) => MotionEffectParameterValue::Bool(*v != 0),
        Some(Value::Int(v)) => MotionEffectParameterValue::Int(*v),
        Some(Value::Float(v)) => MotionEffectParameterValue::Float(*v),
        Some(Value::Vector(v)) => MotionEffectParameterValue::Vector4(from_vector(Some(v))),
        None => MotionEffectParameterValue::default(),
    };
    Ok(MotionEffectParameter {
        name: global_tracks.resolve(parameter.global_track, corrupted)?,
        value,
    })
}

pub(crate) fn save(motion: &Motion) -> Result<Vec<u8>, Status> {
    let mut global_tracks = TrackTable::default();
    let mut local_bone_tracks = TrackTable::default();
    let mut local_morph_tracks = TrackTable::default();
    for track in motion.local_bone_motion_track_bundle.tracks.values() {
        local_bone_tracks.insert(track.id, &track.name);
    }
    for track in motion.local_morph_motion_track_bundle.tracks.values() {
        local_morph_tracks.insert(track.id, &track.name);
    }
    let bone_keyframes = motion
        .local_bone_motion_track_bundle
        .iter_with_name()
        .map(|(name, keyframe)| proto::BoneKeyframe {
            common: to_common(&keyframe.base),
            track: local_bone_tracks.intern(name),
            translation: to_vector(keyframe.translation),
            orientation: to_vector(keyframe.orientation),
            interpolation_x: to_interpolation(keyframe.interpolation.translation_x),
            interpolation_y: to_interpolation(keyframe.interpolation.translation_y),
            interpolation_z: to_interpolation(keyframe.interpolation.translation_z),
            interpolation_orientation: to_interpolation(keyframe.interpolation.orientation),
            stage_index: keyframe.stage_index,
            is_physics_simulation_enabled: Some(keyframe.is_physics_simulation_enabled),
        })
        .collect::<Vec<_>>();
    let morph_keyframes = motion
        .local_morph_motion_track_bundle
        .iter_with_name()
        .map(|(name, keyframe)| proto::MorphKeyframe {
            common: to_common(&keyframe.base),
            track: local_morph_tracks.intern(name),
            weight: keyframe.weight,
        })
        .collect::<Vec<_>>();
    let model_keyframes = motion
        .model_keyframes
        .iter()
        .map(|keyframe| proto::ModelKeyframe {
            common: to_common(&keyframe.base),
            visible: Some(keyframe.visible),
            constraint_states: keyframe
                .constraint_states
                .iter()
                .map(|state| proto::ConstraintState {
                    track: local_bone_tracks.intern(&state.bone_name),
                    enabled: state.enabled,
                })
                .collect(),
            effect_parameters: keyframe
                .effect_parameters
                .iter()
                .map(|parameter| to_effect_parameter(parameter, &mut global_tracks))
                .collect(),
            outside_parents: keyframe
                .outside_parents
                .iter()
                .map(|op| to_outside_parent(op, &mut local_bone_tracks, &mut global_tracks))
                .collect(),
            is_add_blending_enabled: keyframe.is_add_blending_enabled,
            is_physics_simulation_enabled: Some(keyframe.is_physics_simulation_enabled),
            edge_scale_factor: keyframe.edge_scale_factor,
            edge_color: to_vector(keyframe.edge_color),
            has_edge_option: keyframe.has_edge_option,
        })
        .collect::<Vec<_>>();
    let camera_keyframes = motion
        .camera_keyframes
        .iter()
        .map(|keyframe| proto::CameraKeyframe {
            common: to_common(&keyframe.base),
            look_at: to_vector(keyframe.look_at),
            angle: to_vector(keyframe.angle),
            distance: keyframe.distance,
            fov: keyframe.fov,
            is_perspective_view: Some(keyframe.is_perspective_view),
            interpolation_lookat_x: to_interpolation(keyframe.interpolation.lookat_x),
            interpolation_lookat_y: to_interpolation(keyframe.interpolation.lookat_y),
            interpolation_lookat_z: to_interpolation(keyframe.interpolation.lookat_z),
            interpolation_angle: to_interpolation(keyframe.interpolation.angle),
            interpolation_fov: to_interpolation(keyframe.interpolation.fov),
            interpolation_distance: to_interpolation(keyframe.interpolation.distance),
            stage_index: keyframe.stage_index,
            outside_parent: keyframe
                .outside_parent
                .as_ref()
                .map(|op| to_outside_parent(op, &mut local_bone_tracks, &mut global_tracks)),
        })
        .collect::<Vec<_>>();
    let accessory_keyframes = motion
        .accessory_keyframes
        .iter()
        .map(|keyframe| proto::AccessoryKeyframe {
            common: to_common(&keyframe.base),
            translation: to_vector(keyframe.translation),
            orientation: to_vector(keyframe.orientation),
            scale_factor: keyframe.scale_factor,
            opacity: keyframe.opacity,
            is_add_blending_enabled: keyframe.is_add_blending_enabled,
            is_shadow_enabled: Some(keyframe.is_shadow_enabled),
            visible: Some(keyframe.visible),
            outside_parent: keyframe
                .outside_parent
                .as_ref()
                .map(|op| to_outside_parent(op, &mut local_bone_tracks, &mut global_tracks)),
            effect_parameters: keyframe
                .effect_parameters
                .iter()
                .map(|parameter| to_effect_parameter(parameter, &mut global_tracks))
                .collect(),
        })
        .collect::<Vec<_>>();
    let mut annotations = motion
        .annotations
        .iter()
        .map(|(name, value)| proto::Annotation {
            name: name.clone(),
            value: value.clone(),
        })
        .collect::<Vec<_>>();
    annotations.sort_by(|a, b| a.name.cmp(&b.name));
    let message = proto::Motion {
        annotations,
        target_model_name: motion.target_model_name.clone(),
        preferred_fps: motion.preferred_fps,
        global_tracks: global_tracks.into_tracks(),
        local_bone_tracks: local_bone_tracks.into_tracks(),
        local_morph_tracks: local_morph_tracks.into_tracks(),
        bone_keyframes,
        morph_keyframes,
        model_keyframes,
        camera_keyframes,
        light_keyframes: motion
            .light_keyframes
            .iter()
            .map(|keyframe| proto::LightKeyframe {
                common: to_common(&keyframe.base),
                color: to_vector(keyframe.color),
                direction: to_vector(keyframe.direction),
            })
            .collect(),
        self_shadow_keyframes: motion
            .self_shadow_keyframes
            .iter()
            .map(|keyframe| proto::SelfShadowKeyframe {
                common: to_common(&keyframe.base),
                distance: keyframe.distance,
                mode: keyframe.mode,
            })
            .collect(),
        accessory_keyframes,
    };
    log::debug!(
        "NMD {}: {} bone keyframes, {} morph keyframes, {} model keyframes",
        message.target_model_name,
        message.bone_keyframes.len(),
        message.morph_keyframes.len(),
        message.model_keyframes.len()
    );
    Ok(message.encode_to_vec())
}

pub(crate) fn load(motion: &mut Motion, buffer: &mut Buffer, offset: u32) -> Result<(), Status> {
    let rest = buffer.len() - buffer.offset();
    let bytes = buffer.read_buffer(rest)?;
    let message = proto::Motion::decode(bytes).map_err(|e| {
        log::warn!("failed to decode NMD: {e}");
        Status::ErrorInvalidSignature
    })?;
    let global_tracks = TrackNames::new(&message.global_tracks);
    let local_bone_tracks = TrackNames::new(&message.local_bone_tracks);
    let local_morph_tracks = TrackNames::new(&message.local_morph_tracks);
    motion.annotations = message
        .annotations
        .iter()
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect();
    motion.target_model_name = message.target_model_name.clone();
    if message.preferred_fps > 0f32 {
        motion.preferred_fps = message.preferred_fps;
    }
    for track in &message.local_bone_tracks {
        motion
            .local_bone_motion_track_bundle
            .insert_track_with_id(track.id, &track.name);
    }
    for track in &message.local_morph_tracks {
        motion
            .local_morph_motion_track_bundle
            .insert_track_with_id(track.id, &track.name);
    }
    for keyframe in &message.bone_keyframes {
        let corrupted = Status::ErrorMotionBoneKeyframeCorrupted;
        let name = local_bone_tracks.resolve(keyframe.track, corrupted)?;
        let mut interpolation = MotionBoneKeyframeInterpolation::default();
        read_interpolation(&mut interpolation.translation_x, keyframe.interpolation_x.as_ref());
        read_interpolation(&mut interpolation.translation_y, keyframe.interpolation_y.as_ref());
        read_interpolation(&mut interpolation.translation_z, keyframe.interpolation_z.as_ref());
        read_interpolation(
            &mut interpolation.orientation,
            keyframe.interpolation_orientation.as_ref(),
        );
        let bone_keyframe = MotionBoneKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            translation: from_vector(keyframe.translation.as_ref()),
            orientation: from_vector(keyframe.orientation.as_ref()),
            interpolation,
            stage_index: keyframe.stage_index,
            is_physics_simulation_enabled: keyframe.is_physics_simulation_enabled.unwrap_or(true),
        };
        motion
            .local_bone_motion_track_bundle
            .force_add_keyframe(bone_keyframe, &name);
    }
    for keyframe in &message.morph_keyframes {
        let name = local_morph_tracks.resolve(keyframe.track, Status::ErrorMotionMorphKeyframeCorrupted)?;
        let morph_keyframe = MotionMorphKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            weight: keyframe.weight,
        };
        motion
            .local_morph_motion_track_bundle
            .force_add_keyframe(morph_keyframe, &name);
    }
    motion.local_bone_motion_track_bundle.reindex();
    motion.local_morph_motion_track_bundle.reindex();
    for keyframe in &message.model_keyframes {
        let corrupted = Status::ErrorMotionModelKeyframeCorrupted;
        let mut model_keyframe = MotionModelKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            visible: keyframe.visible.unwrap_or(true),
            is_add_blending_enabled: keyframe.is_add_blending_enabled,
            is_physics_simulation_enabled: keyframe.is_physics_simulation_enabled.unwrap_or(true),
            edge_scale_factor: keyframe.edge_scale_factor,
            edge_color: from_vector(keyframe.edge_color.as_ref()),
            has_edge_option: keyframe.has_edge_option,
            ..Default::default()
        };
        for state in &keyframe.constraint_states {
            model_keyframe
                .constraint_states
                .push(MotionModelKeyframeConstraintState {
                    bone_name: local_bone_tracks.resolve(state.track, corrupted)?,
                    enabled: state.enabled,
                });
        }
        for parameter in &keyframe.effect_parameters {
            model_keyframe
                .effect_parameters
                .push(from_effect_parameter(parameter, &global_tracks, corrupted)?);
        }
        for op in &keyframe.outside_parents {
            model_keyframe.outside_parents.push(from_outside_parent(
                op,
                &local_bone_tracks,
                &global_tracks,
                corrupted,
            )?);
        }
        motion.model_keyframes.push(model_keyframe);
    }
    for keyframe in &message.camera_keyframes {
        let corrupted = Status::ErrorMotionCameraKeyframeCorrupted;
        let mut interpolation = MotionCameraKeyframeInterpolation::default();
        read_interpolation(&mut interpolation.lookat_x, keyframe.interpolation_lookat_x.as_ref());
        read_interpolation(&mut interpolation.lookat_y, keyframe.interpolation_lookat_y.as_ref());
        read_interpolation(&mut interpolation.lookat_z, keyframe.interpolation_lookat_z.as_ref());
        read_interpolation(&mut interpolation.angle, keyframe.interpolation_angle.as_ref());
        read_interpolation(&mut interpolation.fov, keyframe.interpolation_fov.as_ref());
        read_interpolation(
            &mut interpolation.distance,
            keyframe.interpolation_distance.as_ref(),
        );
        let outside_parent = match &keyframe.outside_parent {
            Some(op) => Some(from_outside_parent(
                op,
                &local_bone_tracks,
                &global_tracks,
                corrupted,
            )?),
            None => None,
        };
        motion.camera_keyframes.push(MotionCameraKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            look_at: from_vector(keyframe.look_at.as_ref()),
            angle: from_vector(keyframe.angle.as_ref()),
            distance: keyframe.distance,
            fov: keyframe.fov,
            interpolation,
            is_perspective_view: keyframe.is_perspective_view.unwrap_or(true),
            stage_index: keyframe.stage_index,
            outside_parent,
        });
    }
    for keyframe in &message.light_keyframes {
        motion.light_keyframes.push(MotionLightKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            color: from_vector(keyframe.color.as_ref()),
            direction: from_vector(keyframe.direction.as_ref()),
        });
    }
    for keyframe in &message.self_shadow_keyframes {
        motion.self_shadow_keyframes.push(MotionSelfShadowKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            distance: keyframe.distance,
            mode: keyframe.mode,
        });
    }
    for keyframe in &message.accessory_keyframes {
        // accessory keyframes have no dedicated corrupted status
        let corrupted = Status::ErrorMotionModelKeyframeCorrupted;
        let outside_parent = match &keyframe.outside_parent {
            Some(op) => Some(from_outside_parent(
                op,
                &local_bone_tracks,
                &global_tracks,
                corrupted,
            )?),
            None => None,
        };
        let mut effect_parameters = vec![];
        for parameter in &keyframe.effect_parameters {
            effect_parameters.push(from_effect_parameter(parameter, &global_tracks, corrupted)?);
        }
        motion.accessory_keyframes.push(MotionAccessoryKeyframe {
            base: from_common(keyframe.common.as_ref(), offset),
            translation: from_vector(keyframe.translation.as_ref()),
            orientation: from_vector(keyframe.orientation.as_ref()),
            scale_factor: keyframe.scale_factor,
            opacity: keyframe.opacity,
            is_add_blending_enabled: keyframe.is_add_blending_enabled,
            is_shadow_enabled: keyframe.is_shadow_enabled.unwrap_or(true),
            visible: keyframe.visible.unwrap_or(true),
            effect_parameters,
            outside_parent,
        });
    }
    motion.sort_all_keyframes();
    Ok(())
}

#[cfg(test)]
fn save_and_load(motion: &Motion, offset: u32) -> Result<Motion, Status> {
    let mut mutable_buffer = crate::mutable::common::MutableBuffer::create()?;
    motion.save_to_buffer_nmd(&mut mutable_buffer)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    Motion::load_from_buffer_nmd(&mut buffer, offset)
}

#[test]
fn test_model_keyframe_round_trip() -> Result<(), Status> {
    let mut motion = Motion::empty();
    let mut keyframe = MotionModelKeyframe::create(0);
    keyframe.set_visible(false);
    keyframe.set_edge_option(true);
    keyframe.set_edge_scale_factor(1.5);
    keyframe.set_edge_color(F128([0.1, 0.2, 0.3, 1.0]));
    keyframe.add_constraint_state_object(MotionModelKeyframeConstraintState::create(
        "left_leg_ik",
        false,
    ))?;
    keyframe.add_effect_parameter_object(MotionEffectParameter::create(
        "Si",
        MotionEffectParameterValue::Vector4(F128([1.0, 2.0, 3.0, 4.0])),
    ))?;
    keyframe.add_effect_parameter_object(MotionEffectParameter::create(
        "Enabled",
        MotionEffectParameterValue::Bool(true),
    ))?;
    keyframe.add_outside_parent_object(MotionOutsideParent::create("center", "stage", "root"))?;
    motion.add_model_keyframe(keyframe, 12)?;
    let loaded = save_and_load(&motion, 0)?;
    assert_eq!(MotionFormatType::Nmd, loaded.get_format_type());
    assert_eq!(motion.get_all_model_keyframe_objects(), loaded.get_all_model_keyframe_objects());
    let loaded = loaded
        .find_model_keyframe_object(12)
        .ok_or(Status::ErrorMotionModelKeyframeNotFound)?;
    assert!(!loaded.is_visible());
    assert!(loaded.is_physics_simulation_enabled());
    assert_eq!(
        "left_leg_ik",
        loaded.get_all_constraint_state_objects()[0].get_bone_name()
    );
    assert_eq!(
        MotionEffectParameterValue::Bool(true),
        loaded.get_all_effect_parameter_objects()[1].get_value()
    );
    assert_eq!(
        "stage",
        loaded.get_all_outside_parent_objects()[0].get_target_object_name()
    );
    Ok(())
}

#[test]
fn test_physics_defaults_when_unset() -> Result<(), Status> {
    let message = proto::Motion {
        local_bone_tracks: vec![proto::Track {
            id: 1,
            name: "center".to_owned(),
        }],
        bone_keyframes: vec![proto::BoneKeyframe {
            common: Some(proto::KeyframeCommon {
                frame_index: 5,
                ..Default::default()
            }),
            track: 1,
            ..Default::default()
        }],
        model_keyframes: vec![proto::ModelKeyframe::default()],
        ..Default::default()
    };
    let mut buffer = Buffer::create(message.encode_to_vec());
    let motion = Motion::load_from_buffer_nmd(&mut buffer, 10)?;
    let bone = motion
        .find_bone_keyframe_object("center", 15)
        .ok_or(Status::ErrorMotionBoneKeyframeNotFound)?;
    assert!(bone.is_physics_simulation_enabled());
    assert_eq!(
        super::keyframe::DEFAULT_INTERPOLATION,
        bone.get_interpolation().translation_x
    );
    let model = &motion.get_all_model_keyframe_objects()[0];
    assert_eq!(10, model.get_frame_index());
    assert!(model.is_visible());
    assert!(model.is_physics_simulation_enabled());
    Ok(())
}

#[test]
fn test_all_kinds_round_trip() -> Result<(), Status> {
    let mut motion = Motion::empty();
    motion.set_target_model_name("初音ミク");
    motion.set_annotation("author", "someone");
    motion.set_preferred_fps(60f32);
    let mut bone = MotionBoneKeyframe::create(0);
    bone.set_translation(F128([1.0, 2.0, 3.0, 0.0]));
    bone.set_stage_index(2);
    bone.set_physics_simulation_enabled(false);
    bone.set_selected(true);
    bone.set_annotation("memo", "pose");
    motion.add_bone_keyframe(bone, "センター", 4)?;
    let mut morph = MotionMorphKeyframe::create(0);
    morph.set_weight(0.75);
    motion.add_morph_keyframe(morph, "まばたき", 6)?;
    let mut camera = MotionCameraKeyframe::create(0);
    camera.set_perspective_view(false);
    camera.set_outside_parent_object(Some(MotionOutsideParent::create("", "stage", "root")));
    motion.add_camera_keyframe(camera, 1)?;
    let mut light = MotionLightKeyframe::create(0);
    light.set_color(F128([0.6, 0.6, 0.6, 0.0]));
    motion.add_light_keyframe(light, 2)?;
    let mut self_shadow = MotionSelfShadowKeyframe::create(0);
    self_shadow.set_mode(1);
    self_shadow.set_distance(8875.0);
    motion.add_self_shadow_keyframe(self_shadow, 3)?;
    let mut accessory = MotionAccessoryKeyframe::create(0);
    accessory.set_opacity(0.5);
    accessory.set_shadow_enabled(false);
    accessory.add_effect_parameter_object(MotionEffectParameter::create(
        "Tr",
        MotionEffectParameterValue::Float(0.25),
    ))?;
    motion.add_accessory_keyframe(accessory, 9)?;
    let loaded = save_and_load(&motion, 0)?;
    assert_eq!("初音ミク", loaded.get_target_model_name());
    assert_eq!(Some(&"someone".to_owned()), loaded.get_annotation("author"));
    assert_eq!(60f32, loaded.get_preferred_fps());
    assert_eq!(9, loaded.get_max_frame_index());
    assert_eq!(
        motion.find_bone_keyframe_object("センター", 4),
        loaded.find_bone_keyframe_object("センター", 4)
    );
    assert_eq!(
        motion.find_morph_keyframe_object("まばたき", 6),
        loaded.find_morph_keyframe_object("まばたき", 6)
    );
    assert_eq!(
        motion.get_all_camera_keyframe_objects(),
        loaded.get_all_camera_keyframe_objects()
    );
    assert_eq!(
        motion.get_all_light_keyframe_objects(),
        loaded.get_all_light_keyframe_objects()
    );
    assert_eq!(
        motion.get_all_self_shadow_keyframe_objects(),
        loaded.get_all_self_shadow_keyframe_objects()
    );
    assert_eq!(
        motion.get_all_accessory_keyframe_objects(),
        loaded.get_all_accessory_keyframe_objects()
    );
    Ok(())
}
