use crate::{
    common::Status,
    motion::{
        Motion, MotionAccessoryKeyframe, MotionBoneKeyframe, MotionCameraKeyframe,
        MotionFormatType, MotionLightKeyframe, MotionModelKeyframe, MotionMorphKeyframe,
        MotionSelfShadowKeyframe,
    },
};

use super::common::MutableBuffer;

/// Editable handle over a [`Motion`]. Keyframes are moved in on add and
/// handed back on remove.
pub struct MutableMotion {
    origin: Motion,
}

macro_rules! forward_frame_keyframes {
    ($typ:ty, $find_mut:ident, $add:ident, $remove:ident) => {
        pub fn $find_mut(&mut self, frame_index: u32) -> Option<&mut $typ> {
            self.origin.$find_mut(frame_index)
        }

        pub fn $add(&mut self, keyframe: $typ, frame_index: u32) -> Result<(), Status> {
            self.origin.$add(keyframe, frame_index)
        }

        pub fn $remove(&mut self, frame_index: u32) -> Result<$typ, Status> {
            self.origin.$remove(frame_index)
        }
    };
}

macro_rules! forward_named_keyframes {
    ($typ:ty, $find_mut:ident, $add:ident, $remove:ident) => {
        pub fn $find_mut(&mut self, name: &str, frame_index: u32) -> Option<&mut $typ> {
            self.origin.$find_mut(name, frame_index)
        }

        pub fn $add(&mut self, keyframe: $typ, name: &str, frame_index: u32) -> Result<(), Status> {
            self.origin.$add(keyframe, name, frame_index)
        }

        pub fn $remove(&mut self, name: &str, frame_index: u32) -> Result<$typ, Status> {
            self.origin.$remove(name, frame_index)
        }
    };
}

impl MutableMotion {
    pub fn create() -> MutableMotion {
        let mut motion = Motion::empty();
        motion.set_format_type(MotionFormatType::Vmd);
        MutableMotion { origin: motion }
    }

    pub fn create_from_motion(motion: Motion) -> MutableMotion {
        MutableMotion { origin: motion }
    }

    pub fn get_origin_object(&self) -> &Motion {
        &self.origin
    }

    pub fn into_origin_object(self) -> Motion {
        self.origin
    }

    pub fn set_target_model_name(&mut self, value: &str) {
        self.origin.set_target_model_name(value);
    }

    pub fn set_preferred_fps(&mut self, value: f32) {
        self.origin.set_preferred_fps(value);
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.origin.set_annotation(key, value);
    }

    pub fn set_format_type(&mut self, value: MotionFormatType) {
        self.origin.set_format_type(value);
    }

    forward_frame_keyframes!(
        MotionAccessoryKeyframe,
        find_accessory_keyframe_object_mut,
        add_accessory_keyframe,
        remove_accessory_keyframe
    );
    forward_frame_keyframes!(
        MotionCameraKeyframe,
        find_camera_keyframe_object_mut,
        add_camera_keyframe,
        remove_camera_keyframe
    );
    forward_frame_keyframes!(
        MotionLightKeyframe,
        find_light_keyframe_object_mut,
        add_light_keyframe,
        remove_light_keyframe
    );
    forward_frame_keyframes!(
        MotionModelKeyframe,
        find_model_keyframe_object_mut,
        add_model_keyframe,
        remove_model_keyframe
    );
    forward_frame_keyframes!(
        MotionSelfShadowKeyframe,
        find_self_shadow_keyframe_object_mut,
        add_self_shadow_keyframe,
        remove_self_shadow_keyframe
    );
    forward_named_keyframes!(
        MotionBoneKeyframe,
        find_bone_keyframe_object_mut,
        add_bone_keyframe,
        remove_bone_keyframe
    );
    forward_named_keyframes!(
        MotionMorphKeyframe,
        find_morph_keyframe_object_mut,
        add_morph_keyframe,
        remove_morph_keyframe
    );

    /// Saves as NMD when the motion is flagged so, otherwise as VMD.
    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        match self.origin.get_format_type() {
            MotionFormatType::Nmd => self.origin.save_to_buffer_nmd(buffer),
            MotionFormatType::Vmd | MotionFormatType::Unknown => {
                self.origin.save_to_buffer(buffer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        common::{Status, F128},
        motion::{
            Motion, MotionAccessoryKeyframe, MotionBoneKeyframe,
            MotionBoneKeyframeInterpolationType, MotionCameraKeyframe, MotionEffectParameter,
            MotionEffectParameterValue, MotionFormatType, MotionLightKeyframe,
            MotionModelKeyframe, MotionModelKeyframeConstraintState, MotionMorphKeyframe,
            MotionSelfShadowKeyframe,
        },
        mutable::common::MutableBuffer,
    };

    use super::MutableMotion;

    #[test]
    fn test_bone_keyframe_through_vmd() -> Result<(), Status> {
        let mut motion = MutableMotion::create();
        motion.set_target_model_name("model");
        let mut keyframe = MotionBoneKeyframe::create(0);
        keyframe.set_translation(F128([1.0, 2.0, 3.0, 0.0]));
        keyframe.set_orientation(F128([0.1, 0.2, 0.3, 0.4]));
        for typ in MotionBoneKeyframeInterpolationType::all() {
            keyframe.set_interpolation(*typ, [12, 24, 36, 48]);
        }
        motion.add_bone_keyframe(keyframe, "bone_keyframe", 42)?;
        let mut mutable_buffer = MutableBuffer::create()?;
        motion.save_to_buffer(&mut mutable_buffer)?;
        let mut buffer = mutable_buffer.create_buffer_object()?;
        let loaded = Motion::load_from_buffer(&mut buffer, 1)?;
        assert_eq!("model", loaded.get_target_model_name());
        assert!(loaded.find_bone_keyframe_object("bone_keyframe", 42).is_none());
        let keyframe = loaded
            .find_bone_keyframe_object("bone_keyframe", 43)
            .ok_or(Status::ErrorMotionBoneKeyframeNotFound)?;
        assert_eq!(43, keyframe.get_frame_index());
        assert_eq!(F128([1.0, 2.0, 3.0, 0.0]), keyframe.get_translation());
        assert_eq!(F128([0.1, 0.2, 0.3, 0.4]), keyframe.get_orientation());
        for typ in MotionBoneKeyframeInterpolationType::all() {
            assert_eq!([12, 24, 36, 48], keyframe.get_interpolation().get(*typ));
        }
        assert_eq!(43, loaded.get_max_frame_index());
        Ok(())
    }

    macro_rules! assert_frame_keyframes {
        ($motion:expr, $typ:ident, $find:ident, $find_mut:ident, $add:ident, $remove:ident, $already_exists:expr, $not_found:expr) => {{
            $motion.$add($typ::create(0), 30)?;
            $motion.$add($typ::create(0), 10)?;
            $motion.$add($typ::create(0), 20)?;
            assert_eq!(Err($already_exists), $motion.$add($typ::create(0), 20));
            assert!($motion.$find_mut(10).is_some());
            if let Some(keyframe) = $motion.$find_mut(20) {
                keyframe.set_selected(true);
            }
            let origin = $motion.get_origin_object();
            let keyframe = origin.$find(20).ok_or($not_found)?;
            assert!(keyframe.is_selected());
            assert_eq!(1, keyframe.get_index());
            assert_eq!(30, origin.get_max_frame_index());
            let removed = $motion.$remove(30)?;
            assert_eq!(30, removed.get_frame_index());
            assert_eq!(Err($not_found), $motion.$remove(30).map(|_| ()));
            assert_eq!(20, $motion.get_origin_object().get_max_frame_index());
            $motion.$remove(10)?;
            $motion.$remove(20)?;
        }};
    }

    #[test]
    fn test_add_find_remove_frame_keyframes() -> Result<(), Status> {
        let mut motion = MutableMotion::create();
        assert_frame_keyframes!(
            motion,
            MotionAccessoryKeyframe,
            find_accessory_keyframe_object,
            find_accessory_keyframe_object_mut,
            add_accessory_keyframe,
            remove_accessory_keyframe,
            Status::ErrorMotionAccessoryKeyframeAlreadyExists,
            Status::ErrorMotionAccessoryKeyframeNotFound
        );
        assert_frame_keyframes!(
            motion,
            MotionCameraKeyframe,
            find_camera_keyframe_object,
            find_camera_keyframe_object_mut,
            add_camera_keyframe,
            remove_camera_keyframe,
            Status::ErrorMotionCameraKeyframeAlreadyExists,
            Status::ErrorMotionCameraKeyframeNotFound
        );
        assert_frame_keyframes!(
            motion,
            MotionLightKeyframe,
            find_light_keyframe_object,
            find_light_keyframe_object_mut,
            add_light_keyframe,
            remove_light_keyframe,
            Status::ErrorMotionLightKeyframeAlreadyExists,
            Status::ErrorMotionLightKeyframeNotFound
        );
        assert_frame_keyframes!(
            motion,
            MotionModelKeyframe,
            find_model_keyframe_object,
            find_model_keyframe_object_mut,
            add_model_keyframe,
            remove_model_keyframe,
            Status::ErrorMotionModelKeyframeAlreadyExists,
            Status::ErrorMotionModelKeyframeNotFound
        );
        assert_frame_keyframes!(
            motion,
            MotionSelfShadowKeyframe,
            find_self_shadow_keyframe_object,
            find_self_shadow_keyframe_object_mut,
            add_self_shadow_keyframe,
            remove_self_shadow_keyframe,
            Status::ErrorMotionSelfShadowKeyframeAlreadyExists,
            Status::ErrorMotionSelfShadowKeyframeNotFound
        );
        assert_eq!(0, motion.get_origin_object().get_max_frame_index());
        Ok(())
    }

    #[test]
    fn test_add_find_remove_named_keyframes() -> Result<(), Status> {
        let mut motion = MutableMotion::create();
        motion.add_bone_keyframe(MotionBoneKeyframe::create(0), "left", 5)?;
        motion.add_bone_keyframe(MotionBoneKeyframe::create(0), "right", 5)?;
        motion.add_bone_keyframe(MotionBoneKeyframe::create(0), "left", 15)?;
        assert_eq!(
            Err(Status::ErrorMotionBoneKeyframeAlreadyExists),
            motion.add_bone_keyframe(MotionBoneKeyframe::create(0), "left", 5)
        );
        motion.add_morph_keyframe(MotionMorphKeyframe::create(0), "smile", 7)?;
        assert_eq!(
            Err(Status::ErrorMotionMorphKeyframeAlreadyExists),
            motion.add_morph_keyframe(MotionMorphKeyframe::create(0), "smile", 7)
        );
        if let Some(keyframe) = motion.find_morph_keyframe_object_mut("smile", 7) {
            keyframe.set_weight(0.5f32);
        }
        assert!(motion.find_bone_keyframe_object_mut("right", 15).is_none());
        {
            let origin = motion.get_origin_object();
            assert_eq!(15, origin.get_max_frame_index());
            assert_eq!(3, origin.get_all_bone_keyframe_objects().count());
            let (prev, next) = origin.search_closest_bone_keyframes("left", 10);
            assert_eq!(Some(5), prev.map(|keyframe| keyframe.get_frame_index()));
            assert_eq!(Some(15), next.map(|keyframe| keyframe.get_frame_index()));
            let weight = origin
                .find_morph_keyframe_object("smile", 7)
                .map(|keyframe| keyframe.get_weight());
            assert_eq!(Some(0.5f32), weight);
        }
        motion.remove_bone_keyframe("left", 15)?;
        assert_eq!(
            Err(Status::ErrorMotionBoneKeyframeNotFound),
            motion.remove_bone_keyframe("left", 15).map(|_| ())
        );
        assert_eq!(
            Err(Status::ErrorMotionMorphKeyframeNotFound),
            motion.remove_morph_keyframe("frown", 7).map(|_| ())
        );
        assert_eq!(7, motion.get_origin_object().get_max_frame_index());
        Ok(())
    }

    #[test]
    fn test_save_dispatches_on_format() -> Result<(), Status> {
        let mut motion = MutableMotion::create();
        motion.set_format_type(MotionFormatType::Nmd);
        motion.set_preferred_fps(60.0f32);
        motion.set_annotation("author", "someone");
        let mut accessory = MotionAccessoryKeyframe::create(0);
        accessory.add_effect_parameter_object(MotionEffectParameter::create(
            "glow",
            MotionEffectParameterValue::Float(0.25f32),
        ))?;
        motion.add_accessory_keyframe(accessory, 12)?;
        let mut model = MotionModelKeyframe::create(0);
        model.add_constraint_state_object(MotionModelKeyframeConstraintState::create(
            "leg IK", false,
        ))?;
        motion.add_model_keyframe(model, 3)?;
        let mut mutable_buffer = MutableBuffer::create()?;
        motion.save_to_buffer(&mut mutable_buffer)?;
        let mut buffer = mutable_buffer.create_buffer_object()?;
        let loaded = Motion::load_from_buffer_nmd(&mut buffer, 0)?;
        assert_eq!(MotionFormatType::Nmd, loaded.get_format_type());
        assert_eq!(60.0f32, loaded.get_preferred_fps());
        assert_eq!(Some(&"someone".to_owned()), loaded.get_annotation("author"));
        let accessory = loaded
            .find_accessory_keyframe_object(12)
            .ok_or(Status::ErrorMotionAccessoryKeyframeNotFound)?;
        assert_eq!(1, accessory.get_all_effect_parameter_objects().len());
        let model = loaded
            .find_model_keyframe_object(3)
            .ok_or(Status::ErrorMotionModelKeyframeNotFound)?;
        let states = model.get_all_constraint_state_objects();
        assert_eq!(1, states.len());
        assert_eq!("leg IK", states[0].get_bone_name());
        assert!(!states[0].is_enabled());
        Ok(())
    }
}
