use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    common::{LanguageType, Status, F128},
    model::{
        insert_object, remove_object, Model, ModelBone, ModelBoneType, ModelConstraint,
        ModelConstraintJoint, ModelFormatType, ModelJoint, ModelJointType, ModelLabel,
        ModelLabelItem, ModelMaterial, ModelMaterialFlags, ModelMaterialSphereMapTextureType,
        ModelMorph, ModelMorphBone, ModelMorphCategory, ModelMorphFlip, ModelMorphGroup,
        ModelMorphImpulse, ModelMorphMaterial, ModelMorphMaterialOperationType, ModelMorphType,
        ModelMorphUv, ModelMorphVertex, ModelRigidBody, ModelRigidBodyShapeType,
        ModelRigidBodyTransformType, ModelSoftBody, ModelSoftBodyAeroModelType,
        ModelSoftBodyAnchor, ModelSoftBodyShapeType, ModelTexture, ModelVertex, ModelVertexType,
    },
    utils::CodecType,
};

use super::common::MutableBuffer;

/// Editable handle over a [`Model`].
///
/// Entities are built through their own mutable wrappers and then inserted
/// here; the model keeps the shared origin object.
pub struct MutableModel {
    origin: Rc<RefCell<Model>>,
}

macro_rules! impl_insert_remove {
    ($insert:ident, $remove:ident, $wrapper:ty, $field:ident, $already_exists:expr, $not_found:expr) => {
        pub fn $insert(&mut self, value: &$wrapper, index: i32) -> Result<(), Status> {
            insert_object(
                &mut self.origin.borrow_mut().$field,
                value.get_origin_object(),
                index,
                $already_exists,
            )
        }

        pub fn $remove(&mut self, value: &$wrapper) -> Result<(), Status> {
            remove_object(
                &mut self.origin.borrow_mut().$field,
                value.get_origin_object(),
                $not_found,
            )
        }
    };
}

impl MutableModel {
    pub fn create() -> MutableModel {
        let mut model = Model::create();
        model.set_format_type(ModelFormatType::Pmd1_0);
        model.set_codec_type(CodecType::Utf8);
        MutableModel {
            origin: Rc::new(RefCell::new(model)),
        }
    }

    pub fn create_as_reference(model: &Rc<RefCell<Model>>) -> MutableModel {
        MutableModel {
            origin: model.clone(),
        }
    }

    pub fn get_origin_object(&self) -> &Rc<RefCell<Model>> {
        &self.origin
    }

    pub fn set_format_type(&mut self, value: ModelFormatType) {
        self.origin.borrow_mut().set_format_type(value);
    }

    pub fn set_codec_type(&mut self, value: CodecType) {
        self.origin.borrow_mut().set_codec_type(value);
    }

    pub fn set_additional_uv_size(&mut self, value: usize) {
        self.origin.borrow_mut().set_additional_uv_size(value);
    }

    pub fn set_name(&mut self, value: &str, language_type: LanguageType) {
        self.origin.borrow_mut().set_name(value, language_type);
    }

    pub fn set_comment(&mut self, value: &str, language_type: LanguageType) {
        self.origin.borrow_mut().set_comment(value, language_type);
    }

    pub fn set_vertex_indices(&mut self, value: &[u32]) -> Result<(), Status> {
        self.origin.borrow_mut().set_vertex_indices(value)
    }

    impl_insert_remove!(
        insert_vertex,
        remove_vertex,
        MutableModelVertex,
        vertices,
        Status::ErrorModelVertexAlreadyExists,
        Status::ErrorModelVertexNotFound
    );

    impl_insert_remove!(
        insert_material,
        remove_material,
        MutableModelMaterial,
        materials,
        Status::ErrorModelMaterialAlreadyExists,
        Status::ErrorModelMaterialNotFound
    );

    impl_insert_remove!(
        insert_bone,
        remove_bone,
        MutableModelBone,
        bones,
        Status::ErrorModelBoneAlreadyExists,
        Status::ErrorModelBoneNotFound
    );

    impl_insert_remove!(
        insert_constraint,
        remove_constraint,
        MutableModelConstraint,
        constraints,
        Status::ErrorModelConstraintAlreadyExists,
        Status::ErrorModelConstraintNotFound
    );

    impl_insert_remove!(
        insert_texture,
        remove_texture,
        MutableModelTexture,
        textures,
        Status::ErrorModelTextureAlreadyExists,
        Status::ErrorModelTextureNotFound
    );

    impl_insert_remove!(
        insert_morph,
        remove_morph,
        MutableModelMorph,
        morphs,
        Status::ErrorModelMorphAlreadyExists,
        Status::ErrorModelMorphNotFound
    );

    impl_insert_remove!(
        insert_label,
        remove_label,
        MutableModelLabel,
        labels,
        Status::ErrorModelLabelAlreadyExists,
        Status::ErrorModelLabelNotFound
    );

    impl_insert_remove!(
        insert_rigid_body,
        remove_rigid_body,
        MutableModelRigidBody,
        rigid_bodies,
        Status::ErrorModelRigidBodyAlreadyExists,
        Status::ErrorModelRigidBodyNotFound
    );

    impl_insert_remove!(
        insert_joint,
        remove_joint,
        MutableModelJoint,
        joints,
        Status::ErrorModelJointAlreadyExists,
        Status::ErrorModelJointNotFound
    );

    impl_insert_remove!(
        insert_soft_body,
        remove_soft_body,
        MutableModelSoftBody,
        soft_bodies,
        Status::ErrorModelSoftBodyAlreadyExists,
        Status::ErrorModelSoftBodyNotFound
    );

    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), Status> {
        let model = self.origin.borrow();
        if !model.soft_bodies.is_empty() && model.format_type != ModelFormatType::Pmx2_1 {
            log::warn!(
                "{} soft bodies are dropped when saving as {:?}",
                model.soft_bodies.len(),
                model.format_type
            );
        }
        model.save_to_buffer(buffer)
    }
}

/// Declares a wrapper owning (or referencing) one model entity.
macro_rules! mutable_model_object {
    ($(#[$meta:meta])* $name:ident, $typ:ty) => {
        $(#[$meta])*
        pub struct $name {
            origin: Rc<RefCell<$typ>>,
            parent_model: Weak<RefCell<Model>>,
        }

        impl $name {
            pub fn create_as_reference(model: &MutableModel, origin: &Rc<RefCell<$typ>>) -> $name {
                $name {
                    origin: origin.clone(),
                    parent_model: Rc::downgrade(&model.origin),
                }
            }

            pub fn get_origin_object(&self) -> &Rc<RefCell<$typ>> {
                &self.origin
            }

            pub fn get_parent_model_object(&self) -> Option<Rc<RefCell<Model>>> {
                self.parent_model.upgrade()
            }
        }
    };
}

macro_rules! impl_default_create {
    ($name:ident, $typ:ty) => {
        impl $name {
            pub fn create(model: &MutableModel) -> $name {
                $name::create_as_reference(model, &Rc::new(RefCell::new(<$typ>::default())))
            }
        }
    };
}

macro_rules! forward_setters {
    ($($set:ident($($arg:ident: $typ:ty),+);)+) => {
        $(
            pub fn $set(&mut self, $($arg: $typ),+) {
                self.origin.borrow_mut().$set($($arg),+);
            }
        )+
    };
}

mutable_model_object!(MutableModelVertex, ModelVertex);
impl_default_create!(MutableModelVertex, ModelVertex);

impl MutableModelVertex {
    forward_setters! {
        set_origin(value: F128);
        set_normal(value: F128);
        set_tex_coord(value: F128);
        set_additional_uv(value: F128, index: usize);
        set_sdef_c(value: F128);
        set_sdef_r0(value: F128);
        set_sdef_r1(value: F128);
        set_bone_object(value: Option<&Rc<RefCell<ModelBone>>>, index: usize);
        set_bone_weight(value: f32, index: usize);
        set_edge_size(value: f32);
        set_type(value: ModelVertexType);
    }
}

mutable_model_object!(MutableModelTexture, ModelTexture);
impl_default_create!(MutableModelTexture, ModelTexture);

impl MutableModelTexture {
    forward_setters! {
        set_path(value: &str);
    }
}

mutable_model_object!(MutableModelMaterial, ModelMaterial);
impl_default_create!(MutableModelMaterial, ModelMaterial);

impl MutableModelMaterial {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_diffuse_texture_object(value: Option<&Rc<RefCell<ModelTexture>>>);
        set_sphere_map_texture_object(value: Option<&Rc<RefCell<ModelTexture>>>);
        set_toon_texture_object(value: Option<&Rc<RefCell<ModelTexture>>>);
        set_toon_texture_index(value: i32);
        set_clob(value: &str);
        set_ambient_color(value: F128);
        set_diffuse_color(value: F128);
        set_specular_color(value: F128);
        set_edge_color(value: F128);
        set_diffuse_opacity(value: f32);
        set_edge_opacity(value: f32);
        set_edge_size(value: f32);
        set_specular_power(value: f32);
        set_sphere_map_texture_type(value: ModelMaterialSphereMapTextureType);
        set_num_vertex_indices(value: usize);
        set_toon_shared(value: bool);
        set_flags(value: ModelMaterialFlags);
    }
}

mutable_model_object!(MutableModelBone, ModelBone);
impl_default_create!(MutableModelBone, ModelBone);

impl MutableModelBone {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_origin(value: F128);
        set_destination_origin(value: F128);
        set_fixed_axis(value: F128);
        set_local_x_axis(value: F128);
        set_local_z_axis(value: F128);
        set_inherent_coefficient(value: f32);
        set_stage_index(value: i32);
        set_global_bone_index(value: i32);
        set_type(value: ModelBoneType);
        set_parent_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_parent_inherent_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_effector_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_target_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_constraint_object(value: Option<&Rc<RefCell<ModelConstraint>>>);
        set_constraint_enabled(value: bool);
        set_rotatable(value: bool);
        set_movable(value: bool);
        set_visible(value: bool);
        set_user_handleable(value: bool);
        set_local_inherent_enabled(value: bool);
        set_inherent_orientation_enabled(value: bool);
        set_inherent_translation_enabled(value: bool);
        set_fixed_axis_enabled(value: bool);
        set_local_axes_enabled(value: bool);
        set_affected_by_physics_simulation(value: bool);
        set_external_parent_bone_enabled(value: bool);
    }
}

mutable_model_object!(MutableModelConstraintJoint, ModelConstraintJoint);
impl_default_create!(MutableModelConstraintJoint, ModelConstraintJoint);

impl MutableModelConstraintJoint {
    forward_setters! {
        set_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_angle_limit_enabled(value: bool);
        set_lower_limit(value: F128);
        set_upper_limit(value: F128);
    }
}

mutable_model_object!(MutableModelConstraint, ModelConstraint);
impl_default_create!(MutableModelConstraint, ModelConstraint);

impl MutableModelConstraint {
    forward_setters! {
        set_effector_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_target_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_num_iterations(value: i32);
        set_angle_limit(value: f32);
    }

    pub fn insert_joint_object(
        &mut self,
        joint: &MutableModelConstraintJoint,
        index: i32,
    ) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .insert_joint_object(joint.get_origin_object(), index)
    }

    pub fn remove_joint_object(&mut self, joint: &MutableModelConstraintJoint) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .remove_joint_object(joint.get_origin_object())
    }
}

mutable_model_object!(MutableModelMorphBone, ModelMorphBone);
impl_default_create!(MutableModelMorphBone, ModelMorphBone);

impl MutableModelMorphBone {
    forward_setters! {
        set_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_translation(value: F128);
        set_orientation(value: F128);
    }
}

mutable_model_object!(MutableModelMorphGroup, ModelMorphGroup);
impl_default_create!(MutableModelMorphGroup, ModelMorphGroup);

impl MutableModelMorphGroup {
    forward_setters! {
        set_morph_object(value: Option<&Rc<RefCell<ModelMorph>>>);
        set_weight(value: f32);
    }
}

mutable_model_object!(MutableModelMorphFlip, ModelMorphFlip);
impl_default_create!(MutableModelMorphFlip, ModelMorphFlip);

impl MutableModelMorphFlip {
    forward_setters! {
        set_morph_object(value: Option<&Rc<RefCell<ModelMorph>>>);
        set_weight(value: f32);
    }
}

mutable_model_object!(MutableModelMorphImpulse, ModelMorphImpulse);
impl_default_create!(MutableModelMorphImpulse, ModelMorphImpulse);

impl MutableModelMorphImpulse {
    forward_setters! {
        set_rigid_body_object(value: Option<&Rc<RefCell<ModelRigidBody>>>);
        set_local(value: bool);
        set_velocity(value: F128);
        set_torque(value: F128);
    }
}

mutable_model_object!(MutableModelMorphMaterial, ModelMorphMaterial);
impl_default_create!(MutableModelMorphMaterial, ModelMorphMaterial);

impl MutableModelMorphMaterial {
    forward_setters! {
        set_material_object(value: Option<&Rc<RefCell<ModelMaterial>>>);
        set_operation_type(value: ModelMorphMaterialOperationType);
        set_diffuse_color(value: F128);
        set_diffuse_opacity(value: f32);
        set_specular_color(value: F128);
        set_specular_power(value: f32);
        set_ambient_color(value: F128);
        set_edge_color(value: F128);
        set_edge_opacity(value: f32);
        set_edge_size(value: f32);
        set_diffuse_texture_blend(value: F128);
        set_sphere_map_texture_blend(value: F128);
        set_toon_texture_blend(value: F128);
    }
}

mutable_model_object!(MutableModelMorphUv, ModelMorphUv);
impl_default_create!(MutableModelMorphUv, ModelMorphUv);

impl MutableModelMorphUv {
    forward_setters! {
        set_vertex_object(value: Option<&Rc<RefCell<ModelVertex>>>);
        set_position(value: F128);
    }
}

mutable_model_object!(MutableModelMorphVertex, ModelMorphVertex);
impl_default_create!(MutableModelMorphVertex, ModelMorphVertex);

impl MutableModelMorphVertex {
    forward_setters! {
        set_vertex_object(value: Option<&Rc<RefCell<ModelVertex>>>);
        set_position(value: F128);
    }
}

mutable_model_object!(MutableModelMorph, ModelMorph);
impl_default_create!(MutableModelMorph, ModelMorph);

/// Child inserts are gated by the morph type first and then by the format
/// of the model the morph was created for.
macro_rules! impl_morph_child_insert_remove {
    ($insert:ident, $remove:ident, $wrapper:ty) => {
        pub fn $insert(&mut self, value: &$wrapper, index: i32) -> Result<(), Status> {
            let format_type = self.parent_format_type();
            self.origin
                .borrow_mut()
                .$insert(value.get_origin_object(), index, format_type)
        }

        pub fn $remove(&mut self, value: &$wrapper) -> Result<(), Status> {
            self.origin.borrow_mut().$remove(value.get_origin_object())
        }
    };
}

impl MutableModelMorph {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_type(value: ModelMorphType);
        set_category(value: ModelMorphCategory);
    }

    fn parent_format_type(&self) -> ModelFormatType {
        self.parent_model
            .upgrade()
            .map(|model| model.borrow().get_format_type())
            .unwrap_or(ModelFormatType::Unknown)
    }

    impl_morph_child_insert_remove!(
        insert_bone_morph_object,
        remove_bone_morph_object,
        MutableModelMorphBone
    );
    impl_morph_child_insert_remove!(
        insert_group_morph_object,
        remove_group_morph_object,
        MutableModelMorphGroup
    );
    impl_morph_child_insert_remove!(
        insert_flip_morph_object,
        remove_flip_morph_object,
        MutableModelMorphFlip
    );
    impl_morph_child_insert_remove!(
        insert_impulse_morph_object,
        remove_impulse_morph_object,
        MutableModelMorphImpulse
    );
    impl_morph_child_insert_remove!(
        insert_material_morph_object,
        remove_material_morph_object,
        MutableModelMorphMaterial
    );
    impl_morph_child_insert_remove!(
        insert_uv_morph_object,
        remove_uv_morph_object,
        MutableModelMorphUv
    );
    impl_morph_child_insert_remove!(
        insert_vertex_morph_object,
        remove_vertex_morph_object,
        MutableModelMorphVertex
    );
}

mutable_model_object!(MutableModelLabelItem, ModelLabelItem);

impl MutableModelLabelItem {
    pub fn create_from_bone_object(
        model: &MutableModel,
        bone: &Rc<RefCell<ModelBone>>,
    ) -> MutableModelLabelItem {
        let item = ModelLabelItem::create_from_bone_object(bone);
        MutableModelLabelItem::create_as_reference(model, &Rc::new(RefCell::new(item)))
    }

    pub fn create_from_morph_object(
        model: &MutableModel,
        morph: &Rc<RefCell<ModelMorph>>,
    ) -> MutableModelLabelItem {
        let item = ModelLabelItem::create_from_morph_object(morph);
        MutableModelLabelItem::create_as_reference(model, &Rc::new(RefCell::new(item)))
    }
}

mutable_model_object!(MutableModelLabel, ModelLabel);
impl_default_create!(MutableModelLabel, ModelLabel);

impl MutableModelLabel {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_special(value: bool);
    }

    pub fn insert_item_object(
        &mut self,
        item: &MutableModelLabelItem,
        index: i32,
    ) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .insert_item_object(item.get_origin_object(), index)
    }

    pub fn remove_item_object(&mut self, item: &MutableModelLabelItem) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .remove_item_object(item.get_origin_object())
    }
}

mutable_model_object!(MutableModelRigidBody, ModelRigidBody);
impl_default_create!(MutableModelRigidBody, ModelRigidBody);

impl MutableModelRigidBody {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_bone_object(value: Option<&Rc<RefCell<ModelBone>>>);
        set_collision_group_id(value: i32);
        set_collision_mask(value: i32);
        set_shape_type(value: ModelRigidBodyShapeType);
        set_size(value: F128);
        set_origin(value: F128);
        set_orientation(value: F128);
        set_mass(value: f32);
        set_linear_damping(value: f32);
        set_angular_damping(value: f32);
        set_restitution(value: f32);
        set_friction(value: f32);
        set_transform_type(value: ModelRigidBodyTransformType);
        set_bone_relative(value: bool);
    }
}

mutable_model_object!(MutableModelJoint, ModelJoint);
impl_default_create!(MutableModelJoint, ModelJoint);

impl MutableModelJoint {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_rigid_body_a_object(value: Option<&Rc<RefCell<ModelRigidBody>>>);
        set_rigid_body_b_object(value: Option<&Rc<RefCell<ModelRigidBody>>>);
        set_type(value: ModelJointType);
        set_origin(value: F128);
        set_orientation(value: F128);
        set_linear_lower_limit(value: F128);
        set_linear_upper_limit(value: F128);
        set_angular_lower_limit(value: F128);
        set_angular_upper_limit(value: F128);
        set_linear_stiffness(value: F128);
        set_angular_stiffness(value: F128);
    }
}

mutable_model_object!(MutableModelSoftBodyAnchor, ModelSoftBodyAnchor);
impl_default_create!(MutableModelSoftBodyAnchor, ModelSoftBodyAnchor);

impl MutableModelSoftBodyAnchor {
    forward_setters! {
        set_rigid_body_object(value: Option<&Rc<RefCell<ModelRigidBody>>>);
        set_vertex_object(value: Option<&Rc<RefCell<ModelVertex>>>);
        set_near_enabled(value: bool);
    }
}

mutable_model_object!(MutableModelSoftBody, ModelSoftBody);
impl_default_create!(MutableModelSoftBody, ModelSoftBody);

impl MutableModelSoftBody {
    forward_setters! {
        set_name(value: &str, language_type: LanguageType);
        set_material_object(value: Option<&Rc<RefCell<ModelMaterial>>>);
        set_pinned_vertex_indices(value: &[u32]);
        set_cluster_enabled(value: bool);
        set_bending_links_enabled(value: bool);
        set_randomize_constraints_needed(value: bool);
        set_shape_type(value: ModelSoftBodyShapeType);
        set_collision_group_id(value: u8);
        set_collision_mask(value: u16);
        set_bending_constraints_distance(value: i32);
        set_cluster_count(value: i32);
        set_total_mass(value: f32);
        set_collision_margin(value: f32);
        set_aero_model(value: ModelSoftBodyAeroModelType);
        set_velocity_correction_factor(value: f32);
        set_damping_coefficient(value: f32);
        set_drag_coefficient(value: f32);
        set_lift_coefficient(value: f32);
        set_pressure_coefficient(value: f32);
        set_volume_conversation_coefficient(value: f32);
        set_dynamic_friction_coefficient(value: f32);
        set_pose_matching_coefficient(value: f32);
        set_rigid_contact_hardness(value: f32);
        set_kinetic_contact_hardness(value: f32);
        set_soft_contact_hardness(value: f32);
        set_anchor_hardness(value: f32);
        set_soft_vs_rigid_hardness(value: f32);
        set_soft_vs_kinetic_hardness(value: f32);
        set_soft_vs_soft_hardness(value: f32);
        set_soft_vs_rigid_impulse_split(value: f32);
        set_soft_vs_kinetic_impulse_split(value: f32);
        set_soft_vs_soft_impulse_split(value: f32);
        set_velocity_solver_iterations(value: i32);
        set_positions_solver_iterations(value: i32);
        set_drift_solver_iterations(value: i32);
        set_cluster_solver_iterations(value: i32);
        set_linear_stiffness_coefficient(value: f32);
        set_angular_stiffness_coefficient(value: f32);
        set_volume_stiffness_coefficient(value: f32);
    }

    pub fn insert_anchor_object(
        &mut self,
        anchor: &MutableModelSoftBodyAnchor,
        index: i32,
    ) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .insert_anchor_object(anchor.get_origin_object(), index)
    }

    pub fn remove_anchor_object(&mut self, anchor: &MutableModelSoftBodyAnchor) -> Result<(), Status> {
        self.origin
            .borrow_mut()
            .remove_anchor_object(anchor.get_origin_object())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use approx::assert_relative_eq;

    use crate::{
        common::{LanguageType, Status, F128},
        model::{
            Model, ModelFormatType, ModelMaterialSphereMapTextureType, ModelMorphType,
            ModelVertexType,
        },
        mutable::common::MutableBuffer,
    };

    use super::*;

    fn copy_model(model: &MutableModel) -> Result<Model, Status> {
        let mut mutable_buffer = MutableBuffer::create()?;
        model.save_to_buffer(&mut mutable_buffer)?;
        let mut buffer = mutable_buffer.create_buffer_object()?;
        Model::load_from_buffer(&mut buffer)
    }

    macro_rules! assert_insert_and_remove {
        ($wrapper:ident, $insert:ident, $remove:ident, $get_all:ident, $already_exists:expr, $not_found:expr) => {{
            let mut model = MutableModel::create();
            model.set_format_type(ModelFormatType::Pmx2_1);
            let first = $wrapper::create(&model);
            let second = $wrapper::create(&model);
            let third = $wrapper::create(&model);
            model.$insert(&first, -1)?;
            model.$insert(&second, 1)?;
            model.$insert(&third, 0)?;
            assert_eq!(Err($already_exists), model.$insert(&first, 0));
            {
                let origin = model.get_origin_object().borrow();
                let objects = origin.$get_all();
                assert_eq!(3, objects.len());
                assert!(Rc::ptr_eq(third.get_origin_object(), &objects[0]));
                assert!(Rc::ptr_eq(first.get_origin_object(), &objects[1]));
                assert!(Rc::ptr_eq(second.get_origin_object(), &objects[2]));
            }
            model.$remove(&first)?;
            assert_eq!(Err($not_found), model.$remove(&first));
            assert_eq!(2, model.get_origin_object().borrow().$get_all().len());
        }};
    }

    #[test]
    fn test_insert_and_remove_every_kind() -> Result<(), Status> {
        assert_insert_and_remove!(
            MutableModelVertex,
            insert_vertex,
            remove_vertex,
            get_all_vertex_objects,
            Status::ErrorModelVertexAlreadyExists,
            Status::ErrorModelVertexNotFound
        );
        assert_insert_and_remove!(
            MutableModelMaterial,
            insert_material,
            remove_material,
            get_all_material_objects,
            Status::ErrorModelMaterialAlreadyExists,
            Status::ErrorModelMaterialNotFound
        );
        assert_insert_and_remove!(
            MutableModelBone,
            insert_bone,
            remove_bone,
            get_all_bone_objects,
            Status::ErrorModelBoneAlreadyExists,
            Status::ErrorModelBoneNotFound
        );
        assert_insert_and_remove!(
            MutableModelConstraint,
            insert_constraint,
            remove_constraint,
            get_all_constraint_objects,
            Status::ErrorModelConstraintAlreadyExists,
            Status::ErrorModelConstraintNotFound
        );
        assert_insert_and_remove!(
            MutableModelTexture,
            insert_texture,
            remove_texture,
            get_all_texture_objects,
            Status::ErrorModelTextureAlreadyExists,
            Status::ErrorModelTextureNotFound
        );
        assert_insert_and_remove!(
            MutableModelMorph,
            insert_morph,
            remove_morph,
            get_all_morph_objects,
            Status::ErrorModelMorphAlreadyExists,
            Status::ErrorModelMorphNotFound
        );
        assert_insert_and_remove!(
            MutableModelLabel,
            insert_label,
            remove_label,
            get_all_label_objects,
            Status::ErrorModelLabelAlreadyExists,
            Status::ErrorModelLabelNotFound
        );
        assert_insert_and_remove!(
            MutableModelRigidBody,
            insert_rigid_body,
            remove_rigid_body,
            get_all_rigid_body_objects,
            Status::ErrorModelRigidBodyAlreadyExists,
            Status::ErrorModelRigidBodyNotFound
        );
        assert_insert_and_remove!(
            MutableModelJoint,
            insert_joint,
            remove_joint,
            get_all_joint_objects,
            Status::ErrorModelJointAlreadyExists,
            Status::ErrorModelJointNotFound
        );
        assert_insert_and_remove!(
            MutableModelSoftBody,
            insert_soft_body,
            remove_soft_body,
            get_all_soft_body_objects,
            Status::ErrorModelSoftBodyAlreadyExists,
            Status::ErrorModelSoftBodyNotFound
        );
        Ok(())
    }

    #[test]
    fn test_label_items_and_constraint_joints() -> Result<(), Status> {
        let model = MutableModel::create();
        let bone = MutableModelBone::create(&model);
        let morph = MutableModelMorph::create(&model);
        let mut label = MutableModelLabel::create(&model);
        let bone_item = MutableModelLabelItem::create_from_bone_object(&model, bone.get_origin_object());
        let morph_item =
            MutableModelLabelItem::create_from_morph_object(&model, morph.get_origin_object());
        label.insert_item_object(&bone_item, -1)?;
        label.insert_item_object(&morph_item, 0)?;
        assert_eq!(
            Err(Status::ErrorModelLabelAlreadyExists),
            label.insert_item_object(&bone_item, -1)
        );
        {
            let origin = label.get_origin_object().borrow();
            let items = origin.get_all_item_objects();
            assert_eq!(2, items.len());
            assert!(Rc::ptr_eq(morph_item.get_origin_object(), &items[0]));
            assert!(items[1]
                .borrow()
                .get_bone_object()
                .map_or(false, |b| Rc::ptr_eq(&b, bone.get_origin_object())));
        }
        label.remove_item_object(&morph_item)?;
        assert_eq!(
            Err(Status::ErrorModelLabelItemNotFound),
            label.remove_item_object(&morph_item)
        );

        let mut constraint = MutableModelConstraint::create(&model);
        let joint = MutableModelConstraintJoint::create(&model);
        constraint.insert_joint_object(&joint, -1)?;
        assert_eq!(
            Err(Status::ErrorModelConstraintAlreadyExists),
            constraint.insert_joint_object(&joint, -1)
        );
        constraint.remove_joint_object(&joint)?;
        assert_eq!(
            Err(Status::ErrorModelConstraintJointNotFound),
            constraint.remove_joint_object(&joint)
        );

        let mut soft_body = MutableModelSoftBody::create(&model);
        let anchor = MutableModelSoftBodyAnchor::create(&model);
        soft_body.insert_anchor_object(&anchor, -1)?;
        assert_eq!(
            Err(Status::ErrorModelSoftBodyAnchorAlreadyExists),
            soft_body.insert_anchor_object(&anchor, -1)
        );
        soft_body.remove_anchor_object(&anchor)?;
        assert_eq!(
            Err(Status::ErrorModelSoftBodyAnchorNotFound),
            soft_body.remove_anchor_object(&anchor)
        );
        Ok(())
    }

    #[test]
    fn test_morph_children_gated_by_type_and_format() -> Result<(), Status> {
        let mut model = MutableModel::create();
        let mut morph = MutableModelMorph::create(&model);
        morph.set_type(ModelMorphType::Bone);
        let child = MutableModelMorphBone::create(&model);
        let vertex_child = MutableModelMorphVertex::create(&model);
        assert_eq!(
            Err(Status::ErrorModelMorphTypeMismatch),
            morph.insert_vertex_morph_object(&vertex_child, -1)
        );
        assert_eq!(
            Err(Status::ErrorModelVersionIncompatible),
            morph.insert_bone_morph_object(&child, -1)
        );
        model.set_format_type(ModelFormatType::Pmx2_0);
        morph.insert_bone_morph_object(&child, -1)?;
        assert_eq!(
            Err(Status::ErrorModelMorphAlreadyExists),
            morph.insert_bone_morph_object(&child, -1)
        );
        morph.remove_bone_morph_object(&child)?;
        assert_eq!(
            Err(Status::ErrorModelMorphBoneNotFound),
            morph.remove_bone_morph_object(&child)
        );

        let mut flip_morph = MutableModelMorph::create(&model);
        flip_morph.set_type(ModelMorphType::Flip);
        let flip = MutableModelMorphFlip::create(&model);
        assert_eq!(
            Err(Status::ErrorModelVersionIncompatible),
            flip_morph.insert_flip_morph_object(&flip, -1)
        );
        model.set_format_type(ModelFormatType::Pmx2_1);
        flip_morph.insert_flip_morph_object(&flip, -1)?;

        model.set_format_type(ModelFormatType::Pmd1_0);
        let mut vertex_morph = MutableModelMorph::create(&model);
        vertex_morph.set_type(ModelMorphType::Vertex);
        vertex_morph.insert_vertex_morph_object(&vertex_child, -1)?;
        Ok(())
    }

    #[test]
    fn test_morph_insert_after_parent_dropped() {
        let model = MutableModel::create();
        let mut morph = MutableModelMorph::create(&model);
        morph.set_type(ModelMorphType::Vertex);
        let child = MutableModelMorphVertex::create(&model);
        drop(model);
        assert!(morph.get_parent_model_object().is_none());
        assert_eq!(
            Err(Status::ErrorModelVersionIncompatible),
            morph.insert_vertex_morph_object(&child, -1)
        );
    }

    #[test]
    fn test_name_truncation_through_pmd() -> Result<(), Status> {
        for (length, expected) in [(19, 19), (20, 20), (21, 20)] {
            let mut model = MutableModel::create();
            let mut bone = MutableModelBone::create(&model);
            bone.set_name(&"a".repeat(length), LanguageType::Japanese);
            model.insert_bone(&bone, -1)?;
            let loaded = copy_model(&model)?;
            let name = loaded.get_all_bone_objects()[0]
                .borrow()
                .get_name(LanguageType::Japanese)
                .to_owned();
            assert_eq!("a".repeat(expected), name);
        }
        for (length, expected) in [(49, 49), (50, 50), (51, 50)] {
            let mut model = MutableModel::create();
            let mut special = MutableModelLabel::create(&model);
            special.set_special(true);
            let mut label = MutableModelLabel::create(&model);
            label.set_name(&"b".repeat(length), LanguageType::Japanese);
            model.insert_label(&special, -1)?;
            model.insert_label(&label, -1)?;
            let loaded = copy_model(&model)?;
            let name = loaded.get_all_label_objects()[1]
                .borrow()
                .get_name(LanguageType::Japanese)
                .to_owned();
            assert_eq!("b".repeat(expected), name);
        }
        Ok(())
    }

    #[test]
    fn test_vertex_deform_normalization() -> Result<(), Status> {
        let mut model = MutableModel::create();
        model.set_format_type(ModelFormatType::Pmx2_0);
        let mut bone = MutableModelBone::create(&model);
        bone.set_name("bone", LanguageType::Japanese);
        model.insert_bone(&bone, -1)?;
        let weights = [0.4f32, 0.3f32, 0.2f32, 0.1f32];
        let types = [
            ModelVertexType::BDEF1,
            ModelVertexType::BDEF2,
            ModelVertexType::BDEF4,
            ModelVertexType::SDEF,
            ModelVertexType::QDEF,
        ];
        for typ in types {
            let mut vertex = MutableModelVertex::create(&model);
            vertex.set_type(typ);
            for (index, weight) in weights.iter().enumerate() {
                vertex.set_bone_object(Some(bone.get_origin_object()), index);
                vertex.set_bone_weight(*weight, index);
            }
            model.insert_vertex(&vertex, -1)?;
        }
        model.set_vertex_indices(&[0, 1, 2, 2, 3, 4])?;
        let loaded = copy_model(&model)?;
        let vertices = loaded.get_all_vertex_objects();
        assert_eq!(types.len(), vertices.len());
        let bdef1 = vertices[0].borrow();
        assert_relative_eq!(1.0f32, bdef1.get_bone_weight(0));
        assert_relative_eq!(0.0f32, bdef1.get_bone_weight(1));
        for vertex in [&vertices[1], &vertices[3]] {
            let vertex = vertex.borrow();
            assert_relative_eq!(0.4f32, vertex.get_bone_weight(0));
            assert_relative_eq!(0.6f32, vertex.get_bone_weight(1));
        }
        for vertex in [&vertices[2], &vertices[4]] {
            let vertex = vertex.borrow();
            for (index, weight) in weights.iter().enumerate() {
                assert_relative_eq!(*weight, vertex.get_bone_weight(index));
            }
        }
        Ok(())
    }

    #[test]
    fn test_bone_constraint_enabled_through_pmx() -> Result<(), Status> {
        let mut model = MutableModel::create();
        model.set_format_type(ModelFormatType::Pmx2_0);
        let mut bone = MutableModelBone::create(&model);
        bone.set_name("bone", LanguageType::Japanese);
        let constraint = MutableModelConstraint::create(&model);
        bone.set_constraint_object(Some(constraint.get_origin_object()));
        bone.set_constraint_enabled(true);
        model.insert_bone(&bone, -1)?;
        let loaded = copy_model(&model)?;
        assert!(loaded.get_all_bone_objects()[0]
            .borrow()
            .get_constraint_object()
            .is_some());
        bone.set_constraint_enabled(false);
        let loaded = copy_model(&model)?;
        let copied = loaded.get_all_bone_objects()[0].clone();
        let copied = copied.borrow();
        assert!(!copied.has_constraint());
        assert!(copied.get_constraint_object().is_none());
        Ok(())
    }

    #[test]
    fn test_bone_conditional_values_through_pmx() -> Result<(), Status> {
        let mut model = MutableModel::create();
        model.set_format_type(ModelFormatType::Pmx2_0);
        let mut bone = MutableModelBone::create(&model);
        bone.set_name("bone", LanguageType::Japanese);
        let mut parent = MutableModelBone::create(&model);
        parent.set_name("bone0", LanguageType::Japanese);
        model.insert_bone(&bone, -1)?;
        model.insert_bone(&parent, -1)?;
        let bone_name = |bone: Option<Rc<RefCell<ModelBone>>>| {
            bone.map(|bone| bone.borrow().get_name(LanguageType::Japanese).to_owned())
        };
        let copy_bone = |model: &MutableModel| -> Result<Rc<RefCell<ModelBone>>, Status> {
            let loaded = copy_model(model)?;
            Ok(loaded.get_all_bone_objects()[0].clone())
        };

        bone.set_destination_origin(F128([1.0, 2.0, 3.0, 0.0]));
        bone.set_fixed_axis(F128([0.0, 1.0, 0.0, 0.0]));
        bone.set_local_x_axis(F128([1.0, 2.0, 3.0, 0.0]));
        bone.set_local_z_axis(F128([3.0, 2.0, 1.0, 0.0]));
        bone.set_parent_inherent_bone_object(Some(parent.get_origin_object()));
        bone.set_inherent_coefficient(0.42f32);
        bone.set_fixed_axis_enabled(false);
        bone.set_local_axes_enabled(false);
        bone.set_inherent_translation_enabled(false);
        {
            let copied = copy_bone(&model)?;
            let copied = copied.borrow();
            assert_eq!(F128([1.0, 2.0, 3.0, 0.0]), copied.get_destination_origin());
            assert!(copied.get_target_bone_object().is_none());
            assert!(!copied.has_fixed_axis());
            assert_eq!(F128::ZERO, copied.get_fixed_axis());
            assert!(!copied.has_local_axes());
            assert_eq!(F128::UNIT_X, copied.get_local_x_axis());
            assert_eq!(F128::UNIT_Z, copied.get_local_z_axis());
            assert!(!copied.has_inherent_translation());
            assert!(copied.get_parent_inherent_bone_object().is_none());
            assert_relative_eq!(1.0f32, copied.get_inherent_coefficient());
        }

        bone.set_target_bone_object(Some(parent.get_origin_object()));
        bone.set_fixed_axis_enabled(true);
        bone.set_local_axes_enabled(true);
        bone.set_inherent_translation_enabled(true);
        {
            let copied = copy_bone(&model)?;
            let copied = copied.borrow();
            assert_eq!(F128::ZERO, copied.get_destination_origin());
            assert_eq!(
                Some("bone0".to_owned()),
                bone_name(copied.get_target_bone_object())
            );
            assert!(copied.has_fixed_axis());
            assert_eq!(F128([0.0, 1.0, 0.0, 0.0]), copied.get_fixed_axis());
            assert!(copied.has_local_axes());
            assert_eq!(F128([1.0, 2.0, 3.0, 0.0]), copied.get_local_x_axis());
            assert_eq!(F128([3.0, 2.0, 1.0, 0.0]), copied.get_local_z_axis());
            assert!(copied.has_inherent_translation());
            assert!(!copied.has_inherent_orientation());
            assert_eq!(
                Some("bone0".to_owned()),
                bone_name(copied.get_parent_inherent_bone_object())
            );
            assert_relative_eq!(0.42f32, copied.get_inherent_coefficient());
        }
        Ok(())
    }

    #[test]
    fn test_material_textures_through_pmx() -> Result<(), Status> {
        let mut model = MutableModel::create();
        model.set_format_type(ModelFormatType::Pmx2_0);
        let mut diffuse = MutableModelTexture::create(&model);
        diffuse.set_path("diffuse.png");
        let mut sphere = MutableModelTexture::create(&model);
        sphere.set_path("sphere.sph");
        let mut toon = MutableModelTexture::create(&model);
        toon.set_path("toon.bmp");
        model.insert_texture(&diffuse, -1)?;
        model.insert_texture(&sphere, -1)?;
        model.insert_texture(&toon, -1)?;
        let mut material = MutableModelMaterial::create(&model);
        material.set_diffuse_texture_object(Some(diffuse.get_origin_object()));
        material.set_sphere_map_texture_object(Some(sphere.get_origin_object()));
        material.set_sphere_map_texture_type(ModelMaterialSphereMapTextureType::TypeMultiply);
        material.set_toon_shared(false);
        material.set_toon_texture_object(Some(toon.get_origin_object()));
        model.insert_material(&material, -1)?;
        let mut shared = MutableModelMaterial::create(&model);
        shared.set_sphere_map_texture_object(Some(sphere.get_origin_object()));
        shared.set_sphere_map_texture_type(ModelMaterialSphereMapTextureType::TypeNone);
        shared.set_toon_shared(true);
        shared.set_toon_texture_index(3);
        model.insert_material(&shared, -1)?;

        let loaded = copy_model(&model)?;
        let materials = loaded.get_all_material_objects();
        let material = materials[0].borrow();
        let path = |texture: Option<Rc<RefCell<ModelTexture>>>| {
            texture.map(|texture| texture.borrow().get_path().to_owned())
        };
        assert_eq!(
            Some("diffuse.png".to_owned()),
            path(material.get_diffuse_texture_object())
        );
        assert_eq!(
            Some("sphere.sph".to_owned()),
            path(material.get_sphere_map_texture_object())
        );
        assert_eq!(
            Some("toon.bmp".to_owned()),
            path(material.get_toon_texture_object())
        );
        let shared = materials[1].borrow();
        assert!(shared.get_sphere_map_texture_object().is_none());
        assert!(shared.is_toon_shared());
        assert!(shared.get_toon_texture_object().is_none());
        assert_eq!(3, shared.get_toon_texture_index());
        Ok(())
    }

    #[test]
    fn test_constraint_through_pmd() -> Result<(), Status> {
        let mut model = MutableModel::create();
        let mut root = MutableModelBone::create(&model);
        root.set_name("root", LanguageType::Japanese);
        let mut effector = MutableModelBone::create(&model);
        effector.set_name("effector", LanguageType::Japanese);
        let mut target = MutableModelBone::create(&model);
        target.set_name("target", LanguageType::Japanese);
        model.insert_bone(&root, -1)?;
        model.insert_bone(&effector, -1)?;
        model.insert_bone(&target, -1)?;
        let mut constraint = MutableModelConstraint::create(&model);
        constraint.set_effector_bone_object(Some(effector.get_origin_object()));
        constraint.set_target_bone_object(Some(target.get_origin_object()));
        constraint.set_num_iterations(40);
        constraint.set_angle_limit(0.5f32);
        let mut joint = MutableModelConstraintJoint::create(&model);
        joint.set_bone_object(Some(root.get_origin_object()));
        constraint.insert_joint_object(&joint, -1)?;
        model.insert_constraint(&constraint, -1)?;

        let loaded = copy_model(&model)?;
        let constraints = loaded.get_all_constraint_objects();
        assert_eq!(1, constraints.len());
        let constraint = constraints[0].borrow();
        assert_eq!(40, constraint.get_num_iterations());
        assert_relative_eq!(0.5f32, constraint.get_angle_limit());
        let bone_name = |bone: Option<Rc<RefCell<ModelBone>>>| {
            bone.map(|bone| bone.borrow().get_name(LanguageType::Japanese).to_owned())
        };
        assert_eq!(
            Some("effector".to_owned()),
            bone_name(constraint.get_effector_bone_object())
        );
        assert_eq!(
            Some("target".to_owned()),
            bone_name(constraint.get_target_bone_object())
        );
        let joints = constraint.get_all_joint_objects();
        assert_eq!(1, joints.len());
        assert_eq!(
            Some("root".to_owned()),
            bone_name(joints[0].borrow().get_bone_object())
        );
        Ok(())
    }

    #[test]
    fn test_reference_wrapper_shares_origin() -> Result<(), Status> {
        let mut model = MutableModel::create();
        let bone = MutableModelBone::create(&model);
        model.insert_bone(&bone, -1)?;
        let origin = model.get_origin_object().borrow().get_all_bone_objects()[0].clone();
        let mut reference = MutableModelBone::create_as_reference(&model, &origin);
        reference.set_origin(F128([1.0, 2.0, 3.0, 0.0]));
        assert_eq!(
            F128([1.0, 2.0, 3.0, 0.0]),
            bone.get_origin_object().borrow().get_origin()
        );
        let shared = MutableModel::create_as_reference(model.get_origin_object());
        assert!(Rc::ptr_eq(shared.get_origin_object(), model.get_origin_object()));
        Ok(())
    }
}
