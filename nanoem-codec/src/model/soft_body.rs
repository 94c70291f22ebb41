use std::{cell::RefCell, rc::Rc};

use crate::{
    common::{Buffer, Status},
    mutable::common::MutableBuffer,
};

use super::{
    insert_object, parse_objects, remove_object, Info, Model, ModelMaterial, ModelObject,
    ModelRigidBody, ModelVertex, ObjectRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelSoftBodyShapeType {
    Unknown = -1,
    #[default]
    TriMesh,
    Rope,
}

impl From<u8> for ModelSoftBodyShapeType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelSoftBodyShapeType::TriMesh,
            1 => ModelSoftBodyShapeType::Rope,
            _ => ModelSoftBodyShapeType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelSoftBodyAeroModelType {
    Unknown = -1,
    #[default]
    VertexPoint,
    VertexTwoSided,
    VertexOneSided,
    FaceTwoSided,
    FaceOneSided,
}

impl From<i32> for ModelSoftBodyAeroModelType {
    fn from(value: i32) -> Self {
        match value {
            0 => ModelSoftBodyAeroModelType::VertexPoint,
            1 => ModelSoftBodyAeroModelType::VertexTwoSided,
            2 => ModelSoftBodyAeroModelType::VertexOneSided,
            3 => ModelSoftBodyAeroModelType::FaceTwoSided,
            4 => ModelSoftBodyAeroModelType::FaceOneSided,
            _ => ModelSoftBodyAeroModelType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSoftBodyAnchor {
    pub base: ModelObject,
    pub(crate) rigid_body: ObjectRef<ModelRigidBody>,
    pub(crate) vertex: ObjectRef<ModelVertex>,
    pub(crate) is_near_enabled: bool,
}

impl ModelSoftBodyAnchor {
    fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelSoftBodyAnchor, Status> {
        Ok(ModelSoftBodyAnchor {
            base: ModelObject::default(),
            rigid_body: ObjectRef::from_index(
                buffer.read_integer_nullable(info.rigid_body_index_size as usize)?,
            ),
            vertex: ObjectRef::from_index(
                buffer.read_integer_nullable(info.vertex_index_size as usize)?,
            ),
            is_near_enabled: buffer.read_byte()? != 0,
        })
    }

    fn save_to_buffer_pmx(&self, info: &Info, buffer: &mut MutableBuffer) -> Result<(), Status> {
        buffer.write_integer(
            self.rigid_body.save_index(),
            info.rigid_body_index_size as usize,
        )?;
        buffer.write_integer(self.vertex.save_index(), info.vertex_index_size as usize)?;
        buffer.write_byte(self.is_near_enabled as u8)
    }

    pub fn get_rigid_body_object(&self) -> Option<Rc<RefCell<ModelRigidBody>>> {
        self.rigid_body.get()
    }

    pub fn get_vertex_object(&self) -> Option<Rc<RefCell<ModelVertex>>> {
        self.vertex.get()
    }

    pub fn is_near_enabled(&self) -> bool {
        self.is_near_enabled
    }

    pub(crate) fn set_rigid_body_object(&mut self, value: Option<&Rc<RefCell<ModelRigidBody>>>) {
        self.rigid_body = ObjectRef::from_object(value);
    }

    pub(crate) fn set_vertex_object(&mut self, value: Option<&Rc<RefCell<ModelVertex>>>) {
        self.vertex = ObjectRef::from_object(value);
    }

    pub(crate) fn set_near_enabled(&mut self, value: bool) {
        self.is_near_enabled = value;
    }
}

macro_rules! soft_body_accessors {
    ($($typ:ty => $field:ident, $get:ident, $set:ident;)+) => {
        $(
            pub fn $get(&self) -> $typ {
                self.$field
            }

            pub(crate) fn $set(&mut self, value: $typ) {
                self.$field = value;
            }
        )+
    };
}

#[derive(Debug, Clone, Default)]
pub struct ModelSoftBody {
    pub base: ModelObject,
    pub(crate) name_ja: String,
    pub(crate) name_en: String,
    pub(crate) shape_type: ModelSoftBodyShapeType,
    pub(crate) material: ObjectRef<ModelMaterial>,
    pub(crate) collision_group_id: u8,
    pub(crate) collision_mask: u16,
    pub(crate) flags: u8,
    pub(crate) bending_constraints_distance: i32,
    pub(crate) cluster_count: i32,
    pub(crate) total_mass: f32,
    pub(crate) collision_margin: f32,
    pub(crate) aero_model: ModelSoftBodyAeroModelType,
    pub(crate) velocity_correction_factor: f32,
    pub(crate) damping_coefficient: f32,
    pub(crate) drag_coefficient: f32,
    pub(crate) lift_coefficient: f32,
    pub(crate) pressure_coefficient: f32,
    pub(crate) volume_conversation_coefficient: f32,
    pub(crate) dynamic_friction_coefficient: f32,
    pub(crate) pose_matching_coefficient: f32,
    pub(crate) rigid_contact_hardness: f32,
    pub(crate) kinetic_contact_hardness: f32,
    pub(crate) soft_contact_hardness: f32,
    pub(crate) anchor_hardness: f32,
    pub(crate) soft_vs_rigid_hardness: f32,
    pub(crate) soft_vs_kinetic_hardness: f32,
    pub(crate) soft_vs_soft_hardness: f32,
    pub(crate) soft_vs_rigid_impulse_split: f32,
    pub(crate) soft_vs_kinetic_impulse_split: f32,
    pub(crate) soft_vs_soft_impulse_split: f32,
    pub(crate) velocity_solver_iterations: i32,
    pub(crate) positions_solver_iterations: i32,
    pub(crate) drift_solver_iterations: i32,
    pub(crate) cluster_solver_iterations: i32,
    pub(crate) linear_stiffness_coefficient: f32,
    pub(crate) angular_stiffness_coefficient: f32,
    pub(crate) volume_stiffness_coefficient: f32,
    pub(crate) anchors: Vec<Rc<RefCell<ModelSoftBodyAnchor>>>,
    pub(crate) pinned_vertex_indices: Vec<u32>,
}

impl ModelSoftBody {
    const FLAG_CLUSTER: u8 = 0x1;
    const FLAG_BENDING_LINKS: u8 = 0x2;
    const FLAG_RANDOMIZE_CONSTRAINTS: u8 = 0x4;

    pub(crate) fn parse_pmx(info: &Info, buffer: &mut Buffer) -> Result<ModelSoftBody, Status> {
        let mut soft_body = ModelSoftBody {
            base: ModelObject::default(),
            name_ja: info.read_string(buffer)?,
            name_en: info.read_string(buffer)?,
            shape_type: buffer.read_byte()?.into(),
            material: ObjectRef::from_index(
                buffer.read_integer_nullable(info.material_index_size as usize)?,
            ),
            collision_group_id: buffer.read_byte()?,
            collision_mask: buffer.read_u16_little_endian()?,
            flags: buffer.read_byte()?,
            bending_constraints_distance: buffer.read_i32_little_endian()?,
            cluster_count: buffer.read_i32_little_endian()?,
            total_mass: buffer.read_f32_little_endian()?,
            collision_margin: buffer.read_f32_little_endian()?,
            aero_model: buffer.read_i32_little_endian()?.into(),
            velocity_correction_factor: buffer.read_f32_little_endian()?,
            damping_coefficient: buffer.read_f32_little_endian()?,
            drag_coefficient: buffer.read_f32_little_endian()?,
            lift_coefficient: buffer.read_f32_little_endian()?,
            pressure_coefficient: buffer.read_f32_little_endian()?,
            volume_conversation_coefficient: buffer.read_f32_little_endian()?,
            dynamic_friction_coefficient: buffer.read_f32_little_endian()?,
            pose_matching_coefficient: buffer.read_f32_little_endian()?,
            rigid_contact_hardness: buffer.read_f32_little_endian()?,
            kinetic_contact_hardness: buffer.read_f32_little_endian()?,
            soft_contact_hardness: buffer.read_f32_little_endian()?,
            anchor_hardness: buffer.read_f32_little_endian()?,
            soft_vs_rigid_hardness: buffer.read_f32_little_endian()?,
            soft_vs_kinetic_hardness: buffer.read_f32_little_endian()?,
            soft_vs_soft_hardness: buffer.read_f32_little_endian()?,
            soft_vs_rigid_impulse_split: buffer.read_f32_little_endian()?,
            soft_vs_kinetic_impulse_split: buffer.read_f32_little_endian()?,
            soft_vs_soft_impulse_split: buffer.read_f32_little_endian()?,
            velocity_solver_iterations: buffer.read_i32_little_endian()?,
            positions_solver_iterations: buffer.read_i32_little_endian()?,
            drift_solver_iterations: buffer.read_i32_little_endian()?,
            cluster_solver_iterations: buffer.read_i32_little_endian()?,
            linear_stiffness_coefficient: buffer.read_f32_little_endian()?,
            angular_stiffness_coefficient: buffer.read_f32_little_endian()?,
            volume_stiffness_coefficient: buffer.read_f32_little_endian()?,
            anchors: vec![],
            pinned_vertex_indices: vec![],
        };
        let num_anchors = buffer.read_len()?;
        soft_body.anchors = parse_objects(buffer, num_anchors, |b| {
            ModelSoftBodyAnchor::parse_pmx(info, b)
        })?;
        let num_pinned_vertex_indices = buffer.read_len()?;
        for _ in 0..num_pinned_vertex_indices {
            soft_body
                .pinned_vertex_indices
                .push(buffer.read_integer(info.vertex_index_size as usize)? as u32);
        }
        Ok(soft_body)
    }

    pub(crate) fn save_to_buffer_pmx(
        &self,
        info: &Info,
        buffer: &mut MutableBuffer,
    ) -> Result<(), Status> {
        info.write_string(&self.name_ja, buffer)?;
        info.write_string(&self.name_en, buffer)?;
        buffer.write_byte(self.shape_type as u8)?;
        buffer.write_integer(self.material.save_index(), info.material_index_size as usize)?;
        buffer.write_byte(self.collision_group_id)?;
        buffer.write_u16_little_endian(self.collision_mask)?;
        buffer.write_byte(self.flags)?;
        buffer.write_i32_little_endian(self.bending_constraints_distance)?;
        buffer.write_i32_little_endian(self.cluster_count)?;
        buffer.write_f32_little_endian(self.total_mass)?;
        buffer.write_f32_little_endian(self.collision_margin)?;
        buffer.write_i32_little_endian(self.aero_model as i32)?;
        for value in [
            self.velocity_correction_factor,
            self.damping_coefficient,
            self.drag_coefficient,
            self.lift_coefficient,
            self.pressure_coefficient,
            self.volume_conversation_coefficient,
            self.dynamic_friction_coefficient,
            self.pose_matching_coefficient,
            self.rigid_contact_hardness,
            self.kinetic_contact_hardness,
            self.soft_contact_hardness,
            self.anchor_hardness,
            self.soft_vs_rigid_hardness,
            self.soft_vs_kinetic_hardness,
            self.soft_vs_soft_hardness,
            self.soft_vs_rigid_impulse_split,
            self.soft_vs_kinetic_impulse_split,
            self.soft_vs_soft_impulse_split,
        ] {
            buffer.write_f32_little_endian(value)?;
        }
        for value in [
            self.velocity_solver_iterations,
            self.positions_solver_iterations,
            self.drift_solver_iterations,
            self.cluster_solver_iterations,
        ] {
            buffer.write_i32_little_endian(value)?;
        }
        buffer.write_f32_little_endian(self.linear_stiffness_coefficient)?;
        buffer.write_f32_little_endian(self.angular_stiffness_coefficient)?;
        buffer.write_f32_little_endian(self.volume_stiffness_coefficient)?;
        buffer.write_u32_little_endian(self.anchors.len() as u32)?;
        for anchor in &self.anchors {
            anchor.borrow().save_to_buffer_pmx(info, buffer)?;
        }
        buffer.write_u32_little_endian(self.pinned_vertex_indices.len() as u32)?;
        for vertex_index in &self.pinned_vertex_indices {
            buffer.write_integer(*vertex_index as i32, info.vertex_index_size as usize)?;
        }
        Ok(())
    }

    pub(crate) fn resolve(&mut self, parent_model: &Model) {
        self.material.resolve(&parent_model.materials);
        for anchor in &self.anchors {
            let mut anchor = anchor.borrow_mut();
            anchor.rigid_body.resolve(&parent_model.rigid_bodies);
            anchor.vertex.resolve(&parent_model.vertices);
        }
    }

    impl_name_accessors!();

    soft_body_accessors! {
        ModelSoftBodyShapeType => shape_type, get_shape_type, set_shape_type;
        u8 => collision_group_id, get_collision_group_id, set_collision_group_id;
        u16 => collision_mask, get_collision_mask, set_collision_mask;
        i32 => bending_constraints_distance, get_bending_constraints_distance, set_bending_constraints_distance;
        i32 => cluster_count, get_cluster_count, set_cluster_count;
        f32 => total_mass, get_total_mass, set_total_mass;
        f32 => collision_margin, get_collision_margin, set_collision_margin;
        ModelSoftBodyAeroModelType => aero_model, get_aero_model, set_aero_model;
        f32 => velocity_correction_factor, get_velocity_correction_factor, set_velocity_correction_factor;
        f32 => damping_coefficient, get_damping_coefficient, set_damping_coefficient;
        f32 => drag_coefficient, get_drag_coefficient, set_drag_coefficient;
        f32 => lift_coefficient, get_lift_coefficient, set_lift_coefficient;
        f32 => pressure_coefficient, get_pressure_coefficient, set_pressure_coefficient;
        f32 => volume_conversation_coefficient, get_volume_conversation_coefficient, set_volume_conversation_coefficient;
        f32 => dynamic_friction_coefficient, get_dynamic_friction_coefficient, set_dynamic_friction_coefficient;
        f32 => pose_matching_coefficient, get_pose_matching_coefficient, set_pose_matching_coefficient;
        f32 => rigid_contact_hardness, get_rigid_contact_hardness, set_rigid_contact_hardness;
        f32 => kinetic_contact_hardness, get_kinetic_contact_hardness, set_kinetic_contact_hardness;
        f32 => soft_contact_hardness, get_soft_contact_hardness, set_soft_contact_hardness;
        f32 => anchor_hardness, get_anchor_hardness, set_anchor_hardness;
        f32 => soft_vs_rigid_hardness, get_soft_vs_rigid_hardness, set_soft_vs_rigid_hardness;
        f32 => soft_vs_kinetic_hardness, get_soft_vs_kinetic_hardness, set_soft_vs_kinetic_hardness;
        f32 => soft_vs_soft_hardness, get_soft_vs_soft_hardness, set_soft_vs_soft_hardness;
        f32 => soft_vs_rigid_impulse_split, get_soft_vs_rigid_impulse_split, set_soft_vs_rigid_impulse_split;
        f32 => soft_vs_kinetic_impulse_split, get_soft_vs_kinetic_impulse_split, set_soft_vs_kinetic_impulse_split;
        f32 => soft_vs_soft_impulse_split, get_soft_vs_soft_impulse_split, set_soft_vs_soft_impulse_split;
        i32 => velocity_solver_iterations, get_velocity_solver_iterations, set_velocity_solver_iterations;
        i32 => positions_solver_iterations, get_positions_solver_iterations, set_positions_solver_iterations;
        i32 => drift_solver_iterations, get_drift_solver_iterations, set_drift_solver_iterations;
        i32 => cluster_solver_iterations, get_cluster_solver_iterations, set_cluster_solver_iterations;
        f32 => linear_stiffness_coefficient, get_linear_stiffness_coefficient, set_linear_stiffness_coefficient;
        f32 => angular_stiffness_coefficient, get_angular_stiffness_coefficient, set_angular_stiffness_coefficient;
        f32 => volume_stiffness_coefficient, get_volume_stiffness_coefficient, set_volume_stiffness_coefficient;
    }

    fn set_flag(&mut self, mask: u8, value: bool) {
        if value {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    pub fn is_cluster_enabled(&self) -> bool {
        self.flags & Self::FLAG_CLUSTER != 0
    }

    pub fn is_bending_links_enabled(&self) -> bool {
        self.flags & Self::FLAG_BENDING_LINKS != 0
    }

    pub fn is_randomize_constraints_needed(&self) -> bool {
        self.flags & Self::FLAG_RANDOMIZE_CONSTRAINTS != 0
    }

    pub(crate) fn set_cluster_enabled(&mut self, value: bool) {
        self.set_flag(Self::FLAG_CLUSTER, value);
    }

    pub(crate) fn set_bending_links_enabled(&mut self, value: bool) {
        self.set_flag(Self::FLAG_BENDING_LINKS, value);
    }

    pub(crate) fn set_randomize_constraints_needed(&mut self, value: bool) {
        self.set_flag(Self::FLAG_RANDOMIZE_CONSTRAINTS, value);
    }

    pub fn get_material_object(&self) -> Option<Rc<RefCell<ModelMaterial>>> {
        self.material.get()
    }

    pub(crate) fn set_material_object(&mut self, value: Option<&Rc<RefCell<ModelMaterial>>>) {
        self.material = ObjectRef::from_object(value);
    }

    pub fn get_all_anchor_objects(&self) -> &[Rc<RefCell<ModelSoftBodyAnchor>>] {
        &self.anchors
    }

    pub fn get_all_pinned_vertex_indices(&self) -> &[u32] {
        &self.pinned_vertex_indices
    }

    pub(crate) fn set_pinned_vertex_indices(&mut self, value: &[u32]) {
        self.pinned_vertex_indices = value.to_vec();
    }

    pub(crate) fn insert_anchor_object(
        &mut self,
        anchor: &Rc<RefCell<ModelSoftBodyAnchor>>,
        index: i32,
    ) -> Result<(), Status> {
        insert_object(
            &mut self.anchors,
            anchor,
            index,
            Status::ErrorModelSoftBodyAnchorAlreadyExists,
        )
    }

    pub(crate) fn remove_anchor_object(
        &mut self,
        anchor: &Rc<RefCell<ModelSoftBodyAnchor>>,
    ) -> Result<(), Status> {
        remove_object(
            &mut self.anchors,
            anchor,
            Status::ErrorModelSoftBodyAnchorNotFound,
        )
    }
}

#[test]
fn test_model_soft_body_flags() {
    let mut soft_body = ModelSoftBody::default();
    soft_body.set_bending_links_enabled(true);
    soft_body.set_randomize_constraints_needed(true);
    assert!(!soft_body.is_cluster_enabled());
    assert!(soft_body.is_bending_links_enabled());
    assert_eq!(0x6, soft_body.flags);
    soft_body.set_bending_links_enabled(false);
    assert_eq!(0x4, soft_body.flags);
}

#[test]
fn test_model_soft_body_anchors() {
    let mut soft_body = ModelSoftBody::default();
    let first = Rc::new(RefCell::new(ModelSoftBodyAnchor::default()));
    let second = Rc::new(RefCell::new(ModelSoftBodyAnchor::default()));
    assert_eq!(Ok(()), soft_body.insert_anchor_object(&first, -1));
    assert_eq!(Ok(()), soft_body.insert_anchor_object(&second, 0));
    assert_eq!(
        Err(Status::ErrorModelSoftBodyAnchorAlreadyExists),
        soft_body.insert_anchor_object(&second, -1)
    );
    assert_eq!(1, first.borrow().base.index);
    assert_eq!(Ok(()), soft_body.remove_anchor_object(&second));
    assert_eq!(
        Err(Status::ErrorModelSoftBodyAnchorNotFound),
        soft_body.remove_anchor_object(&second)
    );
    assert_eq!(0, first.borrow().base.index);
}
