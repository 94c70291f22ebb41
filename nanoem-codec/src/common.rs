use std::mem::size_of;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Status {
    Unknown = -1, //< Unknown
    Success,
    ErrorMallocFailed,                 //< Failed to allocate memory
    ErrorReallocFailed,                //< Failed to allocate memory
    ErrorNullObject,                   //< Null object is referred
    ErrorBufferEnd,                    //< Buffer is end
    ErrorDecodeUnicodeStringFailed,    //< Failed to decode unicode string
    ErrorEncodeUnicodeStringFailed,    //< Failed to encode unicode string
    ErrorDecodeJisStringFailed,        //< Costum, Failed to decode jis string
    ErrorBufferNotEnd,                 //< Costum, Finish Loading but Buffer is not End
    ErrorInvalidSignature = 100,       //< Invalid signature
    ErrorModelVertexCorrupted,         //< Vertex data is corrupted
    ErrorModelFaceCorrupted,           //< Face (Indices) data is corrupted
    ErrorModelMaterialCorrupted,       //< Material data is corrupted
    ErrorModelBoneCorrupted,           //< Bone data is corrupted
    ErrorModelConstraintCorrupted,     //< IK Constraint data is corrupted
    ErrorModelTextureCorrupted,        //< Texture reference data is corrupted
    ErrorModelMorphCorrupted,          //< Morph data is corrupted
    ErrorModelLabelCorrupted,          //< Label data is corrupted
    ErrorModelRigidBodyCorrupted,      //< Rigid body data is corrupted
    ErrorModelJointCorrupted,          //< Joint data is corrupted
    ErrorPmdEnglishCorrupted,          //< PMD English data is corrupted
    ErrorPmxInfoCorruputed,            //< PMX Metadata is corrupted
    ErrorMotionTargetNameCorrupted,    //< Target model name is corrupted
    ErrorMotionBoneKeyframeCorrupted,  //< The bone keyframe is corrupted
    ErrorMotionCameraKeyframeCorrupted, //< The camera keyframe data is corrupted
    ErrorMotionLightKeyframeCorrupted, //< The light keyframe data is corrupted
    ErrorMotionModelKeyframeCorrupted, //< The model keyframe data is corrupted
    ErrorMotionMorphKeyframeCorrupted, //< The morph keyframe data is corrupted
    ErrorMotionSelfShadowKeyframeCorrupted, //< Self Shadow keyframe data is corrupted
    ErrorModelSoftBodyCorrupted,       //< Soft body data is corrupted
    ErrorMotionBoneKeyframeReference = 200, //< (unused)
    ErrorMotionBoneKeyframeAlreadyExists, //< The bone keyframe already exists
    ErrorMotionBoneKeyframeNotFound,   //< The bone keyframe is not found
    ErrorMotionCameraKeyframeReference, //< (unused)
    ErrorMotionCameraKeyframeAlreadyExists, //< The camera keyframe already exists
    ErrorMotionCameraKeyframeNotFound, //< The camera keyframe is not found
    ErrorMotionLightKeyframeReference, //< (unused)
    ErrorMotionLightKeyframeAlreadyExists, //< The light keyframe already exists
    ErrorMotionLightKeyframeNotFound,  //< The light keyframe is not found
    ErrorMotionModelKeyframeReference, //< (unused)
    ErrorMotionModelKeyframeAlreadyExists, //< The model keyframe already exists
    ErrorMotionModelKeyframeNotFound,  //< The model keyframe is not found
    ErrorMotionMorphKeyframeReference, //< (unused)
    ErrorMotionMorphKeyframeAlreadyExists, //< The morph keyframe already exists
    ErrorMotionMorphKeyframeNotFound,  //< The morph keyframe is not found
    ErrorMotionSelfShadowKeyframeReference, //< (unused)
    ErrorMotionSelfShadowKeyframeAlreadyExists, //< The self shadow keyframe already exists
    ErrorMotionSelfShadowKeyframeNotFound, //< The self shadow keyframe is not found
    ErrorMotionAccessoryKeyframeReference, //< (unused)
    ErrorMotionAccessoryKeyframeAlreadyExists, //< The accessory keyframe already exists
    ErrorMotionAccessoryKeyframeNotFound, //< The accessory keyframe is not found
    ErrorEffectParameterReference,     //< (unused)
    ErrorEffectParameterAlreadyExists, //< The effect parameter keyframe already exists
    ErrorEffectParameterNotFound,      //< The effect parameter keyframe is not found
    ErrorModelConstraintStateReference, //< (unused)
    ErrorModelConstraintStateAlreadyExists, //< IK keyframe already exists
    ErrorModelConstraintStateNotFound, //< IK keyframe not found
    ErrorModelBindingReference,        //< (unused)
    ErrorModelBindingAlreadyExists,    //< Outside parent model keyframe already exists
    ErrorModelBindingNotFound,         //< Outside parent model keyframe is not found
    ErrorModelVertexReference = 300,   //< (unused)
    ErrorModelVertexAlreadyExists,     //< Vertex data already exists
    ErrorModelVertexNotFound,          //< Vertex data is not found
    ErrorModelMaterialReference,       //< (unused)
    ErrorModelMaterialAlreadyExists,   //< Material data already exists
    ErrorModelMaterialNotFound,        //< Material data is not found
    ErrorModelBoneReference,           //< (unused)
    ErrorModelBoneAlreadyExists,       //< Bone data already exists
    ErrorModelBoneNotFound,            //< Bone data is not found
    ErrorModelConstraintReference,     //< (unused)
    ErrorModelConstraintAlreadyExists, //< IK constraint data already exists
    ErrorModelConstraintNotFound,      //< IK constraint data is not found
    ErrorModelConstraintJointNotFound, //< IK constraint joint bone data is not found
    ErrorModelTextureReference,        //< (unused)
    ErrorModelTextureAlreadyExists,    //< Texture reference data already exists
    ErrorModelTextureNotFound,         //< Texture reference data is not found
    ErrorModelMorphReference,          //< (unused)
    ErrorModelMorphAlreadyExists,      //< Morph data already exists
    ErrorModelMorphNotFound,           //< Morph data is not found
    ErrorModelMorphTypeMismatch,       //< Morph type is not matched
    ErrorModelMorphBoneNotFound,       //< Morph bone data is not found
    ErrorModelMorphFlipNotFound,       //< Morph flip data is not found
    ErrorModelMorphGroupNotFound,      //< Morph group data is not found
    ErrorModelMorphImpulseNotFound,    //< Morph impulse data is not found
    ErrorModelMorphMaterialNotFound,   //< Morph material data is not found
    ErrorModelMorphUvNotFound,         //< Morph UV data is not found
    ErrorModelMorphVertexNotFound,     //< Morph vertex data is not found
    ErrorModelLabelReference,          //< (unused)
    ErrorModelLabelAlreadyExists,      //< Label data already exists
    ErrorModelLabelNotFound,           //< Label data is not found
    ErrorModelLabelItemNotFound,       //< Label item data is not found
    ErrorModelRigidBodyReference,      //< (unused)
    ErrorModelRigidBodyAlreadyExists,  //< Rigid body data already exists
    ErrorModelRigidBodyNotFound,       //< Rigid body data is not found
    ErrorModelJointReference,          //< (unused)
    ErrorModelJointAlreadyExists,      //< Joint data already exists
    ErrorModelJointNotFound,           //< Joint data is not found
    ErrorModelSoftBodyReference,       //< (unused)
    ErrorModelSoftBodyAlreadyExists,   //< Soft body data already exists
    ErrorModelSoftBodyNotFound,        //< Soft body data is not found
    ErrorModelSoftBodyAnchorAlreadyExists, //< Soft body anchor data already exists
    ErrorModelSoftBodyAnchorNotFound,  //< Soft body anchor data is not found
    ErrorModelVersionIncompatible = 400, //< Moel version is incompatible
}

impl Status {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Success => "success",
            Status::ErrorMallocFailed | Status::ErrorReallocFailed => "failed to allocate memory",
            Status::ErrorNullObject => "null object is referred",
            Status::ErrorBufferEnd => "buffer is end",
            Status::ErrorDecodeUnicodeStringFailed => "failed to decode unicode string",
            Status::ErrorEncodeUnicodeStringFailed => "failed to encode unicode string",
            Status::ErrorDecodeJisStringFailed => "failed to decode shift_jis string",
            Status::ErrorBufferNotEnd => "loading finished but buffer is not end",
            Status::ErrorInvalidSignature => "invalid signature",
            Status::ErrorModelVertexCorrupted => "vertex data is corrupted",
            Status::ErrorModelFaceCorrupted => "face data is corrupted",
            Status::ErrorModelMaterialCorrupted => "material data is corrupted",
            Status::ErrorModelBoneCorrupted => "bone data is corrupted",
            Status::ErrorModelConstraintCorrupted => "constraint data is corrupted",
            Status::ErrorModelTextureCorrupted => "texture data is corrupted",
            Status::ErrorModelMorphCorrupted => "morph data is corrupted",
            Status::ErrorModelLabelCorrupted => "label data is corrupted",
            Status::ErrorModelRigidBodyCorrupted => "rigid body data is corrupted",
            Status::ErrorModelJointCorrupted => "joint data is corrupted",
            Status::ErrorPmdEnglishCorrupted => "PMD english data is corrupted",
            Status::ErrorPmxInfoCorruputed => "PMX metadata is corrupted",
            Status::ErrorMotionTargetNameCorrupted => "target model name is corrupted",
            Status::ErrorMotionBoneKeyframeCorrupted => "bone keyframe is corrupted",
            Status::ErrorMotionCameraKeyframeCorrupted => "camera keyframe is corrupted",
            Status::ErrorMotionLightKeyframeCorrupted => "light keyframe is corrupted",
            Status::ErrorMotionModelKeyframeCorrupted => "model keyframe is corrupted",
            Status::ErrorMotionMorphKeyframeCorrupted => "morph keyframe is corrupted",
            Status::ErrorMotionSelfShadowKeyframeCorrupted => "self shadow keyframe is corrupted",
            Status::ErrorModelSoftBodyCorrupted => "soft body data is corrupted",
            Status::ErrorMotionBoneKeyframeAlreadyExists => "bone keyframe already exists",
            Status::ErrorMotionBoneKeyframeNotFound => "bone keyframe is not found",
            Status::ErrorMotionCameraKeyframeAlreadyExists => "camera keyframe already exists",
            Status::ErrorMotionCameraKeyframeNotFound => "camera keyframe is not found",
            Status::ErrorMotionLightKeyframeAlreadyExists => "light keyframe already exists",
            Status::ErrorMotionLightKeyframeNotFound => "light keyframe is not found",
            Status::ErrorMotionModelKeyframeAlreadyExists => "model keyframe already exists",
            Status::ErrorMotionModelKeyframeNotFound => "model keyframe is not found",
            Status::ErrorMotionMorphKeyframeAlreadyExists => "morph keyframe already exists",
            Status::ErrorMotionMorphKeyframeNotFound => "morph keyframe is not found",
            Status::ErrorMotionSelfShadowKeyframeAlreadyExists => {
                "self shadow keyframe already exists"
            }
            Status::ErrorMotionSelfShadowKeyframeNotFound => "self shadow keyframe is not found",
            Status::ErrorMotionAccessoryKeyframeAlreadyExists => {
                "accessory keyframe already exists"
            }
            Status::ErrorMotionAccessoryKeyframeNotFound => "accessory keyframe is not found",
            Status::ErrorEffectParameterAlreadyExists => "effect parameter already exists",
            Status::ErrorEffectParameterNotFound => "effect parameter is not found",
            Status::ErrorModelConstraintStateAlreadyExists => "constraint state already exists",
            Status::ErrorModelConstraintStateNotFound => "constraint state is not found",
            Status::ErrorModelBindingAlreadyExists => "outside parent already exists",
            Status::ErrorModelBindingNotFound => "outside parent is not found",
            Status::ErrorModelVertexAlreadyExists => "vertex already exists",
            Status::ErrorModelVertexNotFound => "vertex is not found",
            Status::ErrorModelMaterialAlreadyExists => "material already exists",
            Status::ErrorModelMaterialNotFound => "material is not found",
            Status::ErrorModelBoneAlreadyExists => "bone already exists",
            Status::ErrorModelBoneNotFound => "bone is not found",
            Status::ErrorModelConstraintAlreadyExists => "constraint already exists",
            Status::ErrorModelConstraintNotFound => "constraint is not found",
            Status::ErrorModelConstraintJointNotFound => "constraint joint is not found",
            Status::ErrorModelTextureAlreadyExists => "texture already exists",
            Status::ErrorModelTextureNotFound => "texture is not found",
            Status::ErrorModelMorphAlreadyExists => "morph already exists",
            Status::ErrorModelMorphNotFound => "morph is not found",
            Status::ErrorModelMorphTypeMismatch => "morph type is not matched",
            Status::ErrorModelMorphBoneNotFound => "bone morph is not found",
            Status::ErrorModelMorphFlipNotFound => "flip morph is not found",
            Status::ErrorModelMorphGroupNotFound => "group morph is not found",
            Status::ErrorModelMorphImpulseNotFound => "impulse morph is not found",
            Status::ErrorModelMorphMaterialNotFound => "material morph is not found",
            Status::ErrorModelMorphUvNotFound => "uv morph is not found",
            Status::ErrorModelMorphVertexNotFound => "vertex morph is not found",
            Status::ErrorModelLabelAlreadyExists => "label already exists",
            Status::ErrorModelLabelNotFound => "label is not found",
            Status::ErrorModelLabelItemNotFound => "label item is not found",
            Status::ErrorModelRigidBodyAlreadyExists => "rigid body already exists",
            Status::ErrorModelRigidBodyNotFound => "rigid body is not found",
            Status::ErrorModelJointAlreadyExists => "joint already exists",
            Status::ErrorModelJointNotFound => "joint is not found",
            Status::ErrorModelSoftBodyAlreadyExists => "soft body already exists",
            Status::ErrorModelSoftBodyNotFound => "soft body is not found",
            Status::ErrorModelSoftBodyAnchorAlreadyExists => "soft body anchor already exists",
            Status::ErrorModelSoftBodyAnchorNotFound => "soft body anchor is not found",
            Status::ErrorModelVersionIncompatible => "model version is incompatible",
            Status::ErrorMotionBoneKeyframeReference
            | Status::ErrorMotionCameraKeyframeReference
            | Status::ErrorMotionLightKeyframeReference
            | Status::ErrorMotionModelKeyframeReference
            | Status::ErrorMotionMorphKeyframeReference
            | Status::ErrorMotionSelfShadowKeyframeReference
            | Status::ErrorMotionAccessoryKeyframeReference
            | Status::ErrorEffectParameterReference
            | Status::ErrorModelConstraintStateReference
            | Status::ErrorModelBindingReference
            | Status::ErrorModelVertexReference
            | Status::ErrorModelMaterialReference
            | Status::ErrorModelBoneReference
            | Status::ErrorModelConstraintReference
            | Status::ErrorModelTextureReference
            | Status::ErrorModelMorphReference
            | Status::ErrorModelLabelReference
            | Status::ErrorModelRigidBodyReference
            | Status::ErrorModelJointReference
            | Status::ErrorModelSoftBodyReference => "object is referred",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[nanoem - {}]{}", self.code(), self.reason())
    }
}

impl std::error::Error for Status {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguageType {
    Unknown = -1,
    #[default]
    Japanese,
    English,
}

impl LanguageType {
    pub fn all() -> &'static [LanguageType] {
        &[LanguageType::Japanese, LanguageType::English]
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[repr(align(16))]
pub struct F128(pub [f32; 4]);

impl F128 {
    pub const ZERO: F128 = F128([0f32; 4]);
    pub const UNIT_X: F128 = F128([1f32, 0f32, 0f32, 0f32]);
    pub const UNIT_Z: F128 = F128([0f32, 0f32, 1f32, 0f32]);

    /// Drop the w component, as 3-component fields are stored without it.
    pub fn xyz(self) -> F128 {
        F128([self.0[0], self.0[1], self.0[2], 0f32])
    }
}

impl From<[f32; 4]> for F128 {
    fn from(v: [f32; 4]) -> Self {
        F128(v)
    }
}

#[macro_export]
macro_rules! read_primitive {
    ($typ: ty, $read_typ:ident) => {
        pub fn $read_typ(&mut self) -> Result<$typ, Status> {
            let typ_len = size_of::<$typ>();
            if self.can_read_len(typ_len) {
                let mut bytes = [0u8; size_of::<$typ>()];
                bytes.copy_from_slice(&self.data[self.offset..self.offset + typ_len]);
                self.offset += typ_len;
                Ok(<$typ>::from_le_bytes(bytes))
            } else {
                Err(Status::ErrorBufferEnd)
            }
        }
    };
}

/// Read cursor over an immutable byte snapshot.
///
/// Every read checks the remaining length first; a failed read leaves the
/// cursor where it was.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    offset: usize,
}

impl Buffer {
    pub fn create(data: Vec<u8>) -> Buffer {
        Buffer { data, offset: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn can_read_len(&self, len: usize) -> bool {
        self.len() >= self.offset && self.len() - self.offset >= len
    }

    pub fn is_end(&self) -> bool {
        self.len() <= self.offset
    }

    pub fn skip(&mut self, skip: usize) -> Result<(), Status> {
        if self.can_read_len(skip) {
            self.offset += skip;
            Ok(())
        } else {
            Err(Status::ErrorBufferEnd)
        }
    }

    pub fn seek(&mut self, position: usize) -> Result<(), Status> {
        if position <= self.len() {
            self.offset = position;
            Ok(())
        } else {
            Err(Status::ErrorBufferEnd)
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, Status> {
        if self.can_read_len(1) {
            let result = self.data[self.offset];
            self.offset += 1;
            Ok(result)
        } else {
            Err(Status::ErrorBufferEnd)
        }
    }

    /// Element count prefix. A count that could not possibly fit in the
    /// remaining bytes is reported as buffer end.
    pub fn read_len(&mut self) -> Result<usize, Status> {
        let start = self.offset;
        let len = self.read_u32_little_endian()? as usize;
        if self.can_read_len(len) {
            Ok(len)
        } else {
            self.offset = start;
            Err(Status::ErrorBufferEnd)
        }
    }

    read_primitive!(u16, read_u16_little_endian);
    read_primitive!(i16, read_i16_little_endian);
    read_primitive!(u32, read_u32_little_endian);
    read_primitive!(i32, read_i32_little_endian);
    read_primitive!(f32, read_f32_little_endian);

    pub fn read_clamped_little_endian(&mut self) -> Result<f32, Status> {
        let v = self.read_f32_little_endian()?;
        Ok(v.clamp(0.0f32, 1.0f32))
    }

    fn read_f32_n<const N: usize>(&mut self) -> Result<F128, Status> {
        if !self.can_read_len(N * size_of::<f32>()) {
            return Err(Status::ErrorBufferEnd);
        }
        let mut value = F128::default();
        for i in 0..N {
            value.0[i] = self.read_f32_little_endian()?;
        }
        Ok(value)
    }

    pub fn read_f32_2_little_endian(&mut self) -> Result<F128, Status> {
        self.read_f32_n::<2>()
    }

    pub fn read_f32_3_little_endian(&mut self) -> Result<F128, Status> {
        self.read_f32_n::<3>()
    }

    pub fn read_f32_4_little_endian(&mut self) -> Result<F128, Status> {
        self.read_f32_n::<4>()
    }

    pub fn read_integer(&mut self, size: usize) -> Result<i32, Status> {
        Ok(match size {
            1 => self.read_byte()? as i32,
            2 => self.read_u16_little_endian()? as i32,
            4 => self.read_i32_little_endian()?,
            _ => Err(Status::ErrorBufferEnd)?,
        })
    }

    pub fn read_integer_nullable(&mut self, size: usize) -> Result<i32, Status> {
        let value = self.read_integer(size)?;
        if (size == 2 && value == 0xffff) || (size == 1 && value == 0xff) {
            return Ok(-1);
        }
        Ok(value)
    }

    pub fn read_buffer(&mut self, len: usize) -> Result<&[u8], Status> {
        if self.can_read_len(len) {
            let result = &self.data[self.offset..self.offset + len];
            self.offset += len;
            Ok(result)
        } else {
            Err(Status::ErrorBufferEnd)
        }
    }

    pub fn read_string_from_cp932(&mut self, max_capacity: usize) -> Result<String, Status> {
        if self.can_read_len(max_capacity) {
            let start = self.offset;
            let src = self.read_buffer(max_capacity)?;
            match crate::utils::u8_slice_get_string(src, encoding_rs::SHIFT_JIS) {
                Some(s) => Ok(s),
                None => {
                    self.offset = start;
                    Err(Status::ErrorDecodeJisStringFailed)
                }
            }
        } else {
            Err(Status::ErrorBufferEnd)
        }
    }
}

#[test]
fn test_from_le_to_u16() {
    let data: [u8; 2] = [20, 16];
    assert_eq!(2, size_of::<u16>());
    assert_eq!(
        ((data[1] as u16) << 8) | data[0] as u16,
        u16::from_le_bytes(data)
    );
}

#[test]
fn test_buffer_read_primitive() {
    let mut buffer = Buffer::create(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
    assert_eq!(Ok(1), buffer.read_byte());
    assert_eq!(Ok((3 << 8) | 2), buffer.read_u16_little_endian());
    assert_eq!(
        Ok(i32::from_le_bytes([4, 5, 6, 7])),
        buffer.read_i32_little_endian()
    );
    assert_eq!(7, buffer.offset());
}

#[test]
fn test_buffer_read_past_end_keeps_offset() {
    let mut buffer = Buffer::create(vec![1, 2, 3]);
    assert_eq!(Ok(0x0201), buffer.read_u16_little_endian());
    assert_eq!(Err(Status::ErrorBufferEnd), buffer.read_u32_little_endian());
    assert_eq!(2, buffer.offset());
    assert_eq!(Err(Status::ErrorBufferEnd), buffer.read_f32_3_little_endian());
    assert_eq!(2, buffer.offset());
    assert_eq!(Ok(3), buffer.read_byte());
    assert!(buffer.is_end());
    assert_eq!(Err(Status::ErrorBufferEnd), buffer.read_byte());
    assert_eq!(3, buffer.offset());
}

#[test]
fn test_buffer_read_len_bounded_by_remaining() {
    let mut buffer = Buffer::create(vec![0xff, 0, 0, 0, 1, 2]);
    assert_eq!(Err(Status::ErrorBufferEnd), buffer.read_len());
    assert_eq!(0, buffer.offset());
    let mut buffer = Buffer::create(vec![2, 0, 0, 0, 1, 2]);
    assert_eq!(Ok(2), buffer.read_len());
}

#[test]
fn test_buffer_read_integer_nullable() {
    let mut buffer = Buffer::create(vec![0xff, 0xff, 0xff, 0x7f, 0]);
    assert_eq!(Ok(-1), buffer.read_integer_nullable(1));
    assert_eq!(Ok(-1), buffer.read_integer_nullable(2));
    assert_eq!(Ok(0x7f), buffer.read_integer(2));
}

#[test]
fn test_status_display() {
    assert_eq!(
        "[nanoem - 4]buffer is end",
        format!("{}", Status::ErrorBufferEnd)
    );
    assert_eq!(400, Status::ErrorModelVersionIncompatible.code());
}
