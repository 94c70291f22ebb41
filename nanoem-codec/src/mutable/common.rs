use crate::{
    common::{Buffer, Status, F128},
    utils::{encode_fixed_sjis, CodecType},
};

#[macro_export]
macro_rules! write_primitive {
    ($typ: ty, $write_typ:ident) => {
        pub fn $write_typ(&mut self, value: $typ) -> Result<(), Status> {
            self.write_byte_array(&value.to_le_bytes())
        }
    };
}

/// Append-only byte sink; [`MutableBuffer::create_buffer_object`] freezes a
/// copy of everything written so far.
#[derive(Debug, Clone, Default)]
pub struct MutableBuffer {
    data: Vec<u8>,
}

impl MutableBuffer {
    pub fn create() -> Result<MutableBuffer, Status> {
        Self::create_with_reserved_size(2 << 12)
    }

    pub fn create_with_reserved_size(capacity: usize) -> Result<MutableBuffer, Status> {
        let mut buffer = MutableBuffer { data: Vec::new() };
        buffer.ensure_size(capacity)?;
        Ok(buffer)
    }

    fn ensure_size(&mut self, required: usize) -> Result<(), Status> {
        self.data
            .try_reserve(required)
            .map_err(|_| Status::ErrorReallocFailed)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_byte_array(&mut self, data: &[u8]) -> Result<(), Status> {
        self.ensure_size(data.len())?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), Status> {
        self.write_byte_array(&[value])
    }

    write_primitive!(u16, write_u16_little_endian);
    write_primitive!(i16, write_i16_little_endian);
    write_primitive!(u32, write_u32_little_endian);
    write_primitive!(i32, write_i32_little_endian);
    write_primitive!(f32, write_f32_little_endian);

    /// Length-prefixed string in the given codec.
    pub fn write_string(&mut self, value: &str, codec_type: CodecType) -> Result<(), Status> {
        let bytes = codec_type.encode(value)?;
        self.write_u32_little_endian(bytes.len() as u32)?;
        self.write_byte_array(&bytes)
    }

    /// Fixed-width Shift_JIS field, truncated and NUL-padded to `capacity`.
    pub fn write_fixed_string(&mut self, value: &str, capacity: usize) -> Result<(), Status> {
        let bytes = encode_fixed_sjis(value, capacity)?;
        self.write_byte_array(&bytes)
    }

    pub fn write_integer(&mut self, value: i32, size: usize) -> Result<(), Status> {
        match size {
            1 => self.write_byte(value as u8),
            2 => self.write_u16_little_endian(value as u16),
            _ => self.write_i32_little_endian(value),
        }
    }

    pub fn write_f32_2_little_endian(&mut self, value: F128) -> Result<(), Status> {
        self.write_f32_little_endian(value.0[0])?;
        self.write_f32_little_endian(value.0[1])
    }

    pub fn write_f32_3_little_endian(&mut self, value: F128) -> Result<(), Status> {
        self.write_f32_2_little_endian(value)?;
        self.write_f32_little_endian(value.0[2])
    }

    pub fn write_f32_4_little_endian(&mut self, value: F128) -> Result<(), Status> {
        self.write_f32_3_little_endian(value)?;
        self.write_f32_little_endian(value.0[3])
    }

    pub fn create_buffer_object(&self) -> Result<Buffer, Status> {
        Ok(Buffer::create(self.data.clone()))
    }
}

#[test]
fn test_write_then_read_exact_widths() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_byte(i8::MAX as u8)?;
    mutable_buffer.write_i16_little_endian(i16::MAX)?;
    mutable_buffer.write_u16_little_endian(u16::MAX)?;
    mutable_buffer.write_i32_little_endian(i32::MAX)?;
    mutable_buffer.write_f32_little_endian(f32::MAX)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    assert_eq!(13, buffer.len());
    assert_eq!(Ok(i8::MAX as u8), buffer.read_byte());
    assert_eq!(1, buffer.offset());
    assert_eq!(Ok(i16::MAX), buffer.read_i16_little_endian());
    assert_eq!(3, buffer.offset());
    assert_eq!(Ok(u16::MAX), buffer.read_u16_little_endian());
    assert_eq!(5, buffer.offset());
    assert_eq!(Ok(i32::MAX), buffer.read_i32_little_endian());
    assert_eq!(9, buffer.offset());
    assert_eq!(Ok(f32::MAX), buffer.read_f32_little_endian());
    assert_eq!(13, buffer.offset());
    assert_eq!(Err(Status::ErrorBufferEnd), buffer.read_byte());
    assert_eq!(13, buffer.offset());
    Ok(())
}

#[test]
fn test_frozen_buffer_is_a_snapshot() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_u32_little_endian(42)?;
    let mut frozen = mutable_buffer.create_buffer_object()?;
    mutable_buffer.write_u32_little_endian(43)?;
    assert_eq!(4, frozen.len());
    assert_eq!(Ok(42), frozen.read_u32_little_endian());
    assert!(frozen.is_end());
    assert_eq!(8, mutable_buffer.create_buffer_object()?.len());
    Ok(())
}

#[test]
fn test_write_integer_nullable_widths() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_integer(-1, 1)?;
    mutable_buffer.write_integer(-1, 2)?;
    mutable_buffer.write_integer(-1, 4)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    assert_eq!(Ok(-1), buffer.read_integer_nullable(1));
    assert_eq!(Ok(-1), buffer.read_integer_nullable(2));
    assert_eq!(Ok(-1), buffer.read_integer_nullable(4));
    Ok(())
}

#[test]
fn test_write_string_length_prefix() -> Result<(), Status> {
    let mut mutable_buffer = MutableBuffer::create()?;
    mutable_buffer.write_string("ab", CodecType::Utf16)?;
    let mut buffer = mutable_buffer.create_buffer_object()?;
    assert_eq!(Ok(4), buffer.read_len());
    assert_eq!(Ok(&[b'a', 0, b'b', 0][..]), buffer.read_buffer(4));
    Ok(())
}
