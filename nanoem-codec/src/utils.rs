use std::cmp;

use crate::common::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecType {
    Unknown = -1,
    Sjis,
    #[default]
    Utf8,
    Utf16,
}

impl From<i32> for CodecType {
    fn from(value: i32) -> Self {
        match value {
            0 => CodecType::Sjis,
            1 => CodecType::Utf8,
            2 => CodecType::Utf16,
            _ => CodecType::Unknown,
        }
    }
}

impl CodecType {
    pub fn get_encoding_object(&self) -> &'static encoding_rs::Encoding {
        match self {
            CodecType::Sjis => encoding_rs::SHIFT_JIS,
            CodecType::Utf16 => encoding_rs::UTF_16LE,
            CodecType::Utf8 | CodecType::Unknown => encoding_rs::UTF_8,
        }
    }

    pub fn decode(&self, src: &[u8]) -> Result<String, Status> {
        let (cow, had_errors) = self.get_encoding_object().decode_without_bom_handling(src);
        if had_errors {
            Err(Status::ErrorDecodeUnicodeStringFailed)
        } else {
            Ok(cow.into())
        }
    }

    /// `encoding_rs` never encodes into UTF-16, so that case is done by hand.
    pub fn encode(&self, value: &str) -> Result<Vec<u8>, Status> {
        match self {
            CodecType::Utf16 => Ok(value
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
            _ => {
                let (bytes, _, had_errors) = self.get_encoding_object().encode(value);
                if had_errors {
                    Err(Status::ErrorEncodeUnicodeStringFailed)
                } else {
                    Ok(bytes.into_owned())
                }
            }
        }
    }
}

pub fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_le_bytes([a, b, c, d])
}

pub fn u8_slice_get_string(
    slice: &[u8],
    encoding: &'static encoding_rs::Encoding,
) -> Option<String> {
    let mut src = slice;
    if let Some(pos) = src.iter().position(|c| *c == 0u8) {
        src = src.split_at(pos).0;
    }
    let (cow, had_errors) = encoding.decode_without_bom_handling(src);
    if had_errors {
        None
    } else {
        Some(cow.into())
    }
}

/// Shift_JIS bytes of `value` cut to at most `capacity` bytes without
/// splitting a character, then NUL-padded to exactly `capacity`.
pub fn encode_fixed_sjis(value: &str, capacity: usize) -> Result<Vec<u8>, Status> {
    let mut bytes = Vec::with_capacity(capacity);
    let mut truncated = false;
    let mut char_buffer = [0u8; 4];
    for c in value.chars() {
        let (encoded, _, had_errors) =
            encoding_rs::SHIFT_JIS.encode(c.encode_utf8(&mut char_buffer));
        if had_errors {
            return Err(Status::ErrorEncodeUnicodeStringFailed);
        }
        if bytes.len() + encoded.len() > capacity {
            truncated = true;
            break;
        }
        bytes.extend_from_slice(&encoded);
    }
    if truncated {
        log::warn!("truncating {:?} to {} bytes", value, capacity);
    }
    bytes.resize(capacity, 0u8);
    Ok(bytes)
}

pub fn compare(a: &[u8], b: &[u8]) -> cmp::Ordering {
    for (ai, bi) in a.iter().zip(b.iter()) {
        match ai.cmp(bi) {
            cmp::Ordering::Equal => continue,
            ord => return ord,
        }
    }

    /* if every single element was equal, compare length */
    a.len().cmp(&b.len())
}

#[test]
fn test_fourcc() {
    assert_eq!(1u32, fourcc(1u8, 0u8, 0u8, 0u8));
}

#[test]
fn test_encode_fixed_sjis_truncates() {
    assert_eq!(
        b"0123456789012345678\0".to_vec(),
        encode_fixed_sjis("0123456789012345678", 20).unwrap()
    );
    assert_eq!(
        b"01234567890123456789".to_vec(),
        encode_fixed_sjis("012345678901234567890", 20).unwrap()
    );
    // "あ" is two bytes in Shift_JIS and must not be split
    let bytes = encode_fixed_sjis("aあ", 2).unwrap();
    assert_eq!(vec![b'a', 0u8], bytes);
}

#[test]
fn test_codec_round_trip() {
    for codec in [CodecType::Utf8, CodecType::Utf16, CodecType::Sjis] {
        let bytes = codec.encode("ボーン").unwrap();
        assert_eq!("ボーン", codec.decode(&bytes).unwrap());
    }
    assert_eq!(4, CodecType::Utf16.encode("ab").unwrap().len());
}

#[test]
fn test_u8_slice_get_string_stops_at_nul() {
    assert_eq!(
        Some("ab".to_owned()),
        u8_slice_get_string(b"ab\0cd", encoding_rs::SHIFT_JIS)
    );
}
