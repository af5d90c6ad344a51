//! Canonical recursive-length-prefix encoding, as used by the remote
//! ledger for receipts, trie nodes and block structures.
//!
//! Encoding is exposed in two layers: byte-string/integer encoding, and
//! list framing over *already encoded* items. The trie needs the second
//! form directly — an inline node reference is a pre-encoded list spliced
//! into its parent without a string header.

use alloy::primitives::U256;

const STRING_OFFSET: u8 = 0x80;
const LIST_OFFSET: u8 = 0xc0;
const SHORT_MAX: usize = 55;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("input truncated: needed {needed} more byte(s)")]
    Truncated { needed: usize },

    #[error("non-minimal encoding: {0}")]
    NonMinimal(&'static str),

    #[error("trailing bytes after item: {0} byte(s)")]
    TrailingBytes(usize),

    #[error("expected a byte string, found a list")]
    ExpectedBytes,

    #[error("expected a list, found a byte string")]
    ExpectedList,

    #[error("field has unexpected length: {got}, wanted {wanted}")]
    FieldLength { got: usize, wanted: usize },

    #[error("integer payload too large for u64")]
    IntegerOverflow,
}

/// A decoded RLP item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            Item::Bytes(b) => Ok(b),
            Item::List(_) => Err(CodecError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[Item], CodecError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(CodecError::ExpectedList),
        }
    }
}

/// Encode a byte string: single bytes below 0x80 stand for themselves,
/// short strings get a one-byte header, long strings a length-of-length
/// header.
pub fn encode_bytes(payload: &[u8]) -> Vec<u8> {
    if payload.len() == 1 && payload[0] < STRING_OFFSET {
        return payload.to_vec();
    }
    let mut out = header(payload.len(), STRING_OFFSET);
    out.extend_from_slice(payload);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string.
/// Zero encodes as the empty string.
pub fn encode_uint(value: u64) -> Vec<u8> {
    encode_bytes(&minimal_be(&value.to_be_bytes()))
}

/// Encode a 256-bit unsigned integer, minimal big-endian.
pub fn encode_u256(value: U256) -> Vec<u8> {
    encode_bytes(&minimal_be(&value.to_be_bytes::<32>()))
}

/// Frame already-encoded items as a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = header(payload_len, LIST_OFFSET);
    out.reserve(payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Re-serialize a decoded item. Canonical: decode-then-encode is identity
/// on well-formed input.
pub fn encode_item(item: &Item) -> Vec<u8> {
    match item {
        Item::Bytes(b) => encode_bytes(b),
        Item::List(items) => {
            let encoded: Vec<Vec<u8>> = items.iter().map(encode_item).collect();
            encode_list(&encoded)
        }
    }
}

/// Decode exactly one item; trailing bytes are an error.
pub fn decode(buf: &[u8]) -> Result<Item, CodecError> {
    let (item, consumed) = decode_item(buf)?;
    if consumed != buf.len() {
        return Err(CodecError::TrailingBytes(buf.len() - consumed));
    }
    Ok(item)
}

/// Decode a byte-string item holding a minimal big-endian integer.
pub fn decode_uint(buf: &[u8]) -> Result<u64, CodecError> {
    let item = decode(buf)?;
    let payload = item.as_bytes()?;
    if payload.len() > 8 {
        return Err(CodecError::IntegerOverflow);
    }
    if payload.first() == Some(&0) {
        return Err(CodecError::NonMinimal("integer has leading zero"));
    }
    let mut value = 0u64;
    for &b in payload {
        value = value << 8 | b as u64;
    }
    Ok(value)
}

fn header(payload_len: usize, offset: u8) -> Vec<u8> {
    if payload_len <= SHORT_MAX {
        vec![offset + payload_len as u8]
    } else {
        let be = minimal_be(&(payload_len as u64).to_be_bytes());
        let mut out = vec![offset + SHORT_MAX as u8 + be.len() as u8];
        out.extend_from_slice(&be);
        out
    }
}

fn minimal_be(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn decode_item(buf: &[u8]) -> Result<(Item, usize), CodecError> {
    let first = *buf.first().ok_or(CodecError::Truncated { needed: 1 })?;

    if first < STRING_OFFSET {
        return Ok((Item::Bytes(vec![first]), 1));
    }

    if first < LIST_OFFSET {
        let (payload, consumed) = decode_payload(buf, STRING_OFFSET)?;
        if payload.len() == 1 && payload[0] < STRING_OFFSET {
            return Err(CodecError::NonMinimal(
                "single byte below 0x80 must encode as itself",
            ));
        }
        return Ok((Item::Bytes(payload.to_vec()), consumed));
    }

    let (payload, consumed) = decode_payload(buf, LIST_OFFSET)?;
    let mut items = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let (item, used) = decode_item(rest)?;
        items.push(item);
        rest = &rest[used..];
    }
    Ok((Item::List(items), consumed))
}

/// Decode a header at `buf[0]` and return the payload slice plus total
/// bytes consumed (header + payload).
fn decode_payload(buf: &[u8], offset: u8) -> Result<(&[u8], usize), CodecError> {
    let first = buf[0];
    let (payload_len, header_len) = if first <= offset + SHORT_MAX as u8 {
        ((first - offset) as usize, 1)
    } else {
        let len_len = (first - offset - SHORT_MAX as u8) as usize;
        if buf.len() < 1 + len_len {
            return Err(CodecError::Truncated {
                needed: 1 + len_len - buf.len(),
            });
        }
        let len_bytes = &buf[1..1 + len_len];
        if len_bytes[0] == 0 {
            return Err(CodecError::NonMinimal("length has leading zero"));
        }
        let mut len = 0usize;
        for &b in len_bytes {
            len = len
                .checked_mul(256)
                .and_then(|l| l.checked_add(b as usize))
                .ok_or(CodecError::IntegerOverflow)?;
        }
        if len <= SHORT_MAX {
            return Err(CodecError::NonMinimal(
                "long form used for short payload",
            ));
        }
        (len, 1 + len_len)
    };

    if buf.len() < header_len + payload_len {
        return Err(CodecError::Truncated {
            needed: header_len + payload_len - buf.len(),
        });
    }
    Ok((&buf[header_len..header_len + payload_len], header_len + payload_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_boundaries() {
        assert_eq!(encode_uint(0), vec![0x80]);
        assert_eq!(encode_uint(127), vec![0x7f]);
        assert_eq!(encode_uint(128), vec![0x81, 0x80]);
        assert_eq!(encode_uint(256), vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn empty_string() {
        assert_eq!(encode_bytes(&[]), vec![0x80]);
        assert_eq!(decode(&[0x80]).unwrap(), Item::Bytes(vec![]));
    }

    #[test]
    fn short_and_long_strings() {
        let short = vec![0xab; 55];
        let encoded = encode_bytes(&short);
        assert_eq!(encoded[0], 0x80 + 55);

        let long = vec![0xcd; 56];
        let encoded = encode_bytes(&long);
        assert_eq!(encoded[0], 0xb7 + 1);
        assert_eq!(encoded[1], 56);

        assert_eq!(decode(&encode_bytes(&long)).unwrap(), Item::Bytes(long));
    }

    #[test]
    fn list_framing() {
        // ["cat", "dog"] from the canonical examples
        let encoded = encode_list(&[encode_bytes(b"cat"), encode_bytes(b"dog")]);
        assert_eq!(
            encoded,
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn nested_list_round_trip() {
        let inner = encode_list(&[encode_uint(1), encode_uint(2)]);
        let outer = encode_list(&[encode_bytes(b"pair"), inner]);
        let decoded = decode(&outer).unwrap();
        let items = decoded.as_list().unwrap();
        assert_eq!(items[0], Item::Bytes(b"pair".to_vec()));
        assert_eq!(
            items[1],
            Item::List(vec![Item::Bytes(vec![1]), Item::Bytes(vec![2])])
        );
        assert_eq!(encode_item(&decoded), outer);
    }

    #[test]
    fn long_list_header() {
        let items: Vec<Vec<u8>> = (0..30).map(|_| encode_bytes(b"xy")).collect();
        let encoded = encode_list(&items);
        assert_eq!(encoded[0], 0xf7 + 1);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.as_list().unwrap().len(), 30);
    }

    #[test]
    fn uint_round_trip() {
        for v in [0u64, 1, 127, 128, 255, 256, 0xffff, u64::MAX] {
            assert_eq!(decode_uint(&encode_uint(v)).unwrap(), v);
        }
    }

    #[test]
    fn u256_matches_u64_for_small_values() {
        assert_eq!(encode_u256(U256::from(128u64)), encode_uint(128));
        assert_eq!(encode_u256(U256::ZERO), encode_uint(0));
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(
            decode(&[0x83, b'c', b'a']),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(decode(&[]), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn rejects_non_minimal_single_byte() {
        // 0x05 must encode as itself, not as 0x81 0x05
        assert!(matches!(
            decode(&[0x81, 0x05]),
            Err(CodecError::NonMinimal(_))
        ));
    }

    #[test]
    fn rejects_non_minimal_length() {
        // long form for a 3-byte payload
        let bad = [0xb8, 0x03, 1, 2, 3];
        assert!(matches!(decode(&bad), Err(CodecError::NonMinimal(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut buf = encode_uint(7);
        buf.push(0x00);
        assert!(matches!(decode(&buf), Err(CodecError::TrailingBytes(1))));
    }

    #[test]
    fn rejects_leading_zero_integer() {
        let padded = encode_bytes(&[0x00, 0x01]);
        assert!(matches!(
            decode_uint(&padded),
            Err(CodecError::NonMinimal(_))
        ));
    }
}
