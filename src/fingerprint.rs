// src/fingerprint.rs

//! Content fingerprints for task inputs.
//!
//! A value is walked through its `Serialize` impl and written into a compact,
//! self-describing byte encoding, which is then hashed with BLAKE3:
//!
//! - every item carries a one-byte tag, strings and sequences a length;
//! - all integer widths share one encoding, so `1u8` and `1i64` agree;
//! - floats are written as their `f64` bit pattern, so `NAN`, `INFINITY`
//!   and `NEG_INFINITY` all stay distinct;
//! - map entries (and struct fields) are sorted by their encoded key, so
//!   maps filled in a different order fingerprint the same.
//!
//! Serialization errors raised by a value's own `Serialize` impl surface as
//! [`PipekitError::Fingerprint`](crate::errors::PipekitError::Fingerprint).

use std::fmt;

use serde::Serialize;
use serde::ser::{self, SerializeMap as _};

use crate::errors::Result;

/// BLAKE3 digest of a canonically encoded value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = encode(value)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Fingerprint raw bytes directly.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Fingerprint(blake3::hash(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A value's `Serialize` impl reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintError(String);

impl fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FingerprintError {}

impl ser::Error for FingerprintError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        FingerprintError(msg.to_string())
    }
}

type EncodeResult<T = ()> = std::result::Result<T, FingerprintError>;

mod tag {
    pub const UNIT: u8 = b'z';
    pub const NONE: u8 = b'o';
    pub const SOME: u8 = b'O';
    pub const FALSE: u8 = b'0';
    pub const TRUE: u8 = b'1';
    pub const INT: u8 = b'n';
    pub const BIG_UINT: u8 = b'N';
    pub const FLOAT: u8 = b'f';
    pub const STR: u8 = b's';
    pub const BYTES: u8 = b'b';
    pub const SEQ: u8 = b'[';
    pub const MAP: u8 = b'{';
    pub const VARIANT: u8 = b'v';
}

fn encode<T: Serialize + ?Sized>(value: &T) -> EncodeResult<Vec<u8>> {
    let mut out = Vec::new();
    value.serialize(Encoder { out: &mut out })?;
    Ok(out)
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    out.push(tag);
    put_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

fn put_int(out: &mut Vec<u8>, v: i128) {
    out.push(tag::INT);
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_variant(out: &mut Vec<u8>, variant: &str) {
    out.push(tag::VARIANT);
    put_str(out, tag::STR, variant.as_bytes());
}

struct Encoder<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> ser::Serializer for Encoder<'a> {
    type Ok = ();
    type Error = FingerprintError;
    type SerializeSeq = SeqEncoder<'a>;
    type SerializeTuple = SeqEncoder<'a>;
    type SerializeTupleStruct = SeqEncoder<'a>;
    type SerializeTupleVariant = SeqEncoder<'a>;
    type SerializeMap = MapEncoder<'a>;
    type SerializeStruct = MapEncoder<'a>;
    type SerializeStructVariant = MapEncoder<'a>;

    fn serialize_bool(self, v: bool) -> EncodeResult {
        self.out.push(if v { tag::TRUE } else { tag::FALSE });
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_i16(self, v: i16) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_i32(self, v: i32) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_i64(self, v: i64) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_i128(self, v: i128) -> EncodeResult {
        put_int(self.out, v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_u16(self, v: u16) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_u32(self, v: u32) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_u64(self, v: u64) -> EncodeResult {
        self.serialize_i128(v.into())
    }

    fn serialize_u128(self, v: u128) -> EncodeResult {
        match i128::try_from(v) {
            Ok(v) => put_int(self.out, v),
            Err(_) => {
                self.out.push(tag::BIG_UINT);
                self.out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> EncodeResult {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> EncodeResult {
        self.out.push(tag::FLOAT);
        self.out.extend_from_slice(&v.to_bits().to_le_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> EncodeResult {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> EncodeResult {
        put_str(self.out, tag::STR, v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> EncodeResult {
        put_str(self.out, tag::BYTES, v);
        Ok(())
    }

    fn serialize_none(self) -> EncodeResult {
        self.out.push(tag::NONE);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> EncodeResult {
        self.out.push(tag::SOME);
        value.serialize(self)
    }

    fn serialize_unit(self) -> EncodeResult {
        self.out.push(tag::UNIT);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> EncodeResult {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> EncodeResult {
        put_variant(self.out, variant);
        self.out.push(tag::UNIT);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> EncodeResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> EncodeResult {
        put_variant(self.out, variant);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> EncodeResult<SeqEncoder<'a>> {
        Ok(SeqEncoder::new(self.out, None))
    }

    fn serialize_tuple(self, _len: usize) -> EncodeResult<SeqEncoder<'a>> {
        Ok(SeqEncoder::new(self.out, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> EncodeResult<SeqEncoder<'a>> {
        Ok(SeqEncoder::new(self.out, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> EncodeResult<SeqEncoder<'a>> {
        Ok(SeqEncoder::new(self.out, Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> EncodeResult<MapEncoder<'a>> {
        Ok(MapEncoder::new(self.out, None))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> EncodeResult<MapEncoder<'a>> {
        Ok(MapEncoder::new(self.out, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> EncodeResult<MapEncoder<'a>> {
        Ok(MapEncoder::new(self.out, Some(variant)))
    }
}

/// Sequences and tuples: elements in order, prefixed by their count.
struct SeqEncoder<'a> {
    out: &'a mut Vec<u8>,
    variant: Option<&'static str>,
    count: usize,
    body: Vec<u8>,
}

impl<'a> SeqEncoder<'a> {
    fn new(out: &'a mut Vec<u8>, variant: Option<&'static str>) -> Self {
        Self {
            out,
            variant,
            count: 0,
            body: Vec::new(),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        value.serialize(Encoder {
            out: &mut self.body,
        })?;
        self.count += 1;
        Ok(())
    }

    fn finish(self) -> EncodeResult {
        if let Some(variant) = self.variant {
            put_variant(self.out, variant);
        }
        self.out.push(tag::SEQ);
        put_len(self.out, self.count);
        self.out.extend_from_slice(&self.body);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        self.push(value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        self.push(value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        self.push(value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        self.push(value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

/// Maps and structs: entries sorted by encoded key.
struct MapEncoder<'a> {
    out: &'a mut Vec<u8>,
    variant: Option<&'static str>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl<'a> MapEncoder<'a> {
    fn new(out: &'a mut Vec<u8>, variant: Option<&'static str>) -> Self {
        Self {
            out,
            variant,
            entries: Vec::new(),
            pending_key: None,
        }
    }

    fn finish(mut self) -> EncodeResult {
        if self.pending_key.is_some() {
            return Err(FingerprintError("map key without a value".to_string()));
        }
        self.entries.sort();
        if let Some(variant) = self.variant {
            put_variant(self.out, variant);
        }
        self.out.push(tag::MAP);
        put_len(self.out, self.entries.len());
        for (key, value) in &self.entries {
            self.out.extend_from_slice(key);
            self.out.extend_from_slice(value);
        }
        Ok(())
    }
}

impl ser::SerializeMap for MapEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> EncodeResult {
        self.pending_key = Some(encode(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodeResult {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| FingerprintError("map value without a key".to_string()))?;
        self.entries.push((key, encode(value)?));
        Ok(())
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

impl ser::SerializeStruct for MapEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> EncodeResult {
        self.serialize_entry(key, value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}

impl ser::SerializeStructVariant for MapEncoder<'_> {
    type Ok = ();
    type Error = FingerprintError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> EncodeResult {
        self.serialize_entry(key, value)
    }

    fn end(self) -> EncodeResult {
        self.finish()
    }
}
