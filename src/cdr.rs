//! The encoding engine: cursor, alignment, primitives and containers.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::buffer::CdrBuffer;
use crate::encapsulation::{
    from_representation_id, representation_id, CdrVersion, EncodingAlgorithm, Endianness,
};
use crate::error::{Error, Result};
use crate::long_double::LongDouble;
use crate::member::MustUnderstandPolicy;
use crate::serializable::CdrSerializable;
use crate::state::State;

/// A CDR encoder/decoder working on top of a [`CdrBuffer`].
///
/// The same instance serializes and deserializes; [`Cdr::reset`] rewinds the
/// cursor so the bytes just written can be read back. Alignment is measured
/// from an origin that moves to the start of the payload after the
/// encapsulation and to the start of every framed member or aggregate.
pub struct Cdr<'a> {
    pub(crate) buffer: CdrBuffer<'a>,
    pub(crate) version: CdrVersion,
    pub(crate) endianness: Endianness,
    initial_endianness: Endianness,
    pub(crate) encoding: EncodingAlgorithm,
    options: [u8; 2],
    pub(crate) offset: usize,
    pub(crate) origin: usize,
    encapsulation_at: Option<usize>,
    /// Where the length word of the last thing written starts, when that
    /// word counts the bytes after it.
    pub(crate) prefixed_at: Option<usize>,
    pub(crate) must_understand_policy: MustUnderstandPolicy,
}

macro_rules! impl_primitive {
    ($(#[$doc:meta] $ser:ident, $de:ident, $ty:ty, $size:expr, $write:ident, $read:ident;)*) => {
        $(
            #[$doc]
            pub fn $ser(&mut self, v: $ty) -> Result<()> {
                let mut buf = [0u8; $size];
                match self.endianness {
                    Endianness::Big => BigEndian::$write(&mut buf, v),
                    Endianness::Little => LittleEndian::$write(&mut buf, v),
                }
                self.write_aligned(&buf, $size)
            }

            pub fn $de(&mut self) -> Result<$ty> {
                let endianness = self.endianness;
                let bytes = self.take($size, $size)?;
                Ok(match endianness {
                    Endianness::Big => BigEndian::$read(bytes),
                    Endianness::Little => LittleEndian::$read(bytes),
                })
            }
        )*
    };
}

impl<'a> Cdr<'a> {
    pub fn new(buffer: CdrBuffer<'a>, endianness: Endianness, version: CdrVersion) -> Self {
        Self {
            buffer,
            version,
            endianness,
            initial_endianness: endianness,
            encoding: version.default_encoding(),
            options: [0; 2],
            offset: 0,
            origin: 0,
            encapsulation_at: None,
            prefixed_at: None,
            must_understand_policy: MustUnderstandPolicy::default(),
        }
    }

    /// A decoder over `bytes`; the byte order is taken from the encapsulation.
    pub fn from_bytes(bytes: &'a [u8], version: CdrVersion) -> Self {
        Self::new(CdrBuffer::from_bytes(bytes), Endianness::native(), version)
    }

    pub fn cdr_version(&self) -> CdrVersion {
        self.version
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Encoding of the aggregate being processed.
    pub fn encoding_flag(&self) -> EncodingAlgorithm {
        self.encoding
    }

    /// Selects the encoding of the top-level aggregate.
    pub fn set_encoding_flag(&mut self, encoding: EncodingAlgorithm) -> Result<()> {
        if !self.version.supports(encoding) {
            return Err(Error::bad_param(format!(
                "{:?} cannot be used by a {:?} codec",
                encoding, self.version
            )));
        }
        self.encoding = encoding;
        Ok(())
    }

    pub fn must_understand_policy(&self) -> MustUnderstandPolicy {
        self.must_understand_policy
    }

    pub fn set_must_understand_policy(&mut self, policy: MustUnderstandPolicy) {
        self.must_understand_policy = policy;
    }

    pub fn dds_cdr_options(&self) -> [u8; 2] {
        self.options
    }

    /// Stores the encapsulation options and patches them into an already
    /// written encapsulation.
    ///
    /// The two low bits of the second byte are replaced by the number of
    /// padding bytes the payload needs to reach a multiple of four.
    pub fn set_dds_cdr_options(&mut self, options: [u8; 2]) -> Result<()> {
        self.options = options;
        if let Some(at) = self.encapsulation_at {
            if self.offset >= at + 4 {
                let payload = self.offset - (at + 4);
                let padding = ((4 - payload % 4) % 4) as u8;
                self.buffer
                    .write_at(at + 2, &[options[0], (options[1] & !0x03) | padding])?;
            }
        }
        Ok(())
    }

    /// Writes the encapsulation header and moves the alignment origin after it.
    pub fn serialize_encapsulation(&mut self) -> Result<()> {
        match self.version {
            CdrVersion::CorbaCdr => {
                let flag = match self.endianness {
                    Endianness::Big => 0,
                    Endianness::Little => 1,
                };
                self.serialize_u8(flag)?;
            }
            CdrVersion::XCdrV1 | CdrVersion::XCdrV2 => {
                let at = self.offset;
                let header = [
                    0,
                    representation_id(self.encoding, self.endianness),
                    self.options[0],
                    self.options[1],
                ];
                self.buffer.write_at(at, &header)?;
                self.offset = at + header.len();
                self.encapsulation_at = Some(at);
            }
        }
        self.reset_alignment();
        Ok(())
    }

    /// Reads the encapsulation header, adopting its byte order, encoding and options.
    pub fn read_encapsulation(&mut self) -> Result<()> {
        let result = self.rollback_on_error(Self::read_encapsulation_inner);
        if let Err(ref e) = result {
            log::debug!("rejecting encapsulation: {}", e);
        }
        result
    }

    fn read_encapsulation_inner(&mut self) -> Result<()> {
        match self.version {
            CdrVersion::CorbaCdr => {
                self.endianness = match self.deserialize_u8()? {
                    0 => Endianness::Big,
                    1 => Endianness::Little,
                    _ => return Err(Error::InvalidEncapsulation),
                };
            }
            CdrVersion::XCdrV1 | CdrVersion::XCdrV2 => {
                let mut header = [0u8; 4];
                header.copy_from_slice(self.take(4, 1)?);
                if header[0] != 0 {
                    return Err(Error::InvalidEncapsulation);
                }
                let (encoding, endianness) = from_representation_id(header[1])?;
                if !self.version.supports(encoding) {
                    return Err(Error::bad_param(format!(
                        "{:?} stream cannot be read by a {:?} codec",
                        encoding, self.version
                    )));
                }
                self.encoding = encoding;
                self.endianness = endianness;
                self.options = [header[2], header[3]];
            }
        }
        self.reset_alignment();
        Ok(())
    }

    /// Snapshot of the cursor.
    pub fn state(&self) -> State {
        State {
            offset: self.offset,
            origin: self.origin,
            endianness: self.endianness,
            encoding: self.encoding,
        }
    }

    /// Moves the cursor back to a snapshot.
    pub fn set_state(&mut self, state: &State) {
        self.offset = state.offset;
        self.origin = state.origin;
        self.endianness = state.endianness;
        self.encoding = state.encoding;
        self.prefixed_at = None;
    }

    /// Rewinds to the beginning of the buffer, forgetting the encapsulation.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.origin = 0;
        self.endianness = self.initial_endianness;
        self.encoding = self.version.default_encoding();
        self.options = [0; 2];
        self.encapsulation_at = None;
        self.prefixed_at = None;
    }

    /// Measures the following alignment from the current position.
    pub fn reset_alignment(&mut self) {
        self.origin = self.offset;
    }

    /// Skips `n` bytes.
    pub fn jump(&mut self, n: usize) -> Result<()> {
        let end = self.offset.checked_add(n).ok_or(Error::NumberOutOfRange)?;
        if end > self.buffer.as_slice().len() {
            self.buffer.ensure(end)?;
        }
        self.offset = end;
        self.prefixed_at = None;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    /// Number of bytes from the start of the buffer to the cursor.
    pub fn serialized_data_length(&self) -> usize {
        self.offset
    }

    /// Bytes from the start of the buffer to the cursor.
    pub fn serialized_data(&self) -> &[u8] {
        let data = self.buffer.as_slice();
        &data[..self.offset.min(data.len())]
    }

    pub fn buffer(&self) -> &CdrBuffer<'a> {
        &self.buffer
    }

    pub fn into_buffer(self) -> CdrBuffer<'a> {
        self.buffer
    }

    /// Padding needed before a value of `data_size` bytes.
    pub(crate) fn alignment(&self, data_size: usize) -> usize {
        let size = data_size.min(self.version.max_alignment());
        if size <= 1 {
            return 0;
        }
        (size - (self.offset - self.origin) % size) & (size - 1)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buffer.as_slice().len().saturating_sub(self.offset)
    }

    /// Zero pads to `align` and writes `bytes`; nothing is written when they do not fit.
    pub(crate) fn write_aligned(&mut self, bytes: &[u8], align: usize) -> Result<()> {
        let pad = self.alignment(align);
        let start = self.offset + pad;
        self.buffer.ensure(start + bytes.len())?;
        self.buffer.zero_at(self.offset, pad)?;
        self.buffer.write_at(start, bytes)?;
        self.offset = start + bytes.len();
        self.prefixed_at = None;
        Ok(())
    }

    /// Skips the padding to `align` and borrows the next `size` bytes.
    pub(crate) fn take(&mut self, size: usize, align: usize) -> Result<&[u8]> {
        let start = self.offset + self.alignment(align);
        let available = self.buffer.as_slice().len();
        let end = match start.checked_add(size) {
            Some(end) if end <= available => end,
            _ => {
                return Err(Error::NotEnoughMemory {
                    needed: start.saturating_add(size),
                    available,
                })
            }
        };
        self.offset = end;
        Ok(&self.buffer.as_slice()[start..end])
    }

    /// Fails unless `len` more bytes (after aligning to `align`) can be read.
    pub(crate) fn check_readable(&self, len: usize, align: usize) -> Result<()> {
        let needed = (self.offset + self.alignment(align)).saturating_add(len);
        let available = self.buffer.as_slice().len();
        if needed > available {
            return Err(Error::NotEnoughMemory { needed, available });
        }
        Ok(())
    }

    /// Fails unless `len` more bytes (after aligning to `align`) can be written.
    pub(crate) fn reserve_write(&mut self, len: usize, align: usize) -> Result<()> {
        let end = (self.offset + self.alignment(align))
            .checked_add(len)
            .ok_or(Error::NumberOutOfRange)?;
        self.buffer.ensure(end)
    }

    /// Writes zero padding up to `align`.
    pub(crate) fn align_to(&mut self, align: usize) -> Result<()> {
        self.write_aligned(&[], align)
    }

    pub(crate) fn write_u16_at(&mut self, at: usize, v: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        match self.endianness {
            Endianness::Big => BigEndian::write_u16(&mut buf, v),
            Endianness::Little => LittleEndian::write_u16(&mut buf, v),
        }
        self.buffer.write_at(at, &buf)
    }

    pub(crate) fn write_u32_at(&mut self, at: usize, v: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        match self.endianness {
            Endianness::Big => BigEndian::write_u32(&mut buf, v),
            Endianness::Little => LittleEndian::write_u32(&mut buf, v),
        }
        self.buffer.write_at(at, &buf)
    }

    pub(crate) fn read_u32_at(&self, at: usize) -> Result<u32> {
        let bytes = self.buffer.read_at(at, 4)?;
        Ok(match self.endianness {
            Endianness::Big => BigEndian::read_u32(bytes),
            Endianness::Little => LittleEndian::read_u32(bytes),
        })
    }

    pub fn serialize_u8(&mut self, v: u8) -> Result<()> {
        self.write_aligned(&[v], 1)
    }

    pub fn deserialize_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, 1)?[0])
    }

    pub fn serialize_i8(&mut self, v: i8) -> Result<()> {
        self.write_aligned(&[v as u8], 1)
    }

    pub fn deserialize_i8(&mut self) -> Result<i8> {
        Ok(self.take(1, 1)?[0] as i8)
    }

    impl_primitive! {
        /// Serializes an unsigned short.
        serialize_u16, deserialize_u16, u16, 2, write_u16, read_u16;
        /// Serializes a short.
        serialize_i16, deserialize_i16, i16, 2, write_i16, read_i16;
        /// Serializes an unsigned long.
        serialize_u32, deserialize_u32, u32, 4, write_u32, read_u32;
        /// Serializes a long.
        serialize_i32, deserialize_i32, i32, 4, write_i32, read_i32;
        /// Serializes an unsigned long long.
        serialize_u64, deserialize_u64, u64, 8, write_u64, read_u64;
        /// Serializes a long long.
        serialize_i64, deserialize_i64, i64, 8, write_i64, read_i64;
        /// Serializes a float.
        serialize_f32, deserialize_f32, f32, 4, write_f32, read_f32;
        /// Serializes a double.
        serialize_f64, deserialize_f64, f64, 8, write_f64, read_f64;
    }

    pub fn serialize_bool(&mut self, v: bool) -> Result<()> {
        self.serialize_u8(u8::from(v))
    }

    /// Reads a boolean; only 0 and 1 are accepted.
    pub fn deserialize_bool(&mut self) -> Result<bool> {
        match self.deserialize_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(Error::InvalidBoolEncoding(v)),
        }
    }

    /// Serializes an IDL `char`, a single Latin-1 byte.
    pub fn serialize_char(&mut self, v: char) -> Result<()> {
        let byte = u8::try_from(u32::from(v)).map_err(|_| Error::InvalidChar(v))?;
        self.serialize_u8(byte)
    }

    pub fn deserialize_char(&mut self) -> Result<char> {
        self.deserialize_u8().map(char::from)
    }

    /// Serializes an IDL `wchar`, a single UTF-16 code unit.
    pub fn serialize_wchar(&mut self, v: char) -> Result<()> {
        let mut units = [0u16; 2];
        match v.encode_utf16(&mut units) {
            [unit] => self.serialize_u16(*unit),
            _ => Err(Error::InvalidChar(v)),
        }
    }

    pub fn deserialize_wchar(&mut self) -> Result<char> {
        let unit = self.deserialize_u16()?;
        char::from_u32(u32::from(unit)).ok_or(Error::InvalidUtf16Encoding)
    }

    /// Serializes an IDL `long double` in its 16-byte binary128 form.
    pub fn serialize_long_double(&mut self, v: LongDouble) -> Result<()> {
        let mut buf = [0u8; 16];
        match self.endianness {
            Endianness::Big => BigEndian::write_u128(&mut buf, v.to_bits()),
            Endianness::Little => LittleEndian::write_u128(&mut buf, v.to_bits()),
        }
        self.write_aligned(&buf, 8)
    }

    pub fn deserialize_long_double(&mut self) -> Result<LongDouble> {
        let endianness = self.endianness;
        let bytes = self.take(16, 8)?;
        Ok(LongDouble::from_bits(match endianness {
            Endianness::Big => BigEndian::read_u128(bytes),
            Endianness::Little => LittleEndian::read_u128(bytes),
        }))
    }

    /// Serializes a string as its length including the NUL, the bytes and the NUL.
    ///
    /// An empty string is a zero length with nothing after it.
    pub fn serialize_string(&mut self, v: &str) -> Result<()> {
        self.serialize_string_bytes(v.as_bytes())
    }

    pub fn deserialize_string(&mut self) -> Result<String> {
        let bytes = self.deserialize_string_bytes()?.to_vec();
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8Encoding)
    }

    /// Serializes a C string with the same layout as [`Cdr::serialize_string`].
    pub fn serialize_cstr(&mut self, v: &CStr) -> Result<()> {
        self.serialize_string_bytes(v.to_bytes())
    }

    /// Reads a string into an owned C string.
    pub fn deserialize_cstring(&mut self) -> Result<CString> {
        let bytes = self.deserialize_string_bytes()?.to_vec();
        CString::new(bytes).map_err(|_| Error::bad_param("string contains an interior NUL"))
    }

    fn serialize_string_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len = if bytes.is_empty() { 0 } else { bytes.len() + 1 };
        let wire_len = u32::try_from(len).map_err(|_| Error::NumberOutOfRange)?;
        self.reserve_write(4 + len, 4)?;
        self.serialize_u32(wire_len)?;
        let at = self.offset - 4;
        if len > 0 {
            self.buffer.write_at(self.offset, bytes)?;
            self.buffer.write_at(self.offset + bytes.len(), &[0])?;
            self.offset += len;
        }
        self.prefixed_at = Some(at);
        Ok(())
    }

    /// Borrows the bytes of a string without its terminating NUL.
    pub(crate) fn deserialize_string_bytes(&mut self) -> Result<&[u8]> {
        let state = self.state();
        let len = self.deserialize_u32()? as usize;
        if let Err(e) = self.check_readable(len, 1) {
            self.set_state(&state);
            return Err(e);
        }
        let bytes = self.take(len, 1)?;
        Ok(match bytes.split_last() {
            Some((0, rest)) => rest,
            _ => bytes,
        })
    }

    /// Serializes a wide string as its count of UTF-16 code units and the units.
    pub fn serialize_wstring(&mut self, v: &str) -> Result<()> {
        let units: Vec<u16> = v.encode_utf16().collect();
        let count = u32::try_from(units.len()).map_err(|_| Error::NumberOutOfRange)?;
        self.reserve_write(4 + 2 * units.len(), 4)?;
        self.serialize_u32(count)?;
        for unit in units {
            self.serialize_u16(unit)?;
        }
        Ok(())
    }

    pub fn deserialize_wstring(&mut self) -> Result<String> {
        let state = self.state();
        let count = self.deserialize_u32()? as usize;
        if let Err(e) = self.check_readable(count.saturating_mul(2), 2) {
            self.set_state(&state);
            return Err(e);
        }
        let units = (0..count)
            .map(|_| self.deserialize_u16())
            .collect::<Result<Vec<_>>>()?;
        String::from_utf16(&units).map_err(|_| Error::InvalidUtf16Encoding)
    }

    /// Writes raw octets.
    pub fn serialize_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_aligned(v, 1)
    }

    /// Reads raw octets into `out`.
    pub fn deserialize_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        let bytes = self.take(out.len(), 1)?;
        out.copy_from_slice(bytes);
        Ok(())
    }

    /// Serializes any value implementing [`CdrSerializable`].
    pub fn serialize<T>(&mut self, value: &T) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        value.serialize(self)
    }

    /// Deserializes into an existing value.
    pub fn deserialize<T>(&mut self, value: &mut T) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        value.deserialize(self)
    }

    /// Deserializes a fresh value.
    pub fn deserialize_value<T>(&mut self) -> Result<T>
    where
        T: CdrSerializable + Default,
    {
        let mut value = T::default();
        value.deserialize(self)?;
        Ok(value)
    }

    /// Serializes `value` with a byte order other than the codec's.
    pub fn serialize_with_endianness<T>(&mut self, value: &T, endianness: Endianness) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        let saved = std::mem::replace(&mut self.endianness, endianness);
        let result = value.serialize(self);
        self.endianness = saved;
        result
    }

    pub fn deserialize_with_endianness<T>(
        &mut self,
        value: &mut T,
        endianness: Endianness,
    ) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        let saved = std::mem::replace(&mut self.endianness, endianness);
        let result = value.deserialize(self);
        self.endianness = saved;
        result
    }

    /// Serializes a fixed-size array: no length, elements back to back.
    ///
    /// Under XCDR2 an array whose innermost element is not primitive is
    /// preceded by a DHEADER.
    pub fn serialize_array<T: CdrSerializable>(&mut self, data: &[T]) -> Result<()> {
        self.rollback_on_error(|cdr| {
            if cdr.version == CdrVersion::XCdrV2 && !T::IS_PRIMITIVE_ARRAY {
                let at = cdr.begin_dheader()?;
                T::serialize_slice(data, cdr)?;
                cdr.end_dheader(at)
            } else {
                T::serialize_slice(data, cdr)?;
                cdr.prefixed_at = None;
                Ok(())
            }
        })
    }

    pub fn deserialize_array<T: CdrSerializable>(&mut self, data: &mut [T]) -> Result<()> {
        self.rollback_on_error(|cdr| {
            if cdr.version == CdrVersion::XCdrV2 && !T::IS_PRIMITIVE_ARRAY {
                let end = cdr.read_dheader()?;
                T::deserialize_slice(data, cdr)?;
                cdr.finish_dheader(end)
            } else {
                T::deserialize_slice(data, cdr)
            }
        })
    }

    /// Serializes a sequence: the element count followed by the elements.
    ///
    /// Under XCDR2 a sequence of non-primitive elements is preceded by a DHEADER.
    pub fn serialize_sequence<T: CdrSerializable>(&mut self, data: &[T]) -> Result<()> {
        let count = u32::try_from(data.len()).map_err(|_| Error::NumberOutOfRange)?;
        self.rollback_on_error(|cdr| {
            if cdr.version == CdrVersion::XCdrV2 && !T::IS_PRIMITIVE {
                let at = cdr.begin_dheader()?;
                cdr.serialize_u32(count)?;
                T::serialize_elements(data, cdr)?;
                cdr.end_dheader(at)
            } else {
                cdr.serialize_u32(count)?;
                T::serialize_elements(data, cdr)?;
                cdr.prefixed_at = None;
                Ok(())
            }
        })
    }

    /// Replaces the contents of `data` with a decoded sequence.
    pub fn deserialize_sequence<T>(&mut self, data: &mut Vec<T>) -> Result<()>
    where
        T: CdrSerializable + Default,
    {
        self.rollback_on_error(|cdr| {
            if cdr.version == CdrVersion::XCdrV2 && !T::IS_PRIMITIVE {
                let end = cdr.read_dheader()?;
                if end == cdr.offset {
                    // An empty sequence written without knowing its element type.
                    data.clear();
                    return Ok(());
                }
                cdr.deserialize_counted(data)?;
                cdr.finish_dheader(end)
            } else {
                cdr.deserialize_counted(data)
            }
        })
    }

    /// Serializes a map: the entry count followed by key/value pairs.
    ///
    /// Under XCDR2 a map of non-primitive values is preceded by a DHEADER.
    pub fn serialize_map<K, V>(&mut self, map: &BTreeMap<K, V>) -> Result<()>
    where
        K: CdrSerializable,
        V: CdrSerializable,
    {
        let count = u32::try_from(map.len()).map_err(|_| Error::NumberOutOfRange)?;
        self.rollback_on_error(|cdr| {
            let dheader = if cdr.version == CdrVersion::XCdrV2 && !V::IS_PRIMITIVE {
                Some(cdr.begin_dheader()?)
            } else {
                None
            };
            cdr.serialize_u32(count)?;
            for (k, v) in map {
                k.serialize(cdr)?;
                v.serialize(cdr)?;
            }
            match dheader {
                Some(at) => cdr.end_dheader(at),
                None => {
                    cdr.prefixed_at = None;
                    Ok(())
                }
            }
        })
    }

    /// Replaces the contents of `map` with a decoded map.
    pub fn deserialize_map<K, V>(&mut self, map: &mut BTreeMap<K, V>) -> Result<()>
    where
        K: CdrSerializable + Default + Ord,
        V: CdrSerializable + Default,
    {
        self.rollback_on_error(|cdr| {
            let end = if cdr.version == CdrVersion::XCdrV2 && !V::IS_PRIMITIVE {
                Some(cdr.read_dheader()?)
            } else {
                None
            };
            map.clear();
            if end == Some(cdr.offset) {
                return Ok(());
            }
            let count = cdr.deserialize_u32()? as usize;
            cdr.check_readable(count, 1)?;
            for _ in 0..count {
                let mut k = K::default();
                k.deserialize(cdr)?;
                let mut v = V::default();
                v.deserialize(cdr)?;
                map.insert(k, v);
            }
            match end {
                Some(end) => cdr.finish_dheader(end),
                None => Ok(()),
            }
        })
    }

    /// Runs `f`, moving the cursor back to where it was if it fails.
    pub(crate) fn rollback_on_error<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let state = self.state();
        let result = f(self);
        if result.is_err() {
            self.set_state(&state);
        }
        result
    }

    fn deserialize_counted<T>(&mut self, data: &mut Vec<T>) -> Result<()>
    where
        T: CdrSerializable + Default,
    {
        let count = self.deserialize_u32()? as usize;
        data.clear();
        T::deserialize_elements(data, count, self)
    }
}
