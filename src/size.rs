//! Measuring the size of serialized data.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde::ser;

use crate::encapsulation::{CdrVersion, EncodingAlgorithm, Encapsulation, ENCAPSULATION_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::kind::element_kind;
use crate::member::{
    LengthCode, MemberId, XCdrHeaderSelection, PID_SHORT_MAX_ID, SHORT_HEADER_MAX_SIZE,
};
use crate::serializable::CdrSerializable;

/// Computes how many bytes a [`Cdr`](crate::Cdr) of the same version would
/// write, without touching any buffer.
///
/// Every function takes the alignment reached so far, relative to the
/// current alignment origin, and advances it by the size it returns.
#[derive(Clone, Debug)]
pub struct CdrSizeCalculator {
    version: CdrVersion,
    encoding: EncodingAlgorithm,
    /// Position of the length word that starts the last measured item, when
    /// that word counts the bytes after it.
    pub(crate) prefixed_at: Option<usize>,
    dheaders: Vec<usize>,
}

impl CdrSizeCalculator {
    pub fn new(version: CdrVersion) -> Self {
        Self {
            version,
            encoding: version.default_encoding(),
            prefixed_at: None,
            dheaders: Vec::new(),
        }
    }

    /// A calculator for a stream whose top-level aggregate uses `encoding`.
    pub fn with_encoding(encoding: EncodingAlgorithm) -> Self {
        Self {
            encoding,
            ..Self::new(encoding.cdr_version())
        }
    }

    pub fn cdr_version(&self) -> CdrVersion {
        self.version
    }

    pub fn encoding(&self) -> EncodingAlgorithm {
        self.encoding
    }

    pub fn set_encoding_flag(&mut self, encoding: EncodingAlgorithm) -> Result<()> {
        if !self.version.supports(encoding) {
            return Err(Error::bad_param(format!(
                "{:?} cannot be used by a {:?} calculator",
                encoding, self.version
            )));
        }
        self.encoding = encoding;
        Ok(())
    }

    /// Padding a value of `data_size` bytes needs at `current_alignment`.
    pub fn alignment(&self, current_alignment: usize, data_size: usize) -> usize {
        let size = data_size.min(self.version.max_alignment());
        if size <= 1 {
            return 0;
        }
        (size - current_alignment % size) & (size - 1)
    }

    fn length_word_at(&self, current_alignment: usize) -> usize {
        current_alignment + self.alignment(current_alignment, 4)
    }

    /// Counts the DHEADER of an XCDR2 collection of non-primitive elements
    /// and returns where it sits.
    pub(crate) fn open_collection(
        &mut self,
        delimited: bool,
        current_alignment: &mut usize,
    ) -> Option<usize> {
        if self.version != CdrVersion::XCdrV2 || !delimited {
            return None;
        }
        let at = self.length_word_at(*current_alignment);
        self.calculate_primitive_size(4, current_alignment);
        Some(at)
    }

    pub fn calculate_serialized_size<T>(&mut self, value: &T, current_alignment: &mut usize) -> usize
    where
        T: CdrSerializable + ?Sized,
    {
        value.calculate_serialized_size(self, current_alignment)
    }

    /// Size of a primitive of `size` bytes, padding included.
    pub fn calculate_primitive_size(&mut self, size: usize, current_alignment: &mut usize) -> usize {
        self.calculate_aligned_size(size, size, current_alignment)
    }

    pub fn calculate_long_double_size(&mut self, current_alignment: &mut usize) -> usize {
        self.calculate_aligned_size(16, 8, current_alignment)
    }

    fn calculate_aligned_size(
        &mut self,
        size: usize,
        align: usize,
        current_alignment: &mut usize,
    ) -> usize {
        let total = self.alignment(*current_alignment, align) + size;
        *current_alignment += total;
        self.prefixed_at = None;
        total
    }

    /// Size of a string holding `len` bytes.
    pub fn calculate_string_size(&mut self, len: usize, current_alignment: &mut usize) -> usize {
        let body = if len == 0 { 0 } else { len + 1 };
        let at = self.length_word_at(*current_alignment);
        let total = self.calculate_primitive_size(4, current_alignment) + body;
        *current_alignment += body;
        self.prefixed_at = Some(at);
        total
    }

    /// Size of a wide string of `units` UTF-16 code units.
    pub fn calculate_wstring_size(&mut self, units: usize, current_alignment: &mut usize) -> usize {
        let total = self.calculate_primitive_size(4, current_alignment) + 2 * units;
        *current_alignment += 2 * units;
        total
    }

    /// Size of raw octets.
    pub fn calculate_bytes_size(&mut self, len: usize, current_alignment: &mut usize) -> usize {
        *current_alignment += len;
        self.prefixed_at = None;
        len
    }

    pub fn calculate_array_serialized_size<T>(&mut self, data: &[T], current_alignment: &mut usize) -> usize
    where
        T: CdrSerializable,
    {
        let start = *current_alignment;
        if self.version == CdrVersion::XCdrV2 && !T::IS_PRIMITIVE_ARRAY {
            let at = self.length_word_at(start);
            self.calculate_primitive_size(4, current_alignment);
            T::calculate_slice_size(data, self, current_alignment);
            self.prefixed_at = Some(at);
        } else {
            T::calculate_slice_size(data, self, current_alignment);
            self.prefixed_at = None;
        }
        *current_alignment - start
    }

    pub fn calculate_sequence_serialized_size<T>(
        &mut self,
        data: &[T],
        current_alignment: &mut usize,
    ) -> usize
    where
        T: CdrSerializable,
    {
        let start = *current_alignment;
        let dheader = self.open_collection(!T::IS_PRIMITIVE, current_alignment);
        self.calculate_primitive_size(4, current_alignment);
        T::calculate_elements_size(data, self, current_alignment);
        self.prefixed_at = dheader;
        *current_alignment - start
    }

    pub fn calculate_map_serialized_size<K, V>(
        &mut self,
        map: &BTreeMap<K, V>,
        current_alignment: &mut usize,
    ) -> usize
    where
        K: CdrSerializable,
        V: CdrSerializable,
    {
        let start = *current_alignment;
        let dheader = self.open_collection(!V::IS_PRIMITIVE, current_alignment);
        self.calculate_primitive_size(4, current_alignment);
        for (k, v) in map {
            k.calculate_serialized_size(self, current_alignment);
            v.calculate_serialized_size(self, current_alignment);
        }
        self.prefixed_at = dheader;
        *current_alignment - start
    }

    /// Opens an aggregate, counting its DHEADER when `encoding` has one.
    ///
    /// The encoding active before the call must be handed back to
    /// [`CdrSizeCalculator::end_calculate_type_serialized_size`].
    pub fn begin_calculate_type_serialized_size(
        &mut self,
        encoding: EncodingAlgorithm,
        current_alignment: &mut usize,
    ) -> usize {
        let size = if encoding.has_dheader() {
            self.dheaders.push(self.length_word_at(*current_alignment));
            self.calculate_primitive_size(4, current_alignment)
        } else {
            0
        };
        self.encoding = encoding;
        self.prefixed_at = None;
        size
    }

    /// Closes an aggregate, counting the PL_CDR sentinel.
    pub fn end_calculate_type_serialized_size(
        &mut self,
        previous_encoding: EncodingAlgorithm,
        current_alignment: &mut usize,
    ) -> usize {
        let size = if self.encoding == EncodingAlgorithm::PlCdr {
            self.calculate_primitive_size(4, current_alignment)
        } else {
            0
        };
        self.prefixed_at = if self.encoding.has_dheader() {
            self.dheaders.pop()
        } else {
            None
        };
        self.encoding = previous_encoding;
        size
    }

    /// Size of `value` as member `id`, header included.
    pub fn calculate_member_serialized_size<T>(
        &mut self,
        id: impl Into<MemberId>,
        value: &T,
        current_alignment: &mut usize,
    ) -> usize
    where
        T: CdrSerializable + ?Sized,
    {
        self.calculate_member_serialized_size_with_selection(
            id,
            value,
            XCdrHeaderSelection::default(),
            current_alignment,
        )
    }

    pub fn calculate_member_serialized_size_with_selection<T>(
        &mut self,
        id: impl Into<MemberId>,
        value: &T,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
    ) -> usize
    where
        T: CdrSerializable + ?Sized,
    {
        value.calculate_member_serialized_size(self, id.into(), selection, current_alignment)
    }

    /// Size of member `id` whose body `f` measures.
    pub fn calculate_member_size_with<F>(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
        f: F,
    ) -> usize
    where
        F: FnOnce(&mut Self, &mut usize) -> usize,
    {
        let result = self.try_member_size_with(id, selection, current_alignment, |calc, inner| {
            f(calc, inner);
            Ok::<_, Infallible>(())
        });
        match result {
            Ok(size) => size,
            Err(never) => match never {},
        }
    }

    /// Size of an optional member whose body, when present, `f` measures.
    pub fn calculate_opt_member_size_with<F>(
        &mut self,
        id: MemberId,
        present: bool,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
        f: F,
    ) -> usize
    where
        F: FnOnce(&mut Self, &mut usize) -> usize,
    {
        let start = *current_alignment;
        match self.encoding {
            EncodingAlgorithm::PlainCdr => {
                *current_alignment +=
                    self.parameter_size(id, selection, *current_alignment, |calc, inner| {
                        if present {
                            f(calc, inner);
                        }
                        Ok::<_, Infallible>(())
                    })
                    .unwrap_or_else(|never| match never {});
            }
            EncodingAlgorithm::PlCdr | EncodingAlgorithm::PlCdr2 => {
                if present {
                    self.calculate_member_size_with(id, selection, current_alignment, f);
                }
            }
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2 => {
                self.calculate_primitive_size(1, current_alignment);
                if present {
                    f(self, current_alignment);
                }
            }
        }
        self.prefixed_at = None;
        *current_alignment - start
    }

    pub(crate) fn try_member_size_with<F, E>(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
        f: F,
    ) -> std::result::Result<usize, E>
    where
        F: FnOnce(&mut Self, &mut usize) -> std::result::Result<(), E>,
    {
        let start = *current_alignment;
        self.prefixed_at = None;
        match self.encoding {
            EncodingAlgorithm::PlCdr => {
                *current_alignment += self.parameter_size(id, selection, start, f)?;
            }
            EncodingAlgorithm::PlCdr2 => {
                let pad = self.alignment(start, 4);
                let mut inner = 0;
                f(self, &mut inner)?;
                let code = LengthCode::select(inner, self.prefixed_at == Some(0), selection)
                    .unwrap_or(LengthCode::NextInt);
                *current_alignment += pad + 4 + code.extra_bytes() + inner;
            }
            EncodingAlgorithm::PlainCdr
            | EncodingAlgorithm::PlainCdr2
            | EncodingAlgorithm::DelimitCdr2 => f(self, current_alignment)?,
        }
        self.prefixed_at = None;
        Ok(*current_alignment - start)
    }

    /// Size of an XCDR1 parameter: padding, header and body.
    fn parameter_size<F, E>(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
        current_alignment: usize,
        f: F,
    ) -> std::result::Result<usize, E>
    where
        F: FnOnce(&mut Self, &mut usize) -> std::result::Result<(), E>,
    {
        let pad = self.alignment(current_alignment, 4);
        let mut inner = 0;
        f(self, &mut inner)?;
        let long = selection == XCdrHeaderSelection::LongHeader
            || id.id > PID_SHORT_MAX_ID
            || inner > SHORT_HEADER_MAX_SIZE;
        Ok(pad + if long { 12 } else { 4 } + inner)
    }
}

/// A limit on the size of data being serialized or deserialized.
pub trait SizeLimit {
    fn limit(&self) -> Option<u64>;
}

/// A size limit of `n` bytes, the encapsulation included.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bounded(pub u64);

impl SizeLimit for Bounded {
    #[inline]
    fn limit(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// No size limit.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Infinite;

impl SizeLimit for Infinite {
    #[inline]
    fn limit(&self) -> Option<u64> {
        None
    }
}

struct SizeChecker<'c> {
    calc: &'c mut CdrSizeCalculator,
    alignment: &'c mut usize,
    flat: bool,
}

impl<'c> SizeChecker<'c> {
    fn new(calc: &'c mut CdrSizeCalculator, alignment: &'c mut usize) -> Self {
        SizeChecker {
            calc,
            alignment,
            flat: false,
        }
    }

    fn add_primitive(&mut self, size: usize) -> Result<()> {
        self.calc.calculate_primitive_size(size, self.alignment);
        Ok(())
    }

    fn add_usize_as_u32(&mut self, v: usize) -> Result<()> {
        if v > u32::MAX as usize {
            return Err(Error::NumberOutOfRange);
        }
        self.add_primitive(4)
    }

    fn compound<'a>(&'a mut self, kind: CompoundKind, array: bool) -> SizeCompound<'a, 'c> {
        SizeCompound {
            ser: self,
            kind,
            index: 0,
            array,
        }
    }

    fn counted<'a>(&'a mut self, len: Option<usize>) -> Result<SizeCompound<'a, 'c>> {
        let len = len.ok_or(Error::SequenceMustHaveLength)?;
        if self.calc.cdr_version() == CdrVersion::XCdrV2 {
            if len > u32::MAX as usize {
                return Err(Error::NumberOutOfRange);
            }
            let layout = Layout::Pending { count: true };
            return Ok(self.compound(CompoundKind::Collection(layout), false));
        }
        self.add_usize_as_u32(len)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }
}

macro_rules! impl_size_value {
    ($($ser_method:ident($ty:ty) = $size:expr;)*) => {
        $(
            fn $ser_method(self, _v: $ty) -> Result<Self::Ok> {
                self.add_primitive($size)
            }
        )*
    };
}

impl<'a, 'c> ser::Serializer for &'a mut SizeChecker<'c> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SizeCompound<'a, 'c>;
    type SerializeTuple = SizeCompound<'a, 'c>;
    type SerializeTupleStruct = SizeCompound<'a, 'c>;
    type SerializeTupleVariant = SizeCompound<'a, 'c>;
    type SerializeMap = SizeCompound<'a, 'c>;
    type SerializeStruct = SizeCompound<'a, 'c>;
    type SerializeStructVariant = SizeCompound<'a, 'c>;

    impl_size_value! {
        serialize_bool(bool) = 1;
        serialize_i8(i8) = 1;
        serialize_i16(i16) = 2;
        serialize_i32(i32) = 4;
        serialize_i64(i64) = 8;
        serialize_u8(u8) = 1;
        serialize_u16(u16) = 2;
        serialize_u32(u32) = 4;
        serialize_u64(u64) = 8;
        serialize_f32(f32) = 4;
        serialize_f64(f64) = 8;
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok> {
        if u32::from(v) > 0xFF {
            return Err(Error::InvalidChar(v));
        }
        self.add_primitive(1)
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        self.calc.calculate_string_size(v.len(), self.alignment);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        self.add_usize_as_u32(v.len())?;
        self.calc.calculate_bytes_size(v.len(), self.alignment);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok> {
        Err(Error::TypeNotSupported)
    }

    fn serialize_some<T>(self, _v: &T) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        Err(Error::TypeNotSupported)
    }

    fn serialize_unit(self) -> Result<Self::Ok> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok> {
        self.add_primitive(4)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        self.add_primitive(4)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.counted(len)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        let kind = if self.calc.cdr_version() == CdrVersion::XCdrV2 && !self.flat && len > 0 {
            CompoundKind::Collection(Layout::Pending { count: false })
        } else {
            CompoundKind::Plain
        };
        Ok(self.compound(kind, true))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self.compound(CompoundKind::Plain, false))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.add_primitive(4)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        self.counted(len)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        let encoding = self.calc.encoding();
        self.calc
            .begin_calculate_type_serialized_size(encoding, self.alignment);
        Ok(self.compound(CompoundKind::Aggregate(encoding), false))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.add_primitive(4)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

enum CompoundKind {
    Plain,
    Aggregate(EncodingAlgorithm),
    Collection(Layout),
}

/// Mirrors the layouts [`Serializer`](crate::Serializer) settles on.
#[derive(Clone, Copy)]
enum Layout {
    Pending { count: bool },
    KeyWritten { count_at: usize },
    Open { dheader: Option<usize> },
}

#[doc(hidden)]
pub struct SizeCompound<'a, 'c> {
    ser: &'a mut SizeChecker<'c>,
    kind: CompoundKind,
    index: u32,
    array: bool,
}

impl<'a, 'c> SizeCompound<'a, 'c> {
    fn element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        if let CompoundKind::Collection(Layout::Pending { .. }) = self.kind {
            let kind = element_kind(value);
            let primitive = if self.array {
                kind.is_primitive_array()
            } else {
                kind.is_primitive()
            };
            self.open(!primitive)?;
        }
        self.nested(value)
    }

    fn nested<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        let flat = std::mem::replace(&mut self.ser.flat, self.array);
        let result = value.serialize(&mut *self.ser);
        self.ser.flat = flat;
        result
    }

    fn open(&mut self, delimited: bool) -> Result<()> {
        if let CompoundKind::Collection(Layout::Pending { count }) = self.kind {
            let dheader = self.ser.calc.open_collection(delimited, self.ser.alignment);
            if count {
                self.ser.add_primitive(4)?;
            }
            self.kind = CompoundKind::Collection(Layout::Open { dheader });
        }
        Ok(())
    }

    fn key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        if let CompoundKind::Collection(Layout::Pending { .. }) = self.kind {
            self.open(false)?;
            let count_at = *self.ser.alignment - 4;
            self.kind = CompoundKind::Collection(Layout::KeyWritten { count_at });
        }
        self.nested(key)
    }

    fn value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        if let CompoundKind::Collection(Layout::KeyWritten { count_at }) = self.kind {
            let dheader = if element_kind(value).is_primitive() {
                None
            } else {
                *self.ser.alignment += 4;
                Some(count_at)
            };
            self.kind = CompoundKind::Collection(Layout::Open { dheader });
        }
        self.nested(value)
    }

    fn member<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        let id = MemberId::new(self.index);
        self.index += 1;
        self.ser.calc.try_member_size_with(
            id,
            XCdrHeaderSelection::default(),
            self.ser.alignment,
            |calc, alignment| value.serialize(&mut SizeChecker::new(calc, alignment)),
        )?;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self.kind {
            CompoundKind::Aggregate(encoding) => {
                self.ser
                    .calc
                    .end_calculate_type_serialized_size(encoding, self.ser.alignment);
            }
            CompoundKind::Collection(Layout::Open { dheader }) => {
                self.ser.calc.prefixed_at = dheader;
            }
            CompoundKind::Collection(Layout::Pending { count }) => {
                if count {
                    self.ser.add_primitive(4)?;
                }
                self.ser.calc.prefixed_at = None;
            }
            CompoundKind::Plain | CompoundKind::Collection(Layout::KeyWritten { .. }) => {
                self.ser.calc.prefixed_at = None;
            }
        }
        Ok(())
    }
}

impl<'a, 'c> ser::SerializeSeq for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeTuple for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeTupleStruct for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeTupleVariant for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeMap for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.key(key)
    }

    #[inline]
    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.value(value)
    }

    fn serialize_entry<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: ser::Serialize + ?Sized,
        V: ser::Serialize + ?Sized,
    {
        if let CompoundKind::Collection(Layout::Pending { .. }) = self.kind {
            self.open(!element_kind(value).is_primitive())?;
        }
        self.nested(key)?;
        self.nested(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeStruct for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.member(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeStructVariant for SizeCompound<'a, 'c> {
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value)
    }

    #[inline]
    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Returns the size of the payload `value` serializes to with encapsulation `C`.
pub fn calc_serialized_data_size<T, C>(value: &T) -> Result<u64>
where
    T: ser::Serialize + ?Sized,
    C: Encapsulation,
{
    let mut calc = CdrSizeCalculator::with_encoding(C::ENCODING);
    let mut alignment = 0;
    value.serialize(&mut SizeChecker::new(&mut calc, &mut alignment))?;
    Ok(alignment as u64)
}

/// Returns the size of `value` serialized with encapsulation `C`, the
/// encapsulation included.
pub fn calc_serialized_size<T, C>(value: &T) -> Result<u64>
where
    T: ser::Serialize + ?Sized,
    C: Encapsulation,
{
    calc_serialized_data_size::<T, C>(value).map(|size| size + ENCAPSULATION_HEADER_SIZE)
}

/// Like [`calc_serialized_size`], failing with [`Error::SizeLimit`] when the
/// result exceeds `max`.
pub fn calc_serialized_size_bounded<T, C>(value: &T, max: u64) -> Result<u64>
where
    T: ser::Serialize + ?Sized,
    C: Encapsulation,
{
    let size = calc_serialized_size::<T, C>(value)?;
    if size > max {
        return Err(Error::SizeLimit);
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CdrBuffer;
    use crate::cdr::Cdr;
    use crate::encapsulation::Endianness;

    fn encoded_len<F>(encoding: EncodingAlgorithm, f: F) -> usize
    where
        F: FnOnce(&mut Cdr<'static>),
    {
        let mut cdr = Cdr::new(CdrBuffer::new(), Endianness::Little, encoding.cdr_version());
        cdr.set_encoding_flag(encoding).unwrap();
        f(&mut cdr);
        cdr.serialized_data_length()
    }

    #[test]
    fn test_alignment() {
        let calc = CdrSizeCalculator::new(CdrVersion::XCdrV1);
        assert_eq!(calc.alignment(1, 8), 7);
        assert_eq!(calc.alignment(3, 2), 1);
        assert_eq!(calc.alignment(4, 4), 0);
        let calc = CdrSizeCalculator::new(CdrVersion::XCdrV2);
        assert_eq!(calc.alignment(1, 8), 3);
    }

    #[test]
    fn test_members_agree_with_encoder() {
        for encoding in EncodingAlgorithm::ALL {
            let expected = encoded_len(encoding, |cdr| {
                let state = cdr.begin_serialize_type(encoding).unwrap();
                cdr.serialize_member(0, &1u8).unwrap();
                cdr.serialize_member(1, &String::from("hello")).unwrap();
                cdr.serialize_member(0x3FFF, &2u64).unwrap();
                cdr.serialize_member(3, &vec![1u16, 2, 3]).unwrap();
                cdr.serialize_member(4, &Some(5u32)).unwrap();
                cdr.serialize_member(5, &Option::<u32>::None).unwrap();
                cdr.end_serialize_type(&state).unwrap();
            });

            let mut calc = CdrSizeCalculator::with_encoding(encoding);
            let mut alignment = 0;
            let mut size = calc.begin_calculate_type_serialized_size(encoding, &mut alignment);
            size += calc.calculate_member_serialized_size(0, &1u8, &mut alignment);
            size += calc.calculate_member_serialized_size(1, &String::from("hello"), &mut alignment);
            size += calc.calculate_member_serialized_size(0x3FFF, &2u64, &mut alignment);
            size += calc.calculate_member_serialized_size(3, &vec![1u16, 2, 3], &mut alignment);
            size += calc.calculate_member_serialized_size(4, &Some(5u32), &mut alignment);
            size += calc.calculate_member_serialized_size(5, &Option::<u32>::None, &mut alignment);
            size += calc.end_calculate_type_serialized_size(encoding, &mut alignment);

            assert_eq!(size, expected, "{:?}", encoding);
            assert_eq!(alignment, expected, "{:?}", encoding);
        }
    }

    #[test]
    fn test_forced_long_headers_agree_with_encoder() {
        for encoding in [EncodingAlgorithm::PlCdr, EncodingAlgorithm::PlCdr2] {
            for selection in [
                XCdrHeaderSelection::LongHeader,
                XCdrHeaderSelection::AutoWithLongHeaderByDefault,
            ] {
                let expected = encoded_len(encoding, |cdr| {
                    let state = cdr.begin_serialize_type(encoding).unwrap();
                    cdr.serialize_member_with_selection(1, &7u16, selection)
                        .unwrap();
                    cdr.end_serialize_type(&state).unwrap();
                });
                let mut calc = CdrSizeCalculator::with_encoding(encoding);
                let mut alignment = 0;
                calc.begin_calculate_type_serialized_size(encoding, &mut alignment);
                calc.calculate_member_serialized_size_with_selection(
                    1,
                    &7u16,
                    selection,
                    &mut alignment,
                );
                calc.end_calculate_type_serialized_size(encoding, &mut alignment);
                assert_eq!(alignment, expected, "{:?} {:?}", encoding, selection);
            }
        }
    }

    #[test]
    fn test_strings() {
        let mut calc = CdrSizeCalculator::new(CdrVersion::XCdrV1);
        let mut alignment = 1;
        assert_eq!(calc.calculate_string_size(0, &mut alignment), 7);
        assert_eq!(calc.calculate_string_size(2, &mut alignment), 7);
        assert_eq!(alignment, 15);
        assert_eq!(calc.calculate_wstring_size(2, &mut alignment), 9);
    }

    #[test]
    fn test_size_limit() {
        assert_eq!(Bounded(3).limit(), Some(3));
        assert_eq!(Infinite.limit(), None);
    }
}
