//! Serializing Rust data types into CDR.

use std::io::Write;

use serde::ser;

use crate::buffer::CdrBuffer;
use crate::cdr::Cdr;
use crate::encapsulation::{CdrVersion, Encapsulation};
use crate::error::{Error, Result};
use crate::kind::element_kind;
use crate::member::{MemberId, XCdrHeaderSelection};
use crate::size::{calc_serialized_data_size, calc_serialized_size, calc_serialized_size_bounded, SizeLimit};
use crate::state::State;

/// A serde serializer writing through a [`Cdr`].
///
/// Structs become aggregates of the codec's current encoding, their fields
/// members numbered from 0 in declaration order. Under XCDR2, sequences of
/// non-primitive elements, maps of non-primitive values and arrays of
/// non-primitive innermost elements are preceded by a DHEADER, as
/// [`Cdr::serialize_sequence`] does.
/// The first element decides, so an empty collection is always written
/// without one.
pub struct Serializer<'c, 'a> {
    cdr: &'c mut Cdr<'a>,
    // Set while writing the elements of an array, whose nested arrays share
    // its DHEADER.
    flat: bool,
}

impl<'c, 'a> Serializer<'c, 'a> {
    pub fn new(cdr: &'c mut Cdr<'a>) -> Self {
        Self { cdr, flat: false }
    }

    fn count(len: Option<usize>) -> Result<u32> {
        let len = len.ok_or(Error::SequenceMustHaveLength)?;
        u32::try_from(len).map_err(|_| Error::NumberOutOfRange)
    }

    fn compound<'s>(&'s mut self, kind: CompoundKind, array: bool) -> Compound<'s, 'c, 'a> {
        Compound {
            ser: self,
            kind,
            index: 0,
            array,
        }
    }

    /// Writes `count` now, or leaves it to the first element under XCDR2.
    fn counted<'s>(&'s mut self, count: u32) -> Result<Compound<'s, 'c, 'a>> {
        if self.cdr.version == CdrVersion::XCdrV2 {
            let layout = Layout::Pending { count: Some(count) };
            return Ok(self.compound(CompoundKind::Collection(layout), false));
        }
        self.cdr.serialize_u32(count)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }
}

macro_rules! impl_serialize_value {
    ($($ser_method:ident($ty:ty);)*) => {
        $(
            #[inline]
            fn $ser_method(self, v: $ty) -> Result<Self::Ok> {
                self.cdr.$ser_method(v)
            }
        )*
    };
}

impl<'s, 'c, 'a> ser::Serializer for &'s mut Serializer<'c, 'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Compound<'s, 'c, 'a>;
    type SerializeTuple = Compound<'s, 'c, 'a>;
    type SerializeTupleStruct = Compound<'s, 'c, 'a>;
    type SerializeTupleVariant = Compound<'s, 'c, 'a>;
    type SerializeMap = Compound<'s, 'c, 'a>;
    type SerializeStruct = Compound<'s, 'c, 'a>;
    type SerializeStructVariant = Compound<'s, 'c, 'a>;

    impl_serialize_value! {
        serialize_bool(bool);
        serialize_i8(i8);
        serialize_i16(i16);
        serialize_i32(i32);
        serialize_i64(i64);
        serialize_u8(u8);
        serialize_u16(u16);
        serialize_u32(u32);
        serialize_u64(u64);
        serialize_f32(f32);
        serialize_f64(f64);
        serialize_char(char);
    }

    #[inline]
    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        self.cdr.serialize_string(v)
    }

    #[inline]
    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        self.cdr.rollback_on_error(|cdr| {
            let len = u32::try_from(v.len()).map_err(|_| Error::NumberOutOfRange)?;
            cdr.reserve_write(4 + v.len(), 4)?;
            cdr.serialize_u32(len)?;
            cdr.serialize_bytes(v)
        })
    }

    #[inline]
    fn serialize_none(self) -> Result<Self::Ok> {
        Err(Error::TypeNotSupported)
    }

    #[inline]
    fn serialize_some<T>(self, _v: &T) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        Err(Error::TypeNotSupported)
    }

    #[inline]
    fn serialize_unit(self) -> Result<Self::Ok> {
        Ok(())
    }

    #[inline]
    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
        Ok(())
    }

    #[inline]
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok> {
        self.cdr.serialize_u32(variant_index)
    }

    #[inline]
    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        value.serialize(self)
    }

    #[inline]
    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok>
    where
        T: ser::Serialize + ?Sized,
    {
        self.cdr.serialize_u32(variant_index)?;
        value.serialize(self)
    }

    #[inline]
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let count = Serializer::count(len)?;
        self.counted(count)
    }

    #[inline]
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        let kind = if self.cdr.version == CdrVersion::XCdrV2 && !self.flat && len > 0 {
            CompoundKind::Collection(Layout::Pending { count: None })
        } else {
            CompoundKind::Plain
        };
        Ok(self.compound(kind, true))
    }

    #[inline]
    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self.compound(CompoundKind::Plain, false))
    }

    #[inline]
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.cdr.serialize_u32(variant_index)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }

    #[inline]
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        let count = Serializer::count(len)?;
        self.counted(count)
    }

    #[inline]
    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        let encoding = self.cdr.encoding_flag();
        let state = self.cdr.begin_serialize_type(encoding)?;
        Ok(self.compound(CompoundKind::Aggregate(state), false))
    }

    #[inline]
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.cdr.serialize_u32(variant_index)?;
        Ok(self.compound(CompoundKind::Plain, false))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

enum CompoundKind {
    Plain,
    Aggregate(State),
    /// An XCDR2 collection.
    Collection(Layout),
}

#[derive(Clone, Copy)]
enum Layout {
    /// Nothing written yet, `count` being the length word still owed.
    Pending { count: Option<u32> },
    /// A map whose count and first key were written before its first value
    /// told whether a DHEADER belongs in front of them.
    KeyWritten { count_at: usize },
    Open { dheader: Option<usize> },
}

#[doc(hidden)]
pub struct Compound<'s, 'c, 'a> {
    ser: &'s mut Serializer<'c, 'a>,
    kind: CompoundKind,
    index: u32,
    array: bool,
}

impl<'s, 'c, 'a> Compound<'s, 'c, 'a> {
    #[inline]
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
            let dheader = if delimited {
                Some(self.ser.cdr.begin_dheader()?)
            } else {
                None
            };
            if let Some(count) = count {
                self.ser.cdr.serialize_u32(count)?;
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
            let count_at = self.ser.cdr.offset - 4;
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
                // XCDR2 aligns to 4 at most, so shifting by one word keeps
                // everything written since the count aligned.
                let cdr = &mut *self.ser.cdr;
                let len = cdr.offset - count_at;
                cdr.buffer.move_within(count_at, count_at + 4, len)?;
                cdr.offset += 4;
                cdr.write_u32_at(count_at, 0)?;
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
        self.ser
            .cdr
            .serialize_member_with(id, XCdrHeaderSelection::default(), |cdr| {
                value.serialize(&mut Serializer::new(cdr))
            })
    }

    fn finish(self) -> Result<()> {
        let cdr = &mut *self.ser.cdr;
        match self.kind {
            CompoundKind::Aggregate(state) => cdr.end_serialize_type(&state),
            CompoundKind::Collection(Layout::Open {
                dheader: Some(at),
            }) => cdr.end_dheader(at),
            CompoundKind::Collection(Layout::Pending { count: Some(count) }) => {
                cdr.serialize_u32(count)?;
                cdr.prefixed_at = None;
                Ok(())
            }
            CompoundKind::Plain | CompoundKind::Collection(_) => {
                cdr.prefixed_at = None;
                Ok(())
            }
        }
    }
}

impl<'s, 'c, 'a> ser::SerializeSeq for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeTuple for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeTupleStruct for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeTupleVariant for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeMap for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeStruct for Compound<'s, 'c, 'a> {
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

impl<'s, 'c, 'a> ser::SerializeStructVariant for Compound<'s, 'c, 'a> {
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

fn writer_for<C: Encapsulation>(capacity: u64) -> Result<Cdr<'static>> {
    let mut cdr = Cdr::new(
        CdrBuffer::with_capacity(capacity as usize),
        C::ENDIANNESS,
        C::ENCODING.cdr_version(),
    );
    cdr.set_encoding_flag(C::ENCODING)?;
    Ok(cdr)
}

/// Serializes `value` after the encapsulation of `C`.
pub fn serialize<T, S, C>(value: &T, size_limit: S) -> Result<Vec<u8>>
where
    T: ser::Serialize + ?Sized,
    S: SizeLimit,
    C: Encapsulation,
{
    let size = match size_limit.limit() {
        Some(limit) => calc_serialized_size_bounded::<T, C>(value, limit)?,
        None => calc_serialized_size::<T, C>(value)?,
    };
    let mut cdr = writer_for::<C>(size)?;
    cdr.serialize_encapsulation()?;
    value.serialize(&mut Serializer::new(&mut cdr))?;
    Ok(cdr.into_buffer().into_vec())
}

/// Serializes `value` with the encapsulation of `C` into `writer`.
pub fn serialize_into<W, T, S, C>(writer: &mut W, value: &T, size_limit: S) -> Result<()>
where
    W: Write + ?Sized,
    T: ser::Serialize + ?Sized,
    S: SizeLimit,
    C: Encapsulation,
{
    let bytes = serialize::<T, S, C>(value, size_limit)?;
    writer.write_all(&bytes).map_err(Into::into)
}

/// Serializes `value` encoded as `C` prescribes, without the encapsulation.
pub fn serialize_data<T, C>(value: &T) -> Result<Vec<u8>>
where
    T: ser::Serialize + ?Sized,
    C: Encapsulation,
{
    let size = calc_serialized_data_size::<T, C>(value)?;
    let mut cdr = writer_for::<C>(size)?;
    value.serialize(&mut Serializer::new(&mut cdr))?;
    Ok(cdr.into_buffer().into_vec())
}
