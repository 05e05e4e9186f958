//! Deserializing CDR into Rust data types.

use std::io::Read;

use serde::de::{self, IntoDeserializer};

use crate::buffer::CdrBuffer;
use crate::cdr::Cdr;
use crate::encapsulation::{from_representation_id, CdrVersion, EncodingAlgorithm, Encapsulation};
use crate::error::{Error, Result};
use crate::member::MemberId;
use crate::size::SizeLimit;
use crate::xcdr::ParameterList;

/// A serde deserializer reading through a [`Cdr`].
///
/// Mirrors [`crate::Serializer`]: structs are aggregates of the codec's
/// current encoding. In parameter lists, members whose id is not a field
/// index are skipped according to the must-understand policy.
///
/// Whether an XCDR2 collection starts with a DHEADER depends on its element
/// type, which serde only reveals when the first element is requested. Until
/// then the leading word of a sequence or map is held back; a word of zero is
/// an empty collection either way. Maps must be read entry by entry, as the
/// standard map types do.
pub struct Deserializer<'c, 'a> {
    cdr: &'c mut Cdr<'a>,
    flat: bool,
}

/// What precedes the elements of an XCDR2 collection still waiting for its
/// first element.
#[derive(Clone, Copy, Debug)]
enum Opening {
    /// A sequence or map whose first word is either its count or a DHEADER.
    Word(u32),
    /// An array, delimited unless its elements are primitive.
    Array,
}

/// Where a collection ends once its opening is resolved.
#[derive(Clone, Copy, Debug, Default)]
struct Layout {
    len: Option<usize>,
    end: Option<usize>,
}

impl<'c, 'a> Deserializer<'c, 'a> {
    pub fn new(cdr: &'c mut Cdr<'a>) -> Self {
        Self { cdr, flat: false }
    }

    fn read_len(&mut self) -> Result<usize> {
        self.cdr.deserialize_u32().map(|len| len as usize)
    }

    fn open_collection(&mut self, opening: Opening, primitive: bool) -> Result<Layout> {
        Ok(match (opening, primitive) {
            (Opening::Word(count), true) => Layout {
                len: Some(count as usize),
                end: None,
            },
            (Opening::Word(size), false) => {
                let size = size as usize;
                self.cdr.check_readable(size, 1)?;
                let end = self.cdr.offset + size;
                Layout {
                    len: Some(self.read_len()?),
                    end: Some(end),
                }
            }
            (Opening::Array, true) => Layout::default(),
            (Opening::Array, false) => Layout {
                len: None,
                end: Some(self.cdr.read_dheader()?),
            },
        })
    }

    fn read_collection<'de, V>(&mut self, map: bool, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let word = self.cdr.deserialize_u32()?;
        let opening = if self.cdr.version == CdrVersion::XCdrV2 && word > 0 {
            Some(Opening::Word(word))
        } else {
            None
        };
        let mut access = Access::new(self, word as usize, opening, false);
        let value = if map {
            visitor.visit_map(&mut access)?
        } else {
            visitor.visit_seq(&mut access)?
        };
        access.finish()?;
        Ok(value)
    }

    fn read_plain<'de, V>(&mut self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_seq(Access::new(self, len, None, false))
    }

    fn read_vec(&mut self) -> Result<Vec<u8>> {
        self.cdr.rollback_on_error(|cdr| {
            let len = cdr.deserialize_u32()? as usize;
            cdr.check_readable(len, 1)?;
            cdr.take(len, 1).map(<[u8]>::to_vec)
        })
    }

    fn read_struct<'de, V>(&mut self, fields: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.cdr.encoding_flag() {
            EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlainCdr2 => {
                self.read_plain(fields, visitor)
            }
            EncodingAlgorithm::DelimitCdr2 => {
                let end = self.cdr.read_dheader()?;
                let value = self.read_plain(fields, visitor)?;
                self.cdr.finish_dheader(end)?;
                Ok(value)
            }
            encoding @ (EncodingAlgorithm::PlCdr | EncodingAlgorithm::PlCdr2) => {
                let list = ParameterList::begin(self.cdr, encoding)?;
                let mut access = MemberAccess {
                    deserializer: &mut *self,
                    list,
                    fields,
                    pending: None,
                };
                let value = visitor.visit_map(&mut access)?;
                let MemberAccess {
                    deserializer, list, ..
                } = access;
                list.finish(deserializer.cdr)?;
                Ok(value)
            }
        }
    }
}

macro_rules! impl_deserialize_value {
    ($($de_method:ident => $cdr_method:ident, $visit:ident;)*) => {
        $(
            #[inline]
            fn $de_method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: de::Visitor<'de>,
            {
                visitor.$visit(self.cdr.$cdr_method()?)
            }
        )*
    };
}

impl<'de, 's, 'c, 'a> de::Deserializer<'de> for &'s mut Deserializer<'c, 'a> {
    type Error = Error;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::DeserializeAnyNotSupported)
    }

    impl_deserialize_value! {
        deserialize_bool => deserialize_bool, visit_bool;
        deserialize_u8 => deserialize_u8, visit_u8;
        deserialize_u16 => deserialize_u16, visit_u16;
        deserialize_u32 => deserialize_u32, visit_u32;
        deserialize_u64 => deserialize_u64, visit_u64;
        deserialize_i8 => deserialize_i8, visit_i8;
        deserialize_i16 => deserialize_i16, visit_i16;
        deserialize_i32 => deserialize_i32, visit_i32;
        deserialize_i64 => deserialize_i64, visit_i64;
        deserialize_f32 => deserialize_f32, visit_f32;
        deserialize_f64 => deserialize_f64, visit_f64;
        deserialize_char => deserialize_char, visit_char;
        deserialize_string => deserialize_string, visit_string;
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_str(&self.cdr.deserialize_string()?)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_bytes(&self.read_vec()?)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_byte_buf(self.read_vec()?)
    }

    fn deserialize_option<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::TypeNotSupported)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.read_collection(false, visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let opening = if self.cdr.version == CdrVersion::XCdrV2 && !self.flat && len > 0 {
            Some(Opening::Array)
        } else {
            None
        };
        let mut access = Access::new(self, len, opening, true);
        let value = visitor.visit_seq(&mut access)?;
        access.finish()?;
        Ok(value)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.read_plain(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.read_collection(true, visitor)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let state = self.cdr.state();
        let flat = std::mem::replace(&mut self.flat, false);
        let result = self.read_struct(fields.len(), visitor);
        self.flat = flat;
        match result {
            Ok(_) => {
                self.cdr.encoding = state.encoding();
                self.cdr.origin = state.origin();
                self.cdr.prefixed_at = None;
            }
            Err(_) => self.cdr.set_state(&state),
        }
        result
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        impl<'de, 's, 'c, 'a> de::EnumAccess<'de> for &'s mut Deserializer<'c, 'a> {
            type Error = Error;
            type Variant = Self;

            fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
            where
                V: de::DeserializeSeed<'de>,
            {
                let idx = self.cdr.deserialize_u32()?;
                let val: Result<_> = seed.deserialize(idx.into_deserializer());
                Ok((val?, self))
            }
        }

        visitor.visit_enum(self)
    }

    fn deserialize_identifier<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::TypeNotSupported)
    }

    fn deserialize_ignored_any<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::TypeNotSupported)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl<'de, 's, 'c, 'a> de::VariantAccess<'de> for &'s mut Deserializer<'c, 'a> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        de::DeserializeSeed::deserialize(seed, self)
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.read_plain(len, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.read_plain(fields.len(), visitor)
    }
}

/// Elements, or key/value pairs, laid out back to back.
struct Access<'s, 'c, 'a> {
    deserializer: &'s mut Deserializer<'c, 'a>,
    len: usize,
    opening: Option<Opening>,
    end: Option<usize>,
    array: bool,
}

impl<'s, 'c, 'a> Access<'s, 'c, 'a> {
    fn new(
        deserializer: &'s mut Deserializer<'c, 'a>,
        len: usize,
        opening: Option<Opening>,
        array: bool,
    ) -> Self {
        Self {
            deserializer,
            len,
            opening,
            end: None,
            array,
        }
    }

    /// Adopts the layout the first element settled on.
    fn open(&mut self, opening: Opening, layout: Option<Layout>) -> Result<()> {
        let layout = match layout {
            Some(layout) => layout,
            None => self.deserializer.open_collection(opening, true)?,
        };
        if let Some(len) = layout.len {
            self.len = len;
        }
        self.end = layout.end;
        Ok(())
    }

    fn element<'de, T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        let opening = match self.opening.take() {
            Some(opening) => opening,
            None => {
                self.len -= 1;
                return seed.deserialize(&mut *self.deserializer).map(Some);
            }
        };
        let mut layout = None;
        let result = seed.deserialize(First {
            deserializer: &mut *self.deserializer,
            opening,
            layout: &mut layout,
            prelude: (),
        });
        self.open(opening, layout)?;
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        result.map(Some)
    }

    fn entry<'de, K, V>(&mut self, kseed: K, vseed: V) -> Result<Option<(K::Value, V::Value)>>
    where
        K: de::DeserializeSeed<'de>,
        V: de::DeserializeSeed<'de>,
    {
        let opening = match self.opening.take() {
            Some(opening) => opening,
            None => {
                self.len -= 1;
                let key = kseed.deserialize(&mut *self.deserializer)?;
                let value = vseed.deserialize(&mut *self.deserializer)?;
                return Ok(Some((key, value)));
            }
        };
        let mut layout = None;
        let mut key = None;
        let result = vseed.deserialize(First {
            deserializer: &mut *self.deserializer,
            opening,
            layout: &mut layout,
            prelude: FirstKey {
                seed: kseed,
                key: &mut key,
            },
        });
        self.open(opening, layout)?;
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        let value = result?;
        let key = key.ok_or_else(|| Error::bad_param("map value read without its key"))?;
        Ok(Some((key, value)))
    }

    fn finish(self) -> Result<()> {
        match self.end {
            Some(end) => self.deserializer.cdr.finish_dheader(end),
            None => Ok(()),
        }
    }

    fn remaining(&self) -> Option<usize> {
        match self.opening {
            Some(Opening::Word(_)) => None,
            _ => Some(self.len),
        }
    }
}

impl<'de, 's, 'c, 'a> de::SeqAccess<'de> for Access<'s, 'c, 'a> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        let flat = std::mem::replace(&mut self.deserializer.flat, self.array);
        let result = self.element(seed);
        self.deserializer.flat = flat;
        result
    }

    fn size_hint(&self) -> Option<usize> {
        self.remaining()
    }
}

impl<'de, 's, 'c, 'a> de::MapAccess<'de> for Access<'s, 'c, 'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        if self.opening.is_some() {
            return Err(Error::bad_param("map entries must be read as pairs"));
        }
        if self.len > 0 {
            self.len -= 1;
            let key = de::DeserializeSeed::deserialize(seed, &mut *self.deserializer)?;
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        de::DeserializeSeed::deserialize(seed, &mut *self.deserializer)
    }

    fn next_entry_seed<K, V>(&mut self, kseed: K, vseed: V) -> Result<Option<(K::Value, V::Value)>>
    where
        K: de::DeserializeSeed<'de>,
        V: de::DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        let flat = std::mem::replace(&mut self.deserializer.flat, self.array);
        let result = self.entry(kseed, vseed);
        self.deserializer.flat = flat;
        result
    }

    fn size_hint(&self) -> Option<usize> {
        self.remaining()
    }
}

/// Reads whatever has to come between a collection's opening and its first
/// element.
trait Prelude {
    fn run(self, deserializer: &mut Deserializer<'_, '_>) -> Result<()>;
}

impl Prelude for () {
    fn run(self, _deserializer: &mut Deserializer<'_, '_>) -> Result<()> {
        Ok(())
    }
}

/// The first key of a map, read once its value type told the layout.
struct FirstKey<'k, 'de, K>
where
    K: de::DeserializeSeed<'de>,
{
    seed: K,
    key: &'k mut Option<K::Value>,
}

impl<'k, 'de, K> Prelude for FirstKey<'k, 'de, K>
where
    K: de::DeserializeSeed<'de>,
{
    fn run(self, deserializer: &mut Deserializer<'_, '_>) -> Result<()> {
        *self.key = Some(self.seed.deserialize(deserializer)?);
        Ok(())
    }
}

/// Deserializes the first element of a collection, resolving the collection's
/// opening as soon as the element's type is asked for.
struct First<'f, 'c, 'a, P> {
    deserializer: &'f mut Deserializer<'c, 'a>,
    opening: Opening,
    layout: &'f mut Option<Layout>,
    prelude: P,
}

impl<'f, 'c, 'a, P: Prelude> First<'f, 'c, 'a, P> {
    fn settle(self, primitive: bool) -> Result<&'f mut Deserializer<'c, 'a>> {
        let First {
            deserializer,
            opening,
            layout,
            prelude,
        } = self;
        let opened = deserializer.open_collection(opening, primitive)?;
        *layout = Some(opened);
        if opened.len == Some(0) {
            return Err(Error::bad_param("delimited collection is empty"));
        }
        prelude.run(deserializer)?;
        Ok(deserializer)
    }
}

macro_rules! forward_settled {
    ($primitive:expr => $($method:ident($($arg:ident: $ty:ty),*);)*) => {
        $(
            fn $method<V>(self, $($arg: $ty,)* visitor: V) -> Result<V::Value>
            where
                V: de::Visitor<'de>,
            {
                de::Deserializer::$method(self.settle($primitive)?, $($arg,)* visitor)
            }
        )*
    };
}

impl<'de, 'f, 'c, 'a, P: Prelude> de::Deserializer<'de> for First<'f, 'c, 'a, P> {
    type Error = Error;

    forward_settled! { true =>
        deserialize_bool();
        deserialize_u8();
        deserialize_u16();
        deserialize_u32();
        deserialize_u64();
        deserialize_i8();
        deserialize_i16();
        deserialize_i32();
        deserialize_i64();
        deserialize_f32();
        deserialize_f64();
        deserialize_char();
        deserialize_enum(name: &'static str, variants: &'static [&'static str]);
    }

    forward_settled! { false =>
        deserialize_any();
        deserialize_str();
        deserialize_string();
        deserialize_bytes();
        deserialize_byte_buf();
        deserialize_option();
        deserialize_unit();
        deserialize_unit_struct(name: &'static str);
        deserialize_seq();
        deserialize_map();
        deserialize_struct(name: &'static str, fields: &'static [&'static str]);
        deserialize_tuple_struct(name: &'static str, len: usize);
        deserialize_identifier();
        deserialize_ignored_any();
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let opening = self.opening;
        match opening {
            // Nested arrays share the outer opening; their first element decides.
            Opening::Array if len > 0 => {
                let First {
                    deserializer,
                    opening,
                    layout,
                    prelude,
                } = self;
                visitor.visit_seq(Nested {
                    deserializer,
                    first: Some((opening, layout, prelude)),
                    len,
                })
            }
            Opening::Array => de::Deserializer::deserialize_tuple(self.settle(true)?, len, visitor),
            Opening::Word(_) => {
                de::Deserializer::deserialize_tuple(self.settle(false)?, len, visitor)
            }
        }
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// The elements of an array nested in the first element of another.
struct Nested<'f, 'c, 'a, P> {
    deserializer: &'f mut Deserializer<'c, 'a>,
    first: Option<(Opening, &'f mut Option<Layout>, P)>,
    len: usize,
}

impl<'de, 'f, 'c, 'a, P: Prelude> de::SeqAccess<'de> for Nested<'f, 'c, 'a, P> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        let value = match self.first.take() {
            Some((opening, layout, prelude)) => seed.deserialize(First {
                deserializer: &mut *self.deserializer,
                opening,
                layout,
                prelude,
            })?,
            None => seed.deserialize(&mut *self.deserializer)?,
        };
        Ok(Some(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

/// Members of a parameter list, keyed by their field index.
struct MemberAccess<'s, 'c, 'a> {
    deserializer: &'s mut Deserializer<'c, 'a>,
    list: ParameterList,
    fields: usize,
    pending: Option<(MemberId, usize)>,
}

impl<'de, 's, 'c, 'a> de::MapAccess<'de> for MemberAccess<'s, 'c, 'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        let cdr = &mut *self.deserializer.cdr;
        while let Some((id, end)) = self.list.next_member(cdr)? {
            if (id.id as usize) < self.fields {
                self.pending = Some((id, end));
                let index = u64::from(id.id);
                return seed.deserialize(index.into_deserializer()).map(Some);
            }
            self.list.unknown_member(cdr, id)?;
            self.list.end_member(cdr, id, end)?;
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        let (id, end) = self
            .pending
            .take()
            .ok_or_else(|| Error::bad_param("member value requested before its id"))?;
        let value = de::DeserializeSeed::deserialize(seed, &mut *self.deserializer)?;
        self.list.end_member(self.deserializer.cdr, id, end)?;
        Ok(value)
    }
}

/// Deserializes an object from an encapsulated byte slice.
pub fn deserialize<'de, T>(bytes: &[u8]) -> Result<T>
where
    T: de::Deserialize<'de>,
{
    decode(bytes)
}

/// Deserializes an encapsulated object read from `reader`.
///
/// The reader is consumed to its end, or up to `size_limit` bytes. A message
/// that does not fit the limit fails with [`Error::SizeLimit`].
pub fn deserialize_from<'de, R, T, S>(mut reader: R, size_limit: S) -> Result<T>
where
    R: Read,
    T: de::Deserialize<'de>,
    S: SizeLimit,
{
    let mut bytes = Vec::new();
    match size_limit.limit() {
        Some(limit) => {
            reader.take(limit).read_to_end(&mut bytes)?;
            match decode(&bytes) {
                Err(Error::NotEnoughMemory { .. }) if bytes.len() as u64 == limit => {
                    Err(Error::SizeLimit)
                }
                result => result,
            }
        }
        None => {
            reader.read_to_end(&mut bytes)?;
            decode(&bytes)
        }
    }
}

/// Deserializes an object without encapsulation, encoded as `C` prescribes.
pub fn deserialize_data<'de, T, C>(bytes: &[u8]) -> Result<T>
where
    T: de::Deserialize<'de>,
    C: Encapsulation,
{
    let mut cdr = Cdr::new(
        CdrBuffer::from_bytes(bytes),
        C::ENDIANNESS,
        C::ENCODING.cdr_version(),
    );
    cdr.set_encoding_flag(C::ENCODING)?;
    de::Deserialize::deserialize(&mut Deserializer::new(&mut cdr))
}

fn decode<'de, T>(bytes: &[u8]) -> Result<T>
where
    T: de::Deserialize<'de>,
{
    let version = match bytes {
        [0, id, ..] => from_representation_id(*id)?.0.cdr_version(),
        [_, _, ..] => return Err(Error::InvalidEncapsulation),
        _ => {
            return Err(Error::NotEnoughMemory {
                needed: 4,
                available: bytes.len(),
            })
        }
    };
    let mut cdr = Cdr::from_bytes(bytes, version);
    cdr.read_encapsulation()?;
    de::Deserialize::deserialize(&mut Deserializer::new(&mut cdr))
}
