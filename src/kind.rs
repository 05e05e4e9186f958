//! Telling serde elements with a primitive wire form from the others.

use serde::ser;

use crate::error::{Error, Result};

/// How an element of a collection is laid out, which decides whether an
/// XCDR2 collection holding it carries a DHEADER.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ElementKind {
    /// A number, `bool`, `char` or enum.
    ///
    /// Every serde enum counts as primitive: which variant follows is only
    /// known after its discriminant, and the layout has to be settled before.
    Primitive,
    /// An array whose innermost elements are primitive.
    PrimitiveArray,
    Other,
}

impl ElementKind {
    pub(crate) fn is_primitive(self) -> bool {
        self == ElementKind::Primitive
    }

    pub(crate) fn is_primitive_array(self) -> bool {
        self != ElementKind::Other
    }
}

/// Classifies `value` without serializing more than the first element of
/// the arrays it is made of.
pub(crate) fn element_kind<T>(value: &T) -> ElementKind
where
    T: ser::Serialize + ?Sized,
{
    value.serialize(Classifier).unwrap_or(ElementKind::Other)
}

struct Classifier;

macro_rules! impl_primitive {
    ($($method:ident($ty:ty);)*) => {
        $(
            fn $method(self, _v: $ty) -> Result<ElementKind> {
                Ok(ElementKind::Primitive)
            }
        )*
    };
}

impl ser::Serializer for Classifier {
    type Ok = ElementKind;
    type Error = Error;
    type SerializeSeq = Shape;
    type SerializeTuple = Shape;
    type SerializeTupleStruct = Shape;
    type SerializeTupleVariant = Shape;
    type SerializeMap = Shape;
    type SerializeStruct = Shape;
    type SerializeStructVariant = Shape;

    impl_primitive! {
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

    fn serialize_str(self, _v: &str) -> Result<ElementKind> {
        Ok(ElementKind::Other)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<ElementKind> {
        Ok(ElementKind::Other)
    }

    fn serialize_none(self) -> Result<ElementKind> {
        Ok(ElementKind::Other)
    }

    fn serialize_some<T>(self, _v: &T) -> Result<ElementKind>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(ElementKind::Other)
    }

    fn serialize_unit(self) -> Result<ElementKind> {
        Ok(ElementKind::Other)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<ElementKind> {
        Ok(ElementKind::Other)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<ElementKind> {
        Ok(ElementKind::Primitive)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<ElementKind>
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
        _value: &T,
    ) -> Result<ElementKind>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(ElementKind::Primitive)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Other))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Shape> {
        Ok(Shape::Array(None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Other))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Primitive))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Other))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Other))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Shape> {
        Ok(Shape::Fixed(ElementKind::Primitive))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// A compound value; only the first element of an array is looked at.
enum Shape {
    Fixed(ElementKind),
    Array(Option<ElementKind>),
}

impl Shape {
    fn element<T>(&mut self, value: &T)
    where
        T: ser::Serialize + ?Sized,
    {
        if let Shape::Array(first @ None) = self {
            *first = Some(element_kind(value));
        }
    }

    fn kind(&self) -> ElementKind {
        match self {
            Shape::Fixed(kind) | Shape::Array(Some(kind @ ElementKind::Other)) => *kind,
            Shape::Array(_) => ElementKind::PrimitiveArray,
        }
    }
}

impl ser::SerializeSeq for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_element<T>(&mut self, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeTuple for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.element(value);
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeTupleStruct for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_field<T>(&mut self, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeTupleVariant for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_field<T>(&mut self, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeMap for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_key<T>(&mut self, _key: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn serialize_value<T>(&mut self, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeStruct for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_field<T>(&mut self, _key: &'static str, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}

impl ser::SerializeStructVariant for Shape {
    type Ok = ElementKind;
    type Error = Error;

    fn serialize_field<T>(&mut self, _key: &'static str, _value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        Ok(())
    }

    fn end(self) -> Result<ElementKind> {
        Ok(self.kind())
    }
}
