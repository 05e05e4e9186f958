//! The capability a type needs to go through a [`Cdr`].

use std::collections::BTreeMap;

use crate::cdr::Cdr;
use crate::error::{Error, Result};
use crate::long_double::LongDouble;
use crate::member::{MemberId, XCdrHeaderSelection};
use crate::size::CdrSizeCalculator;

/// A value that can be measured, serialized and deserialized.
///
/// Generated or hand-written aggregates implement the three required
/// functions, usually by bracketing their members with
/// [`Cdr::begin_serialize_type`]/[`Cdr::end_serialize_type`] and
/// [`Cdr::deserialize_type`]. The remaining functions have defaults that fit
/// every type except the ones with special member framing, such as `Option`.
///
/// ```
/// use xcdr::{Cdr, CdrBuffer, CdrSerializable, CdrSizeCalculator, CdrVersion, Endianness, Result};
/// use xcdr::EncodingAlgorithm;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl CdrSerializable for Point {
///     fn calculate_serialized_size(
///         &self,
///         calc: &mut CdrSizeCalculator,
///         current_alignment: &mut usize,
///     ) -> usize {
///         let previous = calc.encoding();
///         let encoding = EncodingAlgorithm::for_extensibility(
///             xcdr::Extensibility::Mutable,
///             calc.cdr_version(),
///         );
///         calc.begin_calculate_type_serialized_size(encoding, current_alignment)
///             + calc.calculate_member_serialized_size(0, &self.x, current_alignment)
///             + calc.calculate_member_serialized_size(1, &self.y, current_alignment)
///             + calc.end_calculate_type_serialized_size(previous, current_alignment)
///     }
///
///     fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
///         let encoding = EncodingAlgorithm::for_extensibility(
///             xcdr::Extensibility::Mutable,
///             cdr.cdr_version(),
///         );
///         let state = cdr.begin_serialize_type(encoding)?;
///         cdr.serialize_member(0, &self.x)?;
///         cdr.serialize_member(1, &self.y)?;
///         cdr.end_serialize_type(&state)
///     }
///
///     fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
///         let encoding = EncodingAlgorithm::for_extensibility(
///             xcdr::Extensibility::Mutable,
///             cdr.cdr_version(),
///         );
///         cdr.deserialize_type(encoding, |cdr, id| {
///             match id.id {
///                 0 => cdr.deserialize_member(&mut self.x)?,
///                 1 => cdr.deserialize_member(&mut self.y)?,
///                 _ => return Ok(false),
///             }
///             Ok(true)
///         })
///     }
/// }
///
/// let point = Point { x: 1, y: -1 };
/// let mut cdr = Cdr::new(CdrBuffer::new(), Endianness::Little, CdrVersion::XCdrV2);
/// cdr.serialize_encapsulation()?;
/// cdr.serialize(&point)?;
///
/// let mut calc = CdrSizeCalculator::new(CdrVersion::XCdrV2);
/// let mut alignment = 0;
/// assert_eq!(
///     calc.calculate_serialized_size(&point, &mut alignment) + 4,
///     cdr.serialized_data_length()
/// );
///
/// cdr.reset();
/// cdr.read_encapsulation()?;
/// assert_eq!(cdr.deserialize_value::<Point>()?, point);
/// # Ok::<(), xcdr::Error>(())
/// ```
pub trait CdrSerializable {
    /// Whether the type is a primitive, which drops the DHEADER of XCDR2
    /// sequences of it.
    const IS_PRIMITIVE: bool = false;
    /// Whether the innermost element of a (possibly nested) array is primitive.
    const IS_PRIMITIVE_ARRAY: bool = Self::IS_PRIMITIVE;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize;

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()>;

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()>;

    /// Size of the value serialized as member `id`, header included.
    fn calculate_member_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        id: MemberId,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_member_size_with(id, selection, current_alignment, |calc, alignment| {
            self.calculate_serialized_size(calc, alignment)
        })
    }

    /// Serializes the value framed as member `id` of the current aggregate.
    fn serialize_member(
        &self,
        cdr: &mut Cdr<'_>,
        id: MemberId,
        selection: XCdrHeaderSelection,
    ) -> Result<()> {
        let frame = cdr.begin_serialize_member(id, selection)?;
        self.serialize(cdr)?;
        cdr.end_serialize_member(frame)
    }

    /// Deserializes the value of the member the cursor is on.
    fn deserialize_member(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        self.deserialize(cdr)
    }

    #[doc(hidden)]
    fn calculate_flat_size(&self, calc: &mut CdrSizeCalculator, current_alignment: &mut usize) -> usize {
        self.calculate_serialized_size(calc, current_alignment)
    }

    /// Serializes the value as part of an enclosing array, without the
    /// DHEADER of its own.
    #[doc(hidden)]
    fn serialize_flat(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        self.serialize(cdr)
    }

    #[doc(hidden)]
    fn deserialize_flat(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        self.deserialize(cdr)
    }

    #[doc(hidden)]
    fn calculate_slice_size(
        data: &[Self],
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize
    where
        Self: Sized,
    {
        data.iter()
            .map(|v| v.calculate_flat_size(calc, current_alignment))
            .sum()
    }

    /// Serializes the elements of an array, nested arrays flattened.
    #[doc(hidden)]
    fn serialize_slice(data: &[Self], cdr: &mut Cdr<'_>) -> Result<()>
    where
        Self: Sized,
    {
        data.iter().try_for_each(|v| v.serialize_flat(cdr))
    }

    #[doc(hidden)]
    fn deserialize_slice(data: &mut [Self], cdr: &mut Cdr<'_>) -> Result<()>
    where
        Self: Sized,
    {
        data.iter_mut().try_for_each(|v| v.deserialize_flat(cdr))
    }

    #[doc(hidden)]
    fn calculate_elements_size(
        data: &[Self],
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize
    where
        Self: Sized,
    {
        data.iter()
            .map(|v| v.calculate_serialized_size(calc, current_alignment))
            .sum()
    }

    /// Serializes the elements of a sequence.
    #[doc(hidden)]
    fn serialize_elements(data: &[Self], cdr: &mut Cdr<'_>) -> Result<()>
    where
        Self: Sized,
    {
        data.iter().try_for_each(|v| v.serialize(cdr))
    }

    /// Appends `count` decoded elements to `data`.
    ///
    /// Every element takes at least one byte, so a count larger than what is
    /// left to read is rejected before anything is allocated.
    #[doc(hidden)]
    fn deserialize_elements(data: &mut Vec<Self>, count: usize, cdr: &mut Cdr<'_>) -> Result<()>
    where
        Self: Sized + Default,
    {
        cdr.check_readable(count, 1)?;
        data.reserve(count);
        for _ in 0..count {
            let mut value = Self::default();
            value.deserialize(cdr)?;
            data.push(value);
        }
        Ok(())
    }
}

macro_rules! impl_primitive {
    ($($ty:ty => $ser:ident, $de:ident, $size:expr;)*) => {
        $(
            impl CdrSerializable for $ty {
                const IS_PRIMITIVE: bool = true;

                fn calculate_serialized_size(
                    &self,
                    calc: &mut CdrSizeCalculator,
                    current_alignment: &mut usize,
                ) -> usize {
                    calc.calculate_primitive_size($size, current_alignment)
                }

                fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
                    cdr.$ser(*self)
                }

                fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
                    *self = cdr.$de()?;
                    Ok(())
                }

                fn calculate_elements_size(
                    data: &[Self],
                    calc: &mut CdrSizeCalculator,
                    current_alignment: &mut usize,
                ) -> usize {
                    primitive_elements_size(data.len(), $size, calc, current_alignment)
                }

                fn calculate_slice_size(
                    data: &[Self],
                    calc: &mut CdrSizeCalculator,
                    current_alignment: &mut usize,
                ) -> usize {
                    primitive_elements_size(data.len(), $size, calc, current_alignment)
                }

                fn deserialize_elements(
                    data: &mut Vec<Self>,
                    count: usize,
                    cdr: &mut Cdr<'_>,
                ) -> Result<()> {
                    if count == 0 {
                        return Ok(());
                    }
                    let len = count
                        .checked_mul($size)
                        .ok_or(Error::NumberOutOfRange)?;
                    cdr.check_readable(len, $size)?;
                    data.reserve(count);
                    for _ in 0..count {
                        data.push(cdr.$de()?);
                    }
                    Ok(())
                }
            }
        )*
    };
}

fn primitive_elements_size(
    len: usize,
    size: usize,
    calc: &mut CdrSizeCalculator,
    current_alignment: &mut usize,
) -> usize {
    if len == 0 {
        return 0;
    }
    let first = calc.calculate_primitive_size(size, current_alignment);
    let rest = (len - 1) * size;
    *current_alignment += rest;
    first + rest
}

impl_primitive! {
    i8 => serialize_i8, deserialize_i8, 1;
    bool => serialize_bool, deserialize_bool, 1;
    char => serialize_char, deserialize_char, 1;
    u16 => serialize_u16, deserialize_u16, 2;
    i16 => serialize_i16, deserialize_i16, 2;
    u32 => serialize_u32, deserialize_u32, 4;
    i32 => serialize_i32, deserialize_i32, 4;
    u64 => serialize_u64, deserialize_u64, 8;
    i64 => serialize_i64, deserialize_i64, 8;
    f32 => serialize_f32, deserialize_f32, 4;
    f64 => serialize_f64, deserialize_f64, 8;
}

impl CdrSerializable for u8 {
    const IS_PRIMITIVE: bool = true;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_primitive_size(1, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_u8(*self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        *self = cdr.deserialize_u8()?;
        Ok(())
    }

    fn calculate_slice_size(
        data: &[Self],
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_bytes_size(data.len(), current_alignment)
    }

    fn serialize_slice(data: &[Self], cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_bytes(data)
    }

    fn deserialize_slice(data: &mut [Self], cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.deserialize_bytes(data)
    }

    fn calculate_elements_size(
        data: &[Self],
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_bytes_size(data.len(), current_alignment)
    }

    fn serialize_elements(data: &[Self], cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_bytes(data)
    }

    fn deserialize_elements(data: &mut Vec<Self>, count: usize, cdr: &mut Cdr<'_>) -> Result<()> {
        let bytes = cdr.take(count, 1)?;
        data.extend_from_slice(bytes);
        Ok(())
    }
}

impl CdrSerializable for LongDouble {
    const IS_PRIMITIVE: bool = true;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_long_double_size(current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_long_double(*self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        *self = cdr.deserialize_long_double()?;
        Ok(())
    }
}

impl CdrSerializable for String {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_string_size(self.len(), current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_string(self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        *self = cdr.deserialize_string()?;
        Ok(())
    }
}

impl<T, const N: usize> CdrSerializable for [T; N]
where
    T: CdrSerializable,
{
    const IS_PRIMITIVE_ARRAY: bool = T::IS_PRIMITIVE_ARRAY;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_array_serialized_size(self, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_array(self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.deserialize_array(self)
    }

    fn calculate_flat_size(&self, calc: &mut CdrSizeCalculator, current_alignment: &mut usize) -> usize {
        T::calculate_slice_size(self, calc, current_alignment)
    }

    fn serialize_flat(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        T::serialize_slice(self, cdr)
    }

    fn deserialize_flat(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        T::deserialize_slice(self, cdr)
    }
}

impl<T> CdrSerializable for Vec<T>
where
    T: CdrSerializable + Default,
{
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_sequence_serialized_size(self, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_sequence(self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.deserialize_sequence(self)
    }
}

impl<K, V> CdrSerializable for BTreeMap<K, V>
where
    K: CdrSerializable + Default + Ord,
    V: CdrSerializable + Default,
{
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_map_serialized_size(self, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_map(self)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.deserialize_map(self)
    }
}

/// An optional value.
///
/// As a member it uses the optional member framing of the current encoding.
/// Anywhere else it is a presence flag followed by the value.
impl<T> CdrSerializable for Option<T>
where
    T: CdrSerializable + Default,
{
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        let flag = calc.calculate_primitive_size(1, current_alignment);
        flag + self
            .as_ref()
            .map_or(0, |v| v.calculate_serialized_size(calc, current_alignment))
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.rollback_on_error(|cdr| {
            cdr.serialize_bool(self.is_some())?;
            match self {
                Some(v) => v.serialize(cdr),
                None => Ok(()),
            }
        })
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.rollback_on_error(|cdr| {
            if cdr.deserialize_bool()? {
                self.get_or_insert_with(T::default).deserialize(cdr)
            } else {
                *self = None;
                Ok(())
            }
        })
    }

    fn calculate_member_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        id: MemberId,
        selection: XCdrHeaderSelection,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_opt_member_size_with(
            id,
            self.is_some(),
            selection,
            current_alignment,
            |calc, alignment| {
                self.as_ref()
                    .map_or(0, |v| v.calculate_serialized_size(calc, alignment))
            },
        )
    }

    fn serialize_member(
        &self,
        cdr: &mut Cdr<'_>,
        id: MemberId,
        selection: XCdrHeaderSelection,
    ) -> Result<()> {
        let frame = cdr.begin_serialize_opt_member(id, self.is_some(), selection)?;
        if let Some(v) = self {
            v.serialize(cdr)?;
        }
        cdr.end_serialize_opt_member(frame)
    }

    /// Inside a parameter list the member header was already consumed, so a
    /// member that shows up is present.
    fn deserialize_member(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        if cdr.encoding.is_parameter_list() {
            return self.get_or_insert_with(T::default).deserialize(cdr);
        }
        cdr.rollback_on_error(|cdr| {
            let frame = cdr.begin_deserialize_opt_member()?;
            if frame.is_present() {
                self.get_or_insert_with(T::default).deserialize(cdr)?;
            } else {
                *self = None;
            }
            cdr.end_deserialize_opt_member(frame)
        })
    }
}
