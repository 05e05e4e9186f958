#[macro_use]
extern crate serde_derive;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use xcdr::{
    Bounded, Cdr, Cdr2Be, Cdr2Le, CdrBe, CdrBuffer, CdrLe, CdrSerializable, CdrSizeCalculator,
    CdrVersion, DCdr2Be, DCdr2Le, EncodingAlgorithm, Encapsulation, Endianness, Error,
    Extensibility, External, Infinite, MemberId, MustUnderstandPolicy, PlCdr2Be, PlCdr2Le,
    PlCdrBe, PlCdrLe, Result, ENCAPSULATION_HEADER_SIZE,
};

/// Checks `element` against every encapsulation. `maybe_size` is the
/// expected size under plain XCDR1, the encapsulation included.
fn check<T>(element: T, maybe_size: Option<u64>)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
{
    let _ = env_logger::try_init();
    if let Some(size) = maybe_size {
        assert!(size >= ENCAPSULATION_HEADER_SIZE);
    }

    check_encapsulation::<T, CdrBe>(&element, maybe_size);
    check_encapsulation::<T, CdrLe>(&element, maybe_size);
    check_encapsulation::<T, PlCdrBe>(&element, None);
    check_encapsulation::<T, PlCdrLe>(&element, None);
    check_encapsulation::<T, Cdr2Be>(&element, None);
    check_encapsulation::<T, Cdr2Le>(&element, None);
    check_encapsulation::<T, DCdr2Be>(&element, None);
    check_encapsulation::<T, DCdr2Le>(&element, None);
    check_encapsulation::<T, PlCdr2Be>(&element, None);
    check_encapsulation::<T, PlCdr2Le>(&element, None);
}

fn check_encapsulation<T, C>(element: &T, maybe_size: Option<u64>)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
    C: Encapsulation,
{
    let size = xcdr::calc_serialized_size::<T, C>(element).unwrap();
    if let Some(expected) = maybe_size {
        assert_eq!(expected, size);
    }

    check_round_trip::<T, C>(element, size);
    check_capacity_shortage::<T, C>(element, size);
    check_size_limit::<T, C>(element, size);
}

fn check_round_trip<T, C>(element: &T, size: u64)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
    C: Encapsulation,
{
    let encoded = xcdr::serialize::<_, _, C>(element, Infinite).unwrap();
    assert_eq!(size, encoded.len() as u64);
    assert_eq!(C::ID, [encoded[0], encoded[1]]);

    let decoded = xcdr::deserialize::<T>(&encoded).unwrap();
    assert_eq!(*element, decoded);
}

fn check_capacity_shortage<T, C>(element: &T, size: u64)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
    C: Encapsulation,
{
    let mut buf = [0u8; 2000];
    let mut buf = Cursor::new(&mut buf[0..(size - 1) as usize]);
    assert!(xcdr::serialize_into::<_, _, _, C>(&mut buf, element, Infinite).is_err());
}

fn check_size_limit<T, C>(element: &T, size: u64)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
    C: Encapsulation,
{
    let bound = size - 1;
    assert!(matches!(
        xcdr::serialize::<_, _, C>(element, Bounded(bound)),
        Err(Error::SizeLimit)
    ));

    let encoded = xcdr::serialize::<_, _, C>(element, Bounded(size)).unwrap();
    let mut encoded = encoded.as_slice();
    assert!(xcdr::deserialize_from::<_, T, _>(&mut encoded, Bounded(bound)).is_err());
}

#[test]
fn test_octet() {
    check(u8::MIN, Some(4 + 1));
    check(u8::MAX, Some(4 + 1));
}

#[test]
fn test_char() {
    check('a', Some(4 + 1));
    check('\u{e9}', Some(4 + 1));
}

#[test]
fn test_unsigned_short() {
    check(u16::MIN, Some(4 + 2));
    check(u16::MAX, Some(4 + 2));
}

#[test]
fn test_short() {
    check(i16::MIN, Some(4 + 2));
    check(i16::MAX, Some(4 + 2));
}

#[test]
fn test_unsigned_long() {
    check(u32::MIN, Some(4 + 4));
    check(u32::MAX, Some(4 + 4));
}

#[test]
fn test_long() {
    check(i32::MIN, Some(4 + 4));
    check(i32::MAX, Some(4 + 4));
}

#[test]
fn test_unsigned_long_long() {
    check(u64::MIN, Some(4 + 8));
    check(u64::MAX, Some(4 + 8));
}

#[test]
fn test_long_long() {
    check(i64::MIN, Some(4 + 8));
    check(i64::MAX, Some(4 + 8));
}

#[test]
fn test_float() {
    check(f32::MIN, Some(4 + 4));
    check(f32::MAX, Some(4 + 4));
}

#[test]
fn test_double() {
    check(f64::MIN, Some(4 + 8));
    check(f64::MAX, Some(4 + 8));
}

#[test]
fn test_bool() {
    check(false, Some(4 + 1));
    check(true, Some(4 + 1));
}

#[test]
fn test_string() {
    check("".to_string(), Some(4 + 4));
    check("a".to_string(), Some(4 + 4 + 2));
    check("hello".to_string(), Some(4 + 4 + 6));
}

#[test]
fn test_unsigned_short_alignment() {
    check(('a', 1u16), Some(4 + 1 + 1 + 2));
    check((1u8, 1u16), Some(4 + 1 + 1 + 2));
    check((1u16, 1u16), Some(4 + 2 + 2));
    check((1u32, 1u16), Some(4 + 4 + 2));
    check((1f64, 1u16), Some(4 + 8 + 2));
    check((true, 1u16), Some(4 + 1 + 1 + 2));
    check(("a".to_string(), 1u16), Some(4 + 6 + 2));
}

#[test]
fn test_long_alignment() {
    check(('a', 1i32), Some(4 + 1 + 3 + 4));
    check((1i8, 1i32), Some(4 + 1 + 3 + 4));
    check((1i16, 1i32), Some(4 + 2 + 2 + 4));
    check((1i32, 1i32), Some(4 + 4 + 4));
    check((1f32, 1i32), Some(4 + 4 + 4));
    check((1f64, 1i32), Some(4 + 8 + 4));
    check((true, 1i32), Some(4 + 1 + 3 + 4));
    check(("a".to_string(), 1i32), Some(4 + 6 + 2 + 4));
}

#[test]
fn test_long_long_alignment() {
    check(('a', 1i64), Some(4 + 1 + 7 + 8));
    check((1u8, 1i64), Some(4 + 1 + 7 + 8));
    check((1i16, 1i64), Some(4 + 2 + 6 + 8));
    check((1u32, 1i64), Some(4 + 4 + 4 + 8));
    check((1f64, 1i64), Some(4 + 8 + 8));
    check((true, 1i64), Some(4 + 1 + 7 + 8));
    check(("a".to_string(), 1i64), Some(4 + 6 + 2 + 8));
}

#[test]
fn test_double_alignment() {
    check(('a', 1f64), Some(4 + 1 + 7 + 8));
    check((1u16, 1f64), Some(4 + 2 + 6 + 8));
    check((1i32, 1f64), Some(4 + 4 + 4 + 8));
    check((1f32, 1f64), Some(4 + 4 + 4 + 8));
    check((1f64, 1f64), Some(4 + 8 + 8));
    check(("a".to_string(), 1f64), Some(4 + 6 + 2 + 8));
}

#[test]
fn test_xcdr2_caps_alignment_at_four() {
    let value = (1u8, 1u64);
    assert_eq!(
        xcdr::calc_serialized_size::<_, CdrLe>(&value).unwrap(),
        4 + 1 + 7 + 8
    );
    assert_eq!(
        xcdr::calc_serialized_size::<_, Cdr2Le>(&value).unwrap(),
        4 + 1 + 3 + 8
    );
    assert_eq!(
        xcdr::serialize::<_, _, Cdr2Le>(&value, Infinite).unwrap(),
        vec![0, 7, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_seq_octet() {
    check(Vec::<u8>::new(), Some(4 + 4));
    check(vec![0u8, 1, 2], Some(4 + 4 + 3));
}

#[test]
fn test_seq_char() {
    check(Vec::<char>::new(), Some(4 + 4));
    check(vec!['a', 'b', 'c'], Some(4 + 4 + 3));
}

#[test]
fn test_seq_unsigned_long() {
    check(Vec::<u32>::new(), Some(4 + 4));
    check(vec![0u32, 1, 2], Some(4 + 4 + 4 * 3));
}

#[test]
fn test_seq_long_long() {
    check(Vec::<i64>::new(), Some(4 + 4));
    check(vec![0i64, 1, 2], Some(4 + 4 + 4 + 8 * 3));
}

#[test]
fn test_seq_double() {
    check(Vec::<f64>::new(), Some(4 + 4));
    check(vec![0f64, 1., 2.], Some(4 + 4 + 4 + 8 * 3));
}

#[test]
fn test_seq_bool() {
    check(Vec::<bool>::new(), Some(4 + 4));
    check(vec![false, true, false], Some(4 + 4 + 3));
}

#[test]
fn test_seq_string() {
    check(Vec::<String>::new(), Some(4 + 4));
    check(
        vec!["".to_string(), "a".to_string(), "b".to_string()],
        Some(4 + 4 + 4 + 6 + 2 + 6),
    );
}

#[test]
fn test_seq_in_seq() {
    check(vec![Vec::<usize>::new()], Some(4 + 8));
    check(vec![vec![1i64, 3, 5], vec![-1, -3, -5]], Some(4 + 64));
}

#[test]
fn test_array_octet() {
    check([] as [u8; 0], Some(4));
    check([0u8, 1, 2], Some(4 + 3));
}

#[test]
fn test_array_unsigned_long() {
    check([] as [u32; 0], Some(4));
    check([0u32, 1, 2], Some(4 + 12));
}

#[test]
fn test_array_double() {
    check([] as [f64; 0], Some(4));
    check([0f64, 1., 2.], Some(4 + 24));
}

#[test]
fn test_array_bool() {
    check([false, true, false], Some(4 + 3));
}

#[test]
fn test_array_string() {
    check([] as [String; 0], Some(4));
    check(
        ["".to_string(), "a".to_string(), "b".to_string()],
        Some(4 + 4 + 6 + 2 + 6),
    );
}

#[test]
fn test_array_in_array() {
    check([[]] as [[usize; 0]; 1], Some(4));
    check([[1.5f64, 2.5, 3.5], [4.5, 5.5, 6.5]], Some(4 + 48));
}

#[test]
fn test_tuple() {
    check(1u32, Some(4 + 4));
    check((1u32, 2i32), Some(4 + 4 + 4));
    check(
        (1u16, 2i16, 3.5f32, "hi".to_string()),
        Some(4 + 2 + 2 + 4 + 4 + 3),
    );
}

#[test]
fn test_tuple_containing_padding() {
    check((true, 1u64, 'z', 2.5f32), Some(4 + 24));
}

#[test]
fn test_map() {
    check(BTreeMap::<u32, String>::new(), Some(4 + 4));
    let map: BTreeMap<u32, String> = vec![(1, "a".to_string()), (2, "bc".to_string())]
        .into_iter()
        .collect();
    check(map, Some(4 + 4 + 4 + 6 + 2 + 4 + 7));
}

#[test]
fn test_struct() {
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct S {
        c: char,
        n: i32,
        b: bool,
        m: u64,
        s: String,
    }

    check(
        S {
            c: 'x',
            n: -7,
            b: true,
            m: 17,
            s: "hello".to_string(),
        },
        Some(4 + 34),
    );
}

#[test]
fn test_struct_in_struct() {
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Outer {
        i: Inner1,
        ii: Inner2,
        iii: Inner3,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Inner1 {
        a: i32,
        b: u64,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Inner2 {
        a: bool,
        b: f64,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Inner3 {
        a: char,
        b: f32,
    }

    check(
        Outer {
            i: Inner1 { a: -3, b: 5 },
            ii: Inner2 { a: false, b: 1.5 },
            iii: Inner3 { a: 'a', b: 1.75 },
        },
        Some(4 + 40),
    );
}

#[test]
fn test_nested_struct_as_parameter_list() {
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Outer {
        id: u16,
        inner: Inner,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Inner {
        v: u8,
    }

    let value = Outer {
        id: 0x7DDC,
        inner: Inner { v: 5 },
    };
    assert_eq!(
        xcdr::serialize::<_, _, PlCdrBe>(&value, Infinite).unwrap(),
        vec![
            0, 2, 0, 0, // encapsulation
            0, 0, 0, 2, 0x7D, 0xDC, 0, 0, // id
            0, 1, 0, 12, // inner
            0, 0, 0, 1, 5, 0, 0, 0, 0x3F, 0x02, 0, 0, // inner.v and sentinel
            0x3F, 0x02, 0, 0, // sentinel
        ]
    );
    assert_eq!(
        xcdr::serialize::<_, _, PlCdr2Le>(&value, Infinite).unwrap(),
        vec![
            0, 11, 0, 0, 21, 0, 0, 0, // encapsulation, DHEADER
            0, 0, 0, 0x10, 0xDC, 0x7D, 0, 0, // id
            1, 0, 0, 0x50, 5, 0, 0, 0, // inner, its DHEADER shared as NEXTINT
            0, 0, 0, 0, 5, // inner.v
        ]
    );
}

#[test]
fn test_enum() {
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum E {
        One = 0,
        Two,
        Three,
    }

    check(vec![E::One, E::Two, E::Three], Some(4 + 4 + 4 * 3));
    check(
        vec![E::One as u32, E::Two as u32, E::Three as u32],
        Some(4 + 4 + 4 * 3),
    );
}

#[test]
fn test_union() {
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum U {
        A(u32),
        B(i16, u32, u64),
        C { c: char, n: u32, b: bool, v: Vec<u8> },
        D,
    }

    check(U::A(3), Some(4 + 4 + 4));
    check(U::B(1, 2, 3), Some(4 + 4 + 2 + 2 + 4 + 4 + 8));
    check(
        U::C {
            c: 'a',
            n: 5,
            b: true,
            v: vec![1, 1, 2, 3, 5],
        },
        Some(4 + 4 + 1 + 3 + 4 + 1 + 3 + 4 + 5),
    );
    check(U::D, Some(4 + 4));
}

#[test]
fn test_unsupported() {
    fn check_type_not_supported<T: Debug>(res: Result<T>) {
        match res {
            Err(Error::TypeNotSupported) => (),
            e => panic!("unexpected result: {:?}", e),
        }
    }

    check_type_not_supported(xcdr::serialize::<_, _, CdrBe>(&Some(1usize), Infinite));
    check_type_not_supported(xcdr::serialize::<_, _, CdrBe>(&None::<usize>, Infinite));
    check_type_not_supported(xcdr::deserialize::<Option<usize>>(&[0; 16]));

    assert!(matches!(
        xcdr::serialize::<_, _, CdrLe>(&'\u{20AC}', Infinite),
        Err(Error::InvalidChar('\u{20AC}'))
    ));
    assert!(matches!(
        xcdr::deserialize::<bool>(&[0, 1, 0, 0, 2]),
        Err(Error::InvalidBoolEncoding(2))
    ));
}

#[derive(Debug, Default, PartialEq)]
struct Inner {
    a: u16,
    text: String,
}

impl CdrSerializable for Inner {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        let previous = calc.encoding();
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Appendable, calc.cdr_version());
        calc.begin_calculate_type_serialized_size(encoding, current_alignment)
            + calc.calculate_member_serialized_size(0, &self.a, current_alignment)
            + calc.calculate_member_serialized_size(1, &self.text, current_alignment)
            + calc.end_calculate_type_serialized_size(previous, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Appendable, cdr.cdr_version());
        let state = cdr.begin_serialize_type(encoding)?;
        cdr.serialize_member(0, &self.a)?;
        cdr.serialize_member(1, &self.text)?;
        cdr.end_serialize_type(&state)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Appendable, cdr.cdr_version());
        cdr.deserialize_type(encoding, |cdr, id| {
            match id.id {
                0 => cdr.deserialize_member(&mut self.a)?,
                1 => cdr.deserialize_member(&mut self.text)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }
}

#[derive(Debug, Default, PartialEq)]
struct Outer {
    id: u32,
    inner: Inner,
    flag: Option<u8>,
}

impl CdrSerializable for Outer {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        let previous = calc.encoding();
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, calc.cdr_version());
        calc.begin_calculate_type_serialized_size(encoding, current_alignment)
            + calc.calculate_member_serialized_size(0, &self.id, current_alignment)
            + calc.calculate_member_serialized_size(1, &self.inner, current_alignment)
            + calc.calculate_member_serialized_size(2, &self.flag, current_alignment)
            + calc.end_calculate_type_serialized_size(previous, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, cdr.cdr_version());
        let state = cdr.begin_serialize_type(encoding)?;
        cdr.serialize_member(0, &self.id)?;
        cdr.serialize_member(1, &self.inner)?;
        cdr.serialize_member(2, &self.flag)?;
        cdr.end_serialize_type(&state)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, cdr.cdr_version());
        cdr.deserialize_type(encoding, |cdr, id| {
            match id.id {
                0 => cdr.deserialize_member(&mut self.id)?,
                1 => cdr.deserialize_member(&mut self.inner)?,
                2 => cdr.deserialize_member(&mut self.flag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }
}

fn sample() -> Outer {
    Outer {
        id: 7,
        inner: Inner {
            a: 1,
            text: "hi".to_string(),
        },
        flag: Some(3),
    }
}

/// Encodes `value` after an encapsulation and checks the calculator agrees.
fn encode<T>(value: &T, encoding: EncodingAlgorithm, endianness: Endianness) -> Vec<u8>
where
    T: CdrSerializable,
{
    let mut cdr = Cdr::new(CdrBuffer::new(), endianness, encoding.cdr_version());
    cdr.set_encoding_flag(encoding).unwrap();
    cdr.serialize_encapsulation().unwrap();
    cdr.serialize(value).unwrap();

    let mut calc = CdrSizeCalculator::with_encoding(encoding);
    let mut alignment = 0;
    assert_eq!(
        calc.calculate_serialized_size(value, &mut alignment) + 4,
        cdr.serialized_data_length()
    );
    cdr.serialized_data().to_vec()
}

fn decode<T>(bytes: &[u8], version: CdrVersion) -> Result<T>
where
    T: CdrSerializable + Default,
{
    let mut cdr = Cdr::from_bytes(bytes, version);
    cdr.read_encapsulation()?;
    cdr.deserialize_value()
}

#[test]
fn test_primitive_in_every_encapsulation() {
    let _ = env_logger::try_init();
    for encoding in EncodingAlgorithm::ALL {
        for endianness in [Endianness::Big, Endianness::Little] {
            let bytes = encode(&0x7DDCu16, encoding, endianness);
            let id = xcdr::representation_id(encoding, endianness);
            let value = match endianness {
                Endianness::Big => [0x7D, 0xDC],
                Endianness::Little => [0xDC, 0x7D],
            };
            assert_eq!(bytes, vec![0, id, 0, 0, value[0], value[1]]);
            assert_eq!(
                decode::<u16>(&bytes, encoding.cdr_version()).unwrap(),
                0x7DDC
            );
        }
    }
}

#[test]
fn test_corba_cdr() {
    let mut cdr = Cdr::new(CdrBuffer::new(), Endianness::Little, CdrVersion::CorbaCdr);
    cdr.serialize_encapsulation().unwrap();
    cdr.serialize(&0x7DDCu16).unwrap();
    cdr.serialize(&1u64).unwrap();
    assert_eq!(
        cdr.serialized_data(),
        &[1, 0xDC, 0x7D, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
    );

    let bytes = cdr.serialized_data().to_vec();
    let mut cdr = Cdr::from_bytes(&bytes, CdrVersion::CorbaCdr);
    cdr.read_encapsulation().unwrap();
    assert_eq!(cdr.endianness(), Endianness::Little);
    assert_eq!(cdr.deserialize_value::<u16>().unwrap(), 0x7DDC);
    assert_eq!(cdr.deserialize_value::<u64>().unwrap(), 1);
}

#[test]
fn test_mutable_struct_in_pl_cdr() {
    let bytes = encode(&sample(), EncodingAlgorithm::PlCdr, Endianness::Little);
    assert_eq!(
        bytes,
        vec![
            0, 3, 0, 0, // encapsulation
            0, 0, 4, 0, 7, 0, 0, 0, // id
            1, 0, 11, 0, 1, 0, 0, 0, 3, 0, 0, 0, b'h', b'i', 0, 0, // inner
            2, 0, 1, 0, 3, 0, 0, 0, // flag
            0x02, 0x3F, 0, 0, // sentinel
        ]
    );
    assert_eq!(decode::<Outer>(&bytes, CdrVersion::XCdrV1).unwrap(), sample());
}

#[test]
fn test_mutable_struct_in_pl_cdr2() {
    let bytes = encode(&sample(), EncodingAlgorithm::PlCdr2, Endianness::Little);
    assert_eq!(
        bytes,
        vec![
            0, 11, 0, 0, 33, 0, 0, 0, // encapsulation, DHEADER
            0, 0, 0, 0x20, 7, 0, 0, 0, // id
            1, 0, 0, 0x50, 11, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, b'h', b'i', 0, 0, // inner
            2, 0, 0, 0, 3, // flag
        ]
    );
    assert_eq!(decode::<Outer>(&bytes, CdrVersion::XCdrV2).unwrap(), sample());
}

#[derive(Debug, Default, PartialEq)]
struct Ids {
    near: u16,
    far: u16,
}

impl CdrSerializable for Ids {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        let previous = calc.encoding();
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, calc.cdr_version());
        calc.begin_calculate_type_serialized_size(encoding, current_alignment)
            + calc.calculate_member_serialized_size(3, &self.near, current_alignment)
            + calc.calculate_member_serialized_size(0x3FFF, &self.far, current_alignment)
            + calc.end_calculate_type_serialized_size(previous, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, cdr.cdr_version());
        let state = cdr.begin_serialize_type(encoding)?;
        cdr.serialize_member(3, &self.near)?;
        cdr.serialize_member(0x3FFF, &self.far)?;
        cdr.end_serialize_type(&state)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding =
            EncodingAlgorithm::for_extensibility(Extensibility::Mutable, cdr.cdr_version());
        cdr.deserialize_type(encoding, |cdr, id| {
            match id.id {
                3 => cdr.deserialize_member(&mut self.near)?,
                0x3FFF => cdr.deserialize_member(&mut self.far)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }
}

#[test]
fn test_member_header_follows_member_id() {
    let value = Ids {
        near: 0x7DDC,
        far: 0x7DDC,
    };

    let bytes = encode(&value, EncodingAlgorithm::PlCdr, Endianness::Little);
    assert_eq!(
        bytes,
        vec![
            0, 3, 0, 0, // encapsulation
            3, 0, 2, 0, 0xDC, 0x7D, 0, 0, // short header
            0x01, 0x3F, 8, 0, 0xFF, 0x3F, 0, 0, 2, 0, 0, 0, 0xDC, 0x7D, 0, 0, // extended header
            0x02, 0x3F, 0, 0, // sentinel
        ]
    );
    assert_eq!(decode::<Ids>(&bytes, CdrVersion::XCdrV1).unwrap(), value);

    let bytes = encode(&value, EncodingAlgorithm::PlCdr2, Endianness::Little);
    assert_eq!(
        bytes,
        vec![
            0, 11, 0, 0, 14, 0, 0, 0, // encapsulation, DHEADER
            3, 0, 0, 0x10, 0xDC, 0x7D, 0, 0, // id 3
            0xFF, 0x3F, 0, 0x10, 0xDC, 0x7D, // id 0x3FFF
        ]
    );
    assert_eq!(decode::<Ids>(&bytes, CdrVersion::XCdrV2).unwrap(), value);
}

#[test]
fn test_mutable_struct_round_trip() {
    let _ = env_logger::try_init();
    let absent = Outer {
        flag: None,
        ..sample()
    };
    for value in [sample(), absent] {
        for encoding in EncodingAlgorithm::ALL {
            for endianness in [Endianness::Big, Endianness::Little] {
                let bytes = encode(&value, encoding, endianness);
                assert_eq!(
                    decode::<Outer>(&bytes, encoding.cdr_version()).unwrap(),
                    value,
                    "{:?} {:?}",
                    encoding,
                    endianness
                );
            }
        }
    }
}

#[test]
fn test_zero_length_trailing_sequence() {
    for version in [CdrVersion::XCdrV1, CdrVersion::XCdrV2] {
        let mut cdr = Cdr::new(CdrBuffer::new(), Endianness::Little, version);
        cdr.serialize_encapsulation().unwrap();
        cdr.serialize(&7u32).unwrap();
        cdr.serialize(&Vec::<String>::new()).unwrap();
        let bytes = cdr.serialized_data().to_vec();

        let mut cdr = Cdr::from_bytes(&bytes, version);
        cdr.read_encapsulation().unwrap();
        assert_eq!(cdr.deserialize_value::<u32>().unwrap(), 7);
        assert!(cdr.deserialize_value::<Vec<String>>().unwrap().is_empty());
        assert_eq!(cdr.position(), bytes.len());
    }
}

#[test]
fn test_fixed_buffer_shortage() {
    let mut storage = [0u8; 6];
    let mut cdr = Cdr::new(
        CdrBuffer::from_slice(&mut storage),
        Endianness::Big,
        CdrVersion::XCdrV1,
    );
    cdr.serialize_encapsulation().unwrap();
    assert!(matches!(
        cdr.serialize(&1u32),
        Err(Error::NotEnoughMemory { .. })
    ));
    assert_eq!(cdr.position(), 4);
    cdr.serialize(&0x7DDCu16).unwrap();
    assert_eq!(cdr.serialized_data(), &[0, 0, 0, 0, 0x7D, 0xDC]);
}

fn write_with_must_understand(encoding: EncodingAlgorithm) -> Vec<u8> {
    let mut cdr = Cdr::new(CdrBuffer::new(), Endianness::Little, encoding.cdr_version());
    cdr.set_encoding_flag(encoding).unwrap();
    cdr.serialize_encapsulation().unwrap();
    let state = cdr.begin_serialize_type(encoding).unwrap();
    cdr.serialize_member(0, &7u32).unwrap();
    cdr.serialize_member(MemberId::must_understand(5), &9u32).unwrap();
    cdr.end_serialize_type(&state).unwrap();
    cdr.serialized_data().to_vec()
}

fn read_first_member(
    bytes: &[u8],
    encoding: EncodingAlgorithm,
    policy: MustUnderstandPolicy,
) -> Result<u32> {
    let mut cdr = Cdr::from_bytes(bytes, encoding.cdr_version());
    cdr.set_must_understand_policy(policy);
    cdr.read_encapsulation()?;
    let mut first = 0u32;
    cdr.deserialize_type(encoding, |cdr, id| match id.id {
        0 => cdr.deserialize_member(&mut first).map(|()| true),
        _ => Ok(false),
    })?;
    Ok(first)
}

#[test]
fn test_must_understand_policies() {
    let _ = env_logger::try_init();
    for encoding in [EncodingAlgorithm::PlCdr, EncodingAlgorithm::PlCdr2] {
        let bytes = write_with_must_understand(encoding);
        assert!(matches!(
            read_first_member(&bytes, encoding, MustUnderstandPolicy::Reject),
            Err(Error::MustUnderstandMember(5))
        ));
        assert_eq!(
            read_first_member(&bytes, encoding, MustUnderstandPolicy::Skip).unwrap(),
            7
        );
    }
}

#[test]
fn test_external_member() {
    let shared = Arc::new(RwLock::new("shared".to_string()));
    let ext = External::from_shared(Some(shared.clone()));
    let bytes = encode(&ext, EncodingAlgorithm::PlainCdr2, Endianness::Big);
    assert_eq!(
        bytes,
        vec![0, 6, 0, 0, 0, 0, 0, 7, b's', b'h', b'a', b'r', b'e', b'd', 0]
    );

    let decoded = decode::<External<String>>(&bytes, CdrVersion::XCdrV2).unwrap();
    assert_eq!(*decoded.get().unwrap(), "shared");
    assert_ne!(decoded, ext);

    *shared.write().unwrap() = "changed".to_string();
    assert_eq!(*ext.get().unwrap(), "changed");
}

/// Writes `value` into a buffer of exactly its calculated size and into a one
/// byte buffer, then reads it back from exactly the bytes written.
fn check_fixed_buffers<T>(value: T)
where
    T: CdrSerializable + Default + PartialEq + Debug,
{
    let _ = env_logger::try_init();
    for version in [CdrVersion::XCdrV1, CdrVersion::XCdrV2] {
        for endianness in [Endianness::Big, Endianness::Little] {
            let mut calc = CdrSizeCalculator::new(version);
            let mut alignment = 0;
            let size = calc.calculate_serialized_size(&value, &mut alignment);

            let mut storage = vec![0u8; size];
            let mut cdr = Cdr::new(CdrBuffer::from_slice(&mut storage), endianness, version);
            cdr.serialize(&value).unwrap();
            assert_eq!(cdr.serialized_data_length(), size, "{:?} {:?}", version, value);

            if size > 1 {
                let mut byte = [0u8; 1];
                let mut cdr = Cdr::new(CdrBuffer::from_slice(&mut byte), endianness, version);
                assert!(
                    matches!(cdr.serialize(&value), Err(Error::NotEnoughMemory { .. })),
                    "{:?} {:?}",
                    version,
                    value
                );
            }

            let mut cdr = Cdr::new(CdrBuffer::from_bytes(&storage), endianness, version);
            assert_eq!(cdr.deserialize_value::<T>().unwrap(), value);
            assert_eq!(cdr.position(), size);
        }
    }
}

#[test]
fn test_empty_sequences_in_exact_buffers() {
    check_fixed_buffers(Vec::<u8>::new());
    check_fixed_buffers(Vec::<i8>::new());
    check_fixed_buffers(Vec::<bool>::new());
    check_fixed_buffers(Vec::<char>::new());
    check_fixed_buffers(Vec::<u16>::new());
    check_fixed_buffers(Vec::<i16>::new());
    check_fixed_buffers(Vec::<u32>::new());
    check_fixed_buffers(Vec::<i32>::new());
    check_fixed_buffers(Vec::<f32>::new());
    check_fixed_buffers(Vec::<u64>::new());
    check_fixed_buffers(Vec::<i64>::new());
    check_fixed_buffers(Vec::<f64>::new());
    check_fixed_buffers(Vec::<String>::new());

    let mut cdr = Cdr::from_bytes(&[0, 0, 0, 0], CdrVersion::XCdrV1);
    assert!(cdr.deserialize_value::<Vec<u64>>().unwrap().is_empty());
    assert_eq!(cdr.position(), 4);
}

#[test]
fn test_primitives_in_exact_buffers() {
    check_fixed_buffers(0x7Du8);
    check_fixed_buffers(-3i8);
    check_fixed_buffers(true);
    check_fixed_buffers('z');
    check_fixed_buffers(0x7DDCu16);
    check_fixed_buffers(-3i16);
    check_fixed_buffers(0x7DDC_0102u32);
    check_fixed_buffers(-3i32);
    check_fixed_buffers(1.5f32);
    check_fixed_buffers(0x7DDC_0102_0304_0506u64);
    check_fixed_buffers(-3i64);
    check_fixed_buffers(1.5f64);
    check_fixed_buffers(String::new());
    check_fixed_buffers("hello".to_string());
}

#[test]
fn test_collections_in_exact_buffers() {
    check_fixed_buffers(vec![1u8, 2, 3]);
    check_fixed_buffers(vec!['a', 'b']);
    check_fixed_buffers(vec![1u16, 2, 3]);
    check_fixed_buffers(vec![1u64, 2]);
    check_fixed_buffers(vec!["a".to_string(), "bc".to_string()]);
    check_fixed_buffers(vec![vec![1i32], vec![]]);
    check_fixed_buffers([1u32, 2, 3]);
    check_fixed_buffers([[1u8, 2], [3, 4]]);
    check_fixed_buffers(["x".to_string(), String::new()]);
    check_fixed_buffers(Some(5u32));
    check_fixed_buffers(None::<u32>);

    let map: BTreeMap<u32, String> = vec![(1, "a".to_string()), (2, "bc".to_string())]
        .into_iter()
        .collect();
    check_fixed_buffers(map);
    let map: BTreeMap<String, u64> = vec![("a".to_string(), 1), ("bc".to_string(), 2)]
        .into_iter()
        .collect();
    check_fixed_buffers(map);
    check_fixed_buffers(BTreeMap::<u16, String>::new());
}

#[derive(Debug, Default, PartialEq)]
struct Pair {
    a: u32,
    b: u32,
}

impl CdrSerializable for Pair {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        let previous = calc.encoding();
        let encoding = EncodingAlgorithm::for_extensibility(Extensibility::Final, calc.cdr_version());
        calc.begin_calculate_type_serialized_size(encoding, current_alignment)
            + calc.calculate_member_serialized_size(0, &self.a, current_alignment)
            + calc.calculate_member_serialized_size(1, &self.b, current_alignment)
            + calc.end_calculate_type_serialized_size(previous, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding = EncodingAlgorithm::for_extensibility(Extensibility::Final, cdr.cdr_version());
        let state = cdr.begin_serialize_type(encoding)?;
        cdr.serialize_member(0, &self.a)?;
        cdr.serialize_member(1, &self.b)?;
        cdr.end_serialize_type(&state)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let encoding = EncodingAlgorithm::for_extensibility(Extensibility::Final, cdr.cdr_version());
        cdr.deserialize_type(encoding, |cdr, id| {
            match id.id {
                0 => cdr.deserialize_member(&mut self.a)?,
                1 => cdr.deserialize_member(&mut self.b)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }
}

#[test]
fn test_truncated_final_struct() {
    let value = Pair { a: 1, b: 2 };
    for encoding in [EncodingAlgorithm::PlainCdr, EncodingAlgorithm::PlainCdr2] {
        let bytes = encode(&value, encoding, Endianness::Big);
        assert_eq!(decode::<Pair>(&bytes, encoding.cdr_version()).unwrap(), value);
        assert!(matches!(
            decode::<Pair>(&bytes[..bytes.len() - 4], encoding.cdr_version()),
            Err(Error::NotEnoughMemory { .. })
        ));
    }
}

/// Encodes `value` through serde and through [`CdrSerializable`] and checks
/// both give the same bytes, each readable by the other.
fn check_front_ends_agree<T, C>(value: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + CdrSerializable + Default + PartialEq + Debug,
    C: Encapsulation,
{
    let from_serde = xcdr::serialize::<_, _, C>(value, Infinite).unwrap();
    let from_cdr = encode(value, C::ENCODING, C::ENDIANNESS);
    assert_eq!(from_serde, from_cdr, "{:?}", value);
    assert_eq!(
        xcdr::calc_serialized_size::<_, C>(value).unwrap(),
        from_serde.len() as u64
    );
    assert_eq!(decode::<T>(&from_serde, CdrVersion::XCdrV2).unwrap(), *value);
    assert_eq!(xcdr::deserialize::<T>(&from_cdr).unwrap(), *value);
}

#[test]
fn test_serde_collections_match_serializable_ones() {
    let _ = env_logger::try_init();
    let strings = vec!["a".to_string(), "bc".to_string()];
    check_front_ends_agree::<_, Cdr2Le>(&strings);
    check_front_ends_agree::<_, Cdr2Be>(&strings);
    assert_eq!(
        xcdr::serialize::<_, _, Cdr2Be>(&strings, Infinite).unwrap(),
        vec![
            0, 6, 0, 0, 0, 0, 0, 19, // encapsulation, DHEADER
            0, 0, 0, 2, // count
            0, 0, 0, 2, b'a', 0, 0, 0, // "a" and padding
            0, 0, 0, 3, b'b', b'c', 0, // "bc"
        ]
    );

    check_front_ends_agree::<_, Cdr2Le>(&["x".to_string(), "yz".to_string()]);
    check_front_ends_agree::<_, Cdr2Le>(&vec![vec![1u16, 2], vec![]]);
    check_front_ends_agree::<_, Cdr2Le>(&[[1u32, 2], [3, 4]]);
    check_front_ends_agree::<_, Cdr2Le>(&vec![1u64, 2]);

    let map: BTreeMap<u32, String> = vec![(1, "a".to_string()), (2, "bc".to_string())]
        .into_iter()
        .collect();
    check_front_ends_agree::<_, Cdr2Le>(&map);
    check_front_ends_agree::<_, Cdr2Be>(&map);
    let map: BTreeMap<String, u32> = vec![("a".to_string(), 1), ("bc".to_string(), 2)]
        .into_iter()
        .collect();
    check_front_ends_agree::<_, Cdr2Le>(&map);
}

#[test]
fn test_empty_collections_cross_decode() {
    // Without elements serde cannot tell the element type, so it writes no
    // DHEADER; both readers accept either form.
    let from_serde = xcdr::serialize::<_, _, Cdr2Le>(&Vec::<String>::new(), Infinite).unwrap();
    assert_eq!(from_serde, vec![0, 7, 0, 0, 0, 0, 0, 0]);
    assert!(decode::<Vec<String>>(&from_serde, CdrVersion::XCdrV2)
        .unwrap()
        .is_empty());

    let from_cdr = encode(&Vec::<String>::new(), EncodingAlgorithm::PlainCdr2, Endianness::Little);
    assert_eq!(from_cdr, vec![0, 7, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
    assert!(xcdr::deserialize::<Vec<String>>(&from_cdr).unwrap().is_empty());

    let from_serde =
        xcdr::serialize::<_, _, Cdr2Le>(&BTreeMap::<u32, String>::new(), Infinite).unwrap();
    assert!(decode::<BTreeMap<u32, String>>(&from_serde, CdrVersion::XCdrV2)
        .unwrap()
        .is_empty());
    let from_cdr = encode(
        &BTreeMap::<u32, String>::new(),
        EncodingAlgorithm::PlainCdr2,
        Endianness::Little,
    );
    assert!(xcdr::deserialize::<BTreeMap<u32, String>>(&from_cdr)
        .unwrap()
        .is_empty());
}

/// A map written key by key rather than entry by entry.
struct SplitEntries(BTreeMap<u32, String>);

impl serde::Serialize for SplitEntries {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_key(k)?;
            map.serialize_value(v)?;
        }
        map.end()
    }
}

#[test]
fn test_map_written_key_by_key() {
    let map: BTreeMap<u32, String> = vec![(1, "a".to_string()), (2, "bc".to_string())]
        .into_iter()
        .collect();
    let split = SplitEntries(map.clone());
    let bytes = xcdr::serialize::<_, _, Cdr2Be>(&split, Infinite).unwrap();
    assert_eq!(bytes, xcdr::serialize::<_, _, Cdr2Be>(&map, Infinite).unwrap());
    assert_eq!(
        xcdr::calc_serialized_size::<_, Cdr2Be>(&split).unwrap(),
        bytes.len() as u64
    );
    assert_eq!(xcdr::deserialize::<BTreeMap<u32, String>>(&bytes).unwrap(), map);
}
