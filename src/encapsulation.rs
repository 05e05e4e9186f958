//! Encapsulation headers, byte orders and XCDR encoding algorithms.

use crate::error::{Error, Result};

pub const ENCAPSULATION_HEADER_SIZE: u64 = 4;

/// Byte order of multi-byte primitives.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    /// Byte order of the running platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    const fn flag(self) -> u8 {
        match self {
            Endianness::Big => 0x0,
            Endianness::Little => 0x1,
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::native()
    }
}

/// Encoding algorithm of an aggregate, as carried by the representation id.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EncodingAlgorithm {
    /// XCDR1 plain encoding, also the layout of CORBA CDR.
    PlainCdr,
    /// XCDR1 parameter list.
    PlCdr,
    /// XCDR2 plain encoding.
    PlainCdr2,
    /// XCDR2 encoding with a DHEADER in front of the aggregate.
    DelimitCdr2,
    /// XCDR2 parameter list.
    PlCdr2,
}

impl EncodingAlgorithm {
    pub const ALL: [EncodingAlgorithm; 5] = [
        EncodingAlgorithm::PlainCdr,
        EncodingAlgorithm::PlCdr,
        EncodingAlgorithm::PlainCdr2,
        EncodingAlgorithm::DelimitCdr2,
        EncodingAlgorithm::PlCdr2,
    ];

    const fn flag(self) -> u8 {
        match self {
            EncodingAlgorithm::PlainCdr => 0x0,
            EncodingAlgorithm::PlCdr => 0x2,
            EncodingAlgorithm::PlainCdr2 => 0x6,
            EncodingAlgorithm::DelimitCdr2 => 0x8,
            EncodingAlgorithm::PlCdr2 => 0xa,
        }
    }

    /// Codec version able to produce this encoding.
    pub const fn cdr_version(self) -> CdrVersion {
        match self {
            EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlCdr => CdrVersion::XCdrV1,
            _ => CdrVersion::XCdrV2,
        }
    }

    /// Whether members are introduced by a member header.
    pub const fn is_parameter_list(self) -> bool {
        matches!(self, EncodingAlgorithm::PlCdr | EncodingAlgorithm::PlCdr2)
    }

    /// Whether the aggregate is preceded by a DHEADER.
    pub const fn has_dheader(self) -> bool {
        matches!(self, EncodingAlgorithm::DelimitCdr2 | EncodingAlgorithm::PlCdr2)
    }

    /// Encoding an aggregate of the given extensibility uses under `version`.
    pub const fn for_extensibility(extensibility: Extensibility, version: CdrVersion) -> Self {
        match (version, extensibility) {
            (CdrVersion::CorbaCdr, _) => EncodingAlgorithm::PlainCdr,
            (CdrVersion::XCdrV1, Extensibility::Mutable) => EncodingAlgorithm::PlCdr,
            (CdrVersion::XCdrV1, _) => EncodingAlgorithm::PlainCdr,
            (CdrVersion::XCdrV2, Extensibility::Final) => EncodingAlgorithm::PlainCdr2,
            (CdrVersion::XCdrV2, Extensibility::Appendable) => EncodingAlgorithm::DelimitCdr2,
            (CdrVersion::XCdrV2, Extensibility::Mutable) => EncodingAlgorithm::PlCdr2,
        }
    }
}

/// Version of the wire format a codec speaks.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum CdrVersion {
    /// Classic CDR, one-byte encapsulation and no member framing.
    CorbaCdr,
    /// Extended CDR version 1.
    XCdrV1,
    /// Extended CDR version 2.
    XCdrV2,
}

impl CdrVersion {
    /// Encoding a fresh codec of this version starts with.
    pub const fn default_encoding(self) -> EncodingAlgorithm {
        match self {
            CdrVersion::CorbaCdr | CdrVersion::XCdrV1 => EncodingAlgorithm::PlainCdr,
            CdrVersion::XCdrV2 => EncodingAlgorithm::PlainCdr2,
        }
    }

    /// Whether the codec of this version can use `encoding`.
    pub const fn supports(self, encoding: EncodingAlgorithm) -> bool {
        match self {
            CdrVersion::CorbaCdr => matches!(encoding, EncodingAlgorithm::PlainCdr),
            CdrVersion::XCdrV1 => {
                matches!(encoding, EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlCdr)
            }
            CdrVersion::XCdrV2 => matches!(
                encoding,
                EncodingAlgorithm::PlainCdr2
                    | EncodingAlgorithm::DelimitCdr2
                    | EncodingAlgorithm::PlCdr2
            ),
        }
    }

    /// Largest alignment a primitive is ever padded to.
    pub(crate) const fn max_alignment(self) -> usize {
        match self {
            CdrVersion::XCdrV2 => 4,
            _ => 8,
        }
    }
}

/// IDL extensibility kind of an aggregate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Extensibility {
    Final,
    Appendable,
    Mutable,
}

/// Representation identifier of an encoding/endianness pair.
///
/// The result is also the flat ordinal `0..=11` used to index per-encoding tables.
pub const fn representation_id(encoding: EncodingAlgorithm, endianness: Endianness) -> u8 {
    encoding.flag() | endianness.flag()
}

/// Splits a representation identifier into its encoding and endianness.
pub fn from_representation_id(id: u8) -> Result<(EncodingAlgorithm, Endianness)> {
    let endianness = if id & 0x1 == 0 {
        Endianness::Big
    } else {
        Endianness::Little
    };
    let encoding = match id & !0x1 {
        0x0 => EncodingAlgorithm::PlainCdr,
        0x2 => EncodingAlgorithm::PlCdr,
        0x6 => EncodingAlgorithm::PlainCdr2,
        0x8 => EncodingAlgorithm::DelimitCdr2,
        0xa => EncodingAlgorithm::PlCdr2,
        _ => return Err(Error::InvalidEncapsulation),
    };
    Ok((encoding, endianness))
}

/// Data encapsulation scheme identifiers.
pub trait Encapsulation {
    const ENCODING: EncodingAlgorithm;
    const ENDIANNESS: Endianness;
    const ID: [u8; 2] = [0, representation_id(Self::ENCODING, Self::ENDIANNESS)];
    const OPTION: [u8; 2] = [0; 2];
}

macro_rules! impl_encapsulation {
    ($(#[$doc:meta] $name:ident => $encoding:ident, $endianness:ident;)*) => {
        $(
            #[$doc]
            #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
            pub enum $name {}

            impl Encapsulation for $name {
                const ENCODING: EncodingAlgorithm = EncodingAlgorithm::$encoding;
                const ENDIANNESS: Endianness = Endianness::$endianness;
            }
        )*
    };
}

impl_encapsulation! {
    /// OMG CDR big-endian encapsulation.
    CdrBe => PlainCdr, Big;
    /// OMG CDR little-endian encapsulation.
    CdrLe => PlainCdr, Little;
    /// ParameterList encapsulated using OMG CDR big-endian encapsulation.
    PlCdrBe => PlCdr, Big;
    /// ParameterList encapsulated using OMG CDR little-endian encapsulation.
    PlCdrLe => PlCdr, Little;
    /// XCDR2 plain big-endian encapsulation.
    Cdr2Be => PlainCdr2, Big;
    /// XCDR2 plain little-endian encapsulation.
    Cdr2Le => PlainCdr2, Little;
    /// XCDR2 delimited big-endian encapsulation.
    DCdr2Be => DelimitCdr2, Big;
    /// XCDR2 delimited little-endian encapsulation.
    DCdr2Le => DelimitCdr2, Little;
    /// XCDR2 parameter list big-endian encapsulation.
    PlCdr2Be => PlCdr2, Big;
    /// XCDR2 parameter list little-endian encapsulation.
    PlCdr2Le => PlCdr2, Little;
}
