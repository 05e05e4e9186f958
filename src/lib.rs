//! An encoding/decoding engine for OMG Common Data Representation (CDR) and
//! the extended XCDR1/XCDR2 forms used by DDS.
//!
//! Two entry points share the same wire engine:
//!
//! * [`Cdr`] with the [`CdrSerializable`] trait, which gives full control over
//!   aggregate extensibility, member ids, optional and external members.
//! * The serde functions [`serialize`] and [`deserialize`], which encode
//!   structs as aggregates of the encapsulation's encoding.
//!
//! ```
//! use serde_derive::{Deserialize, Serialize};
//! use xcdr::{DCdr2Le, Infinite};
//!
//! #[derive(Debug, Deserialize, PartialEq, Serialize)]
//! struct Sample {
//!     id: u32,
//!     name: String,
//! }
//!
//! let sample = Sample { id: 7, name: "seven".into() };
//! let bytes = xcdr::serialize::<_, _, DCdr2Le>(&sample, Infinite)?;
//! assert_eq!(xcdr::deserialize::<Sample>(&bytes)?, sample);
//! # Ok::<(), xcdr::Error>(())
//! ```

mod bitset;
pub use bitset::Bitset;

mod buffer;
pub use buffer::CdrBuffer;

mod cdr;
pub use cdr::Cdr;

pub mod de;
pub use de::{deserialize, deserialize_data, deserialize_from, Deserializer};

mod encapsulation;
pub use encapsulation::{
    from_representation_id, representation_id, Cdr2Be, Cdr2Le, CdrBe, CdrLe, CdrVersion, DCdr2Be,
    DCdr2Le, EncodingAlgorithm, Encapsulation, Endianness, Extensibility, PlCdr2Be, PlCdr2Le,
    PlCdrBe, PlCdrLe, ENCAPSULATION_HEADER_SIZE,
};

mod error;
pub use error::{Error, Result};

mod external;
pub use external::External;

mod fixed_string;
pub use fixed_string::FixedString;

mod kind;

mod long_double;
pub use long_double::LongDouble;

mod member;
pub use member::{MemberId, MustUnderstandPolicy, XCdrHeaderSelection};

pub mod ser;
pub use ser::{serialize, serialize_data, serialize_into, Serializer};

mod serializable;
pub use serializable::CdrSerializable;

mod size;
pub use size::{
    calc_serialized_data_size, calc_serialized_size, calc_serialized_size_bounded, Bounded,
    CdrSizeCalculator, Infinite, SizeLimit,
};

mod state;
pub use state::State;

mod wide;
pub use wide::{WChar, WString};

mod xcdr;
pub use xcdr::MemberFrame;
