//! Saved codec positions.

use crate::encapsulation::{EncodingAlgorithm, Endianness};

/// Snapshot of a codec cursor.
///
/// Captured with [`Cdr::state`](crate::Cdr::state) and restored with
/// [`Cdr::set_state`](crate::Cdr::set_state). Two snapshots compare equal when
/// the position, the alignment origin, the byte order and the active encoding
/// agree, which is how an encoder and a decoder prove they walked the same bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct State {
    pub(crate) offset: usize,
    pub(crate) origin: usize,
    pub(crate) endianness: Endianness,
    pub(crate) encoding: EncodingAlgorithm,
}

impl State {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn encoding(&self) -> EncodingAlgorithm {
        self.encoding
    }
}
