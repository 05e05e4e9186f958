//! Member identification and header selection for extensible aggregates.

use std::fmt;

/// Identifier of a member inside an aggregate.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MemberId {
    pub id: u32,
    pub must_understand: bool,
}

impl MemberId {
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            must_understand: false,
        }
    }

    /// A member the receiver has to recognize.
    pub const fn must_understand(id: u32) -> Self {
        Self {
            id,
            must_understand: true,
        }
    }
}

impl From<u32> for MemberId {
    fn from(id: u32) -> Self {
        MemberId::new(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.id)?;
        if self.must_understand {
            f.write_str("(M)")?;
        }
        Ok(())
    }
}

/// Which member header form the encoder writes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum XCdrHeaderSelection {
    /// Always the short form; members that do not fit are an error.
    ShortHeader,
    /// Always the long form.
    LongHeader,
    /// Short form unless the member does not fit.
    #[default]
    AutoWithShortHeaderByDefault,
    /// Reserves the long form and shrinks it when the member fits the short one.
    AutoWithLongHeaderByDefault,
}

impl XCdrHeaderSelection {
    pub(crate) fn starts_long(self) -> bool {
        matches!(
            self,
            XCdrHeaderSelection::LongHeader | XCdrHeaderSelection::AutoWithLongHeaderByDefault
        )
    }
}

/// What the decoder does with a must-understand member nobody recognized.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum MustUnderstandPolicy {
    /// Fail with [`Error::MustUnderstandMember`](crate::Error::MustUnderstandMember).
    #[default]
    Reject,
    /// Skip it like any other unknown member.
    Skip,
}

// XCDR1 parameter ids and flags.
pub(crate) const PID_EXTENDED: u16 = 0x3F01;
pub(crate) const PID_SENTINEL: u16 = 0x3F02;
pub(crate) const PID_IGNORE: u16 = 0x3F03;
pub(crate) const PID_MASK: u16 = 0x3FFF;
pub(crate) const PID_MUST_UNDERSTAND: u16 = 0x4000;
pub(crate) const PID_SHORT_MAX_ID: u32 = 0x3F00;
pub(crate) const PID_EXTENDED_LENGTH: u16 = 8;
pub(crate) const SHORT_HEADER_MAX_SIZE: usize = 0xFFFF;

// XCDR2 EMHEADER layout.
pub(crate) const EMHEADER_MUST_UNDERSTAND: u32 = 0x8000_0000;
pub(crate) const EMHEADER_ID_MASK: u32 = 0x0FFF_FFFF;
pub(crate) const EMHEADER_LC_SHIFT: u32 = 28;

/// Length code of an EMHEADER.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LengthCode {
    /// LC 0..=3, the member is 1, 2, 4 or 8 bytes and no NEXTINT follows.
    Inline(u32),
    /// LC 4, a NEXTINT with the member length follows the header.
    NextInt,
    /// LC 5, the member starts with its own length word which doubles as NEXTINT.
    SharedNextInt,
}

impl LengthCode {
    pub(crate) fn code(self) -> u32 {
        match self {
            LengthCode::Inline(code) => code,
            LengthCode::NextInt => 4,
            LengthCode::SharedNextInt => 5,
        }
    }

    /// Bytes the header occupies in front of the member body.
    pub(crate) fn extra_bytes(self) -> usize {
        match self {
            LengthCode::NextInt => 4,
            _ => 0,
        }
    }

    /// Chooses the length code for a member of `size` bytes.
    ///
    /// `prefixed` tells whether the body starts with a length word counting the
    /// rest of the body. Returns `None` when `selection` forbids every code the
    /// member fits.
    pub(crate) fn select(
        size: usize,
        prefixed: bool,
        selection: XCdrHeaderSelection,
    ) -> Option<LengthCode> {
        if selection == XCdrHeaderSelection::LongHeader {
            return Some(LengthCode::NextInt);
        }
        let short = if prefixed && size >= 4 {
            Some(LengthCode::SharedNextInt)
        } else {
            match size {
                1 => Some(LengthCode::Inline(0)),
                2 => Some(LengthCode::Inline(1)),
                4 => Some(LengthCode::Inline(2)),
                8 => Some(LengthCode::Inline(3)),
                _ => None,
            }
        };
        match (short, selection) {
            (Some(code), _) => Some(code),
            (None, XCdrHeaderSelection::ShortHeader) => None,
            (None, _) => Some(LengthCode::NextInt),
        }
    }
}
