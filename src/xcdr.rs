//! Extensible type framing: DHEADERs, member headers, sentinels and optional members.

use crate::cdr::Cdr;
use crate::encapsulation::EncodingAlgorithm;
use crate::error::{Error, Result};
use crate::member::{
    LengthCode, MemberId, MustUnderstandPolicy, XCdrHeaderSelection, EMHEADER_ID_MASK,
    EMHEADER_LC_SHIFT, EMHEADER_MUST_UNDERSTAND, PID_EXTENDED, PID_EXTENDED_LENGTH, PID_IGNORE,
    PID_MASK, PID_MUST_UNDERSTAND, PID_SENTINEL, PID_SHORT_MAX_ID, SHORT_HEADER_MAX_SIZE,
};
use crate::serializable::CdrSerializable;
use crate::state::State;

const SHORT_PARAMETER_HEADER: usize = 4;
const LONG_PARAMETER_HEADER: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Header {
    /// Nothing precedes the member.
    None,
    /// XCDR1 parameter header, short or long.
    Parameter,
    /// XCDR2 EMHEADER, with or without NEXTINT.
    Em,
}

/// A member being serialized or deserialized.
///
/// Returned by the `begin_*_member` functions and handed back to the matching
/// `end_*_member` call.
#[derive(Clone, Debug)]
#[must_use]
pub struct MemberFrame {
    id: MemberId,
    present: bool,
    selection: XCdrHeaderSelection,
    header: Header,
    header_at: usize,
    data_at: usize,
    size: Option<usize>,
    origin: usize,
}

impl MemberFrame {
    pub fn member_id(&self) -> MemberId {
        self.id
    }

    /// Whether an optional member carries a value.
    pub fn is_present(&self) -> bool {
        self.present
    }
}

/// Result of reading an XCDR1 parameter header.
pub(crate) enum Parameter {
    Member { id: MemberId, size: usize },
    Sentinel,
}

impl<'a> Cdr<'a> {
    /// Opens an aggregate encoded with `encoding`.
    ///
    /// DELIMIT_CDR2 and PL_CDR2 reserve a DHEADER that [`Cdr::end_serialize_type`]
    /// fills in with the length of the body.
    pub fn begin_serialize_type(&mut self, encoding: EncodingAlgorithm) -> Result<State> {
        if !self.version.supports(encoding) {
            return Err(Error::bad_param(format!(
                "{:?} cannot be used by a {:?} codec",
                encoding, self.version
            )));
        }
        let state = self.state();
        if encoding.has_dheader() {
            self.begin_dheader()?;
        }
        self.encoding = encoding;
        self.prefixed_at = None;
        Ok(state)
    }

    /// Closes the aggregate opened by [`Cdr::begin_serialize_type`].
    pub fn end_serialize_type(&mut self, state: &State) -> Result<()> {
        match self.encoding {
            EncodingAlgorithm::PlCdr => {
                self.reserve_write(4, 4)?;
                self.align_to(4)?;
                self.serialize_u16(PID_SENTINEL)?;
                self.serialize_u16(0)?;
            }
            EncodingAlgorithm::DelimitCdr2 | EncodingAlgorithm::PlCdr2 => {
                let pad = (4 - (state.offset - state.origin) % 4) & 3;
                self.end_dheader(state.offset + pad)?;
            }
            EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlainCdr2 => self.prefixed_at = None,
        }
        self.encoding = state.encoding;
        self.origin = state.origin;
        Ok(())
    }

    /// Reserves a DHEADER and returns its position.
    pub(crate) fn begin_dheader(&mut self) -> Result<usize> {
        self.serialize_u32(0)?;
        Ok(self.offset - 4)
    }

    pub(crate) fn end_dheader(&mut self, at: usize) -> Result<()> {
        let size = u32::try_from(self.offset - at - 4).map_err(|_| Error::NumberOutOfRange)?;
        self.write_u32_at(at, size)?;
        self.prefixed_at = Some(at);
        Ok(())
    }

    /// Reads a DHEADER and returns where the delimited body ends.
    pub(crate) fn read_dheader(&mut self) -> Result<usize> {
        let size = self.deserialize_u32()? as usize;
        self.check_readable(size, 1)?;
        Ok(self.offset + size)
    }

    /// Moves past the end of a delimited body, skipping what was not read.
    pub(crate) fn finish_dheader(&mut self, end: usize) -> Result<()> {
        if self.offset > end {
            return Err(Error::bad_param("body overran its DHEADER"));
        }
        self.offset = end;
        Ok(())
    }

    /// Serializes `value` as member `id` of the current aggregate.
    pub fn serialize_member<T>(&mut self, id: impl Into<MemberId>, value: &T) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        self.serialize_member_with_selection(id, value, XCdrHeaderSelection::default())
    }

    pub fn serialize_member_with_selection<T>(
        &mut self,
        id: impl Into<MemberId>,
        value: &T,
        selection: XCdrHeaderSelection,
    ) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        let id = id.into();
        self.rollback_on_error(|cdr| value.serialize_member(cdr, id, selection))
    }

    /// Frames whatever `f` writes as member `id`.
    pub fn serialize_member_with<F>(
        &mut self,
        id: impl Into<MemberId>,
        selection: XCdrHeaderSelection,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let id = id.into();
        self.rollback_on_error(|cdr| {
            let frame = cdr.begin_serialize_member(id, selection)?;
            f(cdr)?;
            cdr.end_serialize_member(frame)
        })
    }

    /// Deserializes the member the cursor is on.
    pub fn deserialize_member<T>(&mut self, value: &mut T) -> Result<()>
    where
        T: CdrSerializable + ?Sized,
    {
        value.deserialize_member(self)
    }

    /// Writes the header of member `id` according to the current encoding.
    pub fn begin_serialize_member(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
    ) -> Result<MemberFrame> {
        let frame = match self.encoding {
            EncodingAlgorithm::PlCdr => self.begin_parameter(id, selection)?,
            EncodingAlgorithm::PlCdr2 => self.begin_emheader(id, selection)?,
            _ => self.empty_frame(id, true, selection),
        };
        self.prefixed_at = None;
        Ok(frame)
    }

    /// Completes the header written by [`Cdr::begin_serialize_member`].
    pub fn end_serialize_member(&mut self, frame: MemberFrame) -> Result<()> {
        match frame.header {
            Header::None => {}
            Header::Parameter => self.end_parameter(&frame)?,
            Header::Em => self.end_emheader(&frame)?,
        }
        self.origin = frame.origin;
        self.prefixed_at = None;
        Ok(())
    }

    /// Opens an optional member.
    ///
    /// XCDR1 plain encodings always write a parameter header, whose length is
    /// zero when the member is absent. Parameter lists write nothing for an
    /// absent member. PLAIN_CDR2 and DELIMIT_CDR2 write a presence flag.
    pub fn begin_serialize_opt_member(
        &mut self,
        id: MemberId,
        present: bool,
        selection: XCdrHeaderSelection,
    ) -> Result<MemberFrame> {
        let frame = match self.encoding {
            EncodingAlgorithm::PlainCdr => self.begin_parameter(id, selection)?,
            EncodingAlgorithm::PlCdr if present => self.begin_parameter(id, selection)?,
            EncodingAlgorithm::PlCdr2 if present => self.begin_emheader(id, selection)?,
            EncodingAlgorithm::PlCdr | EncodingAlgorithm::PlCdr2 => {
                self.empty_frame(id, false, selection)
            }
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2 => {
                self.serialize_bool(present)?;
                self.empty_frame(id, present, selection)
            }
        };
        self.prefixed_at = None;
        Ok(MemberFrame { present, ..frame })
    }

    pub fn end_serialize_opt_member(&mut self, frame: MemberFrame) -> Result<()> {
        self.end_serialize_member(frame)
    }

    /// Reads what precedes an optional member outside a parameter list loop.
    pub fn begin_deserialize_opt_member(&mut self) -> Result<MemberFrame> {
        let origin = self.origin;
        match self.encoding {
            EncodingAlgorithm::PlainCdr => match self.read_parameter_header()? {
                Parameter::Member { id, size } => Ok(self.member_frame(id, size, origin)),
                Parameter::Sentinel => Err(Error::bad_param("sentinel in place of a member")),
            },
            EncodingAlgorithm::PlCdr => {
                if self.remaining() == 0 {
                    return Ok(self.empty_frame(MemberId::default(), false, Default::default()));
                }
                let state = self.state();
                match self.read_parameter_header()? {
                    Parameter::Member { id, size } => Ok(self.member_frame(id, size, origin)),
                    Parameter::Sentinel => {
                        self.set_state(&state);
                        Ok(self.empty_frame(MemberId::default(), false, Default::default()))
                    }
                }
            }
            EncodingAlgorithm::PlCdr2 => {
                if self.remaining() == 0 {
                    return Ok(self.empty_frame(MemberId::default(), false, Default::default()));
                }
                let (id, size) = self.read_emheader()?;
                Ok(self.member_frame(id, size, origin))
            }
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2 => {
                let present = self.deserialize_bool()?;
                Ok(self.empty_frame(MemberId::default(), present, Default::default()))
            }
        }
    }

    /// Moves past the optional member opened by [`Cdr::begin_deserialize_opt_member`].
    pub fn end_deserialize_opt_member(&mut self, frame: MemberFrame) -> Result<()> {
        if let Some(size) = frame.size {
            let end = frame.data_at + size;
            if self.offset > end {
                return Err(Error::bad_param(format!(
                    "member {} overran its declared size",
                    frame.id
                )));
            }
            self.offset = end;
        }
        self.origin = frame.origin;
        Ok(())
    }

    /// Decodes an aggregate, calling `f` for every member found.
    ///
    /// `f` returns `false` when it does not recognize the member. Plain
    /// encodings stop there; parameter lists skip the member, unless it must be
    /// understood and the policy is [`MustUnderstandPolicy::Reject`].
    pub fn deserialize_type<F>(&mut self, encoding: EncodingAlgorithm, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, MemberId) -> Result<bool>,
    {
        if !self.version.supports(encoding) {
            return Err(Error::bad_param(format!(
                "{:?} cannot be read by a {:?} codec",
                encoding, self.version
            )));
        }
        let state = self.state();
        let result = self.deserialize_members(encoding, &mut f);
        match result {
            Ok(()) => {
                self.encoding = state.encoding;
                self.origin = state.origin;
                self.prefixed_at = None;
            }
            Err(_) => self.set_state(&state),
        }
        result
    }

    fn deserialize_members<F>(&mut self, encoding: EncodingAlgorithm, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut Self, MemberId) -> Result<bool>,
    {
        self.encoding = encoding;
        match encoding {
            EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlainCdr2 => {
                let mut id = 0;
                while f(self, MemberId::new(id))? {
                    id += 1;
                }
                Ok(())
            }
            EncodingAlgorithm::DelimitCdr2 => {
                let end = self.read_dheader()?;
                let mut id = 0;
                while self.offset < end && f(self, MemberId::new(id))? {
                    id += 1;
                }
                self.finish_dheader(end)
            }
            EncodingAlgorithm::PlCdr | EncodingAlgorithm::PlCdr2 => {
                let mut list = ParameterList::begin(self, encoding)?;
                while let Some((id, end)) = list.next_member(self)? {
                    if !f(self, id)? {
                        list.unknown_member(self, id)?;
                    }
                    list.end_member(self, id, end)?;
                }
                list.finish(self)
            }
        }
    }

    fn empty_frame(
        &self,
        id: MemberId,
        present: bool,
        selection: XCdrHeaderSelection,
    ) -> MemberFrame {
        MemberFrame {
            id,
            present,
            selection,
            header: Header::None,
            header_at: self.offset,
            data_at: self.offset,
            size: None,
            origin: self.origin,
        }
    }

    fn member_frame(&self, id: MemberId, size: usize, origin: usize) -> MemberFrame {
        MemberFrame {
            id,
            present: size > 0,
            selection: XCdrHeaderSelection::default(),
            header: Header::None,
            header_at: self.offset,
            data_at: self.offset,
            size: Some(size),
            origin,
        }
    }

    fn begin_parameter(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
    ) -> Result<MemberFrame> {
        let long = selection.starts_long() || id.id > PID_SHORT_MAX_ID;
        if long && selection == XCdrHeaderSelection::ShortHeader {
            return Err(Error::bad_param(format!(
                "member {} does not fit a short header",
                id
            )));
        }
        let header_len = if long {
            LONG_PARAMETER_HEADER
        } else {
            SHORT_PARAMETER_HEADER
        };
        self.reserve_write(header_len, 4)?;
        self.align_to(4)?;
        let header_at = self.offset;
        self.write_parameter_header(header_at, id, long, 0)?;
        self.offset = header_at + header_len;
        let origin = self.origin;
        self.reset_alignment();
        Ok(MemberFrame {
            id,
            present: true,
            selection,
            header: Header::Parameter,
            header_at,
            data_at: self.offset,
            size: None,
            origin,
        })
    }

    fn end_parameter(&mut self, frame: &MemberFrame) -> Result<()> {
        let size = self.offset - frame.data_at;
        let fits_short = frame.id.id <= PID_SHORT_MAX_ID && size <= SHORT_HEADER_MAX_SIZE;
        let long = match frame.selection {
            XCdrHeaderSelection::LongHeader => true,
            XCdrHeaderSelection::ShortHeader if !fits_short => {
                return Err(Error::bad_param(format!(
                    "member {} of {} bytes does not fit a short header",
                    frame.id, size
                )))
            }
            _ => !fits_short,
        };
        let header_len = if long {
            LONG_PARAMETER_HEADER
        } else {
            SHORT_PARAMETER_HEADER
        };
        self.relocate_member(frame, frame.header_at + header_len, size)?;
        self.write_parameter_header(frame.header_at, frame.id, long, size)
    }

    fn write_parameter_header(
        &mut self,
        at: usize,
        id: MemberId,
        long: bool,
        size: usize,
    ) -> Result<()> {
        let flags = if id.must_understand {
            PID_MUST_UNDERSTAND
        } else {
            0
        };
        if long {
            let size = u32::try_from(size).map_err(|_| Error::NumberOutOfRange)?;
            self.write_u16_at(at, flags | PID_EXTENDED)?;
            self.write_u16_at(at + 2, PID_EXTENDED_LENGTH)?;
            self.write_u32_at(at + 4, id.id)?;
            self.write_u32_at(at + 8, size)
        } else {
            self.write_u16_at(at, flags | id.id as u16)?;
            self.write_u16_at(at + 2, size as u16)
        }
    }

    fn begin_emheader(
        &mut self,
        id: MemberId,
        selection: XCdrHeaderSelection,
    ) -> Result<MemberFrame> {
        if id.id > EMHEADER_ID_MASK {
            return Err(Error::bad_param(format!("member id {} is too large", id)));
        }
        let header_len = if selection.starts_long() { 8 } else { 4 };
        self.reserve_write(header_len, 4)?;
        self.align_to(4)?;
        let header_at = self.offset;
        self.buffer.zero_at(header_at, header_len)?;
        self.offset = header_at + header_len;
        let origin = self.origin;
        self.reset_alignment();
        Ok(MemberFrame {
            id,
            present: true,
            selection,
            header: Header::Em,
            header_at,
            data_at: self.offset,
            size: None,
            origin,
        })
    }

    fn end_emheader(&mut self, frame: &MemberFrame) -> Result<()> {
        let size = self.offset - frame.data_at;
        let prefixed = self.prefixed_at == Some(frame.data_at);
        let code = LengthCode::select(size, prefixed, frame.selection).ok_or_else(
            || {
                Error::bad_param(format!(
                    "member {} of {} bytes does not fit a short header",
                    frame.id, size
                ))
            },
        )?;
        self.relocate_member(frame, frame.header_at + 4 + code.extra_bytes(), size)?;
        let mut word = (code.code() << EMHEADER_LC_SHIFT) | frame.id.id;
        if frame.id.must_understand {
            word |= EMHEADER_MUST_UNDERSTAND;
        }
        self.write_u32_at(frame.header_at, word)?;
        if code == LengthCode::NextInt {
            let size = u32::try_from(size).map_err(|_| Error::NumberOutOfRange)?;
            self.write_u32_at(frame.header_at + 4, size)?;
        }
        Ok(())
    }

    /// Moves a member body written after a provisional header to `data_at`.
    fn relocate_member(&mut self, frame: &MemberFrame, data_at: usize, size: usize) -> Result<()> {
        if data_at == frame.data_at {
            return Ok(());
        }
        log::debug!(
            "member {} header {} by {} bytes",
            frame.id,
            if data_at > frame.data_at {
                "expanded"
            } else {
                "shrunk"
            },
            data_at.abs_diff(frame.data_at)
        );
        self.buffer.move_within(frame.data_at, data_at, size)?;
        self.offset = data_at + size;
        self.buffer.truncate(self.offset);
        Ok(())
    }

    /// Reads an XCDR1 parameter header, skipping `PID_IGNORE` parameters, and
    /// moves the alignment origin after it.
    pub(crate) fn read_parameter_header(&mut self) -> Result<Parameter> {
        loop {
            self.take(0, 4)?;
            let word = self.deserialize_u16()?;
            let len = self.deserialize_u16()?;
            let must_understand = word & PID_MUST_UNDERSTAND != 0;
            match word & PID_MASK {
                PID_SENTINEL => return Ok(Parameter::Sentinel),
                PID_IGNORE => self.jump(usize::from(len))?,
                PID_EXTENDED => {
                    if len != PID_EXTENDED_LENGTH {
                        return Err(Error::bad_param("malformed extended parameter header"));
                    }
                    let id = self.deserialize_u32()? & EMHEADER_ID_MASK;
                    let size = self.deserialize_u32()? as usize;
                    self.reset_alignment();
                    return Ok(Parameter::Member {
                        id: MemberId {
                            id,
                            must_understand,
                        },
                        size,
                    });
                }
                pid => {
                    self.reset_alignment();
                    return Ok(Parameter::Member {
                        id: MemberId {
                            id: u32::from(pid),
                            must_understand,
                        },
                        size: usize::from(len),
                    });
                }
            }
        }
    }

    /// Reads an EMHEADER and its NEXTINT, returning the member and its length.
    pub(crate) fn read_emheader(&mut self) -> Result<(MemberId, usize)> {
        let word = self.deserialize_u32()?;
        let id = MemberId {
            id: word & EMHEADER_ID_MASK,
            must_understand: word & EMHEADER_MUST_UNDERSTAND != 0,
        };
        let size = match (word >> EMHEADER_LC_SHIFT) & 0x7 {
            0 => 1,
            1 => 2,
            2 => 4,
            3 => 8,
            4 => self.deserialize_u32()? as usize,
            code => {
                let count = self.read_u32_at(self.offset)? as usize;
                let unit = match code {
                    5 => 1,
                    6 => 4,
                    _ => 8,
                };
                count
                    .checked_mul(unit)
                    .and_then(|n| n.checked_add(4))
                    .ok_or(Error::NumberOutOfRange)?
            }
        };
        self.reset_alignment();
        Ok((id, size))
    }
}

/// Walks the members of a PL_CDR or PL_CDR2 aggregate.
pub(crate) struct ParameterList {
    encoding: EncodingAlgorithm,
    end: Option<usize>,
    origin: usize,
}

impl ParameterList {
    pub(crate) fn begin(cdr: &mut Cdr<'_>, encoding: EncodingAlgorithm) -> Result<Self> {
        let end = match encoding {
            EncodingAlgorithm::PlCdr2 => Some(cdr.read_dheader()?),
            _ => None,
        };
        Ok(Self {
            encoding,
            end,
            origin: cdr.origin,
        })
    }

    /// Reads the next member header; `None` once the list is over.
    pub(crate) fn next_member(&mut self, cdr: &mut Cdr<'_>) -> Result<Option<(MemberId, usize)>> {
        let (id, size) = match self.end {
            Some(end) => {
                if cdr.offset >= end {
                    return Ok(None);
                }
                cdr.read_emheader()?
            }
            None => match cdr.read_parameter_header()? {
                Parameter::Sentinel => return Ok(None),
                Parameter::Member { id, size } => (id, size),
            },
        };
        let member_end = cdr
            .offset
            .checked_add(size)
            .ok_or(Error::NumberOutOfRange)?;
        if let Some(end) = self.end {
            if member_end > end {
                return Err(Error::bad_param(format!(
                    "member {} overruns its aggregate",
                    id
                )));
            }
        }
        cdr.check_readable(size, 1)?;
        Ok(Some((id, member_end)))
    }

    /// Applies the must-understand policy to a member nobody recognized.
    pub(crate) fn unknown_member(&self, cdr: &Cdr<'_>, id: MemberId) -> Result<()> {
        if id.must_understand && cdr.must_understand_policy == MustUnderstandPolicy::Reject {
            return Err(Error::MustUnderstandMember(id.id));
        }
        log::debug!("skipping unknown member {} in {:?}", id, self.encoding);
        Ok(())
    }

    pub(crate) fn end_member(&self, cdr: &mut Cdr<'_>, id: MemberId, end: usize) -> Result<()> {
        if cdr.offset > end {
            return Err(Error::bad_param(format!(
                "member {} overran its declared size",
                id
            )));
        }
        cdr.offset = end;
        cdr.origin = self.origin;
        Ok(())
    }

    pub(crate) fn finish(self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.origin = self.origin;
        match self.end {
            Some(end) => cdr.finish_dheader(end),
            None => Ok(()),
        }
    }
}
