//! IDL `wchar` and `wstring`.

use std::fmt;
use std::ops::Deref;

use crate::cdr::Cdr;
use crate::error::Result;
use crate::serializable::CdrSerializable;
use crate::size::CdrSizeCalculator;

/// A wide character, one UTF-16 code unit on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WChar(pub char);

impl From<char> for WChar {
    fn from(c: char) -> Self {
        WChar(c)
    }
}

impl CdrSerializable for WChar {
    const IS_PRIMITIVE: bool = true;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_primitive_size(2, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_wchar(self.0)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        self.0 = cdr.deserialize_wchar()?;
        Ok(())
    }
}

/// A wide string: a count of UTF-16 code units followed by the units, with no
/// terminator.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WString(String);

impl WString {
    pub fn new() -> Self {
        WString(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in UTF-16 code units, as written on the wire.
    pub fn len_utf16(&self) -> usize {
        self.0.encode_utf16().count()
    }
}

impl Deref for WString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WString {
    fn from(s: &str) -> Self {
        WString(s.to_owned())
    }
}

impl From<String> for WString {
    fn from(s: String) -> Self {
        WString(s)
    }
}

impl PartialEq<str> for WString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CdrSerializable for WString {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_wstring_size(self.len_utf16(), current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_wstring(&self.0)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        self.0 = cdr.deserialize_wstring()?;
        Ok(())
    }
}
