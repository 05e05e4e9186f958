//! Strings bounded to a byte capacity.

use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

use crate::cdr::Cdr;
use crate::error::{Error, Result};
use crate::serializable::CdrSerializable;
use crate::size::CdrSizeCalculator;

/// A string of at most `N` bytes.
///
/// The bound counts UTF-8 bytes, not characters, so `FixedString<4>` holds
/// "abcd" but not "ééé". Same wire layout as `String`. Building one from a longer string, or
/// decoding one from the wire, fails instead of truncating.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        FixedString(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn check_len(len: usize) -> Result<()> {
        if len > N {
            return Err(Error::bad_param(format!(
                "{} bytes do not fit a string bounded to {}",
                len, N
            )));
        }
        Ok(())
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::check_len(s.len())?;
        Ok(FixedString(s.to_owned()))
    }
}

impl<const N: usize> TryFrom<String> for FixedString<N> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::check_len(s.len())?;
        Ok(FixedString(s))
    }
}

impl<const N: usize> Deref for FixedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> PartialEq<str> for FixedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> CdrSerializable for FixedString<N> {
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_string_size(self.0.len(), current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        cdr.serialize_string(&self.0)
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let value = cdr.rollback_on_error(|cdr| {
            let bytes = cdr.deserialize_string_bytes()?;
            Self::check_len(bytes.len())?;
            String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8Encoding)
        })?;
        self.0 = value;
        Ok(())
    }
}
