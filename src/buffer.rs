//! Byte storage underneath a [`Cdr`](crate::Cdr).

use crate::error::{Error, Result};

const MIN_GROWTH: usize = 64;

enum Storage<'a> {
    Owned(Vec<u8>),
    Fixed { data: &'a mut [u8], len: usize },
    ReadOnly(&'a [u8]),
}

/// A linear byte region that a codec writes into or reads from.
///
/// An owned buffer grows on demand. A borrowed buffer has a fixed capacity and
/// every access beyond it fails with [`Error::NotEnoughMemory`] before any
/// byte is touched. The buffer can be moved but not copied.
pub struct CdrBuffer<'a> {
    storage: Storage<'a>,
}

impl CdrBuffer<'static> {
    /// Creates an empty, growable buffer.
    pub fn new() -> Self {
        Self {
            storage: Storage::Owned(Vec::new()),
        }
    }

    /// Creates a growable buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Storage::Owned(Vec::with_capacity(capacity)),
        }
    }

    /// Takes ownership of `bytes`; they are readable and may be overwritten.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(bytes),
        }
    }
}

impl Default for CdrBuffer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CdrBuffer<'a> {
    /// Wraps a caller-owned region of fixed capacity.
    pub fn from_slice(data: &'a mut [u8]) -> Self {
        Self {
            storage: Storage::Fixed { data, len: 0 },
        }
    }

    /// Wraps bytes that are only going to be decoded.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self {
            storage: Storage::ReadOnly(data),
        }
    }

    /// Returns `true` if the buffer reallocates when it runs out of room.
    pub fn is_growable(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Number of bytes the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.capacity(),
            Storage::Fixed { data, .. } => data.len(),
            Storage::ReadOnly(data) => data.len(),
        }
    }

    /// High-water mark of the bytes written, or the whole region for
    /// read-only buffers.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.len(),
            Storage::Fixed { len, .. } => *len,
            Storage::ReadOnly(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes room for `additional` bytes past the current length.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self.len().saturating_add(additional);
        let available = self.capacity();
        match &mut self.storage {
            Storage::Owned(v) => {
                v.reserve(additional);
                Ok(())
            }
            _ if needed <= available => Ok(()),
            _ => Err(Error::NotEnoughMemory { needed, available }),
        }
    }

    /// Sets the length to `n` bytes, zero filling owned storage.
    pub fn resize(&mut self, n: usize) -> Result<()> {
        let available = self.capacity();
        match &mut self.storage {
            Storage::Owned(v) => {
                v.resize(n, 0);
                Ok(())
            }
            Storage::Fixed { len, .. } if n <= available => {
                *len = n;
                Ok(())
            }
            Storage::ReadOnly(_) if n <= available => Ok(()),
            _ => Err(Error::NotEnoughMemory {
                needed: n,
                available,
            }),
        }
    }

    /// Checks that `end` bytes are addressable, growing owned storage.
    pub(crate) fn ensure(&mut self, end: usize) -> Result<()> {
        match &mut self.storage {
            Storage::Owned(v) => {
                if end > v.len() {
                    if end > v.capacity() {
                        let target = end.max(v.capacity() * 2).max(MIN_GROWTH);
                        log::trace!("growing buffer from {} to {} bytes", v.capacity(), target);
                        v.reserve(target - v.len());
                    }
                    v.resize(end, 0);
                }
                Ok(())
            }
            Storage::Fixed { data, len } => {
                if end > data.len() {
                    return Err(Error::NotEnoughMemory {
                        needed: end,
                        available: data.len(),
                    });
                }
                *len = (*len).max(end);
                Ok(())
            }
            Storage::ReadOnly(data) => {
                if end > data.len() {
                    return Err(Error::NotEnoughMemory {
                        needed: end,
                        available: data.len(),
                    });
                }
                Err(Error::bad_param("buffer is read-only"))
            }
        }
    }

    /// Copies `bytes` to `offset`, growing or failing before anything is written.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or(Error::NumberOutOfRange)?;
        self.ensure(end)?;
        self.region_mut()[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Fills `len` bytes at `offset` with zeros.
    pub(crate) fn zero_at(&mut self, offset: usize, len: usize) -> Result<()> {
        let end = offset.checked_add(len).ok_or(Error::NumberOutOfRange)?;
        self.ensure(end)?;
        self.region_mut()[offset..end].fill(0);
        Ok(())
    }

    /// Borrows `len` readable bytes at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let region = self.region();
        match offset.checked_add(len) {
            Some(end) if end <= region.len() => Ok(&region[offset..end]),
            _ => Err(Error::NotEnoughMemory {
                needed: offset.saturating_add(len),
                available: region.len(),
            }),
        }
    }

    /// Moves `len` bytes from `src` to `dst` inside the buffer.
    pub(crate) fn move_within(&mut self, src: usize, dst: usize, len: usize) -> Result<()> {
        let end = dst.checked_add(len).ok_or(Error::NumberOutOfRange)?;
        self.ensure(end)?;
        self.region_mut().copy_within(src..src + len, dst);
        Ok(())
    }

    /// Forgets everything written past `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        match &mut self.storage {
            Storage::Owned(v) => v.truncate(len),
            Storage::Fixed { len: written, .. } => *written = (*written).min(len),
            Storage::ReadOnly(_) => {}
        }
    }

    /// Every byte that can be read back.
    pub fn as_slice(&self) -> &[u8] {
        self.region()
    }

    /// Returns the owned bytes, or a copy of the written bytes of a borrowed region.
    pub fn into_vec(self) -> Vec<u8> {
        match self.storage {
            Storage::Owned(v) => v,
            Storage::Fixed { data, len } => data[..len].to_vec(),
            Storage::ReadOnly(data) => data.to_vec(),
        }
    }

    fn region(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => v,
            Storage::Fixed { data, .. } => data,
            Storage::ReadOnly(data) => data,
        }
    }

    fn region_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Owned(v) => v,
            Storage::Fixed { data, .. } => data,
            Storage::ReadOnly(_) => &mut [],
        }
    }
}
