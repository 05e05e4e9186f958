//! IDL `@external` members.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cdr::Cdr;
use crate::error::{Error, Result};
use crate::serializable::CdrSerializable;
use crate::size::CdrSizeCalculator;

/// A nullable handle to a heap value that may be shared with other holders.
///
/// Changes made through any holder are seen by all of them. A locked handle
/// cannot be reassigned: [`External::assign`] into it fails with
/// [`Error::LockedExternalAccess`]. Locking never prevents mutating the pointee.
#[derive(Debug)]
pub struct External<T> {
    pointee: Option<Arc<RwLock<T>>>,
    locked: bool,
}

impl<T> External<T> {
    /// A null, unlocked handle.
    pub fn new() -> Self {
        External {
            pointee: None,
            locked: false,
        }
    }

    /// Takes ownership of `value`.
    pub fn with_value(value: T, locked: bool) -> Self {
        External {
            pointee: Some(Arc::new(RwLock::new(value))),
            locked,
        }
    }

    /// Shares ownership with the other holders of `shared`. `None` is null.
    pub fn from_shared(shared: Option<Arc<RwLock<T>>>) -> Self {
        External {
            pointee: shared,
            locked: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.pointee.is_none()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Locks the handle, null or not. There is no unlocking.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn get(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.pointee
            .as_ref()
            .map(|p| p.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get_mut(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.pointee
            .as_ref()
            .map(|p| p.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn shared(&self) -> Option<Arc<RwLock<T>>> {
        self.pointee.clone()
    }
}

impl<T: Clone> External<T> {
    /// Makes this handle refer to what `other` refers to.
    ///
    /// The pointee of a locked `other` is copied into a new unlocked value,
    /// otherwise it is shared.
    pub fn assign(&mut self, other: &External<T>) -> Result<()> {
        if self.locked {
            return Err(Error::LockedExternalAccess);
        }
        self.pointee = if other.locked {
            other.deep_copy()
        } else {
            other.pointee.clone()
        };
        Ok(())
    }

    fn deep_copy(&self) -> Option<Arc<RwLock<T>>> {
        self.get().map(|v| Arc::new(RwLock::new(v.clone())))
    }
}

impl<T> Default for External<T> {
    fn default() -> Self {
        External::new()
    }
}

/// Unlocked handles share the pointee; locked ones copy it and stay locked.
impl<T: Clone> Clone for External<T> {
    fn clone(&self) -> Self {
        External {
            pointee: if self.locked {
                self.deep_copy()
            } else {
                self.pointee.clone()
            },
            locked: self.locked,
        }
    }
}

/// Two handles are equal when both are null or both refer to the same pointee.
impl<T> PartialEq for External<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.pointee, &other.pointee) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Eq for External<T> {}

/// A null handle cannot be serialized and its calculated size is zero;
/// decoding into a null handle allocates the pointee, decoding into a locked
/// one is rejected.
impl<T> CdrSerializable for External<T>
where
    T: CdrSerializable + Default,
{
    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        self.get()
            .map_or(0, |v| v.calculate_serialized_size(calc, current_alignment))
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        match self.get() {
            Some(v) => v.serialize(cdr),
            None => Err(Error::bad_param("cannot serialize a null external")),
        }
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        if self.locked {
            return Err(Error::bad_param("cannot deserialize into a locked external"));
        }
        if let Some(mut v) = self.get_mut() {
            return v.deserialize(cdr);
        }
        let mut value = T::default();
        value.deserialize(cdr)?;
        self.pointee = Some(Arc::new(RwLock::new(value)));
        Ok(())
    }
}
