// src/internal/cache_padded.rs

//! Utility for cache line padding.

use core::fmt;
use core::ops::{Deref, DerefMut};

#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
struct AlignedInner64<T> {
  value: T,
}

#[repr(C)]
#[repr(align(128))]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
#[allow(dead_code)]
struct AlignedInner128<T> {
  value: T,
}

#[cfg(target_arch = "x86_64")]
mod arch_details {
  pub const CACHE_LINE_SIZE_USIZE: usize = 64;
  pub type ArchAligned<T> = super::AlignedInner64<T>;
}

#[cfg(target_arch = "aarch64")]
mod arch_details {
  // AArch64 lines are 64 or 128 depending on the part; 64 is the portable pick.
  pub const CACHE_LINE_SIZE_USIZE: usize = 64;
  pub type ArchAligned<T> = super::AlignedInner64<T>;
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod arch_details {
  pub const CACHE_LINE_SIZE_USIZE: usize = 64;
  pub type ArchAligned<T> = super::AlignedInner64<T>;
}

/// A value padded out to a full cache line to avoid false sharing between
/// producer-side and consumer-side fields.
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
pub(crate) struct CachePadded<T> {
  inner: arch_details::ArchAligned<T>,
}

impl<T> CachePadded<T> {
  #[inline]
  pub(crate) const fn new(value: T) -> Self {
    CachePadded {
      inner: arch_details::ArchAligned { value },
    }
  }

  #[inline]
  pub(crate) const fn alignment_value() -> usize {
    arch_details::CACHE_LINE_SIZE_USIZE
  }
}

impl<T> Deref for CachePadded<T> {
  type Target = T;
  #[inline]
  fn deref(&self) -> &T {
    &self.inner.value
  }
}

impl<T> DerefMut for CachePadded<T> {
  #[inline]
  fn deref_mut(&mut self) -> &mut T {
    &mut self.inner.value
  }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CachePadded")
      .field("value", &self.inner.value)
      .field("alignment", &Self::alignment_value())
      .finish()
  }
}

unsafe impl<T: Send> Send for CachePadded<T> {}
unsafe impl<T: Sync> Sync for CachePadded<T> {}
