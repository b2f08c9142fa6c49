//! Capacity rounding for mirrored and software rings.
//!
//! The physical size of a mirrored ring is always a positive multiple of the
//! system page size, because the kernel maps memory in whole pages. The
//! virtual size is always an exact multiple of the physical size, so the
//! reservation splits into equal slices that each alias the full backing
//! object.

use crate::{Result, RingError};
use std::sync::OnceLock;

/// Mirror count used when the caller does not ask for one.
pub const DEFAULT_MIRRORS: usize = 16;

/// Virtual span the byte ring aims for by default (1 GiB).
///
/// A long span makes the outer wrap of the cursors rare.
pub const DEFAULT_BYTE_SPAN: usize = 1 << 30;

/// Upper bound on slices for the byte ring default.
///
/// Each slice is a separate kernel mapping and Linux caps a process at
/// `vm.max_map_count` (65530 by default).
pub const MAX_DEFAULT_SLICES: usize = 1024;

const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Returns the system page size in bytes, queried once per process.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(query_page_size)
}

#[cfg(unix)]
fn query_page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(not(unix))]
fn query_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

/// Rounds `value` up to the next multiple of `unit`, never below one `unit`.
///
/// Returns `None` when `unit` is zero or the result overflows `usize`.
#[inline(always)]
pub fn round_up_to_multiple(value: usize, unit: usize) -> Option<usize> {
    if unit == 0 {
        return None;
    }
    if value <= unit {
        return Some(unit);
    }
    value.div_ceil(unit).checked_mul(unit)
}

/// Rounds `value` up to a whole number of system pages (at least one).
#[inline(always)]
pub fn round_to_page(value: usize) -> Option<usize> {
    round_up_to_multiple(value, page_size())
}

/// Smallest power of two greater than or equal to `value`; zero maps to one.
#[inline(always)]
pub fn next_power_of_two(value: usize) -> Option<usize> {
    value.checked_next_power_of_two()
}

/// Physical and virtual sizes of a mirrored ring, in bytes.
///
/// Invariants: `physical` is a positive multiple of the page size the pair
/// was computed with, and `virtual_size` is a positive multiple of
/// `physical`. Both are fixed once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedCapacity {
    physical: usize,
    virtual_size: usize,
}

impl AlignedCapacity {
    /// Rounds `requested` to whole pages and mirrors it [`DEFAULT_MIRRORS`] times.
    pub fn new(requested: usize) -> Result<Self> {
        Self::with_mirrors(requested, DEFAULT_MIRRORS)
    }

    /// Rounds `requested` to whole pages and mirrors it `mirrors` times.
    pub fn with_mirrors(requested: usize, mirrors: usize) -> Result<Self> {
        Self::with_mirrors_in(requested, mirrors, page_size())
    }

    /// Same as [`AlignedCapacity::with_mirrors`] with an explicit page size.
    pub fn with_mirrors_in(requested: usize, mirrors: usize, page: usize) -> Result<Self> {
        if mirrors == 0 {
            return Err(RingError::InvalidCapacity {
                requested,
                reason: "mirror count must be at least one",
            });
        }
        let physical = physical_in(requested, page)?;
        let virtual_size = physical
            .checked_mul(mirrors)
            .ok_or(RingError::InvalidCapacity {
                requested,
                reason: "virtual size overflows usize",
            })?;
        Ok(Self {
            physical,
            virtual_size,
        })
    }

    /// Rounds `requested` to whole pages and `virtual_size` up to a whole
    /// number of physical slices (never fewer than one).
    pub fn with_virtual_size(requested: usize, virtual_size: usize) -> Result<Self> {
        Self::with_virtual_size_in(requested, virtual_size, page_size())
    }

    /// Same as [`AlignedCapacity::with_virtual_size`] with an explicit page size.
    pub fn with_virtual_size_in(requested: usize, virtual_size: usize, page: usize) -> Result<Self> {
        let physical = physical_in(requested, page)?;
        let virtual_size =
            round_up_to_multiple(virtual_size, physical).ok_or(RingError::InvalidCapacity {
                requested: virtual_size,
                reason: "virtual size overflows usize",
            })?;
        Ok(Self {
            physical,
            virtual_size,
        })
    }

    /// Default sizing for byte rings: a span of up to [`DEFAULT_BYTE_SPAN`],
    /// capped at [`MAX_DEFAULT_SLICES`] slices and never below one slice.
    pub fn for_bytes(requested: usize) -> Result<Self> {
        Self::for_bytes_in(requested, page_size())
    }

    /// Same as [`AlignedCapacity::for_bytes`] with an explicit page size.
    pub fn for_bytes_in(requested: usize, page: usize) -> Result<Self> {
        let physical = physical_in(requested, page)?;
        let mirrors = (DEFAULT_BYTE_SPAN / physical).clamp(1, MAX_DEFAULT_SLICES);
        Self::with_mirrors_in(physical, mirrors, page)
    }

    /// Bytes of real memory backing the ring.
    #[inline(always)]
    pub fn physical(&self) -> usize {
        self.physical
    }

    /// Bytes of reserved address space the physical buffer is mirrored over.
    #[inline(always)]
    pub fn virtual_size(&self) -> usize {
        self.virtual_size
    }

    /// Number of physical-size slices in the virtual range.
    #[inline(always)]
    pub fn slice_count(&self) -> usize {
        self.virtual_size / self.physical
    }
}

fn physical_in(requested: usize, page: usize) -> Result<usize> {
    round_up_to_multiple(requested, page).ok_or(RingError::InvalidCapacity {
        requested,
        reason: "physical size cannot be rounded to whole pages",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    #[test]
    fn rounds_up_to_next_page() {
        assert_eq!(round_up_to_multiple(5000, PAGE), Some(8192));
        assert_eq!(round_up_to_multiple(4097, PAGE), Some(8192));
        assert_eq!(round_up_to_multiple(1, PAGE), Some(PAGE));
    }

    #[test]
    fn never_rounds_below_one_page() {
        assert_eq!(round_up_to_multiple(0, PAGE), Some(PAGE));
        assert_eq!(round_to_page(0), Some(page_size()));
    }

    #[test]
    fn rounding_aligned_sizes_is_identity() {
        for pages in 1..64 {
            let size = pages * PAGE;
            assert_eq!(round_up_to_multiple(size, PAGE), Some(size));
        }
        let page = page_size();
        assert_eq!(round_to_page(3 * page), Some(3 * page));
    }

    #[test]
    fn rounding_rejects_zero_unit_and_overflow() {
        assert_eq!(round_up_to_multiple(10, 0), None);
        assert_eq!(round_up_to_multiple(usize::MAX, PAGE), None);
    }

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
    }

    #[test]
    fn power_of_two_ceiling() {
        assert_eq!(next_power_of_two(0), Some(1));
        assert_eq!(next_power_of_two(1), Some(1));
        assert_eq!(next_power_of_two(5), Some(8));
        assert_eq!(next_power_of_two(4096), Some(4096));
        assert_eq!(next_power_of_two(usize::MAX), None);
    }

    #[test]
    fn mirrored_capacity_holds_invariants() {
        for requested in [0, 1, 100, 4095, 4096, 5000, 65_536, 1 << 20] {
            for mirrors in [1, 2, 3, 16] {
                let cap = AlignedCapacity::with_mirrors_in(requested, mirrors, PAGE).unwrap();
                assert!(cap.physical() > 0);
                assert_eq!(cap.physical() % PAGE, 0);
                assert!(cap.physical() >= requested);
                assert!(cap.virtual_size() >= cap.physical());
                assert_eq!(cap.virtual_size() % cap.physical(), 0);
                assert_eq!(cap.slice_count(), mirrors);
            }
        }
    }

    #[test]
    fn concrete_rounding_scenario() {
        let cap = AlignedCapacity::with_mirrors_in(5000, DEFAULT_MIRRORS, PAGE).unwrap();
        assert_eq!(cap.physical(), 8192);
        assert_eq!(cap.virtual_size(), 16 * 8192);
    }

    #[test]
    fn zero_mirrors_is_rejected() {
        let err = AlignedCapacity::with_mirrors_in(PAGE, 0, PAGE).unwrap_err();
        assert!(matches!(err, RingError::InvalidCapacity { .. }));
    }

    #[test]
    fn mirror_overflow_is_rejected() {
        let err = AlignedCapacity::with_mirrors_in(PAGE, usize::MAX, PAGE).unwrap_err();
        assert!(matches!(err, RingError::InvalidCapacity { .. }));
    }

    #[test]
    fn explicit_virtual_size_rounds_to_whole_slices() {
        let cap = AlignedCapacity::with_virtual_size_in(5000, 20_000, PAGE).unwrap();
        assert_eq!(cap.physical(), 8192);
        assert_eq!(cap.virtual_size(), 24_576);
        assert_eq!(cap.slice_count(), 3);
    }

    #[test]
    fn explicit_virtual_size_is_never_below_physical() {
        let cap = AlignedCapacity::with_virtual_size_in(3 * PAGE, 1, PAGE).unwrap();
        assert_eq!(cap.virtual_size(), cap.physical());
        assert_eq!(cap.slice_count(), 1);
    }

    #[test]
    fn byte_default_caps_slice_count() {
        let small = AlignedCapacity::for_bytes_in(PAGE, PAGE).unwrap();
        assert_eq!(small.slice_count(), MAX_DEFAULT_SLICES);

        let large = AlignedCapacity::for_bytes_in(16 << 20, PAGE).unwrap();
        assert_eq!(large.slice_count(), DEFAULT_BYTE_SPAN / (16 << 20));

        let huge = AlignedCapacity::for_bytes_in(2 << 30, PAGE).unwrap();
        assert_eq!(huge.slice_count(), 1);
    }
}
