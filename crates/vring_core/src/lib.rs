//! Ring buffers whose wraparound comes from either index arithmetic or the MMU.
//!
//! Two engines share one external contract. The mirrored engine reserves a
//! large virtual range and maps one small physical buffer over it again and
//! again, so a linear copy that runs past the physical end lands back at
//! offset zero without any branch or split. The software engine keeps a
//! single heap allocation and wraps with a mask or a modulo, splitting copies
//! at the boundary. For any sequence of pushes and pops both produce the same
//! bytes.

/// Page-size rounding and the physical/virtual capacity pair.
///
/// Computes how much physical memory backs a ring and how large a virtual
/// range it is mirrored over. Every ring constructor goes through here so
/// that the physical size is always a whole number of pages and the virtual
/// size is always a whole number of physical slices.
pub mod sizing;

/// The capability bound for values stored in a ring.
///
/// Records are copied in and out of ring memory as raw bytes, so only
/// fixed-layout types without pointers or padding are accepted.
pub mod record;

/// Shared push/pop and indexed-access contracts.
///
/// Both engines implement these traits, which lets benchmarks and
/// equivalence tests drive either one through the same generic code.
pub mod ring;

/// Software ring buffers backed by a single heap allocation.
///
/// The portable baseline: wraps indices with a mask or modulo and splits
/// record copies in two when they straddle the end of the buffer.
pub mod soft;

/// Virtual alias regions: one memfd mapped repeatedly across a reservation.
///
/// Owns the reservation, the fixed mappings of every slice and their release.
/// Construction either maps every slice or leaves nothing mapped.
#[cfg(target_os = "linux")]
pub mod mapper;

/// Ring buffers that wrap through mirrored virtual memory.
///
/// Typed indexed access and a byte-cursor record queue on top of a
/// [`mapper::MirroredRegion`]. Linear reads and writes across slice
/// boundaries need no wrap logic at all.
#[cfg(target_os = "linux")]
pub mod mirror;

#[cfg(target_os = "linux")]
pub use mapper::MirroredRegion;
#[cfg(target_os = "linux")]
pub use mirror::{MirrorBuffer, MirrorByteRing};
pub use record::Record;
pub use ring::{IndexedBuffer, RecordRing};
pub use sizing::AlignedCapacity;
pub use soft::{Indexing, SoftBuffer, SoftByteRing};

use std::io;

/// Result type alias using [`RingError`].
pub type Result<T> = core::result::Result<T, RingError>;

/// Error types returned by ring construction, access and teardown.
///
/// Construction errors leave nothing mapped or allocated behind. Access
/// errors are recoverable and never change ring state.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// Reserving address space or creating the backing object failed.
    ///
    /// `stage` names the step that failed (the virtual reservation, the
    /// memfd creation or its truncation to the physical size). Any partial
    /// reservation has already been released when this is returned.
    #[error("{stage} failed: {source}")]
    AllocationFailed {
        /// Which construction step failed.
        stage: &'static str,
        /// The operating system error.
        source: io::Error,
    },

    /// Mapping the backing object over one slice of the reservation failed.
    ///
    /// Every slice mapped before `slice` has been unmapped together with the
    /// rest of the reservation.
    #[error("mapping mirror slice {slice} failed: {source}")]
    MappingFailed {
        /// Zero-based index of the slice that could not be mapped.
        slice: usize,
        /// The operating system error.
        source: io::Error,
    },

    /// A bounds-checked accessor was given an index past the valid extent.
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of addressable items.
        len: usize,
    },

    /// Unmapping the virtual region failed.
    ///
    /// Only returned by an explicit [`MirroredRegion::release`]. When a region
    /// is dropped the failure is logged instead, since destruction cannot
    /// fail outward.
    #[error("unmapping mirrored region failed: {0}")]
    UnmapFailed(#[source] io::Error),

    /// The requested sizes cannot describe a valid ring.
    ///
    /// Raised for zero mirror or element counts, arithmetic overflow,
    /// non-power-of-two counts on a masked ring, and element types whose size
    /// does not fit the physical buffer.
    #[error("invalid capacity {requested}: {reason}")]
    InvalidCapacity {
        /// The size that was asked for.
        requested: usize,
        /// Why it was rejected.
        reason: &'static str,
    },
}
