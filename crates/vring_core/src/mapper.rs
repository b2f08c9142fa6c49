//! Virtual alias regions backed by a single anonymous memory object.
//!
//! A region first reserves its whole virtual range with no access rights, so
//! no other mapping can land inside it while it is being populated. It then
//! creates one memfd of the physical size and maps it, read/write and shared,
//! at a fixed address over every physical-size slice of the reservation.
//! Each slice is a live alias of the same bytes: a write through any slice is
//! visible through all of them, and a linear copy that runs off the end of
//! one slice continues at offset zero of the backing object.

use crate::sizing::AlignedCapacity;
use crate::{Result, RingError};
use std::ffi::CStr;
use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};

const MEMFD_NAME: &CStr = c"vring";

/// An owned virtual range whose slices all alias one physical buffer.
///
/// The range is unmapped exactly once: by [`MirroredRegion::release`], which
/// reports failure, or by `Drop`, which logs it.
pub struct MirroredRegion {
    /// Start of the reservation; page aligned.
    base: NonNull<u8>,

    /// Physical and virtual sizes the region was built for.
    capacity: AlignedCapacity,

    /// Total mapped length, including any trailing guard slice.
    ///
    /// Always `capacity.virtual_size()` plus zero or one physical sizes.
    mapped_len: usize,
}

impl MirroredRegion {
    /// Reserves `capacity.virtual_size()` bytes and mirrors the physical
    /// buffer over every slice.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Page-aligned physical size and its virtual multiple
    ///
    /// # Returns
    ///
    /// The mapped region, or `AllocationFailed` / `MappingFailed`. On error
    /// nothing stays mapped and the memfd is closed.
    pub fn new(capacity: AlignedCapacity) -> Result<Self> {
        Self::map(capacity, 0)
    }

    /// Like [`MirroredRegion::new`], with one extra alias slice past the
    /// virtual end.
    ///
    /// A record written at a cursor just below `virtual_size` can then run
    /// past the end and still land on physical offset zero, as long as the
    /// record is no larger than the physical size.
    pub fn with_guard_slice(capacity: AlignedCapacity) -> Result<Self> {
        Self::map(capacity, 1)
    }

    fn map(capacity: AlignedCapacity, guard_slices: usize) -> Result<Self> {
        let physical = capacity.physical();
        let slices = capacity.slice_count() + guard_slices;
        let mapped_len = physical
            .checked_mul(slices)
            .ok_or(RingError::InvalidCapacity {
                requested: capacity.virtual_size(),
                reason: "mapped length overflows usize",
            })?;

        // From here on every early return drops `region`, which unmaps the
        // whole reservation including any slices already mapped.
        let region = Self::reserve(capacity, mapped_len)?;
        let backing = create_backing(physical)?;

        for slice in 0..slices {
            if let Err(source) = region.map_slice(&backing, slice) {
                tracing::warn!(
                    slice,
                    slices,
                    error = %source,
                    "mirror mapping failed, releasing reservation"
                );
                return Err(RingError::MappingFailed { slice, source });
            }
        }

        // The shared mappings keep the memory alive without the descriptor.
        drop(backing);

        tracing::debug!(
            physical,
            virtual_size = capacity.virtual_size(),
            slices,
            "mirrored region mapped"
        );
        Ok(region)
    }

    fn reserve(capacity: AlignedCapacity, mapped_len: usize) -> Result<Self> {
        // SAFETY: a fresh anonymous PROT_NONE mapping at a kernel-chosen
        // address cannot overlap memory anyone else owns.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RingError::AllocationFailed {
                stage: "virtual reservation",
                source: io::Error::last_os_error(),
            });
        }

        let base = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| RingError::AllocationFailed {
            stage: "virtual reservation",
            source: io::Error::other("mmap returned a null address"),
        })?;

        Ok(Self {
            base,
            capacity,
            mapped_len,
        })
    }

    fn map_slice(&self, backing: &OwnedFd, slice: usize) -> io::Result<()> {
        let physical = self.capacity.physical();
        // SAFETY: the slice lies entirely inside this region's reservation,
        // so MAP_FIXED only replaces pages this region already owns.
        let ptr = unsafe {
            let addr = self.base.as_ptr().add(slice * physical);
            libc::mmap(
                addr.cast(),
                physical,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                backing.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Unmaps the region, reporting failure instead of logging it.
    pub fn release(self) -> Result<()> {
        let region = ManuallyDrop::new(self);
        region.unmap().map_err(RingError::UnmapFailed)
    }

    fn unmap(&self) -> io::Result<()> {
        // SAFETY: base..base + mapped_len is exactly the reservation made in
        // `reserve`, and no references into it outlive `self`.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.mapped_len) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Start of the region.
    #[inline(always)]
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Start of the region, for writing.
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline(always)]
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Physical and virtual sizes the region was mapped with.
    #[inline(always)]
    pub fn capacity(&self) -> AlignedCapacity {
        self.capacity
    }

    /// Bytes of real memory behind the region.
    #[inline(always)]
    pub fn physical_size(&self) -> usize {
        self.capacity.physical()
    }

    /// Bytes of the logical virtual range, excluding any guard slice.
    #[inline(always)]
    pub fn virtual_size(&self) -> usize {
        self.capacity.virtual_size()
    }

    /// Number of slices in the logical virtual range.
    #[inline(always)]
    pub fn slice_count(&self) -> usize {
        self.capacity.slice_count()
    }

    /// Bytes actually mapped, including any guard slice.
    #[inline(always)]
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }
}

impl Drop for MirroredRegion {
    fn drop(&mut self) {
        if let Err(error) = self.unmap() {
            tracing::error!(
                %error,
                len = self.mapped_len,
                "failed to unmap mirrored region"
            );
        }
    }
}

// SAFETY: the region is exclusively owned; moving it to another thread moves
// sole access with it.
unsafe impl Send for MirroredRegion {}

fn create_backing(len: usize) -> Result<OwnedFd> {
    // SAFETY: MEMFD_NAME is a valid NUL-terminated string.
    let fd = unsafe { libc::memfd_create(MEMFD_NAME.as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(RingError::AllocationFailed {
            stage: "memfd_create",
            source: io::Error::last_os_error(),
        });
    }
    // SAFETY: `fd` was just returned by memfd_create and nothing else owns it.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let size = libc::off_t::try_from(len).map_err(|_| RingError::InvalidCapacity {
        requested: len,
        reason: "physical size exceeds off_t",
    })?;
    // SAFETY: `fd` is an open memfd.
    if unsafe { libc::ftruncate(fd.as_raw_fd(), size) } < 0 {
        return Err(RingError::AllocationFailed {
            stage: "ftruncate",
            source: io::Error::last_os_error(),
        });
    }
    Ok(fd)
}
