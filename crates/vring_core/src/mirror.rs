//! Rings that wrap through mirrored virtual memory.
//!
//! Because every slice of a [`MirroredRegion`] aliases the same physical
//! bytes, index `i` and index `i + physical_len` name the same element, and a
//! record copied linearly across a slice boundary lands where a wrapped copy
//! would. The only wrap left in software is the outer one, when a cursor
//! reaches the end of the finite virtual reservation.
//!
//! Mirrored slices alias behind the compiler's back: two different addresses
//! may hold the same byte. Every access is fenced with a compiler fence so
//! that a store through one alias is never forwarded past, or reordered
//! with, a load through another.

use crate::mapper::MirroredRegion;
use crate::record::Record;
use crate::ring::{IndexedBuffer, RecordRing};
use crate::sizing::{AlignedCapacity, page_size};
use crate::{Result, RingError};
use std::marker::PhantomData;
use std::sync::atomic::{Ordering, compiler_fence};

/// Typed indexed view of `T` over a mirrored region.
///
/// Valid indices are `0..len()`, where `len()` counts items across the whole
/// virtual range. Index `i` and `i + k * physical_len()` are the same
/// element for every `k` that stays in range.
pub struct MirrorBuffer<T: Record> {
    region: MirroredRegion,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Record> MirrorBuffer<T> {
    /// Page-rounds `physical_bytes` and mirrors it the default 16 times.
    pub fn new(physical_bytes: usize) -> Result<Self> {
        Self::with_capacity(AlignedCapacity::new(physical_bytes)?)
    }

    /// Page-rounds `physical_bytes` and mirrors it `mirrors` times.
    pub fn with_mirrors(physical_bytes: usize, mirrors: usize) -> Result<Self> {
        Self::with_capacity(AlignedCapacity::with_mirrors(physical_bytes, mirrors)?)
    }

    /// Maps a region of exactly `capacity`.
    ///
    /// The element size must divide the physical size, so that element
    /// slots line up identically in every slice. The element alignment may
    /// not exceed the page size, since mmap only guarantees page alignment.
    pub fn with_capacity(capacity: AlignedCapacity) -> Result<Self> {
        let item = size_of::<T>();
        if item == 0 {
            return Err(RingError::InvalidCapacity {
                requested: capacity.physical(),
                reason: "zero-sized element type",
            });
        }
        if align_of::<T>() > page_size() {
            return Err(RingError::InvalidCapacity {
                requested: align_of::<T>(),
                reason: "element alignment exceeds the page size",
            });
        }
        if capacity.physical() % item != 0 {
            return Err(RingError::InvalidCapacity {
                requested: capacity.physical(),
                reason: "element size must divide the physical size",
            });
        }

        let region = MirroredRegion::new(capacity)?;
        Ok(Self {
            len: capacity.virtual_size() / item,
            region,
            _marker: PhantomData,
        })
    }

    /// Number of addressable items across the whole virtual range.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a mapped region holds at least one page.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items per physical slice; the distance between two aliases.
    #[inline(always)]
    pub fn physical_len(&self) -> usize {
        self.region.physical_size() / size_of::<T>()
    }

    /// Number of physical slices in the virtual range.
    pub fn slice_count(&self) -> usize {
        self.region.slice_count()
    }

    /// The underlying mapped region.
    pub fn region(&self) -> &MirroredRegion {
        &self.region
    }

    /// Reads item `index`, or reports `OutOfRange` if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.check(index)?;
        // SAFETY: checked above.
        Ok(unsafe { self.read_unchecked(index) })
    }

    /// Writes item `index`, or reports `OutOfRange` if `index >= len()`.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check(index)?;
        // SAFETY: checked above.
        unsafe { self.write_unchecked(index, value) };
        Ok(())
    }

    /// Reads item `index` with no validation and no wrap logic.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`MirrorBuffer::len`].
    #[inline(always)]
    pub unsafe fn read_unchecked(&self, index: usize) -> T {
        compiler_fence(Ordering::SeqCst);
        // SAFETY: the caller keeps `index` inside the mapped virtual range.
        // Slots are aligned: the base is page aligned, `with_capacity`
        // rejects alignments above a page, and the item size is a multiple
        // of its alignment.
        unsafe { self.slot(index).read() }
    }

    /// Writes item `index` with no validation and no wrap logic.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`MirrorBuffer::len`].
    #[inline(always)]
    pub unsafe fn write_unchecked(&mut self, index: usize, value: T) {
        // SAFETY: as in `read_unchecked`.
        unsafe { self.slot(index).write(value) };
        compiler_fence(Ordering::SeqCst);
    }

    #[inline(always)]
    fn slot(&self, index: usize) -> *mut T {
        self.region.base().as_ptr().cast::<T>().wrapping_add(index)
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(RingError::OutOfRange {
                index,
                len: self.len,
            })
        }
    }
}

impl<T: Record> IndexedBuffer<T> for MirrorBuffer<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<T> {
        MirrorBuffer::get(self, index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        MirrorBuffer::set(self, index, value)
    }

    #[inline(always)]
    unsafe fn read_unchecked(&self, index: usize) -> T {
        // SAFETY: forwarded caller contract.
        unsafe { MirrorBuffer::read_unchecked(self, index) }
    }

    #[inline(always)]
    unsafe fn write_unchecked(&mut self, index: usize, value: T) {
        // SAFETY: forwarded caller contract.
        unsafe { MirrorBuffer::write_unchecked(self, index, value) }
    }
}

/// Producer/consumer byte queue over a mirrored region.
///
/// `head` (next write) and `tail` (next read) are byte offsets in
/// `0..virtual_size()`. Records of any [`Record`] type up to the physical
/// size may be mixed; each push or pop is one linear copy.
pub struct MirrorByteRing {
    region: MirroredRegion,
    virtual_size: usize,
    head: usize,
    tail: usize,
}

impl MirrorByteRing {
    /// Page-rounds `physical_bytes` and mirrors it over the default byte span.
    pub fn new(physical_bytes: usize) -> Result<Self> {
        Self::with_capacity(AlignedCapacity::for_bytes(physical_bytes)?)
    }

    /// Page-rounds `physical_bytes` and mirrors it `mirrors` times.
    pub fn with_mirrors(physical_bytes: usize, mirrors: usize) -> Result<Self> {
        Self::with_capacity(AlignedCapacity::with_mirrors(physical_bytes, mirrors)?)
    }

    /// Maps a region of `capacity` plus one trailing guard slice.
    pub fn with_capacity(capacity: AlignedCapacity) -> Result<Self> {
        let region = MirroredRegion::with_guard_slice(capacity)?;
        Ok(Self {
            virtual_size: capacity.virtual_size(),
            region,
            head: 0,
            tail: 0,
        })
    }

    #[inline(always)]
    pub fn physical_size(&self) -> usize {
        self.region.physical_size()
    }

    #[inline(always)]
    pub fn virtual_size(&self) -> usize {
        self.virtual_size
    }

    /// Number of physical slices in the virtual range, excluding the guard.
    pub fn slice_count(&self) -> usize {
        self.region.slice_count()
    }

    /// Offset of the next write.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Offset of the next read.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Places the write cursor at `offset`, wrapped into the virtual range.
    pub fn set_head(&mut self, offset: usize) {
        self.head = offset % self.virtual_size;
    }

    /// Places the read cursor at `offset`, wrapped into the virtual range.
    pub fn set_tail(&mut self, offset: usize) {
        self.tail = offset % self.virtual_size;
    }

    /// Copies `record` in at the head as one linear copy.
    ///
    /// # Panics
    ///
    /// Panics if the record is larger than the physical size.
    #[inline(always)]
    pub fn push<R: Record>(&mut self, record: R) {
        let len = self.record_len::<R>();
        // SAFETY: head < virtual_size and len <= physical_size, so the copy
        // ends inside the guard slice at worst.
        unsafe {
            self.at(self.head).cast::<R>().write_unaligned(record);
        }
        compiler_fence(Ordering::SeqCst);
        self.head = self.advance(self.head, len);
    }

    /// Copies a record out at the tail as one linear copy.
    ///
    /// # Panics
    ///
    /// Panics if the record is larger than the physical size.
    #[inline(always)]
    pub fn pop<R: Record>(&mut self) -> R {
        let len = self.record_len::<R>();
        compiler_fence(Ordering::SeqCst);
        // SAFETY: as in `push`; any bit pattern is a valid `R`.
        let record = unsafe { self.at(self.tail).cast::<R>().read_unaligned() };
        self.tail = self.advance(self.tail, len);
        record
    }

    /// Zeroes both cursors. Ring memory is left untouched.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Reads the byte at `offset`, or reports `OutOfRange` if `offset` is at
    /// or past [`MirrorByteRing::virtual_size`]. Cursors are not touched.
    pub fn byte(&self, offset: usize) -> Result<u8> {
        self.check(offset)?;
        // SAFETY: checked above.
        Ok(unsafe { self.byte_unchecked(offset) })
    }

    /// Writes the byte at `offset`, or reports `OutOfRange` if `offset` is at
    /// or past [`MirrorByteRing::virtual_size`]. Cursors are not touched.
    pub fn set_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        self.check(offset)?;
        // SAFETY: checked above.
        unsafe { self.set_byte_unchecked(offset, value) };
        Ok(())
    }

    /// Reads the byte at `offset` with no validation.
    ///
    /// # Safety
    ///
    /// `offset` must be less than [`MirrorByteRing::virtual_size`].
    #[inline(always)]
    pub unsafe fn byte_unchecked(&self, offset: usize) -> u8 {
        compiler_fence(Ordering::SeqCst);
        // SAFETY: the caller keeps `offset` inside the virtual range.
        unsafe { self.at(offset).read() }
    }

    /// Writes the byte at `offset` with no validation.
    ///
    /// # Safety
    ///
    /// `offset` must be less than [`MirrorByteRing::virtual_size`].
    #[inline(always)]
    pub unsafe fn set_byte_unchecked(&mut self, offset: usize, value: u8) {
        // SAFETY: as in `byte_unchecked`.
        unsafe { self.at(offset).write(value) };
        compiler_fence(Ordering::SeqCst);
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset < self.virtual_size {
            Ok(())
        } else {
            Err(RingError::OutOfRange {
                index: offset,
                len: self.virtual_size,
            })
        }
    }

    #[inline(always)]
    fn record_len<R: Record>(&self) -> usize {
        let len = size_of::<R>();
        assert!(
            len <= self.region.physical_size(),
            "record larger than the physical buffer"
        );
        len
    }

    #[inline(always)]
    fn at(&self, offset: usize) -> *mut u8 {
        self.region.base().as_ptr().wrapping_add(offset)
    }

    #[inline(always)]
    fn advance(&self, cursor: usize, len: usize) -> usize {
        let next = cursor + len;
        if next >= self.virtual_size {
            next - self.virtual_size
        } else {
            next
        }
    }
}

impl RecordRing for MirrorByteRing {
    fn push<R: Record>(&mut self, record: R) {
        MirrorByteRing::push(self, record)
    }

    fn pop<R: Record>(&mut self) -> R {
        MirrorByteRing::pop(self)
    }

    fn reset(&mut self) {
        MirrorByteRing::reset(self)
    }
}
