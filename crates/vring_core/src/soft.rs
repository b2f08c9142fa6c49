//! Software ring buffers over a single heap allocation.
//!
//! Wraparound is explicit: indices are reduced with a mask (power-of-two
//! sizes only) or a modulo, and a record that straddles the end of the
//! buffer is copied in two parts. No OS services are involved, so these rings
//! work on every platform and serve as the reference the mirrored rings are
//! checked against.

use crate::record::Record;
use crate::ring::{IndexedBuffer, RecordRing};
use crate::sizing::next_power_of_two;
use crate::{Result, RingError};

/// How a software ring reduces an index into its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indexing {
    /// `index & (len - 1)`; the length must be a power of two.
    #[default]
    Mask,
    /// `index % len`; any positive length.
    Modulo,
}

impl Indexing {
    fn validate(self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(RingError::InvalidCapacity {
                requested: len,
                reason: "software ring length must be positive",
            });
        }
        if self == Indexing::Mask && !len.is_power_of_two() {
            return Err(RingError::InvalidCapacity {
                requested: len,
                reason: "masked indexing needs a power-of-two length",
            });
        }
        Ok(())
    }
}

#[inline(always)]
fn wrap(indexing: Indexing, mask: usize, len: usize, index: usize) -> usize {
    match indexing {
        Indexing::Mask => index & mask,
        Indexing::Modulo => index % len,
    }
}

/// Typed ring of `T` elements with wrapping indexed access.
pub struct SoftBuffer<T: Record> {
    data: Vec<T>,
    indexing: Indexing,
    mask: usize,
}

impl<T: Record> SoftBuffer<T> {
    /// Creates a zero-filled ring of `count` elements.
    pub fn new(count: usize, indexing: Indexing) -> Result<Self> {
        indexing.validate(count)?;
        Ok(Self {
            data: vec![T::zeroed(); count],
            indexing,
            mask: count - 1,
        })
    }

    /// Creates a masked ring with `count` rounded up to a power of two.
    pub fn with_pow2_count(count: usize) -> Result<Self> {
        let count = next_power_of_two(count).ok_or(RingError::InvalidCapacity {
            requested: count,
            reason: "no power of two that large fits in usize",
        })?;
        Self::new(count, Indexing::Mask)
    }

    /// Number of elements in the ring.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a ring holds at least one element.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// How indices are reduced into the storage.
    pub fn indexing(&self) -> Indexing {
        self.indexing
    }

    /// Size of the storage in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * size_of::<T>()
    }

    /// Reads the element at `index` wrapped into the ring.
    #[inline(always)]
    pub fn read(&self, index: usize) -> T {
        self.data[self.slot(index)]
    }

    /// Writes the element at `index` wrapped into the ring.
    #[inline(always)]
    pub fn write(&mut self, index: usize, value: T) {
        let slot = self.slot(index);
        self.data[slot] = value;
    }

    /// Reads the element at `index`, rejecting indices at or past [`Self::len`].
    pub fn get(&self, index: usize) -> Result<T> {
        self.check(index)?;
        Ok(self.data[index])
    }

    /// Writes the element at `index`, rejecting indices at or past [`Self::len`].
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check(index)?;
        self.data[index] = value;
        Ok(())
    }

    #[inline(always)]
    fn slot(&self, index: usize) -> usize {
        wrap(self.indexing, self.mask, self.data.len(), index)
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.data.len() {
            Ok(())
        } else {
            Err(RingError::OutOfRange {
                index,
                len: self.data.len(),
            })
        }
    }
}

impl<T: Record> IndexedBuffer<T> for SoftBuffer<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        SoftBuffer::get(self, index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        SoftBuffer::set(self, index, value)
    }

    #[inline(always)]
    unsafe fn read_unchecked(&self, index: usize) -> T {
        let slot = self.slot(index);
        // SAFETY: `slot` is reduced into 0..len by construction.
        unsafe { *self.data.get_unchecked(slot) }
    }

    #[inline(always)]
    unsafe fn write_unchecked(&mut self, index: usize, value: T) {
        let slot = self.slot(index);
        // SAFETY: `slot` is reduced into 0..len by construction.
        unsafe { *self.data.get_unchecked_mut(slot) = value };
    }
}

/// Byte ring of mixed-size records with explicit split copies at the end.
///
/// `head` and `tail` always stay in `0..capacity`.
pub struct SoftByteRing {
    data: Box<[u8]>,
    indexing: Indexing,
    mask: usize,
    head: usize,
    tail: usize,
}

impl SoftByteRing {
    /// Creates a zero-filled ring of `capacity` bytes.
    pub fn new(capacity: usize, indexing: Indexing) -> Result<Self> {
        indexing.validate(capacity)?;
        Ok(Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            indexing,
            mask: capacity - 1,
            head: 0,
            tail: 0,
        })
    }

    /// Size of the storage in bytes.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// How indices are reduced into the storage.
    pub fn indexing(&self) -> Indexing {
        self.indexing
    }

    /// Offset of the next write.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Offset of the next read.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Places the write cursor at `offset`, wrapped into the ring.
    pub fn set_head(&mut self, offset: usize) {
        self.head = offset % self.data.len();
    }

    /// Places the read cursor at `offset`, wrapped into the ring.
    pub fn set_tail(&mut self, offset: usize) {
        self.tail = offset % self.data.len();
    }

    /// Copies `record` in at the head, splitting the copy if it crosses the end.
    ///
    /// # Panics
    ///
    /// Panics if the record is larger than the whole ring.
    #[inline(always)]
    pub fn push<R: Record>(&mut self, record: R) {
        let bytes = bytemuck::bytes_of(&record);
        self.head = self.copy_in(self.head, bytes);
    }

    /// Copies a record out at the tail, joining the two parts if it crosses the end.
    ///
    /// # Panics
    ///
    /// Panics if the record is larger than the whole ring.
    #[inline(always)]
    pub fn pop<R: Record>(&mut self) -> R {
        let mut record = R::zeroed();
        self.tail = self.copy_out(self.tail, bytemuck::bytes_of_mut(&mut record));
        record
    }

    /// Zeroes both cursors. Ring memory is left untouched.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    #[inline(always)]
    fn copy_in(&mut self, cursor: usize, bytes: &[u8]) -> usize {
        let len = bytes.len();
        assert!(len <= self.data.len(), "record larger than the ring");
        let room = self.data.len() - cursor;
        if len <= room {
            self.data[cursor..cursor + len].copy_from_slice(bytes);
            self.advance(cursor + len)
        } else {
            let rest = len - room;
            self.data[cursor..].copy_from_slice(&bytes[..room]);
            self.data[..rest].copy_from_slice(&bytes[room..]);
            rest
        }
    }

    #[inline(always)]
    fn copy_out(&self, cursor: usize, out: &mut [u8]) -> usize {
        let len = out.len();
        assert!(len <= self.data.len(), "record larger than the ring");
        let room = self.data.len() - cursor;
        if len <= room {
            out.copy_from_slice(&self.data[cursor..cursor + len]);
            self.advance(cursor + len)
        } else {
            let rest = len - room;
            out[..room].copy_from_slice(&self.data[cursor..]);
            out[room..].copy_from_slice(&self.data[..rest]);
            rest
        }
    }

    #[inline(always)]
    fn advance(&self, next: usize) -> usize {
        wrap(self.indexing, self.mask, self.data.len(), next)
    }
}

impl RecordRing for SoftByteRing {
    fn push<R: Record>(&mut self, record: R) {
        SoftByteRing::push(self, record)
    }

    fn pop<R: Record>(&mut self) -> R {
        SoftByteRing::pop(self)
    }

    fn reset(&mut self) {
        SoftByteRing::reset(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_ring_requires_power_of_two() {
        assert!(SoftBuffer::<u32>::new(12, Indexing::Mask).is_err());
        assert!(SoftBuffer::<u32>::new(16, Indexing::Mask).is_ok());
        assert!(SoftByteRing::new(4000, Indexing::Mask).is_err());
    }

    #[test]
    fn zero_length_is_rejected() {
        let err = SoftBuffer::<u32>::new(0, Indexing::Modulo).err().unwrap();
        assert!(matches!(err, RingError::InvalidCapacity { requested: 0, .. }));
        assert!(SoftByteRing::new(0, Indexing::Modulo).is_err());
    }

    #[test]
    fn modulo_ring_accepts_any_length() {
        let mut buf = SoftBuffer::<u32>::new(12, Indexing::Modulo).unwrap();
        buf.write(13, 7);
        assert_eq!(buf.read(1), 7);
        assert_eq!(buf.read(25), 7);
    }

    #[test]
    fn pow2_constructor_rounds_up() {
        let buf = SoftBuffer::<u64>::with_pow2_count(1000).unwrap();
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.indexing(), Indexing::Mask);
        assert_eq!(buf.byte_len(), 8192);
    }

    #[test]
    fn masked_reads_wrap_past_the_end() {
        let mut buf = SoftBuffer::<u32>::new(8, Indexing::Mask).unwrap();
        for i in 8..16 {
            buf.write(i, i as u32);
        }
        for i in 0..8 {
            assert_eq!(buf.read(i), (i + 8) as u32);
        }
    }

    #[test]
    fn checked_access_rejects_out_of_range() {
        let mut buf = SoftBuffer::<u32>::new(8, Indexing::Mask).unwrap();
        assert!(buf.set(7, 1).is_ok());
        assert_eq!(buf.get(7).unwrap(), 1);
        assert!(matches!(
            buf.get(8),
            Err(RingError::OutOfRange { index: 8, len: 8 })
        ));
        assert!(buf.set(8, 2).is_err());
        assert_eq!(buf.read(0), 0);
    }

    #[test]
    fn unchecked_access_matches_checked() {
        let mut buf = SoftBuffer::<u16>::new(4, Indexing::Modulo).unwrap();
        unsafe { IndexedBuffer::write_unchecked(&mut buf, 3, 99) };
        assert_eq!(unsafe { IndexedBuffer::read_unchecked(&buf, 3) }, 99);
        assert_eq!(IndexedBuffer::get(&buf, 3).unwrap(), 99);
    }

    #[test]
    fn push_pop_without_wrap() {
        let mut ring = SoftByteRing::new(64, Indexing::Mask).unwrap();
        ring.push(0xdead_beef_u32);
        ring.push(7u64);
        assert_eq!(ring.head(), 12);
        assert_eq!(ring.pop::<u32>(), 0xdead_beef);
        assert_eq!(ring.pop::<u64>(), 7);
        assert_eq!(ring.tail(), 12);
    }

    #[test]
    fn record_straddling_the_end_is_split() {
        for indexing in [Indexing::Mask, Indexing::Modulo] {
            let mut ring = SoftByteRing::new(16, indexing).unwrap();
            ring.set_head(12);
            ring.set_tail(12);
            ring.push(0x0102_0304_0506_0708_u64);
            assert_eq!(ring.head(), 4);
            assert_eq!(ring.pop::<u64>(), 0x0102_0304_0506_0708);
            assert_eq!(ring.tail(), 4);
        }
    }

    #[test]
    fn record_ending_exactly_at_the_end_wraps_cursor_to_zero() {
        let mut ring = SoftByteRing::new(24, Indexing::Modulo).unwrap();
        ring.push([1u8; 8]);
        ring.push([2u8; 8]);
        ring.push([3u8; 8]);
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.pop::<[u8; 8]>(), [1; 8]);
        assert_eq!(ring.pop::<[u8; 8]>(), [2; 8]);
        assert_eq!(ring.pop::<[u8; 8]>(), [3; 8]);
        assert_eq!(ring.tail(), 0);
    }

    #[test]
    fn reset_keeps_memory() {
        let mut ring = SoftByteRing::new(32, Indexing::Mask).unwrap();
        ring.push(42u32);
        ring.reset();
        assert_eq!((ring.head(), ring.tail()), (0, 0));
        assert_eq!(ring.pop::<u32>(), 42);
    }

    #[test]
    #[should_panic]
    fn record_larger_than_ring_panics() {
        let mut ring = SoftByteRing::new(8, Indexing::Mask).unwrap();
        ring.push([0u8; 16]);
    }
}
