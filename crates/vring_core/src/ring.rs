//! Contracts shared by the mirrored and software engines.
//!
//! Both engines must be externally indistinguishable: given the same sequence
//! of pushes and pops of the same record types, they return the same bytes.

use crate::Result;
use crate::record::Record;

/// A byte-cursor queue of fixed-layout records.
///
/// There is no length tracking and no full/empty distinction. Callers track
/// their own occupancy; popping past the last push or pushing over unread
/// records returns or overwrites whatever bytes are present.
pub trait RecordRing {
    /// Copies `record` in at the head cursor and advances it.
    fn push<R: Record>(&mut self, record: R);

    /// Copies a record out at the tail cursor and advances it.
    fn pop<R: Record>(&mut self) -> R;

    /// Moves both cursors back to zero without clearing memory.
    fn reset(&mut self);
}

/// Indexed element access with checked and unchecked variants.
///
/// The two variants have identical semantics on valid indices. The checked
/// ones validate `index < len()` and report [`crate::RingError::OutOfRange`]
/// without touching state; the unchecked ones skip validation entirely.
pub trait IndexedBuffer<T: Record> {
    /// Number of addressable elements.
    fn len(&self) -> usize;

    /// Returns true if no element is addressable.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the element at `index`, validating it first.
    fn get(&self, index: usize) -> Result<T>;

    /// Writes `value` at `index`, validating it first.
    fn set(&mut self, index: usize, value: T) -> Result<()>;

    /// Reads the element at `index` without validation.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`IndexedBuffer::len`].
    unsafe fn read_unchecked(&self, index: usize) -> T;

    /// Writes `value` at `index` without validation.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`IndexedBuffer::len`].
    unsafe fn write_unchecked(&mut self, index: usize, value: T);
}
