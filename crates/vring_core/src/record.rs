use bytemuck::Pod;

/// A fixed-size value that can be copied into and out of ring memory as bytes.
///
/// Every [`Pod`] type qualifies: no padding, no pointers, and every bit
/// pattern is a valid value. That last property matters for the rings, which
/// never track occupancy. Popping unwritten or overwritten bytes yields
/// garbage, but never an invalid value.
pub trait Record: Pod {}

impl<T: Pod> Record for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_record<R: Record>() {}

    #[test]
    fn plain_data_types_are_records() {
        assert_record::<u8>();
        assert_record::<u64>();
        assert_record::<[u32; 8]>();
        assert_record::<f64>();
    }
}
