//! Runs alone in its own test binary: it exhausts the per-process mapping
//! limit on purpose, which would starve any region mapped concurrently.
#![cfg(target_os = "linux")]

use std::fs;
use vring_core::sizing::{AlignedCapacity, page_size};
use vring_core::{MirroredRegion, RingError};

fn mapping_count() -> usize {
    fs::read_to_string("/proc/self/maps").unwrap().lines().count()
}

fn max_map_count() -> usize {
    fs::read_to_string("/proc/sys/vm/max_map_count")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(65_530)
}

#[test]
fn failed_slice_mapping_unmaps_every_earlier_slice() {
    let limit = max_map_count();
    if limit > 4_000_000 {
        // Reserving past this limit would need more address space than is
        // sensible for a test.
        return;
    }
    let slices = (limit + 1000).max(200_000);
    let before = mapping_count();

    let capacity = AlignedCapacity::with_mirrors(page_size(), slices).unwrap();
    let result = MirroredRegion::new(capacity);
    match result {
        Err(RingError::MappingFailed { slice, .. }) => {
            assert!(slice > 0 && slice < slices, "failed at slice {slice}");
        }
        Err(other) => panic!("expected a slice mapping failure, got {other}"),
        Ok(_) => panic!("{slices} slices mapped past a limit of {limit}"),
    }

    assert_eq!(mapping_count(), before);

    // The address space is usable again.
    let region = MirroredRegion::new(AlignedCapacity::with_mirrors(1, 4).unwrap()).unwrap();
    assert_eq!(region.slice_count(), 4);
}
