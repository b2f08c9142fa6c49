//! 32-byte record push/pop on both byte rings.

use crate::report::{CaseResult, SizeReport};
use crate::throughput::best_of;
use anyhow::{Context, Result, ensure};
use bytemuck::{Pod, Zeroable};
use vring_core::sizing::next_power_of_two;
use vring_core::{Indexing, MirrorByteRing, RecordRing, SoftByteRing};

/// Payload moved by every push and pop.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct Sample {
    a: u64,
    b: u64,
    c: u64,
    d: u64,
}

impl Sample {
    fn new(i: usize) -> Self {
        let i = i as u64;
        Self {
            a: i,
            b: i ^ 0x5555,
            c: i.wrapping_mul(3),
            d: 1,
        }
    }
}

const RECORD: usize = size_of::<Sample>();

/// Runs the byte suite for every ring size.
///
/// The software ring is sized to the next power of two so it can mask; the
/// mirrored ring is page-rounded and mirrored over the default byte span.
pub fn run_bytes(sizes: &[usize], iters: usize) -> Result<Vec<SizeReport>> {
    let mut reports = Vec::with_capacity(sizes.len());
    for &size in sizes {
        tracing::info!(size, iters, "byte suite");
        let items = size / RECORD;
        ensure!(items > 0, "ring of {size} bytes holds no {RECORD}-byte record");

        let soft_len = next_power_of_two(size).context("software ring size overflows")?;
        let mut soft = SoftByteRing::new(soft_len, Indexing::Mask)
            .with_context(|| format!("software ring of {soft_len} bytes"))?;
        let mut mirror = MirrorByteRing::new(size)
            .with_context(|| format!("mirrored ring of {size} bytes"))?;
        tracing::debug!(
            physical = mirror.physical_size(),
            slices = mirror.slice_count(),
            "mirrored byte ring ready"
        );

        let cases = vec![
            sequential_write(&mut soft, &mut mirror, items, iters),
            sequential_read(&mut soft, &mut mirror, items, iters)?,
            wraparound_write(&mut soft, &mut mirror, items, iters),
            wraparound_read(&mut soft, &mut mirror, items, iters)?,
        ];
        for case in &cases {
            case.print(size);
        }
        reports.push(SizeReport { size, cases });
    }
    Ok(reports)
}

fn push_n<R: RecordRing>(ring: &mut R, items: usize) -> u64 {
    for i in 0..items {
        ring.push(Sample::new(i));
    }
    0
}

fn pop_n<R: RecordRing>(ring: &mut R, items: usize) -> u64 {
    (0..items).map(|_| ring.pop::<Sample>().d).sum()
}

fn refill<R: RecordRing>(ring: &mut R, items: usize) {
    ring.reset();
    push_n(ring, items);
}

fn sequential_write(
    soft: &mut SoftByteRing,
    mirror: &mut MirrorByteRing,
    items: usize,
    iters: usize,
) -> CaseResult {
    let bytes = items * RECORD;
    let (s, _) = best_of(iters, bytes, soft, |r| r.reset(), |r| push_n(r, items));
    let (m, _) = best_of(iters, bytes, mirror, |r| r.reset(), |r| push_n(r, items));
    CaseResult {
        name: "seq_w",
        soft: s,
        mirror: m,
    }
}

fn sequential_read(
    soft: &mut SoftByteRing,
    mirror: &mut MirrorByteRing,
    items: usize,
    iters: usize,
) -> Result<CaseResult> {
    let bytes = items * RECORD;
    let (s, soft_sum) = best_of(iters, bytes, soft, |r| refill(r, items), |r| pop_n(r, items));
    let (m, mirror_sum) = best_of(iters, bytes, mirror, |r| refill(r, items), |r| {
        pop_n(r, items)
    });
    check_sum(items, soft_sum, mirror_sum)?;
    Ok(CaseResult {
        name: "seq_r",
        soft: s,
        mirror: m,
    })
}

fn wraparound_write(
    soft: &mut SoftByteRing,
    mirror: &mut MirrorByteRing,
    items: usize,
    iters: usize,
) -> CaseResult {
    // Twice the ring's worth of records, so every run crosses the physical end.
    let bytes = 2 * items * RECORD;
    let (s, _) = best_of(iters, bytes, soft, |r| r.reset(), |r| push_n(r, 2 * items));
    let (m, _) = best_of(iters, bytes, mirror, |r| r.reset(), |r| push_n(r, 2 * items));
    CaseResult {
        name: "wrap_w",
        soft: s,
        mirror: m,
    }
}

fn wraparound_read(
    soft: &mut SoftByteRing,
    mirror: &mut MirrorByteRing,
    items: usize,
    iters: usize,
) -> Result<CaseResult> {
    let bytes = items * RECORD;
    let (s, soft_sum) = best_of(
        iters,
        bytes,
        soft,
        |r| {
            let mid = r.capacity() / 2;
            r.set_head(mid);
            r.set_tail(mid);
            push_n(r, items);
        },
        |r| pop_n(r, items),
    );
    let (m, mirror_sum) = best_of(
        iters,
        bytes,
        mirror,
        |r| {
            let mid = r.physical_size() / 2;
            r.set_head(mid);
            r.set_tail(mid);
            push_n(r, items);
        },
        |r| pop_n(r, items),
    );
    check_sum(items, soft_sum, mirror_sum)?;
    Ok(CaseResult {
        name: "wrap_r",
        soft: s,
        mirror: m,
    })
}

fn check_sum(items: usize, soft: u64, mirror: u64) -> Result<()> {
    let expected = items as u64;
    ensure!(soft == expected, "software checksum {soft} != {expected}");
    ensure!(mirror == expected, "mirrored checksum {mirror} != {expected}");
    Ok(())
}
