use bytemuck::{Pod, Zeroable};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use vring_core::{Indexing, SoftBuffer, SoftByteRing};

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Sample {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
    e: f64,
    f: f64,
}

const RING_BYTES: usize = 64 * 1024;
const BATCH: usize = RING_BYTES / size_of::<Sample>();

fn sample() -> Sample {
    Sample {
        a: 1,
        b: 2,
        c: 3,
        d: 4,
        e: 5.0,
        f: 6.0,
    }
}

fn bench_byte_rings(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_ring_push_pop");
    group.throughput(Throughput::Bytes((BATCH * size_of::<Sample>()) as u64));

    let mut soft = SoftByteRing::new(RING_BYTES, Indexing::Mask).unwrap();
    // Offset by half a record so every pass splits at the boundary.
    soft.set_head(16);
    soft.set_tail(16);
    group.bench_function("soft", |b| {
        b.iter(|| {
            for _ in 0..BATCH {
                soft.push(sample());
            }
            let mut sum = 0u32;
            for _ in 0..BATCH {
                sum = sum.wrapping_add(soft.pop::<Sample>().d);
            }
            black_box(sum)
        })
    });

    #[cfg(target_os = "linux")]
    {
        let mut mirror = vring_core::MirrorByteRing::new(RING_BYTES).unwrap();
        mirror.set_head(16);
        mirror.set_tail(16);
        group.bench_function("mirror", |b| {
            b.iter(|| {
                for _ in 0..BATCH {
                    mirror.push(sample());
                }
                let mut sum = 0u32;
                for _ in 0..BATCH {
                    sum = sum.wrapping_add(mirror.pop::<Sample>().d);
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_typed_wraparound(c: &mut Criterion) {
    const COUNT: usize = RING_BYTES / size_of::<u32>();
    let mut group = c.benchmark_group("typed_wraparound_write");
    group.throughput(Throughput::Bytes(RING_BYTES as u64));

    let mut soft = SoftBuffer::<u32>::new(COUNT, Indexing::Mask).unwrap();
    group.bench_function("soft", |b| {
        b.iter(|| {
            for i in COUNT..2 * COUNT {
                soft.write(i, i as u32);
            }
            black_box(soft.read(0))
        })
    });

    #[cfg(target_os = "linux")]
    {
        let mut mirror = vring_core::MirrorBuffer::<u32>::new(RING_BYTES).unwrap();
        let count = mirror.physical_len();
        group.bench_function("mirror", |b| {
            b.iter(|| {
                for i in count..2 * count {
                    // SAFETY: 2 * count is within the 16 default mirrors.
                    unsafe { mirror.write_unchecked(i, i as u32) };
                }
                black_box(mirror.get(0).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_byte_rings, bench_typed_wraparound);
criterion_main!(benches);
