use std::time::Instant;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fastest of several timed runs of one benchmark case.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub seconds: f64,
    pub bytes: f64,
}

impl Measurement {
    pub fn bytes_per_sec(&self) -> f64 {
        if self.seconds > 0.0 {
            self.bytes / self.seconds
        } else {
            0.0
        }
    }

    pub fn gib_per_sec(&self) -> f64 {
        self.bytes_per_sec() / GIB
    }
}

/// Runs `run` against `target` `iters` times and keeps the fastest run.
///
/// `setup` runs before every timed run and is not measured. `run` returns a
/// checksum so the work cannot be optimized away; the checksum of the last
/// run is returned alongside the measurement.
///
/// # Arguments
///
/// * `iters` - Number of timed runs (at least one is always made)
/// * `bytes` - Bytes moved by one run, for the throughput figure
/// * `target` - The ring under test
/// * `setup` - Untimed preparation before each run
/// * `run` - The timed body
pub fn best_of<R, S, F>(
    iters: usize,
    bytes: usize,
    target: &mut R,
    mut setup: S,
    mut run: F,
) -> (Measurement, u64)
where
    S: FnMut(&mut R),
    F: FnMut(&mut R) -> u64,
{
    let mut best = f64::INFINITY;
    let mut checksum = 0;
    for _ in 0..iters.max(1) {
        setup(target);
        let start = Instant::now();
        checksum = std::hint::black_box(run(target));
        let seconds = start.elapsed().as_secs_f64();
        if seconds < best {
            best = seconds;
        }
    }
    (
        Measurement {
            seconds: best,
            bytes: bytes as f64,
        },
        checksum,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_setup_before_every_iteration() {
        let mut calls = (0, 0);
        let (m, checksum) = best_of(
            5,
            1024,
            &mut calls,
            |c| c.0 += 1,
            |c| {
                c.1 += 1;
                c.1
            },
        );
        assert_eq!(calls, (5, 5));
        assert_eq!(checksum, 5);
        assert_eq!(m.bytes, 1024.0);
        assert!(m.seconds.is_finite());
    }

    #[test]
    fn zero_iterations_still_measures_once() {
        let mut runs = 0u64;
        best_of(0, 1, &mut runs, |_| {}, |r| {
            *r += 1;
            *r
        });
        assert_eq!(runs, 1);
    }

    #[test]
    fn throughput_in_gib() {
        let m = Measurement {
            seconds: 0.5,
            bytes: GIB,
        };
        assert_eq!(m.gib_per_sec(), 2.0);
        let idle = Measurement {
            seconds: 0.0,
            bytes: 1.0,
        };
        assert_eq!(idle.bytes_per_sec(), 0.0);
    }
}
