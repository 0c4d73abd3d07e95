//! This benchmark test is designed to answer the following question: How many
//! threads have to contend for distinct values for per-value locking to pay
//! off over a single mutex?
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{convert::TryInto, thread};

use valuelock::raw::{DynamicValueLock, FakeValueLock, RawValueLock, ValueLock};

/// The number of lock-unlock cycles per thread in each iteration
const NUM_CYCLES: usize = 256;

/// The amount of work done while holding a value
const WORK: u32 = 64;

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Uncontended lock-unlock");
    group.throughput(Throughput::Elements(NUM_CYCLES.try_into().unwrap()));

    macro_rules! bench_single {
        ($name:expr, $ctor:expr) => {
            group.bench_function(BenchmarkId::new($name, "same value"), |b| {
                let lock = $ctor;
                b.iter(|| {
                    for _ in 0..NUM_CYCLES {
                        cycle(&lock, 1, 0);
                    }
                });
            });

            group.bench_function(BenchmarkId::new($name, "random values"), |b| {
                let lock = $ctor;
                let values = random_values(0, NUM_CYCLES, 1024);
                b.iter(|| {
                    for &value in values.iter() {
                        cycle(&lock, value, 0);
                    }
                });
            });

            group.bench_function(BenchmarkId::new($name, "lock_all"), |b| {
                let lock = $ctor;
                b.iter(|| {
                    for _ in 0..NUM_CYCLES {
                        lock.lock_all();
                        unsafe { lock.unlock_all() };
                    }
                });
            });
        };
    }

    bench_single!("ValueLock", ValueLock::<u32, 16>::new());
    bench_single!("DynamicValueLock", DynamicValueLock::<u32>::new());
    bench_single!("FakeValueLock", FakeValueLock::<u32>::new());
    group.finish();

    let mut group = c.benchmark_group("Contended lock-unlock");
    for num_threads in [1usize, 2, 4, 8] {
        group.throughput(Throughput::Elements(
            (num_threads * NUM_CYCLES).try_into().unwrap(),
        ));

        macro_rules! bench_threads {
            ($name:expr, $ctor:expr) => {
                group.bench_function(
                    BenchmarkId::new(format!("{}, distinct values", $name), num_threads),
                    |b| {
                        let lock = $ctor;
                        b.iter(|| run_threads(&lock, num_threads, |t, _| t as u32 + 1));
                    },
                );

                group.bench_function(
                    BenchmarkId::new(format!("{}, random values", $name), num_threads),
                    |b| {
                        let lock = $ctor;
                        let values: Vec<_> = (0..num_threads)
                            .map(|t| random_values(t as u64, NUM_CYCLES, 16))
                            .collect();
                        b.iter(|| run_threads(&lock, num_threads, |t, i| values[t][i]));
                    },
                );
            };
        }

        bench_threads!("ValueLock", ValueLock::<u32, 16>::new());
        bench_threads!("DynamicValueLock", DynamicValueLock::<u32>::new());
        bench_threads!("FakeValueLock", FakeValueLock::<u32>::new());
    }
    group.finish();
}

/// Values in `1..=range`, so that the sentinel is never used.
fn random_values(seed: u64, len: usize, range: u32) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(1..=range)).collect()
}

#[inline]
fn cycle(lock: &impl RawValueLock<Value = u32>, value: u32, work: u32) {
    lock.lock(&value).unwrap();
    touch(work);
    unsafe { lock.unlock(&value).unwrap() };
}

fn run_threads<L>(lock: &L, num_threads: usize, value: impl Fn(usize, usize) -> u32 + Sync)
where
    L: RawValueLock<Value = u32> + Sync,
{
    let value = &value;
    thread::scope(|s| {
        for t in 0..num_threads {
            s.spawn(move || {
                for i in 0..NUM_CYCLES {
                    cycle(lock, value(t, i), WORK);
                }
            });
        }
    });
}

#[inline(never)]
fn touch(work: u32) {
    let mut x = 0u32;
    for i in 0..work {
        x = criterion::black_box(x.wrapping_add(i));
    }
}
