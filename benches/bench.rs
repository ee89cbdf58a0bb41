use std::thread;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use stashtable::{StashTable, NOT_IN_STASH};

const SIZE: usize = 10_000;

// A deterministic scrambled key stream, so runs are comparable without
// pulling in a random number generator.
fn keys() -> impl Iterator<Item = usize> {
    (0usize..).map(|i| i.wrapping_add(1).wrapping_mul(3_787_392_781))
}

fn single_thread(c: &mut Criterion) {
    c.bench_function("insert", |b| {
        b.iter_batched(
            || StashTable::<usize, usize>::with_capacity(SIZE),
            |table| {
                for key in keys().take(SIZE) {
                    table.insert(key, key);
                }
                table
            },
            BatchSize::LargeInput,
        )
    });

    c.bench_function("find_index", |b| {
        let table = StashTable::<usize, usize>::with_capacity(SIZE);
        for key in keys().take(SIZE) {
            table.insert(key, key);
        }

        b.iter(|| {
            for key in keys().take(SIZE) {
                black_box(assert_ne!(table.find_index(&key), NOT_IN_STASH));
            }
        });
    });

    c.bench_function("with_value", |b| {
        let table = StashTable::<usize, usize>::with_capacity(SIZE);
        for key in keys().take(SIZE) {
            table.insert(key, key);
        }

        b.iter(|| {
            for key in keys().take(SIZE) {
                black_box(table.with_value(&key, |v| *v += 1));
            }
        });
    });

    c.bench_function("upsert", |b| {
        let table = StashTable::<usize, usize>::with_capacity(SIZE);

        b.iter(|| {
            for key in keys().take(SIZE) {
                black_box(table.upsert(key, key));
            }
        });
    });

    c.bench_function("keys", |b| {
        let table = StashTable::<usize, usize>::with_capacity(SIZE);
        for key in keys().take(SIZE) {
            table.insert(key, key);
        }

        b.iter(|| black_box(table.keys().count()));
    });
}

fn contended(c: &mut Criterion) {
    let threads = thread::available_parallelism()
        .map(|p| p.get().min(8))
        .unwrap_or(4);

    c.bench_function("mixed_contended", |b| {
        b.iter_custom(|iters| {
            let table = StashTable::<usize, usize>::with_capacity(SIZE);
            for key in keys().take(SIZE / 2) {
                table.insert(key, key);
            }

            let start = Instant::now();
            thread::scope(|s| {
                for thread in 0..threads {
                    let table = &table;
                    s.spawn(move || {
                        let mut stream = keys().skip(thread);
                        for i in 0..iters {
                            let key = stream.next().unwrap();
                            match i % 4 {
                                0 => drop(black_box(table.find_index(&key))),
                                1 => drop(black_box(table.upsert(key, key))),
                                2 => drop(black_box(table.with_value(&key, |v| *v += 1))),
                                _ => table.remove(&key),
                            }
                        }
                    });
                }
            });
            start.elapsed()
        })
    });
}

criterion_group!(benches, single_thread, contended);
criterion_main!(benches);
