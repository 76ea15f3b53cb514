//! Thread control: the create / join / exit / reap cycle.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nanok_kernel::{Config, Kernel};

fn create_join(c: &mut Criterion) {
    c.bench_function("thread/create_join_cycle", |b| {
        let mut k = Kernel::new(Config::new(4));
        let root = k.spawn_initial(0x8000, 0x1_0000, 0, 1).unwrap();

        b.iter(|| {
            k.sys_thread_create(0x8000, 0x1_0000, 0, 0);
            let child = k.retval(root);
            // Joining hands the CPU to the child; its exit reaps it and
            // hands the CPU back.
            k.sys_thread_join(child);
            k.sys_thread_exit();
            black_box(k.retval(root));
        });
    });
}

criterion_group!(benches, create_join);
criterion_main!(benches);
