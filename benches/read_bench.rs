//! Benchmarks for the open/drain/release cycle.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench read_bench
//! ```

use chardev_core::SessionId;
use chardev_device::mock::UserBuffer;
use chardev_device::{FileOperations, HelloDevice, ModulePin};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

/// Benchmark a full session drained with different read sizes.
fn bench_session_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_drain");
    group.throughput(Throughput::Elements(1));

    for chunk in [1usize, 8, 80] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let device = HelloDevice::new("chardev", ModulePin::new("chardev"));
            b.iter(|| {
                let session = SessionId::next();
                device.open(session).unwrap();
                let mut buffer = UserBuffer::new(128);
                while device.read(session, &mut buffer, chunk).unwrap() > 0 {}
                device.release(session).unwrap();
                black_box(buffer);
            });
        });
    }

    group.finish();
}

/// Benchmark the busy path, an open refused while another session holds the device.
fn bench_busy_open(c: &mut Criterion) {
    let device = HelloDevice::new("chardev", ModulePin::new("chardev"));
    device.open(SessionId::next()).unwrap();

    c.bench_function("busy_open", |b| {
        b.iter(|| black_box(device.open(black_box(SessionId::next())).is_err()));
    });
}

criterion_group!(benches, bench_session_drain, bench_busy_open);
criterion_main!(benches);
