use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parkgate_control::{CapacityAllocator, ParkingSystem, Scheduler};
use parkgate_core::{Config, Millis, VehicleClass, VipFallbackPolicy};
use parkgate_hal::SimPlatform;

// ---------------------------------------------------------------------------
// Benchmark: one full system tick
// ---------------------------------------------------------------------------

fn bench_idle_tick(c: &mut Criterion) {
    let mut sys = ParkingSystem::new(SimPlatform::manual(), Config::default()).unwrap();
    let mut now: Millis = 0;
    c.bench_function("tick/idle", |b| {
        b.iter(|| {
            now += 50;
            sys.tick(black_box(now));
        })
    });
}

/// Ticks through whole exit transactions so every state handler and the
/// servo stepping are on the hot path.
fn bench_transaction_ticks(c: &mut Criterion) {
    let config = Config::default();
    let exit = config.pins.btn_exit;
    let mut sys = ParkingSystem::new(SimPlatform::manual(), config).unwrap();
    let mut now: Millis = 0;
    c.bench_function("tick/transaction", |b| {
        b.iter(|| {
            now += 50;
            // Press for two ticks out of every 200.
            let phase = (now / 50) % 200;
            if phase == 0 {
                sys.platform_mut().drive(exit, false);
            } else if phase == 2 {
                sys.platform_mut().release(exit);
            }
            sys.tick(black_box(now));
            sys.drain_events().count()
        })
    });
}

// ---------------------------------------------------------------------------
// Benchmark: allocation with fallback
// ---------------------------------------------------------------------------

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    for policy in [
        VipFallbackPolicy::FreightThenRegular,
        VipFallbackPolicy::RegularThenFreight,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{policy:?}")),
            &policy,
            |b, &policy| {
                b.iter(|| {
                    let mut alloc = CapacityAllocator::new(policy);
                    while alloc.allocate(black_box(VehicleClass::Vip)).is_some() {}
                    alloc.total_occupied()
                })
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: scheduler dispatch
// ---------------------------------------------------------------------------

fn bench_scheduler(c: &mut Criterion) {
    let mut sched: Scheduler<u64> = Scheduler::new();
    sched.every("tick", 50, 0, |n, _| *n += 1);
    sched.every("status", 30_000, 0, |n, _| *n += 2);
    sched.every("heartbeat", 5_000, 0, |n, _| *n += 3);
    let mut ctx = 0u64;
    let mut now: Millis = 0;
    c.bench_function("scheduler/tick", |b| {
        b.iter(|| {
            now += 50;
            sched.tick(&mut ctx, black_box(now))
        })
    });
}

criterion_group!(
    benches,
    bench_idle_tick,
    bench_transaction_ticks,
    bench_allocate,
    bench_scheduler
);
criterion_main!(benches);
