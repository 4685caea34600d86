//! Benchmarks for the CPU simulation step and frame rasterization.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swarmcast::prelude::*;

const CANVAS: Vec2 = Vec2::new(400.0, 400.0);

fn seeded_engine(gap: f32, collisions: bool) -> (Engine, ManualClock) {
    let mut settings = Settings {
        particle_gap: gap,
        ..Settings::default()
    };
    settings.collisions.enabled = collisions;
    let clock = ManualClock::new();
    let mut engine = Engine::new(settings, CANVAS, Box::new(clock.clone()));
    let image = SourceImage::checkerboard(200, 200, 10, Rgb::WHITE, Rgb::new(40, 120, 220))
        .expect("checkerboard");
    engine.seed(image).expect("seed");
    engine.pointer_event(PointerEvent::Enter { x: 200.0, y: 200.0 });
    engine.add_pulse(
        ForcePulse::new(PulseKind::Burst {
            origin: None,
            radius_pct: None,
        })
        .with_duration(1.0e9),
    );
    (engine, clock)
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");

    for gap in [8.0f32, 4.0, 2.0] {
        let (mut engine, clock) = seeded_engine(gap, false);
        group.bench_with_input(
            BenchmarkId::new("particles", engine.particles().len()),
            &gap,
            |b, _| {
                b.iter(|| {
                    clock.advance_ms(1000.0 / 60.0);
                    engine.step();
                    black_box(engine.particles().len())
                })
            },
        );
    }

    group.finish();
}

fn bench_collisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("collisions");

    for collisions in [false, true] {
        let (mut engine, clock) = seeded_engine(4.0, collisions);
        group.bench_with_input(
            BenchmarkId::new("enabled", collisions),
            &collisions,
            |b, _| {
                b.iter(|| {
                    clock.advance_ms(1000.0 / 60.0);
                    engine.step();
                })
            },
        );
    }

    group.finish();
}

fn bench_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw");

    for (name, glow) in [("plain", false), ("glow", true)] {
        let (mut engine, _clock) = seeded_engine(4.0, false);
        let mut settings = engine.settings().clone();
        settings.effects.glow = glow;
        engine.set_settings(settings).expect("settings");
        let effects = engine.effective_effects();
        let mut surface = RasterSurface::new(400, 400, CANVAS);
        group.bench_function(name, |b| {
            b.iter(|| {
                swarmcast::surface::begin_frame(&mut surface, Rgb::BLACK, &effects);
                engine.draw(&mut surface);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_collisions, bench_draw);
criterion_main!(benches);
