use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridbeat::engine::evaluator::evaluate_step;
use gridbeat::engine::rng::{EntropyRng, GateRng};
use gridbeat::pattern::{PatternLength, Project, Step, Track};

/// A busy snapshot: every step active, mixed probability and ratchets
fn busy_project(pattern_length: PatternLength, track_count: usize) -> Project {
    let mut project = Project::with_default_setup();
    project.pattern_length = pattern_length;

    let template = project.tracks[0].clone();
    project.tracks = (0..track_count)
        .map(|i| {
            let mut track: Track = template.resized(pattern_length.steps());
            for (s, step) in track.steps.iter_mut().enumerate() {
                *step = Step {
                    active: true,
                    probability: if s % 3 == 0 { 1.0 } else { 0.6 },
                    ratchet: (s % 4) as u8 + 1,
                    microtiming: if i % 2 == 0 { 0.01 } else { -0.01 },
                    ..Step::inactive()
                };
            }
            track
        })
        .collect();

    project
}

/// Benchmark one tick's evaluation (the whole per-tick hot path)
fn bench_evaluate_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_step");
    let mut rng: Box<dyn GateRng> = Box::new(EntropyRng::seeded(1));

    for track_count in [1usize, 8, 32] {
        let project = busy_project(PatternLength::SixtyFour, track_count);

        group.bench_with_input(
            BenchmarkId::from_parameter(track_count),
            &project,
            |b, project| {
                let mut step = 0usize;
                b.iter(|| {
                    let triggered = evaluate_step(project, step, 0.0, rng.as_mut());
                    step = (step + 1) % project.pattern_length.steps();
                    black_box(triggered)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate_step);
criterion_main!(benches);
