use criterion::{black_box, criterion_group, criterion_main, Criterion};

use asm_core::{
    AsmDocument, AsmRuntime, ManualClock, ParamId, RuntimeConfig, SimulatedClips, Value,
};
use asm_test_fixtures::machines;

fn locomotion() -> (AsmRuntime<ManualClock>, SimulatedClips) {
    let json = machines::json("locomotion").expect("fixture");
    let doc = AsmDocument::from_json(&json).expect("document");
    let mut clips = SimulatedClips::new();
    for (name, duration_ms) in machines::clips("locomotion")
        .expect("clips")
        .unwrap_or_default()
    {
        clips.add_clip(&name, duration_ms);
    }
    let rt = AsmRuntime::from_document(doc, RuntimeConfig::default(), ManualClock::new())
        .expect("runtime");
    (rt, clips)
}

pub fn steady_tick(c: &mut Criterion) {
    let (mut rt, mut clips) = locomotion();
    c.bench_function("tick_no_transition", |b| {
        b.iter(|| {
            clips.advance(16.0);
            rt.clock_mut().advance_ms(16.0);
            black_box(rt.advance(&mut clips));
        })
    });
}

pub fn oscillating_tick(c: &mut Criterion) {
    let (mut rt, mut clips) = locomotion();
    let speed = ParamId::new("speed");
    let mut frame = 0u32;
    c.bench_function("tick_with_param_edits", |b| {
        b.iter(|| {
            frame = frame.wrapping_add(1);
            let v = if frame % 20 < 10 { 0.0_f32 } else { 0.8_f32 };
            rt.set_parameter(&speed, Value::Float(v)).expect("known parameter");
            clips.advance(16.0);
            rt.clock_mut().advance_ms(16.0);
            black_box(rt.advance(&mut clips));
        })
    });
}

criterion_group!(benches, steady_tick, oscillating_tick);
criterion_main!(benches);
