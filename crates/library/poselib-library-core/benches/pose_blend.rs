use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use poselib_library_core::{
    blend_pose, BlendMode, BlendParams, BonesToBlend, Bone, ObjectId, PoseSnapshot, RotationMode,
    Scene, Value,
};

/// A live rig and a detached reference with `n` bones, every third one posed.
fn rig_pair(n: usize) -> (Scene, ObjectId, ObjectId, Vec<String>) {
    let names: Vec<String> = (0..n).map(|i| format!("bone{i:04}")).collect();
    let live = names.iter().map(|name| {
        Bone::new(name.as_str())
            .with_euler(RotationMode::Xyz, [0.0; 3])
            .with_property("weight", Value::Float(0.0))
            .selected()
    });
    let reference = names.iter().enumerate().map(|(i, name)| {
        let bone = Bone::new(name.as_str())
            .with_euler(RotationMode::Xyz, [0.0; 3])
            .with_property("weight", Value::Float(0.0))
            .selected();
        if i % 3 == 0 {
            bone.with_location([0.0, 1.0, 0.0])
                .with_euler(RotationMode::Xyz, [0.0, 0.0, 0.5])
                .with_property("weight", Value::Float(1.0))
        } else {
            bone
        }
    });
    let mut scene = Scene::new();
    let rig = scene.add_armature_object("rig", live);
    scene.select_only(rig);
    let reference = scene.add_armature_object("reference", reference);
    scene.unlink_object(reference);
    (scene, rig, reference, names)
}

fn slider_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("slider_tick");
    for n in [64usize, 512] {
        let (mut scene, rig, reference, names) = rig_pair(n);
        let snapshot = PoseSnapshot::capture_object(&scene, rig);
        let all = BonesToBlend::candidates(&scene, rig, reference, &names);
        let dirty =
            BonesToBlend::compute(&scene, rig, reference, &snapshot, &names, BlendMode::Normal, 0.0);
        let params = BlendParams::new(0.5, BlendMode::Normal);

        group.bench_with_input(BenchmarkId::new("all_candidates", n), &n, |b, _| {
            b.iter(|| blend_pose(&mut scene, rig, reference, &snapshot, black_box(&all), &params))
        });
        group.bench_with_input(BenchmarkId::new("dirty_set", n), &n, |b, _| {
            b.iter(|| blend_pose(&mut scene, rig, reference, &snapshot, black_box(&dirty), &params))
        });
    }
    group.finish();
}

fn dirty_set(c: &mut Criterion) {
    let (scene, rig, reference, names) = rig_pair(512);
    let snapshot = PoseSnapshot::capture_object(&scene, rig);
    c.bench_function("bones_to_blend_512", |b| {
        b.iter(|| {
            BonesToBlend::compute(
                &scene,
                rig,
                reference,
                black_box(&snapshot),
                &names,
                BlendMode::Additive,
                0.0,
            )
        })
    });
}

criterion_group!(benches, slider_tick, dirty_set);
criterion_main!(benches);
