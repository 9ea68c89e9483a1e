//! Benchmarks the cascading forget sweep on a deep prerequisite chain.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use skilltree::core::types::SkillId;
use skilltree::tree::{Skill, SkillTree};

fn deep_chain(length: usize) -> (SkillTree, SkillId) {
    let mut tree = SkillTree::new();
    let mut ids: Vec<SkillId> = Vec::with_capacity(length);
    for i in 0..length {
        let id = tree.add_skill(Skill::new_single_shot(format!("skill-{i}")));
        if let Some(&prev) = ids.last() {
            tree.add_prerequisite(id, prev).unwrap();
        }
        ids.push(id);
    }
    tree.add_skill_points(length as i64);
    for &id in &ids {
        assert!(tree.learn_skill(id).unwrap());
    }
    (tree, ids[0])
}

fn sweep_benchmark(c: &mut Criterion) {
    let (tree, root) = deep_chain(128);
    c.bench_function("forget_root_cascade_128", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                tree.forget_skill_refund(root).unwrap();
                tree
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, sweep_benchmark);
criterion_main!(benches);
