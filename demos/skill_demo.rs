//! Demo: a small combat tree - learn skills, forget one, watch the cascade

use skilltree::tree::{Skill, SkillTree, TreeEvent};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("skilltree=debug")
        .init();

    let mut tree = SkillTree::new();

    let footwork = tree.add_skill(Skill::new_single_shot("Footwork"));

    let mut swordplay = Skill::new_leveled("Swordplay", 3);
    swordplay.cost_per_level = vec![1, 2, 3];
    swordplay.required_attribute_per_level = vec![0, 2, 4];
    let swordplay = tree.add_skill(swordplay);
    tree.add_prerequisite(swordplay, footwork).unwrap();

    let mut riposte = Skill::new_single_shot("Riposte");
    riposte.cost_per_level = vec![2];
    riposte.required_investment_total = 3;
    let riposte = tree.add_skill(riposte);
    tree.add_prerequisite(riposte, swordplay).unwrap();

    let names: std::collections::HashMap<_, _> = tree
        .skills()
        .map(|skill| (skill.id(), skill.name.clone()))
        .collect();
    tree.subscribe(move |event| match event {
        TreeEvent::SkillUnlocked { skill, level } => {
            println!("  >> unlocked {} (level {})", names[skill], level);
        }
        TreeEvent::SkillLocked { skill, level } => {
            println!("  << locked {} (back to level {})", names[skill], level);
        }
        TreeEvent::PointsChanged => {}
    });

    println!("=== Granting 10 skill points and 4 attribute points ===");
    tree.add_skill_points(10);
    tree.add_attribute_points(4);

    println!("\n=== Learning up the chain ===");
    for (label, id) in [
        ("Footwork", footwork),
        ("Swordplay 1", swordplay),
        ("Swordplay 2", swordplay),
        ("Swordplay 3", swordplay),
        ("Riposte", riposte),
    ] {
        let learned = tree.learn_skill(id).expect("skill belongs to the tree");
        println!(
            "learn {:<12} -> {}  (points left: {}, spent: {})",
            label,
            learned,
            tree.skill_points(),
            tree.spent_skill_points()
        );
    }

    println!("\n=== Forgetting Footwork: everything above it unravels ===");
    tree.forget_skill_refund(footwork)
        .expect("skill belongs to the tree");
    println!(
        "points back: {}, spent: {}, unlocked skills: {}",
        tree.skill_points(),
        tree.spent_skill_points(),
        tree.unlocked_skills().count()
    );

    println!("\n=== Affordances for the UI ===");
    for (label, id) in [
        ("Footwork", footwork),
        ("Swordplay", swordplay),
        ("Riposte", riposte),
    ] {
        println!(
            "{:<12} available: {}",
            label,
            tree.can_unlock_with_cost(id).expect("skill belongs to the tree")
        );
    }

    println!("\n=== Snapshot ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&tree).expect("tree state serializes")
    );
}
