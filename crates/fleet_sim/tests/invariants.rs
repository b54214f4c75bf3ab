use fleet_sim::controller::{AttractRepel, Body, ForceBuffer};
use fleet_sim::tessellation::tessellate;
use fleet_sim::{AllocationPolicy, ItemId, Rect, Repulsion, SimConfig, VelocityPolicyKind, World};
use glam::DVec2;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn policy() -> impl Strategy<Value = AllocationPolicy> {
    prop_oneof![
        Just(AllocationPolicy::Restricted),
        Just(AllocationPolicy::Unrestricted)
    ]
}

fn velocity() -> impl Strategy<Value = VelocityPolicyKind> {
    prop_oneof![
        Just(VelocityPolicyKind::AttractRepel),
        Just(VelocityPolicyKind::AttractOnly)
    ]
}

/// Distinct lattice points inside an 800 x 800 arena.
fn sites() -> impl Strategy<Value = Vec<DVec2>> {
    prop::collection::btree_set((0u32..=800, 0u32..=800), 2..24).prop_map(|set| {
        set.into_iter()
            .map(|(x, y)| DVec2::new(x as f64, y as f64))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn fleet_invariants_hold_every_tick(
        seed in any::<u64>(),
        allocation in policy(),
        velocity_policy in velocity(),
        parallel_forces in any::<bool>(),
    ) {
        let config = SimConfig {
            seed: Some(seed),
            allocation,
            velocity_policy,
            parallel_forces,
            tick_budget: 300,
            ..SimConfig::default()
        };
        let mut world = World::new(config).unwrap();
        while !world.is_finished() {
            let before: Vec<DVec2> = world.agents().iter().map(|a| a.position).collect();
            let report = world.step();

            let mut referenced: BTreeMap<ItemId, usize> = BTreeMap::new();
            for (agent, start) in world.agents().iter().zip(&before) {
                prop_assert!(
                    agent.target_item().is_none() || agent.held_item().is_none(),
                    "{} targets and holds at once", agent.id
                );
                if let Some(item) = agent.target_item().or(agent.held_item()) {
                    *referenced.entry(item).or_default() += 1;
                }
                let moved = agent.position.distance(*start);
                prop_assert!(moved <= agent.speed_limit + 1e-9, "{} moved {}", agent.id, moved);
            }
            prop_assert!(referenced.values().all(|&n| n == 1));
            prop_assert_eq!(report.target_overlap, 0);

            let assigned: BTreeSet<ItemId> = report.assignments.iter().map(|a| a.item).collect();
            prop_assert_eq!(assigned.len(), report.assignments.len());
        }
    }

    #[test]
    fn parallel_fill_agrees_with_sequential(positions in sites()) {
        let bodies: Vec<Body> = positions
            .iter()
            .map(|&p| Body { position: p, goal: DVec2::new(400.0, 400.0), speed_limit: 4.0 })
            .collect();
        let policy = AttractRepel { repulsion: Repulsion::default() };
        let sequential = ForceBuffer::fill(&policy, &bodies);
        let parallel = ForceBuffer::fill_parallel(&policy, &bodies);
        for (s, p) in sequential.as_slice().iter().zip(parallel.as_slice()) {
            prop_assert!(s.distance(*p) <= 1e-9 * s.length().max(1.0));
        }
    }

    #[test]
    fn repulsion_reactions_cancel(positions in sites()) {
        // Agents at rest: only pairwise terms remain, and they sum to zero.
        let bodies: Vec<Body> = positions
            .iter()
            .map(|&p| Body { position: p, goal: p, speed_limit: 4.0 })
            .collect();
        let buffer = ForceBuffer::fill(&AttractRepel { repulsion: Repulsion::default() }, &bodies);
        let total = buffer.as_slice().iter().fold(DVec2::ZERO, |acc, f| acc + *f);
        let scale = buffer.as_slice().iter().map(|f| f.length()).fold(1.0, f64::max);
        prop_assert!(total.length() <= 1e-9 * scale * bodies.len() as f64);
    }

    #[test]
    fn cells_partition_the_arena(positions in sites()) {
        let arena = Rect::from_size(800.0, 800.0);
        let tessellation = tessellate(&positions, &arena);
        prop_assert_eq!(tessellation.cells().len(), positions.len());

        let mut covered = 0.0;
        for (site, cell) in positions.iter().zip(tessellation.cells()) {
            if let Some(cell) = cell {
                prop_assert!(cell.is_valid_cell());
                prop_assert!(cell.contains(*site), "site {} outside its cell", site);
                prop_assert!(cell.contains(cell.centroid()));
                covered += cell.area();
            }
        }
        prop_assert!(approx_eq(covered, arena.area(), 1e-6 * arena.area()));
    }
}
