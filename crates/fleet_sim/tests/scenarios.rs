use fleet_sim::{
    AgentId, AllocationPolicy, Assignment, ItemId, Lifecycle, Scanner, SimConfig, World,
};
use glam::DVec2;

fn config(seed: u64) -> SimConfig {
    SimConfig {
        seed: Some(seed),
        ..SimConfig::default()
    }
}

/// A scanner parked at `at` that never moves.
fn parked_scanner(at: DVec2, radius: f64) -> Scanner {
    Scanner::new(at, Vec::new(), 6.0, radius)
}

#[test]
fn item_is_assigned_only_to_the_owner_of_its_cell() {
    let agents = [DVec2::new(50.0, 50.0), DVec2::new(700.0, 700.0)];
    let items = [DVec2::new(1.0, 1.0)];
    let mut world = World::with_layout(config(1), &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::ZERO, 100.0));

    let report = world.step();

    assert_eq!(report.detections, vec![ItemId(0)]);
    assert_eq!(
        report.assignments,
        vec![Assignment {
            agent: AgentId(0),
            item: ItemId(0)
        }]
    );
    let a = world.agent(AgentId(0)).unwrap();
    let b = world.agent(AgentId(1)).unwrap();
    assert_eq!(a.target_item(), Some(ItemId(0)));
    assert_eq!(b.target_item(), None);
    assert_eq!(b.held_item(), None);
    assert!(a.assigned_task());
    assert!(!b.assigned_task());
}

#[test]
fn agent_in_reach_picks_up_its_target() {
    let agents = [DVec2::new(400.0, 400.0), DVec2::new(100.0, 100.0)];
    let items = [DVec2::new(410.0, 400.0)];
    let mut world = World::with_layout(config(2), &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::new(400.0, 400.0), 100.0));

    let report = world.step();

    assert_eq!(report.pickups.len(), 1);
    assert_eq!(report.pickups[0].agent, AgentId(0));
    let agent = world.agent(AgentId(0)).unwrap();
    assert_eq!(agent.held_item(), Some(ItemId(0)));
    assert_eq!(agent.target_item(), None);
    assert_eq!(agent.lifecycle(), Lifecycle::Delivering);
    assert!(world.item(ItemId(0)).unwrap().picked);
}

#[test]
fn delivery_frees_the_agent_and_spawns_exactly_one_item() {
    let agents = [DVec2::new(770.0, 770.0), DVec2::new(100.0, 100.0)];
    let items = [DVec2::new(775.0, 770.0)];
    let mut world = World::with_layout(config(3), &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::new(775.0, 770.0), 100.0));

    let first = world.step();
    assert_eq!(first.pickups.len(), 1);

    let delivered = (0..100)
        .map(|_| world.step())
        .find(|report| !report.deliveries.is_empty())
        .expect("agent reaches the drop zone");

    assert_eq!(delivered.deliveries.len(), 1);
    assert_eq!(delivered.deliveries[0].item, ItemId(0));
    assert_eq!(delivered.spawned.len(), 1);
    assert_eq!(world.items_spawned(), 2);
    assert!(world.item(ItemId(0)).is_none());
    assert!(world.item(delivered.spawned[0]).is_some());

    let agent = world.agent(AgentId(0)).unwrap();
    assert_eq!(agent.held_item(), None);
    assert!(!agent.assigned_task());
    assert_eq!(agent.drop_point(), None);
    // The detection set keeps delivered ids.
    assert!(world.detected().contains(0));
}

#[test]
fn restricted_policy_leaves_busy_agents_out_of_the_partition() {
    let agents = [
        DVec2::new(50.0, 50.0),
        DVec2::new(700.0, 700.0),
        DVec2::new(700.0, 100.0),
    ];
    let items = [DVec2::new(1.0, 1.0)];
    let mut world = World::with_layout(config(4), &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::ZERO, 100.0));

    assert_eq!(world.step().active_sites, 3);
    let report = world.step();
    assert_eq!(report.active_sites, 2);
    assert!(world.agent(AgentId(0)).unwrap().cell.is_none());
}

#[test]
fn unrestricted_policy_keeps_every_agent_as_a_site() {
    let cfg = SimConfig {
        allocation: AllocationPolicy::Unrestricted,
        ..config(4)
    };
    let agents = [
        DVec2::new(50.0, 50.0),
        DVec2::new(700.0, 700.0),
        DVec2::new(700.0, 100.0),
    ];
    let items = [DVec2::new(1.0, 1.0)];
    let mut world = World::with_layout(cfg, &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::ZERO, 100.0));

    world.step();
    let report = world.step();
    assert_eq!(report.active_sites, 3);
    assert!(world.agent(AgentId(0)).unwrap().cell.is_some());
}

#[test]
fn unrestricted_policy_retries_pending_items_in_range() {
    let cfg = SimConfig {
        allocation: AllocationPolicy::Unrestricted,
        ..config(5)
    };
    // Agent 0 is busy with item 0 when item 1 is first seen, and item 1
    // lies in agent 0's cell, so it stays pending until agent 0 is free.
    let agents = [DVec2::new(60.0, 60.0), DVec2::new(750.0, 750.0)];
    let items = [DVec2::new(40.0, 40.0), DVec2::new(30.0, 30.0)];
    let mut world = World::with_layout(cfg, &agents, &items).unwrap();
    world.set_scanner(parked_scanner(DVec2::ZERO, 100.0));

    let first = world.step();
    assert_eq!(first.detections, vec![ItemId(0), ItemId(1)]);
    assert_eq!(first.assignments.len(), 1);

    let retried = (0..1000)
        .map(|_| world.step())
        .flat_map(|report| report.assignments)
        .any(|a| a.item == ItemId(1));
    assert!(retried, "pending item is offered again once an agent is idle");
}

#[test]
fn config_loads_from_partial_json() {
    let cfg: SimConfig =
        serde_json::from_str(r#"{ "allocation": "unrestricted", "seed": 11, "agent_count": 4 }"#)
            .unwrap();
    assert_eq!(cfg.allocation, AllocationPolicy::Unrestricted);
    assert_eq!(cfg.agent_count, 4);
    assert_eq!(cfg.arena_width, 800.0);
    assert_eq!(cfg.tick_budget, 3600);
    assert!(cfg.validate().is_ok());
}

#[test]
fn snapshot_mirrors_world_state() {
    let mut world = World::new(SimConfig {
        tick_budget: 10,
        ..config(6)
    })
    .unwrap();
    world.step();
    let snapshot = world.snapshot();
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.agents.len(), 12);
    assert_eq!(snapshot.items.len(), world.items().count());
    assert_eq!(snapshot.scanner.position, world.scanner().position());
    assert!(snapshot.agents.iter().all(|a| a.cell.as_ref().map_or(true, |c| c.len() >= 3)));

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["agents"][0]["id"], 0);
    assert_eq!(
        json["agents"][0]["lifecycle"],
        serde_json::to_value(world.agents()[0].lifecycle()).unwrap()
    );
    assert!(matches!(
        json["agents"][0]["lifecycle"].as_str(),
        Some("idle" | "assigned" | "delivering")
    ));
}

#[test]
fn full_run_summary_is_consistent() {
    let mut world = World::new(SimConfig {
        tick_budget: 600,
        ..config(7)
    })
    .unwrap();
    let mut deliveries = 0;
    let stats = world.run(|report| deliveries += report.deliveries.len() as u64);
    let summary = stats.summary();

    assert_eq!(summary.ticks, 600);
    assert_eq!(summary.deliveries, deliveries);
    assert_eq!(summary.items_spawned, world.items_spawned());
    assert_eq!(
        summary.per_agent.values().map(|a| a.deliveries).sum::<u64>(),
        deliveries
    );
    assert!((0.0..=1.0).contains(&summary.idle_ratio));
    assert!(summary.mean_distance_per_agent <= 600.0 * 4.0 + 1e-6);
}
