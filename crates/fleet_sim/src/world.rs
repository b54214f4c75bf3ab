use crate::agent::{Agent, AgentId, Item, ItemId, Task};
use crate::allocation::{self, Assignment, Candidate, SiteView};
use crate::config::{ConfigError, SimConfig};
use crate::controller::{clamp_speed, Body, DropZone, ForceBuffer, VelocityPolicy};
use crate::geometry::Rect;
use crate::report::{AgentTick, Delivery, Pickup, TickReport};
use crate::sensing::Scanner;
use crate::snapshot::WorldSnapshot;
use crate::stats::RunStats;
use crate::tessellation::tessellate;
use glam::DVec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, BTreeSet};

/// Consecutive cell-less ticks of an active site before it is worth a warning.
const CELLLESS_WARN_TICKS: u32 = 30;

/// The whole simulation state. Advanced one tick at a time by [`World::step`].
#[derive(Debug)]
pub struct World {
    config: SimConfig,
    arena: Rect,
    drop_zone: DropZone,
    policy: Box<dyn VelocityPolicy>,
    scanner: Scanner,
    /// Slot `i` holds `AgentId(i)`.
    agents: Vec<Agent>,
    /// Per-slot count of consecutive ticks an active site went without a cell.
    cellless: Vec<u32>,
    items: BTreeMap<ItemId, Item>,
    detected: RoaringBitmap,
    rng: StdRng,
    tick: u64,
    next_item: u32,
    items_spawned: u64,
}

fn random_point<R: Rng>(rng: &mut R, arena: &Rect) -> DVec2 {
    DVec2::new(
        rng.gen_range(arena.min.x..=arena.max.x),
        rng.gen_range(arena.min.y..=arena.max.y),
    )
}

impl World {
    /// Builds a world with agents and items scattered uniformly over the
    /// arena.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let arena = config.arena();
        let agents: Vec<DVec2> = (0..config.agent_count)
            .map(|_| random_point(&mut rng, &arena))
            .collect();
        let items: Vec<DVec2> = (0..config.item_count)
            .map(|_| random_point(&mut rng, &arena))
            .collect();
        Ok(Self::assemble(config, rng, &agents, &items))
    }

    /// Builds a world with explicit starting positions. Agent and item
    /// counts are taken from the slices.
    pub fn with_layout(
        mut config: SimConfig,
        agents: &[DVec2],
        items: &[DVec2],
    ) -> Result<Self, ConfigError> {
        config.agent_count = agents.len();
        config.item_count = items.len();
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self::assemble(config, rng, agents, items))
    }

    fn assemble(config: SimConfig, rng: StdRng, agents: &[DVec2], items: &[DVec2]) -> Self {
        let arena = config.arena();
        let scanner = Scanner::new(
            config.scanner.start,
            Scanner::lane_sweep(&arena, config.scanner.sweep_pitch, config.scanner.sweep_margin),
            config.scanner.speed,
            config.scanner.sensor_radius,
        );
        let agents = agents
            .iter()
            .enumerate()
            .map(|(i, &p)| Agent::new(AgentId(i as u32), p, config.agent_speed, config.agent_size))
            .collect::<Vec<_>>();
        let mut world = Self {
            cellless: vec![0; agents.len()],
            arena,
            drop_zone: config.drop_zone(),
            policy: config.velocity_policy.build(config.repulsion),
            scanner,
            agents,
            items: BTreeMap::new(),
            detected: RoaringBitmap::new(),
            rng,
            tick: 0,
            next_item: 0,
            items_spawned: 0,
            config,
        };
        for &p in items {
            world.insert_item(p, 0);
        }
        tracing::info!(
            agents = world.agents.len(),
            items = world.items.len(),
            policy = %world.config.allocation,
            velocity = world.policy.name(),
            "World initialised"
        );
        world
    }

    /// Runs one tick and reports what happened.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;

        self.scanner.advance();

        let active_sites = self.rebuild_cells();

        let detections = self.detect();
        let assignments = self.allocate(&detections);

        self.select_goals();
        self.accumulate_forces();
        let displacements = self.integrate();

        let (pickups, deliveries) = self.resolve_transitions();

        let spawned: Vec<ItemId> = deliveries
            .iter()
            .map(|_| self.spawn_replacement())
            .collect();

        let agents: Vec<AgentTick> = self
            .agents
            .iter()
            .zip(&displacements)
            .map(|(agent, &displacement)| AgentTick {
                id: agent.id,
                lifecycle: agent.lifecycle(),
                displacement,
                has_cell: agent.cell.is_some(),
            })
            .collect();
        let busy_agents = self.agents.iter().filter(|a| a.assigned_task()).count();
        let cells = self.agents.iter().filter(|a| a.cell.is_some()).count();

        tracing::trace!(
            tick,
            active_sites,
            cells,
            busy_agents,
            "Tick complete"
        );

        TickReport {
            tick,
            active_sites,
            cells,
            detections,
            assignments,
            pickups,
            deliveries,
            spawned,
            agents,
            busy_agents,
            target_overlap: self.target_overlap(),
        }
    }

    /// Steps until the tick budget is spent, feeding every report to
    /// `on_tick`.
    pub fn run<F: FnMut(&TickReport)>(&mut self, mut on_tick: F) -> RunStats {
        let mut stats = RunStats::for_world(self);
        while !self.is_finished() {
            let report = self.step();
            stats.record(&report);
            on_tick(&report);
        }
        stats
    }

    /// Recomputes every agent's cell. Returns the number of active sites.
    fn rebuild_cells(&mut self) -> usize {
        let policy = self.config.allocation;
        for agent in &mut self.agents {
            agent.cell = None;
        }
        let slots: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| policy.is_site(agent))
            .map(|(slot, _)| slot)
            .collect();
        if slots.len() < 2 {
            tracing::trace!(tick = self.tick, sites = slots.len(), "Too few sites to tessellate");
            self.cellless.fill(0);
            return slots.len();
        }

        let sites: Vec<DVec2> = slots.iter().map(|&s| self.agents[s].position).collect();
        let tessellation = tessellate(&sites, &self.arena);
        tracing::trace!(
            tick = self.tick,
            sites = slots.len(),
            cells = tessellation.owned(),
            "Tessellated"
        );
        let mut streaks = vec![0; self.agents.len()];
        for (&slot, cell) in slots.iter().zip(tessellation.into_cells()) {
            if cell.is_none() {
                streaks[slot] = self.cellless[slot] + 1;
                tracing::debug!(
                    tick = self.tick,
                    agent = %self.agents[slot].id,
                    "Active agent has no cell this tick"
                );
                if streaks[slot] == CELLLESS_WARN_TICKS {
                    tracing::warn!(
                        tick = self.tick,
                        agent = %self.agents[slot].id,
                        ticks = CELLLESS_WARN_TICKS,
                        "Active agent keeps losing its cell"
                    );
                }
            }
            self.agents[slot].cell = cell;
        }
        self.cellless = streaks;
        slots.len()
    }

    /// Marks unpicked items inside the sensor radius as detected. Returns
    /// the ids detected for the first time this tick.
    fn detect(&mut self) -> Vec<ItemId> {
        let mut fresh = Vec::new();
        for item in self.items.values_mut() {
            if item.picked || item.discovered() {
                continue;
            }
            if self.scanner.detects(item.position) {
                item.discovered_tick = Some(self.tick);
                self.detected.insert(item.id.0);
                tracing::debug!(tick = self.tick, item = %item.id, "Item detected");
                fresh.push(item.id);
            }
        }
        fresh
    }

    fn allocate(&mut self, fresh: &[ItemId]) -> Vec<Assignment> {
        let referenced: BTreeSet<ItemId> = self
            .agents
            .iter()
            .filter_map(|a| a.target_item().or(a.held_item()))
            .collect();
        let retry = self.config.allocation.retries_pending();

        let candidates: Vec<Candidate> = self
            .items
            .values()
            .filter(|item| !item.picked && !referenced.contains(&item.id))
            .filter(|item| {
                fresh.contains(&item.id)
                    || (retry && item.discovered() && self.scanner.detects(item.position))
            })
            .map(|item| Candidate {
                id: item.id,
                position: item.position,
            })
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let assignments = {
            let sites: Vec<SiteView<'_>> = self.agents.iter().map(SiteView::of).collect();
            allocation::allocate(&sites, &candidates)
        };

        let tick = self.tick;
        for assignment in &assignments {
            let Some(position) = self.items.get(&assignment.item).map(|i| i.position) else {
                continue;
            };
            if let Some(agent) = self.agent_mut(assignment.agent) {
                if agent.assign(assignment.item, position) {
                    tracing::debug!(
                        tick,
                        agent = %assignment.agent,
                        item = %assignment.item,
                        "Item assigned"
                    );
                }
            }
        }
        assignments
    }

    fn select_goals(&mut self) {
        for agent in &mut self.agents {
            match agent.task() {
                Task::Idle => {
                    if let Some(cell) = &agent.cell {
                        agent.goal = cell.centroid();
                    }
                }
                Task::Assigned { item } => {
                    if let Some(item) = self.items.get(&item) {
                        agent.goal = item.position;
                    }
                }
                Task::Delivering {
                    drop_point: Some(point),
                    ..
                } => agent.goal = point,
                Task::Delivering {
                    item,
                    drop_point: None,
                } => {
                    let point = self.drop_zone.sample(&mut self.rng);
                    agent.set_drop_point(point);
                    agent.goal = point;
                    tracing::debug!(
                        tick = self.tick,
                        agent = %agent.id,
                        item = %item,
                        x = point.x,
                        y = point.y,
                        "Delivering to drop point"
                    );
                }
            }
        }
    }

    /// Zeroes every accumulator, then fills them from a frozen snapshot.
    fn accumulate_forces(&mut self) {
        for agent in &mut self.agents {
            agent.force = DVec2::ZERO;
        }
        let bodies: Vec<Body> = self
            .agents
            .iter()
            .map(|a| Body {
                position: a.position,
                goal: a.goal,
                speed_limit: a.speed_limit,
            })
            .collect();
        let buffer = if self.config.parallel_forces {
            ForceBuffer::fill_parallel(self.policy.as_ref(), &bodies)
        } else {
            ForceBuffer::fill(self.policy.as_ref(), &bodies)
        };
        for (slot, agent) in self.agents.iter_mut().enumerate() {
            agent.force += buffer.get(slot);
        }
    }

    /// Clamps each accumulated force to the speed limit and moves by it.
    /// Returns the per-agent displacement.
    fn integrate(&mut self) -> Vec<f64> {
        self.agents
            .iter_mut()
            .map(|agent| {
                let step = clamp_speed(agent.force, agent.speed_limit);
                agent.force = step;
                agent.position += step;
                step.length()
            })
            .collect()
    }

    fn resolve_transitions(&mut self) -> (Vec<Pickup>, Vec<Delivery>) {
        let tick = self.tick;
        let mut pickups = Vec::new();
        let mut deliveries = Vec::new();

        for agent in &mut self.agents {
            if let Some(drop_point) = agent.drop_point() {
                if agent.position.distance(drop_point) < agent.speed_limit {
                    if let Some(item_id) = agent.deliver() {
                        let retired = self.items.remove(&item_id);
                        let (spawn_tick, discovered_tick) = retired
                            .map(|i| (i.spawn_tick, i.discovered_tick))
                            .unwrap_or((tick, None));
                        tracing::debug!(tick, agent = %agent.id, item = %item_id, "Item delivered");
                        deliveries.push(Delivery {
                            agent: agent.id,
                            item: item_id,
                            spawn_tick,
                            discovered_tick,
                            delivered_tick: tick,
                        });
                    }
                }
            }

            if let Some(item_id) = agent.target_item() {
                match self.items.get_mut(&item_id) {
                    Some(item) => {
                        if agent.position.distance(item.position) < agent.size + item.size {
                            item.picked = true;
                            agent.pick_up();
                            tracing::debug!(tick, agent = %agent.id, item = %item_id, "Item picked up");
                            pickups.push(Pickup {
                                agent: agent.id,
                                item: item_id,
                            });
                        }
                    }
                    None => {
                        tracing::warn!(tick, agent = %agent.id, item = %item_id, "Target item vanished; releasing agent");
                        agent.abandon();
                    }
                }
            }
        }
        (pickups, deliveries)
    }

    fn insert_item(&mut self, position: DVec2, tick: u64) -> ItemId {
        let id = ItemId(self.next_item);
        self.next_item += 1;
        self.items_spawned += 1;
        self.items
            .insert(id, Item::new(id, position, self.config.item_size, tick));
        id
    }

    fn spawn_replacement(&mut self) -> ItemId {
        let position = random_point(&mut self.rng, &self.arena);
        let id = self.insert_item(position, self.tick);
        tracing::debug!(tick = self.tick, item = %id, x = position.x, y = position.y, "Replacement item spawned");
        id
    }

    fn target_overlap(&self) -> usize {
        let mut counts: BTreeMap<ItemId, usize> = BTreeMap::new();
        for item in self.agents.iter().filter_map(Agent::target_item) {
            *counts.entry(item).or_default() += 1;
        }
        counts.values().map(|&c| c.saturating_sub(1)).sum()
    }

    fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id.0 as usize).filter(|a| a.id == id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.0 as usize).filter(|a| a.id == id)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Live (undelivered) items in id order.
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.values()
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items_spawned(&self) -> u64 {
        self.items_spawned
    }

    /// Ids of every item ever detected, delivered ones included.
    pub fn detected(&self) -> &RoaringBitmap {
        &self.detected
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Swaps in a different scanner, e.g. a stationary one for a scenario.
    pub fn set_scanner(&mut self, scanner: Scanner) {
        self.scanner = scanner;
    }

    pub fn arena(&self) -> &Rect {
        &self.arena
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_finished(&self) -> bool {
        self.tick >= self.config.tick_budget
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self)
    }
}
