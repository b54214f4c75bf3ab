//! Experiment metrics folded from tick reports.

use crate::agent::{AgentId, Lifecycle};
use crate::report::TickReport;
use crate::world::World;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub deliveries: u64,
    pub idle_ticks: u64,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct RunStats {
    ticks: u64,
    deliveries: u64,
    items_spawned: u64,
    per_agent: BTreeMap<AgentId, AgentStats>,
    discovery_spans: Vec<u64>,
    lifecycle_spans: Vec<u64>,
    busy_sum: u64,
    busy_now: usize,
    overlap_sum: u64,
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<u64>() as f64 / values.len() as f64
    }
}

impl RunStats {
    pub fn new(agents: impl IntoIterator<Item = AgentId>, initial_items: u64) -> Self {
        Self {
            ticks: 0,
            deliveries: 0,
            items_spawned: initial_items,
            per_agent: agents
                .into_iter()
                .map(|id| (id, AgentStats::default()))
                .collect(),
            discovery_spans: Vec::new(),
            lifecycle_spans: Vec::new(),
            busy_sum: 0,
            busy_now: 0,
            overlap_sum: 0,
        }
    }

    pub fn for_world(world: &World) -> Self {
        Self::new(world.agents().iter().map(|a| a.id), world.items_spawned())
    }

    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.items_spawned += report.spawned.len() as u64;
        self.busy_now = report.busy_agents;
        self.busy_sum += report.busy_agents as u64;
        self.overlap_sum += report.target_overlap as u64;

        for tick in &report.agents {
            let entry = self.per_agent.entry(tick.id).or_default();
            entry.distance += tick.displacement;
            if tick.lifecycle == Lifecycle::Idle {
                entry.idle_ticks += 1;
            }
        }
        for delivery in &report.deliveries {
            self.deliveries += 1;
            self.per_agent.entry(delivery.agent).or_default().deliveries += 1;
            self.lifecycle_spans.push(delivery.lifecycle_span());
            if let Some(span) = delivery.discovery_span() {
                self.discovery_spans.push(span);
            }
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentStats> {
        self.per_agent.get(&id)
    }

    pub fn per_agent(&self) -> &BTreeMap<AgentId, AgentStats> {
        &self.per_agent
    }

    pub fn busy_now(&self) -> usize {
        self.busy_now
    }

    /// Population standard deviation of deliveries per agent.
    pub fn task_spread(&self) -> f64 {
        let n = self.per_agent.len();
        if n < 2 {
            return 0.0;
        }
        let counts: Vec<f64> = self.per_agent.values().map(|s| s.deliveries as f64).collect();
        let mean = counts.iter().sum::<f64>() / n as f64;
        let var = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;
        var.sqrt()
    }

    /// Idle agent-ticks over all agent-ticks.
    pub fn idle_ratio(&self) -> f64 {
        let total = self.ticks * self.per_agent.len() as u64;
        if total == 0 {
            return 0.0;
        }
        let idle: u64 = self.per_agent.values().map(|s| s.idle_ticks).sum();
        idle as f64 / total as f64
    }

    /// Deliveries as a percentage of items ever spawned.
    pub fn delivery_efficiency(&self) -> f64 {
        if self.items_spawned == 0 {
            0.0
        } else {
            self.deliveries as f64 / self.items_spawned as f64 * 100.0
        }
    }

    pub fn mean_distance(&self) -> f64 {
        if self.per_agent.is_empty() {
            return 0.0;
        }
        self.per_agent.values().map(|s| s.distance).sum::<f64>() / self.per_agent.len() as f64
    }

    pub fn mean_discovery_span(&self) -> f64 {
        mean(&self.discovery_spans)
    }

    pub fn mean_lifecycle_span(&self) -> f64 {
        mean(&self.lifecycle_spans)
    }

    pub fn mean_busy(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.busy_sum as f64 / self.ticks as f64
        }
    }

    pub fn overlap(&self) -> u64 {
        self.overlap_sum
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            deliveries: self.deliveries,
            items_spawned: self.items_spawned,
            task_spread: self.task_spread(),
            idle_ratio: self.idle_ratio(),
            delivery_efficiency_pct: self.delivery_efficiency(),
            mean_distance_per_agent: self.mean_distance(),
            mean_discovery_to_delivery_ticks: self.mean_discovery_span(),
            mean_spawn_to_delivery_ticks: self.mean_lifecycle_span(),
            mean_busy_agents: self.mean_busy(),
            target_overlap: self.overlap_sum,
            per_agent: self.per_agent.clone(),
        }
    }
}

/// Serializable end-of-run (or mid-run) view of [`RunStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub deliveries: u64,
    pub items_spawned: u64,
    pub task_spread: f64,
    pub idle_ratio: f64,
    pub delivery_efficiency_pct: f64,
    pub mean_distance_per_agent: f64,
    pub mean_discovery_to_delivery_ticks: f64,
    pub mean_spawn_to_delivery_ticks: f64,
    pub mean_busy_agents: f64,
    pub target_overlap: u64,
    pub per_agent: BTreeMap<AgentId, AgentStats>,
}
