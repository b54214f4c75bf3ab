use crate::agent::{AgentId, ItemId, Lifecycle};
use crate::allocation::Assignment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pickup {
    pub agent: AgentId,
    pub item: ItemId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub agent: AgentId,
    pub item: ItemId,
    pub spawn_tick: u64,
    pub discovered_tick: Option<u64>,
    pub delivered_tick: u64,
}

impl Delivery {
    /// Ticks from first detection to delivery.
    pub fn discovery_span(&self) -> Option<u64> {
        self.discovered_tick
            .map(|t| self.delivered_tick.saturating_sub(t))
    }

    /// Ticks from spawn to delivery.
    pub fn lifecycle_span(&self) -> u64 {
        self.delivered_tick.saturating_sub(self.spawn_tick)
    }
}

/// Per-agent outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentTick {
    pub id: AgentId,
    /// State after this tick's transitions.
    pub lifecycle: Lifecycle,
    /// Distance moved this tick.
    pub displacement: f64,
    pub has_cell: bool,
}

/// Everything that happened in one tick. Write-only output of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub active_sites: usize,
    pub cells: usize,
    pub detections: Vec<ItemId>,
    pub assignments: Vec<Assignment>,
    pub pickups: Vec<Pickup>,
    pub deliveries: Vec<Delivery>,
    pub spawned: Vec<ItemId>,
    pub agents: Vec<AgentTick>,
    pub busy_agents: usize,
    /// Items targeted by more than one agent, counted once per extra agent.
    pub target_overlap: usize,
}
