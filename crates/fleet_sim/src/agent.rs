use crate::geometry::Polygon;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Coarse lifecycle state, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Idle,
    Assigned,
    Delivering,
}

/// What an agent is currently doing. Carrying the item id inside the
/// variant keeps "targeting" and "holding" mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Task {
    Idle,
    /// Heading to pick up `item`.
    Assigned { item: ItemId },
    /// Holding `item`. The drop point is sampled on the first controller
    /// pass after pickup.
    Delivering { item: ItemId, drop_point: Option<DVec2> },
}

/// A delivery vehicle.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub position: DVec2,
    /// Per-tick force accumulator. Zeroed before every controller pass.
    pub force: DVec2,
    pub speed_limit: f64,
    pub size: f64,
    pub goal: DVec2,
    pub cell: Option<Polygon>,
    task: Task,
}

impl Agent {
    pub fn new(id: AgentId, position: DVec2, speed_limit: f64, size: f64) -> Self {
        Self {
            id,
            position,
            force: DVec2::ZERO,
            speed_limit,
            size,
            goal: position,
            cell: None,
            task: Task::Idle,
        }
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.task {
            Task::Idle => Lifecycle::Idle,
            Task::Assigned { .. } => Lifecycle::Assigned,
            Task::Delivering { .. } => Lifecycle::Delivering,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.task, Task::Idle)
    }

    /// True while targeting or delivering an item.
    pub fn assigned_task(&self) -> bool {
        !self.is_idle()
    }

    pub fn target_item(&self) -> Option<ItemId> {
        match self.task {
            Task::Assigned { item } => Some(item),
            _ => None,
        }
    }

    pub fn held_item(&self) -> Option<ItemId> {
        match self.task {
            Task::Delivering { item, .. } => Some(item),
            _ => None,
        }
    }

    pub fn drop_point(&self) -> Option<DVec2> {
        match self.task {
            Task::Delivering { drop_point, .. } => drop_point,
            _ => None,
        }
    }

    /// Idle -> Assigned. Returns false, leaving the agent untouched, if the
    /// agent is busy.
    pub fn assign(&mut self, item: ItemId, item_position: DVec2) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.task = Task::Assigned { item };
        self.goal = item_position;
        true
    }

    /// Assigned -> Delivering. Returns the picked item.
    pub fn pick_up(&mut self) -> Option<ItemId> {
        let item = self.target_item()?;
        self.task = Task::Delivering {
            item,
            drop_point: None,
        };
        Some(item)
    }

    /// Fixes the drop point for the held item if none is set yet.
    pub fn set_drop_point(&mut self, point: DVec2) {
        if let Task::Delivering { item, drop_point: None } = self.task {
            self.task = Task::Delivering {
                item,
                drop_point: Some(point),
            };
        }
    }

    /// Delivering -> Idle. Returns the delivered item.
    pub fn deliver(&mut self) -> Option<ItemId> {
        let item = self.held_item()?;
        self.task = Task::Idle;
        Some(item)
    }

    /// Drops a target that no longer exists.
    pub fn abandon(&mut self) -> Option<ItemId> {
        let item = self.target_item()?;
        self.task = Task::Idle;
        Some(item)
    }
}

/// A delivery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub position: DVec2,
    pub size: f64,
    pub picked: bool,
    pub spawn_tick: u64,
    pub discovered_tick: Option<u64>,
}

impl Item {
    pub fn new(id: ItemId, position: DVec2, size: f64, spawn_tick: u64) -> Self {
        Self {
            id,
            position,
            size,
            picked: false,
            spawn_tick,
            discovered_tick: None,
        }
    }

    pub fn discovered(&self) -> bool {
        self.discovered_tick.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new(AgentId(0), DVec2::ZERO, 4.0, 10.0)
    }

    #[test]
    fn lifecycle_round_trip() {
        let mut a = agent();
        assert!(a.assign(ItemId(3), DVec2::new(5.0, 5.0)));
        assert_eq!(a.lifecycle(), Lifecycle::Assigned);
        assert_eq!(a.goal, DVec2::new(5.0, 5.0));
        assert!(a.assigned_task());

        assert_eq!(a.pick_up(), Some(ItemId(3)));
        assert_eq!(a.target_item(), None);
        assert_eq!(a.held_item(), Some(ItemId(3)));
        assert_eq!(a.drop_point(), None);

        a.set_drop_point(DVec2::new(780.0, 780.0));
        a.set_drop_point(DVec2::new(1.0, 1.0));
        assert_eq!(a.drop_point(), Some(DVec2::new(780.0, 780.0)));

        assert_eq!(a.deliver(), Some(ItemId(3)));
        assert!(a.is_idle());
        assert!(!a.assigned_task());
    }

    #[test]
    fn busy_agent_rejects_second_assignment() {
        let mut a = agent();
        assert!(a.assign(ItemId(1), DVec2::ONE));
        assert!(!a.assign(ItemId(2), DVec2::ZERO));
        assert_eq!(a.target_item(), Some(ItemId(1)));
        assert_eq!(a.goal, DVec2::ONE);
    }

    #[test]
    fn idle_agent_cannot_pick_up_or_deliver() {
        let mut a = agent();
        assert_eq!(a.pick_up(), None);
        assert_eq!(a.deliver(), None);
        assert!(a.is_idle());
    }
}
