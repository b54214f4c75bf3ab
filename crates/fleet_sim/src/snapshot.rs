//! Read-only views of the world for renderers and frame sinks.

use crate::agent::{AgentId, ItemId, Lifecycle};
use crate::controller::DropZone;
use crate::geometry::Rect;
use crate::world::World;
use glam::DVec2;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerSnapshot {
    pub position: DVec2,
    pub sensor_radius: f64,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: DVec2,
    pub goal: DVec2,
    pub lifecycle: Lifecycle,
    pub target_item: Option<ItemId>,
    pub held_item: Option<ItemId>,
    pub cell: Option<Vec<DVec2>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub position: DVec2,
    pub picked: bool,
    pub detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub arena: Rect,
    pub drop_zone: DropZone,
    pub scanner: ScannerSnapshot,
    pub agents: Vec<AgentSnapshot>,
    pub items: Vec<ItemSnapshot>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let scanner = world.scanner();
        Self {
            tick: world.tick(),
            arena: *world.arena(),
            drop_zone: *world.drop_zone(),
            scanner: ScannerSnapshot {
                position: scanner.position(),
                sensor_radius: scanner.sensor_radius(),
                cursor: scanner.cursor(),
            },
            agents: world
                .agents()
                .iter()
                .map(|a| AgentSnapshot {
                    id: a.id,
                    position: a.position,
                    goal: a.goal,
                    lifecycle: a.lifecycle(),
                    target_item: a.target_item(),
                    held_item: a.held_item(),
                    cell: a.cell.as_ref().map(|c| c.vertices().to_vec()),
                })
                .collect(),
            items: world
                .items()
                .map(|i| ItemSnapshot {
                    id: i.id,
                    position: i.position,
                    picked: i.picked,
                    detected: i.discovered(),
                })
                .collect(),
        }
    }
}
