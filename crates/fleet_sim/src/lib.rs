//! Discrete-time simulation of a delivery fleet that splits an arena into
//! Voronoi cells, picks up items spotted by a sweeping scanner, and carries
//! them to a drop zone.
//!
//! The crate is synchronous and deterministic for a given seed. One call to
//! [`World::step`] runs a full tick:
//!
//! 1. the scanner advances along its lane sweep,
//! 2. active agents are tessellated into cells clipped to the arena,
//! 3. newly detected items are matched to the idle agent whose cell holds them,
//! 4. every agent picks a goal, forces are accumulated from a frozen snapshot,
//!    clamped to the speed limit and integrated,
//! 5. pickups and deliveries are resolved and replacement items spawned.
//!
//! ```no_run
//! use fleet_sim::{SimConfig, World};
//!
//! let config = SimConfig { seed: Some(7), ..SimConfig::default() };
//! let mut world = World::new(config)?;
//! let stats = world.run(|_| {});
//! println!("{} deliveries", stats.deliveries());
//! # Ok::<(), fleet_sim::ConfigError>(())
//! ```

pub mod agent;
pub mod allocation;
pub mod config;
pub mod controller;
pub mod geometry;
pub mod report;
pub mod sensing;
pub mod snapshot;
pub mod stats;
pub mod tessellation;
pub mod world;

pub use agent::{Agent, AgentId, Item, ItemId, Lifecycle, Task};
pub use allocation::{AllocationPolicy, Assignment};
pub use config::{ConfigError, DropZoneConfig, ScannerConfig, SimConfig};
pub use controller::{DropZone, Repulsion, VelocityPolicy, VelocityPolicyKind};
pub use geometry::{Polygon, Rect};
pub use report::{AgentTick, Delivery, Pickup, TickReport};
pub use sensing::Scanner;
pub use snapshot::WorldSnapshot;
pub use stats::{AgentStats, RunStats, RunSummary};
pub use world::World;
