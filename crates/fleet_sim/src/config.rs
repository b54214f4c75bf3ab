use crate::allocation::AllocationPolicy;
use crate::controller::{DropZone, Repulsion, VelocityPolicyKind};
use crate::geometry::Rect;
use crate::sensing::{Scanner, MAX_SWEEP_WAYPOINTS};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("arena must have positive width and height, got {width} x {height}")]
    Arena { width: f64, height: f64 },
    #[error("at least one agent is required")]
    NoAgents,
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("sweep margin {margin} leaves no room inside an arena of height {height}")]
    Margin { margin: f64, height: f64 },
    #[error("sweep pitch {pitch} yields about {waypoints} waypoints, more than the {max} allowed")]
    SweepTooDense { pitch: f64, waypoints: f64, max: usize },
    #[error("drop arc is empty or inverted: {start}..{end} degrees")]
    DropArc { start: f64, end: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub start: DVec2,
    pub speed: f64,
    pub sensor_radius: f64,
    /// Distance between sweep lanes and between waypoints along a lane.
    pub sweep_pitch: f64,
    /// Inset of the first waypoint of each lane from the arena edge.
    pub sweep_margin: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            start: DVec2::ZERO,
            speed: 6.0,
            sensor_radius: 100.0,
            sweep_pitch: 200.0,
            sweep_margin: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropZoneConfig {
    /// Defaults to the arena's max corner.
    pub anchor: Option<DVec2>,
    pub radius: f64,
    pub arc_start_deg: f64,
    pub arc_end_deg: f64,
}

impl Default for DropZoneConfig {
    fn default() -> Self {
        Self {
            anchor: None,
            radius: 40.0,
            arc_start_deg: 180.0,
            arc_end_deg: 270.0,
        }
    }
}

/// Everything a run needs. `Default` reproduces the reference experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    pub agent_count: usize,
    pub item_count: usize,
    pub agent_speed: f64,
    pub agent_size: f64,
    pub item_size: f64,
    pub scanner: ScannerConfig,
    pub repulsion: Repulsion,
    pub drop_zone: DropZoneConfig,
    pub allocation: AllocationPolicy,
    pub velocity_policy: VelocityPolicyKind,
    pub tick_budget: u64,
    pub seed: Option<u64>,
    pub parallel_forces: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 800.0,
            agent_count: 12,
            item_count: 8,
            agent_speed: 4.0,
            agent_size: 10.0,
            item_size: 8.0,
            scanner: ScannerConfig::default(),
            repulsion: Repulsion::default(),
            drop_zone: DropZoneConfig::default(),
            allocation: AllocationPolicy::default(),
            velocity_policy: VelocityPolicyKind::default(),
            tick_budget: 3600,
            seed: None,
            parallel_forces: false,
        }
    }
}

impl SimConfig {
    pub fn arena(&self) -> Rect {
        Rect::from_size(self.arena_width, self.arena_height)
    }

    pub fn drop_zone(&self) -> DropZone {
        DropZone {
            anchor: self.drop_zone.anchor.unwrap_or_else(|| self.arena().max),
            radius: self.drop_zone.radius,
            arc_start_deg: self.drop_zone.arc_start_deg,
            arc_end_deg: self.drop_zone.arc_end_deg,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.arena_width > 0.0 && self.arena_height > 0.0) {
            return Err(ConfigError::Arena {
                width: self.arena_width,
                height: self.arena_height,
            });
        }
        if self.agent_count == 0 {
            return Err(ConfigError::NoAgents);
        }
        for (name, value) in [
            ("agent_speed", self.agent_speed),
            ("agent_size", self.agent_size),
            ("item_size", self.item_size),
            ("scanner.speed", self.scanner.speed),
            ("scanner.sensor_radius", self.scanner.sensor_radius),
            ("scanner.sweep_pitch", self.scanner.sweep_pitch),
            ("repulsion.radius", self.repulsion.radius),
            ("repulsion.epsilon", self.repulsion.epsilon),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.repulsion.gain < 0.0 || !self.repulsion.gain.is_finite() {
            return Err(ConfigError::NonPositive {
                name: "repulsion.gain",
                value: self.repulsion.gain,
            });
        }
        let margin = self.scanner.sweep_margin;
        if margin < 0.0 || margin >= self.arena_height {
            return Err(ConfigError::Margin {
                margin,
                height: self.arena_height,
            });
        }
        let pitch = self.scanner.sweep_pitch;
        let waypoints = Scanner::lane_sweep_len(&self.arena(), pitch, margin);
        if waypoints > MAX_SWEEP_WAYPOINTS as f64 {
            return Err(ConfigError::SweepTooDense {
                pitch,
                waypoints,
                max: MAX_SWEEP_WAYPOINTS,
            });
        }
        let (start, end) = (self.drop_zone.arc_start_deg, self.drop_zone.arc_end_deg);
        if !(end > start) {
            return Err(ConfigError::DropArc { start, end });
        }
        if self.drop_zone.radius < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "drop_zone.radius",
                value: self.drop_zone.radius,
            });
        }
        Ok(())
    }
}
