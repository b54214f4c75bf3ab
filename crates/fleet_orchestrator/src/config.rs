use anyhow::Context;
use clap::{Parser, ValueEnum};
use fleet_sim::{AllocationPolicy, SimConfig, VelocityPolicyKind};
use glam::DVec2;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Which allocation policies to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Restricted,
    Unrestricted,
    /// Run the restricted experiment, then the unrestricted one, with the
    /// same seed.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VelocityArg {
    AttractRepel,
    AttractOnly,
}

impl From<VelocityArg> for VelocityPolicyKind {
    fn from(arg: VelocityArg) -> Self {
        match arg {
            VelocityArg::AttractRepel => VelocityPolicyKind::AttractRepel,
            VelocityArg::AttractOnly => VelocityPolicyKind::AttractOnly,
        }
    }
}

/// `fleet_orchestrator` - runs delivery-fleet allocation experiments.
///
/// Every simulation knob is optional. Unset knobs fall back to the JSON
/// file given with `--sim-config`, and then to the built-in reference
/// experiment.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// JSON file holding a (possibly partial) simulation config.
    #[arg(long, env = "FLEET_SIM_CONFIG")]
    pub sim_config: Option<PathBuf>,

    /// Allocation policy to run, or `both` to compare them.
    #[arg(long, value_enum, env = "FLEET_POLICY", default_value = "restricted")]
    pub policy: PolicyArg,

    /// Velocity policy for the delivery agents.
    #[arg(long, value_enum, env = "FLEET_VELOCITY_POLICY")]
    pub velocity: Option<VelocityArg>,

    /// RNG seed. Unset draws one from the OS.
    #[arg(long, env = "FLEET_SEED")]
    pub seed: Option<u64>,

    /// Number of ticks per experiment.
    #[arg(long, env = "FLEET_TICKS")]
    pub ticks: Option<u64>,

    /// Arena width.
    #[arg(long, env = "FLEET_ARENA_WIDTH")]
    pub arena_width: Option<f64>,

    /// Arena height.
    #[arg(long, env = "FLEET_ARENA_HEIGHT")]
    pub arena_height: Option<f64>,

    /// Number of delivery agents.
    #[arg(long, env = "FLEET_AGENTS")]
    pub agents: Option<usize>,

    /// Number of items kept in the arena.
    #[arg(long, env = "FLEET_ITEMS")]
    pub items: Option<usize>,

    /// Delivery agent speed in units per tick.
    #[arg(long, env = "FLEET_AGENT_SPEED")]
    pub agent_speed: Option<f64>,

    /// Scanner speed in units per tick.
    #[arg(long, env = "FLEET_SCANNER_SPEED")]
    pub scanner_speed: Option<f64>,

    /// Scanner detection radius.
    #[arg(long, env = "FLEET_SENSOR_RADIUS")]
    pub sensor_radius: Option<f64>,

    /// Gain of the agent-agent repulsion.
    #[arg(long, env = "FLEET_REPULSION_GAIN")]
    pub repulsion_gain: Option<f64>,

    /// Distance beyond which agents do not repel.
    #[arg(long, env = "FLEET_REPULSION_RADIUS")]
    pub repulsion_radius: Option<f64>,

    /// Drop zone anchor as `x,y`. Defaults to the arena's max corner.
    #[arg(long, env = "FLEET_DROP_ANCHOR", value_parser = parse_point)]
    pub drop_anchor: Option<DVec2>,

    /// Drop zone radius around the anchor.
    #[arg(long, env = "FLEET_DROP_RADIUS")]
    pub drop_radius: Option<f64>,

    /// Drop arc as `start,end` in degrees.
    #[arg(long, env = "FLEET_DROP_ARC", value_parser = parse_point)]
    pub drop_arc: Option<DVec2>,

    /// Fill the force buffer with rayon.
    #[arg(long, env = "FLEET_PARALLEL_FORCES")]
    pub parallel_forces: bool,

    /// Tick rate in Hz. 0 runs as fast as possible.
    #[arg(long, env = "FLEET_TICK_RATE_HZ", default_value_t = 0)]
    pub tick_rate_hz: u64,

    /// Log a progress line every this many ticks. 0 disables it.
    #[arg(long, env = "FLEET_LOG_EVERY", default_value_t = 600)]
    pub log_every: u64,

    /// Serve Prometheus metrics on this address while running.
    #[arg(long, env = "FLEET_METRICS_LISTEN_ADDR")]
    pub metrics_listen_addr: Option<SocketAddr>,

    /// Write world snapshots as JSON lines to this file.
    #[arg(long, env = "FLEET_FRAMES_PATH")]
    pub frames: Option<PathBuf>,

    /// Snapshot every this many ticks.
    #[arg(long, env = "FLEET_FRAME_EVERY", default_value_t = 1)]
    pub frame_every: u64,

    /// Write the run summaries here instead of stdout.
    #[arg(long, env = "FLEET_SUMMARY_PATH")]
    pub summary: Option<PathBuf>,
}

fn parse_point(s: &str) -> Result<DVec2, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok(DVec2::new(x, y))
}

impl Config {
    pub fn policies(&self) -> Vec<AllocationPolicy> {
        match self.policy {
            PolicyArg::Restricted => vec![AllocationPolicy::Restricted],
            PolicyArg::Unrestricted => vec![AllocationPolicy::Unrestricted],
            PolicyArg::Both => vec![AllocationPolicy::Restricted, AllocationPolicy::Unrestricted],
        }
    }

    /// Loads the base config from `--sim-config`, if any.
    pub fn base_sim_config(&self) -> anyhow::Result<SimConfig> {
        let Some(path) = &self.sim_config else {
            return Ok(SimConfig::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sim config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse sim config {}", path.display()))
    }

    /// Applies every flag that was given on top of `base` and validates the
    /// result for `policy`.
    pub fn sim_config(&self, mut base: SimConfig, policy: AllocationPolicy) -> anyhow::Result<SimConfig> {
        base.allocation = policy;
        if let Some(v) = self.velocity {
            base.velocity_policy = v.into();
        }
        if self.seed.is_some() {
            base.seed = self.seed;
        }
        if let Some(v) = self.ticks {
            base.tick_budget = v;
        }
        if let Some(v) = self.arena_width {
            base.arena_width = v;
        }
        if let Some(v) = self.arena_height {
            base.arena_height = v;
        }
        if let Some(v) = self.agents {
            base.agent_count = v;
        }
        if let Some(v) = self.items {
            base.item_count = v;
        }
        if let Some(v) = self.agent_speed {
            base.agent_speed = v;
        }
        if let Some(v) = self.scanner_speed {
            base.scanner.speed = v;
        }
        if let Some(v) = self.sensor_radius {
            base.scanner.sensor_radius = v;
        }
        if let Some(v) = self.repulsion_gain {
            base.repulsion.gain = v;
        }
        if let Some(v) = self.repulsion_radius {
            base.repulsion.radius = v;
        }
        if self.drop_anchor.is_some() {
            base.drop_zone.anchor = self.drop_anchor;
        }
        if let Some(v) = self.drop_radius {
            base.drop_zone.radius = v;
        }
        if let Some(arc) = self.drop_arc {
            base.drop_zone.arc_start_deg = arc.x;
            base.drop_zone.arc_end_deg = arc.y;
        }
        base.parallel_forces |= self.parallel_forces;
        base.validate()
            .with_context(|| format!("Invalid simulation config for {policy} policy"))?;
        Ok(base)
    }
}
