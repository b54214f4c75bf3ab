use crate::frames::FrameSink;
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use fleet_sim::{AllocationPolicy, RunStats, RunSummary, SimConfig, World};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Unthrottled runs yield to the runtime this often so shutdown and the
/// metrics server stay responsive.
const YIELD_EVERY_TICKS: u64 = 256;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub tick_rate_hz: u64,
    pub log_every: u64,
}

/// What one experiment produced.
#[derive(Debug, Serialize)]
pub struct ExperimentSummary {
    pub run_id: Uuid,
    pub policy: AllocationPolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stopped early by a shutdown signal.
    pub interrupted: bool,
    pub frames_written: u64,
    pub config: SimConfig,
    #[serde(flatten)]
    pub summary: RunSummary,
}

pub async fn run_experiment(
    run_id: Uuid,
    sim: SimConfig,
    options: RunOptions,
    metrics: &Metrics,
    frames: &mut Option<FrameSink>,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<ExperimentSummary> {
    let policy = sim.allocation;
    let label = policy.to_string();
    let started_at = Utc::now();
    let mut world = World::new(sim.clone())?;
    let mut stats = RunStats::for_world(&world);
    let mut frames_written = 0;

    let mut interval = (options.tick_rate_hz > 0).then(|| {
        let mut interval =
            tokio::time::interval(Duration::from_secs_f64(1.0 / options.tick_rate_hz as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    tracing::info!(%run_id, policy = %label, ticks = sim.tick_budget, "Experiment starting");

    // A dropped sender counts as shutdown: nothing can signal the run anymore.
    let mut interrupted = false;
    while !world.is_finished() {
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            interrupted = true;
            break;
        }
        match interval.as_mut() {
            Some(interval) => {
                tokio::select! {
                    _ = interval.tick() => {},
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            interrupted = true;
                            break;
                        }
                        continue;
                    }
                }
            }
            None if world.tick() % YIELD_EVERY_TICKS == 0 => tokio::task::yield_now().await,
            None => {}
        }

        let step_started = Instant::now();
        let report = world.step();
        metrics.observe_tick_duration(&label, step_started.elapsed().as_secs_f64());
        metrics.observe(&label, &report);
        stats.record(&report);

        if let Some(sink) = frames.as_mut() {
            if sink.wants(report.tick) {
                sink.write(run_id, &label, &world.snapshot()).await?;
                frames_written += 1;
            }
        }

        if options.log_every > 0 && report.tick % options.log_every == 0 {
            tracing::info!(
                %run_id,
                policy = %label,
                tick = report.tick,
                deliveries = stats.deliveries(),
                busy_agents = stats.busy_now(),
                idle_ratio = stats.idle_ratio(),
                "Progress"
            );
        }
    }

    let summary = stats.summary();
    if interrupted {
        tracing::warn!(%run_id, policy = %label, tick = world.tick(), "Experiment interrupted");
    }
    tracing::info!(
        %run_id,
        policy = %label,
        ticks = summary.ticks,
        deliveries = summary.deliveries,
        efficiency_pct = summary.delivery_efficiency_pct,
        task_spread = summary.task_spread,
        "Experiment finished"
    );

    Ok(ExperimentSummary {
        run_id,
        policy,
        started_at,
        finished_at: Utc::now(),
        interrupted,
        frames_written,
        config: sim,
        summary,
    })
}
