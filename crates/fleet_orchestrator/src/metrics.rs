use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use fleet_sim::TickReport;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Prometheus collectors for the experiment runs. Every series carries the
/// allocation policy as a `policy` label so both experiments can share one
/// registry.
pub struct Metrics {
    pub registry: Registry,
    pub ticks_total: IntCounterVec,
    pub items_detected_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub pickups_total: IntCounterVec,
    pub deliveries_total: IntCounterVec,
    pub items_spawned_total: IntCounterVec,
    /// Agents currently holding a task.
    pub busy_agents: IntGaugeVec,
    pub idle_agents: IntGaugeVec,
    /// Agents without a cell this tick.
    pub cellless_agents: IntGaugeVec,
    pub target_overlap_total: IntCounterVec,
    pub agent_deliveries_total: IntCounterVec,
    pub agent_idle_ticks_total: IntCounterVec,
    pub agent_distance_total: CounterVec,
    /// Ticks from first detection to delivery.
    pub discovery_span_ticks: HistogramVec,
    pub tick_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("fleet_orchestrator".into()), None)?;

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry.register(Box::new(collector.clone()))?;
                collector
            }};
        }

        Ok(Self {
            ticks_total: reg!(IntCounterVec::new(
                Opts::new("ticks_total", "Simulation ticks completed"),
                &["policy"]
            )?),
            items_detected_total: reg!(IntCounterVec::new(
                Opts::new("items_detected_total", "Items seen by the scanner for the first time"),
                &["policy"]
            )?),
            assignments_total: reg!(IntCounterVec::new(
                Opts::new("assignments_total", "Items handed to an agent"),
                &["policy"]
            )?),
            pickups_total: reg!(IntCounterVec::new(
                Opts::new("pickups_total", "Items picked up"),
                &["policy"]
            )?),
            deliveries_total: reg!(IntCounterVec::new(
                Opts::new("deliveries_total", "Items delivered to the drop zone"),
                &["policy"]
            )?),
            items_spawned_total: reg!(IntCounterVec::new(
                Opts::new("items_spawned_total", "Replacement items spawned after deliveries"),
                &["policy"]
            )?),
            busy_agents: reg!(IntGaugeVec::new(
                Opts::new("busy_agents", "Agents with an assigned task"),
                &["policy"]
            )?),
            idle_agents: reg!(IntGaugeVec::new(
                Opts::new("idle_agents", "Agents without a task"),
                &["policy"]
            )?),
            cellless_agents: reg!(IntGaugeVec::new(
                Opts::new("cellless_agents", "Agents without a Voronoi cell this tick"),
                &["policy"]
            )?),
            target_overlap_total: reg!(IntCounterVec::new(
                Opts::new("target_overlap_total", "Extra agents sharing a target item, summed per tick"),
                &["policy"]
            )?),
            agent_deliveries_total: reg!(IntCounterVec::new(
                Opts::new("agent_deliveries_total", "Deliveries per agent"),
                &["policy", "agent_id"]
            )?),
            agent_idle_ticks_total: reg!(IntCounterVec::new(
                Opts::new("agent_idle_ticks_total", "Ticks each agent spent idle"),
                &["policy", "agent_id"]
            )?),
            agent_distance_total: reg!(CounterVec::new(
                Opts::new("agent_distance_total", "Distance travelled per agent"),
                &["policy", "agent_id"]
            )?),
            discovery_span_ticks: reg!(HistogramVec::new(
                HistogramOpts::new(
                    "discovery_span_ticks",
                    "Ticks between first detection and delivery"
                )
                .buckets(vec![50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0]),
                &["policy"]
            )?),
            tick_duration_seconds: reg!(HistogramVec::new(
                HistogramOpts::new("tick_duration_seconds", "Wall time spent in one simulation step")
                    .buckets(prometheus::exponential_buckets(1e-5, 4.0, 8)?),
                &["policy"]
            )?),
            registry,
        })
    }

    /// Folds one tick report into the collectors.
    pub fn observe(&self, policy: &str, report: &TickReport) {
        self.ticks_total.with_label_values(&[policy]).inc();
        self.items_detected_total
            .with_label_values(&[policy])
            .inc_by(report.detections.len() as u64);
        self.assignments_total
            .with_label_values(&[policy])
            .inc_by(report.assignments.len() as u64);
        self.pickups_total
            .with_label_values(&[policy])
            .inc_by(report.pickups.len() as u64);
        self.deliveries_total
            .with_label_values(&[policy])
            .inc_by(report.deliveries.len() as u64);
        self.items_spawned_total
            .with_label_values(&[policy])
            .inc_by(report.spawned.len() as u64);
        self.target_overlap_total
            .with_label_values(&[policy])
            .inc_by(report.target_overlap as u64);
        self.busy_agents
            .with_label_values(&[policy])
            .set(report.busy_agents as i64);
        self.idle_agents
            .with_label_values(&[policy])
            .set(report.agents.len().saturating_sub(report.busy_agents) as i64);
        self.cellless_agents
            .with_label_values(&[policy])
            .set(report.agents.len().saturating_sub(report.cells) as i64);

        for agent in &report.agents {
            let id = agent.id.to_string();
            let labels = [policy, id.as_str()];
            self.agent_distance_total
                .with_label_values(&labels)
                .inc_by(agent.displacement);
            if agent.lifecycle == fleet_sim::Lifecycle::Idle {
                self.agent_idle_ticks_total.with_label_values(&labels).inc();
            }
        }
        for delivery in &report.deliveries {
            let id = delivery.agent.to_string();
            self.agent_deliveries_total
                .with_label_values(&[policy, id.as_str()])
                .inc();
            if let Some(span) = delivery.discovery_span() {
                self.discovery_span_ticks
                    .with_label_values(&[policy])
                    .observe(span as f64);
            }
        }
    }

    pub fn observe_tick_duration(&self, policy: &str, seconds: f64) {
        self.tick_duration_seconds
            .with_label_values(&[policy])
            .observe(seconds);
    }

    /// Creates an `axum::Router` that serves the metrics on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    match render(&registry) {
                        Ok(body) => body.into_response(),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode metrics");
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        )
    }
}

/// Renders a registry in the Prometheus text format.
fn render(registry: &Registry) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_sim::{AgentId, AgentTick, Delivery, ItemId, Lifecycle};
    use std::future::IntoFuture;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn report() -> TickReport {
        TickReport {
            tick: 7,
            active_sites: 2,
            cells: 2,
            detections: vec![ItemId(3)],
            assignments: Vec::new(),
            pickups: Vec::new(),
            deliveries: vec![Delivery {
                agent: AgentId(1),
                item: ItemId(0),
                spawn_tick: 0,
                discovered_tick: Some(2),
                delivered_tick: 7,
            }],
            spawned: vec![ItemId(4)],
            agents: vec![
                AgentTick { id: AgentId(0), lifecycle: Lifecycle::Idle, displacement: 1.5, has_cell: true },
                AgentTick { id: AgentId(1), lifecycle: Lifecycle::Idle, displacement: 4.0, has_cell: true },
            ],
            busy_agents: 0,
            target_overlap: 0,
        }
    }

    #[test]
    fn observe_updates_labelled_series() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("restricted", &report());
        metrics.observe("restricted", &report());

        assert_eq!(metrics.ticks_total.with_label_values(&["restricted"]).get(), 2);
        assert_eq!(metrics.deliveries_total.with_label_values(&["restricted"]).get(), 2);
        assert_eq!(
            metrics
                .agent_deliveries_total
                .with_label_values(&["restricted", "agent-1"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .agent_idle_ticks_total
                .with_label_values(&["restricted", "agent-0"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .agent_distance_total
                .with_label_values(&["restricted", "agent-0"])
                .get(),
            3.0
        );
        assert_eq!(metrics.idle_agents.with_label_values(&["restricted"]).get(), 2);
        assert_eq!(metrics.cellless_agents.with_label_values(&["restricted"]).get(), 0);
        assert_eq!(metrics.ticks_total.with_label_values(&["unrestricted"]).get(), 0);
    }

    #[test]
    fn render_uses_the_namespace() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("both", &report());
        let text = render(&metrics.registry).unwrap();
        assert!(text.contains("fleet_orchestrator_deliveries_total{policy=\"both\"} 1"));
        assert!(text.contains("fleet_orchestrator_discovery_span_ticks_count"));
    }

    #[tokio::test]
    async fn router_serves_the_rendered_registry() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("restricted", &report());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(axum::serve(listener, metrics.router().into_make_service()).into_future());

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        server.abort();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(&render(&metrics.registry).unwrap()));
    }
}
