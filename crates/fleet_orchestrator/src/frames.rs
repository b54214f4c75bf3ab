use anyhow::Context;
use fleet_sim::WorldSnapshot;
use serde::Serialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

/// One line of the frame stream.
#[derive(Debug, Serialize)]
struct Frame<'a> {
    run_id: Uuid,
    policy: &'a str,
    #[serde(flatten)]
    snapshot: &'a WorldSnapshot,
}

/// Appends world snapshots to a JSON-lines file for offline rendering.
pub struct FrameSink {
    out: BufWriter<File>,
    every: u64,
    written: u64,
}

impl FrameSink {
    pub async fn create(path: &Path, every: u64) -> anyhow::Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("Failed to create frame file {}", path.display()))?;
        tracing::info!(path = %path.display(), every, "Writing frames");
        Ok(Self {
            out: BufWriter::new(file),
            every: every.max(1),
            written: 0,
        })
    }

    pub fn wants(&self, tick: u64) -> bool {
        tick % self.every == 0
    }

    pub async fn write(&mut self, run_id: Uuid, policy: &str, snapshot: &WorldSnapshot) -> anyhow::Result<()> {
        let frame = Frame {
            run_id,
            policy,
            snapshot,
        };
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    pub async fn finish(mut self) -> anyhow::Result<u64> {
        self.out.flush().await?;
        Ok(self.written)
    }
}
