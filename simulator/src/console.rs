use std::path::Path;

use tokio::{
  fs::File,
  io::{AsyncWriteExt, BufWriter},
};

use engine::{
  metrics::{MetricKind, MetricsSnapshot},
  presentation::OutgoingUpdate,
};

pub fn format_metrics(snapshot: &MetricsSnapshot) -> String {
  MetricKind::ALL
    .iter()
    .map(|kind| format!("{kind}: {}", snapshot.get(*kind)))
    .collect::<Vec<_>>()
    .join(" | ")
}

async fn open_positions(path: &Path) -> Option<BufWriter<File>> {
  match File::create(path).await {
    Ok(file) => Some(BufWriter::new(file)),
    Err(e) => {
      tracing::error!("Unable to create {}: {e}", path.display());
      None
    }
  }
}

/// Prints log lines and metric changes to stdout, and appends every position
/// update to `positions_path` as a JSON line. Runs until the simulation drops
/// its side of the channel, then returns the last metrics seen.
pub async fn render_updates(
  mut update_rx: async_broadcast::Receiver<OutgoingUpdate>,
  positions_path: Option<&Path>,
) -> MetricsSnapshot {
  let mut positions = match positions_path {
    Some(path) => open_positions(path).await,
    None => None,
  };
  let mut metrics = MetricsSnapshot::default();

  loop {
    let update = match update_rx.recv().await {
      Ok(update) => update,
      Err(async_broadcast::RecvError::Overflowed(skipped)) => {
        tracing::debug!("Console fell behind, skipped {skipped} updates");
        continue;
      }
      Err(async_broadcast::RecvError::Closed) => break,
    };

    match &update {
      OutgoingUpdate::Log(line) => println!("{line}"),
      OutgoingUpdate::Metric { kind, value } => {
        if metrics.get(*kind) != *value {
          metrics.set(*kind, *value);
          println!("[{}]", format_metrics(&metrics));
        }
      }
      OutgoingUpdate::Position { .. } => {
        let Some(writer) = positions.as_mut() else {
          continue;
        };

        let line = match update.to_json() {
          Ok(line) => line,
          Err(e) => {
            tracing::error!("Unable to serialise update: {e}");
            continue;
          }
        };
        let written = async {
          writer.write_all(line.as_bytes()).await?;
          writer.write_all(b"\n").await
        };
        if let Err(e) = written.await {
          tracing::error!("Unable to write position: {e}");
          positions = None;
        }
      }
    }
  }

  if let Some(mut writer) = positions {
    if let Err(e) = writer.flush().await {
      tracing::error!("Unable to flush positions: {e}");
    }
  }

  metrics
}
