use anyhow::Result;
use scxpal::*;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries one JSON snapshot per line.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(agent = %version::agent_string(), platform = %platform::Platform::current(), "starting");

    let system = match system::SystemIdentity::gather().await {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, operation = "gather_system_identity", "system identity unavailable");
            None
        }
    };

    let cfg = app_config.clone();
    let collectors = Arc::new(
        tokio::task::spawn_blocking(move || worker::Collectors::from_config(&cfg, system))
            .await
            .map_err(|e| anyhow::anyhow!("collector setup: {}", e))?,
    );

    let mut shutdowns: Vec<oneshot::Sender<()>> = Vec::new();
    let mut handles = Vec::new();
    let mut shutdown_channel = || {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        rx
    };

    let disk_period = Duration::from_secs(app_config.disk.seconds_per_sample);
    for disks in [&collectors.logical_disks, &collectors.physical_disks].into_iter().flatten() {
        handles.push(worker::spawn_sampler(disk_period, disks.clone(), shutdown_channel()));
    }
    handles.push(worker::spawn_sampler(
        Duration::from_secs(app_config.memory.seconds_per_sample),
        collectors.memory.clone(),
        shutdown_channel(),
    ));
    handles.push(worker::spawn_sampler(
        Duration::from_secs(app_config.network.seconds_per_sample),
        collectors.network.clone(),
        shutdown_channel(),
    ));
    handles.push(worker::spawn_sampler(
        Duration::from_secs(app_config.cpu.seconds_per_sample),
        collectors.cpu.clone(),
        shutdown_channel(),
    ));
    if let Some(processes) = &collectors.processes {
        handles.push(worker::spawn_sampler(
            Duration::from_secs(app_config.processes.seconds_per_sample),
            processes.clone(),
            shutdown_channel(),
        ));
    }

    let (tx, mut rx) = broadcast::channel::<models::PalSnapshot>(app_config.collection.broadcast_capacity);
    handles.push(worker::spawn_collector(
        collectors.clone(),
        Duration::from_secs(app_config.collection.interval_secs),
        tx,
        shutdown_channel(),
    ));

    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(line) => {
                        let mut out = std::io::stdout().lock();
                        if let Err(e) = writeln!(out, "{}", line) {
                            tracing::warn!(error = %e, operation = "write_snapshot", "stdout write failed");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, operation = "serialize_snapshot", "snapshot serialization failed"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "snapshot printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    for tx in shutdowns {
        let _ = tx.send(());
    }
    for handle in handles {
        let _ = handle.await;
    }
    let _ = printer.await;
    Ok(())
}
