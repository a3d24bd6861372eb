//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::DaqBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::load_blueprint;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config)?;

    info!(
        nodes = blueprint.nodes.len(),
        sinks = blueprint.sinks.len(),
        prune_threshold_ms = blueprint.correlator.prune_threshold_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_events: (args.max_events > 0).then_some(args.max_events),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    let pipeline = Pipeline::new(pipeline_config);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                events = stats.events_forwarded,
                duration_secs = stats.duration.as_secs_f64(),
                rate = format!("{:.2}", stats.event_rate()),
                "Pipeline completed successfully"
            );

            if args.json {
                let json = serde_json::to_string_pretty(&stats.report())
                    .context("Failed to serialize statistics")?;
                println!("{json}");
            } else {
                stats.print_summary();
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("daq-evb finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &DaqBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Nodes ({}):", blueprint.nodes.len());
    for node in &blueprint.nodes {
        let role = if node.trigger { "trigger" } else { "member" };
        println!(
            "  - {:#06x} {} ({}, window ±{}, offset {})",
            node.id,
            node.name,
            role,
            node.window_width,
            node.offset.unwrap_or(0)
        );
    }

    println!("\nCorrelator:");
    println!("  Prune threshold: {} ms", blueprint.correlator.prune_threshold_ms);
    println!("  Max event size: {} bytes", blueprint.output.max_event_bytes);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
