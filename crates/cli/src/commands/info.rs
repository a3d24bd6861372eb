//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DaqBlueprint, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    nodes: Vec<NodeInfo>,
    correlator: CorrelatorInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct NodeInfo {
    id: String,
    name: String,
    trigger: bool,
    window_width: u32,
    offset: i32,
}

#[derive(Serialize)]
struct CorrelatorInfo {
    prune_threshold_ms: u64,
    max_event_bytes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accepted_types: Vec<u16>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &DaqBlueprint, args: &InfoArgs) -> ConfigInfo {
    let nodes = blueprint
        .nodes
        .iter()
        .map(|n| NodeInfo {
            id: format!("{:#06x}", n.id),
            name: n.name.clone(),
            trigger: n.trigger,
            window_width: n.window_width,
            offset: n.offset.unwrap_or(0),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        nodes,
        correlator: CorrelatorInfo {
            prune_threshold_ms: blueprint.correlator.prune_threshold_ms,
            max_event_bytes: blueprint.output.max_event_bytes,
            accepted_types: blueprint.output.accepted_types.clone(),
        },
        source: args.source.then(|| blueprint.source.clone()),
        sinks,
    }
}

fn print_config_info(blueprint: &DaqBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Event Builder Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🛰  Nodes ({})", blueprint.nodes.len());
    for (i, node) in blueprint.nodes.iter().enumerate() {
        let prefix = if i == blueprint.nodes.len() - 1 { "└─" } else { "├─" };
        let role = if node.trigger { " [trigger]" } else { "" };
        println!(
            "   {} {:#06x} {}{} (window ±{}, offset {})",
            prefix,
            node.id,
            node.name,
            role,
            node.window_width,
            node.offset.unwrap_or(0)
        );
    }

    println!("\n⚙️  Correlator");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   ├─ Prune threshold: {} ms",
        blueprint.correlator.prune_threshold_ms
    );
    println!("   ├─ Max event size: {} bytes", blueprint.output.max_event_bytes);
    if blueprint.output.accepted_types.is_empty() {
        println!("   └─ Accepted types: all");
    } else {
        println!("   └─ Accepted types: {:?}", blueprint.output.accepted_types);
    }

    if args.source {
        let source = &blueprint.source;
        println!("\n🧪 Mock Source");
        println!("   ├─ Rate: {} buffers/s", source.rate_hz);
        println!("   ├─ Events per buffer: {}", source.events_per_buffer);
        println!("   ├─ Tick step: {} (jitter ±{})", source.tick_step, source.jitter_ticks);
        println!("   ├─ Byte order: {:?}", source.byte_order);
        println!("   ├─ Scaler every: {}", source.scaler_every);
        println!("   └─ Buffers per run: {}", source.buffers_per_run);
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
