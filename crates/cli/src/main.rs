use std::io::Read as _;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::{info, warn};

use flotilla_cluster::KubeCluster;
use flotilla_core::{ApplyOptions, Event, PrunePolicy, ResourceManifest, Tally, WaitCondition, WaitOptions};
use flotilla_engine::{Applier, RunHandle};
use flotilla_inventory::ConfigMapStore;

#[derive(Parser, Debug)]
#[command(name = "flotillactl", version, about = "Declarative multi-resource apply for Kubernetes")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PruneMode {
    Delete,
    Orphan,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a manifest set, prune what the inventory no longer declares
    Apply {
        /// Manifest files or directories; "-" reads stdin
        #[arg(short = 'f', long = "filename", required = true)]
        filenames: Vec<String>,
        /// Inventory name owning this resource set
        #[arg(long = "inventory")]
        inventory: String,
        /// Namespace holding the inventory record
        #[arg(long = "inventory-namespace", default_value = "default")]
        inventory_namespace: String,
        /// What to do with no-longer-declared objects
        #[arg(long = "prune-policy", value_enum, default_value_t = PruneMode::Delete)]
        prune_policy: PruneMode,
        /// Abort remaining phases after the first failed phase
        #[arg(long = "stop-on-error", action = ArgAction::SetTrue)]
        stop_on_error: bool,
        /// Upper bound on in-flight requests within a phase
        #[arg(long = "max-parallel", default_value_t = 8)]
        max_parallel: usize,
        /// Apply deadline in seconds
        #[arg(long = "timeout")]
        timeout: Option<u64>,
        /// Wait for applied objects to converge
        #[arg(long = "wait", action = ArgAction::SetTrue)]
        wait: bool,
        /// Wait deadline in seconds
        #[arg(long = "wait-timeout", default_value_t = 300)]
        wait_timeout: u64,
        /// Condition type that must report True (implies --wait)
        #[arg(long = "condition")]
        condition: Option<String>,
    },
    /// Show the phased execution order without touching the cluster
    Plan {
        /// Manifest files or directories; "-" reads stdin
        #[arg(short = 'f', long = "filename", required = true)]
        filenames: Vec<String>,
    },
    /// Delete everything an inventory owns, then the record itself
    Destroy {
        /// Inventory name to tear down
        #[arg(long = "inventory")]
        inventory: String,
        /// Namespace holding the inventory record
        #[arg(long = "inventory-namespace", default_value = "default")]
        inventory_namespace: String,
        /// Upper bound on in-flight requests
        #[arg(long = "max-parallel", default_value_t = 8)]
        max_parallel: usize,
        /// Prune deadline in seconds
        #[arg(long = "timeout")]
        timeout: Option<u64>,
    },
}

fn init_tracing() {
    let env = std::env::var("FLOTILLA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FLOTILLA_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid FLOTILLA_METRICS_ADDR; expected host:port");
        }
    }
}

/// Read every YAML document from the given sources. Directories are read one
/// level deep; "-" reads stdin.
fn load_manifests(filenames: &[String]) -> Result<Vec<ResourceManifest>> {
    let mut manifests = Vec::new();
    for name in filenames {
        if name == "-" {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            parse_documents(&text, "<stdin>", &mut manifests)?;
            continue;
        }
        let meta = std::fs::metadata(name).with_context(|| format!("stat {}", name))?;
        if meta.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(name)
                .with_context(|| format!("reading directory {}", name))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml") | Some("json"))
                })
                .collect();
            entries.sort();
            for path in entries {
                let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                parse_documents(&text, &path.display().to_string(), &mut manifests)?;
            }
        } else {
            let text = std::fs::read_to_string(name).with_context(|| format!("reading {}", name))?;
            parse_documents(&text, name, &mut manifests)?;
        }
    }
    Ok(manifests)
}

fn parse_documents(text: &str, source: &str, out: &mut Vec<ResourceManifest>) -> Result<()> {
    for doc in serde_yaml::Deserializer::from_str(text) {
        let value = serde_json::Value::deserialize(doc).with_context(|| format!("parsing {}", source))?;
        if value.is_null() {
            continue;
        }
        let manifest = ResourceManifest::from_json(value)
            .with_context(|| format!("invalid manifest in {}", source))?;
        out.push(manifest);
    }
    Ok(())
}

fn print_event(output: Output, ev: &Event) {
    match output {
        Output::Human => {
            let id = ev.id.as_ref().map(|i| i.to_string()).unwrap_or_default();
            match &ev.error {
                Some(err) => println!("{:<14} {:<44} {} ({})", format!("{:?}", ev.kind), id, ev.message, err),
                None => println!("{:<14} {:<44} {}", format!("{:?}", ev.kind), id, ev.message),
            }
        }
        Output::Json => {
            if let Ok(line) = serde_json::to_string(ev) {
                println!("{}", line);
            }
        }
    }
}

/// Drain the run to completion, cancelling on Ctrl-C. Returns the tally and
/// whether the process should exit nonzero.
async fn drive(mut handle: RunHandle, output: Output) -> Result<Tally> {
    let cancel = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            cancel.cancel();
        }
    });
    while let Some(ev) = handle.next_event().await {
        print_event(output, &ev);
    }
    handle.wait().await.map_err(Into::into)
}

fn build_wait(wait: bool, wait_timeout: u64, condition: Option<String>) -> Option<WaitOptions> {
    if !wait && condition.is_none() {
        return None;
    }
    Some(WaitOptions {
        timeout: Duration::from_secs(wait_timeout),
        condition: match condition {
            Some(c) => WaitCondition::ConditionTrue(c),
            None => WaitCondition::Exists,
        },
        ..Default::default()
    })
}

async fn make_applier(inventory_namespace: &str) -> Result<Applier> {
    let client = kube::Client::try_default().await.context("connecting to cluster")?;
    let cluster = std::sync::Arc::new(KubeCluster::new(client.clone()));
    let store = std::sync::Arc::new(ConfigMapStore::new(client, inventory_namespace));
    Ok(Applier::new(cluster, store))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            filenames,
            inventory,
            inventory_namespace,
            prune_policy,
            stop_on_error,
            max_parallel,
            timeout,
            wait,
            wait_timeout,
            condition,
        } => {
            let manifests = load_manifests(&filenames)?;
            info!(inventory = %inventory, resources = manifests.len(), "apply invoked");
            let options = ApplyOptions {
                max_parallel,
                stop_on_error,
                prune_policy: match prune_policy {
                    PruneMode::Delete => PrunePolicy::Delete,
                    PruneMode::Orphan => PrunePolicy::Orphan,
                },
                apply_timeout: timeout.map(Duration::from_secs),
                wait: build_wait(wait, wait_timeout, condition),
                ..Default::default()
            };
            let applier = make_applier(&inventory_namespace).await?;
            let tally = drive(applier.run(&inventory, manifests, options), cli.output).await?;
            if !tally.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::Plan { filenames } => {
            let manifests = load_manifests(&filenames)?;
            let phases = flotilla_graph::plan(manifests)?;
            match cli.output {
                Output::Human => {
                    for (i, phase) in phases.iter().enumerate() {
                        println!("phase {}:", i);
                        for m in phase {
                            println!("  {}", m.id);
                        }
                    }
                }
                Output::Json => {
                    let ids: Vec<Vec<String>> = phases
                        .iter()
                        .map(|p| p.iter().map(|m| m.id.to_string()).collect())
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&ids)?);
                }
            }
        }
        Commands::Destroy { inventory, inventory_namespace, max_parallel, timeout } => {
            info!(inventory = %inventory, "destroy invoked");
            let options = ApplyOptions {
                max_parallel,
                prune_timeout: timeout.map(Duration::from_secs),
                ..Default::default()
            };
            let applier = make_applier(&inventory_namespace).await?;
            let tally = drive(applier.destroy(&inventory, options), cli.output).await?;
            if !tally.is_clean() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
