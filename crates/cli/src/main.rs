use std::io::Read as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use kmeta_apply::{render_diff, render_outcome, Reconciler};
use kmeta_core::Manifest;
use kmeta_kubehub::{KubeStore, ResourceStore};
use kmeta_store::MemoryStore;
use kmeta_validate::{render_report, Validator};

#[derive(Parser, Debug)]
#[command(name = "kmeta", version, about = "kagent manifest tools: validate, diff, apply")]
struct Cli {
    /// Output format for local commands
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace used when a manifest or argument names none
    #[arg(long = "namespace", short = 'n', global = true, env = "KAGENT_NAMESPACE", default_value = "kagent")]
    namespace: String,

    /// Work against an empty in-memory store instead of the cluster
    #[arg(long = "offline", global = true, action = ArgAction::SetTrue)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the tool catalogue over stdio (default)
    Serve,
    /// Print the tool catalogue
    Tools,
    /// Validate a manifest file ("-" for stdin)
    Validate {
        file: String,
        /// Skip best-practice warnings
        #[arg(long = "lenient", action = ArgAction::SetTrue)]
        lenient: bool,
    },
    /// Show what applying a manifest would change
    Diff { file: String },
    /// Create or update the resource a manifest describes
    Apply {
        file: String,
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Delete a resource by kind and name
    Delete {
        /// Agent, ModelConfig, MCPServer or RemoteMCPServer
        kind: String,
        name: String,
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("KMETA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the transport; logs go to stderr
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KMETA_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KMETA_METRICS_ADDR; expected host:port");
        }
    }
}

async fn open_store(offline: bool) -> Result<Arc<dyn ResourceStore>> {
    if offline {
        info!("using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = KubeStore::try_default().await.context("connecting to the cluster (use --offline to work without one)")?;
    Ok(Arc::new(store))
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).with_context(|| format!("reading {file}"))
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let ns = cli.namespace.clone();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let store = open_store(cli.offline).await?;
            let server = kmeta_api::ToolServer::new(store, ns);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            tokio::select! {
                res = kmeta_api::rpc::serve(&server, stdin, tokio::io::stdout()) => res.context("stdio transport")?,
                _ = tokio::signal::ctrl_c() => info!("interrupted; shutting down"),
            }
        }
        Commands::Tools => match cli.output {
            Output::Human => {
                for t in kmeta_api::TOOLS {
                    println!("{:<30} {}", t.name, t.description);
                }
            }
            Output::Json => {
                let tools: Vec<_> = kmeta_api::TOOLS
                    .iter()
                    .map(|t| serde_json::json!({ "name": t.name, "description": t.description, "inputSchema": t.input_schema() }))
                    .collect();
                print_json(&tools)?;
            }
        },
        Commands::Validate { file, lenient } => {
            let text = read_input(&file)?;
            let validator = Validator::new(open_store(cli.offline).await?, ns);
            let t0 = Instant::now();
            let issues = validator.validate_text(&text, !lenient).await?;
            info!(file = %file, issues = issues.len(), took_ms = %t0.elapsed().as_millis(), "validate done");
            match cli.output {
                Output::Human => println!("{}", render_report(&issues)),
                Output::Json => print_json(&issues)?,
            }
            if issues.iter().any(|i| i.is_error()) {
                bail!("manifest has validation errors");
            }
        }
        Commands::Diff { file } => {
            let text = read_input(&file)?;
            let reconciler = Reconciler::new(open_store(cli.offline).await?, ns);
            let result = reconciler.diff(&Manifest::from_yaml(&text)?).await?;
            match cli.output {
                Output::Human => println!("{}", render_diff(&result, &text)),
                Output::Json => print_json(&result)?,
            }
        }
        Commands::Apply { file, dry_run } => {
            let text = read_input(&file)?;
            let reconciler = Reconciler::new(open_store(cli.offline).await?, ns);
            let outcome = reconciler.apply(Manifest::from_yaml(&text)?, dry_run).await?;
            match cli.output {
                Output::Human => println!("{}", render_outcome(&outcome)),
                Output::Json => print_json(&outcome)?,
            }
        }
        Commands::Delete { kind, name, dry_run } => {
            let reconciler = Reconciler::new(open_store(cli.offline).await?, ns);
            let target = reconciler.delete(&kind, &name, None, dry_run).await?;
            match cli.output {
                Output::Human if dry_run => println!("{target} would be deleted."),
                Output::Human => println!("{target} deleted."),
                Output::Json => print_json(&serde_json::json!({ "deleted": target, "dryRun": dry_run }))?,
            }
        }
    }
    Ok(())
}
