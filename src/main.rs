//! `embedbench` - measure embedding throughput over a sampled corpus and
//! extrapolate the time to embed all of it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use embedbench::{run_benchmark, BenchConfig, JsonlDataset, LoggingConfig};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "embedbench", version, about)]
struct Cli {
    /// Config file; defaults to an optional `embedbench.{toml,yaml,json}`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one benchmark and append its statistics to the results log.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Fraction of dataset records to embed, in (0, 1].
    #[arg(long)]
    down_scale: Option<f64>,

    /// Write every chunk with its embedding to this JSON-lines file.
    #[arg(long)]
    publish: Option<PathBuf>,

    /// JSON-lines dataset to read.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Attach to a running embedding server instead of launching workers.
    /// Repeat for several workers.
    #[arg(long = "endpoint")]
    endpoints: Vec<String>,
}

impl RunArgs {
    fn apply(self, config: &mut BenchConfig) {
        if let Some(scale) = self.down_scale {
            config.run.down_scale = scale;
        }
        if let Some(path) = self.publish {
            config.run.publish = Some(path);
        }
        if let Some(path) = self.dataset {
            config.run.dataset = path;
        }
        if !self.endpoints.is_empty() {
            config.worker.endpoints = self.endpoints;
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(logging.level.as_str())
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true);
    if logging.json {
        builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = BenchConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => {
            args.apply(&mut config);
            init_tracing(&config.logging)?;

            let source = JsonlDataset::new(&config.run.dataset);
            let stats = run_benchmark(&config, &source).await.inspect_err(|err| {
                error!(component = err.component(), error = %err, "run_failed");
            })?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
