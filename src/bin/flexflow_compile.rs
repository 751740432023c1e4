//! flexflow-compile — CLI entry point driving the PCG compile pipeline over a
//! graph description file, for manual inspection and the demo examples under
//! `demos/`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexflow_pcg::config::FlexFlowConfig;
use flexflow_pcg::lift::LayerGraph;
use flexflow_pcg::model::{compile, Model};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flexflow-compile")]
#[command(version)]
#[command(about = "Compile a FlexFlow layer graph into a serialized PCG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON-described layer graph and report the resulting PCG.
    Compile {
        /// Path to a JSON file describing the layer graph (a `LayerGraph`).
        graph: PathBuf,

        /// Optional `flexflow.toml` to override default configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the serialized PCG bytes to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the recognized configuration defaults as TOML.
    PrintConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile { graph, config, out } => run_compile(graph, config, out),
        Commands::PrintConfig => {
            let config = FlexFlowConfig::default();
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_compile(graph_path: PathBuf, config_path: Option<PathBuf>, out_path: Option<PathBuf>) -> Result<()> {
    let graph_json = std::fs::read_to_string(&graph_path)
        .with_context(|| format!("reading layer graph from {}", graph_path.display()))?;
    let graph: LayerGraph =
        serde_json::from_str(&graph_json).context("parsing layer graph JSON")?;

    let config = match config_path {
        Some(path) => FlexFlowConfig::load(&path)?,
        None => FlexFlowConfig::find_and_load(&std::env::current_dir()?)?,
    };

    let mut model = Model::new();
    let compiled = compile(&mut model, &graph, &config).context("compiling layer graph")?;

    println!(
        "compiled {} operators, best_cost = {:.6}",
        compiled.pcg.operators.len(),
        compiled.metrics.get("best_cost").copied().unwrap_or(0.0)
    );

    if let Some(out_path) = out_path {
        let bytes = flexflow_pcg::serializer::encode(&compiled.pcg)?;
        std::fs::write(&out_path, bytes)
            .with_context(|| format!("writing serialized PCG to {}", out_path.display()))?;
        println!("wrote serialized PCG to {}", out_path.display());
    }

    Ok(())
}
