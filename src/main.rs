use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use sketchrs::{
    config, server,
    service::{ServiceOptions, SketchService},
    storage::FsStore,
    Pipeline,
};
use sketchrs_vision::{network::PARAMETERS, StateDict};

#[derive(Parser)]
#[command(name = "sketchrs")]
#[command(version, about = "Match hand-drawn sketches against a photo gallery")]
struct Cli {
    /// Config file (defaults to the compiled-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the gallery and serve the HTTP API
    Serve {
        /// Listen address, overrides the config
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Match a single sketch file and print the result as JSON
    Match {
        sketch: PathBuf,
    },
    /// Build the gallery and report how many photos were embedded
    Index,
    /// List the parameters of a weight artifact and their overlap with the network
    Inspect {
        artifact: PathBuf,
    },
    /// Open the config file in $EDITOR, writing the defaults first if it does not exist
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| cfg.listen.clone());
            let service = start_service(&cfg)?;
            server::serve(service, &listen)
        }
        Commands::Match { sketch } => {
            let service = start_service(&cfg)?;
            let bytes = std::fs::read(&sketch)
                .with_context(|| format!("reading sketch {}", sketch.display()))?;
            let response = service.match_sketch(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Index => {
            let service = start_service(&cfg)?;
            let gallery = service.gallery();
            for key in gallery.keys() {
                println!("{key}");
            }
            info!("{} photo(s) indexed", gallery.len());
            Ok(())
        }
        Commands::Inspect { artifact } => inspect(&artifact),
        Commands::Config => open_config(&cfg, cli.config.as_deref()),
    }
}

/// Load the model and build the gallery; any model failure aborts start-up.
fn start_service(cfg: &config::Config) -> Result<Arc<SketchService>> {
    let pipeline = Pipeline::from_path(&cfg.model_path)
        .with_context(|| format!("loading model {}", cfg.model_path.display()))?;

    info!("Using image store at {}", cfg.store_root.display());
    let store = Arc::new(FsStore::new(&cfg.store_root));

    let service = SketchService::new(store, pipeline, ServiceOptions::from(cfg));
    let count = service.rebuild().context("building gallery")?;
    if count == 0 {
        log::warn!("gallery is empty; every match will report no gallery available");
    }
    Ok(Arc::new(service))
}

fn inspect(path: &Path) -> Result<()> {
    let dict = StateDict::load(path)
        .with_context(|| format!("reading weight artifact {}", path.display()))?;

    for (name, tensor) in dict.iter() {
        let used = PARAMETERS.iter().any(|(n, _)| *n == name);
        println!(
            "{:<24} {:<18} {}",
            name,
            format!("{:?}", tensor.shape()),
            if used { "" } else { "(unused)" }
        );
    }
    for (name, shape) in PARAMETERS {
        if !dict.contains(name) {
            println!("{:<24} {:<18} (missing)", name, format!("{:?}", shape));
        }
    }
    Ok(())
}

fn open_config(cfg: &config::Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&config::CONFIG_PATH);
    if !path.exists() {
        config::save_config(cfg, Some(path))
            .with_context(|| format!("writing default config to {}", path.display()))?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    info!("Opening config file: {}", path.display());

    let status = std::process::Command::new(editor)
        .arg(path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
