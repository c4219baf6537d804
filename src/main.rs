use clap::{Args, Parser, Subcommand};
use glow::{
    config::{ConfigManager, EnvConfigManager, GlowConfig},
    gadget::set_max_depth,
    logger::init_tracing,
    patch_commands::{format_patch_file, run_patch_file, validate_patch_file},
    registry::registered_names,
};
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    name = "glow",
    about = "Run Pure Data style patches from the command line",
    version = "0.1.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a patch and feed it messages read from stdin
    Run(RunArgs),

    /// Check that a patch loads
    Validate { patch: PathBuf },

    /// Print a patch in canonical form
    Fmt { patch: PathBuf },

    /// List the registered gadget types
    Gadgets,
}

#[derive(Args, Debug)]
struct RunArgs {
    patch: PathBuf,

    /// Inlet fed by lines without an `@N` prefix
    #[arg(long, default_value_t = 0)]
    inlet: usize,

    /// Log level override (e.g. error, warn, info, debug, trace or a filter directive)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Load settings from this .env file
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate { patch } => {
            init_tracing("warn", None)?;
            let summary = validate_patch_file(&patch)?;
            println!(
                "✅ {} is valid: {} members, {} wires, {} inlets, {} outlets",
                patch.display(),
                summary.members,
                summary.wires,
                summary.inlets,
                summary.outlets
            );
            Ok(())
        }
        Commands::Fmt { patch } => {
            init_tracing("warn", None)?;
            print!("{}", format_patch_file(&patch)?);
            Ok(())
        }
        Commands::Gadgets => {
            for name in registered_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config_mgr = ConfigManager(EnvConfigManager::new(args.env_file.clone()));
    let mut config = GlowConfig::load(&config_mgr)?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(file) = args.log_file {
        config.log_file = Some(file);
    }

    init_tracing(&config.log_level, config.log_file.as_deref())?;
    set_max_depth(config.max_depth);
    debug!(source = ?config_mgr, "configuration loaded");
    info!(?config, "glow starting");

    if let Err(e) = run_patch_file(&args.patch, args.inlet).await {
        error!("{:#}", e);
        return Err(e);
    }
    info!("glow shutting down");
    Ok(())
}
