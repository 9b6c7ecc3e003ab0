mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    admin::AdminSubcommand, application::ApplicationSubcommand, config::ConfigSubcommand,
    domain::DomainSubcommand, registry::RegistrySubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "onboard",
    about = "Institution onboarding: applications, review, registry, and domain cache",
    version,
    propagate_version = true
)]
struct Cli {
    /// Platform root (default: auto-detect from .onboard/)
    #[arg(long, global = true, env = "ONBOARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .onboard/ with a default config and an empty database
    Init {
        /// Platform name recorded in the config
        #[arg(long)]
        name: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (defaults to server.port from the config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Applicant-side operations on one application
    Application {
        #[command(subcommand)]
        subcommand: ApplicationSubcommand,
    },

    /// Review transitions and bulk actions
    Admin {
        #[command(subcommand)]
        subcommand: AdminSubcommand,
    },

    /// Query the institution registry
    Registry {
        #[command(subcommand)]
        subcommand: RegistrySubcommand,
    },

    /// Show registry metrics
    Metrics,

    /// Domain cache lookups and maintenance
    Domain {
        #[command(subcommand)]
        subcommand: DomainSubcommand,
    },

    /// Repair the registry from authoritative records
    Reconcile {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the platform configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Application { subcommand } => {
            cmd::application::run(&root, subcommand, cli.json)
        }
        Commands::Admin { subcommand } => cmd::admin::run(&root, subcommand, cli.json),
        Commands::Registry { subcommand } => cmd::registry::run(&root, subcommand, cli.json),
        Commands::Metrics => cmd::registry::metrics(&root, cli.json),
        Commands::Domain { subcommand } => cmd::domain::run(&root, subcommand, cli.json),
        Commands::Reconcile { dry_run } => cmd::reconcile::run(&root, dry_run, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
