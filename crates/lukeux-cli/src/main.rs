mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    blueprint::BlueprintSubcommand, config::ConfigSubcommand, export::ExportSubcommand,
    promo::PromoSubcommand, user::UserSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lukeux",
    about = "Luke UX backend: serve the API and administer the store",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: nearest directory with .lukeux/, else cwd)
    #[arg(long, global = true, env = "LUKEUX_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .lukeux/ with a default config and an empty store
    Init,

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,

        /// Open the health endpoint in a browser once listening
        #[arg(long)]
        open: bool,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Work with blueprint blocks in model responses
    Blueprint {
        #[command(subcommand)]
        subcommand: BlueprintSubcommand,
    },

    /// Export admin tables as CSV
    Export {
        #[command(subcommand)]
        subcommand: ExportSubcommand,
    },

    /// Manage accounts
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Manage promo signups
    Promo {
        #[command(subcommand)]
        subcommand: PromoSubcommand,
    },

    /// Import a legacy MongoDB JSON dump into the store
    Import {
        /// Path to the dump file
        path: PathBuf,
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
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port, open } => cmd::serve::run(&root, port, open),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Blueprint { subcommand } => cmd::blueprint::run(subcommand, cli.json),
        Commands::Export { subcommand } => cmd::export::run(&root, subcommand),
        Commands::User { subcommand } => cmd::user::run(&root, subcommand, cli.json),
        Commands::Promo { subcommand } => cmd::promo::run(&root, subcommand, cli.json),
        Commands::Import { path } => cmd::import::run(&root, &path, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
