use super::open_store;
use anyhow::Context;
use clap::Subcommand;
use lukeux_core::csv::{self, CsvRow};
use lukeux_core::promo::PromoStatus;
use lukeux_core::{playbook, promo, recommendation, user};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ExportSubcommand {
    /// Promo signups
    Promo {
        /// Only this status: pending, activated or expired
        #[arg(long)]
        status: Option<PromoStatus>,
        #[command(flatten)]
        out: OutArgs,
    },
    /// Recommendation feedback
    Feedback {
        #[command(flatten)]
        out: OutArgs,
    },
    /// Accounts (no password hashes)
    Users {
        #[command(flatten)]
        out: OutArgs,
    },
    /// Playbook entries
    Playbook {
        #[command(flatten)]
        out: OutArgs,
    },
}

#[derive(clap::Args)]
pub struct OutArgs {
    /// Write to this file, or to a directory using the dated default name
    /// (default: stdout)
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

pub fn run(root: &Path, subcmd: ExportSubcommand) -> anyhow::Result<()> {
    let (_config, store) = open_store(root)?;
    match subcmd {
        ExportSubcommand::Promo { status, out } => {
            write("promo-signups", &promo::list(&store, status)?, out)
        }
        ExportSubcommand::Feedback { out } => write(
            "recommendation-feedback",
            &recommendation::list(&store)?,
            out,
        ),
        ExportSubcommand::Users { out } => write("users", &user::list(&store)?, out),
        ExportSubcommand::Playbook { out } => write("playbook", &playbook::list(&store)?, out),
    }
}

fn write<R: CsvRow>(kind: &str, records: &[R], out: OutArgs) -> anyhow::Result<()> {
    let body = csv::to_csv(records)?;
    let Some(path) = out.out else {
        print!("{body}");
        return Ok(());
    };
    let path = if path.is_dir() {
        path.join(csv::export_filename(kind, chrono::Utc::now()))
    } else {
        path
    };
    std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
