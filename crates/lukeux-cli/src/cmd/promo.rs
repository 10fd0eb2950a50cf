use super::open_store;
use crate::output::{print_json, print_table, short_time};
use clap::Subcommand;
use lukeux_core::promo::{self, PromoSignup, PromoStatus, DEFAULT_ACTIVATION_DAYS};
use lukeux_core::store::Store;
use lukeux_core::LukeError;
use std::path::Path;

#[derive(Subcommand)]
pub enum PromoSubcommand {
    /// List signups, newest first
    List {
        /// Only this status: pending, activated or expired
        #[arg(long)]
        status: Option<PromoStatus>,
    },
    /// Change a signup's status
    SetStatus {
        /// Signup id or email
        signup: String,
        status: PromoStatus,
        /// Days until an activation expires
        #[arg(long, default_value_t = DEFAULT_ACTIVATION_DAYS)]
        days: i64,
    },
    /// Expire activations whose expiry has passed
    Expire,
}

pub fn run(root: &Path, subcmd: PromoSubcommand, json: bool) -> anyhow::Result<()> {
    let (_config, store) = open_store(root)?;
    match subcmd {
        PromoSubcommand::List { status } => list(&store, status, json),
        PromoSubcommand::SetStatus {
            signup,
            status,
            days,
        } => {
            if days <= 0 {
                anyhow::bail!("--days must be positive");
            }
            let target = find(&store, &signup)?;
            let s = promo::set_status(&store, &target.id, status, days)?;
            if json {
                print_json(&s)
            } else {
                println!("{} is now {}", s.email, s.status.as_str());
                Ok(())
            }
        }
        PromoSubcommand::Expire => {
            let n = promo::expire_due(&store, chrono::Utc::now())?;
            if json {
                print_json(&serde_json::json!({ "expired": n }))
            } else {
                println!("Expired {n} signups.");
                Ok(())
            }
        }
    }
}

fn find(store: &Store, key: &str) -> anyhow::Result<PromoSignup> {
    if key.contains('@') {
        return Ok(promo::find_by_email(store, key)?
            .ok_or_else(|| LukeError::PromoNotFound(key.to_string()))?);
    }
    Ok(promo::get(store, key)?)
}

fn list(store: &Store, status: Option<PromoStatus>, json: bool) -> anyhow::Result<()> {
    let signups = promo::list(store, status)?;
    if json {
        return print_json(&signups);
    }
    if signups.is_empty() {
        println!("No promo signups.");
        return Ok(());
    }
    let rows = signups
        .iter()
        .map(|s| {
            vec![
                s.email.clone(),
                s.status.as_str().to_string(),
                s.code.clone().unwrap_or_default(),
                short_time(&s.created_at),
                s.expires_at.as_ref().map(short_time).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["EMAIL", "STATUS", "CODE", "SIGNED UP", "EXPIRES"], rows);
    Ok(())
}
