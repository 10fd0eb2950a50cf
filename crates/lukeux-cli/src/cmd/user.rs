use super::open_store;
use crate::output::{print_json, print_table, short_time};
use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use lukeux_core::store::Store;
use lukeux_core::user::{self, PublicUser, Role, User};
use lukeux_core::{session, LukeError};
use std::path::Path;

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Create an account
    Add {
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        #[arg(long, env = "LUKEUX_PASSWORD", hide_env_values = true)]
        password: String,
        /// Create the account as an admin
        #[arg(long)]
        admin: bool,
    },
    /// List accounts
    List,
    /// Change an account's role
    Role {
        email: String,
        #[arg(value_enum)]
        role: RoleArg,
    },
    /// Set a new password and sign the account out everywhere
    Passwd {
        email: String,
        #[arg(long, env = "LUKEUX_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::User => Role::User,
            RoleArg::Admin => Role::Admin,
        }
    }
}

pub fn run(root: &Path, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    let (_config, store) = open_store(root)?;
    match subcmd {
        UserSubcommand::Add {
            email,
            name,
            password,
            admin,
        } => {
            let role = if admin { Role::Admin } else { Role::User };
            let u = user::register(&store, &email, &name, &password, role)?;
            report(&u, "created", json)
        }
        UserSubcommand::List => list(&store, json),
        UserSubcommand::Role { email, role } => {
            let u = by_email(&store, &email)?;
            let u = user::set_role(&store, &u.id, role.into())?;
            report(&u, "updated", json)
        }
        UserSubcommand::Passwd { email, password } => {
            let u = by_email(&store, &email)?;
            let u = user::set_password(&store, &u.id, &password)?;
            let revoked = session::revoke_all_for_user(&store, &u.id)
                .context("failed to revoke sessions")?;
            if json {
                print_json(&serde_json::json!({ "user": PublicUser::from(&u), "revoked_sessions": revoked }))
            } else {
                println!("Password set for {} ({revoked} sessions revoked)", u.email);
                Ok(())
            }
        }
    }
}

fn by_email(store: &Store, email: &str) -> anyhow::Result<User> {
    Ok(user::find_by_email(store, email)?.ok_or_else(|| LukeError::UserNotFound(email.to_string()))?)
}

fn report(u: &User, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&PublicUser::from(u))
    } else {
        println!("{verb}: {} <{}> [{}]", u.name, u.email, u.role.as_str());
        Ok(())
    }
}

fn list(store: &Store, json: bool) -> anyhow::Result<()> {
    let users = user::list(store)?;
    if json {
        let public: Vec<PublicUser> = users.iter().map(PublicUser::from).collect();
        return print_json(&public);
    }
    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }
    let rows = users
        .iter()
        .map(|u| {
            vec![
                u.email.clone(),
                u.name.clone(),
                u.role.as_str().to_string(),
                short_time(&u.created_at),
            ]
        })
        .collect();
    print_table(&["EMAIL", "NAME", "ROLE", "CREATED"], rows);
    Ok(())
}
