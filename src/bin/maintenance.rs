use std::env;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;

use compliance_backend::{
    config::AppConfig,
    db,
    domain::{Department, Designation, FunctionalRole},
    schema::profiles,
};

const USAGE: &str = "Usage:
  maintenance set-role <email> <hr|employee>
  maintenance assign <email> <designation> <department>
  maintenance migrate";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.iter().map(String::as_str).collect::<Vec<_>>();

    match command.as_slice() {
        ["set-role", email, role] => set_role(email, role.parse()?),
        ["assign", email, designation, department] => {
            assign(email, designation.parse()?, department.parse()?)
        }
        ["migrate"] => migrate(),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    db::init_pool_with_size(&config.database_url, 1)
}

fn set_role(email: &str, role: FunctionalRole) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let updated = diesel::update(profiles::table.filter(profiles::email.eq(email.to_lowercase())))
        .set((
            profiles::role.eq(role.as_str()),
            profiles::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .context("failed to update role")?;

    if updated == 0 {
        bail!("no profile found for {email}");
    }
    println!("{email} now has role {role}.");
    Ok(())
}

fn assign(email: &str, designation: Designation, department: Department) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let updated = diesel::update(profiles::table.filter(profiles::email.eq(email.to_lowercase())))
        .set((
            profiles::designation.eq(Some(designation.as_str())),
            profiles::department.eq(Some(department.as_str())),
            profiles::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .context("failed to update designation")?;

    if updated == 0 {
        bail!("no profile found for {email}");
    }
    println!("{email} is now {designation} in {department}.");
    Ok(())
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let applied = db::run_migrations(&pool)?;
    println!("Applied {applied} migrations.");
    Ok(())
}
