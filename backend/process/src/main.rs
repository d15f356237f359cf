use std::time::Duration;

use clap::Parser;
use server::database::Database;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SQLite file to create or reseed.
    #[arg(long, default_value = "campus.db")]
    database: String,

    /// Rows per collection, at least one so that the admin user exists.
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u64).range(1..))]
    rows: u64,

    /// Lifetime of the admin session.
    #[arg(long, default_value_t = 30)]
    session_days: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let database = Database::open(&args.database, Duration::from_secs(30))?;
    let seeded = process::seed(&database, usize::try_from(args.rows)?, args.session_days).await?;

    println!("Seeded {} rows into {}", seeded.rows, args.database);
    println!("Admin token: {}", seeded.admin_token);

    Ok(())
}
