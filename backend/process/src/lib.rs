//! # Seeding
//!
//! Prepares a SQLite file for local development and demos.
//!
//! ## Steps
//! 1. Create any missing tables.
//!
//! 2. Empty every collection, which also ends all sessions.
//!
//! 3. Insert `rows` fixture rows per collection (see [`fixtures`]). The first
//!    user is an admin, so that every collection can be listed.
//!
//! 4. Issue a session token for that admin, valid for `session_days`, and
//!    hand it back for use as `Authorization: Bearer <token>`.
//!
//! ## Notes
//! - Fixtures are deterministic: reseeding gives the same rows, only the
//!   token changes
//! - Course slugs go through [`utils::slugify`] and carry the row id, so they
//!   stay unique even when titles repeat
use std::time::Duration;

use anyhow::{Context, ensure};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use protocol::Collection;
use server::database::Database;
use tracing::info;
use uuid::Uuid;

pub mod fixtures;
pub mod utils;

use fixtures::ADMIN_ID;

#[derive(Debug)]
pub struct Seeded {
    pub rows: usize,
    pub admin_token: String,
}

pub async fn seed(database: &Database, rows: usize, session_days: i64) -> anyhow::Result<Seeded> {
    ensure!(rows > 0, "at least one row per collection is needed for the admin user");

    database.migrate().await.context("creating schema")?;

    let pb = ProgressBar::new(Collection::ALL.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut inserted = 0;

    for collection in Collection::ALL {
        pb.set_message(format!("Seeding {collection}"));

        let cleared = database.clear(collection).await?;
        if cleared > 0 {
            info!("Cleared {cleared} {collection}");
        }

        inserted += match collection {
            Collection::Users => database.insert(fixtures::users(rows)).await?,
            Collection::Courses => database.insert(fixtures::courses(rows)).await?,
            Collection::Newsletters => database.insert(fixtures::newsletters(rows)).await?,
            Collection::Posts => database.insert(fixtures::posts(rows)).await?,
            Collection::Products => database.insert(fixtures::products(rows)).await?,
            Collection::Partners => database.insert(fixtures::partners(rows)).await?,
        };

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    let admin_token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + chrono::Duration::days(session_days);
    database
        .create_session(admin_token.clone(), ADMIN_ID, expires_at)
        .await
        .context("issuing admin session")?;

    info!("Seeded {inserted} rows, admin session valid until {expires_at}");

    Ok(Seeded {
        rows: inserted,
        admin_token,
    })
}
