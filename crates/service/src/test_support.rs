#![cfg(test)]
use anyhow::Result;
use migration::MigratorTrait;
use uuid::Uuid;

use models::db::{self, DatabasePair};

/// Fresh, isolated database pair backed by a throwaway sqlite file with all
/// migrations applied. Master and replica point at the same storage, as a
/// single-node development setup would.
pub async fn setup_test_db() -> Result<DatabasePair> {
    let path = std::env::temp_dir().join(format!("tenant-registry-service-{}.sqlite", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pair = db::connect_urls(&url, &url).await?;
    migration::Migrator::up(pair.master(), None).await?;
    Ok(pair)
}
