use anyhow::Result;
use migration::MigratorTrait;
use uuid::Uuid;

use crate::db::{self, DatabasePair};

mod transaction_tests;

/// Setup an isolated database pair backed by a throwaway sqlite file,
/// with migrations applied.
pub async fn setup_test_db() -> Result<DatabasePair> {
    let path = std::env::temp_dir().join(format!("tenant-registry-models-{}.sqlite", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pair = db::connect_urls(&url, &url).await?;
    migration::Migrator::up(pair.master(), None).await?;
    Ok(pair)
}
