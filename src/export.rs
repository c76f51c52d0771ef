use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::db::Database;
use crate::digest::{date_key, FsLoader};
use crate::error::DigestError;

/// Items written per daily file.
pub const EXPORT_LIMIT: i64 = 100;

/// Writes the latest news items to `<dir>/<YYYY-MM-DD>.json`, the file the
/// static digest source reads for that date.
pub async fn export_digest(
    db: &Database,
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, DigestError> {
    let items = db.get_all_news(EXPORT_LIMIT).await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = FsLoader::new(dir).path_for(&date_key(date));
    let json = serde_json::to_vec_pretty(&items)?;
    tokio::fs::write(&path, json).await?;

    info!("Exported {} news items to {}", items.len(), path.display());
    Ok(path)
}
