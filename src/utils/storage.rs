use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;

pub fn image_dir() -> PathBuf {
    std::env::var("IMAGE_DIR")
        .unwrap_or_else(|_| "public/images".to_string())
        .into()
}

// Submission-time prefix plus the detected extension. Seconds resolution;
// concurrent submissions in the same second race last-write-wins.
pub fn image_name(extension: &str) -> String {
    format!("{}.{}", Utc::now().timestamp(), extension)
}

pub async fn store_image(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    fs::write(&path, bytes).await?;
    Ok(path)
}

// Strict removal: a missing file is an error the caller has to deal with.
pub async fn delete_image(dir: &Path, name: &str) -> io::Result<()> {
    fs::remove_file(dir.join(name)).await
}
