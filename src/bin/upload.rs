//! Command-line uploader: drives the upload lifecycle manager against a
//! running server, printing per-file progress until every transfer settles.
//!
//! Usage: collabdrive-upload <file>...
//! Reads COLLABDRIVE_URL (default http://localhost:3000) and
//! COLLABDRIVE_SESSION_TOKEN from the environment.

use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use collabdrive::uploader::{HttpTransport, UploadManager, UploadStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("Usage: collabdrive-upload <file>...");
    }

    let base_url = std::env::var("COLLABDRIVE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let session_token = std::env::var("COLLABDRIVE_SESSION_TOKEN")
        .context("COLLABDRIVE_SESSION_TOKEN must be set")?;

    let transport = HttpTransport::new(base_url, session_token)
        .map_err(|e| anyhow::anyhow!("Failed to build transport: {}", e))?;
    let manager = UploadManager::new(Arc::new(transport));

    for path in &paths {
        let path = Path::new(path);
        let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = mime_guess::from_path(path).first().map(|m| m.to_string());

        manager.enqueue(file_name, content_type, data);
    }

    loop {
        let items = manager.items();
        let settled = items
            .iter()
            .filter(|i| matches!(i.status, UploadStatus::Complete | UploadStatus::Error))
            .count();

        for item in &items {
            match item.status {
                UploadStatus::Complete => {
                    println!("{:<40} done", item.file_name)
                }
                UploadStatus::Error => println!(
                    "{:<40} FAILED: {}",
                    item.file_name,
                    item.error.as_deref().unwrap_or("unknown error")
                ),
                _ => println!("{:<40} {:>3}%", item.file_name, item.progress),
            }
        }

        if settled == items.len() {
            let failed = items
                .iter()
                .filter(|i| i.status == UploadStatus::Error)
                .count();
            if failed > 0 {
                bail!("{} of {} uploads failed", failed, items.len());
            }
            println!("Uploaded {} file(s)", items.len());
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Rewrite the status block in place on capable terminals.
        print!("\x1B[{}A", items.len());
    }
}
