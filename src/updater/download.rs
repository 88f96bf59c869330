//! Release archive retrieval.
//!
//! The archive is streamed chunk by chunk with a progress bar into a hidden sibling file,
//! which is renamed over the destination only once the transfer completes. A failed or
//! cancelled transfer drops that file, so a later run never mistakes a partial download
//! for a complete archive.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::utils::ProgressBar;

/// Fetches a URL into a local file.
pub trait ArchiveFetcher {
    /// Download `url` to `dest`, overwriting it, and return the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> impl std::future::Future<Output = Result<u64>>;
}

/// What the download phase does with the archive destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePlan {
    /// Nothing is there yet; download.
    Download,
    /// A stale file is removed and the archive downloaded again.
    Replace,
    /// The file already present is used as-is.
    ReuseExisting,
}

impl ArchivePlan {
    /// Whether the phase performs a transfer.
    #[must_use]
    pub const fn downloads(self) -> bool {
        !matches!(self, Self::ReuseExisting)
    }
}

/// HTTP(S) fetcher built on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
        })
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await.context("Request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("server answered {status}");
        }

        let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        // Deleted when dropped, including when this future is cancelled mid-transfer
        let (file, partial) = tempfile::Builder::new()
            .prefix(".nc-update-")
            .suffix(".part")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?
            .into_parts();
        let mut file = File::from_std(file);

        let progress = ProgressBar::download("Downloading", response.content_length());
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.context("Transfer interrupted")? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", partial.display()))?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);
        progress.finish_and_clear();

        partial
            .persist(dest)
            .with_context(|| format!("Failed to move the download to {}", dest.display()))?;
        Ok(written)
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("Downloading {} to {}", url, dest.display());
        self.stream_to(url, dest).await
    }
}

/// Human-readable byte count for log lines.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    indicatif::HumanBytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_archive_plan_downloads() {
        assert!(ArchivePlan::Download.downloads());
        assert!(ArchivePlan::Replace.downloads());
        assert!(!ArchivePlan::ReuseExisting.downloads());
    }

    #[tokio::test]
    async fn test_unreachable_server_leaves_no_partial_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("nextcloud-31.0.9.zip");
        let fetcher = HttpFetcher::new().unwrap();

        // Port 9 (discard) on localhost refuses connections on any normal host
        let result = fetcher.fetch("http://127.0.0.1:9/nextcloud-31.0.9.zip", &dest).await;

        assert!(result.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_cancelled_transfer_leaves_nothing_behind() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Announce a megabyte, send a few kilobytes, then stall
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&[0u8; 4096]).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("nextcloud-31.0.9.zip");
        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("http://{addr}/nextcloud-31.0.9.zip");

        tokio::select! {
            result = fetcher.fetch(&url, &dest) => panic!("transfer finished: {result:?}"),
            () = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
        server.abort();

        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_completed_transfer_replaces_destination() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("nextcloud-31.0.9.zip");
        std::fs::write(&dest, "stale").unwrap();
        let fetcher = HttpFetcher::new().unwrap();

        let written =
            fetcher.fetch(&format!("http://{addr}/nextcloud-31.0.9.zip"), &dest).await.unwrap();
        server.await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
