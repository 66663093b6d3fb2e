use crate::core::archive::{ArchiveError, AttachmentFetcher};
use async_trait::async_trait;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads attachments straight from Discord's CDN.
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
}

impl HttpAttachmentFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ArchiveError::TransferFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArchiveError::TransferFailure(format!(
                "download of {} failed: {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArchiveError::TransferFailure(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
