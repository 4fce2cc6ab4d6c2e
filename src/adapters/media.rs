//! Media hosting. Uploads happen on the CDN before a video is published, so the
//! server only needs to release assets it no longer references.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MediaStore: Send + Sync + std::fmt::Debug {
    /// Releases the asset with the given CDN reference.
    async fn release(&self, public_id: &str) -> Result<()>;
}

/// Media whose lifecycle is owned by the CDN account. Releases are recorded in the
/// log for the CDN's own cleanup job.
#[derive(Clone, Debug, Default)]
pub struct ExternalMedia;

#[async_trait]
impl MediaStore for ExternalMedia {
    async fn release(&self, public_id: &str) -> Result<()> {
        tracing::info!(public_id, "Media released");
        Ok(())
    }
}
