//! Content inspection used to enrich events before they are emitted

use crate::event::ContentInfo;
use crate::hash::hash_file;
use anyhow::{Context, Result};
use std::path::Path;

/// Looks inside a file to describe its content.
///
/// Called after an event's quiet period, so implementations see the file in
/// its settled state. Failing is fine: the event is emitted without content.
pub trait ContentInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<ContentInfo>;
}

/// Extension-based content type plus a BLAKE3 checksum
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInspector;

impl ContentInspector for DefaultInspector {
    fn inspect(&self, path: &Path) -> Result<ContentInfo> {
        let checksum = hash_file(path)
            .with_context(|| format!("can't get checksum from the file [{}]", path.display()))?;

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(ContentInfo {
            content_type,
            checksum: checksum.to_hex(),
        })
    }
}
