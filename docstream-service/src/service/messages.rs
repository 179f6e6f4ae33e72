//! Request and per-chunk response messages.

use serde::{Deserialize, Serialize};

use crate::error::ErrorResponse;
use crate::ingestion::{ArtifactKind, Chunk, ChunkContent};

/// Where the input lives and where artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum StorageType {
    #[default]
    Local,
    Minio,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseRequest {
    pub file_path: String,
    #[serde(default)]
    pub storage_type: StorageType,
    /// Object store bucket; falls back to the configured default.
    #[serde(default)]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Text {
        content: String,
    },
    Artifact {
        locator: String,
        class: ArtifactKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub width: u32,
    pub height: u32,
    pub page: usize,
    pub total: usize,
}

/// One emitted chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMessage {
    pub payload: Payload,
    pub bbox: [i32; 4],
    pub page_info: PageInfo,
    pub bbox_num: usize,
}

impl From<&Chunk> for ChunkMessage {
    fn from(chunk: &Chunk) -> Self {
        let payload = match chunk.content() {
            ChunkContent::Text(content) => Payload::Text {
                content: content.clone(),
            },
            ChunkContent::Artifact { kind, locator } => Payload::Artifact {
                locator: locator.clone(),
                class: *kind,
            },
        };
        let page_size = chunk.page_size();

        Self {
            payload,
            bbox: chunk.bbox().as_array(),
            page_info: PageInfo {
                width: page_size.width,
                height: page_size.height,
                page: chunk.page_index(),
                total: chunk.total_pages(),
            },
            bbox_num: chunk.region_count(),
        }
    }
}

/// Final NDJSON record written when a stream fails after it started.
#[derive(Debug, Serialize)]
pub struct StreamError {
    pub error: ErrorResponse,
}
