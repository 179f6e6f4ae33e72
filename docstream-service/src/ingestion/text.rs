//! Plain text and Markdown extraction.
//!
//! Both formats are split into paragraphs on blank-line separators; Markdown
//! markup is not interpreted.

use std::path::Path;

use crate::error::{ProcessingError, ServiceResult};

use super::types::{BoundingBox, Chunk, PageContext, PageSize};

/// Separator between paragraphs.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Page size reported for formats without a real page geometry.
pub const NOMINAL_PAGE_SIZE: PageSize = PageSize {
    width: 100,
    height: 100,
};

/// Read a UTF-8 file and split it into paragraph chunks.
pub async fn extract_text(path: &Path) -> ServiceResult<Vec<Chunk>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(ProcessingError::Io)?;
    Ok(split_paragraphs(&content))
}

/// One TEXT chunk per paragraph, in order. Every chunk carries the
/// paragraph count as its page's region count.
pub fn split_paragraphs(content: &str) -> Vec<Chunk> {
    let paragraphs: Vec<&str> = content.split(PARAGRAPH_SEPARATOR).collect();
    let page = PageContext {
        page_index: 0,
        page_size: NOMINAL_PAGE_SIZE,
        total_pages: 1,
        region_count: paragraphs.len(),
    };

    paragraphs
        .into_iter()
        .map(|paragraph| Chunk::text(paragraph, BoundingBox::default(), page))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::{ChunkContent, ChunkKind};

    fn texts(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .map(|c| match c.content() {
                ChunkContent::Text(t) => t.clone(),
                other => panic!("unexpected content {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_three_paragraphs() {
        let chunks = split_paragraphs("A\n\nB\n\nC");
        assert_eq!(texts(&chunks), vec!["A", "B", "C"]);
        for chunk in &chunks {
            assert_eq!(chunk.kind(), ChunkKind::Text);
            assert_eq!(chunk.region_count(), 3);
            assert_eq!(chunk.page_index(), 0);
            assert_eq!(chunk.total_pages(), 1);
            assert_eq!(chunk.page_size(), NOMINAL_PAGE_SIZE);
            assert_eq!(chunk.bbox(), &BoundingBox::default());
        }
    }

    #[test]
    fn test_single_newlines_stay_in_paragraph() {
        let chunks = split_paragraphs("# Title\nline one\nline two\n\nnext");
        assert_eq!(texts(&chunks), vec!["# Title\nline one\nline two", "next"]);
    }

    #[tokio::test]
    async fn test_extract_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        tokio::fs::write(&path, "## Intro\n\nBody *text*").await.unwrap();

        let chunks = extract_text(&path).await.unwrap();
        assert_eq!(texts(&chunks), vec!["## Intro", "Body *text*"]);
        assert_eq!(chunks[1].region_count(), 2);
    }
}
