//! Call contracts for the two inference engines.
//!
//! The layout detector and the OCR engine are black boxes. The pipeline only
//! depends on the traits below; `http` provides adapters for engines served
//! over HTTP.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::ModelError;

pub use http::{HttpLayoutDetector, HttpTextRecognizer};

/// One region reported by the layout model.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Four corners, clockwise from top-left: `[x0, y0, x1, y1, x2, y2, x3, y3]`.
    pub polygon: [f32; 8],
    pub category_id: u32,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub detections: Vec<Detection>,
}

/// One line recognized by the OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub polygon: Vec<[f32; 2]>,
    pub text: String,
    pub confidence: f32,
}

/// Layout model contract. Safe to call concurrently.
#[async_trait]
pub trait LayoutDetector: Send + Sync {
    async fn detect(
        &self,
        image: Arc<RgbImage>,
        ignored_category_ids: &[u32],
    ) -> Result<LayoutResult, ModelError>;
}

/// OCR model contract. Callers must not invoke it concurrently for one page.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Returns an empty list when nothing was recognized.
    async fn recognize(&self, image: Arc<RgbImage>) -> Result<Vec<RecognizedLine>, ModelError>;
}

/// Concatenate recognized line texts in engine order.
pub fn merge_lines(lines: &[RecognizedLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> RecognizedLine {
        RecognizedLine {
            polygon: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            text: text.to_string(),
            confidence: 0.99,
        }
    }

    #[test]
    fn test_merge_lines_concatenates_and_trims() {
        let lines = vec![line("  Hello, "), line("world  ")];
        assert_eq!(merge_lines(&lines), "Hello, world");
    }

    #[test]
    fn test_merge_lines_empty() {
        assert_eq!(merge_lines(&[]), "");
        assert_eq!(merge_lines(&[line("   ")]), "");
    }
}
