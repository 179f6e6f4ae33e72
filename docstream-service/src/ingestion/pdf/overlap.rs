//! Duplicate-region suppression for one page's chunks.
//!
//! Layout detectors often report a region twice, or report a sub-region of
//! another region with the same class. A candidate is dropped when its box is
//! more than `threshold` covered by an already accepted chunk of the same kind,
//! where coverage is intersection area over the smaller box's area. The walk
//! is greedy in input order, so the first-seen chunk wins; this is O(n²) and
//! meant for tens of chunks per page.

use tracing::trace;

use crate::ingestion::types::Chunk;

/// Threshold used by the page processor.
pub const PAGE_OVERLAP_THRESHOLD: f64 = 0.9;

pub fn resolve_overlaps(chunks: Vec<Chunk>, threshold: f64) -> Vec<Chunk> {
    let mut accepted: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for candidate in chunks {
        let duplicate = accepted.iter().any(|kept| {
            kept.kind() == candidate.kind()
                && candidate.bbox().overlap_ratio(kept.bbox()) > threshold
        });

        if duplicate {
            trace!(
                page = candidate.page_index(),
                kind = ?candidate.kind(),
                bbox = ?candidate.bbox().as_array(),
                "Dropping overlapping chunk"
            );
        } else {
            accepted.push(candidate);
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::{ArtifactKind, BoundingBox, PageContext, PageSize};

    fn page() -> PageContext {
        PageContext {
            page_index: 0,
            page_size: PageSize {
                width: 100,
                height: 100,
            },
            total_pages: 1,
            region_count: 2,
        }
    }

    fn text(label: &str, bbox: (i32, i32, i32, i32)) -> Chunk {
        Chunk::text(
            label,
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
            page(),
        )
    }

    fn figure(locator: &str, bbox: (i32, i32, i32, i32)) -> Chunk {
        Chunk::artifact(
            ArtifactKind::Figure,
            locator,
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
            page(),
        )
    }

    #[test]
    fn test_contained_box_is_suppressed_first_seen_wins() {
        let chunks = vec![text("outer", (0, 0, 10, 10)), text("inner", (1, 1, 9, 9))];
        let resolved = resolve_overlaps(chunks, 0.9);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0], text("outer", (0, 0, 10, 10)));

        let reversed = vec![text("inner", (1, 1, 9, 9)), text("outer", (0, 0, 10, 10))];
        let resolved = resolve_overlaps(reversed, 0.9);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0], text("inner", (1, 1, 9, 9)));
    }

    #[test]
    fn test_disjoint_boxes_both_survive() {
        let chunks = vec![text("a", (0, 0, 10, 10)), text("b", (20, 20, 30, 30))];
        assert_eq!(resolve_overlaps(chunks, 0.9).len(), 2);
    }

    #[test]
    fn test_different_kinds_never_suppress() {
        let chunks = vec![text("caption", (0, 0, 10, 10)), figure("fig.png", (0, 0, 10, 10))];
        let resolved = resolve_overlaps(chunks, 0.9);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_different_artifact_kinds_never_suppress() {
        let table = Chunk::artifact(
            ArtifactKind::Table,
            "table.png",
            BoundingBox::new(0, 0, 10, 10),
            page(),
        );
        let chunks = vec![figure("fig.png", (0, 0, 10, 10)), table];
        assert_eq!(resolve_overlaps(chunks, 0.9).len(), 2);
    }

    #[test]
    fn test_ratio_at_threshold_is_kept() {
        // Intersection 90 over smaller area 100: exactly 0.9, not above it.
        let chunks = vec![text("a", (0, 0, 10, 10)), text("b", (1, 0, 11, 10))];
        assert_eq!(resolve_overlaps(chunks, 0.9).len(), 2);
    }

    #[test]
    fn test_degenerate_boxes_are_kept() {
        let chunks = vec![text("a", (0, 0, 10, 10)), text("line", (5, 0, 5, 10))];
        assert_eq!(resolve_overlaps(chunks, 0.9).len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let chunks = vec![
            text("a", (0, 0, 10, 10)),
            text("b", (1, 1, 9, 9)),
            text("c", (50, 50, 60, 60)),
            figure("f", (0, 0, 10, 10)),
            figure("g", (0, 0, 10, 9)),
            text("d", (52, 52, 58, 58)),
        ];
        let once = resolve_overlaps(chunks, 0.9);
        let twice = resolve_overlaps(once.clone(), 0.9);
        assert_eq!(once.len(), 3);
        assert_eq!(once, twice);
    }
}
