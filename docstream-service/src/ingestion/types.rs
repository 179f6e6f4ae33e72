//! Output data model shared by the PDF pipeline and the text parsers.

use serde::Serialize;

/// Axis-aligned box in raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> i64 {
        (self.xmax as i64 - self.xmin as i64).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.ymax as i64 - self.ymin as i64).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() == 0
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> i64 {
        let x1 = self.xmin.max(other.xmin) as i64;
        let y1 = self.ymin.max(other.ymin) as i64;
        let x2 = self.xmax.min(other.xmax) as i64;
        let y2 = self.ymax.min(other.ymax) as i64;
        (x2 - x1).max(0) * (y2 - y1).max(0)
    }

    /// Intersection area over the smaller of the two areas; 0 when either box is empty.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / smaller as f64
    }

    /// Clamp the box into a `width` x `height` raster.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width as i32;
        let h = height as i32;
        Self {
            xmin: self.xmin.clamp(0, w),
            ymin: self.ymin.clamp(0, h),
            xmax: self.xmax.clamp(0, w),
            ymax: self.ymax.clamp(0, h),
        }
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Raster dimensions of the page a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// Non-text region kinds persisted as cropped images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Figure,
    Table,
    Formula,
}

/// Partition key for overlap suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Text,
    Artifact(ArtifactKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkContent {
    Text(String),
    Artifact { kind: ArtifactKind, locator: String },
}

/// One extracted piece of content with its page and box metadata.
///
/// Fields are private: a chunk never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    content: ChunkContent,
    bbox: BoundingBox,
    page_index: usize,
    page_size: PageSize,
    total_pages: usize,
    region_count: usize,
}

/// Page-level metadata common to every chunk of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    pub page_index: usize,
    pub page_size: PageSize,
    pub total_pages: usize,
    pub region_count: usize,
}

impl Chunk {
    pub fn text(text: impl Into<String>, bbox: BoundingBox, page: PageContext) -> Self {
        Self::new(ChunkContent::Text(text.into()), bbox, page)
    }

    pub fn artifact(
        kind: ArtifactKind,
        locator: impl Into<String>,
        bbox: BoundingBox,
        page: PageContext,
    ) -> Self {
        Self::new(
            ChunkContent::Artifact {
                kind,
                locator: locator.into(),
            },
            bbox,
            page,
        )
    }

    fn new(content: ChunkContent, bbox: BoundingBox, page: PageContext) -> Self {
        Self {
            content,
            bbox,
            page_index: page.page_index,
            page_size: page.page_size,
            total_pages: page.total_pages,
            region_count: page.region_count,
        }
    }

    pub fn kind(&self) -> ChunkKind {
        match &self.content {
            ChunkContent::Text(_) => ChunkKind::Text,
            ChunkContent::Artifact { kind, .. } => ChunkKind::Artifact(*kind),
        }
    }

    pub fn content(&self) -> &ChunkContent {
        &self.content
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn region_count(&self) -> usize {
        self.region_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_ratio_contained_box() {
        let outer = BoundingBox::new(0, 0, 10, 10);
        let inner = BoundingBox::new(1, 1, 9, 9);
        assert_eq!(outer.intersection_area(&inner), 64);
        assert_eq!(outer.overlap_ratio(&inner), 1.0);
    }

    #[test]
    fn test_degenerate_box_never_overlaps() {
        let line = BoundingBox::new(5, 0, 5, 10);
        let square = BoundingBox::new(0, 0, 10, 10);
        assert!(line.is_degenerate());
        assert_eq!(line.overlap_ratio(&square), 0.0);
        assert_eq!(square.overlap_ratio(&line), 0.0);
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let inverted = BoundingBox::new(10, 10, 0, 0);
        assert_eq!(inverted.area(), 0);
    }

    #[test]
    fn test_clamp_to_raster() {
        let bbox = BoundingBox::new(-5, 10, 120, 300).clamp_to(100, 200);
        assert_eq!(bbox, BoundingBox::new(0, 10, 100, 200));
    }

    #[test]
    fn test_artifact_kind_tags() {
        assert_eq!(ArtifactKind::Figure.to_string(), "FIGURE");
        assert_eq!(ArtifactKind::Formula.as_ref(), "FORMULA");
    }
}
