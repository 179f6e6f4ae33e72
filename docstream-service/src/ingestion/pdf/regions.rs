//! Layout detector vocabulary and the region dispatch table.

use crate::ingestion::types::{ArtifactKind, BoundingBox};
use crate::models::Detection;

/// Classes emitted by the layout model, keyed by detector category id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr, strum::Display)]
#[repr(u32)]
pub enum LayoutClass {
    Title = 0,
    PlainText = 1,
    Abandon = 2,
    Figure = 3,
    FigureCaption = 4,
    Table = 5,
    TableCaption = 6,
    TableFootnote = 7,
    IsolateFormula = 8,
    FormulaCaption = 9,
    InlineFormula = 13,
    IsolatedFormula = 14,
    OcrText = 15,
}

/// What the page processor does with a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRoute {
    Text,
    Artifact(ArtifactKind),
    /// Excluded from detection entirely and not counted.
    Ignored,
    /// Detected and counted, but produces no chunk.
    Skip,
}

/// Category ids the layout model is asked not to report.
pub const IGNORED_CATEGORY_IDS: [u32; 1] = [LayoutClass::OcrText as u32];

impl LayoutClass {
    pub fn route(self) -> RegionRoute {
        match self {
            LayoutClass::Title
            | LayoutClass::PlainText
            | LayoutClass::Abandon
            | LayoutClass::FigureCaption
            | LayoutClass::TableCaption
            | LayoutClass::TableFootnote => RegionRoute::Text,
            LayoutClass::Figure => RegionRoute::Artifact(ArtifactKind::Figure),
            LayoutClass::Table => RegionRoute::Artifact(ArtifactKind::Table),
            LayoutClass::IsolateFormula => RegionRoute::Artifact(ArtifactKind::Formula),
            LayoutClass::OcrText => RegionRoute::Ignored,
            LayoutClass::FormulaCaption
            | LayoutClass::InlineFormula
            | LayoutClass::IsolatedFormula => RegionRoute::Skip,
        }
    }
}

/// Route a raw detector category id; unknown ids are skipped.
pub fn route_category(category_id: u32) -> RegionRoute {
    LayoutClass::from_repr(category_id)
        .map(LayoutClass::route)
        .unwrap_or(RegionRoute::Skip)
}

/// A detected region, reduced to what the page processor needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub route: RegionRoute,
    pub bbox: BoundingBox,
}

impl Region {
    /// Uses the top-left (`poly[0..2]`) and bottom-right (`poly[4..6]`) corners.
    pub fn from_detection(detection: &Detection) -> Self {
        let poly = &detection.polygon;
        Self {
            route: route_category(detection.category_id),
            bbox: BoundingBox::new(
                poly[0] as i32,
                poly[1] as i32,
                poly[4] as i32,
                poly[5] as i32,
            ),
        }
    }
}

/// Number of detections on a page that are not in the ignored vocabulary.
pub fn count_regions(detections: &[Detection]) -> usize {
    detections
        .iter()
        .filter(|d| route_category(d.category_id) != RegionRoute::Ignored)
        .count()
}
