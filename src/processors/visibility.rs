//! Occlusion pruning of the annotations of one image.
//!
//! An annotation is hidden when it lies entirely behind another one whose
//! 2D box strictly contains its own.

use crate::core::dataset::AnnotationRecord;

/// Returns true if `inner` lies strictly inside `outer`. Boxes are `[x, y, w, h]`.
pub fn bbox_inside(inner: &[f64; 4], outer: &[f64; 4]) -> bool {
    inner[0] > outer[0]
        && inner[0] + inner[2] < outer[0] + outer[2]
        && inner[1] > outer[1]
        && inner[1] + inner[3] < outer[1] + outer[3]
}

fn min_dim(ann: &AnnotationRecord) -> f64 {
    ann.dim.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_dim(ann: &AnnotationRecord) -> f64 {
    ann.dim.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Returns true if `ann` is fully behind `other` and covered by it.
fn hidden_by(ann: &AnnotationRecord, other: &AnnotationRecord) -> bool {
    ann.depth - min_dim(ann) / 2.0 > other.depth + max_dim(other) / 2.0 && bbox_inside(&ann.bbox, &other.bbox)
}

/// Drops every annotation hidden by another annotation of the same image.
///
/// Survivors keep their order. Running the filter on its own output removes
/// nothing further.
pub fn filter_occluded(annotations: Vec<AnnotationRecord>) -> Vec<AnnotationRecord> {
    let hidden: Vec<bool> = annotations
        .iter()
        .enumerate()
        .map(|(i, ann)| {
            annotations
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && hidden_by(ann, other))
        })
        .collect();

    annotations
        .into_iter()
        .zip(hidden)
        .filter_map(|(ann, hidden)| (!hidden).then_some(ann))
        .collect()
}
