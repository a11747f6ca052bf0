use crate::models::{BoxGeometry, Rect};

/// Greedy duplicate suppression in arrival order.
///
/// A candidate is dropped when any already-accepted box covers more than
/// `max_overlap_ratio` of the candidate's own area. Earlier candidates always win.
pub fn deduplicate(candidates: &[Rect], max_overlap_ratio: f32) -> Vec<Rect> {
    let mut accepted: Vec<Rect> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if candidate.area() <= 0.0 {
            continue;
        }
        let duplicate = accepted
            .iter()
            .any(|kept| candidate.overlap_ratio(kept) > max_overlap_ratio);
        if !duplicate {
            accepted.push(*candidate);
        }
    }

    accepted
}
