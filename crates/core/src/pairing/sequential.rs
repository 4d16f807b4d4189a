use crate::granule::{Granule, GranulePair};

/// Builds strictly adjacent pairs from scenes sorted by acquisition date.
///
/// `n` scenes produce `n - 1` pairs; fewer than two scenes produce none.
/// Scenes with equal dates keep their input order.
pub fn build_sequential_pairs(granules: &[Granule]) -> Vec<GranulePair> {
    let mut sorted = granules.to_vec();
    sorted.sort_by_key(|g| g.scene_date);

    sorted
        .windows(2)
        .map(|w| GranulePair::new(w[0].clone(), w[1].clone()))
        .collect()
}
