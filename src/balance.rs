// src/balance.rs
//
// Inverse-frequency balancing weights over the acceleration channel.
//
// Driving data is dominated by straight, coasting segments; rare regions of
// the action distribution (hard braking, sharp acceleration) would be
// drowned out by a uniform sampling loss. Each sample gets a weight
// inversely proportional to the occupancy of its acceleration bin so those
// regions pull their weight during training.

use crate::action::ModelAction;

/// Index of the acceleration channel inside a model-space action row.
const ACCEL_CHANNEL: usize = 1;

/// Compute one balancing weight per action row.
///
/// The observed acceleration range is split into `bins` equal-width bins;
/// each sample's weight is `n / (occupied * count(bin))`, which averages to
/// 1.0 over the occupied bins while keeping weights inversely proportional
/// to bin occupancy. Only populated bins are ever assigned, so no
/// divide-by-zero can occur.
///
/// Deterministic for identical input order. Bin edges derive purely from
/// the data's min/max: appending new data shifts the edges, so any weights
/// computed before an append are invalid and must be recomputed over the
/// full stream.
pub fn balancing_weights(actions: &[ModelAction], bins: usize) -> Vec<f32> {
    debug_assert!(bins > 0, "bin count is validated by Config");
    if actions.is_empty() {
        return Vec::new();
    }

    let accels: Vec<f64> = actions.iter().map(|a| a[ACCEL_CHANNEL] as f64).collect();
    let min = accels.iter().copied().fold(f64::INFINITY, f64::min);
    let max = accels.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // Degenerate range: every sample shares one bin and carries unit weight.
    if !(max > min) {
        return vec![1.0; actions.len()];
    }

    let width = (max - min) / bins as f64;
    let bin_of = |v: f64| -> usize {
        // The maximum value lands exactly on the upper edge; fold it into
        // the last bin.
        (((v - min) / width) as usize).min(bins - 1)
    };

    let mut counts = vec![0_usize; bins];
    for &a in &accels {
        counts[bin_of(a)] += 1;
    }
    let occupied = counts.iter().filter(|&&c| c > 0).count();

    let n = actions.len() as f64;
    accels
        .iter()
        .map(|&a| (n / (occupied as f64 * counts[bin_of(a)] as f64)) as f32)
        .collect()
}
