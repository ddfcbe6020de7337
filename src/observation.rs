// src/observation.rs
//
// Deterministic per-frame observation transforms.
//
// Two transforms share the same crop geometry:
// - extract_masks: segmentation masks (track markers, drivable surface)
//   derived from the raw frame after the HUD overlay is blanked out.
// - normalize_observation: the model-facing pixel tensor (crop, optional
//   grayscale collapse, channel-first layout, affine normalization).
//
// The dataset stores frames post-crop and pre-normalization and runs
// normalize_observation again at access time, so normalization constants
// can be swapped between ingestion and sampling.

use crate::config::ObservationConfig;
use crate::types::{Frame, MaskTensor, ObsTensor};

/// Mask tensor channel count: marker + drivable surface.
pub const MASK_CHANNELS: usize = 2;

/// Mask channel holding track-marker (chevron) flags.
pub const MASK_MARKER: usize = 0;

/// Mask channel holding drivable-surface flags.
pub const MASK_DRIVABLE: usize = 1;

/// Keep the first `rows` rows of a frame. Frames shorter than the crop are
/// returned unchanged (the stored form is already cropped).
pub fn crop_top(frame: &Frame, rows: usize) -> Frame {
    if frame.height() <= rows {
        return frame.clone();
    }
    let kept = rows * frame.width() * frame.channels();
    Frame::from_raw(
        rows,
        frame.width(),
        frame.channels(),
        frame.data()[..kept].to_vec(),
    )
}

/// Collapse a multi-channel frame to one grayscale channel by averaging.
/// A single-channel frame passes through unchanged.
pub fn collapse_gray(frame: &Frame) -> Frame {
    if frame.channels() == 1 {
        return frame.clone();
    }
    let mut data = Vec::with_capacity(frame.height() * frame.width());
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            data.push(frame.channel_mean(y, x).round() as u8);
        }
    }
    Frame::from_raw(frame.height(), frame.width(), 1, data)
}

/// Extract the 2-channel segmentation mask tensor from one raw frame.
///
/// The frame is cropped to the top region and the HUD overlay rectangle is
/// blanked out (excluded from both masks: the overlay is neither track
/// marking nor road). Per remaining pixel:
/// - channel `MASK_MARKER` is set when the red channel is strictly above the
///   marker threshold;
/// - channel `MASK_DRIVABLE` is set when the channel mean lies within the
///   tolerance band around the neutral gray.
///
/// The two masks are NOT guaranteed disjoint: a bright-red pixel whose
/// channel mean happens to fall in the gray band sets both flags, and
/// downstream consumers must not assume exclusivity.
pub fn extract_masks(frame: &Frame, cfg: &ObservationConfig) -> MaskTensor {
    let cropped = crop_top(frame, cfg.crop_height);
    let mut masks = MaskTensor::zeros(MASK_CHANNELS, cropped.height(), cropped.width());
    let gray = cfg.hud_gray as f64;

    for y in 0..cropped.height() {
        for x in 0..cropped.width() {
            if cfg.hud.contains(y, x) {
                continue;
            }
            if cropped.at(y, x, 0) > cfg.marker_threshold {
                masks.mark(MASK_MARKER, y, x);
            }
            if (cropped.channel_mean(y, x) - gray).abs() < cfg.drivable_tolerance {
                masks.mark(MASK_DRIVABLE, y, x);
            }
        }
    }

    masks
}

/// Batch form of [`extract_masks`].
pub fn extract_masks_batch(frames: &[Frame], cfg: &ObservationConfig) -> Vec<MaskTensor> {
    frames.iter().map(|f| extract_masks(f, cfg)).collect()
}

/// Produce the normalized, channel-first observation tensor for one frame.
///
/// Crops to the top region, collapses to grayscale unless color mode is on,
/// reorders to C×H×W, and applies `(x - mean) / std` per pixel. Total
/// function: a frame already cropped (or collapsed) passes those stages
/// unchanged.
pub fn normalize_observation(frame: &Frame, cfg: &ObservationConfig) -> ObsTensor {
    let cropped = crop_top(frame, cfg.crop_height);
    let reduced = if cfg.use_color {
        cropped
    } else {
        collapse_gray(&cropped)
    };

    let (channels, height, width) = (reduced.channels(), reduced.height(), reduced.width());
    let mut data = Vec::with_capacity(channels * height * width);
    for c in 0..channels {
        for y in 0..height {
            for x in 0..width {
                data.push(cfg.pixel.apply(reduced.at(y, x, c) as f64));
            }
        }
    }
    ObsTensor::from_raw(channels, height, width, data)
}

/// The form a frame is stored in by the dataset: cropped, and collapsed to
/// grayscale when color mode is off. Normalization is deliberately NOT
/// applied here; it happens again on every access.
pub fn storage_frame(frame: &Frame, cfg: &ObservationConfig) -> Frame {
    let cropped = crop_top(frame, cfg.crop_height);
    if cfg.use_color {
        cropped
    } else {
        collapse_gray(&cropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservationConfig;

    /// 96x96x3 test frame: uniform road gray with a red marker block and a
    /// saturated HUD block inside the crop region.
    fn synthetic_frame(cfg: &ObservationConfig) -> Frame {
        let mut frame = Frame::filled(96, 96, 3, cfg.hud_gray);
        // Red chevron block, well inside the crop. Channel mean (220+20+20)/3
        // sits outside the gray band, so the block is marker-only.
        for y in 10..14 {
            for x in 20..24 {
                frame.set(y, x, 0, 220);
                frame.set(y, x, 1, 20);
                frame.set(y, x, 2, 20);
            }
        }
        // Saturated HUD pixels that would read as markers if not blanked.
        for y in cfg.hud.row_min..cfg.hud.row_max {
            for x in cfg.hud.col_min..cfg.hud.col_max {
                frame.set(y, x, 0, 255);
                frame.set(y, x, 1, 255);
                frame.set(y, x, 2, 255);
            }
        }
        frame
    }

    #[test]
    fn test_mask_shape_and_hud_blanking() {
        let cfg = ObservationConfig::default();
        let frame = synthetic_frame(&cfg);
        let masks = extract_masks(&frame, &cfg);
        assert_eq!(masks.shape(), (2, 84, 96));

        // Marker block is flagged as marker, not drivable.
        assert!(masks.at(MASK_MARKER, 11, 21));
        assert!(!masks.at(MASK_DRIVABLE, 11, 21));

        // Road pixels are drivable, not marker.
        assert!(masks.at(MASK_DRIVABLE, 30, 30));
        assert!(!masks.at(MASK_MARKER, 30, 30));

        // Everything inside the blanked HUD rectangle reads false on both
        // channels, even though the raw pixels were saturated.
        for y in cfg.hud.row_min..cfg.hud.row_max {
            for x in cfg.hud.col_min..cfg.hud.col_max {
                assert!(!masks.at(MASK_MARKER, y, x));
                assert!(!masks.at(MASK_DRIVABLE, y, x));
            }
        }
    }

    #[test]
    fn test_masks_may_overlap_outside_hud() {
        let cfg = ObservationConfig::default();
        let mut frame = Frame::filled(96, 96, 3, cfg.hud_gray);
        // Red channel above the marker threshold, but channel mean still in
        // the gray band: (160 + 90 + 70) / 3 = ~106.7.
        frame.set(5, 5, 0, 160);
        frame.set(5, 5, 1, 90);
        frame.set(5, 5, 2, 70);
        let masks = extract_masks(&frame, &cfg);
        assert!(masks.at(MASK_MARKER, 5, 5));
        assert!(masks.at(MASK_DRIVABLE, 5, 5));
    }

    #[test]
    fn test_normalize_observation_grayscale() {
        let cfg = ObservationConfig::default();
        let frame = Frame::filled(96, 96, 3, cfg.hud_gray);
        let obs = normalize_observation(&frame, &cfg);
        assert_eq!(obs.shape(), (1, 84, 96));
        // Pixels equal to the mean normalize to ~0.
        assert!(obs.at(0, 40, 40).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_observation_color() {
        let cfg = ObservationConfig {
            use_color: true,
            ..ObservationConfig::default()
        };
        let mut frame = Frame::filled(96, 96, 3, 105);
        frame.set(0, 0, 2, 165);
        let obs = normalize_observation(&frame, &cfg);
        assert_eq!(obs.shape(), (3, 84, 96));
        // (165 - 105) / 60 = 1.0 on the blue channel.
        assert!((obs.at(2, 0, 0) - 1.0).abs() < 1e-6);
        assert!(obs.at(0, 0, 0).abs() < 1e-6);
    }

    #[test]
    fn test_storage_frame_round_trips_through_normalize() {
        // Normalizing the stored (already cropped + collapsed) frame must
        // match normalizing the raw frame directly.
        let cfg = ObservationConfig::default();
        let frame = synthetic_frame(&cfg);
        let direct = normalize_observation(&frame, &cfg);
        let stored = storage_frame(&frame, &cfg);
        let via_storage = normalize_observation(&stored, &cfg);
        assert_eq!(direct, via_storage);
    }

    #[test]
    fn test_crop_is_identity_on_short_frames() {
        let frame = Frame::filled(50, 96, 3, 10);
        let cropped = crop_top(&frame, 84);
        assert_eq!(cropped, frame);
    }
}
