//! Clip boundary planning.

use super::ClipSpan;

/// Plan fixed-length clips over a video of `duration` seconds.
///
/// Clips start at `0, L, 2L, ...` strictly below `floor(duration)` and end at
/// `min(start + L, duration)`. Videos shorter than one second yield no clips.
pub fn plan_fixed_clips(duration: f64, clip_seconds: f64) -> Vec<ClipSpan> {
    let mut spans = Vec::new();
    if !duration.is_finite() || clip_seconds <= 0.0 {
        return spans;
    }

    let limit = duration.floor();
    let mut order = 0;
    let mut start = 0.0;

    while start < limit {
        let end = (start + clip_seconds).min(duration);
        spans.push(ClipSpan::new(order, start, end));
        order += 1;
        start = (order as f64) * clip_seconds;
    }

    spans
}

/// Plan clips bounded by scene changes.
///
/// Cut points closer than `min_seconds` to the previous boundary are ignored;
/// scenes longer than `max_seconds` are split into `max_seconds` pieces. A
/// trailing piece shorter than `min_seconds` is merged into the clip before it.
pub fn plan_scene_clips(
    duration: f64,
    cuts: &[f64],
    min_seconds: f64,
    max_seconds: f64,
) -> Vec<ClipSpan> {
    let mut ranges: Vec<(f64, f64)> = Vec::new();
    if !duration.is_finite() || duration < 1.0 || max_seconds <= 0.0 {
        return Vec::new();
    }

    let mut boundaries: Vec<f64> = cuts
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0 && *c < duration)
        .collect();
    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    boundaries.push(duration);

    let mut start = 0.0;
    for boundary in boundaries {
        while boundary - start > max_seconds {
            ranges.push((start, start + max_seconds));
            start += max_seconds;
        }
        if boundary - start >= min_seconds {
            ranges.push((start, boundary));
            start = boundary;
        }
    }

    if duration - start > f64::EPSILON {
        match ranges.last_mut() {
            Some(last) => last.1 = duration,
            None => ranges.push((start, duration)),
        }
    }

    ranges
        .into_iter()
        .enumerate()
        .map(|(i, (s, e))| ClipSpan::new(i as i32, s, e))
        .collect()
}
