//! Best-energy window search.

use beatcut_models::TimeRange;

use super::AnalysisConfig;

/// Find the window with the highest summed energy.
///
/// Only a strictly greater sum replaces the current best, so ties resolve
/// to the earliest window. A curve shorter than the window yields a segment
/// starting at zero. The end never exceeds the curve length, nor
/// `total_duration` when that is known (> 0).
pub fn best_segment(curve: &[f64], config: &AnalysisConfig, total_duration: f64) -> TimeRange {
    let frame_duration = config.frame_duration();
    let window = config.window_frames();

    let mut best_index = 0;
    let mut best_sum = f64::NEG_INFINITY;
    let mut rolling = 0.0;

    for (i, value) in curve.iter().enumerate() {
        rolling += value;
        if i >= window {
            rolling -= curve[i - window];
        }
        if i + 1 >= window && rolling > best_sum {
            best_sum = rolling;
            best_index = i + 1 - window;
        }
    }

    let start = best_index as f64 * frame_duration;
    let curve_end = curve.len() as f64 * frame_duration;
    let mut end = start + config.window_secs.min(curve_end - start);
    if total_duration > 0.0 {
        end = end.min(total_duration);
    }

    TimeRange::new(start, end.max(start))
}
