//! Feature extraction from raw pointer telemetry
//!
//! Same derivation the slider widget performs client-side, so the service
//! can accept raw events and score them without trusting client math.

use std::f64::consts::PI;

use crate::error::ValidationError;
use crate::types::{Feature, FeatureVector, InteractionSession, PointerEventKind};
use crate::{DIRECTION_BINS, IDLE_GAP_THRESHOLD_MS, MIN_MOVE_EVENTS, TIMING_BINS};

/// Derive a feature vector from one interaction session
pub fn extract_features(session: &InteractionSession) -> Result<FeatureVector, ValidationError> {
    let moves: Vec<_> = session
        .events
        .iter()
        .filter(|e| e.kind == PointerEventKind::Move && e.t_ms.is_finite())
        .collect();
    if moves.len() < MIN_MOVE_EVENTS {
        return Err(ValidationError::InsufficientTelemetry {
            moves: moves.len(),
            required: MIN_MOVE_EVENTS,
        });
    }

    let shown = session.widget_shown_at_ms.unwrap_or(0.0);
    let started = session.interaction_started_at_ms.unwrap_or(0.0);
    let ended = session.interaction_ended_at_ms.unwrap_or(0.0);
    let click_delay = safe_divide(started - shown, 1000.0);
    let task_completion_time = safe_divide(ended - started, 1000.0);

    let mut total_distance = 0.0;
    let mut total_time_ms = 0.0;
    let mut speeds = Vec::new();
    let mut dts = Vec::new();
    let mut dxs = Vec::new();
    let mut dys = Vec::new();
    let mut angles = Vec::new();

    for pair in moves.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dt_ms = b.t_ms - a.t_ms;
        if !dt_ms.is_finite() || dt_ms <= 0.0 {
            continue;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let dist = dx.hypot(dy);

        total_distance += dist;
        total_time_ms += dt_ms;
        speeds.push(dist / (dt_ms / 1000.0));
        dts.push(dt_ms);
        dxs.push(dx);
        dys.push(dy);
        angles.push(dy.atan2(dx));
    }

    let avg_mouse_speed = safe_divide(total_distance, total_time_ms / 1000.0);

    let idle_ms: f64 = moves
        .windows(2)
        .map(|p| p[1].t_ms - p[0].t_ms)
        .filter(|dt| *dt > IDLE_GAP_THRESHOLD_MS)
        .sum();
    let idle_time = idle_ms / 1000.0;

    let mut direction_counts = vec![0usize; DIRECTION_BINS];
    for a in &angles {
        let normalized = (a + PI) / (2.0 * PI);
        direction_counts[bin_index(normalized, DIRECTION_BINS)] += 1;
    }
    let mouse_path_entropy = normalized_entropy(&direction_counts);

    let micro_jitter_variance = variance(&dxs) + variance(&dys);

    let accelerations: Vec<f64> = (1..speeds.len())
        .filter_map(|i| {
            let dt_s = dts[i] / 1000.0;
            (dt_s > 0.0).then(|| ((speeds[i] - speeds[i - 1]) / dt_s).abs())
        })
        .collect();
    let acceleration_curve = mean(&accelerations);

    let curvatures: Vec<f64> = (1..angles.len())
        .filter_map(|i| {
            let da = angles[i] - angles[i - 1];
            let wrapped = da.sin().atan2(da.cos());
            let seg_len = dxs[i].hypot(dys[i]);
            (seg_len > 0.0).then(|| wrapped.abs() / seg_len)
        })
        .collect();
    let curvature_variance = variance(&curvatures);

    let (forward, backward) = dxs.iter().fold((0.0_f64, 0.0_f64), |(f, b), dx| {
        if *dx >= 0.0 {
            (f + *dx, b)
        } else {
            (f, b + dx.abs())
        }
    });
    let overshoot_correction_ratio = safe_divide(backward, forward);

    let timing_entropy = timing_entropy(&dts);

    // Extreme coordinates can overflow the derived terms; those read as 0.0
    let derived = [
        (Feature::AvgMouseSpeed, avg_mouse_speed),
        (Feature::MousePathEntropy, mouse_path_entropy),
        (Feature::ClickDelay, click_delay),
        (Feature::TaskCompletionTime, task_completion_time),
        (Feature::IdleTime, idle_time),
        (Feature::MicroJitterVariance, micro_jitter_variance),
        (Feature::AccelerationCurve, acceleration_curve),
        (Feature::CurvatureVariance, curvature_variance),
        (Feature::OvershootCorrectionRatio, overshoot_correction_ratio),
        (Feature::TimingEntropy, timing_entropy),
    ];
    FeatureVector::from_pairs(derived.map(|(f, v)| (f, if v.is_finite() { v } else { 0.0 })))
}

fn timing_entropy(dts: &[f64]) -> f64 {
    if dts.is_empty() {
        return 0.0;
    }
    let min = dts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = dts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let mut counts = vec![0usize; TIMING_BINS];
    for dt in dts {
        let normalized = if range > 0.0 { (dt - min) / range } else { 0.0 };
        counts[bin_index(normalized, TIMING_BINS)] += 1;
    }
    normalized_entropy(&counts)
}

fn bin_index(normalized: f64, bins: usize) -> usize {
    let idx = (normalized * bins as f64).floor();
    if idx.is_nan() || idx < 0.0 {
        0
    } else {
        (idx as usize).min(bins - 1)
    }
}

/// Shannon entropy in bits, divided by log2(bins)
fn normalized_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 || counts.len() <= 1 {
        return 0.0;
    }
    let bits: f64 = counts
        .iter()
        .filter(|c| **c > 0)
        .map(|c| {
            let p = *c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    safe_divide(bits, (counts.len() as f64).log2())
}

fn safe_divide(n: f64, d: f64) -> f64 {
    if !n.is_finite() || !d.is_finite() || d == 0.0 {
        0.0
    } else {
        n / d
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1)
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}
