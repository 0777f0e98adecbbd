use crate::form::PredictionFormData;
use crate::models::{LearningTrend, TrendKind};

pub fn analyze_learning_trend(form: &PredictionFormData) -> LearningTrend {
    let values = form.values();
    classify(values.previous_gpa, values.cumulative_gpa)
}

pub fn classify(previous_gpa: f64, cumulative_gpa: f64) -> LearningTrend {
    let delta = cumulative_gpa - previous_gpa;

    if delta > 0.5 {
        LearningTrend {
            kind: TrendKind::Rising,
            description: format!(
                "Strong upward trend: GPA improved by {} points",
                to_fixed(delta, 2)
            ),
            color: "green",
            icon: "trending-up",
        }
    } else if delta > 0.1 {
        LearningTrend {
            kind: TrendKind::Rising,
            description: format!(
                "Gradual improvement: GPA increased by {} points",
                to_fixed(delta, 2)
            ),
            color: "green",
            icon: "bar-chart",
        }
    } else if delta < -0.5 {
        LearningTrend {
            kind: TrendKind::Declining,
            description: format!(
                "Concerning decline: GPA dropped by {} points",
                to_fixed(delta.abs(), 2)
            ),
            color: "red",
            icon: "trending-down",
        }
    } else if delta < -0.1 {
        LearningTrend {
            kind: TrendKind::Declining,
            description: format!(
                "Slight decline: GPA decreased by {} points",
                to_fixed(delta.abs(), 2)
            ),
            color: "orange",
            icon: "bar-chart",
        }
    } else {
        LearningTrend {
            kind: TrendKind::Stable,
            description: format!(
                "Consistent performance: GPA maintained around {}",
                to_fixed(cumulative_gpa, 2)
            ),
            color: "blue",
            icon: "bar-chart",
        }
    }
}

/// Fixed-point text where an exact tie rounds away from zero instead of to even.
fn to_fixed(value: f64, digits: usize) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    // A tie at `digits` places is exactly an odd multiple of 2^-(digits + 1).
    let halves = magnitude * 2f64.powi(digits as i32 + 1);
    let rounded = if halves.fract() == 0.0 && halves % 2.0 == 1.0 {
        let scale = 10f64.powi(digits as i32);
        (magnitude * scale).ceil() / scale
    } else {
        magnitude
    };
    format!("{sign}{rounded:.digits$}")
}
