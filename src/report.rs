use std::fmt::Write;

use chrono::NaiveDate;

use crate::db::StudentStore;
use crate::models::{StudentRecord, Trend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendSummary {
    pub trend: Trend,
    pub count: usize,
}

pub fn summarize_by_trend(students: &[StudentRecord]) -> Vec<TrendSummary> {
    let mut map: std::collections::BTreeMap<Trend, usize> = std::collections::BTreeMap::new();

    for student in students {
        *map.entry(student.trend).or_insert(0) += 1;
    }

    let mut summaries: Vec<TrendSummary> = map
        .into_iter()
        .map(|(trend, count)| TrendSummary { trend, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Failing, sliding, or carrying two or more backlogs.
pub fn needs_attention(student: &StudentRecord) -> bool {
    !student.grade.is_pass() || student.trend == Trend::Down || student.number_of_backlogs >= 2
}

pub fn build_course_report(store: &StudentStore, course_id: &str, generated_on: NaiveDate) -> String {
    let students = store.by_course(course_id);
    let stats = store.class_stats(course_id);
    let distribution = store.grade_distribution(course_id);
    let trends = summarize_by_trend(&students);

    let mut output = String::new();
    let course_label = store
        .course(course_id)
        .map(|course| format!("{} ({})", course.name, course.code))
        .unwrap_or_else(|| course_id.to_string());

    let _ = writeln!(output, "# Grade Analytics Report");
    let _ = writeln!(output, "Generated for {} on {}", course_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Summary");

    if students.is_empty() {
        let _ = writeln!(output, "No students enrolled in this course.");
    } else {
        let _ = writeln!(output, "- Students: {}", stats.total_students);
        let _ = writeln!(output, "- Class average GPA: {:.1}", stats.class_average);
        let _ = writeln!(output, "- Pass rate: {}%", stats.pass_rate);
        let _ = writeln!(output, "- Average attendance: {}%", stats.attendance_average);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    for bucket in distribution.iter() {
        let _ = writeln!(
            output,
            "- {}: {} students ({}%)",
            bucket.grade, bucket.count, bucket.percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend Mix");
    if trends.is_empty() {
        let _ = writeln!(output, "No students enrolled in this course.");
    } else {
        for summary in trends.iter() {
            let _ = writeln!(output, "- {}: {} students", summary.trend.as_str(), summary.count);
        }
    }

    let mut ranked = students.clone();
    ranked.sort_by(|a, b| b.gpa.partial_cmp(&a.gpa).unwrap_or(std::cmp::Ordering::Equal));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    if ranked.is_empty() {
        let _ = writeln!(output, "No students enrolled in this course.");
    } else {
        for student in ranked.iter().take(3) {
            let _ = writeln!(
                output,
                "- {} ({}) grade {} GPA {:.1}, attendance {}%",
                student.name, student.roll_no, student.grade, student.gpa, student.attendance
            );
        }
    }

    let mut flagged: Vec<&StudentRecord> = students.iter().filter(|s| needs_attention(s)).collect();
    flagged.sort_by(|a, b| a.gpa.partial_cmp(&b.gpa).unwrap_or(std::cmp::Ordering::Equal));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");
    if flagged.is_empty() {
        let _ = writeln!(output, "No students flagged in this course.");
    } else {
        for student in flagged {
            let _ = writeln!(
                output,
                "- {} ({}) grade {}, trend {}, {} backlogs",
                student.name,
                student.roll_no,
                student.grade,
                student.trend.as_str(),
                student.number_of_backlogs
            );
        }
    }

    let mut recent: Vec<&StudentRecord> = students
        .iter()
        .filter(|s| s.last_predicted_at.is_some())
        .collect();
    recent.sort_by(|a, b| b.last_predicted_at.cmp(&a.last_predicted_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Predictions");
    if recent.is_empty() {
        let _ = writeln!(output, "No predictions recorded for this course.");
    } else {
        for student in recent.iter().take(5) {
            if let Some(at) = student.last_predicted_at {
                let _ = writeln!(
                    output,
                    "- {} ({}) predicted {} at {}",
                    student.name,
                    student.roll_no,
                    student.grade,
                    at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Grade, StudentPatch};
    use chrono::{TimeZone, Utc};

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 4).expect("valid date")
    }

    #[test]
    fn trend_mix_orders_by_count() {
        let store = StudentStore::seeded();
        let summaries = summarize_by_trend(&store.by_course("CSE201"));
        assert_eq!(
            summaries,
            vec![
                TrendSummary { trend: Trend::Up, count: 4 },
                TrendSummary { trend: Trend::Down, count: 3 },
                TrendSummary { trend: Trend::Stable, count: 1 },
            ]
        );
    }

    #[test]
    fn course_report_lists_summary_and_flags() {
        let store = StudentStore::seeded();
        let report = build_course_report(&store, "CSE201", report_date());

        assert!(report.starts_with("# Grade Analytics Report\nGenerated for Data Structures (CSE201) on 2024-11-04"));
        assert!(report.contains("- Class average GPA: 7.9"));
        assert!(report.contains("- Pass rate: 100%"));
        assert!(report.contains("- A+: 2 students (25%)"));
        assert!(report.contains("- F: 0 students (0%)"));
        assert!(report.contains("- Kavya Reddy (22103316) grade A+"));
        assert!(report.contains("- Vikram Kumar (22103315) grade C, trend down, 2 backlogs"));
        assert!(!report.contains("Aditi Jain (22103310) grade A, trend"));
        assert!(report.contains("No predictions recorded for this course."));
    }

    #[test]
    fn empty_course_still_renders() {
        let store = StudentStore::seeded();
        let report = build_course_report(&store, "CSE999", report_date());
        assert!(report.contains("Generated for CSE999 on 2024-11-04"));
        assert!(report.contains("No students enrolled in this course."));
        assert!(report.contains("- A: 0 students (0%)"));
        assert!(report.contains("No students flagged in this course."));
    }

    #[test]
    fn recent_predictions_are_newest_first() {
        let mut store = StudentStore::seeded();
        let earlier = Utc.with_ymd_and_hms(2024, 11, 1, 9, 30, 0).single();
        let later = Utc.with_ymd_and_hms(2024, 11, 3, 14, 5, 0).single();
        store.update(
            "5",
            StudentPatch {
                last_predicted_at: earlier,
                ..StudentPatch::default()
            },
        );
        store.update(
            "8",
            StudentPatch {
                grade: Some(Grade::F),
                last_predicted_at: later,
                ..StudentPatch::default()
            },
        );

        let report = build_course_report(&store, "CSE201", report_date());
        let rahul = report
            .find("- Rahul Verma (22103317) predicted F at 2024-11-03 14:05 UTC")
            .expect("rahul listed");
        let sneha = report
            .find("- Sneha Patel (22103314) predicted B+ at 2024-11-01 09:30 UTC")
            .expect("sneha listed");
        assert!(rahul < sneha);
        assert!(report.contains("- Pass rate: 88%"));
    }
}
