use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "D+")]
    DPlus,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 9] = [
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Grade points on the 10-point scale. `gpa` on a record always equals this.
    pub fn gpa(self) -> f64 {
        match self {
            Grade::APlus => 10.0,
            Grade::A => 9.0,
            Grade::BPlus => 8.0,
            Grade::B => 7.0,
            Grade::CPlus => 6.0,
            Grade::C => 5.0,
            Grade::DPlus => 4.0,
            Grade::D => 3.0,
            Grade::F => 0.0,
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(
            self,
            Grade::APlus | Grade::A | Grade::BPlus | Grade::B | Grade::CPlus | Grade::C
        )
    }

    pub fn from_score(score: f64) -> Grade {
        match score {
            s if s >= 90.0 => Grade::APlus,
            s if s >= 85.0 => Grade::A,
            s if s >= 80.0 => Grade::BPlus,
            s if s >= 75.0 => Grade::B,
            s if s >= 70.0 => Grade::CPlus,
            s if s >= 65.0 => Grade::C,
            s if s >= 60.0 => Grade::DPlus,
            s if s >= 55.0 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGradeError(pub String);

impl fmt::Display for ParseGradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown grade: {}", self.0)
    }
}

impl std::error::Error for ParseGradeError {}

impl FromStr for Grade {
    type Err = ParseGradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .into_iter()
            .find(|grade| grade.as_str() == s.trim())
            .ok_or_else(|| ParseGradeError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn between(previous_gpa: f64, cumulative_gpa: f64) -> Trend {
        if cumulative_gpa > previous_gpa {
            Trend::Up
        } else if cumulative_gpa < previous_gpa {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub roll_no: String,
    pub name: String,
    pub course: String,
    pub semester: String,
    pub midterm: f64,
    pub quiz1: f64,
    pub quiz2: f64,
    pub assignment: f64,
    pub total: f64,
    pub trend: Trend,
    pub grade: Grade,
    pub gpa: f64,
    pub attendance: f64,
    #[serde(rename = "previousSemesterGPA")]
    pub previous_semester_gpa: f64,
    #[serde(rename = "cumulativeGPA")]
    pub cumulative_gpa: f64,
    pub t1_marks: f64,
    pub t2_marks: f64,
    pub t3_marks: f64,
    pub ta_marks: f64,
    pub number_of_backlogs: u32,
    pub adherence_to_deadlines: u8,
    pub attendance_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_predicted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub course: Option<String>,
    pub semester: Option<String>,
    pub midterm: Option<f64>,
    pub quiz1: Option<f64>,
    pub quiz2: Option<f64>,
    pub assignment: Option<f64>,
    pub total: Option<f64>,
    pub trend: Option<Trend>,
    pub grade: Option<Grade>,
    pub attendance: Option<f64>,
    pub previous_semester_gpa: Option<f64>,
    pub cumulative_gpa: Option<f64>,
    pub t1_marks: Option<f64>,
    pub t2_marks: Option<f64>,
    pub t3_marks: Option<f64>,
    pub ta_marks: Option<f64>,
    pub number_of_backlogs: Option<u32>,
    pub adherence_to_deadlines: Option<u8>,
    pub attendance_percentage: Option<f64>,
    pub last_predicted_at: Option<DateTime<Utc>>,
}

impl StudentRecord {
    pub fn apply(&mut self, patch: StudentPatch) {
        fn merge<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        merge(&mut self.name, patch.name);
        merge(&mut self.course, patch.course);
        merge(&mut self.semester, patch.semester);
        merge(&mut self.midterm, patch.midterm);
        merge(&mut self.quiz1, patch.quiz1);
        merge(&mut self.quiz2, patch.quiz2);
        merge(&mut self.assignment, patch.assignment);
        merge(&mut self.total, patch.total);
        merge(&mut self.trend, patch.trend);
        merge(&mut self.grade, patch.grade);
        merge(&mut self.attendance, patch.attendance);
        merge(&mut self.previous_semester_gpa, patch.previous_semester_gpa);
        merge(&mut self.cumulative_gpa, patch.cumulative_gpa);
        merge(&mut self.t1_marks, patch.t1_marks);
        merge(&mut self.t2_marks, patch.t2_marks);
        merge(&mut self.t3_marks, patch.t3_marks);
        merge(&mut self.ta_marks, patch.ta_marks);
        merge(&mut self.number_of_backlogs, patch.number_of_backlogs);
        merge(&mut self.adherence_to_deadlines, patch.adherence_to_deadlines);
        merge(&mut self.attendance_percentage, patch.attendance_percentage);
        if patch.last_predicted_at.is_some() {
            self.last_predicted_at = patch.last_predicted_at;
        }
        self.gpa = self.grade.gpa();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeBucket {
    pub grade: Grade,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub total_students: usize,
    pub class_average: f64,
    pub pass_rate: u32,
    pub attendance_average: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_grade: Grade,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_probabilities: Option<BTreeMap<Grade, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendKind {
    Rising,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningTrend {
    #[serde(rename = "type")]
    pub kind: TrendKind,
    pub description: String,
    pub color: &'static str,
    pub icon: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_parse_from_their_labels() {
        for grade in Grade::ALL {
            assert_eq!(grade.as_str().parse::<Grade>(), Ok(grade));
        }
        assert!("E".parse::<Grade>().is_err());
    }

    #[test]
    fn score_thresholds_are_inclusive() {
        assert_eq!(Grade::from_score(90.0), Grade::APlus);
        assert_eq!(Grade::from_score(89.99), Grade::A);
        assert_eq!(Grade::from_score(55.0), Grade::D);
        assert_eq!(Grade::from_score(54.99), Grade::F);
        assert_eq!(Grade::from_score(-20.0), Grade::F);
    }

    #[test]
    fn pass_grades_stop_at_c() {
        let passing: Vec<Grade> = Grade::ALL.into_iter().filter(|g| g.is_pass()).collect();
        assert_eq!(passing.last(), Some(&Grade::C));
        assert_eq!(passing.len(), 6);
    }

    #[test]
    fn patch_with_grade_rederives_gpa() {
        let mut record = StudentRecord {
            id: "x".to_string(),
            roll_no: "1".to_string(),
            name: "Test".to_string(),
            course: "CSE201".to_string(),
            semester: "Fall 2024".to_string(),
            midterm: 0.0,
            quiz1: 0.0,
            quiz2: 0.0,
            assignment: 0.0,
            total: 0.0,
            trend: Trend::Stable,
            grade: Grade::F,
            gpa: 0.0,
            attendance: 0.0,
            previous_semester_gpa: 0.0,
            cumulative_gpa: 0.0,
            t1_marks: 0.0,
            t2_marks: 0.0,
            t3_marks: 0.0,
            ta_marks: 0.0,
            number_of_backlogs: 0,
            adherence_to_deadlines: 3,
            attendance_percentage: 0.0,
            last_predicted_at: None,
        };

        record.apply(StudentPatch {
            grade: Some(Grade::BPlus),
            attendance: Some(77.0),
            ..StudentPatch::default()
        });

        assert_eq!(record.grade, Grade::BPlus);
        assert_eq!(record.gpa, 8.0);
        assert_eq!(record.attendance, 77.0);
        assert_eq!(record.name, "Test");
    }

    #[test]
    fn trend_direction_compares_gpas() {
        assert_eq!(Trend::between(7.0, 7.5), Trend::Up);
        assert_eq!(Trend::between(7.5, 7.0), Trend::Down);
        assert_eq!(Trend::between(7.0, 7.0), Trend::Stable);
    }
}
