use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

const DEFAULT_ADHERENCE: f64 = 3.0;
const ADHERENCE_RANGE: (f64, f64) = (1.0, 5.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFormData {
    #[serde(default, deserialize_with = "lenient_text")]
    pub student_id: String,
    #[serde(rename = "previousSemesterGPA", default, deserialize_with = "lenient_text")]
    pub previous_semester_gpa: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub number_of_backlogs: String,
    #[serde(rename = "cumulativeGPA", default, deserialize_with = "lenient_text")]
    pub cumulative_gpa: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub t1_marks: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub t2_marks: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub t3_marks: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub attendance_percentage: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ta_marks: String,
    #[serde(default = "default_slider", deserialize_with = "slider_values")]
    pub adherence_to_deadlines: Vec<f64>,
}

impl Default for PredictionFormData {
    fn default() -> Self {
        Self {
            student_id: String::new(),
            previous_semester_gpa: String::new(),
            number_of_backlogs: String::new(),
            cumulative_gpa: String::new(),
            t1_marks: String::new(),
            t2_marks: String::new(),
            t3_marks: String::new(),
            attendance_percentage: String::new(),
            ta_marks: String::new(),
            adherence_to_deadlines: default_slider(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    StudentId,
    PreviousSemesterGpa,
    NumberOfBacklogs,
    CumulativeGpa,
    T1Marks,
    T2Marks,
    T3Marks,
    AttendancePercentage,
    TaMarks,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::StudentId => "studentId",
            FormField::PreviousSemesterGpa => "previousSemesterGPA",
            FormField::NumberOfBacklogs => "numberOfBacklogs",
            FormField::CumulativeGpa => "cumulativeGPA",
            FormField::T1Marks => "t1Marks",
            FormField::T2Marks => "t2Marks",
            FormField::T3Marks => "t3Marks",
            FormField::AttendancePercentage => "attendancePercentage",
            FormField::TaMarks => "taMarks",
        }
    }

    fn max(self) -> Option<f64> {
        match self {
            FormField::StudentId | FormField::NumberOfBacklogs => None,
            FormField::T1Marks | FormField::T2Marks => Some(20.0),
            FormField::T3Marks => Some(35.0),
            FormField::TaMarks => Some(25.0),
            FormField::AttendancePercentage => Some(100.0),
            FormField::PreviousSemesterGpa | FormField::CumulativeGpa => Some(10.0),
        }
    }

    fn is_numeric(self) -> bool {
        !matches!(self, FormField::StudentId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValidation {
    Accepted,
    Clamped { limit: f64 },
    NotNumeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    AdherenceOutOfRange(u8),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::AdherenceOutOfRange(value) => {
                write!(f, "adherence to deadlines must be between 1 and 5, got {value}")
            }
        }
    }
}

impl std::error::Error for FormError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormValues {
    pub previous_gpa: f64,
    pub cumulative_gpa: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub ta: f64,
    pub attendance: f64,
    pub backlogs: i64,
    pub adherence: f64,
}

impl FormValues {
    pub fn total_marks(&self) -> f64 {
        self.t1 + self.t2 + self.t3 + self.ta
    }
}

impl PredictionFormData {
    pub fn set(&mut self, field: FormField, raw: &str) -> FieldValidation {
        let mut stored = raw.to_string();
        let mut validation = FieldValidation::Accepted;

        if field.is_numeric() {
            match parse_strict(raw) {
                Some(number) => {
                    if let Some(max) = field.max() {
                        if number > max {
                            stored = max.to_string();
                            validation = FieldValidation::Clamped { limit: max };
                        }
                    }
                    if number < 0.0 {
                        stored = "0".to_string();
                        validation = FieldValidation::Clamped { limit: 0.0 };
                    }
                }
                None => validation = FieldValidation::NotNumeric,
            }
        }

        *self.slot_mut(field) = stored;
        validation
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::StudentId => &self.student_id,
            FormField::PreviousSemesterGpa => &self.previous_semester_gpa,
            FormField::NumberOfBacklogs => &self.number_of_backlogs,
            FormField::CumulativeGpa => &self.cumulative_gpa,
            FormField::T1Marks => &self.t1_marks,
            FormField::T2Marks => &self.t2_marks,
            FormField::T3Marks => &self.t3_marks,
            FormField::AttendancePercentage => &self.attendance_percentage,
            FormField::TaMarks => &self.ta_marks,
        }
    }

    pub fn set_adherence(&mut self, value: u8) -> Result<(), FormError> {
        if !(1..=5).contains(&value) {
            return Err(FormError::AdherenceOutOfRange(value));
        }
        self.adherence_to_deadlines = vec![f64::from(value)];
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        FIELDS
            .iter()
            .all(|field| !self.get(*field).trim().is_empty())
    }

    /// Re-runs every field through `set`, returning the ones not accepted as given.
    pub fn revalidate(&mut self) -> Vec<(FormField, String, FieldValidation)> {
        let mut rejected = Vec::new();
        for field in FIELDS {
            let raw = self.get(field).to_string();
            let validation = self.set(field, &raw);
            if validation != FieldValidation::Accepted {
                rejected.push((field, raw, validation));
            }
        }
        rejected
    }

    pub fn clamp_adherence(&mut self) -> Option<f64> {
        let current = self.adherence();
        let (low, high) = ADHERENCE_RANGE;
        let clamped = current.clamp(low, high);
        if clamped == current {
            return None;
        }
        self.adherence_to_deadlines = vec![clamped];
        Some(current)
    }

    pub fn adherence(&self) -> f64 {
        self.adherence_to_deadlines
            .first()
            .copied()
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_ADHERENCE)
    }

    pub fn values(&self) -> FormValues {
        FormValues {
            previous_gpa: parse_float_prefix(&self.previous_semester_gpa),
            cumulative_gpa: parse_float_prefix(&self.cumulative_gpa),
            t1: parse_float_prefix(&self.t1_marks),
            t2: parse_float_prefix(&self.t2_marks),
            t3: parse_float_prefix(&self.t3_marks),
            ta: parse_float_prefix(&self.ta_marks),
            attendance: parse_float_prefix(&self.attendance_percentage),
            backlogs: parse_int_prefix(&self.number_of_backlogs),
            adherence: self.adherence(),
        }
    }

    fn slot_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::StudentId => &mut self.student_id,
            FormField::PreviousSemesterGpa => &mut self.previous_semester_gpa,
            FormField::NumberOfBacklogs => &mut self.number_of_backlogs,
            FormField::CumulativeGpa => &mut self.cumulative_gpa,
            FormField::T1Marks => &mut self.t1_marks,
            FormField::T2Marks => &mut self.t2_marks,
            FormField::T3Marks => &mut self.t3_marks,
            FormField::AttendancePercentage => &mut self.attendance_percentage,
            FormField::TaMarks => &mut self.ta_marks,
        }
    }
}

pub const FIELDS: [FormField; 9] = [
    FormField::StudentId,
    FormField::PreviousSemesterGpa,
    FormField::NumberOfBacklogs,
    FormField::CumulativeGpa,
    FormField::T1Marks,
    FormField::T2Marks,
    FormField::T3Marks,
    FormField::AttendancePercentage,
    FormField::TaMarks,
];

// Empty input counts as 0.
fn parse_strict(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_float_prefix(raw: &str) -> f64 {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value != 0.0)
        .unwrap_or(0.0)
}

pub fn parse_int_prefix(raw: &str) -> i64 {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }
    text[..end].parse::<i64>().unwrap_or(0)
}

fn default_slider() -> Vec<f64> {
    vec![DEFAULT_ADHERENCE]
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Other(IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
        Raw::Other(_) => String::new(),
    })
}

fn slider_values<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Slider(Vec<f64>),
        Single(f64),
        Other(IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Slider(values) => values,
        Raw::Single(value) => vec![value],
        Raw::Other(_) => default_slider(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_prefix_matches_lenient_reading() {
        assert_eq!(parse_float_prefix("12.5"), 12.5);
        assert_eq!(parse_float_prefix("  18abc"), 18.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert_eq!(parse_float_prefix("-3.25x"), -3.25);
        assert_eq!(parse_float_prefix("1e2"), 100.0);
        assert_eq!(parse_float_prefix("7e"), 7.0);
        assert_eq!(parse_float_prefix("abc"), 0.0);
        assert_eq!(parse_float_prefix(""), 0.0);
        assert_eq!(parse_float_prefix("-"), 0.0);
    }

    #[test]
    fn int_prefix_truncates_at_first_non_digit() {
        assert_eq!(parse_int_prefix("2.7"), 2);
        assert_eq!(parse_int_prefix(" 3 backlogs"), 3);
        assert_eq!(parse_int_prefix("-1"), -1);
        assert_eq!(parse_int_prefix("none"), 0);
    }

    #[test]
    fn setters_clamp_to_field_limits() {
        let mut form = PredictionFormData::default();
        assert_eq!(
            form.set(FormField::T1Marks, "27"),
            FieldValidation::Clamped { limit: 20.0 }
        );
        assert_eq!(form.t1_marks, "20");
        assert_eq!(
            form.set(FormField::T3Marks, "-4"),
            FieldValidation::Clamped { limit: 0.0 }
        );
        assert_eq!(form.t3_marks, "0");
        assert_eq!(
            form.set(FormField::CumulativeGpa, "11.2"),
            FieldValidation::Clamped { limit: 10.0 }
        );
        assert_eq!(form.cumulative_gpa, "10");
        assert_eq!(form.set(FormField::TaMarks, "24.5"), FieldValidation::Accepted);
        assert_eq!(form.ta_marks, "24.5");
    }

    #[test]
    fn backlogs_have_no_upper_bound() {
        let mut form = PredictionFormData::default();
        assert_eq!(form.set(FormField::NumberOfBacklogs, "12"), FieldValidation::Accepted);
        assert_eq!(form.number_of_backlogs, "12");
        assert_eq!(
            form.set(FormField::NumberOfBacklogs, "-2"),
            FieldValidation::Clamped { limit: 0.0 }
        );
    }

    #[test]
    fn non_numeric_text_is_kept_and_reads_as_zero() {
        let mut form = PredictionFormData::default();
        assert_eq!(form.set(FormField::T2Marks, "abc"), FieldValidation::NotNumeric);
        assert_eq!(form.t2_marks, "abc");
        assert_eq!(form.values().t2, 0.0);
    }

    #[test]
    fn student_id_is_free_text() {
        let mut form = PredictionFormData::default();
        assert_eq!(form.set(FormField::StudentId, "22103310"), FieldValidation::Accepted);
        assert_eq!(form.set(FormField::StudentId, "CSE-99"), FieldValidation::Accepted);
        assert_eq!(form.student_id, "CSE-99");
    }

    #[test]
    fn adherence_must_be_on_the_slider() {
        let mut form = PredictionFormData::default();
        assert_eq!(form.adherence(), 3.0);
        assert!(form.set_adherence(5).is_ok());
        assert_eq!(form.adherence(), 5.0);
        assert_eq!(form.set_adherence(0), Err(FormError::AdherenceOutOfRange(0)));
        assert_eq!(form.set_adherence(6), Err(FormError::AdherenceOutOfRange(6)));
        assert_eq!(form.adherence(), 5.0);
    }

    #[test]
    fn empty_slider_falls_back_to_three() {
        let form = PredictionFormData {
            adherence_to_deadlines: Vec::new(),
            ..PredictionFormData::default()
        };
        assert_eq!(form.values().adherence, 3.0);
    }

    #[test]
    fn completeness_ignores_the_slider() {
        let mut form = PredictionFormData::default();
        assert!(!form.is_complete());
        for field in FIELDS {
            form.set(field, "1");
        }
        assert!(form.is_complete());
    }

    #[test]
    fn json_accepts_strings_numbers_and_bare_adherence() {
        let form: PredictionFormData = serde_json::from_str(
            r#"{
                "studentId": "22103310",
                "previousSemesterGPA": "7.8",
                "cumulativeGPA": 8.4,
                "t1Marks": 19,
                "numberOfBacklogs": null,
                "adherenceToDeadlines": 4
            }"#,
        )
        .expect("form json");

        assert_eq!(form.cumulative_gpa, "8.4");
        assert_eq!(form.t1_marks, "19");
        assert_eq!(form.number_of_backlogs, "");
        assert_eq!(form.t2_marks, "");
        assert_eq!(form.adherence_to_deadlines, vec![4.0]);

        let values = form.values();
        assert_eq!(values.previous_gpa, 7.8);
        assert_eq!(values.cumulative_gpa, 8.4);
        assert_eq!(values.backlogs, 0);
    }

    #[test]
    fn json_forms_are_clamped_like_typed_ones() {
        let mut form: PredictionFormData = serde_json::from_str(
            r#"{
                "studentId": "22103399",
                "t1Marks": "500",
                "t2Marks": "-3",
                "t3Marks": "abc",
                "cumulativeGPA": 8.4,
                "adherenceToDeadlines": [9]
            }"#,
        )
        .expect("form json");

        let rejected = form.revalidate();
        assert_eq!(
            rejected,
            vec![
                (FormField::T1Marks, "500".to_string(), FieldValidation::Clamped { limit: 20.0 }),
                (FormField::T2Marks, "-3".to_string(), FieldValidation::Clamped { limit: 0.0 }),
                (FormField::T3Marks, "abc".to_string(), FieldValidation::NotNumeric),
            ]
        );
        assert_eq!(form.clamp_adherence(), Some(9.0));

        let values = form.values();
        assert_eq!(values.t1, 20.0);
        assert_eq!(values.t2, 0.0);
        assert_eq!(values.t3, 0.0);
        assert_eq!(values.cumulative_gpa, 8.4);
        assert_eq!(values.adherence, 5.0);
        assert_eq!(form.student_id, "22103399");
    }

    #[test]
    fn in_range_slider_is_left_alone() {
        let mut form = PredictionFormData::default();
        assert_eq!(form.clamp_adherence(), None);
        assert_eq!(form.adherence_to_deadlines, vec![3.0]);

        form.adherence_to_deadlines = vec![0.0];
        assert_eq!(form.clamp_adherence(), Some(0.0));
        assert_eq!(form.adherence(), 1.0);
    }

    #[test]
    fn json_slider_sequence_and_garbage() {
        let form: PredictionFormData =
            serde_json::from_str(r#"{"adherenceToDeadlines": [2]}"#).expect("slider");
        assert_eq!(form.adherence(), 2.0);

        let form: PredictionFormData =
            serde_json::from_str(r#"{"adherenceToDeadlines": "often"}"#).expect("garbage");
        assert_eq!(form.adherence(), 3.0);
    }
}
