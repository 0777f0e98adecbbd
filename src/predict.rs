use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anomaly::detect_input_anomalies;
use crate::db::{round1, StudentStore};
use crate::form::{FormValues, PredictionFormData};
use crate::models::{
    Grade, LearningTrend, PredictionResult, StudentPatch, StudentRecord, Trend,
};
use crate::remote::{PredictError, PredictionClient};
use crate::trend::analyze_learning_trend;

pub const HEURISTIC_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub total_score: f64,
    pub weighted_score: f64,
    pub adjusted_score: f64,
}

/// `adjusted = 0.6·marks + 0.2·attendance + 1.6·cgpa − 5·backlogs + 2·adherence`
pub fn score(values: &FormValues) -> ScoreBreakdown {
    let total_score = values.total_marks();
    let weighted_score =
        total_score * 0.6 + values.attendance * 0.2 + values.cumulative_gpa * 8.0 * 0.2;
    let adjusted_score =
        weighted_score - values.backlogs as f64 * 5.0 + values.adherence * 2.0;

    ScoreBreakdown {
        total_score,
        weighted_score,
        adjusted_score,
    }
}

pub fn heuristic_prediction(values: &FormValues) -> PredictionResult {
    let breakdown = score(values);
    PredictionResult {
        predicted_grade: Grade::from_score(breakdown.adjusted_score),
        confidence: HEURISTIC_CONFIDENCE,
        grade_probabilities: None,
        total_score: Some(breakdown.total_score),
    }
}

#[derive(Debug, Clone)]
pub enum PredictionBackend {
    Heuristic { latency: Duration },
    Remote(PredictionClient),
}

impl PredictionBackend {
    pub fn describe(&self) -> String {
        match self {
            PredictionBackend::Heuristic { latency } => {
                format!("heuristic ({}ms latency)", latency.as_millis())
            }
            PredictionBackend::Remote(client) => format!("remote {}", client.base_url()),
        }
    }

    pub async fn predict(&self, form: &PredictionFormData) -> Result<PredictionResult, PredictError> {
        match self {
            PredictionBackend::Heuristic { latency } => {
                if !latency.is_zero() {
                    tokio::time::sleep(*latency).await;
                }
                Ok(heuristic_prediction(&form.values()))
            }
            PredictionBackend::Remote(client) => client.predict(form).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudentDefaults {
    pub course: String,
    pub semester: String,
}

impl Default for NewStudentDefaults {
    fn default() -> Self {
        Self {
            course: "CSE201".to_string(),
            semester: "Fall 2024".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrediction {
    pub kind: UpsertKind,
    pub record: StudentRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub result: PredictionResult,
    pub anomalies: Vec<String>,
    pub trend: LearningTrend,
    pub stored: Option<StoredPrediction>,
}

pub async fn predict_grade(
    store: &mut StudentStore,
    backend: &PredictionBackend,
    form: &PredictionFormData,
    defaults: &NewStudentDefaults,
) -> Result<PredictionOutcome, PredictError> {
    let anomalies = detect_input_anomalies(form);
    if !anomalies.is_empty() {
        warn!(
            student = %form.student_id,
            count = anomalies.len(),
            "possible data anomalies in submission"
        );
    }
    let trend = analyze_learning_trend(form);

    debug!(backend = %backend.describe(), "requesting prediction");
    let result = backend.predict(form).await?;
    let stored = record_prediction(store, form, result.predicted_grade, defaults);

    Ok(PredictionOutcome {
        result,
        anomalies,
        trend,
        stored,
    })
}

/// Upserts by roll number; an existing record keeps its id.
pub fn record_prediction(
    store: &mut StudentStore,
    form: &PredictionFormData,
    grade: Grade,
    defaults: &NewStudentDefaults,
) -> Option<StoredPrediction> {
    let roll_no = form.student_id.trim();
    if roll_no.is_empty() {
        warn!("submission has no student id, prediction not stored");
        return None;
    }

    let values = form.values();
    let now = Utc::now();
    let trend = Trend::between(values.previous_gpa, values.cumulative_gpa);
    let midterm = round1(values.t3 / 3.5);
    let backlogs = u32::try_from(values.backlogs).unwrap_or(0);
    let adherence = values.adherence.round().clamp(1.0, 5.0) as u8;

    let existing_id = store.by_roll_no(roll_no).map(|student| student.id.clone());
    if let Some(id) = existing_id {
        store.update(
            &id,
            StudentPatch {
                midterm: Some(midterm),
                trend: Some(trend),
                grade: Some(grade),
                attendance: Some(values.attendance),
                previous_semester_gpa: Some(values.previous_gpa),
                cumulative_gpa: Some(values.cumulative_gpa),
                t1_marks: Some(values.t1),
                t2_marks: Some(values.t2),
                t3_marks: Some(values.t3),
                ta_marks: Some(values.ta),
                number_of_backlogs: Some(backlogs),
                adherence_to_deadlines: Some(adherence),
                attendance_percentage: Some(values.attendance),
                last_predicted_at: Some(now),
                ..StudentPatch::default()
            },
        );
        info!(roll_no, %grade, id = %id, "prediction merged into existing record");
        return store.by_id(&id).cloned().map(|record| StoredPrediction {
            kind: UpsertKind::Updated,
            record,
        });
    }

    let quiz1 = round1(values.t1 / 2.0);
    let quiz2 = round1(values.t2 / 2.0);
    let assignment = round1(values.ta / 2.5);
    let record = StudentRecord {
        id: Uuid::new_v4().to_string(),
        roll_no: roll_no.to_string(),
        name: format!("Student {roll_no}"),
        course: defaults.course.clone(),
        semester: defaults.semester.clone(),
        midterm,
        quiz1,
        quiz2,
        assignment,
        total: round1((midterm + quiz1 + quiz2 + assignment) / 4.0),
        trend,
        grade,
        gpa: grade.gpa(),
        attendance: values.attendance,
        previous_semester_gpa: values.previous_gpa,
        cumulative_gpa: values.cumulative_gpa,
        t1_marks: values.t1,
        t2_marks: values.t2,
        t3_marks: values.t3,
        ta_marks: values.ta,
        number_of_backlogs: backlogs,
        adherence_to_deadlines: adherence,
        attendance_percentage: values.attendance,
        last_predicted_at: Some(now),
    };
    store.add(record.clone());
    info!(roll_no, %grade, id = %record.id, "prediction created a new record");

    Some(StoredPrediction {
        kind: UpsertKind::Created,
        record,
    })
}
