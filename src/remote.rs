use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::form::PredictionFormData;
use crate::models::PredictionResult;

#[derive(Debug)]
pub enum PredictError {
    InvalidUrl(String),
    Unreachable { url: String, source: reqwest::Error },
    Rejected { status: u16, message: String },
    InvalidResponse(String),
}

impl PredictError {
    /// Sentence suitable for showing to the person who submitted the form.
    pub fn user_message(&self) -> String {
        match self {
            PredictError::InvalidUrl(url) => {
                format!("The prediction server address {url} is not a valid URL.")
            }
            PredictError::Unreachable { url, .. } => format!(
                "Cannot connect to the prediction server at {url}. Make sure the prediction backend is running."
            ),
            PredictError::Rejected { message, .. } => format!("Prediction error: {message}"),
            PredictError::InvalidResponse(detail) => {
                format!("The prediction server sent an unreadable response: {detail}")
            }
        }
    }
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictError::InvalidUrl(url) => write!(f, "invalid prediction api url: {url}"),
            PredictError::Unreachable { url, source } => {
                write!(f, "prediction api unreachable at {url}: {source}")
            }
            PredictError::Rejected { status, message } => {
                write!(f, "prediction api returned {status}: {message}")
            }
            PredictError::InvalidResponse(detail) => {
                write!(f, "invalid prediction api response: {detail}")
            }
        }
    }
}

impl std::error::Error for PredictError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PredictError::Unreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    #[serde(rename = "previousSemesterGPA")]
    previous_semester_gpa: f64,
    number_of_backlogs: i64,
    #[serde(rename = "cumulativeGPA")]
    cumulative_gpa: f64,
    t1_marks: f64,
    t2_marks: f64,
    t3_marks: f64,
    attendance_percentage: f64,
    ta_marks: f64,
    adherence_to_deadlines: i64,
}

impl From<&PredictionFormData> for PredictRequest {
    fn from(form: &PredictionFormData) -> Self {
        let values = form.values();
        Self {
            previous_semester_gpa: values.previous_gpa,
            number_of_backlogs: values.backlogs,
            cumulative_gpa: values.cumulative_gpa,
            t1_marks: values.t1,
            t2_marks: values.t2,
            t3_marks: values.t3,
            attendance_percentage: values.attendance,
            ta_marks: values.ta,
            adherence_to_deadlines: values.adherence.round() as i64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub possible_grades: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PredictionClient {
    base_url: Url,
    http: Client,
}

impl PredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictError> {
        let base_url =
            Url::parse(base_url).map_err(|_| PredictError::InvalidUrl(base_url.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(PredictError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    #[instrument(name = "remote_predict", skip(self, form), fields(student = %form.student_id))]
    pub async fn predict(&self, form: &PredictionFormData) -> Result<PredictionResult, PredictError> {
        let url = self.endpoint("predict");
        let body = PredictRequest::from(form);
        debug!(?body, "sending prediction request");

        let response = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| PredictError::Unreachable {
                url: url.to_string(),
                source,
            })?;

        let response = Self::check_status(response).await?;
        response
            .json::<PredictionResult>()
            .await
            .map_err(|e| PredictError::InvalidResponse(e.to_string()))
    }

    #[instrument(name = "remote_model_info", skip(self))]
    pub async fn model_info(&self) -> Result<ModelInfo, PredictError> {
        self.get_json("model-info").await
    }

    #[instrument(name = "remote_health", skip(self))]
    pub async fn health(&self) -> Result<HealthStatus, PredictError> {
        self.get_json("health").await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, PredictError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| PredictError::Unreachable {
                url: url.to_string(),
                source,
            })?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PredictError::InvalidResponse(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PredictError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = error_message(status, response.bytes().await.ok().as_deref());
        warn!(status = status.as_u16(), %message, "prediction api rejected request");
        Err(PredictError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }
}

fn error_message(status: StatusCode, body: Option<&[u8]>) -> String {
    match body.map(|bytes| serde_json::from_slice::<ErrorBody>(bytes)) {
        Some(Ok(ErrorBody { error: Some(error) })) if !error.is_empty() => error,
        Some(Ok(_)) => format!("HTTP {}", status.as_u16()),
        _ => "Unknown error".to_string(),
    }
}
