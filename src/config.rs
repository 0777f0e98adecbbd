use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::{debug, warn};

use crate::db::StudentStore;
use crate::predict::{NewStudentDefaults, PredictionBackend};
use crate::remote::PredictionClient;

/// Options shared by every subcommand. Each can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the grade model service; the local heuristic is used when unset
    #[arg(long, global = true, env = "GRADE_API_URL")]
    pub api_url: Option<String>,
    /// Request timeout for the grade model service
    #[arg(long, global = true, env = "GRADE_API_TIMEOUT_SECS", default_value_t = 15)]
    pub api_timeout_secs: u64,
    /// Simulated round-trip delay of the local heuristic
    #[arg(long, global = true, env = "GRADE_PREDICT_LATENCY_MS", default_value_t = 1500)]
    pub latency_ms: u64,
    /// Roster CSV to load instead of the built-in demo class
    #[arg(long, global = true, env = "GRADE_ROSTER")]
    pub roster: Option<PathBuf>,
    /// Course assigned to students first seen through a prediction
    #[arg(long, global = true, env = "GRADE_DEFAULT_COURSE", default_value = "CSE201")]
    pub default_course: String,
    /// Semester assigned to students first seen through a prediction
    #[arg(long, global = true, env = "GRADE_DEFAULT_SEMESTER", default_value = "Fall 2024")]
    pub default_semester: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "GRADE_LOG_JSON")]
    pub log_json: bool,
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

impl Settings {
    pub fn load_store(&self) -> anyhow::Result<StudentStore> {
        match &self.roster {
            Some(path) => {
                let mut store = StudentStore::new();
                store
                    .import_csv(path)
                    .with_context(|| format!("failed to load roster {}", path.display()))?;
                if store.is_empty() {
                    warn!(path = %path.display(), "roster has no students");
                }
                debug!(students = store.len(), "student store ready");
                Ok(store)
            }
            None => Ok(StudentStore::seeded()),
        }
    }

    pub fn backend(&self) -> anyhow::Result<PredictionBackend> {
        match &self.api_url {
            Some(url) => Ok(PredictionBackend::Remote(self.client(url)?)),
            None => Ok(PredictionBackend::Heuristic {
                latency: Duration::from_millis(self.latency_ms),
            }),
        }
    }

    pub fn require_client(&self) -> anyhow::Result<PredictionClient> {
        let url = self
            .api_url
            .as_deref()
            .context("--api-url or GRADE_API_URL must point at the grade model service")?;
        self.client(url)
    }

    pub fn new_student_defaults(&self) -> NewStudentDefaults {
        NewStudentDefaults {
            course: self.default_course.clone(),
            semester: self.default_semester.clone(),
        }
    }

    fn client(&self, url: &str) -> anyhow::Result<PredictionClient> {
        PredictionClient::new(url, Duration::from_secs(self.api_timeout_secs))
            .context("invalid grade model service address")
    }
}
