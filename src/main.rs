use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod anomaly;
mod config;
mod db;
mod form;
mod models;
mod predict;
mod remote;
mod report;
mod trend;

use config::Settings;
use form::{FieldValidation, FormField, PredictionFormData};

#[derive(Parser)]
#[command(name = "grade-insight")]
#[command(about = "Grade analytics and prediction for the faculty portal", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List students, optionally for one course
    Students {
        #[arg(long)]
        course: Option<String>,
    },
    /// List the offered courses
    Courses,
    /// Grade distribution for a course
    Distribution {
        #[arg(long)]
        course: String,
    },
    /// Class statistics for a course
    Stats {
        #[arg(long)]
        course: String,
    },
    /// Check a submission for inconsistent inputs
    Anomalies {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Classify the learning trend of a submission
    Trend {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Predict a grade and record it against the student
    Predict {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Generate a markdown analytics report for a course
    Report {
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "grade-report.md")]
        out: PathBuf,
    },
    /// Describe the model behind the grade model service
    ModelInfo,
    /// Check that the grade model service is up
    Health,
}

/// A prediction form, either from flags or from a JSON file.
#[derive(Args, Debug)]
struct FormArgs {
    /// JSON submission; individual flags are ignored when given
    #[arg(long)]
    form: Option<PathBuf>,
    #[arg(long, default_value = "")]
    student_id: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    previous_gpa: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    cumulative_gpa: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    backlogs: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    t1: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    t2: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    t3: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    ta: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    attendance: String,
    /// Adherence to deadlines, 1 (never) to 5 (always)
    #[arg(long, default_value_t = 3)]
    adherence: u8,
}

impl FormArgs {
    fn into_form(self) -> anyhow::Result<PredictionFormData> {
        if let Some(path) = &self.form {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read form {}", path.display()))?;
            let mut form: PredictionFormData = serde_json::from_str(&raw)
                .with_context(|| format!("invalid form json in {}", path.display()))?;
            for (field, raw, validation) in form.revalidate() {
                report_validation(field, &raw, validation);
            }
            if let Some(given) = form.clamp_adherence() {
                warn!(value = given, "adherence to deadlines clamped to 1-5");
            }
            warn_if_incomplete(&form);
            return Ok(form);
        }

        let mut form = PredictionFormData::default();
        let entries = [
            (FormField::StudentId, self.student_id),
            (FormField::PreviousSemesterGpa, self.previous_gpa),
            (FormField::CumulativeGpa, self.cumulative_gpa),
            (FormField::NumberOfBacklogs, self.backlogs),
            (FormField::T1Marks, self.t1),
            (FormField::T2Marks, self.t2),
            (FormField::T3Marks, self.t3),
            (FormField::TaMarks, self.ta),
            (FormField::AttendancePercentage, self.attendance),
        ];
        for (field, raw) in entries {
            let validation = form.set(field, &raw);
            report_validation(field, &raw, validation);
        }
        form.set_adherence(self.adherence)?;
        warn_if_incomplete(&form);
        Ok(form)
    }
}

fn report_validation(field: FormField, raw: &str, validation: FieldValidation) {
    match validation {
        FieldValidation::Accepted => {}
        FieldValidation::Clamped { limit } => {
            warn!(field = field.label(), value = %raw, limit, "value clamped to range")
        }
        FieldValidation::NotNumeric => {
            warn!(field = field.label(), value = %raw, "not a number, read as 0")
        }
    }
}

fn warn_if_incomplete(form: &PredictionFormData) {
    if !form.is_complete() {
        warn!("submission has empty fields, they read as 0");
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;
    init_tracing(settings.log_json);

    match cli.command {
        Commands::Students { course } => {
            let store = settings.load_store()?;
            let students = match course.as_deref() {
                Some(course) => store.by_course(course),
                None => store.all(),
            };
            if settings.json {
                return print_json(&students);
            }
            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }
            for student in students.iter() {
                println!(
                    "- {} ({}, {}) grade {} GPA {:.1}, attendance {}%, trend {}",
                    student.name,
                    student.roll_no,
                    student.course,
                    student.grade,
                    student.gpa,
                    student.attendance,
                    student.trend.as_str()
                );
            }
        }
        Commands::Courses => {
            let store = settings.load_store()?;
            let courses = store.courses();
            if settings.json {
                return print_json(&courses);
            }
            for course in courses.iter() {
                println!("- {}: {}", course.code, course.name);
            }
        }
        Commands::Distribution { course } => {
            let store = settings.load_store()?;
            let buckets = store.grade_distribution(&course);
            if settings.json {
                return print_json(&buckets);
            }
            println!("Grade distribution for {course}:");
            for bucket in buckets.iter() {
                println!("- {}: {} ({}%)", bucket.grade, bucket.count, bucket.percentage);
            }
        }
        Commands::Stats { course } => {
            let store = settings.load_store()?;
            let stats = store.class_stats(&course);
            if settings.json {
                return print_json(&stats);
            }
            println!("Class statistics for {course}:");
            println!("- Students: {}", stats.total_students);
            println!("- Class average GPA: {:.1}", stats.class_average);
            println!("- Pass rate: {}%", stats.pass_rate);
            println!("- Average attendance: {}%", stats.attendance_average);
        }
        Commands::Anomalies { form } => {
            let form = form.into_form()?;
            let anomalies = anomaly::detect_input_anomalies(&form);
            if settings.json {
                return print_json(&anomalies);
            }
            if anomalies.is_empty() {
                println!("No anomalies detected.");
                return Ok(());
            }
            println!("{} potential inconsistencies found:", anomalies.len());
            for message in anomalies.iter() {
                println!("- {message}");
            }
        }
        Commands::Trend { form } => {
            let form = form.into_form()?;
            let trend = trend::analyze_learning_trend(&form);
            if settings.json {
                return print_json(&trend);
            }
            println!("{}", trend.description);
        }
        Commands::Predict { form } => {
            let form = form.into_form()?;
            let mut store = settings.load_store()?;
            let backend = settings.backend()?;
            let outcome = match predict::predict_grade(
                &mut store,
                &backend,
                &form,
                &settings.new_student_defaults(),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "prediction failed");
                    anyhow::bail!(err.user_message());
                }
            };

            if settings.json {
                return print_json(&outcome);
            }
            println!(
                "Predicted grade {} with {}% confidence.",
                outcome.result.predicted_grade, outcome.result.confidence
            );
            println!("{}", outcome.trend.description);
            if !outcome.anomalies.is_empty() {
                println!("{} potential inconsistencies found:", outcome.anomalies.len());
                for message in outcome.anomalies.iter() {
                    println!("- {message}");
                }
            }
            match &outcome.stored {
                Some(stored) => println!(
                    "Record {} for {} ({}) {}.",
                    stored.record.id,
                    stored.record.name,
                    stored.record.roll_no,
                    match stored.kind {
                        predict::UpsertKind::Created => "created",
                        predict::UpsertKind::Updated => "updated",
                    }
                ),
                None => println!("No student id given; nothing recorded."),
            }
        }
        Commands::Report { course, out } => {
            let store = settings.load_store()?;
            let report = report::build_course_report(&store, &course, Utc::now().date_naive());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::ModelInfo => {
            let client = settings.require_client()?;
            let info = match client.model_info().await {
                Ok(info) => info,
                Err(err) => anyhow::bail!(err.user_message()),
            };
            if settings.json {
                return print_json(&info);
            }
            println!("Model: {} ({})", info.model_type, info.status);
            println!("Features: {}", info.features.join(", "));
            println!("Grades: {}", info.possible_grades.join(", "));
        }
        Commands::Health => {
            let client = settings.require_client()?;
            let health = match client.health().await {
                Ok(health) => health,
                Err(err) => anyhow::bail!(err.user_message()),
            };
            if settings.json {
                return print_json(&health);
            }
            println!("{}: {}", health.status, health.message);
        }
    }

    Ok(())
}
