use std::path::Path;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    ClassStats, Course, Grade, GradeBucket, StudentPatch, StudentRecord, Trend,
};

#[derive(Debug, Clone)]
pub struct StudentStore {
    students: Vec<StudentRecord>,
    courses: Vec<Course>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl Default for StudentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentStore {
    pub fn new() -> Self {
        let courses = [
            ("CSE101", "Computer Fundamentals"),
            ("CSE201", "Data Structures"),
            ("CSE301", "Database Management"),
            ("CSE401", "Software Engineering"),
        ]
        .into_iter()
        .map(|(code, name)| Course {
            id: code.to_string(),
            name: name.to_string(),
            code: code.to_string(),
        })
        .collect();

        Self {
            students: Vec::new(),
            courses,
        }
    }

    pub fn seeded() -> Self {
        let mut store = Self::new();
        for student in seed_students() {
            store.add(student);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn all(&self) -> Vec<StudentRecord> {
        self.students.clone()
    }

    pub fn by_course(&self, course_id: &str) -> Vec<StudentRecord> {
        self.course_students(course_id).cloned().collect()
    }

    pub fn by_id(&self, id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn by_roll_no(&self, roll_no: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|student| student.roll_no == roll_no)
    }

    /// Appends without checking for a roll number collision.
    pub fn add(&mut self, mut student: StudentRecord) {
        student.gpa = student.grade.gpa();
        self.students.push(student);
    }

    pub fn update(&mut self, id: &str, patch: StudentPatch) -> bool {
        match self.students.iter_mut().find(|student| student.id == id) {
            Some(student) => {
                student.apply(patch);
                true
            }
            None => false,
        }
    }

    pub fn courses(&self) -> Vec<Course> {
        self.courses.clone()
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == course_id)
    }

    pub fn grade_distribution(&self, course_id: &str) -> Vec<GradeBucket> {
        let mut counts = [0usize; Grade::ALL.len()];
        let mut total = 0usize;
        for student in self.course_students(course_id) {
            counts[student.grade as usize] += 1;
            total += 1;
        }

        Grade::ALL
            .into_iter()
            .zip(counts)
            .map(|(grade, count)| GradeBucket {
                grade,
                count,
                percentage: if total == 0 {
                    0
                } else {
                    (count as f64 / total as f64 * 100.0).round() as u32
                },
            })
            .collect()
    }

    pub fn class_stats(&self, course_id: &str) -> ClassStats {
        let students: Vec<&StudentRecord> = self.course_students(course_id).collect();
        if students.is_empty() {
            return ClassStats {
                total_students: 0,
                class_average: 0.0,
                pass_rate: 0,
                attendance_average: 0,
            };
        }

        let count = students.len() as f64;
        let average_gpa = students.iter().map(|s| s.gpa).sum::<f64>() / count;
        let passing = students.iter().filter(|s| s.grade.is_pass()).count() as f64;
        let attendance = students.iter().map(|s| s.attendance).sum::<f64>() / count;

        ClassStats {
            total_students: students.len(),
            class_average: (average_gpa * 10.0).round() / 10.0,
            pass_rate: (passing / count * 100.0).round() as u32,
            attendance_average: attendance.round() as u32,
        }
    }

    pub fn import_csv(&mut self, csv_path: &Path) -> anyhow::Result<ImportSummary> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            roll_no: String,
            name: String,
            course: String,
            semester: String,
            grade: String,
            attendance: f64,
            previous_semester_gpa: f64,
            cumulative_gpa: f64,
            t1_marks: f64,
            t2_marks: f64,
            t3_marks: f64,
            ta_marks: f64,
            number_of_backlogs: u32,
            adherence_to_deadlines: u8,
            midterm: Option<f64>,
            quiz1: Option<f64>,
            quiz2: Option<f64>,
            assignment: Option<f64>,
        }

        let mut reader = csv::Reader::from_path(csv_path)
            .with_context(|| format!("failed to open roster {}", csv_path.display()))?;
        let mut summary = ImportSummary::default();

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let line = index + 2;
            let row = result.with_context(|| format!("invalid roster row at line {line}"))?;
            let grade: Grade = row
                .grade
                .parse()
                .with_context(|| format!("invalid grade at line {line}"))?;
            if !(1..=5).contains(&row.adherence_to_deadlines) {
                anyhow::bail!(
                    "adherence to deadlines must be between 1 and 5 at line {line}, got {}",
                    row.adherence_to_deadlines
                );
            }

            let midterm = row.midterm.unwrap_or_else(|| round1(row.t3_marks / 3.5));
            let quiz1 = row.quiz1.unwrap_or_else(|| round1(row.t1_marks / 2.0));
            let quiz2 = row.quiz2.unwrap_or_else(|| round1(row.t2_marks / 2.0));
            let assignment = row.assignment.unwrap_or_else(|| round1(row.ta_marks / 2.5));
            let total = round1((midterm + quiz1 + quiz2 + assignment) / 4.0);
            let trend = Trend::between(row.previous_semester_gpa, row.cumulative_gpa);

            if let Some(existing) = self.by_roll_no(&row.roll_no) {
                let id = existing.id.clone();
                self.update(
                    &id,
                    StudentPatch {
                        name: Some(row.name),
                        course: Some(row.course),
                        semester: Some(row.semester),
                        midterm: Some(midterm),
                        quiz1: Some(quiz1),
                        quiz2: Some(quiz2),
                        assignment: Some(assignment),
                        total: Some(total),
                        trend: Some(trend),
                        grade: Some(grade),
                        attendance: Some(row.attendance),
                        previous_semester_gpa: Some(row.previous_semester_gpa),
                        cumulative_gpa: Some(row.cumulative_gpa),
                        t1_marks: Some(row.t1_marks),
                        t2_marks: Some(row.t2_marks),
                        t3_marks: Some(row.t3_marks),
                        ta_marks: Some(row.ta_marks),
                        number_of_backlogs: Some(row.number_of_backlogs),
                        adherence_to_deadlines: Some(row.adherence_to_deadlines),
                        attendance_percentage: Some(row.attendance),
                        last_predicted_at: None,
                    },
                );
                summary.updated += 1;
            } else {
                self.add(StudentRecord {
                    id: Uuid::new_v4().to_string(),
                    roll_no: row.roll_no,
                    name: row.name,
                    course: row.course,
                    semester: row.semester,
                    midterm,
                    quiz1,
                    quiz2,
                    assignment,
                    total,
                    trend,
                    grade,
                    gpa: grade.gpa(),
                    attendance: row.attendance,
                    previous_semester_gpa: row.previous_semester_gpa,
                    cumulative_gpa: row.cumulative_gpa,
                    t1_marks: row.t1_marks,
                    t2_marks: row.t2_marks,
                    t3_marks: row.t3_marks,
                    ta_marks: row.ta_marks,
                    number_of_backlogs: row.number_of_backlogs,
                    adherence_to_deadlines: row.adherence_to_deadlines,
                    attendance_percentage: row.attendance,
                    last_predicted_at: None,
                });
                summary.inserted += 1;
            }
        }

        info!(
            path = %csv_path.display(),
            inserted = summary.inserted,
            updated = summary.updated,
            "roster imported"
        );
        Ok(summary)
    }

    fn course_students<'a>(
        &'a self,
        course_id: &'a str,
    ) -> impl Iterator<Item = &'a StudentRecord> + 'a {
        self.students
            .iter()
            .filter(move |student| student.course == course_id)
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn seed_students() -> Vec<StudentRecord> {
    #[allow(clippy::type_complexity)]
    let rows: [(&str, &str, &str, [f64; 5], Trend, Grade, f64, [f64; 2], [f64; 4], u32, u8); 8] = [
        (
            "1",
            "Aditi Jain",
            "22103310",
            [8.5, 7.8, 8.2, 9.0, 8.4],
            Trend::Up,
            Grade::A,
            85.0,
            [7.8, 8.1],
            [18.0, 17.0, 30.0, 22.0],
            0,
            4,
        ),
        (
            "2",
            "Rohit Sharma",
            "22103311",
            [9.2, 8.9, 9.1, 9.5, 9.2],
            Trend::Up,
            Grade::APlus,
            92.0,
            [8.5, 8.8],
            [20.0, 19.0, 33.0, 24.0],
            0,
            5,
        ),
        (
            "3",
            "Priya Singh",
            "22103312",
            [6.8, 7.2, 6.5, 7.8, 7.1],
            Trend::Down,
            Grade::B,
            78.0,
            [8.0, 7.6],
            [15.0, 14.0, 25.0, 18.0],
            1,
            2,
        ),
        (
            "4",
            "Arjun Gupta",
            "22103313",
            [8.8, 8.5, 8.9, 9.2, 8.9],
            Trend::Up,
            Grade::A,
            88.0,
            [8.2, 8.5],
            [19.0, 18.0, 31.0, 23.0],
            0,
            4,
        ),
        (
            "5",
            "Sneha Patel",
            "22103314",
            [7.5, 7.8, 7.2, 8.1, 7.7],
            Trend::Stable,
            Grade::BPlus,
            82.0,
            [7.6, 7.7],
            [16.0, 15.0, 27.0, 20.0],
            0,
            3,
        ),
        (
            "6",
            "Vikram Kumar",
            "22103315",
            [5.2, 6.1, 5.8, 6.5, 5.9],
            Trend::Down,
            Grade::C,
            65.0,
            [6.8, 6.4],
            [12.0, 11.0, 20.0, 15.0],
            2,
            2,
        ),
        (
            "7",
            "Kavya Reddy",
            "22103316",
            [9.5, 9.2, 9.6, 9.8, 9.5],
            Trend::Up,
            Grade::APlus,
            95.0,
            [9.0, 9.2],
            [20.0, 20.0, 35.0, 25.0],
            0,
            5,
        ),
        (
            "8",
            "Rahul Verma",
            "22103317",
            [4.8, 5.2, 4.5, 5.8, 5.1],
            Trend::Down,
            Grade::C,
            58.0,
            [6.2, 5.7],
            [10.0, 9.0, 18.0, 13.0],
            3,
            1,
        ),
    ];

    rows.into_iter()
        .map(
            |(id, name, roll_no, scores, trend, grade, attendance, gpas, marks, backlogs, adherence)| {
                let [midterm, quiz1, quiz2, assignment, total] = scores;
                let [previous_semester_gpa, cumulative_gpa] = gpas;
                let [t1_marks, t2_marks, t3_marks, ta_marks] = marks;
                StudentRecord {
                    id: id.to_string(),
                    roll_no: roll_no.to_string(),
                    name: name.to_string(),
                    course: "CSE201".to_string(),
                    semester: "Fall 2024".to_string(),
                    midterm,
                    quiz1,
                    quiz2,
                    assignment,
                    total,
                    trend,
                    grade,
                    gpa: grade.gpa(),
                    attendance,
                    previous_semester_gpa,
                    cumulative_gpa,
                    t1_marks,
                    t2_marks,
                    t3_marks,
                    ta_marks,
                    number_of_backlogs: backlogs,
                    adherence_to_deadlines: adherence,
                    attendance_percentage: attendance,
                    last_predicted_at: None,
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_csv(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("roster-{}.csv", Uuid::new_v4()));
        std::fs::write(&path, contents).expect("write roster");
        path
    }

    #[test]
    fn seed_keeps_gpa_in_line_with_grade() {
        let store = StudentStore::seeded();
        assert_eq!(store.len(), 8);
        for student in store.all() {
            assert_eq!(student.gpa, student.grade.gpa());
        }
    }

    #[test]
    fn lookups_by_id_roll_and_course() {
        let store = StudentStore::seeded();
        assert_eq!(store.by_id("3").map(|s| s.name.as_str()), Some("Priya Singh"));
        assert_eq!(store.by_roll_no("22103316").map(|s| s.id.as_str()), Some("7"));
        assert!(store.by_roll_no("00000000").is_none());
        assert_eq!(store.by_course("CSE201").len(), 8);
        assert!(store.by_course("cse201").is_empty());
        assert_eq!(store.courses().len(), 4);
        assert_eq!(store.course("CSE301").map(|c| c.name.as_str()), Some("Database Management"));
    }

    #[test]
    fn update_merges_and_ignores_unknown_ids() {
        let mut store = StudentStore::seeded();
        let changed = store.update(
            "8",
            StudentPatch {
                grade: Some(Grade::B),
                attendance: Some(74.0),
                ..StudentPatch::default()
            },
        );
        assert!(changed);
        let record = store.by_id("8").expect("record 8");
        assert_eq!(record.grade, Grade::B);
        assert_eq!(record.gpa, 7.0);
        assert_eq!(record.attendance, 74.0);
        assert_eq!(record.name, "Rahul Verma");

        assert!(!store.update("missing", StudentPatch::default()));
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn distribution_percentages_cover_the_class() {
        let store = StudentStore::seeded();
        let buckets = store.grade_distribution("CSE201");
        assert_eq!(buckets.len(), 9);
        assert_eq!(
            buckets.iter().map(|b| b.grade).collect::<Vec<_>>(),
            Grade::ALL.to_vec()
        );
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 8);

        let total: u32 = buckets.iter().map(|b| b.percentage).sum();
        assert!((99..=101).contains(&total), "percentages sum to {total}");
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].percentage, 25);
        assert_eq!(buckets[2].percentage, 13);
    }

    #[test]
    fn empty_course_has_zeroed_aggregates() {
        let store = StudentStore::seeded();
        assert!(store
            .grade_distribution("CSE401")
            .iter()
            .all(|b| b.count == 0 && b.percentage == 0));

        let stats = store.class_stats("CSE401");
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.class_average, 0.0);
        assert_eq!(stats.pass_rate, 0);
        assert_eq!(stats.attendance_average, 0);
    }

    #[test]
    fn class_stats_round_like_the_dashboard() {
        let mut store = StudentStore::seeded();
        let stats = store.class_stats("CSE201");
        assert_eq!(stats.total_students, 8);
        assert!((stats.class_average - 7.9).abs() < 1e-9);
        assert_eq!(stats.pass_rate, 100);
        assert_eq!(stats.attendance_average, 80);

        store.update(
            "8",
            StudentPatch {
                grade: Some(Grade::F),
                ..StudentPatch::default()
            },
        );
        let stats = store.class_stats("CSE201");
        assert_eq!(stats.pass_rate, 88);
        assert!((stats.class_average - 7.3).abs() < 1e-9);
    }

    #[test]
    fn add_does_not_guard_roll_collisions() {
        let mut store = StudentStore::seeded();
        let mut duplicate = store.by_id("1").cloned().expect("record 1");
        duplicate.id = "99".to_string();
        duplicate.gpa = 1.5;
        store.add(duplicate);
        assert_eq!(store.len(), 9);
        assert_eq!(store.by_roll_no("22103310").map(|s| s.id.as_str()), Some("1"));
        assert_eq!(store.by_id("99").map(|s| s.gpa), Some(9.0));
    }

    #[test]
    fn csv_import_upserts_by_roll_number() {
        let path = temp_csv(
            "roll_no,name,course,semester,grade,attendance,previous_semester_gpa,cumulative_gpa,t1_marks,t2_marks,t3_marks,ta_marks,number_of_backlogs,adherence_to_deadlines,midterm,quiz1,quiz2,assignment\n\
             22103317,Rahul Verma,CSE201,Fall 2024,B,81,6.2,6.9,16,15,28,20,1,3,,,,\n\
             22109001,Meera Nair,CSE301,Fall 2024,A+,96,9.1,9.3,20,19,34,25,0,5,9.7,9.5,9.5,10\n",
        );

        let mut store = StudentStore::seeded();
        let summary = store.import_csv(&path).expect("import");
        let _ = std::fs::remove_file(&path);

        assert_eq!(summary, ImportSummary { inserted: 1, updated: 1 });
        assert_eq!(store.len(), 9);

        let updated = store.by_id("8").expect("record 8");
        assert_eq!(updated.grade, Grade::B);
        assert_eq!(updated.gpa, 7.0);
        assert_eq!(updated.trend, Trend::Up);
        assert_eq!(updated.midterm, 8.0);

        let added = store.by_roll_no("22109001").expect("new record");
        assert_eq!(added.course, "CSE301");
        assert_eq!(added.assignment, 10.0);
        assert_eq!(store.class_stats("CSE301").total_students, 1);
    }

    #[test]
    fn csv_import_reports_the_bad_line() {
        let path = temp_csv(
            "roll_no,name,course,semester,grade,attendance,previous_semester_gpa,cumulative_gpa,t1_marks,t2_marks,t3_marks,ta_marks,number_of_backlogs,adherence_to_deadlines,midterm,quiz1,quiz2,assignment\n\
             22109002,Dev Rao,CSE101,Fall 2024,E,70,6,6,10,10,20,15,0,3,,,,\n",
        );

        let mut store = StudentStore::new();
        let err = store.import_csv(&path).expect_err("grade E is invalid");
        let _ = std::fs::remove_file(&path);

        assert!(format!("{err:#}").contains("line 2"));
        assert!(store.is_empty());
    }

    #[test]
    fn csv_import_rejects_adherence_off_the_slider() {
        let path = temp_csv(
            "roll_no,name,course,semester,grade,attendance,previous_semester_gpa,cumulative_gpa,t1_marks,t2_marks,t3_marks,ta_marks,number_of_backlogs,adherence_to_deadlines,midterm,quiz1,quiz2,assignment\n\
             22109003,Isha Menon,CSE101,Fall 2024,B,80,7,7.2,14,14,25,18,0,4,,,,\n\
             22109004,Karan Das,CSE101,Fall 2024,C,70,6,6,10,10,20,15,0,200,,,,\n",
        );

        let mut store = StudentStore::new();
        let err = store.import_csv(&path).expect_err("adherence 200 is invalid");
        let _ = std::fs::remove_file(&path);

        let message = format!("{err:#}");
        assert!(message.contains("line 3"));
        assert!(message.contains("got 200"));
        assert!(store.by_roll_no("22109004").is_none());
    }
}
