use crate::form::{FormValues, PredictionFormData};

struct Rule {
    applies: fn(&FormValues) -> bool,
    message: &'static str,
}

const RULES: [Rule; 13] = [
    Rule {
        applies: |v| v.cumulative_gpa >= 8.5 && v.attendance <= 35.0,
        message: "High GPA but very low attendance: This is unusual and may indicate data inconsistency.",
    },
    Rule {
        applies: |v| v.adherence == 1.0 && v.ta == 25.0,
        message: "Zero adherence to deadlines but full TA marks: This is contradictory.",
    },
    Rule {
        applies: |v| v.t1 >= 16.0 && v.t2 >= 16.0 && v.t3 >= 29.0 && v.backlogs >= 2,
        message: "High test scores but many backlogs: This is rare and may need review.",
    },
    Rule {
        applies: |v| v.cumulative_gpa <= 4.0 && v.attendance >= 90.0,
        message: "Low GPA but very high attendance: This is uncommon.",
    },
    Rule {
        applies: |v| v.previous_gpa >= 8.0 && v.cumulative_gpa <= 5.0,
        message: "Sudden drop in GPA from previous semester to cumulative.",
    },
    Rule {
        applies: |v| v.total_marks() <= 35.0 && v.cumulative_gpa >= 8.5,
        message: "Very low total score but high GPA: This is inconsistent.",
    },
    Rule {
        applies: |v| v.total_marks() >= 85.0 && v.cumulative_gpa <= 4.0,
        message: "Very high total score but low GPA: This is inconsistent.",
    },
    Rule {
        applies: |v| v.adherence == 1.0 && v.attendance == 0.0 && v.ta == 25.0,
        message: "Zero attendance and adherence but full TA marks: Contradictory.",
    },
    Rule {
        applies: |v| {
            v.t1 == 0.0 && v.t2 == 0.0 && v.t3 == 0.0 && v.ta == 0.0 && v.cumulative_gpa >= 7.0
        },
        message: "Zero marks but high GPA: This is highly unlikely.",
    },
    Rule {
        applies: |v| v.backlogs == 0 && v.cumulative_gpa <= 4.0,
        message: "No backlogs but very low GPA: Unusual academic record.",
    },
    Rule {
        applies: |v| v.backlogs >= 3 && v.cumulative_gpa >= 8.5,
        message: "Many backlogs but high GPA: This is rare.",
    },
    Rule {
        applies: |v| {
            v.t1 >= 18.0
                && v.t2 >= 17.0
                && v.t3 >= 30.0
                && v.ta >= 24.0
                && v.cumulative_gpa <= 4.0
        },
        message: "Good marks but low GPA: This is inconsistent.",
    },
    Rule {
        applies: |v| {
            v.t1 <= 7.0 && v.t2 <= 7.0 && v.t3 <= 10.0 && v.ta <= 2.0 && v.cumulative_gpa >= 8.5
        },
        message: "Low marks but high GPA: This is inconsistent.",
    },
];

pub fn detect_input_anomalies(form: &PredictionFormData) -> Vec<String> {
    detect_anomalies(&form.values())
}

pub fn detect_anomalies(values: &FormValues) -> Vec<String> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(values))
        .map(|rule| rule.message.to_string())
        .collect()
}
