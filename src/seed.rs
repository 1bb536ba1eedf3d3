//! Starter dataset offered when the store is empty.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{Exam, Priority, Subject, Topic};

/// The day-of-year an exam falls on, in this year or the next if it has
/// already passed.
fn exam_date(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let passed = (today.month(), today.day()) > (month, day);
    let year = if passed { today.year() + 1 } else { today.year() };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn exam(id: &str, subject: &str, date: Option<NaiveDate>, time: &str) -> Exam {
    Exam {
        id: id.to_string(),
        subject: subject.to_string(),
        date,
        time: Some(time.to_string()),
    }
}

pub fn initial_exams(today: NaiveDate) -> Vec<Exam> {
    const AFTERNOON: &str = "1:00 PM - 4:00 PM";
    const MORNING: &str = "9:00 AM - 12:00 PM";
    vec![
        exam("ex-1", "Introduction to OOP", exam_date(today, 12, 15), AFTERNOON),
        exam("ex-2", "Microeconomics", exam_date(today, 12, 17), AFTERNOON),
        exam("ex-3", "Financial Accounting", exam_date(today, 12, 20), AFTERNOON),
        exam(
            "ex-4",
            "Civics & Community Engagement",
            exam_date(today, 12, 26),
            AFTERNOON,
        ),
        exam("ex-5", "Pakistan Studies", exam_date(today, 12, 29), MORNING),
        exam("ex-6", "Business Maths-II", exam_date(today, 1, 2), MORNING),
    ]
}

struct Seed<'a> {
    id: &'a str,
    name: &'a str,
    priority: Priority,
    due_in_days: Option<u64>,
}

const fn t<'a>(id: &'a str, name: &'a str, priority: Priority) -> Seed<'a> {
    Seed {
        id,
        name,
        priority,
        due_in_days: None,
    }
}

const fn due<'a>(id: &'a str, name: &'a str, priority: Priority, days: u64) -> Seed<'a> {
    Seed {
        id,
        name,
        priority,
        due_in_days: Some(days),
    }
}

fn subject(today: NaiveDate, id: &str, title: &str, color: &str, topics: &[Seed<'_>]) -> Subject {
    Subject {
        id: id.to_string(),
        title: title.to_string(),
        color: color.to_string(),
        topics: topics
            .iter()
            .map(|s| Topic {
                id: s.id.to_string(),
                name: s.name.to_string(),
                is_completed: false,
                priority: Some(s.priority),
                deadline: s
                    .due_in_days
                    .and_then(|days| today.checked_add_days(Days::new(days))),
                links: Vec::new(),
                images: Vec::new(),
                note: None,
            })
            .collect(),
    }
}

pub fn initial_subjects(today: NaiveDate) -> Vec<Subject> {
    use Priority::{High, Low, Medium};

    vec![
        subject(
            today,
            "accounting",
            "Financial Accounting",
            "#3b82f6",
            &[
                due("acc-1", "Income statement", High, 2),
                due("acc-2", "Balance sheet", High, 5),
                t("acc-3", "Socie", Medium),
                t("acc-4", "Cash flow statement", Medium),
                t("acc-5", "Ratios", Low),
                t("acc-6", "Partnerships", Low),
            ],
        ),
        subject(
            today,
            "oop",
            "Introduction to OOP",
            "#8b5cf6",
            &[
                t("oop-1", "Aggregation", Medium),
                t("oop-2", "Composition", Medium),
                t("oop-3", "Association", Low),
                due("oop-4", "Operator overloading", High, 3),
                due("oop-5", "File handling (CSV, txt)", High, 7),
                t("oop-6", "Exception handling", Medium),
                t("oop-7", "Abstraction handling", Medium),
                t("oop-8", "UML (complete)", Low),
            ],
        ),
        subject(
            today,
            "maths",
            "Business Maths-II",
            "#ef4444",
            &[
                due("math-1", "Integration", High, 10),
                due("math-2", "Derivative", High, 12),
                t("math-3", "Simplex method", Low),
            ],
        ),
        subject(
            today,
            "micro",
            "Microeconomics",
            "#f59e0b",
            &[t("micro-1", "Chapter 21", Medium)],
        ),
        subject(
            today,
            "civics",
            "Civics & Community Engagement",
            "#10b981",
            &[t("civics-1", "Chapter 10", Low)],
        ),
        subject(
            today,
            "pak-study",
            "Pakistan Studies",
            "#14b8a6",
            &[t("pak-1", "Chapter 12", Low)],
        ),
    ]
}
