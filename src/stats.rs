//! Dashboard metrics derived from the subjects and exams collections.
//!
//! Everything here is a pure function of its inputs plus an injected "now".
//! Results are recomputed from scratch on each call; nothing is cached.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{Exam, Priority, Subject, Topic};

/// Below this gap the next-exam countdown is shown in hours.
const HOURS_THRESHOLD_MS: i64 = 72 * HOUR_MS;
const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

const NONE_BUCKET_COLOR: &str = "rgba(255,255,255,0.1)";

pub const FALLBACK_TIP: &str = "Tip: Add deadlines to track overdue tasks";

/// Every dashboard-facing number, chart series and message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dashboard {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub completion_percentage: u32,
    pub high_priority_pending: usize,
    pub overdue_count: usize,
    pub subject_progress: Vec<SubjectProgress>,
    pub priority_mix: Vec<PriorityBucket>,
    pub next_exam: Option<NextExam>,
    pub exam_schedule: Vec<ScheduledExam>,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectProgress {
    pub subject_id: String,
    pub name: String,
    pub completed: usize,
    pub remaining: usize,
    pub color: String,
    pub percentage: u32,
}

/// One slice of the pending-work priority chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityBucket {
    /// `High`, `Medium`, `Low`, or `None` for the placeholder slice.
    pub name: String,
    pub value: usize,
    pub color: String,
}

impl PriorityBucket {
    pub fn is_placeholder(&self) -> bool {
        self.name == "None"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextExam {
    pub exam: Exam,
    pub starts_at: NaiveDateTime,
    pub remaining: Countdown,
}

/// Time left until an instant, rounded up to the display unit.
///
/// A value of `0` never occurs for a future instant, so "0 days left" cannot
/// be shown for something that has not happened yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Countdown {
    pub value: i64,
    pub unit: CountdownUnit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountdownUnit {
    Hours,
    Days,
}

impl CountdownUnit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hours => "Hours Left",
            Self::Days => "Days Left",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledExam {
    pub exam: Exam,
    pub starts_at: Option<NaiveDateTime>,
    /// The exam's date is before today.
    pub is_passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insight {
    pub id: String,
    pub kind: InsightKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Success,
    Danger,
    Info,
}

/// How a topic's deadline relates to today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "days", rename_all = "snake_case")]
pub enum DeadlineStatus {
    Late(i64),
    DueToday,
    DaysLeft(i64),
}

impl DeadlineStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Late(days) => format!("{}d late", days),
            Self::DueToday => "Due today".to_string(),
            Self::DaysLeft(days) => format!("{}d left", days),
        }
    }
}

impl Dashboard {
    /// Computes all metrics for the given collections at `now` (local time).
    pub fn compute(subjects: &[Subject], exams: &[Exam], now: NaiveDateTime) -> Self {
        let today = now.date();
        let topics: Vec<&Topic> = subjects.iter().flat_map(|s| s.topics.iter()).collect();

        let total_tasks = topics.len();
        let completed_tasks = topics.iter().filter(|t| t.is_completed).count();
        let pending_tasks = total_tasks - completed_tasks;

        let high_priority_pending = topics
            .iter()
            .filter(|t| !t.is_completed && t.priority == Some(Priority::High))
            .count();
        let overdue_count = topics.iter().filter(|t| is_overdue(t, today)).count();

        let subject_progress = subjects
            .iter()
            .map(|s| {
                let completed = s.completed_count();
                SubjectProgress {
                    subject_id: s.id.clone(),
                    name: s.title.clone(),
                    completed,
                    remaining: s.remaining_count(),
                    color: s.color.clone(),
                    percentage: percentage(completed, s.topics.len()),
                }
            })
            .collect();

        Self {
            total_tasks,
            completed_tasks,
            pending_tasks,
            completion_percentage: percentage(completed_tasks, total_tasks),
            high_priority_pending,
            overdue_count,
            subject_progress,
            priority_mix: priority_mix(&topics),
            next_exam: next_exam(exams, now),
            exam_schedule: exam_schedule(exams, today),
            insights: insights(subjects, today),
        }
    }
}

/// `round(part / total * 100)` with halves rounded up; `0` when `total == 0`.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * part + total) / (2 * total)) as u32
}

/// Pending, has a deadline, and the deadline day is before today.
pub fn is_overdue(topic: &Topic, today: NaiveDate) -> bool {
    !topic.is_completed && topic.deadline.is_some_and(|d| d < today)
}

pub fn deadline_status(deadline: NaiveDate, today: NaiveDate) -> DeadlineStatus {
    let diff = (deadline - today).num_days();
    match diff {
        d if d < 0 => DeadlineStatus::Late(-d),
        0 => DeadlineStatus::DueToday,
        d => DeadlineStatus::DaysLeft(d),
    }
}

fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "#fb7185",
        Priority::Medium => "#fbbf24",
        Priority::Low => "#34d399",
    }
}

/// Pending topics per priority, empty buckets omitted. Topics without a
/// priority are not counted. Never empty: a single `None` bucket of 1 stands
/// in when nothing is pending.
fn priority_mix(topics: &[&Topic]) -> Vec<PriorityBucket> {
    let mut buckets: Vec<PriorityBucket> = Priority::ALL
        .iter()
        .map(|&p| PriorityBucket {
            name: p.as_str().to_string(),
            value: topics
                .iter()
                .filter(|t| !t.is_completed && t.priority == Some(p))
                .count(),
            color: priority_color(p).to_string(),
        })
        .filter(|b| b.value > 0)
        .collect();

    if buckets.is_empty() {
        buckets.push(PriorityBucket {
            name: "None".to_string(),
            value: 1,
            color: NONE_BUCKET_COLOR.to_string(),
        });
    }
    buckets
}

/// The earliest exam starting strictly after `now`.
pub fn next_exam(exams: &[Exam], now: NaiveDateTime) -> Option<NextExam> {
    exams
        .iter()
        .filter_map(|e| e.starts_at().map(|at| (e, at)))
        .filter(|(_, at)| *at > now)
        .min_by_key(|(_, at)| *at)
        .map(|(exam, starts_at)| NextExam {
            exam: exam.clone(),
            starts_at,
            remaining: countdown(now, starts_at),
        })
}

/// Hours (rounded up) when under 72 hours away, days (rounded up) otherwise.
pub fn countdown(from: NaiveDateTime, to: NaiveDateTime) -> Countdown {
    let ms = (to - from).num_milliseconds().max(0);
    if ms < HOURS_THRESHOLD_MS {
        Countdown {
            value: ceil_div(ms, HOUR_MS),
            unit: CountdownUnit::Hours,
        }
    } else {
        Countdown {
            value: ceil_div(ms, DAY_MS),
            unit: CountdownUnit::Days,
        }
    }
}

fn ceil_div(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

/// All exams in start order. Exams without a readable date go last.
/// Every exam ordered by start, undated ones last.
pub fn exam_schedule(exams: &[Exam], today: NaiveDate) -> Vec<ScheduledExam> {
    let mut schedule: Vec<ScheduledExam> = exams
        .iter()
        .map(|e| ScheduledExam {
            exam: e.clone(),
            starts_at: e.starts_at(),
            is_passed: e.date.is_some_and(|d| d < today),
        })
        .collect();
    schedule.sort_by_key(|s| (s.starts_at.is_none(), s.starts_at));
    schedule
}

/// Per-subject observations in subject order, or a single tip when no
/// subject qualifies.
pub fn insights(subjects: &[Subject], today: NaiveDate) -> Vec<Insight> {
    let mut insights = Vec::new();

    for s in subjects {
        let total = s.topics.len();
        let done = s.completed_count();

        if total > 0 && done == total {
            insights.push(Insight {
                id: format!("done-{}", s.id),
                kind: InsightKind::Success,
                text: format!("Completed: {}", s.title),
            });
        } else if total > 0 && done * 4 > total * 3 {
            insights.push(Insight {
                id: format!("crush-{}", s.id),
                kind: InsightKind::Success,
                text: format!("Crushing it: {}", s.title),
            });
        }

        let overdue = s.topics.iter().filter(|t| is_overdue(t, today)).count();
        if overdue > 0 {
            insights.push(Insight {
                id: format!("late-{}", s.id),
                kind: InsightKind::Danger,
                text: format!("Overdue: {} ({})", s.title, overdue),
            });
        }
    }

    if insights.is_empty() {
        insights.push(Insight {
            id: "tip-1".to_string(),
            kind: InsightKind::Info,
            text: FALLBACK_TIP.to_string(),
        });
    }
    insights
}
