//! Plain-text rendering for the CLI and MCP tools.

use chrono::NaiveDate;

use crate::models::{Exam, Priority, Subject, Topic};
use crate::stats::{deadline_status, exam_schedule, Dashboard, InsightKind};

const DONE: char = '●';
const PENDING: char = '○';

fn priority_tag(priority: Option<Priority>) -> &'static str {
    match priority {
        Some(Priority::High) => " [High]",
        Some(Priority::Medium) => " [Medium]",
        Some(Priority::Low) => " [Low]",
        None => "",
    }
}

fn topic_line(topic: &Topic, today: NaiveDate) -> String {
    let symbol = if topic.is_completed { DONE } else { PENDING };
    let mut line = format!("{} {}{}", symbol, topic.name, priority_tag(topic.priority));
    if let (Some(deadline), false) = (topic.deadline, topic.is_completed) {
        line.push_str(&format!(" ({})", deadline_status(deadline, today).label()));
    }
    line
}

/// Renders subjects and their topics as a tree.
///
/// ```text
/// Business Maths-II (1/3)
/// ├── ● Integration [High]
/// ├── ○ Derivative [High] (2d left)
/// └── ○ Simplex method [Low]
/// ```
pub fn render_subjects(subjects: &[Subject], today: NaiveDate) -> String {
    let mut output = String::new();
    for subject in subjects {
        output.push_str(&format!(
            "{} ({}/{})\n",
            subject.title,
            subject.completed_count(),
            subject.topics.len()
        ));
        for (i, topic) in subject.topics.iter().enumerate() {
            let branch = if i == subject.topics.len() - 1 {
                "└── "
            } else {
                "├── "
            };
            output.push_str(branch);
            output.push_str(&topic_line(topic, today));
            output.push('\n');
        }
    }
    output
}

/// One line per exam in schedule order. Passed exams are marked.
pub fn render_exams(exams: &[Exam], today: NaiveDate) -> String {
    if exams.is_empty() {
        return "No exams scheduled\n".to_string();
    }
    let mut output = String::new();
    for scheduled in exam_schedule(exams, today) {
        let exam = &scheduled.exam;
        let date = exam
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        output.push_str(&format!("{} {}", if scheduled.is_passed { DONE } else { PENDING }, date));
        if let Some(time) = &exam.time {
            output.push_str(&format!(" {}", time));
        }
        output.push_str(&format!("  {}  [{}]\n", exam.subject, exam.id));
    }
    output
}

fn bar(percentage: u32) -> String {
    let filled = (percentage.min(100) / 10) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Renders the dashboard summary.
pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Progress: {}% ({}/{} tasks, {} pending)\n",
        dashboard.completion_percentage,
        dashboard.completed_tasks,
        dashboard.total_tasks,
        dashboard.pending_tasks
    ));
    out.push_str(&format!(
        "High priority pending: {}  Overdue: {}\n",
        dashboard.high_priority_pending, dashboard.overdue_count
    ));

    match &dashboard.next_exam {
        Some(next) => out.push_str(&format!(
            "Next exam: {} on {} ({} {})\n",
            next.exam.subject,
            next.starts_at.format("%a %b %-d, %H:%M"),
            next.remaining.value,
            next.remaining.unit.label()
        )),
        None => out.push_str("Next exam: none scheduled\n"),
    }

    if !dashboard.subject_progress.is_empty() {
        out.push_str("\nSubjects\n");
        for s in &dashboard.subject_progress {
            out.push_str(&format!(
                "  {} {:>3}%  {} ({} left)\n",
                bar(s.percentage),
                s.percentage,
                s.name,
                s.remaining
            ));
        }
    }

    let pending: Vec<_> = dashboard
        .priority_mix
        .iter()
        .filter(|b| !b.is_placeholder())
        .map(|b| format!("{} {}", b.name, b.value))
        .collect();
    if !pending.is_empty() {
        out.push_str(&format!("\nPending by priority: {}\n", pending.join(", ")));
    }

    if !dashboard.insights.is_empty() {
        out.push_str("\nInsights\n");
        for insight in &dashboard.insights {
            let marker = match insight.kind {
                InsightKind::Success => '✓',
                InsightKind::Danger => '!',
                InsightKind::Info => '·',
            };
            out.push_str(&format!("  {} {}\n", marker, insight.text));
        }
    }

    out
}
