//! A live view over the subjects and exams collections.
//!
//! The view keeps the latest snapshot of each collection, updated by store
//! listeners, and derives the dashboard from whatever it currently holds.

use std::sync::{Arc, RwLock};

use chrono::NaiveDateTime;
use tokio::sync::watch;

use crate::db::{Database, Subscription};
use crate::error::Error;
use crate::models::{Exam, Subject};
use crate::stats::Dashboard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the first snapshot of both collections.
    Connecting,
    Live,
    Failed(String),
}

#[derive(Default)]
struct Snapshots {
    subjects: Option<Vec<Subject>>,
    exams: Option<Vec<Exam>>,
    failure: Option<String>,
}

impl Snapshots {
    fn state(&self) -> ConnectionState {
        if let Some(message) = &self.failure {
            return ConnectionState::Failed(message.clone());
        }
        match (&self.subjects, &self.exams) {
            (Some(_), Some(_)) => ConnectionState::Live,
            _ => ConnectionState::Connecting,
        }
    }
}

pub struct LiveView {
    snapshots: Arc<RwLock<Snapshots>>,
    revision: watch::Receiver<u64>,
    _subscriptions: Vec<Subscription>,
}

fn failure_message(e: &Error) -> String {
    match e.remediation() {
        Some(hint) => format!("{} {}", e, hint),
        None => e.to_string(),
    }
}

impl LiveView {
    /// Subscribes to both collections. A failed subscription does not abort
    /// the view; it is reported through [`LiveView::state`].
    pub fn connect(db: &Database) -> Self {
        let snapshots = Arc::new(RwLock::new(Snapshots::default()));
        let (tx, rx) = watch::channel(0u64);
        let tx = Arc::new(tx);

        let bump = {
            let tx = tx.clone();
            move || {
                tx.send_modify(|rev| *rev += 1);
            }
        };

        let record_failure = {
            let snapshots = snapshots.clone();
            let bump = bump.clone();
            move |e: Error| {
                tracing::error!("Live view lost its connection: {}", e);
                if let Ok(mut s) = snapshots.write() {
                    s.failure = Some(failure_message(&e));
                }
                bump();
            }
        };

        let mut subscriptions = Vec::with_capacity(2);

        let on_subjects = {
            let snapshots = snapshots.clone();
            let bump = bump.clone();
            move |subjects: Vec<Subject>| {
                if let Ok(mut s) = snapshots.write() {
                    s.subjects = Some(subjects);
                }
                bump();
            }
        };
        if let Ok(sub) = db.subscribe::<Subject, _, _>(on_subjects, record_failure.clone()) {
            subscriptions.push(sub);
        }

        let on_exams = {
            let snapshots = snapshots.clone();
            move |exams: Vec<Exam>| {
                if let Ok(mut s) = snapshots.write() {
                    s.exams = Some(exams);
                }
                bump();
            }
        };
        if let Ok(sub) = db.subscribe::<Exam, _, _>(on_exams, record_failure) {
            subscriptions.push(sub);
        }

        Self {
            snapshots,
            revision: rx,
            _subscriptions: subscriptions,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshots
            .read()
            .map(|s| s.state())
            .unwrap_or_else(|_| ConnectionState::Failed("live view state poisoned".to_string()))
    }

    pub fn subjects(&self) -> Vec<Subject> {
        self.snapshots
            .read()
            .ok()
            .and_then(|s| s.subjects.clone())
            .unwrap_or_default()
    }

    pub fn exams(&self) -> Vec<Exam> {
        self.snapshots
            .read()
            .ok()
            .and_then(|s| s.exams.clone())
            .unwrap_or_default()
    }

    /// The dashboard for the current snapshots.
    pub fn dashboard(&self, now: NaiveDateTime) -> Dashboard {
        let Ok(s) = self.snapshots.read() else {
            return Dashboard::compute(&[], &[], now);
        };
        Dashboard::compute(
            s.subjects.as_deref().unwrap_or_default(),
            s.exams.as_deref().unwrap_or_default(),
            now,
        )
    }

    /// Whether loading the starter dataset should be offered: both
    /// collections have reported in and are empty.
    pub fn seed_offered(&self) -> bool {
        let Ok(s) = self.snapshots.read() else {
            return false;
        };
        s.failure.is_none()
            && s.subjects.as_ref().is_some_and(Vec::is_empty)
            && s.exams.as_ref().is_some_and(Vec::is_empty)
    }

    /// A receiver that changes whenever a snapshot or failure arrives.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Topic};
    use chrono::NaiveDate;

    fn db() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn empty_store_offers_seeding() {
        let db = db();
        let view = LiveView::connect(&db);
        assert_eq!(view.state(), ConnectionState::Live);
        assert!(view.seed_offered());
    }

    #[test]
    fn follows_writes() {
        let db = db();
        let view = LiveView::connect(&db);
        let mut changes = view.changes();
        changes.mark_unchanged();

        db.create(&Subject {
            id: "s1".into(),
            title: "Maths".into(),
            color: "#fff".into(),
            topics: vec![Topic {
                id: "t1".into(),
                name: "Limits".into(),
                is_completed: true,
                priority: None,
                deadline: None,
                links: vec![],
                images: vec![],
                note: None,
            }],
        })
        .unwrap();

        assert!(changes.has_changed().unwrap());
        assert!(!view.seed_offered());
        assert_eq!(view.subjects().len(), 1);
        assert_eq!(view.dashboard(now()).completed_tasks, 1);
    }

    #[test]
    fn dropping_the_view_releases_listeners() {
        let db = db();
        let view = LiveView::connect(&db);
        assert_eq!(db.listener_count(Subject::COLLECTION), 1);
        assert_eq!(db.listener_count(Exam::COLLECTION), 1);
        drop(view);
        assert_eq!(db.listener_count(Subject::COLLECTION), 0);
        assert_eq!(db.listener_count(Exam::COLLECTION), 0);
    }

    #[test]
    fn unreadable_store_reports_failure() {
        // No migrations: the documents table does not exist.
        let db = Database::open_memory().unwrap();
        let view = LiveView::connect(&db);
        assert!(matches!(view.state(), ConnectionState::Failed(_)));
        assert!(!view.seed_offered());
        assert_eq!(view.dashboard(now()).total_tasks, 0);
    }
}
