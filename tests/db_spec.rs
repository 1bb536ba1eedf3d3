use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde_json::json;
use speculate2::speculate;
use syllabus_track::db::Database;
use syllabus_track::models::*;
use syllabus_track::Error;

fn subject(id: &str, title: &str, topics: Vec<Topic>) -> Subject {
    Subject {
        id: id.to_string(),
        title: title.to_string(),
        color: "#3b82f6".to_string(),
        topics,
    }
}

fn topic(id: &str, name: &str) -> Topic {
    Topic {
        id: id.to_string(),
        name: name.to_string(),
        is_completed: false,
        priority: None,
        deadline: None,
        links: vec![],
        images: vec![],
        note: None,
    }
}

fn exam(id: &str, label: &str) -> Exam {
    Exam {
        id: id.to_string(),
        subject: label.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 12, 20),
        time: Some("1:00 PM - 4:00 PM".to_string()),
    }
}

/// Records every snapshot and error a subscription delivers.
struct Recorder<T> {
    snapshots: Arc<Mutex<Vec<Vec<T>>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Send + 'static> Recorder<T> {
    fn on_data(&self) -> impl Fn(Vec<T>) + Send + Sync + 'static {
        let snapshots = self.snapshots.clone();
        move |docs| snapshots.lock().unwrap().push(docs)
    }

    fn on_error(&self) -> impl Fn(Error) + Send + Sync + 'static {
        let errors = self.errors.clone();
        move |e| errors.lock().unwrap().push(e.to_string())
    }

    fn deliveries(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

impl<T: Clone> Recorder<T> {
    fn latest(&self) -> Vec<T> {
        self.snapshots.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "subscribe" {
        it "delivers the current snapshot immediately" {
            db.create(&subject("maths", "Maths", vec![])).expect("Failed to create");

            let rec = Recorder::<Subject>::default();
            let _sub = db.subscribe::<Subject, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            assert_eq!(rec.deliveries(), 1);
            assert_eq!(rec.latest()[0].id, "maths");
        }

        it "delivers a fresh full snapshot after each write" {
            let rec = Recorder::<Subject>::default();
            let _sub = db.subscribe::<Subject, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            db.create(&subject("a", "A", vec![])).expect("Failed to create");
            db.create(&subject("b", "B", vec![])).expect("Failed to create");

            assert_eq!(rec.deliveries(), 3);
            let ids: Vec<_> = rec.latest().into_iter().map(|s| s.id).collect();
            assert_eq!(ids, vec!["a", "b"]);
        }

        it "only notifies listeners of the written collection" {
            let rec = Recorder::<Exam>::default();
            let _sub = db.subscribe::<Exam, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            db.create(&subject("a", "A", vec![])).expect("Failed to create");

            assert_eq!(rec.deliveries(), 1);
        }

        it "stops delivering once unsubscribed" {
            let rec = Recorder::<Subject>::default();
            let sub = db.subscribe::<Subject, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");
            assert_eq!(db.listener_count(Subject::COLLECTION), 1);

            sub.unsubscribe();
            db.create(&subject("a", "A", vec![])).expect("Failed to create");

            assert_eq!(rec.deliveries(), 1);
            assert_eq!(db.listener_count(Subject::COLLECTION), 0);
        }

        it "reports a permission failure for unknown collections" {
            let errors = Arc::new(Mutex::new(Vec::<String>::new()));
            let sink = errors.clone();
            let result = db.subscribe_collection(
                "secrets",
                |_| {},
                move |e| sink.lock().unwrap().push(e.to_string()),
            );

            assert!(matches!(result, Err(Error::RemoteConnection { .. })));
            let errors = errors.lock().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("permission denied"));
            assert_eq!(db.listener_count("secrets"), 0);
        }

        it "injects the document key as the id" {
            db.create_document("subjects", Some("civics"), json!({ "title": "Civics", "topics": [] }))
                .expect("Failed to create");

            let rec = Recorder::<Subject>::default();
            let _sub = db.subscribe::<Subject, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            assert_eq!(rec.latest()[0].id, "civics");
            assert_eq!(rec.latest()[0].title, "Civics");
        }
    }

    describe "concurrent writers" {
        it "leaves a new subscriber on the latest state when a write races the subscription" {
            for _ in 0..300 {
                let store = Database::open_memory().expect("Failed to create database");
                store.migrate().expect("Failed to run migrations");

                let writer = {
                    let store = store.clone();
                    std::thread::spawn(move || {
                        store.create(&exam("race", "Civics")).expect("Failed to create");
                    })
                };
                let rec = Recorder::<Exam>::default();
                let _sub = store.subscribe::<Exam, _, _>(rec.on_data(), rec.on_error())
                    .expect("Failed to subscribe");
                writer.join().expect("Writer panicked");

                assert_eq!(rec.latest().len(), store.list::<Exam>().expect("Failed to list").len());
            }
        }

        it "never delivers an older snapshot after a newer one" {
            let rec = Recorder::<Exam>::default();
            let _sub = db.subscribe::<Exam, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            let writers: Vec<_> = (0..4)
                .map(|w| {
                    let db = db.clone();
                    std::thread::spawn(move || {
                        for i in 0..25 {
                            db.create(&exam(&format!("e{}-{}", w, i), "Civics"))
                                .expect("Failed to create");
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().expect("Writer panicked");
            }

            let lengths: Vec<usize> = rec.snapshots.lock().unwrap().iter().map(Vec::len).collect();
            assert!(lengths.windows(2).all(|w| w[0] < w[1]), "Out of order: {:?}", lengths);
            assert_eq!(lengths.last(), Some(&100));
        }
    }

    describe "typed reads" {
        it "defaults a missing topics field to an empty list" {
            db.create_document("subjects", Some("s"), json!({ "title": "No topics" }))
                .expect("Failed to create");

            let subjects = db.list::<Subject>().expect("Failed to list");
            assert!(subjects[0].topics.is_empty());
        }

        it "repairs topics without ids and drops non-object entries" {
            db.create_document("subjects", Some("s"), json!({
                "title": "Messy",
                "topics": [{ "name": "No id" }, "junk", { "id": "t2", "name": "Fine" }]
            })).expect("Failed to create");

            let subject = db.get::<Subject>("s").expect("Failed to get").expect("Missing");
            assert_eq!(subject.topics.len(), 2);
            assert!(subject.topics[0].id.starts_with("repaired-"));
            assert_eq!(subject.topics[1].id, "t2");
        }

        it "reads unknown priorities and bad deadlines as absent" {
            db.create_document("subjects", Some("s"), json!({
                "title": "Odd",
                "topics": [{ "id": "t", "name": "T", "priority": "Urgent", "deadline": "soon" }]
            })).expect("Failed to create");

            let subject = db.get::<Subject>("s").expect("Failed to get").expect("Missing");
            assert!(subject.topics[0].priority.is_none());
            assert!(subject.topics[0].deadline.is_none());
        }

        it "migrates a legacy link into the links list" {
            db.create_document("subjects", Some("s"), json!({
                "title": "Old",
                "topics": [{ "id": "t", "name": "T", "link": "https://example.com" }]
            })).expect("Failed to create");

            let subject = db.get::<Subject>("s").expect("Failed to get").expect("Missing");
            let links = &subject.topics[0].links;
            assert_eq!(links.len(), 1);
            assert_eq!(links[0].id, LEGACY_LINK_ID);
            assert_eq!(links[0].url, "https://example.com");
        }
    }

    describe "create" {
        it "generates a key when the id is empty" {
            let key = db.create(&subject("", "Generated", vec![])).expect("Failed to create");

            assert!(!key.is_empty());
            let stored = db.get::<Subject>(&key).expect("Failed to get").expect("Missing");
            assert_eq!(stored.title, "Generated");
        }

        it "overwrites a document with the same key" {
            db.create(&subject("s", "First", vec![])).expect("Failed to create");
            db.create(&subject("s", "Second", vec![])).expect("Failed to create");

            let subjects = db.list::<Subject>().expect("Failed to list");
            assert_eq!(subjects.len(), 1);
            assert_eq!(subjects[0].title, "Second");
        }

        it "strips null fields and null array items before writing" {
            db.create_document("subjects", Some("s"), json!({
                "title": "S",
                "color": null,
                "topics": [null, { "id": "t", "name": "T", "deadline": null }]
            })).expect("Failed to create");

            let raw = db.fetch("subjects", "s").expect("Failed to fetch").expect("Missing");
            assert_eq!(raw.body, json!({
                "title": "S",
                "topics": [{ "id": "t", "name": "T" }]
            }));
        }

        it "rejects writes to unknown collections" {
            let result = db.create_document("secrets", None, json!({ "a": 1 }));
            assert!(matches!(result, Err(Error::RemoteWrite { .. })));
        }

        it "rejects non-object documents" {
            let result = db.create_document("subjects", Some("s"), json!([1, 2]));
            assert!(matches!(result, Err(Error::RemoteWrite { .. })));
        }
    }

    describe "replace_field" {
        it "replaces one field and leaves the rest" {
            db.create(&subject("s", "Maths", vec![topic("t1", "Limits")])).expect("Failed to create");

            db.replace_field("subjects", "s", "topics", json!([])).expect("Failed to replace");

            let stored = db.get::<Subject>("s").expect("Failed to get").expect("Missing");
            assert_eq!(stored.title, "Maths");
            assert!(stored.topics.is_empty());
        }

        it "fails when the document does not exist" {
            let result = db.replace_field("subjects", "missing", "topics", json!([]));
            assert!(matches!(result, Err(Error::RemoteWrite { .. })));
        }

        it "notifies subscribers" {
            db.create(&subject("s", "Maths", vec![])).expect("Failed to create");
            let rec = Recorder::<Subject>::default();
            let _sub = db.subscribe::<Subject, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            db.replace_field("subjects", "s", "topics", json!([{ "id": "t", "name": "New" }]))
                .expect("Failed to replace");

            assert_eq!(rec.deliveries(), 2);
            assert_eq!(rec.latest()[0].topics[0].name, "New");
        }
    }

    describe "remove" {
        it "deletes the document" {
            db.create(&exam("e1", "Micro")).expect("Failed to create");
            db.remove("exams", "e1").expect("Failed to remove");
            assert!(db.list::<Exam>().expect("Failed to list").is_empty());
        }

        it "succeeds for a missing document without notifying" {
            let rec = Recorder::<Exam>::default();
            let _sub = db.subscribe::<Exam, _, _>(rec.on_data(), rec.on_error())
                .expect("Failed to subscribe");

            db.remove("exams", "nope").expect("Remove should be idempotent");
            assert_eq!(rec.deliveries(), 1);
        }
    }

    describe "seed" {
        it "writes all documents when the store is empty" {
            let seeded = db
                .seed(&[subject("s", "S", vec![])], &[exam("e", "E")])
                .expect("Failed to seed");

            assert!(seeded);
            assert_eq!(db.list::<Subject>().expect("list").len(), 1);
            assert_eq!(db.list::<Exam>().expect("list").len(), 1);
        }

        it "does nothing when exams already exist" {
            db.create(&exam("e", "E")).expect("Failed to create");

            let seeded = db
                .seed(&[subject("s", "S", vec![])], &[exam("e2", "E2")])
                .expect("Failed to seed");

            assert!(!seeded);
            assert!(db.list::<Subject>().expect("list").is_empty());
            assert_eq!(db.list::<Exam>().expect("list").len(), 1);
        }
    }

    describe "clear_all" {
        it "removes subjects, exams and resources but keeps notes" {
            db.create(&subject("s", "S", vec![])).expect("create");
            db.create(&exam("e", "E")).expect("create");
            db.create(&Resource { id: "s".into(), content: "book".into(), updated_at: None }).expect("create");
            db.create(&Note { id: "n".into(), content: "remember".into(), updated_at: None }).expect("create");

            db.clear_all().expect("Failed to clear");

            assert!(db.is_empty("subjects").expect("read"));
            assert!(db.is_empty("exams").expect("read"));
            assert!(db.is_empty("resources").expect("read"));
            assert!(!db.is_empty("notes").expect("read"));
        }
    }

    describe "on-disk store" {
        it "persists documents across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("track.db");

            {
                let db = Database::open(path.clone()).expect("Failed to open");
                db.migrate().expect("Failed to migrate");
                db.create(&subject("s", "Kept", vec![])).expect("Failed to create");
            }

            let db = Database::open(path).expect("Failed to reopen");
            db.migrate().expect("Failed to migrate");
            let subjects = db.list::<Subject>().expect("Failed to list");
            assert_eq!(subjects[0].title, "Kept");
        }
    }
}
