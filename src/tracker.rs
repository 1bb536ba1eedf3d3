//! Domain mutations over subjects, topics, exams and ancillary documents.
//!
//! Topic changes read the owning subject, modify its topic list in memory and
//! write the whole list back with [`Database::replace_field`]. There is no
//! per-subject lock: two writers racing on the same subject each rewrite the
//! full array and the later write wins.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::*;
use crate::seed;
use crate::stats::Dashboard;

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Trims `value` and rejects it when nothing is left.
fn require(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::warn!("Rejected empty {}", what);
        return Err(Error::Validation(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct Tracker {
    db: Database,
}

impl Tracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn subjects(&self) -> Result<Vec<Subject>> {
        self.db.list::<Subject>()
    }

    pub fn exams(&self) -> Result<Vec<Exam>> {
        self.db.list::<Exam>()
    }

    pub fn subject(&self, id: &str) -> Result<Subject> {
        self.db
            .get::<Subject>(id)?
            .ok_or_else(|| Error::NotFound(format!("Subject '{}'", id)))
    }

    pub fn dashboard(&self, now: NaiveDateTime) -> Result<Dashboard> {
        let subjects = self.subjects()?;
        let exams = self.exams()?;
        Ok(Dashboard::compute(&subjects, &exams, now))
    }

    // ============================================================
    // Subjects
    // ============================================================

    /// Stores a whole subject. An empty id is replaced with a fresh one, as
    /// are empty topic ids. Topic ids must be unique within the subject.
    pub fn add_subject(&self, mut subject: Subject) -> Result<Subject> {
        subject.title = require(&subject.title, "Subject title")?;
        if subject.id.trim().is_empty() {
            subject.id = new_id("subj");
        }
        let mut seen = HashSet::new();
        for topic in &mut subject.topics {
            topic.name = require(&topic.name, "Topic name")?;
            if topic.id.is_empty() {
                topic.id = new_id("topic");
            }
            if !seen.insert(topic.id.clone()) {
                tracing::warn!("Rejected subject with duplicate topic id {}", topic.id);
                return Err(Error::Validation(format!(
                    "Topic id '{}' appears more than once",
                    topic.id
                )));
            }
        }

        self.db.create(&subject)?;
        tracing::info!(
            "Added subject {} with {} topics",
            subject.id,
            subject.topics.len()
        );
        Ok(subject)
    }

    pub fn create_subject(&self, input: CreateSubjectInput) -> Result<Subject> {
        let topics = input
            .topics
            .into_iter()
            .map(new_topic)
            .collect::<Result<Vec<_>>>()?;
        self.add_subject(Subject {
            id: String::new(),
            title: input.title,
            color: input.color.unwrap_or_else(|| "#84cc16".to_string()),
            topics,
        })
    }

    /// Deletes the subject document and with it all of its topics.
    pub fn delete_subject(&self, id: &str) -> Result<()> {
        self.db.remove(Subject::COLLECTION, id)?;
        tracing::info!("Deleted subject {}", id);
        Ok(())
    }

    // ============================================================
    // Topics
    // ============================================================

    fn write_topics(&self, subject_id: &str, topics: &[Topic]) -> Result<()> {
        let value = serde_json::to_value(topics)
            .map_err(|e| Error::write(Subject::COLLECTION, e))?;
        self.db
            .replace_field(Subject::COLLECTION, subject_id, "topics", value)
    }

    /// Applies `change` to one topic and rewrites the subject's topic list.
    fn update_topic<F>(&self, subject_id: &str, topic_id: &str, change: F) -> Result<Topic>
    where
        F: FnOnce(&mut Topic) -> Result<()>,
    {
        let mut subject = self.subject(subject_id)?;
        let topic = subject
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| {
                Error::NotFound(format!("Topic '{}' in subject '{}'", topic_id, subject_id))
            })?;

        change(topic)?;
        let updated = topic.clone();

        self.write_topics(subject_id, &subject.topics)?;
        Ok(updated)
    }

    /// Flips the completion flag of exactly one topic.
    pub fn toggle_topic_completion(&self, subject_id: &str, topic_id: &str) -> Result<Topic> {
        let topic = self.update_topic(subject_id, topic_id, |t| {
            t.is_completed = !t.is_completed;
            Ok(())
        })?;
        tracing::info!(
            "Toggled topic {}/{} to completed={}",
            subject_id,
            topic_id,
            topic.is_completed
        );
        Ok(topic)
    }

    /// Appends a pending topic with a fresh id.
    pub fn add_topic(&self, subject_id: &str, input: NewTopicInput) -> Result<Topic> {
        let topic = new_topic(input)?;
        let mut subject = self.subject(subject_id)?;
        subject.topics.push(topic.clone());
        self.write_topics(subject_id, &subject.topics)?;
        tracing::info!("Added topic {} to subject {}", topic.id, subject_id);
        Ok(topic)
    }

    /// Replaces the topic with the same id, keeping its position.
    pub fn edit_topic(&self, subject_id: &str, mut updated: Topic) -> Result<Topic> {
        updated.name = require(&updated.name, "Topic name")?;
        let topic_id = updated.id.clone();
        let topic = self.update_topic(subject_id, &topic_id, move |t| {
            *t = updated;
            Ok(())
        })?;
        tracing::info!("Edited topic {}/{}", subject_id, topic_id);
        Ok(topic)
    }

    /// Removes a topic. Returns `false` when it was not there.
    pub fn delete_topic(&self, subject_id: &str, topic_id: &str) -> Result<bool> {
        let mut subject = self.subject(subject_id)?;
        let before = subject.topics.len();
        subject.topics.retain(|t| t.id != topic_id);
        if subject.topics.len() == before {
            return Ok(false);
        }
        self.write_topics(subject_id, &subject.topics)?;
        tracing::info!("Deleted topic {}/{}", subject_id, topic_id);
        Ok(true)
    }

    pub fn set_topic_note(&self, subject_id: &str, topic_id: &str, note: Option<String>) -> Result<Topic> {
        let note = note.filter(|n| !n.trim().is_empty());
        self.update_topic(subject_id, topic_id, |t| {
            t.note = note;
            Ok(())
        })
    }

    pub fn add_topic_link(&self, subject_id: &str, topic_id: &str, input: AddLinkInput) -> Result<LinkItem> {
        let url = require(&input.url, "Link url")?;
        let link = LinkItem {
            id: new_id("link"),
            title: input
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| url.clone()),
            url,
        };
        let added = link.clone();
        self.update_topic(subject_id, topic_id, |t| {
            t.links.push(link);
            Ok(())
        })?;
        Ok(added)
    }

    pub fn remove_topic_link(&self, subject_id: &str, topic_id: &str, link_id: &str) -> Result<Topic> {
        self.update_topic(subject_id, topic_id, |t| {
            t.links.retain(|l| l.id != link_id);
            Ok(())
        })
    }

    /// Attaches an already-uploaded image to a topic.
    pub fn add_topic_image(&self, subject_id: &str, topic_id: &str, input: AddImageInput) -> Result<ImageItem> {
        let url = require(&input.url, "Image url")?;
        let image = ImageItem {
            id: new_id("img"),
            source: ImageSource::parse(&url),
            created_at: Some(Utc::now()),
        };
        let added = image.clone();
        self.update_topic(subject_id, topic_id, |t| {
            t.images.push(image);
            Ok(())
        })?;
        Ok(added)
    }

    pub fn remove_topic_image(&self, subject_id: &str, topic_id: &str, image_id: &str) -> Result<Topic> {
        self.update_topic(subject_id, topic_id, |t| {
            t.images.retain(|i| i.id != image_id);
            Ok(())
        })
    }

    /// The topic's images with deferred references replaced by their stored
    /// content. References that do not resolve are returned unchanged.
    pub fn resolve_topic_images(&self, subject_id: &str, topic_id: &str) -> Result<Vec<ImageItem>> {
        let subject = self.subject(subject_id)?;
        let topic = subject.topic(topic_id).ok_or_else(|| {
            Error::NotFound(format!("Topic '{}' in subject '{}'", topic_id, subject_id))
        })?;

        topic
            .images
            .iter()
            .map(|image| {
                let ImageSource::Reference(ref_id) = &image.source else {
                    return Ok(image.clone());
                };
                Ok(match self.db.get::<TopicImage>(ref_id)? {
                    Some(stored) => ImageItem {
                        source: ImageSource::Url(stored.content),
                        ..image.clone()
                    },
                    None => image.clone(),
                })
            })
            .collect()
    }

    // ============================================================
    // Exams
    // ============================================================

    pub fn add_exam(&self, mut exam: Exam) -> Result<Exam> {
        exam.subject = require(&exam.subject, "Exam subject")?;
        if exam.date.is_none() {
            return Err(Error::Validation("Exam date is required".to_string()));
        }
        exam.time = exam
            .time
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if exam.id.trim().is_empty() {
            exam.id = new_id("exam");
        }

        self.db.create(&exam)?;
        tracing::info!("Added exam {} for {}", exam.id, exam.subject);
        Ok(exam)
    }

    pub fn create_exam(&self, input: CreateExamInput) -> Result<Exam> {
        self.add_exam(Exam {
            id: String::new(),
            subject: input.subject,
            date: Some(input.date),
            time: input.time,
        })
    }

    pub fn delete_exam(&self, id: &str) -> Result<()> {
        self.db.remove(Exam::COLLECTION, id)?;
        tracing::info!("Deleted exam {}", id);
        Ok(())
    }

    // ============================================================
    // Resources and notes
    // ============================================================

    pub fn get_resource(&self, subject_id: &str) -> Result<Option<Resource>> {
        self.db.get::<Resource>(subject_id)
    }

    pub fn save_resource(&self, subject_id: &str, content: String) -> Result<Resource> {
        let resource = Resource {
            id: require(subject_id, "Resource id")?,
            content,
            updated_at: Some(Utc::now()),
        };
        self.db.create(&resource)?;
        Ok(resource)
    }

    pub fn get_note(&self, id: &str) -> Result<Option<Note>> {
        self.db.get::<Note>(id)
    }

    pub fn save_note(&self, id: &str, content: String) -> Result<Note> {
        let note = Note {
            id: require(id, "Note id")?,
            content,
            updated_at: Some(Utc::now()),
        };
        self.db.create(&note)?;
        Ok(note)
    }

    // ============================================================
    // Dataset administration
    // ============================================================

    /// Loads the starter dataset if both subjects and exams are empty.
    pub fn seed(&self, today: NaiveDate) -> Result<bool> {
        self.db
            .seed(&seed::initial_subjects(today), &seed::initial_exams(today))
    }

    pub fn clear_all(&self) -> Result<()> {
        self.db.clear_all()
    }
}

fn new_topic(input: NewTopicInput) -> Result<Topic> {
    let name = require(&input.name, "Topic name")?;
    let links = input
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .map(|url| LinkItem {
            id: new_id("link"),
            title: "Link".to_string(),
            url,
        })
        .into_iter()
        .collect();

    Ok(Topic {
        id: new_id("topic"),
        name,
        is_completed: false,
        priority: input.priority,
        deadline: input.deadline,
        links,
        images: Vec::new(),
        note: None,
    })
}
