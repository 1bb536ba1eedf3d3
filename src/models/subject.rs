use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{lenient, Entity};

/// One academic course and its embedded work items.
///
/// Topics are stored inside the subject document. Any change to a single
/// topic rewrites the whole `topics` array, so two sessions editing the same
/// subject concurrently resolve as last-writer-wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    /// Display tag only, e.g. `#3b82f6`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub color: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub topics: Vec<Topic>,
}

impl Subject {
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    pub fn completed_count(&self) -> usize {
        self.topics.iter().filter(|t| t.is_completed).count()
    }

    pub fn remaining_count(&self) -> usize {
        self.topics.len() - self.completed_count()
    }
}

impl Entity for Subject {
    const COLLECTION: &'static str = "subjects";

    fn id(&self) -> &str {
        &self.id
    }

    /// Drops non-object topics, gives id-less topics a repaired id and folds
    /// the legacy single `link` into `links`.
    ///
    /// A repaired id is derived from the subject key and the topic's stored
    /// position, so every read yields the same id until the topic list is
    /// written back (which persists it).
    fn repair(body: &mut Value) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };
        let subject_id = obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let topics = match obj.remove("topics") {
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .filter(|(_, t)| t.is_object())
                .map(|(index, t)| repair_topic(t, &subject_id, index))
                .collect(),
            _ => Vec::new(),
        };
        obj.insert("topics".to_string(), Value::Array(topics));
    }
}

/// Id given to a link migrated from the legacy single-link field.
pub const LEGACY_LINK_ID: &str = "legacy-link";

/// Id given to a stored topic that has none.
pub fn repaired_topic_id(subject_id: &str, index: usize) -> String {
    format!("repaired-{}-{}", subject_id, index)
}

fn repair_topic(mut topic: Value, subject_id: &str, index: usize) -> Value {
    let Some(obj) = topic.as_object_mut() else {
        return topic;
    };

    let has_id = matches!(obj.get("id"), Some(Value::String(s)) if !s.is_empty());
    if !has_id {
        obj.insert(
            "id".to_string(),
            Value::String(repaired_topic_id(subject_id, index)),
        );
    }

    if let Some(Value::String(url)) = obj.remove("link") {
        let url = url.trim().to_string();
        if !url.is_empty() {
            let links = obj
                .entry("links")
                .or_insert_with(|| Value::Array(Vec::new()));
            if !links.is_array() {
                *links = Value::Array(Vec::new());
            }
            if let Value::Array(items) = links {
                let known = items
                    .iter()
                    .any(|l| l.get("url").and_then(Value::as_str) == Some(url.as_str()));
                if !known {
                    items.insert(
                        0,
                        serde_json::json!({ "id": LEGACY_LINK_ID, "title": "Link", "url": url }),
                    );
                }
            }
        }
    }

    topic
}

/// One unit of work within a subject.
///
/// `id` is only unique within the owning subject's topic list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "isCompleted", default, deserialize_with = "lenient::flag")]
    pub is_completed: bool,
    /// A topic without priority is unscored for the priority mix.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::priority"
    )]
    pub priority: Option<Priority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::date"
    )]
    pub deadline: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient::list"
    )]
    pub links: Vec<LinkItem>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient::list"
    )]
    pub images: Vec<ImageItem>,
    /// Markdown note content.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub note: Option<String>,
}

/// Three-level priority classification of a topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
}

/// An image attached to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(rename = "url")]
    pub source: ImageSource,
    #[serde(
        rename = "createdAt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where the image bytes live.
///
/// Stored as a single string: either a URL (CDN or inline data URL) or
/// `ref:<image-id>` pointing into the `topic_images` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Reference(String),
}

const REFERENCE_PREFIX: &str = "ref:";

impl ImageSource {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(REFERENCE_PREFIX) {
            Some(id) => Self::Reference(id.to_string()),
            None => Self::Url(raw.to_string()),
        }
    }

    pub fn as_stored(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Reference(id) => format!("{}{}", REFERENCE_PREFIX, id),
        }
    }
}

impl Serialize for ImageSource {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_stored())
    }
}

impl<'de> Deserialize<'de> for ImageSource {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Self::parse(&raw))
    }
}

/// Input for creating a new subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubjectInput {
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Initial topics, in display order.
    #[serde(default)]
    pub topics: Vec<NewTopicInput>,
}

/// Input for appending a topic to a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopicInput {
    pub name: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// A single URL, stored as the first link item.
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLinkInput {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddImageInput {
    /// A URL returned by the media service, or `ref:<image-id>`.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNoteInput {
    /// `None` or an empty string removes the note.
    #[serde(default)]
    pub note: Option<String>,
}
