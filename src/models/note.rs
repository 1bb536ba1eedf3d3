use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{lenient, Entity};

/// Study material for one subject. The id is the owning subject's id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Resource {
    const COLLECTION: &'static str = "resources";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A freeform markdown note keyed by whatever it annotates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Image content stored out of line, referenced from a topic as `ref:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicImage {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    /// Data URL or remote URL of the image.
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
}

impl Entity for TopicImage {
    const COLLECTION: &'static str = "topic_images";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for saving a resource or note body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveContentInput {
    pub content: String,
}
