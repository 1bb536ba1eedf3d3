//! Domain models for SyllabusTrack.
//!
//! # Core Concepts
//!
//! ## Persisted Entities
//!
//! - [`Subject`]: One academic course. Owns an ordered list of [`Topic`]s which
//!   are embedded in the subject document and always rewritten as a whole.
//! - [`Exam`]: A dated (optionally timed) milestone, independent of subjects.
//!   Its `subject` is a free-text label, not a reference.
//! - [`Resource`], [`Note`], [`TopicImage`]: Ancillary content documents keyed
//!   by an owning identifier.
//!
//! ## Derived Entities
//!
//! Dashboard metrics live in [`crate::stats`] and are never persisted.

mod exam;
mod lenient;
mod note;
mod subject;

pub use exam::*;
pub use note::*;
pub use subject::*;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A typed document living in one collection of the store.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    /// Name of the collection the entity is stored in.
    const COLLECTION: &'static str;

    /// The document key. An empty id lets the store assign one.
    fn id(&self) -> &str;

    /// Normalizes a raw stored body before it is deserialized.
    ///
    /// The body already carries the document key in its `id` field.
    fn repair(_body: &mut Value) {}
}
