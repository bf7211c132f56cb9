//! Community events shown on the public site and the registrations
//! visitors make for them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{to_fields, DocumentStore, DocumentStoreError, Query};
use crate::submissions::{normalize_email, required, SubmissionError};

pub const EVENTS_COLLECTION: &str = "events";
pub const REGISTRATIONS_COLLECTION: &str = "event_registrations";

/// How many upcoming events the public listing shows.
pub const UPCOMING_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocumentStoreError),
    #[error("Malformed record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<SubmissionError> for EventError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::DocumentStore(e) => EventError::DocumentStore(e),
            SubmissionError::Decode(e) => EventError::Decode(e),
            other => EventError::Invalid(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEvent<'a> {
    title: &'a str,
    description: &'a str,
    event_date: DateTime<Utc>,
    location: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRegistration<'a> {
    event_id: &'a str,
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    status: RegistrationStatus,
}

pub struct Events {
    documents: Arc<dyn DocumentStore>,
}

impl Events {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn create(&self, form: &EventForm) -> Result<String, EventError> {
        let title = required("title", &form.title)?;
        let description = form.description.as_deref().unwrap_or_default().trim();
        let location = form.location.as_deref().unwrap_or_default().trim();

        let record = NewEvent {
            title: &title,
            description,
            event_date: form.event_date,
            location,
        };
        let id = self
            .documents
            .insert(EVENTS_COLLECTION, to_fields(&record).map_err(DocumentStoreError::from)?)
            .await?;

        tracing::debug!(id = %id, event_date = %form.event_date, "Event created");
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Event>, EventError> {
        match self.documents.get(EVENTS_COLLECTION, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Events on or after `now`, soonest first, at most `limit` of them.
    pub async fn upcoming(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Event>, EventError> {
        let docs = self.documents.query(EVENTS_COLLECTION, &Query::new()).await?;

        let mut events = Vec::with_capacity(docs.len());
        for doc in &docs {
            let event: Event = doc.decode()?;
            if event.event_date >= now {
                events.push(event);
            }
        }
        events.sort_by(|a, b| a.event_date.cmp(&b.event_date).then_with(|| a.id.cmp(&b.id)));
        events.truncate(limit);
        Ok(events)
    }

    /// Register a visitor for an existing event. Registrations are
    /// confirmed immediately.
    pub async fn register(
        &self,
        event_id: &str,
        form: &RegistrationForm,
    ) -> Result<String, EventError> {
        let name = required("name", &form.name)?;
        let email = normalize_email(&form.email)?;
        let phone = form.phone.as_deref().unwrap_or_default().trim();

        if self.documents.get(EVENTS_COLLECTION, event_id).await?.is_none() {
            return Err(EventError::NotFound(event_id.to_string()));
        }

        let record = NewRegistration {
            event_id,
            name: &name,
            email: &email,
            phone,
            status: RegistrationStatus::Confirmed,
        };
        let id = self
            .documents
            .insert(
                REGISTRATIONS_COLLECTION,
                to_fields(&record).map_err(DocumentStoreError::from)?,
            )
            .await?;

        tracing::debug!(id = %id, event_id = %event_id, "Event registration added");
        Ok(id)
    }

    /// Registrations for one event, in the order they arrived.
    pub async fn registrations(&self, event_id: &str) -> Result<Vec<Registration>, EventError> {
        if self.documents.get(EVENTS_COLLECTION, event_id).await?.is_none() {
            return Err(EventError::NotFound(event_id.to_string()));
        }

        let docs = self
            .documents
            .query(
                REGISTRATIONS_COLLECTION,
                &Query::new().filter("eventId", event_id),
            )
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(EventError::from))
            .collect()
    }
}
