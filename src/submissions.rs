//! Public site forms (contact, newsletter, donation intent) and the
//! aggregate numbers shown on the admin dashboard.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gallery::GALLERY_COLLECTION;
use crate::storage::{to_fields, DocumentStore, DocumentStoreError, Query};

pub const CONTACTS_COLLECTION: &str = "contact_submissions";
pub const SUBSCRIBERS_COLLECTION: &str = "newsletter_subscribers";
pub const DONATIONS_COLLECTION: &str = "donations";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Invalid(String),
    #[error("Email already subscribed: {0}")]
    AlreadySubscribed(String),
    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocumentStoreError),
    #[error("Malformed record: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsletterSignup {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationForm {
    pub amount: f64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

// ============================================================================
// Stored records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    New,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub amount: f64,
    pub donor_name: String,
    pub donor_email: String,
    #[serde(default)]
    pub donor_phone: String,
    pub payment_method: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewContact<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
    status: ContactStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSubscriber<'a> {
    email: &'a str,
    name: &'a str,
    active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDonation<'a> {
    amount: f64,
    donor_name: &'a str,
    donor_email: &'a str,
    donor_phone: &'a str,
    payment_method: &'a str,
    status: DonationStatus,
}

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationTotals {
    pub total: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub donation_total: f64,
    pub completed_donations: u64,
    pub contacts: u64,
    pub new_contacts: u64,
    pub active_subscribers: u64,
    pub gallery_images: u64,
}

// ============================================================================
// Validation helpers
// ============================================================================

pub(crate) fn required(field: &str, value: &str) -> Result<String, SubmissionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SubmissionError::Invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_email(value: &str) -> Result<String, SubmissionError> {
    let trimmed = value.trim().to_lowercase();
    let valid = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !trimmed.chars().any(char::is_whitespace);
    if !valid {
        return Err(SubmissionError::Invalid(format!(
            "{value:?} is not a valid email address"
        )));
    }
    Ok(trimmed)
}

// ============================================================================
// Service
// ============================================================================

pub struct Submissions {
    documents: Arc<dyn DocumentStore>,
}

impl Submissions {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn submit_contact(&self, form: &ContactForm) -> Result<String, SubmissionError> {
        let name = required("name", &form.name)?;
        let email = normalize_email(&form.email)?;
        let message = required("message", &form.message)?;

        let record = NewContact {
            name: &name,
            email: &email,
            message: &message,
            status: ContactStatus::New,
        };
        let id = self
            .documents
            .insert(CONTACTS_COLLECTION, to_fields(&record).map_err(DocumentStoreError::from)?)
            .await?;

        tracing::debug!(id = %id, "Contact form submitted");
        Ok(id)
    }

    pub async fn subscribe(&self, signup: &NewsletterSignup) -> Result<String, SubmissionError> {
        let email = normalize_email(&signup.email)?;
        let name = signup.name.as_deref().unwrap_or_default().trim();

        let existing = self
            .documents
            .count(
                SUBSCRIBERS_COLLECTION,
                &Query::new().filter("email", email.as_str()),
            )
            .await?;
        if existing > 0 {
            return Err(SubmissionError::AlreadySubscribed(email));
        }

        let record = NewSubscriber {
            email: &email,
            name,
            active: true,
        };
        let id = self
            .documents
            .insert(SUBSCRIBERS_COLLECTION, to_fields(&record).map_err(DocumentStoreError::from)?)
            .await?;

        tracing::debug!(id = %id, "Newsletter subscription added");
        Ok(id)
    }

    /// Record donation intent. Donations start out pending.
    pub async fn record_donation(&self, form: &DonationForm) -> Result<String, SubmissionError> {
        if !form.amount.is_finite() || form.amount <= 0.0 {
            return Err(SubmissionError::Invalid(
                "amount must be greater than 0".to_string(),
            ));
        }
        let name = required("name", &form.name)?;
        let email = normalize_email(&form.email)?;
        let phone = form.phone.as_deref().unwrap_or_default().trim();
        let payment_method = form
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("online");

        let record = NewDonation {
            amount: form.amount,
            donor_name: &name,
            donor_email: &email,
            donor_phone: phone,
            payment_method,
            status: DonationStatus::Pending,
        };
        let id = self
            .documents
            .insert(DONATIONS_COLLECTION, to_fields(&record).map_err(DocumentStoreError::from)?)
            .await?;

        tracing::debug!(id = %id, amount = form.amount, "Donation recorded");
        Ok(id)
    }

    /// Sum and count of completed donations (the public impact counter).
    pub async fn donation_totals(&self) -> Result<DonationTotals, SubmissionError> {
        let completed = self
            .documents
            .query(
                DONATIONS_COLLECTION,
                &Query::new().filter("status", "completed"),
            )
            .await?;

        let total = completed
            .iter()
            .filter_map(|doc| doc.field("amount").and_then(|v| v.as_f64()))
            .sum();
        Ok(DonationTotals {
            total,
            count: completed.len() as u64,
        })
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, SubmissionError> {
        let totals = self.donation_totals().await?;
        let contacts = self
            .documents
            .count(CONTACTS_COLLECTION, &Query::new())
            .await?;
        let new_contacts = self
            .documents
            .count(CONTACTS_COLLECTION, &Query::new().filter("status", "new"))
            .await?;
        let active_subscribers = self
            .documents
            .count(SUBSCRIBERS_COLLECTION, &Query::new().filter("active", true))
            .await?;
        let gallery_images = self
            .documents
            .count(GALLERY_COLLECTION, &Query::new())
            .await?;

        Ok(DashboardStats {
            donation_total: totals.total,
            completed_donations: totals.count,
            contacts,
            new_contacts,
            active_subscribers,
            gallery_images,
        })
    }

    pub async fn recent_contacts(
        &self,
        limit: usize,
    ) -> Result<Vec<ContactSubmission>, SubmissionError> {
        self.recent(CONTACTS_COLLECTION, limit).await
    }

    pub async fn recent_donations(&self, limit: usize) -> Result<Vec<Donation>, SubmissionError> {
        self.recent(DONATIONS_COLLECTION, limit).await
    }

    pub async fn recent_subscribers(
        &self,
        limit: usize,
    ) -> Result<Vec<Subscriber>, SubmissionError> {
        self.recent(SUBSCRIBERS_COLLECTION, limit).await
    }

    async fn recent<T: DeserializeOwned>(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<T>, SubmissionError> {
        let docs = self
            .documents
            .query(collection, &Query::new().newest_first().limit(limit))
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(SubmissionError::from))
            .collect()
    }
}
