use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::auth::RequireAdmin;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::submissions::{
    ContactForm, ContactSubmission, DashboardStats, Donation, DonationForm, DonationTotals,
    NewsletterSignup, Subscriber,
};
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 500;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListParams {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

// ============================================================================
// Public forms
// ============================================================================

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    AppJson(form): AppJson<ContactForm>,
) -> Result<(StatusCode, Json<JSend<CreatedResponse>>), ApiError> {
    let id = state.submissions.submit_contact(&form).await?;
    Ok((StatusCode::CREATED, JSend::success(CreatedResponse { id })))
}

pub async fn subscribe_newsletter(
    State(state): State<Arc<AppState>>,
    AppJson(signup): AppJson<NewsletterSignup>,
) -> Result<(StatusCode, Json<JSend<CreatedResponse>>), ApiError> {
    let id = state.submissions.subscribe(&signup).await?;
    Ok((StatusCode::CREATED, JSend::success(CreatedResponse { id })))
}

pub async fn create_donation(
    State(state): State<Arc<AppState>>,
    AppJson(form): AppJson<DonationForm>,
) -> Result<(StatusCode, Json<JSend<CreatedResponse>>), ApiError> {
    let id = state.submissions.record_donation(&form).await?;
    Ok((StatusCode::CREATED, JSend::success(CreatedResponse { id })))
}

pub async fn donation_total(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<DonationTotals>>, ApiError> {
    let totals = state.submissions.donation_totals().await?;
    Ok(JSend::success(totals))
}

// ============================================================================
// Admin dashboard
// ============================================================================

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<JSend<DashboardStats>>, ApiError> {
    let stats = state.submissions.dashboard_stats().await?;
    Ok(JSend::success(stats))
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<JSend<Vec<ContactSubmission>>>, ApiError> {
    let contacts = state.submissions.recent_contacts(params.limit()).await?;
    Ok(JSend::success(contacts))
}

pub async fn list_donations(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<JSend<Vec<Donation>>>, ApiError> {
    let donations = state.submissions.recent_donations(params.limit()).await?;
    Ok(JSend::success(donations))
}

pub async fn list_subscribers(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<JSend<Vec<Subscriber>>>, ApiError> {
    let subscribers = state.submissions.recent_subscribers(params.limit()).await?;
    Ok(JSend::success(subscribers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Actor;

    fn admin() -> RequireAdmin {
        RequireAdmin(Actor::new("admin-1", "admin@example.org"))
    }

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(ListParams::default().limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(ListParams { limit: Some(0) }.limit(), 1);
        assert_eq!(ListParams { limit: Some(10_000) }.limit(), MAX_LIST_LIMIT);
    }

    #[tokio::test]
    async fn duplicate_newsletter_signup_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::testutil::test_state(&dir);
        let signup = || NewsletterSignup {
            email: "Friend@Example.org".to_string(),
            name: None,
        };

        let (status, _) = subscribe_newsletter(State(state.clone()), AppJson(signup()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = subscribe_newsletter(State(state.clone()), AppJson(signup()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let Json(list) = list_subscribers(State(state), admin(), AppQuery(ListParams::default()))
            .await
            .unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].email, "friend@example.org");
    }

    #[tokio::test]
    async fn invalid_donation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::testutil::test_state(&dir);

        let err = create_donation(
            State(state),
            AppJson(DonationForm {
                amount: -5.0,
                name: "Asha".to_string(),
                email: "asha@example.org".to_string(),
                phone: None,
                payment_method: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
