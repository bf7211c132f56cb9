use std::sync::Arc;

use serde_json::json;

use outreach_admin::gallery::GALLERY_COLLECTION;
use outreach_admin::storage::{Database, DocumentStore};
use outreach_admin::submissions::{
    ContactForm, ContactStatus, DonationForm, DonationStatus, NewsletterSignup, SubmissionError,
    Submissions, DONATIONS_COLLECTION,
};

fn setup() -> (tempfile::TempDir, Arc<Database>, Submissions) {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(dir.path().join("data")).unwrap());
    let submissions = Submissions::new(db.clone());
    (dir, db, submissions)
}

fn donation(amount: f64) -> DonationForm {
    DonationForm {
        amount,
        name: "Ravi".to_string(),
        email: "ravi@example.org".to_string(),
        phone: None,
        payment_method: None,
    }
}

async fn completed_donation(db: &Database, amount: f64) {
    let fields = json!({
        "amount": amount,
        "donorName": "Mei",
        "donorEmail": "mei@example.org",
        "donorPhone": "",
        "paymentMethod": "card",
        "status": "completed",
    });
    db.insert(DONATIONS_COLLECTION, fields.as_object().unwrap().clone())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_contact_submissions_start_as_new() {
    let (_dir, _db, submissions) = setup();

    submissions
        .submit_contact(&ContactForm {
            name: " Asha ".to_string(),
            email: "Asha@Example.org".to_string(),
            message: "Can I volunteer on weekends?".to_string(),
        })
        .await
        .unwrap();

    let contacts = submissions.recent_contacts(10).await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].name, "Asha");
    assert_eq!(contacts[0].email, "asha@example.org");
    assert_eq!(contacts[0].status, ContactStatus::New);
}

#[tokio::test]
async fn test_contact_requires_message() {
    let (_dir, _db, submissions) = setup();

    let err = submissions
        .submit_contact(&ContactForm {
            name: "Asha".to_string(),
            email: "asha@example.org".to_string(),
            message: "  ".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Invalid(_)));
    assert!(submissions.recent_contacts(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_subscription_is_rejected() {
    let (_dir, _db, submissions) = setup();
    let signup = |email: &str| NewsletterSignup {
        email: email.to_string(),
        name: Some("Friend".to_string()),
    };

    submissions.subscribe(&signup("friend@example.org")).await.unwrap();
    let err = submissions
        .subscribe(&signup("  FRIEND@example.org"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::AlreadySubscribed(ref e) if e == "friend@example.org"));
    let subscribers = submissions.recent_subscribers(10).await.unwrap();
    assert_eq!(subscribers.len(), 1);
    assert!(subscribers[0].active);
}

#[tokio::test]
async fn test_donations_are_recorded_as_pending() {
    let (_dir, _db, submissions) = setup();

    submissions.record_donation(&donation(50.0)).await.unwrap();

    let donations = submissions.recent_donations(10).await.unwrap();
    assert_eq!(donations.len(), 1);
    assert_eq!(donations[0].status, DonationStatus::Pending);
    assert_eq!(donations[0].payment_method, "online");
    assert_eq!(donations[0].amount, 50.0);
}

#[tokio::test]
async fn test_donation_amount_must_be_positive() {
    let (_dir, _db, submissions) = setup();

    for amount in [0.0, -10.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            submissions.record_donation(&donation(amount)).await,
            Err(SubmissionError::Invalid(_))
        ));
    }
}

#[tokio::test]
async fn test_totals_only_count_completed_donations() {
    let (_dir, db, submissions) = setup();
    submissions.record_donation(&donation(500.0)).await.unwrap();
    completed_donation(&db, 25.0).await;
    completed_donation(&db, 75.5).await;

    let totals = submissions.donation_totals().await.unwrap();

    assert_eq!(totals.count, 2);
    assert_eq!(totals.total, 100.5);
}

#[tokio::test]
async fn test_dashboard_stats_summarise_every_collection() {
    let (_dir, db, submissions) = setup();
    for (name, email) in [("A", "a@example.org"), ("B", "b@example.org")] {
        submissions
            .submit_contact(&ContactForm {
                name: name.to_string(),
                email: email.to_string(),
                message: "hello".to_string(),
            })
            .await
            .unwrap();
    }
    db.insert(
        "contact_submissions",
        json!({"name": "C", "email": "c@example.org", "message": "hi", "status": "read"})
            .as_object()
            .unwrap()
            .clone(),
    )
    .await
    .unwrap();
    submissions
        .subscribe(&NewsletterSignup {
            email: "reader@example.org".to_string(),
            name: None,
        })
        .await
        .unwrap();
    completed_donation(&db, 40.0).await;
    submissions.record_donation(&donation(10.0)).await.unwrap();
    db.insert(
        GALLERY_COLLECTION,
        json!({"title": "x", "active": true}).as_object().unwrap().clone(),
    )
    .await
    .unwrap();

    let stats = submissions.dashboard_stats().await.unwrap();

    assert_eq!(stats.donation_total, 40.0);
    assert_eq!(stats.completed_donations, 1);
    assert_eq!(stats.contacts, 3);
    assert_eq!(stats.new_contacts, 2);
    assert_eq!(stats.active_subscribers, 1);
    assert_eq!(stats.gallery_images, 1);
}

#[tokio::test]
async fn test_recent_lists_are_newest_first_and_limited() {
    let (_dir, _db, submissions) = setup();
    for n in 1..=5 {
        submissions
            .subscribe(&NewsletterSignup {
                email: format!("reader{n}@example.org"),
                name: None,
            })
            .await
            .unwrap();
    }

    let recent = submissions.recent_subscribers(3).await.unwrap();
    let emails: Vec<&str> = recent.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(
        emails,
        vec!["reader5@example.org", "reader4@example.org", "reader3@example.org"]
    );
}
