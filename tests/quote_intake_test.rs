mod common;

use axum::http::StatusCode;
use common::{harness, harness_with, post_devis, valid_body, FakeMailer, FakeQuoteRepo, FakeStorage, MultipartBody};
use devis_backend::model::quote::{QuoteStatus, ServiceKind};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn valid_submission_persists_and_notifies() {
    let h = harness();
    let resp = h.app.clone().oneshot(post_devis(valid_body().build())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["ok"], true);
    let quote_id = body["quoteId"].as_str().unwrap();
    assert!(!quote_id.is_empty());

    let quotes = h.quote_repo.quotes.lock().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].status, QuoteStatus::New);
    assert_eq!(quotes[0].service, ServiceKind::Sofa);
    assert_eq!(quotes[0].meta.user_agent.as_deref(), Some("integration-test/1.0"));

    // Owner notification first, then customer confirmation.
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].reply_to.as_deref(), Some("alice@example.com"));
    assert_eq!(sent[1].to, "alice@example.com");
    assert_eq!(sent[1].reply_to.as_deref(), Some("owner@example.com"));

    let events = h.event_repo.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "quote_created");
}

#[tokio::test]
async fn missing_contact_is_rejected_without_persistence() {
    let h = harness();
    let body = MultipartBody::new()
        .field("service", "sofa")
        .field("city", "Paris")
        .field("postalCode", "75012")
        .field("name", "Alice Martin")
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = json_body(resp).await;
    assert_eq!(body["ok"], false);
    assert!(h.quote_repo.quotes.lock().unwrap().is_empty());
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_email_is_rejected() {
    let h = harness();
    let body = MultipartBody::new()
        .field("service", "sofa")
        .field("city", "Paris")
        .field("postalCode", "75012")
        .field("name", "Alice Martin")
        .field("email", "foo@bar")
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["debug"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["field"] == "email"));
}

#[tokio::test]
async fn short_phone_is_rejected() {
    let h = harness();
    let body = MultipartBody::new()
        .field("service", "rug")
        .field("city", "Lyon")
        .field("postalCode", "69001")
        .field("name", "Bob Durand")
        .field("phone", "12 34 56")
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.quote_repo.quotes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_photo_payload_is_rejected_with_413() {
    let h = harness();
    let huge = vec![0u8; 25 * 1024 * 1024 + 1];
    let body = valid_body().photo("enorme.jpg", "image/jpeg", &huge).build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(h.quote_repo.quotes.lock().unwrap().is_empty());
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn photos_are_uploaded_and_attached() {
    let h = harness();
    let body = valid_body()
        .photo("salon.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0])
        .photo("chambre.png", "image/png", &[0x89, 0x50, 0x4E, 0x47])
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(h.storage.objects.lock().unwrap().len(), 2);

    let quotes = h.quote_repo.quotes.lock().unwrap();
    let photos = quotes[0].photos.as_ref().unwrap();
    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0].filename, "salon.jpg");
    assert!(photos[0].path.ends_with(".jpg"));
    assert!(photos[0]
        .public_url
        .as_deref()
        .unwrap()
        .starts_with("https://cdn.test/devis-photos/"));

    // Originals ride along on the owner notification.
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent[0].attachments.len(), 2);
}

#[tokio::test]
async fn failed_upload_is_skipped_not_fatal() {
    let h = harness_with(
        FakeQuoteRepo::default(),
        FakeStorage {
            fail_from: Some(1),
            ..FakeStorage::default()
        },
        FakeMailer::default(),
    );
    let body = valid_body()
        .photo("ok.jpg", "image/jpeg", &[1, 2, 3])
        .photo("ko.jpg", "image/jpeg", &[4, 5, 6])
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let quotes = h.quote_repo.quotes.lock().unwrap();
    let photos = quotes[0].photos.as_ref().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].filename, "ok.jpg");
    assert_eq!(h.mailer.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn all_uploads_failing_leaves_an_empty_photo_list() {
    let h = harness_with(
        FakeQuoteRepo::default(),
        FakeStorage {
            fail_from: Some(0),
            ..FakeStorage::default()
        },
        FakeMailer::default(),
    );
    let body = valid_body().photo("ko.jpg", "image/jpeg", &[1, 2, 3]).build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The photo pass ran, so the field is an empty array, not null.
    let quotes = h.quote_repo.quotes.lock().unwrap();
    let photos = quotes[0].photos.as_ref().unwrap();
    assert!(photos.is_empty());
}

#[tokio::test]
async fn insert_failure_returns_500() {
    let h = harness_with(
        FakeQuoteRepo {
            fail_create: true,
            ..FakeQuoteRepo::default()
        },
        FakeStorage::default(),
        FakeMailer::default(),
    );
    let resp = h.app.clone().oneshot(post_devis(valid_body().build())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["ok"], false);
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn owner_email_failure_returns_502_but_keeps_the_quote() {
    let h = harness_with(
        FakeQuoteRepo::default(),
        FakeStorage::default(),
        FakeMailer {
            fail_recipient: Some("owner@example.com".to_string()),
            ..FakeMailer::default()
        },
    );
    let resp = h.app.clone().oneshot(post_devis(valid_body().build())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(resp).await;
    assert_eq!(body["ok"], false);
    assert!(body["debug"]["reason"].as_str().is_some());

    // The row stays; the owner can still find it in the admin list.
    assert_eq!(h.quote_repo.quotes.lock().unwrap().len(), 1);
    // No customer confirmation after a failed owner notification.
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn customer_email_failure_is_not_fatal() {
    let h = harness_with(
        FakeQuoteRepo::default(),
        FakeStorage::default(),
        FakeMailer {
            fail_recipient: Some("alice@example.com".to_string()),
            ..FakeMailer::default()
        },
    );
    let resp = h.app.clone().oneshot(post_devis(valid_body().build())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.com");
}

#[tokio::test]
async fn duplicate_submissions_create_two_rows() {
    let h = harness();
    for _ in 0..2 {
        let resp = h.app.clone().oneshot(post_devis(valid_body().build())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(h.quote_repo.quotes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn items_json_populates_structured_items() {
    let h = harness();
    let body = valid_body()
        .field(
            "items_json",
            r#"[{"service":"rug","dimensions":"2x3m"},{"service":"mattress"}]"#,
        )
        .build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let quotes = h.quote_repo.quotes.lock().unwrap();
    assert_eq!(quotes[0].service, ServiceKind::Rug);
    let items = quotes[0].items.as_ref().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(quotes[0].dimensions.as_deref(), Some("2x3m"));
}

#[tokio::test]
async fn malformed_items_json_does_not_block_submission() {
    let h = harness();
    let body = valid_body().field("items_json", "{broken").build();
    let resp = h.app.clone().oneshot(post_devis(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let quotes = h.quote_repo.quotes.lock().unwrap();
    assert!(quotes[0].items.is_none());
    assert_eq!(quotes[0].service, ServiceKind::Sofa);
}
