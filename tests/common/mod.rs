//! In-memory doubles for the intake service's seams, plus request builders.

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use bson::oid::ObjectId;
use devis_backend::config::EmailConfig;
use devis_backend::model::quote::{Quote, QuotePhoto, QuoteStatus};
use devis_backend::model::quote_event::QuoteEvent;
use devis_backend::repository::quote_event_repo::QuoteEventRepository;
use devis_backend::repository::quote_repo::{QuoteListFilter, QuoteRepository};
use devis_backend::repository::repository_error::{RepositoryError, RepositoryResult};
use devis_backend::router::quote_router::quote_router;
use devis_backend::service::quote_service::{QuoteService, QuoteServiceImpl};
use devis_backend::util::email::{EmailError, Mailer, OutgoingEmail};
use devis_backend::util::storage::{ObjectStorage, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeQuoteRepo {
    pub quotes: Mutex<Vec<Quote>>,
    pub fail_create: bool,
    pub fail_set_photos: bool,
}

#[async_trait]
impl QuoteRepository for FakeQuoteRepo {
    async fn create(&self, quote: Quote) -> RepositoryResult<Quote> {
        if self.fail_create {
            return Err(RepositoryError::database("insert refused"));
        }
        let mut stored = quote;
        let now = chrono::Utc::now().to_rfc3339();
        stored.id = Some(ObjectId::new());
        stored.created_at = Some(now.clone());
        stored.updated_at = Some(now.clone());
        stored.status_updated_at = Some(now);
        self.quotes.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quote> {
        self.quotes
            .lock()
            .unwrap()
            .iter()
            .find(|q| q.id == Some(id))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("no quote {id}")))
    }

    async fn set_photos(&self, id: ObjectId, photos: Vec<QuotePhoto>) -> RepositoryResult<()> {
        if self.fail_set_photos {
            return Err(RepositoryError::database("photo update refused"));
        }
        let mut quotes = self.quotes.lock().unwrap();
        let quote = quotes
            .iter_mut()
            .find(|q| q.id == Some(id))
            .ok_or_else(|| RepositoryError::not_found(format!("no quote {id}")))?;
        quote.photos = Some(photos);
        Ok(())
    }

    async fn update_status(&self, id: ObjectId, status: QuoteStatus) -> RepositoryResult<Quote> {
        let mut quotes = self.quotes.lock().unwrap();
        let quote = quotes
            .iter_mut()
            .find(|q| q.id == Some(id))
            .ok_or_else(|| RepositoryError::not_found(format!("no quote {id}")))?;
        let now = chrono::Utc::now().to_rfc3339();
        quote.status = status;
        quote.status_updated_at = Some(now.clone());
        quote.updated_at = Some(now);
        Ok(quote.clone())
    }

    async fn list(&self, filter: &QuoteListFilter) -> RepositoryResult<Vec<Quote>> {
        let quotes = self.quotes.lock().unwrap();
        let matched: Vec<Quote> = quotes.iter().filter(|q| matches(q, filter)).cloned().collect();
        let skip = (u64::from(filter.page.max(1) - 1) * u64::from(filter.limit)) as usize;
        Ok(matched
            .into_iter()
            .skip(skip)
            .take(filter.limit as usize)
            .collect())
    }

    async fn count(&self, filter: &QuoteListFilter) -> RepositoryResult<u64> {
        let quotes = self.quotes.lock().unwrap();
        Ok(quotes.iter().filter(|q| matches(q, filter)).count() as u64)
    }
}

fn matches(quote: &Quote, filter: &QuoteListFilter) -> bool {
    if let Some(status) = filter.status {
        if quote.status != status {
            return false;
        }
    }
    if let Some(ref q) = filter.q {
        let needle = q.to_lowercase();
        let haystacks = [
            Some(quote.name.as_str()),
            Some(quote.city.as_str()),
            quote.email.as_deref(),
            Some(quote.postal_code.as_str()),
        ];
        return haystacks
            .into_iter()
            .flatten()
            .any(|h| h.to_lowercase().contains(&needle));
    }
    true
}

#[derive(Default)]
pub struct FakeEventRepo {
    pub events: Mutex<Vec<QuoteEvent>>,
}

#[async_trait]
impl QuoteEventRepository for FakeEventRepo {
    async fn append(&self, event: QuoteEvent) -> RepositoryResult<QuoteEvent> {
        let mut stored = event;
        stored.id = Some(ObjectId::new());
        stored.created_at = Some(chrono::Utc::now().to_rfc3339());
        self.events.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_for_quote(&self, quote_id: ObjectId) -> RepositoryResult<Vec<QuoteEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.quote_id == quote_id)
            .cloned()
            .collect())
    }
}

/// In-memory bucket. `fail_from` makes every upload starting at that
/// zero-based index fail, to exercise partial-upload handling.
#[derive(Default)]
pub struct FakeStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_from: Option<usize>,
    pub puts: AtomicUsize,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let attempt = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|n| attempt >= n) {
            return Err(StorageError::OperationError("bucket unavailable".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), data);
        Ok(())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(format!("https://cdn.test/devis-photos/{key}"))
    }
}

/// Records outgoing emails; optionally refuses sends to one recipient.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail_recipient: Option<String>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        if self.fail_recipient.as_deref() == Some(email.to.as_str()) {
            return Err(EmailError::SmtpError("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestHarness {
    pub app: Router,
    pub quote_repo: Arc<FakeQuoteRepo>,
    pub event_repo: Arc<FakeEventRepo>,
    pub storage: Arc<FakeStorage>,
    pub mailer: Arc<FakeMailer>,
}

pub fn harness() -> TestHarness {
    harness_with(
        FakeQuoteRepo::default(),
        FakeStorage::default(),
        FakeMailer::default(),
    )
}

pub fn harness_with(
    quote_repo: FakeQuoteRepo,
    storage: FakeStorage,
    mailer: FakeMailer,
) -> TestHarness {
    let quote_repo = Arc::new(quote_repo);
    let event_repo = Arc::new(FakeEventRepo::default());
    let storage = Arc::new(storage);
    let mailer = Arc::new(mailer);
    let service: Arc<dyn QuoteService> = Arc::new(QuoteServiceImpl::new(
        quote_repo.clone(),
        event_repo.clone(),
        storage.clone(),
        mailer.clone(),
        EmailConfig::from_test_env(),
    ));
    TestHarness {
        app: quote_router(service),
        quote_repo,
        event_repo,
        storage,
        mailer,
    }
}

pub const BOUNDARY: &str = "X-BOUNDARY";

/// Multipart body builder for the intake endpoint.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn photo(mut self, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photos\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend(bytes);
        self.body.extend(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// A multipart body carrying the minimum valid submission.
pub fn valid_body() -> MultipartBody {
    MultipartBody::new()
        .field("service", "sofa")
        .field("city", "Paris")
        .field("postalCode", "75012")
        .field("name", "Alice Martin")
        .field("email", "alice@example.com")
}

pub fn post_devis(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/devis")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("user-agent", "integration-test/1.0")
        .body(Body::from(body))
        .unwrap()
}
