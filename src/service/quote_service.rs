use crate::config::EmailConfig;
use crate::dto::quote_dto::{
    QuoteDetailResponse, QuoteListQuery, QuoteListResponse, ValidatedQuote,
};
use crate::model::quote::{Quote, QuoteMeta, QuotePhoto, QuoteStatus};
use crate::model::quote_event::{
    QuoteEvent, ACTOR_ADMIN, ACTOR_CUSTOMER, EVENT_QUOTE_CREATED, EVENT_QUOTE_STATUS_CHANGED,
};
use crate::repository::quote_event_repo::QuoteEventRepository;
use crate::repository::quote_repo::{QuoteListFilter, QuoteRepository};
use crate::util::email::{EmailAttachment, Mailer, OutgoingEmail};
use crate::util::error::{FieldError, ServiceError};
use crate::util::storage::ObjectStorage;
use crate::util::validate::sanitize_extension;
use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Result of the photo upload pass. Failed uploads never fail the request;
/// the quote goes through with whatever subset made it to storage.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub succeeded: Vec<QuotePhoto>,
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug)]
pub struct FailedUpload {
    pub filename: String,
    pub reason: String,
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Run the full intake pipeline for a validated submission.
    async fn register_quote(&self, form: ValidatedQuote) -> Result<Quote, ServiceError>;
    async fn get_quote(&self, id: ObjectId) -> Result<QuoteDetailResponse, ServiceError>;
    async fn list_quotes(&self, query: QuoteListQuery) -> Result<QuoteListResponse, ServiceError>;
    /// Audit trail of one quote, for the admin detail view.
    async fn list_quote_events(&self, id: ObjectId) -> Result<Vec<QuoteEvent>, ServiceError>;
    async fn update_quote_status(
        &self,
        id: ObjectId,
        status: QuoteStatus,
    ) -> Result<Quote, ServiceError>;
}

/// Production service wired over trait objects so tests can substitute
/// in-memory repositories, storage and mailers.
pub struct QuoteServiceImpl {
    quote_repo: Arc<dyn QuoteRepository>,
    event_repo: Arc<dyn QuoteEventRepository>,
    storage: Arc<dyn ObjectStorage>,
    mailer: Arc<dyn Mailer>,
    email_config: EmailConfig,
}

impl QuoteServiceImpl {
    pub fn new(
        quote_repo: Arc<dyn QuoteRepository>,
        event_repo: Arc<dyn QuoteEventRepository>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        email_config: EmailConfig,
    ) -> Self {
        QuoteServiceImpl {
            quote_repo,
            event_repo,
            storage,
            mailer,
            email_config,
        }
    }

    /// Upload each photo under `{quoteId}/{uuid}.{ext}`. A failed upload is
    /// logged and skipped.
    async fn upload_photos(&self, quote_id: ObjectId, form: &ValidatedQuote) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();
        for photo in &form.photos {
            let key = format!(
                "{}/{}.{}",
                quote_id.to_hex(),
                uuid::Uuid::new_v4(),
                sanitize_extension(&photo.filename)
            );
            match self
                .storage
                .put_object(&key, photo.bytes.clone(), Some(&photo.content_type))
                .await
            {
                Ok(()) => outcome.succeeded.push(QuotePhoto {
                    public_url: self.storage.public_url(&key),
                    path: key,
                    filename: photo.filename.clone(),
                    content_type: photo.content_type.clone(),
                    size: photo.size(),
                }),
                Err(e) => {
                    warn!("Photo upload failed for '{}': {}", photo.filename, e);
                    outcome.failed.push(FailedUpload {
                        filename: photo.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Best-effort event append. Never fails the originating request.
    async fn append_event(&self, event: QuoteEvent) {
        if let Err(e) = self.event_repo.append(event).await {
            warn!("Failed to append quote event: {}", e);
        }
    }

    async fn send_owner_notification(
        &self,
        quote: &Quote,
        form: &ValidatedQuote,
        outcome: &UploadOutcome,
    ) -> Result<(), ServiceError> {
        let attachments: Vec<EmailAttachment> = form
            .photos
            .iter()
            .map(|photo| EmailAttachment {
                filename: photo.filename.clone(),
                content_type: photo.content_type.clone(),
                bytes: photo.bytes.clone(),
            })
            .collect();

        let subject = format!("Nouvelle demande de devis : {} à {}", quote.service, quote.city);
        let mut email = OutgoingEmail::new(
            &self.email_config.notify_email,
            subject,
            owner_email_html(quote, form.photos.len(), outcome),
        )
        .with_attachments(attachments);
        if let Some(ref customer_email) = quote.email {
            email = email.with_reply_to(customer_email.clone());
        }

        self.mailer.send(email).await.map_err(|e| {
            error!("Owner notification failed: {}", e);
            ServiceError::OwnerEmailFailed(e.to_string())
        })
    }

    async fn send_customer_confirmation(&self, quote: &Quote) {
        let Some(ref to) = quote.email else {
            return;
        };
        let email = OutgoingEmail::new(
            to.clone(),
            "Votre demande de devis est bien reçue",
            customer_email_html(quote),
        )
        .with_reply_to(self.email_config.notify_email.clone());
        if let Err(e) = self.mailer.send(email).await {
            warn!("Customer confirmation email failed: {}", e);
        }
    }
}

#[async_trait]
impl QuoteService for QuoteServiceImpl {
    #[instrument(skip(self, form), fields(city = %form.city, service = %form.service, photos = form.photos.len()))]
    async fn register_quote(&self, form: ValidatedQuote) -> Result<Quote, ServiceError> {
        info!("Registering new quote");

        let quote = Quote {
            id: None,
            service: form.service,
            city: form.city.clone(),
            postal_code: form.postal_code.clone(),
            address: form.address.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            items: form.items.clone(),
            dimensions: form.dimensions.clone(),
            details: form.details.clone(),
            photos: None,
            status: QuoteStatus::New,
            meta: QuoteMeta {
                source: "website".to_string(),
                user_agent: form.user_agent.clone(),
            },
            created_at: None,
            updated_at: None,
            status_updated_at: None,
        };

        // The insert is the only fatal persistence step. Everything after it
        // degrades rather than losing the lead.
        let mut inserted = self.quote_repo.create(quote).await?;
        let quote_id = inserted
            .id
            .ok_or_else(|| ServiceError::InternalError("Inserted quote has no id".to_string()))?;

        // The array is written even when empty, so a quote that went through
        // the upload pass never reads as "photos pending".
        let outcome = self.upload_photos(quote_id, &form).await;
        match self
            .quote_repo
            .set_photos(quote_id, outcome.succeeded.clone())
            .await
        {
            Ok(()) => inserted.photos = Some(outcome.succeeded.clone()),
            Err(e) => warn!("Failed to attach photo metadata to quote: {}", e),
        }

        self.append_event(QuoteEvent {
            id: None,
            quote_id,
            event_type: EVENT_QUOTE_CREATED.to_string(),
            actor_type: ACTOR_CUSTOMER.to_string(),
            source: "website".to_string(),
            request_id: None,
            diff: Some(doc! {
                "photos_submitted": form.photos.len() as i32,
                "photos_uploaded": outcome.succeeded.len() as i32,
            }),
            created_at: None,
        })
        .await;

        // An unnotified lead is a lost lead: the quote row stays, but the
        // request reports failure so the customer calls instead.
        self.send_owner_notification(&inserted, &form, &outcome)
            .await?;

        self.send_customer_confirmation(&inserted).await;

        info!("Quote registered successfully");
        Ok(inserted)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_quote(&self, id: ObjectId) -> Result<QuoteDetailResponse, ServiceError> {
        let quote = self.quote_repo.get_by_id(id).await?;
        let photo_links = quote
            .photos
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|photo| {
                photo
                    .public_url
                    .clone()
                    .or_else(|| self.storage.public_url(&photo.path))
            })
            .collect();
        Ok(QuoteDetailResponse { quote, photo_links })
    }

    #[instrument(skip(self, query), fields(page = query.page, limit = query.limit))]
    async fn list_quotes(&self, query: QuoteListQuery) -> Result<QuoteListResponse, ServiceError> {
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<QuoteStatus>().map_err(|e| {
                ServiceError::Validation(vec![FieldError::new("status", e)])
            })?),
        };

        let filter = QuoteListFilter {
            q: query.q.clone().filter(|q| !q.trim().is_empty()),
            status,
            page: query.page.unwrap_or(1).max(1),
            limit: query.limit.unwrap_or(20).clamp(1, 100),
        };

        let quotes = self.quote_repo.list(&filter).await?;
        let total = self.quote_repo.count(&filter).await?;
        Ok(QuoteListResponse {
            quotes,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn list_quote_events(&self, id: ObjectId) -> Result<Vec<QuoteEvent>, ServiceError> {
        // 404 on an unknown quote rather than an empty log.
        self.quote_repo.get_by_id(id).await?;
        Ok(self.event_repo.list_for_quote(id).await?)
    }

    #[instrument(skip(self), fields(id = %id, status = %status))]
    async fn update_quote_status(
        &self,
        id: ObjectId,
        status: QuoteStatus,
    ) -> Result<Quote, ServiceError> {
        info!("Updating quote status");
        let previous = self.quote_repo.get_by_id(id).await?;
        let updated = self.quote_repo.update_status(id, status).await?;

        self.append_event(QuoteEvent {
            id: None,
            quote_id: id,
            event_type: EVENT_QUOTE_STATUS_CHANGED.to_string(),
            actor_type: ACTOR_ADMIN.to_string(),
            source: "admin".to_string(),
            request_id: None,
            diff: Some(doc! {
                "from": previous.status.as_str(),
                "to": status.as_str(),
            }),
            created_at: None,
        })
        .await;

        Ok(updated)
    }
}

fn escape(s: &str) -> String {
    html_escape::encode_text(s).to_string()
}

/// HTML body of the owner notification. Every submitted value goes through
/// HTML escaping before interpolation.
fn owner_email_html(quote: &Quote, submitted: usize, outcome: &UploadOutcome) -> String {
    let mut html = String::new();
    html.push_str("<h2>Nouvelle demande de devis</h2>");
    html.push_str("<table cellpadding=\"4\">");
    push_row(&mut html, "Nom", &quote.name);
    push_row(&mut html, "Ville", &quote.city);
    push_row(&mut html, "Code postal", &quote.postal_code);
    if let Some(ref address) = quote.address {
        push_row(&mut html, "Adresse", address);
    }
    if let Some(ref email) = quote.email {
        push_row(&mut html, "Email", email);
    }
    if let Some(ref phone) = quote.phone {
        push_row(&mut html, "Téléphone", phone);
    }
    if let Some(ref ua) = quote.meta.user_agent {
        push_row(&mut html, "Navigateur", ua);
    }
    html.push_str("</table>");

    html.push_str("<h3>Objets à nettoyer</h3><table cellpadding=\"4\">");
    html.push_str("<tr><th>Service</th><th>Dimensions</th><th>Détails</th></tr>");
    match quote.items.as_deref() {
        Some(items) if !items.is_empty() => {
            for item in items {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(item.service.label()),
                    escape(item.dimensions.as_deref().unwrap_or("-")),
                    escape(item.details.as_deref().unwrap_or("-")),
                ));
            }
        }
        _ => {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(quote.service.label()),
                escape(quote.dimensions.as_deref().unwrap_or("-")),
                escape(quote.details.as_deref().unwrap_or("-")),
            ));
        }
    }
    html.push_str("</table>");

    html.push_str(&format!(
        "<p>Photos : {} envoyée(s), {} stockée(s).</p>",
        submitted,
        outcome.succeeded.len()
    ));
    if !outcome.succeeded.is_empty() {
        html.push_str("<ul>");
        for photo in &outcome.succeeded {
            match photo.public_url {
                Some(ref url) => html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>",
                    escape(url),
                    escape(&photo.filename)
                )),
                None => html.push_str(&format!(
                    "<li>{} ({})</li>",
                    escape(&photo.filename),
                    escape(&photo.path)
                )),
            }
        }
        html.push_str("</ul>");
    }
    for failed in &outcome.failed {
        html.push_str(&format!(
            "<p>Échec d'envoi : {}</p>",
            escape(&failed.filename)
        ));
    }

    html
}

fn push_row(html: &mut String, label: &str, value: &str) {
    html.push_str(&format!(
        "<tr><td><strong>{}</strong></td><td>{}</td></tr>",
        escape(label),
        escape(value)
    ));
}

/// HTML body of the customer confirmation.
fn customer_email_html(quote: &Quote) -> String {
    format!(
        "<p>Bonjour {},</p>\
         <p>Nous avons bien reçu votre demande de devis pour : {}.</p>\
         <p>Nous revenons vers vous au plus vite, généralement sous 24&nbsp;heures ouvrées.</p>\
         <p>Si besoin, répondez simplement à cet email.</p>",
        escape(&quote.name),
        escape(quote.service.label())
    )
}
