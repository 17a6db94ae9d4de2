use crate::dto::quote_dto::{
    PhotoUpload, QuoteCreatedResponse, QuoteFormError, QuoteListQuery, RawQuoteForm,
    UpdateQuoteStatusRequest,
};
use crate::model::quote::QuoteStatus;
use crate::service::quote_service::QuoteService;
use crate::util::error::{HandlerError, HandlerErrorKind};
use crate::util::validate::MAX_PHOTOS;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::header::USER_AGENT,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use bson::oid::ObjectId;
use bytes::BytesMut;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

fn multipart_error(e: axum::extract::multipart::MultipartError) -> HandlerError {
    warn!("Failed to read multipart body: {}", e);
    HandlerError::bad_request("Requête invalide.")
}

/// Public intake endpoint: `POST /api/devis` (multipart/form-data).
pub async fn create_quote_handler(
    State(service): State<Arc<dyn QuoteService>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    info!("Quote submission received");

    let mut form = RawQuoteForm {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        ..RawQuoteForm::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        debug!("Processing multipart field: {}", name);

        if name == "photos" {
            // Extra photo parts past the cap are drained and dropped.
            if form.photos.len() >= MAX_PHOTOS {
                let _ = field.bytes().await;
                continue;
            }
            let filename = field.file_name().unwrap_or("photo").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let mut buf = BytesMut::new();
            let mut stream = field;
            while let Some(chunk) = stream.chunk().await.map_err(multipart_error)? {
                buf.extend_from_slice(&chunk);
            }
            form.photos.push(PhotoUpload {
                filename,
                content_type,
                bytes: buf.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "service" => form.service = Some(value),
            "city" => form.city = Some(value),
            "postalCode" => form.postal_code = Some(value),
            "address" => form.address = Some(value),
            "dimensions" => form.dimensions = Some(value),
            "details" => form.details = Some(value),
            "name" => form.name = Some(value),
            "email" => form.email = Some(value),
            "phone" => form.phone = Some(value),
            "items_json" => form.items_json = Some(value),
            other => debug!("Ignoring unknown multipart field: {}", other),
        }
    }

    let validated = form.into_validated().map_err(|e| match e {
        QuoteFormError::Invalid(errors) => {
            let message = errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Requête invalide.".to_string());
            HandlerError {
                kind: HandlerErrorKind::BadRequest,
                message,
                debug: Some(json!({ "errors": errors })),
            }
        }
        QuoteFormError::PhotosTooLarge(size) => {
            warn!("Photo payload over budget: {} bytes", size);
            HandlerError::payload_too_large("Photos trop volumineuses (25 Mo maximum au total).")
        }
    })?;

    let quote = service.register_quote(validated).await?;
    let quote_id = quote
        .id
        .map(|id| id.to_hex())
        .ok_or_else(|| HandlerError::internal("Une erreur est survenue, réessayez ou appelez-nous."))?;

    Ok(Json(QuoteCreatedResponse {
        ok: true,
        quote_id,
        message: "Votre demande a bien été envoyée. Nous revenons vers vous rapidement.".to_string(),
    }))
}

/// `GET /api/admin/devis`
pub async fn list_quotes_handler(
    State(service): State<Arc<dyn QuoteService>>,
    Query(query): Query<QuoteListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let quotes = service.list_quotes(query).await?;
    Ok(Json(quotes))
}

/// `GET /api/admin/devis/{id}`
pub async fn get_quote_handler(
    State(service): State<Arc<dyn QuoteService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_object_id(&id)?;
    let detail = service.get_quote(id).await?;
    Ok(Json(detail))
}

/// `GET /api/admin/devis/{id}/events`
pub async fn list_quote_events_handler(
    State(service): State<Arc<dyn QuoteService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_object_id(&id)?;
    let events = service.list_quote_events(id).await?;
    Ok(Json(events))
}

/// `PUT /api/admin/devis/{id}/status`
pub async fn update_quote_status_handler(
    State(service): State<Arc<dyn QuoteService>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateQuoteStatusRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_object_id(&id)?;
    payload
        .validate()
        .map_err(|e| HandlerError::bad_request(format!("Statut invalide : {}", e)))?;
    let status: QuoteStatus = payload
        .status
        .parse()
        .map_err(|_| HandlerError::bad_request("Statut inconnu."))?;
    let updated = service.update_quote_status(id, status).await?;
    Ok(Json(updated))
}

/// `GET /health`
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

fn parse_object_id(id: &str) -> Result<ObjectId, HandlerError> {
    ObjectId::parse_str(id).map_err(|_| HandlerError::bad_request("Identifiant invalide."))
}
