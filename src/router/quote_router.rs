use crate::handler::quote_handler::{
    create_quote_handler, get_quote_handler, health_handler, list_quote_events_handler,
    list_quotes_handler, update_quote_status_handler,
};
use crate::service::quote_service::QuoteService;
use crate::util::validate::MAX_TOTAL_PHOTO_BYTES;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Slack on top of the photo budget for form fields and multipart framing.
/// The real 25 MB check runs in validation so it can answer with JSON.
const BODY_LIMIT_BYTES: usize = MAX_TOTAL_PHOTO_BYTES + 2 * 1024 * 1024;

pub fn quote_router(service: Arc<dyn QuoteService>) -> Router {
    let public = Router::new()
        .route("/api/devis", post(create_quote_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let admin = Router::new()
        .route("/api/admin/devis", get(list_quotes_handler))
        .route("/api/admin/devis/{id}", get(get_quote_handler))
        .route("/api/admin/devis/{id}/events", get(list_quote_events_handler))
        .route("/api/admin/devis/{id}/status", put(update_quote_status_handler));

    public
        .merge(admin)
        .route("/health", get(health_handler))
        .with_state(service)
}
