use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Append-only audit record for a quote.
///
/// The intake pipeline appends `quote_created`; the admin status endpoint
/// appends `quote_status_changed`. Appends are best-effort and never fail the
/// request that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteEvent {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    pub quote_id: ObjectId,
    pub event_type: String,
    pub actor_type: String,
    pub source: String,
    pub request_id: Option<String>,
    /// Free-form payload describing what changed.
    pub diff: Option<bson::Document>,
    pub created_at: Option<String>,
}

pub const EVENT_QUOTE_CREATED: &str = "quote_created";
pub const EVENT_QUOTE_STATUS_CHANGED: &str = "quote_status_changed";

pub const ACTOR_CUSTOMER: &str = "customer";
pub const ACTOR_ADMIN: &str = "admin";
