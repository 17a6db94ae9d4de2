use crate::model::quote::{QuoteItem, ServiceKind};
use crate::util::error::FieldError;
use crate::util::validate::{
    is_valid_email, is_valid_phone, normalize_contact, MAX_TOTAL_PHOTO_BYTES,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

/// One uploaded photo part, read fully into memory by the handler.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Raw multipart fields of a quote submission, before any validation.
///
/// Every field is optional here; `into_validated` turns the bag into either a
/// [`ValidatedQuote`] or a typed list of field errors in a single pass.
#[derive(Debug, Default)]
pub struct RawQuoteForm {
    pub service: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub dimensions: Option<String>,
    pub details: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub items_json: Option<String>,
    pub photos: Vec<PhotoUpload>,
    pub user_agent: Option<String>,
}

/// Why a raw form could not be validated.
#[derive(Debug)]
pub enum QuoteFormError {
    /// Field-level failures, in validation order.
    Invalid(Vec<FieldError>),
    /// Aggregate photo size over the 25 MB budget; maps to 413.
    PhotosTooLarge(usize),
}

/// A fully validated submission, ready for the intake service.
#[derive(Debug, Clone)]
pub struct ValidatedQuote {
    pub service: ServiceKind,
    pub city: String,
    pub postal_code: String,
    pub address: Option<String>,
    pub dimensions: Option<String>,
    pub details: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub items: Option<Vec<QuoteItem>>,
    pub photos: Vec<PhotoUpload>,
    pub user_agent: Option<String>,
}

/// Shape of one entry in the `items_json` array as the funnel sends it.
#[derive(Debug, Deserialize)]
struct RawItem {
    service: String,
    #[serde(default)]
    dimensions: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawQuoteForm {
    /// Validate the whole form in one pass.
    ///
    /// Field errors are collected in the documented order; the aggregate
    /// photo-size check only applies once the fields are acceptable, so a 400
    /// always wins over a 413. Malformed `items_json` silently degrades to
    /// "no structured items".
    pub fn into_validated(self) -> Result<ValidatedQuote, QuoteFormError> {
        let mut errors = Vec::new();

        let name = self.name.as_deref().unwrap_or("").trim().to_string();
        if name.len() < 2 {
            errors.push(FieldError::new("name", "Veuillez indiquer votre nom."));
        }

        let city = self.city.as_deref().unwrap_or("").trim().to_string();
        if city.len() < 2 {
            errors.push(FieldError::new("city", "Veuillez indiquer votre ville."));
        }

        let postal_code = self.postal_code.as_deref().unwrap_or("").trim().to_string();
        if postal_code.len() < 4 {
            errors.push(FieldError::new(
                "postalCode",
                "Veuillez indiquer un code postal valide.",
            ));
        }

        let email = non_empty(self.email);
        let phone = non_empty(self.phone);
        match (&email, &phone) {
            (None, None) => {
                errors.push(FieldError::new(
                    "contact",
                    "Indiquez un email ou un numéro de téléphone.",
                ));
            }
            _ => {
                if let Some(ref email) = email {
                    if !is_valid_email(email) {
                        errors.push(FieldError::new(
                            "email",
                            "L'adresse email semble invalide.",
                        ));
                    }
                }
                if let Some(ref phone) = phone {
                    if !is_valid_phone(phone) {
                        errors.push(FieldError::new(
                            "phone",
                            "Le numéro de téléphone semble invalide.",
                        ));
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(QuoteFormError::Invalid(errors));
        }

        let total_photo_bytes: usize = self.photos.iter().map(PhotoUpload::size).sum();
        if total_photo_bytes > MAX_TOTAL_PHOTO_BYTES {
            return Err(QuoteFormError::PhotosTooLarge(total_photo_bytes));
        }

        let items = parse_items(self.items_json.as_deref());

        let service = items
            .as_ref()
            .and_then(|items| items.first())
            .map(|item| item.service)
            .unwrap_or_else(|| {
                ServiceKind::parse_lossy(self.service.as_deref().unwrap_or(""))
            });

        // Legacy global fields mirror the first item when absent.
        let first = items.as_ref().and_then(|items| items.first());
        let dimensions =
            non_empty(self.dimensions).or_else(|| first.and_then(|i| i.dimensions.clone()));
        let details = non_empty(self.details).or_else(|| first.and_then(|i| i.details.clone()));

        Ok(ValidatedQuote {
            service,
            city,
            postal_code,
            address: non_empty(self.address),
            dimensions,
            details,
            name,
            email,
            phone: phone.map(|p| normalize_contact(&p)),
            items,
            photos: self.photos,
            user_agent: self.user_agent,
        })
    }
}

/// Parse `items_json` into structured items. Returns `None` for anything that
/// is not a JSON array of item objects.
fn parse_items(items_json: Option<&str>) -> Option<Vec<QuoteItem>> {
    let raw = items_json?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Vec<RawItem>>(raw) {
        Ok(raw_items) if !raw_items.is_empty() => Some(
            raw_items
                .into_iter()
                .map(|item| QuoteItem {
                    service: ServiceKind::parse_lossy(&item.service),
                    dimensions: non_empty(item.dimensions),
                    details: non_empty(item.details),
                })
                .collect(),
        ),
        Ok(_) => None,
        Err(e) => {
            debug!("Ignoring malformed items_json: {}", e);
            None
        }
    }
}

/// Successful intake response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteCreatedResponse {
    pub ok: bool,
    #[serde(rename = "quoteId")]
    pub quote_id: String,
    pub message: String,
}

/// Admin status transition request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateQuoteStatusRequest {
    #[validate(length(min = 2, max = 50))]
    pub status: String,
}

/// Admin list query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteListQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Admin list response with pagination totals.
#[derive(Debug, Serialize)]
pub struct QuoteListResponse {
    pub quotes: Vec<crate::model::quote::Quote>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Admin detail response: the quote plus resolved photo download links.
#[derive(Debug, Serialize)]
pub struct QuoteDetailResponse {
    pub quote: crate::model::quote::Quote,
    pub photo_links: Vec<String>,
}
