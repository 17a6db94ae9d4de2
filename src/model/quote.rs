use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Service category for a textile object to be cleaned.
///
/// Unknown input degrades to `Other` instead of failing the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Mattress,
    Sofa,
    Rug,
    Carpet,
    Other,
}

impl ServiceKind {
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mattress" | "matelas" => ServiceKind::Mattress,
            "sofa" | "canape" | "canapé" => ServiceKind::Sofa,
            "rug" | "tapis" => ServiceKind::Rug,
            "carpet" | "moquette" => ServiceKind::Carpet,
            _ => ServiceKind::Other,
        }
    }

    /// French display label used in emails and the admin list.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Mattress => "Matelas",
            ServiceKind::Sofa => "Canapé",
            ServiceKind::Rug => "Tapis",
            ServiceKind::Carpet => "Moquette",
            ServiceKind::Other => "Autre",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Triage status for a quote. Transitions happen only via the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    New,
    Contacted,
    Scheduled,
    Quoted,
    Won,
    Lost,
    Archived,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::New => "new",
            QuoteStatus::Contacted => "contacted",
            QuoteStatus::Scheduled => "scheduled",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Won => "won",
            QuoteStatus::Lost => "lost",
            QuoteStatus::Archived => "archived",
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(QuoteStatus::New),
            "contacted" => Ok(QuoteStatus::Contacted),
            "scheduled" => Ok(QuoteStatus::Scheduled),
            "quoted" => Ok(QuoteStatus::Quoted),
            "won" => Ok(QuoteStatus::Won),
            "lost" => Ok(QuoteStatus::Lost),
            "archived" => Ok(QuoteStatus::Archived),
            other => Err(format!("unknown quote status: {other}")),
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One textile object within a quote request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteItem {
    pub service: ServiceKind,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Metadata of a photo successfully uploaded to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotePhoto {
    /// Object key within the bucket: `{quoteId}/{uuid}.{ext}`
    pub path: String,
    pub public_url: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// Diagnostic bag attached to each quote; not business-critical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteMeta {
    pub source: String,
    pub user_agent: Option<String>,
}

/// A customer's request for a cleaning-service price estimate.
///
/// Inserted once with `photos: None`, then updated in the same request with
/// the uploaded-photo metadata. Afterwards only `status`/`status_updated_at`
/// change, via the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    /// First item's service, denormalized for list display.
    pub service: ServiceKind,
    pub city: String,
    pub postal_code: String,
    pub address: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub items: Option<Vec<QuoteItem>>,
    /// Legacy global fields mirrored from the first item.
    pub dimensions: Option<String>,
    pub details: Option<String>,
    pub photos: Option<Vec<QuotePhoto>>,
    pub status: QuoteStatus,
    pub meta: QuoteMeta,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub status_updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_parses_known_values() {
        assert_eq!(ServiceKind::parse_lossy("sofa"), ServiceKind::Sofa);
        assert_eq!(ServiceKind::parse_lossy("Matelas"), ServiceKind::Mattress);
        assert_eq!(ServiceKind::parse_lossy("moquette"), ServiceKind::Carpet);
    }

    #[test]
    fn service_kind_degrades_to_other() {
        assert_eq!(ServiceKind::parse_lossy("curtains"), ServiceKind::Other);
        assert_eq!(ServiceKind::parse_lossy(""), ServiceKind::Other);
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["new", "contacted", "scheduled", "quoted", "won", "lost", "archived"] {
            let parsed: QuoteStatus = s.parse().expect("valid status");
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!("deleted".parse::<QuoteStatus>().is_err());
        assert!("".parse::<QuoteStatus>().is_err());
    }
}
