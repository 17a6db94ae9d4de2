use crate::config::mongo_conf::MongoConfig;
use crate::model::quote::{Quote, QuotePhoto, QuoteStatus};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson};
use futures::stream::StreamExt;
use mongodb::options::FindOptions;
use tracing::{error, info};

/// Filters for the admin list view.
#[derive(Debug, Clone, Default)]
pub struct QuoteListFilter {
    /// Free-text search over name, city, email and postal code.
    pub q: Option<String>,
    pub status: Option<QuoteStatus>,
    pub page: u32,
    pub limit: u32,
}

impl QuoteListFilter {
    fn to_document(&self) -> RepositoryResult<bson::Document> {
        let mut filter = doc! {};
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(ref q) = self.q {
            let pattern = regex_escape(q.trim());
            if !pattern.is_empty() {
                let re = bson::Regex {
                    pattern,
                    options: "i".to_string(),
                };
                filter.insert(
                    "$or",
                    vec![
                        doc! { "name": Bson::RegularExpression(re.clone()) },
                        doc! { "city": Bson::RegularExpression(re.clone()) },
                        doc! { "email": Bson::RegularExpression(re.clone()) },
                        doc! { "postal_code": Bson::RegularExpression(re) },
                    ],
                );
            }
        }
        Ok(filter)
    }
}

/// Escape regex metacharacters in a user-supplied search string.
fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Insert a quote, assigning id and timestamps. Returns the stored quote.
    async fn create(&self, quote: Quote) -> RepositoryResult<Quote>;
    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quote>;
    /// Write the uploaded-photo metadata after the storage pass.
    async fn set_photos(&self, id: ObjectId, photos: Vec<QuotePhoto>) -> RepositoryResult<()>;
    async fn update_status(&self, id: ObjectId, status: QuoteStatus) -> RepositoryResult<Quote>;
    async fn list(&self, filter: &QuoteListFilter) -> RepositoryResult<Vec<Quote>>;
    async fn count(&self, filter: &QuoteListFilter) -> RepositoryResult<u64>;
}

pub struct MongoQuoteRepository {
    collection: mongodb::Collection<Quote>,
}

impl MongoQuoteRepository {
    /// Create a new MongoQuoteRepository using MongoConfig
    pub async fn new(config: &MongoConfig) -> Result<Self, mongodb::error::Error> {
        use mongodb::{
            options::{ClientOptions, Credential, ResolverConfig},
            Client,
        };

        let mut client_options =
            ClientOptions::parse_with_resolver_config(&config.uri, ResolverConfig::cloudflare())
                .await?;
        client_options.app_name = Some("DevisBackend".to_string());
        client_options.max_pool_size = Some(config.pool_size);
        client_options.connect_timeout =
            Some(std::time::Duration::from_secs(config.connection_timeout_secs));

        if let (Some(ref username), Some(ref password)) = (&config.username, &config.password) {
            client_options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(password.clone())
                    .build(),
            );
        }

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database);
        let collection = db.collection::<Quote>(&config.quote_collection);
        Ok(MongoQuoteRepository { collection })
    }
}

#[async_trait]
impl QuoteRepository for MongoQuoteRepository {
    #[tracing::instrument(skip(self, quote), fields(city = %quote.city, service = %quote.service))]
    async fn create(&self, quote: Quote) -> RepositoryResult<Quote> {
        info!("Creating new quote");
        let mut new_quote = quote;
        let now = chrono::Utc::now().to_rfc3339();
        new_quote.id = Some(ObjectId::new());
        new_quote.created_at = Some(now.clone());
        new_quote.updated_at = Some(now.clone());
        new_quote.status_updated_at = Some(now);

        match self.collection.insert_one(new_quote.clone(), None).await {
            Ok(_) => {
                info!("Quote created successfully");
                Ok(new_quote)
            }
            Err(e) => {
                error!("Failed to create quote: {}", e);
                Err(RepositoryError::database(format!(
                    "Failed to create quote: {}",
                    e
                )))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quote> {
        let filter = doc! { "_id": id };
        match self.collection.find_one(filter, None).await {
            Ok(Some(quote)) => Ok(quote),
            Ok(None) => Err(RepositoryError::not_found(format!(
                "Quote not found for ID: {}",
                id
            ))),
            Err(e) => {
                error!("Failed to fetch quote by ID: {}", e);
                Err(RepositoryError::database(format!(
                    "Failed to fetch quote by ID: {}",
                    e
                )))
            }
        }
    }

    #[tracing::instrument(skip(self, photos), fields(id = %id, photos = photos.len()))]
    async fn set_photos(&self, id: ObjectId, photos: Vec<QuotePhoto>) -> RepositoryResult<()> {
        let filter = doc! { "_id": id };
        let photos_bson = bson::to_bson(&photos)
            .map_err(|e| RepositoryError::serialization(format!("Failed to serialize photos: {}", e)))?;
        let update = doc! { "$set": {
            "photos": photos_bson,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        }};
        match self.collection.update_one(filter, update, None).await {
            Ok(result) if result.matched_count > 0 => {
                info!("Quote photos updated for ID: {}", id);
                Ok(())
            }
            Ok(_) => Err(RepositoryError::not_found(format!(
                "No quote found to update photos for ID: {}",
                id
            ))),
            Err(e) => {
                error!("Failed to update quote photos: {}", e);
                Err(RepositoryError::database(format!(
                    "Failed to update quote photos: {}",
                    e
                )))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id, status = %status))]
    async fn update_status(&self, id: ObjectId, status: QuoteStatus) -> RepositoryResult<Quote> {
        info!("Updating quote status");
        let filter = doc! { "_id": id };
        let now = chrono::Utc::now().to_rfc3339();
        let update = doc! { "$set": {
            "status": status.as_str(),
            "status_updated_at": now.clone(),
            "updated_at": now,
        }};
        match self.collection.update_one(filter, update, None).await {
            Ok(result) if result.matched_count > 0 => {
                info!("Quote status updated for ID: {}", id);
                self.get_by_id(id).await
            }
            Ok(_) => Err(RepositoryError::not_found(format!(
                "No quote found to update status for ID: {}",
                id
            ))),
            Err(e) => {
                error!("Failed to update quote status: {}", e);
                Err(RepositoryError::database(format!(
                    "Failed to update quote status: {}",
                    e
                )))
            }
        }
    }

    #[tracing::instrument(skip(self, filter), fields(page = filter.page, limit = filter.limit))]
    async fn list(&self, filter: &QuoteListFilter) -> RepositoryResult<Vec<Quote>> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let skip = u64::from(page - 1) * u64::from(limit);

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(i64::from(limit))
            .build();

        let mut cursor = self
            .collection
            .find(filter.to_document()?, options)
            .await
            .map_err(|e| {
                error!("Failed to list quotes: {}", e);
                RepositoryError::database(format!("Failed to list quotes: {}", e))
            })?;

        let mut quotes = Vec::new();
        while let Some(quote) = cursor.next().await {
            match quote {
                Ok(q) => quotes.push(q),
                Err(e) => {
                    error!("Failed to deserialize quote: {}", e);
                    return Err(RepositoryError::serialization(format!(
                        "Failed to deserialize quote: {}",
                        e
                    )));
                }
            }
        }
        info!("Fetched {} quotes", quotes.len());
        Ok(quotes)
    }

    #[tracing::instrument(skip(self, filter))]
    async fn count(&self, filter: &QuoteListFilter) -> RepositoryResult<u64> {
        self.collection
            .count_documents(filter.to_document()?, None)
            .await
            .map_err(|e| {
                error!("Failed to count quotes: {}", e);
                RepositoryError::database(format!("Failed to count quotes: {}", e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_document_includes_status_and_search() {
        let filter = QuoteListFilter {
            q: Some("paris".to_string()),
            status: Some(QuoteStatus::New),
            page: 1,
            limit: 20,
        };
        let doc = filter.to_document().expect("filter doc");
        assert_eq!(doc.get_str("status").expect("status"), "new");
        assert!(doc.contains_key("$or"));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = QuoteListFilter::default();
        let doc = filter.to_document().expect("filter doc");
        assert!(doc.is_empty());
    }

    #[test]
    fn search_input_is_regex_escaped() {
        assert_eq!(regex_escape("a.b(c"), "a\\.b\\(c");
        assert_eq!(regex_escape("paris"), "paris");
    }
}
