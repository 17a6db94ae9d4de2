use crate::config::mongo_conf::MongoConfig;
use crate::model::quote_event::QuoteEvent;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use futures::stream::StreamExt;
use mongodb::options::FindOptions;
use tracing::{error, info};

#[async_trait]
pub trait QuoteEventRepository: Send + Sync {
    /// Append an event to the audit log. Callers treat failures as
    /// best-effort and never fail the originating request.
    async fn append(&self, event: QuoteEvent) -> RepositoryResult<QuoteEvent>;
    async fn list_for_quote(&self, quote_id: ObjectId) -> RepositoryResult<Vec<QuoteEvent>>;
}

pub struct MongoQuoteEventRepository {
    collection: mongodb::Collection<QuoteEvent>,
}

impl MongoQuoteEventRepository {
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
        let collection = db.collection::<QuoteEvent>(&config.event_collection);
        Ok(MongoQuoteEventRepository { collection })
    }
}

#[async_trait]
impl QuoteEventRepository for MongoQuoteEventRepository {
    #[tracing::instrument(skip(self, event), fields(quote_id = %event.quote_id, event_type = %event.event_type))]
    async fn append(&self, event: QuoteEvent) -> RepositoryResult<QuoteEvent> {
        let mut new_event = event;
        new_event.id = Some(ObjectId::new());
        new_event.created_at = Some(chrono::Utc::now().to_rfc3339());

        match self.collection.insert_one(new_event.clone(), None).await {
            Ok(_) => {
                info!("Quote event appended");
                Ok(new_event)
            }
            Err(e) => {
                error!("Failed to append quote event: {}", e);
                Err(RepositoryError::database(format!(
                    "Failed to append quote event: {}",
                    e
                )))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(quote_id = %quote_id))]
    async fn list_for_quote(&self, quote_id: ObjectId) -> RepositoryResult<Vec<QuoteEvent>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let mut cursor = self
            .collection
            .find(doc! { "quote_id": quote_id }, options)
            .await
            .map_err(|e| {
                error!("Failed to list quote events: {}", e);
                RepositoryError::database(format!("Failed to list quote events: {}", e))
            })?;

        let mut events = Vec::new();
        while let Some(event) = cursor.next().await {
            match event {
                Ok(e) => events.push(e),
                Err(e) => {
                    return Err(RepositoryError::serialization(format!(
                        "Failed to deserialize quote event: {}",
                        e
                    )));
                }
            }
        }
        Ok(events)
    }
}
