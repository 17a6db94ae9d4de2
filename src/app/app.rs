use crate::config::app_conf::AppConfig;
use crate::config::{EmailConfig, MinioConfig, MongoConfig};
use crate::repository::quote_event_repo::MongoQuoteEventRepository;
use crate::repository::quote_repo::MongoQuoteRepository;
use crate::router::quote_router::quote_router;
use crate::service::quote_service::{QuoteService, QuoteServiceImpl};
use crate::util::email::SmtpMailer;
use crate::util::storage::MinioStorage;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// The assembled application: configuration, wired services and the router.
///
/// Construction fails fast: a missing environment variable or an unreachable
/// bucket stops the process before it accepts a single request.
pub struct App {
    config: AppConfig,
    router: Router,
    pub quote_service: Arc<dyn QuoteService>,
}

impl App {
    pub async fn new() -> Self {
        let config = AppConfig::from_env().expect("App config error");
        let mongo_config = MongoConfig::from_env().expect("Mongo config error");
        let minio_config = MinioConfig::from_env().expect("MinIO config error");
        let email_config = EmailConfig::from_env().expect("Email config error");

        let quote_repo = Arc::new(
            MongoQuoteRepository::new(&mongo_config)
                .await
                .expect("Quote repo error"),
        );
        let event_repo = Arc::new(
            MongoQuoteEventRepository::new(&mongo_config)
                .await
                .expect("Quote event repo error"),
        );
        let storage = Arc::new(
            MinioStorage::new(minio_config)
                .await
                .expect("MinIO storage error"),
        );
        let mailer = Arc::new(SmtpMailer::new(email_config.clone()).expect("SMTP mailer error"));

        let quote_service: Arc<dyn QuoteService> = Arc::new(QuoteServiceImpl::new(
            quote_repo,
            event_repo,
            storage,
            mailer,
            email_config,
        ));

        let router = quote_router(quote_service.clone());
        App {
            config,
            router,
            quote_service,
        }
    }

    pub async fn start(self) {
        let addr = SocketAddr::new(
            self.config.host.parse().expect("Invalid host"),
            self.config.port,
        );
        info!("🚀 Server running at http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind address");
        axum::serve(listener, self.router)
            .await
            .expect("Failed to start server");
    }
}
