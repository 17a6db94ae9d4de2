pub mod quote_event_repo;
pub mod quote_repo;
pub mod repository_error;
