pub mod quote;
pub mod quote_event;
