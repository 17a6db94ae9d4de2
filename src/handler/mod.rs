pub mod quote_handler;
