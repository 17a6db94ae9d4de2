pub mod email;
pub mod error;
pub mod storage;
pub mod validate;
