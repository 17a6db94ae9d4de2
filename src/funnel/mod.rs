pub mod preprocessor;
pub mod wizard;
