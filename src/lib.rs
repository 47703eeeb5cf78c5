pub mod application;
pub mod error;
pub mod llm;
pub mod model;
pub mod relay;
