pub mod app;
pub mod cli;
pub mod email_content;
pub mod error;
pub mod gmail_api;
pub mod types;
