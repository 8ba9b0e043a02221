pub mod cancellation;
pub mod chat_stream;
pub mod client;
pub mod config;
pub mod event_parser;
pub mod resume;
pub mod transcript;
