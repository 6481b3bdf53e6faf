pub mod app_context;
pub mod config;
pub mod consumer;
pub mod error;
pub mod failure;
pub mod mailer;
pub mod metric_consts;
pub mod orders;
pub mod processor;
pub mod render;
pub mod server;
pub mod source;
#[cfg(test)]
pub mod test_utils;
