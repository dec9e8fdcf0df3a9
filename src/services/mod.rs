// src/services/mod.rs
pub mod contact_store;
pub mod db;
pub mod invite_store;
pub mod kv_store;
pub mod mailer;
pub mod membership;
pub mod notification_store;
pub mod oauth;
pub mod session;
pub mod team_directory;
pub mod token_blacklist;
pub mod user_directory;
