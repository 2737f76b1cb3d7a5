//! Lead Intake API Library
//!
//! Backend for the site's contact form: validates submissions, stores them as
//! leads, and notifies the business over WhatsApp.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database pool construction.
//! - `db_storage`: PostgreSQL lead store.
//! - `errors`: HTTP-facing error types.
//! - `handlers`: HTTP request handlers and router.
//! - `intake`: The intake pipeline (validate, persist, notify).
//! - `models`: Lead records and intake payloads.
//! - `notification`: WhatsApp notification dispatcher.
//! - `storage`: Lead store trait and JSON file store.
//! - `validation`: CPF, email, and phone checks.

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod intake;
pub mod models;
pub mod notification;
pub mod storage;
pub mod validation;
