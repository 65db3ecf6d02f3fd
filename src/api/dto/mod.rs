//! Data Transfer Objects for REST request/response serialization.
//!
//! Payloads travel as raw JSON documents; nothing here inspects them
//! beyond the validation done by [`crate::domain::NewEventRecord`].

pub mod record_dto;

pub use record_dto::*;
