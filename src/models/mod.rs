//! Core data models for the gateway.
//!
//! `RequestPath` is what a request asks for, `PermissionRecord` maps to the
//! permission table via `sqlx::FromRow`, and `AuditRecord` is what gets
//! written once the outcome is known.

pub mod audit;
pub mod permission;
pub mod request_path;
