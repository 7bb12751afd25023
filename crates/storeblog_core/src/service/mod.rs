//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into blog use-case APIs.
//! - Keep callers decoupled from storage details.

pub mod blog_service;
