//! # Wasla Support
//!
//! Shared utilities for the Wasla resolution engine.
//!
//! This crate provides:
//! - Rendering of resolution chains for error output
//! - Type-name shortening and "did you mean?" suggestions

pub mod rendering;
