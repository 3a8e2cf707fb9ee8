//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Frame timing
//! - Logging initialization

pub mod logging;
pub mod time;
