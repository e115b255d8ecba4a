//! # Layer 1 Tests
//!
//! This module contains all tests for Layer 1 (Discovery) components.

pub mod integration_tests;
pub mod performance_tests;
pub mod test_utils;