//! Shared fixtures for integration tests
//!
//! Each test binary uses a different subset.

#![allow(dead_code)]

pub mod config;
pub mod mock_vendor;
