//! Test suite for xfpad
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
pub mod property;
