//! Shared test utilities for backitup integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with temp source, destination and
//!   schema directories
//! - Scripted stand-ins for rsync and for the disk-space oracle

pub mod harness;

pub use harness::{FailingDisk, FakeDisk, TestHarness};
