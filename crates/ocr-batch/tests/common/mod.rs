//! Shared test utilities for ocr-batch integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated batch runs against a temp data directory
//! - Scripted OCR engine and rasterizer doubles
//! - Builders for uploads and configurations

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{InFlightEngine, LabelRasterizer, ScriptedEngine, TestHarness};
