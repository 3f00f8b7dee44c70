//! Card repository
//!
//! This module provides:
//! - Deck management
//! - Basic and multiple-choice card CRUD with validation
//! - Review logging
//! - SM-2 spaced repetition scheduling

pub mod algorithm;
pub mod models;
pub mod storage;

pub use models::*;
pub use storage::{CardSource, FlashcardStorage, FlashcardStorageError};
