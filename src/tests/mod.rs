//! Integration tests
//!
//! Every test builds a fresh app around an in-memory storage

mod helper;
mod root;
