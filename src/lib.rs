// src/lib.rs

//! Announcement relay library.
//!
//! Polls announcement sources, detects new or changed records, and sends or
//! edits Telegram messages for them.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
