//! ML Digest - landing site and news digest viewer for an ML newsletter
//!
//! This crate serves a small JSON API for subscribers and news items, and
//! server-rendered pages that group the current digest into category tabs.

pub mod api;
pub mod carousel;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod export;
pub mod grouping;
pub mod models;
pub mod render;
pub mod routes;
pub mod subscribe;
pub mod tabs;
