//! sitegate web server.
//!
//! Serves a static site from disk, with every request classified by the
//! [`sitegate_auth`] session gate before it reaches a file.

pub mod app;
pub mod config;
pub mod gate;
