//! Alpha Trading Library
//!
//! A personal trading ledger: buy and sell transactions priced from Alpha Vantage
//! quotes are appended to a SQLite log, and share ownership and profit are derived
//! from that log.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod persistence;
