//! Chef League API Library
//!
//! This library provides the core functionality for the Chef League API:
//! the league consistency engine, its stores, the real-time sync channel,
//! and the client runtime that reconciles both.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod realtime;
pub mod services;
pub mod state;
