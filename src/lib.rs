//! Headless client library for the remdash reminder and scheduling dashboard.
//!
//! The crate is organized around three layers:
//! * [`auth`] - the authenticated request pipeline (bearer injection, one-shot
//!   refresh-and-retry on 401)
//! * [`dashboard`] - typed operations on the dashboard API (meetings, users,
//!   profile)
//! * [`local`] - client-side notes and notification collections
//!
//! Session state (tokens and the cached user snapshot) lives behind the
//! [`session::SessionStore`] trait so it can be persisted to disk or held in
//! memory for tests.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod http;
pub mod local;
pub mod protocol;
pub mod session;
