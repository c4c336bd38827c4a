//! Live mission view over an agent gateway's operational log.
//!
//! The projection engine lives in `mission-deck-core`. This crate is the
//! async shell around it: the state actor, the log tailer loop, the gateway
//! control channel, and the HTTP/WebSocket surface for observers.

pub mod api;
pub mod config;
pub mod gateway;
pub mod hub;
pub mod state;
pub mod tail;
