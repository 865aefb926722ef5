//! Low-latency WebSocket client for a private order feed.
//!
//! This crate connects to an HFT venue through a plain-TCP gateway, logs in,
//! subscribes to an order channel, and answers every order event with a
//! projection of its fields plus static credentials. The time between an
//! event arriving on the socket and the reply leaving it is the metric
//! everything here is shaped around: fixed single-allocation buffers, a
//! streaming JSON walk that hands out slices of the receive buffer, and
//! reply payloads assembled in place in front of a reserved frame-header
//! prefix.
//!
//! Several connection workers run in parallel against the same feed and
//! coordinate through a small shared ring so each order is answered exactly
//! once, per the [WebSocket Protocol RFC](https://datatracker.ietf.org/doc/html/rfc6455)
//! on the wire.

pub mod config;
pub mod error;
pub mod frame;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod request;
pub mod ring;
pub mod socket;
pub mod supervisor;
pub mod trie;
pub mod websocket;
