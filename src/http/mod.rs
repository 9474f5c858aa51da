//! HTTP-facing side of the relay: request validation, parameter coercion,
//! and uniform response shaping around the tracker client.

pub mod handlers;
