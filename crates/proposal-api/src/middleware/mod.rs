//! HTTP middleware layers for the proposal API.

pub mod metrics;
