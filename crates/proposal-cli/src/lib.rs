//! # proposal-cli: Offline Proposal Tooling
//!
//! Library half of the `proposal` binary. Each subcommand lives in its own
//! module and returns an exit code so that it can be tested without
//! spawning a process.

pub mod digest;
