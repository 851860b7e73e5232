//! Core library for the Perfolizer execution agent.
//!
//! This crate provides the building blocks used by the agent binary: the
//! test plan model and its JSON DTO codec, the tree-executable runtime
//! (controllers, samplers, thread groups), rate limiting, the stats
//! aggregator, host metrics collection, and the HTTP control plane. The
//! primary user-facing interface is the `perfolizer-agent` binary; library
//! APIs may evolve as the agent grows.
pub mod agent;
pub mod config;
pub mod elements;
pub mod error;
pub mod exec;
pub mod host;
pub mod logger;
pub mod plan;
pub mod stats;
