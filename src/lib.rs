//! Core library for the notifetch command line application.
//!
//! The library turns remote pages and databases into a single uniform table
//! and exports it. Retrieval lives under [`notifetch::pipeline::fetch`],
//! property normalization in [`notifetch::pipeline::normalize`], record
//! flattening in [`notifetch::pipeline::flatten`], schema unification and
//! table assembly in [`notifetch::pipeline::unify`] and
//! [`notifetch::pipeline::assemble`], and the encoders under
//! [`notifetch::pipeline::io`]. [`notifetch::pipeline::sync`] strings them
//! together for the CLI.

pub mod notifetch;

pub use notifetch::pipeline::{
    Result, ToolError, assemble, config, error, fetch, flatten, io, logging, model, normalize,
    secrets, summary, sync, unify,
};
