//! callchain library — downward call-chain rendering over a store-backed
//! method-call graph.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
