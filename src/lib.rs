//! # atomic-weaver
//!
//! An offline bytecode weaver: methods carrying the atomic marker
//! annotation are rewritten in place to route through a pluggable
//! transactional-execution context at load time.
//!
//! ## Architecture
//!
//! - **model**: structural compiled-class model (classes, methods, typed instructions)
//! - **descriptor**: type/descriptor algebra (boxing, opcodes, slot widths)
//! - **codec**: binary encode/decode boundary for class artifacts
//! - **schema**: one-time load of option defaults and the configuration field schema
//! - **transform**: the Transactify engine (dispatch, capture class, context field, clinit merge)
//! - **emit**: committed writes of primary and capture artifacts
//! - **scan**: artifact discovery under input paths
//! - **weave**: per-unit pipeline fanned out across worker threads, with reporting
//! - **cli** / **config**: command surface and schema-root resolution

pub mod cli;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod emit;
pub mod model;
pub mod scan;
pub mod schema;
pub mod transform;
pub mod weave;
