//! ASDL Schema Compiler
//!
//! Turns an [`asdl_schema::Schema`] into the Rust source of a complete tree
//! library: node layout and factories, dispatch and walk visitors,
//! replacers, the duplicator, three text renderings, and the binary
//! serializer. Generated code depends only on `asdl_rt`.
//!
//! # Pipeline
//!
//! 1. [`classify`]: partition types, resolve field kinds, assign field bits
//!    and pick collision-free names. Every schema fault is reported here.
//! 2. [`emit`]: one token stream per pass, each checked to parse.
//! 3. [`driver`]: concatenate, pretty-print, and write the file.
//!
//! Schema-specific roles (which union is the expression union, which
//! variants the duplicator must refuse, ...) come from [`Conventions`].

pub mod classify;
mod conventions;
mod driver;
pub mod emit;
mod error;
mod names;

pub use conventions::{Conventions, Gate, SkipField};
pub use driver::{generate, generate_file, generate_known, write_if_changed, KnownSchema};
pub use error::GenError;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Enable with `RUST_LOG=asdl_gen=debug`. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
