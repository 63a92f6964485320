//! Synthetic named-entity-recognition dataset generation on top of a chat
//! completion model.
//!
//! The crate includes a CLI tool that writes a dataset file. You can also use
//! it as a library: [`GeneratorBuilder`] assembles a
//! [`GenerationSession`](core::GenerationSession) from a labeling scheme,
//! and [`output`] renders the collected samples.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod generator;
mod interrupt;
pub mod output;
mod scheme;

pub use generator::{DEFAULT_SYSTEM_PROMPT, GeneratorBuilder};
pub use interrupt::handle_interrupts;
pub use output::OutputFormat;
pub use scheme::LabelingScheme;

/// Re-exports of [`ner_forge_core`] crate.
pub mod core {
    pub use ner_forge_core::*;
}
