//! An abstraction layer for the language models that generate samples.
//!
//! This crate establishes an unified protocol for the generation loop to
//! talk to various supported LLM endpoints, so that the loop can switch
//! between them (or a scripted fake) without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod options;
mod provider;
mod request;
mod response;

pub use error::*;
pub use options::*;
pub use provider::*;
pub use request::*;
pub use response::*;
