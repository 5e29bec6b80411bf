//! C code generation backend for the Norn compiler.
//!
//! The front end hands this crate a fully resolved, type-annotated module
//! tree ([`ast::Module`]); the generator lowers it to two C translation
//! units: an implementation file and, for non-entry-point modules, a public
//! interface header. Generated programs link against the `<norn/NORN.h>`
//! runtime, which supplies the trap macros, the allocator entry points and
//! the type-descriptor helpers referenced from the emitted code.
//!
//! Scanning, parsing, name resolution and type checking are upstream
//! concerns. A tree that violates the annotation contract (an unresolved
//! identifier type, a FOR loop with zero step, a designator that does not
//! match its type) aborts generation with a panic naming the broken
//! assumption; only host-environment failures are reported as [`GenError`].

pub mod ast;
pub mod generate;
pub mod types;

pub use generate::{generate, Config, Generator, Units};

use std::path::PathBuf;
use thiserror::Error;

/// Host-environment failures while writing the output units.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot replace {path}: {source}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file not generated by nornc, will not overwrite: {path}")]
    WillNotOverwrite { path: PathBuf },

    #[error("file not generated by nornc, will not delete: {path}")]
    WillNotDelete { path: PathBuf },
}
