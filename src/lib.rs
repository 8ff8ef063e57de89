//! # main-dex-list
//!
//! Computes the classes that must be packaged in the primary dex of a
//! multidex Android application.
//!
//! ## Architecture
//!
//! - **descriptor**: JVM type and method descriptor decoding
//! - **classfile**: Class names and constant-pool extraction from class files
//! - **classpath**: Class lookup over ordered archives and directories
//! - **scan**: Class references of one constant pool
//! - **closure**: Fixed-point expansion of roots over hierarchy and references
//! - **roots**: Root names from the roots container, optionally keep-list filtered
//! - **report**: Text and JSON rendering of the final list
//! - **cli** / **config**: Command-line surface and resolved run configuration

pub mod classfile;
pub mod classpath;
pub mod cli;
pub mod closure;
pub mod config;
pub mod descriptor;
pub mod report;
pub mod roots;
pub mod scan;

#[cfg(test)]
mod fixtures;
