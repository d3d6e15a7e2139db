//! Scope-hoisting module linker for JavaScript bundles
//!
//! Given independently compiled modules (a mix of CommonJS and ES modules)
//! and the bundle they belong to, [`link_bundle`] produces one merged
//! statement list in which per-module wrapper functions and exports-object
//! indirection are removed wherever that is statically safe.

pub mod ast_builder;
pub mod ast_util;
pub mod config;
pub mod dead_exports;
pub mod error;
pub mod graph;
pub mod linker;
pub mod mangler;
pub mod markers;
pub mod module_unit;
pub mod normalizer;
pub mod output_format;
pub mod parser;
pub mod pipeline;
pub mod printer;
pub mod resolver;
pub mod runtime;
pub mod scope;
pub mod types;
pub mod visitors;
pub mod wrap_decision;

pub use config::{Config, OutputFormatKind};
pub use error::LinkError;
pub use graph::{Bundle, BundleGraph};
pub use module_unit::{Dependency, ModuleId, ModuleUnit};
pub use pipeline::{LinkStats, LinkedBundle, link_bundle};
