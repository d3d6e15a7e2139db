//! Error types raised while linking a bundle
//!
//! Every variant names the module it was raised for so the diagnostics layer
//! can point at the offending file.

use std::path::PathBuf;

use thiserror::Error;

use crate::module_unit::{ModuleId, SourceLoc};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A compiled source is not valid JavaScript
    #[error("{}{}: syntax error: {message}", .path.display(), loc_suffix(.loc))]
    Parse {
        path: PathBuf,
        message: String,
        loc: Option<SourceLoc>,
    },

    /// An ES module lacks a statically requested named export
    #[error(
        "{}: module does not export `{name}` (imported by {}{})",
        .path.display(),
        .importer.display(),
        loc_suffix(.loc)
    )]
    UnresolvedExport {
        path: PathBuf,
        name: String,
        importer: PathBuf,
        loc: Option<SourceLoc>,
    },

    /// A required dependency has no module in the graph and is neither
    /// optional nor weak
    #[error("{}{}: cannot resolve dependency `{specifier}`", .path.display(), loc_suffix(.loc))]
    MissingDependency {
        path: PathBuf,
        specifier: String,
        loc: Option<SourceLoc>,
    },

    /// A canonical marker with the wrong shape reached the linker
    #[error("{}: malformed `{marker}` marker: {reason}", .path.display())]
    MalformedMarker {
        marker: String,
        path: PathBuf,
        reason: String,
    },

    #[error("unknown module `{0}`")]
    UnknownModule(ModuleId),

    #[error("unknown bundle `{0}`")]
    UnknownBundle(String),
}

fn loc_suffix(loc: &Option<SourceLoc>) -> String {
    loc.map(|loc| format!(":{loc}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_path_and_location() {
        let err = LinkError::MissingDependency {
            path: PathBuf::from("src/a.js"),
            specifier: "./missing".to_string(),
            loc: Some(SourceLoc::new(3, 4)),
        };
        assert_eq!(
            err.to_string(),
            "src/a.js:3:4: cannot resolve dependency `./missing`"
        );

        let err = LinkError::UnresolvedExport {
            path: PathBuf::from("src/b.js"),
            name: "nope".to_string(),
            importer: PathBuf::from("src/a.js"),
            loc: None,
        };
        assert_eq!(
            err.to_string(),
            "src/b.js: module does not export `nope` (imported by src/a.js)"
        );
    }
}
