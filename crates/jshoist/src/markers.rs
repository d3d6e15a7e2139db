//! Canonical markers
//!
//! Markers are placeholder calls the normalizer leaves where a module refers
//! to another module. The linker resolves each of them exactly once, much like
//! a static linker applies relocations:
//!
//! ```text
//! $hoist$require("<id>", "<specifier>")
//! $hoist$require_resolve("<id>", "<specifier>")
//! $hoist$missing("<specifier>")
//! $hoist$wildcard(<destination exports>, "<id>", "<specifier>")
//! ```

use std::path::Path;

use swc_ecma_ast::Expr;

use crate::{
    ast_builder as b,
    ast_util::{as_ident, as_ident_call, as_str_lit},
    error::{LinkError, Result},
    module_unit::ModuleId,
};

pub const REQUIRE: &str = "$hoist$require";
pub const REQUIRE_RESOLVE: &str = "$hoist$require_resolve";
pub const MISSING: &str = "$hoist$missing";
pub const WILDCARD: &str = "$hoist$wildcard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// The exports of the module behind `specifier`
    Require {
        module: ModuleId,
        specifier: String,
    },
    /// The id of the module behind `specifier`
    RequireResolve {
        module: ModuleId,
        specifier: String,
    },
    /// A literal specifier the module never declared as a dependency
    Missing { specifier: String },
    /// Copy the non-default exports of `specifier` onto `destination`
    Wildcard {
        destination: String,
        module: ModuleId,
        specifier: String,
    },
}

impl Marker {
    pub fn require(module: &ModuleId, specifier: &str) -> Self {
        Self::Require {
            module: module.clone(),
            specifier: specifier.to_string(),
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Require { module, specifier } => b::call_ident(
                REQUIRE,
                vec![b::string(module.as_str()), b::string(specifier)],
            ),
            Self::RequireResolve { module, specifier } => b::call_ident(
                REQUIRE_RESOLVE,
                vec![b::string(module.as_str()), b::string(specifier)],
            ),
            Self::Missing { specifier } => b::call_ident(MISSING, vec![b::string(specifier)]),
            Self::Wildcard {
                destination,
                module,
                specifier,
            } => b::call_ident(
                WILDCARD,
                vec![
                    b::ident(destination),
                    b::string(module.as_str()),
                    b::string(specifier),
                ],
            ),
        }
    }

    /// Whether `name` is one of the marker callees
    pub fn is_marker_name(name: &str) -> bool {
        matches!(name, REQUIRE | REQUIRE_RESOLVE | MISSING | WILDCARD)
    }

    /// Decode a marker call
    ///
    /// Returns `Ok(None)` for expressions that are not marker calls and
    /// `MalformedMarker` for marker calls with the wrong arity or argument
    /// types.
    pub fn parse(expr: &Expr, path: &Path) -> Result<Option<Self>> {
        let Some((callee, args)) = as_ident_call(expr) else {
            return Ok(None);
        };
        if !Self::is_marker_name(callee) {
            return Ok(None);
        }

        let malformed = |reason: String| LinkError::MalformedMarker {
            marker: callee.to_string(),
            path: path.to_path_buf(),
            reason,
        };
        let expected = if callee == MISSING {
            1
        } else if callee == WILDCARD {
            3
        } else {
            2
        };
        if args.len() != expected {
            return Err(malformed(format!(
                "expected {expected} arguments, found {}",
                args.len()
            )));
        }
        let arg = |index: usize| {
            args.get(index)
                .filter(|arg| arg.spread.is_none())
                .map(|arg| arg.expr.as_ref())
                .ok_or_else(|| malformed(format!("argument {index} must not be spread")))
        };
        let string_arg = |index: usize| {
            arg(index).and_then(|value| {
                as_str_lit(value)
                    .ok_or_else(|| malformed(format!("argument {index} must be a string literal")))
            })
        };

        let marker = match callee {
            REQUIRE => Self::Require {
                module: ModuleId::from_escaped(string_arg(0)?),
                specifier: string_arg(1)?.to_string(),
            },
            REQUIRE_RESOLVE => Self::RequireResolve {
                module: ModuleId::from_escaped(string_arg(0)?),
                specifier: string_arg(1)?.to_string(),
            },
            MISSING => Self::Missing {
                specifier: string_arg(0)?.to_string(),
            },
            _ => Self::Wildcard {
                destination: as_ident(arg(0)?)
                    .ok_or_else(|| malformed("argument 0 must be an identifier".to_string()))?
                    .to_string(),
                module: ModuleId::from_escaped(string_arg(1)?),
                specifier: string_arg(2)?.to_string(),
            },
        };
        Ok(Some(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_decode_what_they_encode() {
        let marker = Marker::Wildcard {
            destination: "$a$exports".to_string(),
            module: ModuleId::new("a"),
            specifier: "./b".to_string(),
        };
        let parsed = Marker::parse(&marker.to_expr(), Path::new("a.js")).expect("well formed");
        assert_eq!(parsed, Some(marker));
    }

    #[test]
    fn test_escaped_ids_survive_decoding() {
        let marker = Marker::require(&ModuleId::new("pkg/a-b"), "./c");
        let parsed = Marker::parse(&marker.to_expr(), Path::new("a.js")).expect("well formed");
        assert_eq!(parsed, Some(marker));
    }

    #[test]
    fn test_ordinary_calls_are_not_markers() {
        let call = b::call_ident("require", vec![b::string("./b")]);
        assert_eq!(Marker::parse(&call, Path::new("a.js")), Ok(None));
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let call = b::call_ident(REQUIRE, vec![b::string("a")]);
        let err = Marker::parse(&call, Path::new("a.js")).expect_err("arity mismatch");
        assert!(matches!(err, LinkError::MalformedMarker { .. }));
        assert!(err.to_string().contains("expected 2 arguments"));
    }

    #[test]
    fn test_non_literal_argument_is_malformed() {
        let call = b::call_ident(REQUIRE, vec![b::ident("id"), b::string("./b")]);
        assert!(Marker::parse(&call, Path::new("a.js")).is_err());
    }
}
