//! Read-only analysis visitors shared by the passes
//!
//! These visitors answer the questions every pass keeps asking: what does
//! each identifier occurrence stand for, does evaluating this code have
//! observable effects, and where is each top-level binding referenced.

mod binding_usage;
mod idents;
mod side_effect_detector;

pub use binding_usage::BindingUsage;
pub use idents::{IdentKind, IdentVisitor, IdentWalker, walk_idents};
pub(crate) use side_effect_detector::class_has_side_effects;
pub use side_effect_detector::{ExpressionSideEffectDetector, SideEffectDetector};
