//! Scope-aware reference collection for top-level bindings
//!
//! Occurrences are attributed to a top-level binding only when no enclosing
//! function, block or catch scope declares the same name. Names bound nowhere
//! are free (globals such as `window` or `undefined`).

use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::ModuleItem;

use super::idents::{IdentKind, IdentVisitor, walk_idents};
use crate::{
    scope::{self, ScopeStack},
    types::FxIndexSet,
};

/// Usage of the top-level bindings of a statement list
#[derive(Debug, Default)]
pub struct BindingUsage {
    /// Top-level bindings in declaration order
    pub top_level: FxIndexSet<String>,
    pub reads: FxHashMap<String, usize>,
    pub writes: FxHashMap<String, usize>,
    /// Number of declarations of each top-level name
    pub declarations: FxHashMap<String, usize>,
    /// Names referenced anywhere without a binding
    pub free: FxIndexSet<String>,
    /// Names declared by scopes enclosing some reference of a top-level binding;
    /// only populated by [`BindingUsage::collect_with_scopes`]
    pub enclosing: FxHashMap<String, FxHashSet<String>>,
}

impl BindingUsage {
    pub fn collect(body: &[ModuleItem]) -> Self {
        Self::run(body, false)
    }

    /// Like [`BindingUsage::collect`], also recording which names each
    /// reference site sees
    pub fn collect_with_scopes(body: &[ModuleItem]) -> Self {
        Self::run(body, true)
    }

    fn run(body: &[ModuleItem], track_enclosing: bool) -> Self {
        let collector = UsageCollector {
            usage: Self {
                top_level: scope::top_level_bindings(body),
                ..Self::default()
            },
            track_enclosing,
        };
        walk_idents(body, collector).usage
    }

    /// Reads plus writes of a top-level binding
    pub fn references(&self, name: &str) -> usize {
        self.reads.get(name).copied().unwrap_or(0) + self.writes.get(name).copied().unwrap_or(0)
    }

    pub fn is_referenced(&self, name: &str) -> bool {
        self.references(name) > 0
    }

    /// Whether the binding may hold different values over time
    pub fn is_reassigned(&self, name: &str) -> bool {
        self.writes.get(name).copied().unwrap_or(0) > 0
            || self.declarations.get(name).copied().unwrap_or(0) > 1
    }
}

#[derive(Debug)]
struct UsageCollector {
    usage: BindingUsage,
    track_enclosing: bool,
}

impl UsageCollector {
    fn record_enclosing(&mut self, name: &str, scopes: &ScopeStack) {
        if !self.track_enclosing || scopes.is_top_level() {
            return;
        }
        let seen = self.usage.enclosing.entry(name.to_string()).or_default();
        for decls in scopes.scopes() {
            seen.extend(decls.iter().cloned());
        }
    }
}

impl IdentVisitor for UsageCollector {
    fn visit_occurrence(&mut self, name: &str, kind: IdentKind, scopes: &ScopeStack) {
        if scopes.is_shadowed(name) {
            return;
        }
        if !self.usage.top_level.contains(name) {
            if kind != IdentKind::Binding {
                self.usage.free.insert(name.to_string());
            }
            return;
        }
        let counter = match kind {
            IdentKind::Read => &mut self.usage.reads,
            IdentKind::Write => &mut self.usage.writes,
            IdentKind::Binding => {
                // Only declarations made at the top level redeclare the binding
                if scopes.is_top_level() {
                    *self.usage.declarations.entry(name.to_string()).or_default() += 1;
                }
                return;
            }
        };
        *counter.entry(name.to_string()).or_default() += 1;
        self.record_enclosing(name, scopes);
    }
}
