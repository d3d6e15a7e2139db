//! Short names for the top-level bindings of a linked bundle
//!
//! Bindings are ordered by reference count, most used first, and each takes
//! the first name of a dense counting sequence that nothing near its
//! references would capture.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::ModuleItem;
use swc_ecma_visit::VisitMutWith;

use crate::{
    normalizer::renamer::Renamer,
    runtime,
    visitors::BindingUsage,
};

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_";
const REST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_0123456789";

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "Infinity", "instanceof", "interface",
    "let", "NaN", "new", "null", "package", "private", "protected", "public", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

/// The `n`th name of the sequence `a, b, ..., _, aa, ba, ...`
fn nth_name(mut n: usize) -> String {
    let mut name = String::new();
    name.push(char::from(FIRST_CHARS[n % FIRST_CHARS.len()]));
    n /= FIRST_CHARS.len();
    while n > 0 {
        n -= 1;
        name.push(char::from(REST_CHARS[n % REST_CHARS.len()]));
        n /= REST_CHARS.len();
    }
    name
}

/// Rename the top-level bindings of `body`; returns how many were renamed
pub fn mangle(body: &mut Vec<ModuleItem>) -> usize {
    let usage = BindingUsage::collect_with_scopes(body);

    let mut bindings: Vec<&String> = usage
        .top_level
        .iter()
        .filter(|name| name.as_str() != runtime::REGISTRY)
        .collect();
    bindings.sort_by(|a, b| {
        usage
            .references(b)
            .cmp(&usage.references(a))
            .then_with(|| a.cmp(b))
    });

    let empty = FxHashSet::default();
    let mut assigned: FxHashSet<String> = FxHashSet::default();
    let mut renames: FxHashMap<String, String> = FxHashMap::default();
    for binding in bindings {
        let enclosing = usage.enclosing.get(binding.as_str()).unwrap_or(&empty);
        let name = (0..)
            .map(nth_name)
            .find(|candidate| {
                !RESERVED.contains(&candidate.as_str())
                    && !assigned.contains(candidate)
                    && !usage.free.contains(candidate)
                    && !usage.top_level.contains(candidate)
                    && !enclosing.contains(candidate)
            })
            .unwrap_or_default();
        trace!("Mangling {binding} to {name}");
        let fresh = assigned.insert(name.clone());
        debug_assert!(fresh, "mangled name {name} assigned twice");
        renames.insert(binding.clone(), name);
    }

    body.visit_mut_with(&mut Renamer::new(&renames));
    debug!("Mangled {} top-level bindings", renames.len());
    renames.len()
}
