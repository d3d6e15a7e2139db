//! Compiled-but-unlinked representation of a single source file
//!
//! A [`ModuleUnit`] is created once per compiled file, mutated in place by the
//! normalizer and then by the linker, and discarded after the bundle has been
//! emitted.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use swc_ecma_ast::ModuleItem;

use crate::{error::Result, parser::parse_module, types::FxIndexMap};

/// Original source position, 1-based line and 0-based column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Bundle-unique, stable module identifier
///
/// Ids are embedded into generated identifiers (`$<id>$name`), so they only
/// contain ASCII alphanumerics and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    /// Create an id from an arbitrary string
    ///
    /// Alphanumerics are kept, `_` becomes `__` and every other byte becomes
    /// `_` followed by its two hex digits, so distinct inputs never share an
    /// id (`a-b` is `a_2db`, `a_b` is `a__b`).
    pub fn new(id: impl AsRef<str>) -> Self {
        let mut escaped = String::with_capacity(id.as_ref().len());
        for byte in id.as_ref().bytes() {
            match byte {
                b'_' => escaped.push_str("__"),
                byte if byte.is_ascii_alphanumeric() => escaped.push(char::from(byte)),
                byte => escaped.push_str(&format!("_{byte:02x}")),
            }
        }
        Self(escaped)
    }

    /// Rebuild an id from its already escaped form, as embedded in markers
    pub(crate) fn from_escaped(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Derive a stable id from a file path using a truncated SHA-256 digest
    pub fn from_path(path: &Path) -> Self {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let hex: String = digest
            .iter()
            .take(4)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix shared by every top-level binding of this module
    pub fn prefix(&self) -> String {
        format!("${}$", self.0)
    }

    /// `$<id>$<name>`
    pub fn prefixed(&self, name: &str) -> String {
        format!("${}${name}", self.0)
    }

    pub fn is_prefixed(&self, name: &str) -> bool {
        name.strip_prefix('$')
            .and_then(|rest| rest.strip_prefix(self.0.as_str()))
            .is_some_and(|rest| rest.starts_with('$'))
    }

    /// The synthesized exports object identifier
    pub fn exports_ident(&self) -> String {
        self.prefixed("exports")
    }

    /// Binding synthesized for a promoted or default export
    pub fn export_ident(&self, name: &str) -> String {
        self.prefixed(&format!("export${name}"))
    }

    /// Local standing in for a name re-exported from another module
    pub fn reexport_ident(&self, name: &str) -> String {
        self.prefixed(&format!("reexport${name}"))
    }

    /// One-shot initializer of a wrapped module
    pub fn init_ident(&self) -> String {
        self.prefixed("init")
    }

    /// Re-entry guard of a wrapped module's initializer
    pub fn executed_ident(&self) -> String {
        self.prefixed("executed")
    }

    /// Shared default-interop variable of an unwrapped CommonJS module
    pub fn interop_ident(&self) -> String {
        self.prefixed("interop$default")
    }

    /// Default-interop variable private to this module for `source`
    pub fn interop_ident_for(&self, source: &Self) -> String {
        self.prefixed(&format!("interop${}", source.0))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A declared dependency of a module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dependency {
    pub specifier: String,
    /// A missing target degrades to a runtime throw
    pub is_optional: bool,
    /// A missing target is dropped silently
    pub is_weak: bool,
    /// Reached through `import()`
    pub is_dynamic: bool,
    /// Set by the normalizer when a require site is not evaluated eagerly
    pub must_wrap: bool,
    pub loc: Option<SourceLoc>,
}

impl Dependency {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    #[must_use]
    pub fn weak(mut self) -> Self {
        self.is_weak = true;
        self
    }

    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    #[must_use]
    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = Some(loc);
        self
    }
}

/// Target of an exported name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntry {
    /// A binding of the module itself
    Local(String),
    /// `importedName` of the module behind `specifier`; `*` is the namespace
    ReExport { specifier: String, imported: String },
}

/// Source of an imported local binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub specifier: String,
    /// `default`, a named export, or `*` for a namespace import
    pub imported: String,
}

impl ImportEntry {
    pub fn new(specifier: impl Into<String>, imported: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            imported: imported.into(),
        }
    }

    pub fn is_namespace(&self) -> bool {
        self.imported == "*"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleFlags {
    pub is_common_js: bool,
    pub is_es_module: bool,
    pub should_wrap: bool,
    /// Evaluating the module has no observable effect
    pub side_effect_free: bool,
    pub normalized: bool,
    /// Wrapped because of a local trigger (`eval`, top-level `return`, free `module`)
    pub self_wrapped: bool,
    pub has_exports_identifier: bool,
}

impl ModuleFlags {
    /// ES module syntax with no CommonJS idioms
    pub const fn is_pure_esm(&self) -> bool {
        self.is_es_module && !self.is_common_js
    }
}

#[derive(Debug, Clone)]
pub struct ModuleUnit {
    pub id: ModuleId,
    /// Original file path, for diagnostics
    pub path: PathBuf,
    pub body: Vec<ModuleItem>,
    /// First source position of each specifier, for diagnostics
    pub specifier_locs: FxIndexMap<String, SourceLoc>,
    /// Declared dependencies keyed by specifier
    pub dependencies: FxIndexMap<String, Dependency>,
    pub exports: FxIndexMap<String, ExportEntry>,
    /// Specifiers of `export * from` sources, in source order
    pub wildcard_sources: Vec<String>,
    /// Imported locals keyed by their (renamed) local identifier
    pub imports: FxIndexMap<String, ImportEntry>,
    pub flags: ModuleFlags,
}

impl ModuleUnit {
    pub fn new(id: ModuleId, path: impl Into<PathBuf>, body: Vec<ModuleItem>) -> Self {
        Self {
            id,
            path: path.into(),
            body,
            specifier_locs: FxIndexMap::default(),
            dependencies: FxIndexMap::default(),
            exports: FxIndexMap::default(),
            wildcard_sources: Vec::new(),
            imports: FxIndexMap::default(),
            flags: ModuleFlags::default(),
        }
    }

    /// Parse compiled `source` into a unit
    pub fn parse(id: ModuleId, path: impl Into<PathBuf>, source: &str) -> Result<Self> {
        let path = path.into();
        let parsed = parse_module(&path, source)?;
        let mut unit = Self::new(id, path, parsed.body);
        unit.specifier_locs = parsed.specifier_locs;
        Ok(unit)
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.add_dependency(dependency);
        self
    }

    pub fn add_dependency(&mut self, dependency: Dependency) {
        self.dependencies
            .insert(dependency.specifier.clone(), dependency);
    }

    pub fn dependency(&self, specifier: &str) -> Option<&Dependency> {
        self.dependencies.get(specifier)
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;

    use super::*;

    #[test]
    fn test_module_id_is_identifier_safe() {
        let id = ModuleId::new("src/a-b.js");
        assert_eq!(id.as_str(), "src_2fa_2db_2ejs");
        assert_eq!(id.exports_ident(), "$src_2fa_2db_2ejs$exports");
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        );
    }

    #[test]
    fn test_distinct_names_never_share_an_id() {
        let names = ["a-b", "a_b", "a.b", "a__b", "a_2db", "ab"];
        let ids: FxHashSet<ModuleId> = names.iter().map(ModuleId::new).collect();
        assert_eq!(ids.len(), names.len());
        assert_eq!(ModuleId::new("a_b").as_str(), "a__b");
        assert_eq!(ModuleId::new("a-b").as_str(), "a_2db");
    }

    #[test]
    fn test_from_path_is_stable() {
        let a = ModuleId::from_path(Path::new("src/index.js"));
        let b = ModuleId::from_path(Path::new("src/index.js"));
        let c = ModuleId::from_path(Path::new("src/other.js"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 8);
    }

    #[test]
    fn test_parse_records_specifier_locations() {
        let unit = ModuleUnit::parse(
            ModuleId::new("a"),
            "src/a.js",
            "import { x } from './b';\nlog(x);",
        )
        .expect("parses");
        assert_eq!(unit.body.len(), 2);
        assert_eq!(unit.specifier_locs.get("./b"), Some(&SourceLoc::new(1, 0)));
        assert!(unit.dependencies.is_empty());
    }

    #[test]
    fn test_prefix_detection() {
        let id = ModuleId::new("a");
        assert!(id.is_prefixed("$a$foo"));
        assert!(!id.is_prefixed("$ab$foo"));
        assert!(!id.is_prefixed("foo"));
        assert_eq!(id.export_ident("bar"), "$a$export$bar");
        assert_eq!(id.interop_ident_for(&ModuleId::new("b")), "$a$interop$b");
    }
}
