//! Lowering of `import` and `export` declarations
//!
//! Import declarations disappear: their locals are recorded in the imports
//! table and the linker later replaces every reference. Each distinct source
//! keeps one evaluation marker at the top of the module so evaluation order
//! survives. Export declarations become exports-table entries plus live
//! definitions on the module's exports object, installed before any
//! dependency runs so cyclic importers already see every name.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::{
    ClassDecl, Decl, DefaultDecl, ExportSpecifier, FnDecl, ImportDecl, ImportSpecifier,
    ModuleDecl, ModuleItem, Stmt,
};

use crate::{
    ast_builder as b,
    ast_util::{export_name, str_value},
    markers::Marker,
    module_unit::{Dependency, ExportEntry, ImportEntry, ModuleId, ModuleUnit},
    runtime, scope,
    types::{FxIndexMap, FxIndexSet},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Lowering {
    /// The body joins the shared scope; locals are renamed
    Hoisted,
    /// The body stays inside a private closure with its own `exports`
    SelfWrapped,
}

#[derive(Debug, Default)]
pub(super) struct LoweredModule {
    body: Vec<ModuleItem>,
    exports: FxIndexMap<String, ExportEntry>,
    imports: FxIndexMap<String, ImportEntry>,
    wildcard_sources: Vec<String>,
    /// Every source mentioned by a declaration
    specifiers: FxIndexSet<String>,
}

impl LoweredModule {
    /// Merge the recorded tables into `unit` and hand back the lowered body
    ///
    /// Sources the unit never declared become plain dependencies.
    pub(super) fn apply_to(self, unit: &mut ModuleUnit) -> Vec<ModuleItem> {
        for specifier in self.specifiers {
            let loc = unit.specifier_locs.get(&specifier).copied();
            match unit.dependencies.get_mut(&specifier) {
                Some(dependency) => {
                    if dependency.loc.is_none() {
                        dependency.loc = loc;
                    }
                }
                None => {
                    let mut dependency = Dependency::new(specifier);
                    dependency.loc = loc;
                    unit.add_dependency(dependency);
                }
            }
        }
        unit.exports.extend(self.exports);
        unit.imports.extend(self.imports);
        unit.wildcard_sources.extend(self.wildcard_sources);
        self.body
    }
}

#[derive(Debug)]
pub(super) struct ModuleDeclLowering<'a> {
    id: &'a ModuleId,
    mode: Lowering,
    renames: &'a FxHashMap<String, String>,
    /// Original import locals
    local_imports: FxHashMap<String, ImportEntry>,
    evaluated: FxHashSet<String>,
    lowered: LoweredModule,
    /// `$hoist$export(...)` calls, which only install getters
    definitions: Vec<Stmt>,
    evaluation: Vec<Stmt>,
    /// Closure-local import aliases of self-wrapped modules
    aliases: Vec<Stmt>,
}

impl<'a> ModuleDeclLowering<'a> {
    pub(super) fn new(
        id: &'a ModuleId,
        mode: Lowering,
        renames: &'a FxHashMap<String, String>,
    ) -> Self {
        Self {
            id,
            mode,
            renames,
            local_imports: FxHashMap::default(),
            evaluated: FxHashSet::default(),
            lowered: LoweredModule::default(),
            definitions: Vec::new(),
            evaluation: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub(super) fn lower(mut self, body: Vec<ModuleItem>) -> LoweredModule {
        for item in &body {
            if let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item {
                self.record_import(import);
            }
        }

        let mut out = Vec::with_capacity(body.len());
        for item in body {
            match item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => self.lower_import(&import),
                ModuleItem::ModuleDecl(decl) => self.lower_export(decl, &mut out),
                ModuleItem::Stmt(stmt) => out.push(stmt),
            }
        }

        self.lowered.body = self
            .definitions
            .into_iter()
            .chain(self.evaluation)
            .chain(self.aliases)
            .chain(out)
            .map(ModuleItem::Stmt)
            .collect();
        self.lowered
    }

    fn rename(&self, name: &str) -> String {
        match self.mode {
            Lowering::Hoisted => self
                .renames
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string()),
            Lowering::SelfWrapped => name.to_string(),
        }
    }

    fn exports_object(&self) -> String {
        match self.mode {
            Lowering::Hoisted => self.id.exports_ident(),
            Lowering::SelfWrapped => "exports".to_string(),
        }
    }

    /// `$hoist$export(<exports>, "exported", function () { return local; })`
    fn define_export(&mut self, exported: &str, local: &str) {
        let call = runtime::export_call(b::ident(&self.exports_object()), exported, b::ident(local));
        self.definitions.push(b::expr_stmt(call));
    }

    fn note_specifier(&mut self, specifier: &str) {
        self.lowered.specifiers.insert(specifier.to_string());
    }

    /// Keep one evaluation marker per source
    fn evaluate(&mut self, specifier: &str) {
        if self.evaluated.insert(specifier.to_string()) {
            self.evaluation
                .push(b::expr_stmt(Marker::require(self.id, specifier).to_expr()));
        }
    }

    fn import_key(&self, local: &str) -> String {
        match self.mode {
            Lowering::Hoisted => self.rename(local),
            Lowering::SelfWrapped => self.id.prefixed(local),
        }
    }

    fn record_import(&mut self, import: &ImportDecl) {
        let source = str_value(&import.src);
        self.note_specifier(&source);
        for specifier in &import.specifiers {
            let imported = match specifier {
                ImportSpecifier::Default(_) => "default".to_string(),
                ImportSpecifier::Named(named) => named
                    .imported
                    .as_ref()
                    .map_or_else(|| named.local.sym.to_string(), export_name),
                ImportSpecifier::Namespace(_) => "*".to_string(),
            };
            let local = specifier.local().sym.to_string();
            let entry = ImportEntry::new(&source, imported);
            let key = self.import_key(&local);
            self.local_imports.insert(local, entry.clone());
            self.lowered.imports.insert(key, entry);
        }
    }

    fn lower_import(&mut self, import: &ImportDecl) {
        self.evaluate(&str_value(&import.src));
        if self.mode == Lowering::SelfWrapped {
            // Closure-local aliases for the linker-resolved bindings
            for specifier in &import.specifiers {
                let local = specifier.local().sym.as_str();
                self.aliases
                    .push(b::var_stmt(local, b::ident(&self.id.prefixed(local))));
            }
        }
    }

    fn export_local(&mut self, exported: &str, local: &str) {
        self.lowered
            .exports
            .insert(exported.to_string(), ExportEntry::Local(self.rename(local)));
        self.define_export(exported, local);
    }

    /// Binding used for a re-exported name
    fn reexport_local(&self, exported: &str) -> String {
        let sanitized: String = exported
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
            .collect();
        self.id.reexport_ident(&sanitized)
    }

    fn lower_export(&mut self, decl: ModuleDecl, out: &mut Vec<Stmt>) {
        match decl {
            ModuleDecl::ExportDecl(export) => {
                for name in declared_names(&export.decl) {
                    self.export_local(&name, &name);
                }
                out.push(Stmt::Decl(export.decl));
            }
            ModuleDecl::ExportNamed(export) => match &export.src {
                None => {
                    for specifier in &export.specifiers {
                        let ExportSpecifier::Named(named) = specifier else {
                            continue;
                        };
                        let local = export_name(&named.orig);
                        let exported = named
                            .exported
                            .as_ref()
                            .map_or_else(|| local.clone(), export_name);
                        let entry = match self.local_imports.get(&local) {
                            Some(import) => ExportEntry::ReExport {
                                specifier: import.specifier.clone(),
                                imported: import.imported.clone(),
                            },
                            None => ExportEntry::Local(self.rename(&local)),
                        };
                        self.lowered.exports.insert(exported.clone(), entry);
                        self.define_export(&exported, &local);
                    }
                }
                Some(source) => {
                    let source = str_value(source);
                    self.note_specifier(&source);
                    self.evaluate(&source);
                    for specifier in &export.specifiers {
                        let (imported, exported) = match specifier {
                            ExportSpecifier::Named(named) => {
                                let imported = export_name(&named.orig);
                                let exported = named
                                    .exported
                                    .as_ref()
                                    .map_or_else(|| imported.clone(), export_name);
                                (imported, exported)
                            }
                            ExportSpecifier::Namespace(namespace) => {
                                ("*".to_string(), export_name(&namespace.name))
                            }
                            ExportSpecifier::Default(default) => {
                                ("default".to_string(), default.exported.sym.to_string())
                            }
                        };
                        self.reexport(&source, &imported, &exported);
                    }
                }
            },
            ModuleDecl::ExportDefaultExpr(export) => {
                let binding = self.id.export_ident("default");
                out.push(b::var_stmt(&binding, *export.expr));
                self.lowered
                    .exports
                    .insert("default".to_string(), ExportEntry::Local(binding.clone()));
                self.define_export("default", &binding);
            }
            ModuleDecl::ExportDefaultDecl(export) => match export.decl {
                DefaultDecl::Fn(func) => {
                    let ident = func
                        .ident
                        .unwrap_or_else(|| b::id(&self.id.export_ident("default")));
                    self.export_local("default", &ident.sym);
                    out.push(Stmt::Decl(Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function: func.function,
                    })));
                }
                DefaultDecl::Class(class) => {
                    let ident = class
                        .ident
                        .unwrap_or_else(|| b::id(&self.id.export_ident("default")));
                    self.export_local("default", &ident.sym);
                    out.push(Stmt::Decl(Decl::Class(ClassDecl {
                        ident,
                        declare: false,
                        class: class.class,
                    })));
                }
                DefaultDecl::TsInterfaceDecl(_) => {}
            },
            ModuleDecl::ExportAll(export) => {
                let source = str_value(&export.src);
                self.note_specifier(&source);
                self.evaluated.insert(source.clone());
                let marker = Marker::Wildcard {
                    destination: self.exports_object(),
                    module: self.id.clone(),
                    specifier: source.clone(),
                };
                self.evaluation.push(b::expr_stmt(marker.to_expr()));
                self.lowered.wildcard_sources.push(source);
            }
            // Type-only declarations
            _ => {}
        }
    }

    /// `export { imported as exported } from source`
    fn reexport(&mut self, source: &str, imported: &str, exported: &str) {
        let local = self.reexport_local(exported);
        self.lowered
            .imports
            .insert(local.clone(), ImportEntry::new(source, imported));
        self.lowered.exports.insert(
            exported.to_string(),
            ExportEntry::ReExport {
                specifier: source.to_string(),
                imported: imported.to_string(),
            },
        );
        self.define_export(exported, &local);
    }
}

fn declared_names(decl: &Decl) -> Vec<String> {
    match decl {
        Decl::Var(decl) => scope::var_decl_names(decl),
        Decl::Fn(func) => vec![func.ident.sym.to_string()],
        Decl::Class(class) => vec![class.ident.sym.to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{parser::parse_source, printer::print_program};

    fn lower(mode: Lowering, source: &str) -> LoweredModule {
        let body = parse_source("m.js", source).expect("parses");
        let id = ModuleId::new("m");
        let renames = scope::top_level_bindings(&body)
            .into_iter()
            .map(|name| {
                let renamed = id.prefixed(&name);
                (name, renamed)
            })
            .collect();
        ModuleDeclLowering::new(&id, mode, &renames).lower(body)
    }

    #[test]
    fn test_one_evaluation_marker_per_source() {
        let lowered = lower(
            Lowering::Hoisted,
            "import a from './x';\nimport { b } from './x';\nimport './y';",
        );
        assert_eq!(
            print_program(&lowered.body),
            "$hoist$require(\"m\", \"./x\");\n$hoist$require(\"m\", \"./y\");\n"
        );
        assert_eq!(
            lowered.imports.get("$m$a"),
            Some(&ImportEntry::new("./x", "default"))
        );
        assert_eq!(lowered.specifiers.len(), 2);
    }

    #[test]
    fn test_exported_import_is_a_reexport() {
        let lowered = lower(
            Lowering::Hoisted,
            "import { value as v } from './x';\nexport { v as value };",
        );
        assert_eq!(
            lowered.exports.get("value"),
            Some(&ExportEntry::ReExport {
                specifier: "./x".to_string(),
                imported: "value".to_string(),
            })
        );
    }

    #[test]
    fn test_export_definitions_precede_evaluation() {
        let lowered = lower(
            Lowering::Hoisted,
            "import './dep';\nexport var late = 1;\nexport function early() {}",
        );
        let code = print_program(&lowered.body);
        let late = code.find("$hoist$export($m$exports, \"late\"").unwrap_or(usize::MAX);
        let early = code.find("$hoist$export($m$exports, \"early\"").unwrap_or(usize::MAX);
        let evaluation = code.find("$hoist$require(\"m\", \"./dep\")").unwrap_or(0);
        assert!(late < evaluation);
        assert!(early < evaluation);
    }

    #[test]
    fn test_exports_are_live_getters() {
        let lowered = lower(
            Lowering::Hoisted,
            "export let count = 0;\nexport function inc() { count = count + 1; }",
        );
        let code = print_program(&lowered.body);
        assert!(code.contains("$hoist$export($m$exports, \"count\", function"));
        assert!(code.contains("return count;"));
        assert!(!code.contains("$m$exports.count ="));
        assert_eq!(
            lowered.exports.get("count"),
            Some(&ExportEntry::Local("$m$count".to_string()))
        );
    }

    #[test]
    fn test_self_wrapped_imports_alias_resolved_bindings() {
        let lowered = lower(
            Lowering::SelfWrapped,
            "import dflt from './x';\nexport default dflt;",
        );
        let code = print_program(&lowered.body);
        assert!(code.contains("var dflt = $m$dflt;"));
        assert!(code.contains("$hoist$export(exports, \"default\", function"));
        assert!(code.contains("return $m$export$default;"));
        assert_eq!(
            lowered.imports.get("$m$dflt"),
            Some(&ImportEntry::new("./x", "default"))
        );
    }

    #[test]
    fn test_reexports_read_through_import_bindings() {
        let lowered = lower(
            Lowering::Hoisted,
            "export { x as y, default as z } from './b';\nexport * as ns from './c';",
        );
        assert_eq!(
            lowered.imports.get("$m$reexport$z"),
            Some(&ImportEntry::new("./b", "default"))
        );
        assert_eq!(
            lowered.imports.get("$m$reexport$ns"),
            Some(&ImportEntry::new("./c", "*"))
        );
        assert!(print_program(&lowered.body).contains("return $m$reexport$y;"));
    }

    #[test]
    fn test_odd_export_names_are_quoted() {
        let lowered = lower(Lowering::Hoisted, "var x = 1;\nexport { x as \"not-an-ident\" };");
        assert!(print_program(&lowered.body).contains("$hoist$export($m$exports, \"not-an-ident\""));
        assert_eq!(
            lowered.exports.get("not-an-ident"),
            Some(&ExportEntry::Local("$m$x".to_string()))
        );
    }
}
