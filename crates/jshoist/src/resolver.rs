//! Symbol resolution across the modules of one bundle
//!
//! [`SymbolResolver`] answers "what does `(module, name)` mean in the merged
//! program". The answer is a [`Resolution`]: a binding of the shared scope, a
//! property read, a wrapped module's init call, a registry request for a
//! module in another bundle, or a runtime stub for a dependency that is
//! absent.
//!
//! Resolution follows re-export pointers and `export *` chains. Identifier
//! replacements recorded by the linker live in [`LinkState`], the side-table
//! threaded through every call.

use log::{trace, warn};
use rustc_hash::FxHashSet;
use swc_ecma_ast::{Expr, Stmt};

use crate::{
    ast_builder as b,
    ast_util::is_valid_identifier,
    error::{LinkError, Result},
    graph::{Bundle, BundleGraph},
    module_unit::{ExportEntry, ImportEntry, ModuleId, ModuleUnit},
    output_format::OutputFormat,
    runtime::{self, Helper},
    types::{FxIndexMap, FxIndexSet},
};

/// What a symbol means in the merged program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A binding of the shared scope
    Binding(String),
    /// `<object>.<name>`, read when the reference runs
    Property {
        object: Box<Resolution>,
        name: String,
    },
    /// The exports of a wrapped module, evaluating it on first use
    Init(ModuleId),
    /// The exports of a module in another bundle
    External(ModuleId),
    /// An optional dependency that is absent; throws when evaluated
    MissingModule(String),
    /// A weak dependency that is absent
    Undefined,
}

impl Resolution {
    #[must_use]
    pub fn property(self, name: &str) -> Self {
        Self::Property {
            object: Box::new(self),
            name: name.to_string(),
        }
    }

    pub fn as_binding(&self) -> Option<&str> {
        match self {
            Self::Binding(name) => Some(name),
            _ => None,
        }
    }
}

/// Link-wide side-table shared by the resolver and the linker
#[derive(Debug, Default)]
pub struct LinkState {
    /// Local bindings standing for a resolved symbol
    pub replacements: FxIndexMap<String, Resolution>,
    /// Interop bindings shared by every consumer: source, binding and value
    pub interop_by_source: FxIndexMap<ModuleId, (String, Expr)>,
    /// Interop bindings private to a consumer
    pub interop_by_pair: FxIndexMap<ModuleId, FxIndexMap<String, Expr>>,
    /// Modules whose exports object is referenced as a value
    pub demanded_exports: FxIndexSet<ModuleId>,
    pub helpers: FxIndexSet<Helper>,
    /// Modules of other bundles reached through the registry
    pub external_modules: FxIndexSet<ModuleId>,
    warned: FxHashSet<(ModuleId, String)>,
}

impl LinkState {
    pub fn interop_wrappers(&self) -> usize {
        self.interop_by_source.len()
            + self
                .interop_by_pair
                .values()
                .map(FxIndexMap::len)
                .sum::<usize>()
    }
}

#[derive(Debug)]
pub struct SymbolResolver<'g> {
    graph: &'g BundleGraph,
    bundle: &'g Bundle,
    format: &'g dyn OutputFormat,
    state: LinkState,
}

impl<'g> SymbolResolver<'g> {
    pub fn new(graph: &'g BundleGraph, bundle: &'g Bundle, format: &'g dyn OutputFormat) -> Self {
        Self {
            graph,
            bundle,
            format,
            state: LinkState::default(),
        }
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LinkState {
        &mut self.state
    }

    pub fn into_state(self) -> LinkState {
        self.state
    }

    pub fn graph(&self) -> &'g BundleGraph {
        self.graph
    }

    pub fn bundle(&self) -> &'g Bundle {
        self.bundle
    }

    pub fn format(&self) -> &'g dyn OutputFormat {
        self.format
    }

    fn module(&self, id: &ModuleId) -> Result<&'g ModuleUnit> {
        let graph: &'g BundleGraph = self.graph;
        graph.try_module(id)
    }

    pub fn is_wrapped(&self, id: &ModuleId) -> bool {
        self.graph
            .module(id)
            .is_some_and(|unit| unit.flags.should_wrap)
    }

    /// Member of this bundle whose bindings live in the shared scope
    fn is_hoisted(&self, id: &ModuleId) -> bool {
        self.bundle.contains(id) && !self.is_wrapped(id)
    }

    /// The exports object of `id` as a value
    pub fn exports_of(&mut self, id: &ModuleId) -> Resolution {
        if !self.bundle.contains(id) {
            self.state.external_modules.insert(id.clone());
            Resolution::External(id.clone())
        } else if self.is_wrapped(id) {
            Resolution::Init(id.clone())
        } else {
            self.state.demanded_exports.insert(id.clone());
            Resolution::Binding(id.exports_ident())
        }
    }

    /// Render a resolution as an expression
    pub fn expr(&self, resolution: &Resolution) -> Expr {
        match resolution {
            Resolution::Binding(name) => b::ident(name),
            Resolution::Property { object, name } => {
                let object = self.expr(object);
                if is_valid_identifier(name) {
                    b::member(object, name)
                } else {
                    b::computed_member(object, b::string(name))
                }
            }
            Resolution::Init(id) => b::call_ident(&id.init_ident(), Vec::new()),
            Resolution::External(id) => self.format.generate_external_import(id),
            Resolution::MissingModule(specifier) => runtime::missing_module_call(specifier),
            Resolution::Undefined => b::undefined(),
        }
    }

    fn replaced(&self, binding: &str) -> Resolution {
        self.state
            .replacements
            .get(binding)
            .cloned()
            .unwrap_or_else(|| Resolution::Binding(binding.to_string()))
    }

    /// Resolve `name` exported by `id` on behalf of `importer`
    ///
    /// `*` is the module's exports object.
    pub fn resolve_export(
        &mut self,
        id: &ModuleId,
        name: &str,
        importer: &ModuleId,
    ) -> Result<Resolution> {
        if name == "*" || !self.is_hoisted(id) {
            let exports = self.exports_of(id);
            return Ok(if name == "*" {
                exports
            } else {
                exports.property(name)
            });
        }

        let mut visiting = FxHashSet::default();
        if let Some(resolution) = self.lookup_export(id, name, &mut visiting)? {
            trace!("Resolved {id}.{name} to {resolution:?}");
            return Ok(resolution);
        }

        let unit = self.module(id)?;
        if unit.flags.is_pure_esm() {
            let importer_unit = self.module(importer)?;
            let loc = importer_unit
                .dependencies
                .values()
                .find(|dependency| {
                    self.graph.resolved_target(importer, &dependency.specifier) == Some(id)
                })
                .and_then(|dependency| dependency.loc);
            return Err(LinkError::UnresolvedExport {
                path: unit.path.clone(),
                name: name.to_string(),
                importer: importer_unit.path.clone(),
                loc,
            });
        }
        // CommonJS exports are only fully known at runtime
        Ok(self.exports_of(id).property(name))
    }

    /// The export table lookup, following pointers and wildcards
    ///
    /// A revisited `(module, name)` pair is a cycle and counts as a miss.
    fn lookup_export(
        &mut self,
        id: &ModuleId,
        name: &str,
        visiting: &mut FxHashSet<(ModuleId, String)>,
    ) -> Result<Option<Resolution>> {
        if !visiting.insert((id.clone(), name.to_string())) {
            trace!("Export cycle through {id}.{name}");
            return Ok(None);
        }
        let graph = self.graph;
        let unit = graph.try_module(id)?;

        if let Some(entry) = unit.exports.get(name) {
            let resolution = match entry {
                ExportEntry::Local(binding) => match unit.imports.get(binding) {
                    Some(import) => self.resolve_import(id, &import.specifier, &import.imported)?,
                    None => self.replaced(binding),
                },
                ExportEntry::ReExport {
                    specifier,
                    imported,
                } => self.resolve_import(id, specifier, imported)?,
            };
            return Ok(Some(resolution));
        }
        if name == "default" {
            return Ok(None);
        }

        let mut dynamic = false;
        for source in &unit.wildcard_sources {
            match graph.resolved_target(id, source) {
                Some(target) if self.is_hoisted(target) => {
                    if let Some(found) = self.lookup_export(target, name, visiting)? {
                        return Ok(Some(found));
                    }
                    if !graph.try_module(target)?.flags.is_pure_esm() {
                        dynamic = true;
                    }
                }
                Some(_) => dynamic = true,
                None => {}
            }
        }
        // Copied onto our own exports object at runtime
        Ok(dynamic.then(|| self.exports_of(id).property(name)))
    }

    /// Resolve `imported` from the module `from` reaches through `specifier`
    pub fn resolve_import(
        &mut self,
        from: &ModuleId,
        specifier: &str,
        imported: &str,
    ) -> Result<Resolution> {
        let graph = self.graph;
        let Some(target) = graph.resolved_target(from, specifier) else {
            return self.unresolved(from, specifier);
        };
        if imported == "default" && graph.try_module(target)?.flags.is_common_js {
            return Ok(self.interop_default(from, target));
        }
        self.resolve_export(target, imported, from)
    }

    /// `require(specifier).name` as written in `from`
    pub fn resolve_require_member(
        &mut self,
        from: &ModuleId,
        specifier: &str,
        name: &str,
    ) -> Result<Resolution> {
        let graph = self.graph;
        let Some(target) = graph.resolved_target(from, specifier) else {
            return Ok(self.unresolved(from, specifier)?.property(name));
        };
        if name == "default" && graph.try_module(target)?.flags.is_common_js {
            return Ok(self.exports_of(target).property(name));
        }
        self.resolve_export(target, name, from)
    }

    /// `ns.name` for a namespace import, when it can be decided statically
    pub fn fold_namespace_member(
        &mut self,
        from: &ModuleId,
        import: &ImportEntry,
        name: &str,
    ) -> Result<Option<Resolution>> {
        let graph = self.graph;
        let Some(target) = graph.resolved_target(from, &import.specifier) else {
            return Ok(None);
        };
        if !self.is_hoisted(target) || !graph.try_module(target)?.flags.is_pure_esm() {
            return Ok(None);
        }
        self.lookup_export(target, name, &mut FxHashSet::default())
    }

    /// A dependency with no module behind it
    fn unresolved(&mut self, from: &ModuleId, specifier: &str) -> Result<Resolution> {
        let unit = self.module(from)?;
        let dependency = unit.dependency(specifier);
        match dependency {
            Some(dependency) if dependency.is_weak => {
                self.warn_once(from, specifier, "weak dependency is absent and was dropped");
                Ok(Resolution::Undefined)
            }
            Some(dependency) if dependency.is_optional => {
                self.warn_once(from, specifier, "optional dependency is absent; it throws when used");
                self.state.helpers.insert(Helper::MissingModule);
                Ok(Resolution::MissingModule(specifier.to_string()))
            }
            _ => Err(LinkError::MissingDependency {
                path: unit.path.clone(),
                specifier: specifier.to_string(),
                loc: dependency.and_then(|dependency| dependency.loc),
            }),
        }
    }

    fn warn_once(&mut self, from: &ModuleId, specifier: &str, message: &str) {
        if self
            .state
            .warned
            .insert((from.clone(), specifier.to_string()))
        {
            let path = self
                .graph
                .module(from)
                .map(|unit| unit.path.display().to_string())
                .unwrap_or_default();
            warn!("{path}: `{specifier}`: {message}");
        }
    }

    /// Default import of a CommonJS module
    fn interop_default(&mut self, from: &ModuleId, target: &ModuleId) -> Resolution {
        self.state.helpers.insert(Helper::InteropDefault);
        let exports = self.exports_of(target);
        let value = runtime::interop_default_call(self.expr(&exports));

        if matches!(exports, Resolution::Binding(_)) {
            let binding = target.interop_ident();
            self.state
                .interop_by_source
                .entry(target.clone())
                .or_insert_with(|| (binding.clone(), value));
            return Resolution::Binding(binding);
        }

        let binding = from.interop_ident_for(target);
        self.state
            .interop_by_pair
            .entry(from.clone())
            .or_default()
            .entry(binding.clone())
            .or_insert(value);
        Resolution::Binding(binding)
    }

    /// `require.resolve(specifier)` as written in `from`
    pub fn require_resolve(&mut self, from: &ModuleId, specifier: &str) -> Result<Expr> {
        match self.graph.resolved_target(from, specifier) {
            Some(target) => Ok(b::string(target.as_str())),
            None => {
                let resolution = self.unresolved(from, specifier)?;
                Ok(self.expr(&resolution))
            }
        }
    }

    /// What must still run where `require(specifier)` is evaluated for its
    /// effects only
    pub fn evaluation(&mut self, from: &ModuleId, specifier: &str) -> Result<Option<Expr>> {
        let graph = self.graph;
        match graph.resolved_target(from, specifier) {
            None => Ok(match self.unresolved(from, specifier)? {
                Resolution::MissingModule(specifier) => {
                    Some(runtime::missing_module_call(&specifier))
                }
                _ => None,
            }),
            Some(target)
                if self.bundle.contains(target)
                    && self.is_wrapped(target)
                    && !graph.try_module(target)?.flags.side_effect_free =>
            {
                Ok(Some(b::call_ident(&target.init_ident(), Vec::new())))
            }
            Some(_) => Ok(None),
        }
    }

    /// Every non-default name `id` exports, when all of them are static
    pub fn static_export_names(
        &self,
        id: &ModuleId,
        seen: &mut FxHashSet<ModuleId>,
    ) -> Option<FxIndexSet<String>> {
        if !seen.insert(id.clone()) {
            return Some(FxIndexSet::default());
        }
        let unit = self.graph.module(id)?;
        if !self.is_hoisted(id) || !unit.flags.is_pure_esm() {
            return None;
        }
        let mut names: FxIndexSet<String> = unit
            .exports
            .keys()
            .filter(|name| name.as_str() != "default")
            .cloned()
            .collect();
        for source in &unit.wildcard_sources {
            if let Some(target) = self.graph.resolved_target(id, source) {
                names.extend(self.static_export_names(target, seen)?);
            }
        }
        Some(names)
    }

    /// Lower `export * from specifier` of `module` onto `destination`
    ///
    /// Static sources get one live definition per name; anything else goes
    /// through the runtime helper.
    pub fn lower_wildcard(
        &mut self,
        module: &ModuleId,
        destination: &str,
        specifier: &str,
    ) -> Result<Vec<Stmt>> {
        let graph = self.graph;
        let Some(target) = graph.resolved_target(module, specifier) else {
            return Ok(match self.unresolved(module, specifier)? {
                Resolution::MissingModule(specifier) => {
                    vec![b::expr_stmt(runtime::missing_module_call(&specifier))]
                }
                _ => Vec::new(),
            });
        };

        let own = &graph.try_module(module)?.exports;
        if let Some(names) = self.static_export_names(target, &mut FxHashSet::default()) {
            let mut stmts = Vec::with_capacity(names.len());
            for name in names.iter().filter(|name| !own.contains_key(*name)) {
                let value = self.resolve_export(target, name, module)?;
                let value = self.expr(&value);
                stmts.push(b::expr_stmt(runtime::export_call(
                    b::ident(destination),
                    name,
                    value,
                )));
            }
            if !stmts.is_empty() {
                self.state.helpers.insert(Helper::Export);
            }
            return Ok(stmts);
        }

        Ok(vec![b::expr_stmt(self.wildcard_call(destination, target))])
    }

    /// `$hoist$exportWildcard(destination, <exports of target>)`
    pub fn wildcard_call(&mut self, destination: &str, target: &ModuleId) -> Expr {
        self.state.helpers.insert(Helper::ExportWildcard);
        let source = self.exports_of(target);
        runtime::export_wildcard_call(b::ident(destination), self.expr(&source))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{module_unit::Dependency, output_format::GlobalFormat};

    /// Build normalized-looking units directly from their tables
    struct Fixture {
        graph: BundleGraph,
        bundle: Bundle,
        format: GlobalFormat,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: BundleGraph::new(),
                bundle: Bundle::new("main.js"),
                format: GlobalFormat::default(),
            }
        }

        fn esm(&mut self, id: &str, exports: &[(&str, ExportEntry)], wildcards: &[&str]) {
            let mut unit = ModuleUnit::new(ModuleId::new(id), format!("{id}.js"), Vec::new());
            unit.flags.is_es_module = true;
            unit.flags.normalized = true;
            for (name, entry) in exports {
                unit.exports.insert((*name).to_string(), entry.clone());
            }
            for source in wildcards {
                unit.wildcard_sources.push((*source).to_string());
            }
            self.add(unit);
        }

        fn add(&mut self, mut unit: ModuleUnit) {
            let id = unit.id.clone();
            for source in unit.wildcard_sources.clone() {
                unit.add_dependency(Dependency::new(source));
            }
            self.graph.add_module(unit);
            self.bundle = std::mem::replace(&mut self.bundle, Bundle::new("main.js")).with_module(id);
        }

        fn link(&mut self, from: &str, specifier: &str, to: &str) {
            if let Some(unit) = self.graph.module_mut(&ModuleId::new(from))
                && unit.dependency(specifier).is_none()
            {
                unit.add_dependency(Dependency::new(specifier));
            }
            self.graph
                .add_resolution(&ModuleId::new(from), specifier, &ModuleId::new(to));
        }

        fn resolver(&self) -> SymbolResolver<'_> {
            SymbolResolver::new(&self.graph, &self.bundle, &self.format)
        }
    }

    fn local(name: &str) -> ExportEntry {
        ExportEntry::Local(name.to_string())
    }

    #[test]
    fn test_wildcard_reexport_resolves_to_the_same_binding() {
        let mut fx = Fixture::new();
        fx.esm("b", &[("x", local("$b$x")), ("default", local("$b$export$default"))], &[]);
        fx.esm("a", &[], &["./b"]);
        fx.link("a", "./b", "b");

        let mut resolver = fx.resolver();
        let (a, b) = (ModuleId::new("a"), ModuleId::new("b"));
        let through_a = resolver.resolve_export(&a, "x", &a).expect("x is re-exported");
        let direct = resolver.resolve_export(&b, "x", &a).expect("x is exported");
        assert_eq!(through_a, direct);
        assert_eq!(through_a, Resolution::Binding("$b$x".to_string()));
    }

    #[test]
    fn test_default_does_not_cross_wildcards() {
        let mut fx = Fixture::new();
        fx.esm("b", &[("default", local("$b$export$default"))], &[]);
        fx.esm("a", &[], &["./b"]);
        fx.link("a", "./b", "b");

        let a = ModuleId::new("a");
        let err = fx
            .resolver()
            .resolve_export(&a, "default", &a)
            .expect_err("default is not re-exported by export *");
        assert!(matches!(err, LinkError::UnresolvedExport { ref name, .. } if name == "default"));
    }

    #[test]
    fn test_reexport_chain_and_cycle() {
        let mut fx = Fixture::new();
        fx.esm(
            "a",
            &[(
                "y",
                ExportEntry::ReExport {
                    specifier: "./b".to_string(),
                    imported: "x".to_string(),
                },
            )],
            &["./b"],
        );
        fx.esm("b", &[("x", local("$b$x"))], &["./a"]);
        fx.link("a", "./b", "b");
        fx.link("b", "./a", "a");

        let mut resolver = fx.resolver();
        let a = ModuleId::new("a");
        assert_eq!(
            resolver.resolve_export(&a, "y", &a),
            Ok(Resolution::Binding("$b$x".to_string()))
        );
        // b -> a -> b through wildcards terminates as a miss
        assert!(resolver.resolve_export(&ModuleId::new("b"), "nope", &a).is_err());
    }

    #[test]
    fn test_common_js_default_shares_one_interop() {
        let mut fx = Fixture::new();
        let mut cjs = ModuleUnit::new(ModuleId::new("c"), "c.js", Vec::new());
        cjs.flags.is_common_js = true;
        fx.add(cjs);
        fx.esm("x", &[], &[]);
        fx.esm("y", &[], &[]);
        fx.link("x", "./c", "c");
        fx.link("y", "./c", "c");

        let mut resolver = fx.resolver();
        let first = resolver
            .resolve_import(&ModuleId::new("x"), "./c", "default")
            .expect("interop");
        let second = resolver
            .resolve_import(&ModuleId::new("y"), "./c", "default")
            .expect("interop");
        assert_eq!(first, second);
        assert_eq!(first, Resolution::Binding("$c$interop$default".to_string()));
        assert_eq!(resolver.state().interop_wrappers(), 1);
        assert!(resolver.state().helpers.contains(&Helper::InteropDefault));
    }

    #[test]
    fn test_wrapped_modules_resolve_through_init() {
        let mut fx = Fixture::new();
        fx.esm("w", &[("x", local("$w$x"))], &[]);
        if let Some(unit) = fx.graph.module_mut(&ModuleId::new("w")) {
            unit.flags.should_wrap = true;
        }
        let mut resolver = fx.resolver();
        let w = ModuleId::new("w");
        let resolution = resolver.resolve_export(&w, "x", &w).expect("wrapped");
        assert_eq!(
            crate::printer::print_expr(&resolver.expr(&resolution)),
            "$w$init().x"
        );
    }

    #[test]
    fn test_unresolved_dependencies_by_kind() {
        let mut fx = Fixture::new();
        let unit = ModuleUnit::new(ModuleId::new("a"), "a.js", Vec::new())
            .with_dependency(Dependency::new("./opt").optional())
            .with_dependency(Dependency::new("./weak").weak())
            .with_dependency(Dependency::new("./gone"));
        fx.add(unit);

        let mut resolver = fx.resolver();
        let a = ModuleId::new("a");
        assert_eq!(
            resolver.resolve_import(&a, "./opt", "*"),
            Ok(Resolution::MissingModule("./opt".to_string()))
        );
        assert_eq!(
            resolver.resolve_import(&a, "./weak", "*"),
            Ok(Resolution::Undefined)
        );
        assert!(matches!(
            resolver.resolve_import(&a, "./gone", "*"),
            Err(LinkError::MissingDependency { .. })
        ));
    }

    #[test]
    fn test_static_wildcard_lowering_defines_live_names() {
        let mut fx = Fixture::new();
        fx.esm("b", &[("x", local("$b$x")), ("default", local("$b$d"))], &[]);
        fx.esm("a", &[], &["./b"]);
        fx.link("a", "./b", "b");

        let mut resolver = fx.resolver();
        let stmts = resolver
            .lower_wildcard(&ModuleId::new("a"), "$a$exports", "./b")
            .expect("static");
        assert_eq!(stmts.len(), 1);
        let code = crate::printer::print_stmt(&stmts[0]);
        assert!(code.starts_with("$hoist$export($a$exports, \"x\", function"));
        assert!(code.contains("return $b$x;"));
        assert!(!code.contains("$b$d"));
        assert_eq!(
            resolver.state().helpers.iter().copied().collect::<Vec<_>>(),
            vec![Helper::Export]
        );
    }
}
