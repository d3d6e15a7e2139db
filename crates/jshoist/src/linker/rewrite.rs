//! Per-module marker and import rewriting

use std::path::PathBuf;

use log::trace;
use rustc_hash::FxHashMap;
use swc_ecma_ast::{
    AssignTargetPat, BindingIdent, CallExpr, Callee, Decl, Expr, ForHead, KeyValuePatProp,
    ModuleItem, ObjectPatProp, Pat, Prop, SimpleAssignTarget, Stmt, VarDecl,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::{
    ast_builder as b,
    ast_util::{as_ident, expand_shorthand, member_prop_name, prop_name_str},
    error::{LinkError, Result},
    markers::Marker,
    module_unit::{ImportEntry, ModuleId, ModuleUnit},
    resolver::{Resolution, SymbolResolver},
    runtime::{self, Helper},
    scope::{ScopeStack, track_all_scopes},
    types::FxIndexMap,
    visitors::BindingUsage,
};

/// Rewrites one module's body against the resolver
#[derive(Debug)]
pub(super) struct ModuleRewriter<'r, 'g> {
    resolver: &'r mut SymbolResolver<'g>,
    id: ModuleId,
    path: PathBuf,
    imports: &'g FxIndexMap<String, ImportEntry>,
    resolved: FxHashMap<String, Resolution>,
    scopes: ScopeStack,
    /// Inside the pattern of an assignment, where bindings are writes
    in_assign_pat: bool,
    error: Option<LinkError>,
}

impl<'r, 'g> ModuleRewriter<'r, 'g> {
    pub(super) fn new(resolver: &'r mut SymbolResolver<'g>, unit: &'g ModuleUnit) -> Self {
        Self {
            resolver,
            id: unit.id.clone(),
            path: unit.path.clone(),
            imports: &unit.imports,
            resolved: FxHashMap::default(),
            scopes: ScopeStack::new(),
            in_assign_pat: false,
            error: None,
        }
    }

    /// Rewrite a whole module body
    pub(super) fn rewrite(mut self, mut body: Vec<ModuleItem>) -> Result<Vec<ModuleItem>> {
        let destructured = self.collect_destructured(&body)?;
        for (index, evaluation) in destructured.into_iter().rev() {
            match evaluation {
                Some(expr) => body[index] = b::expr_stmt(expr).into(),
                None => {
                    body.remove(index);
                }
            }
        }

        body.visit_mut_with(&mut self);
        match self.error {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }

    fn fail(&mut self, err: LinkError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Top-level `var {a: x, b: y} = require(s)` whose bindings never change
    ///
    /// Each binding becomes a replacement for the resolved export; the
    /// statement keeps only what evaluating the dependency still requires.
    fn collect_destructured(
        &mut self,
        body: &[ModuleItem],
    ) -> Result<Vec<(usize, Option<Expr>)>> {
        let usage = BindingUsage::collect(body);
        let mut rewritten = Vec::new();
        for (index, item) in body.iter().enumerate() {
            let ModuleItem::Stmt(Stmt::Decl(Decl::Var(decl))) = item else {
                continue;
            };
            let Some((specifier, bindings)) = self.destructured_require(decl)? else {
                continue;
            };
            if bindings.iter().any(|(_, local)| usage.is_reassigned(local)) {
                continue;
            }
            if self
                .resolver
                .graph()
                .resolved_target(&self.id, &specifier)
                .is_none()
            {
                continue;
            }
            for (key, local) in bindings {
                let resolution = self
                    .resolver
                    .resolve_require_member(&self.id, &specifier, &key)?;
                trace!("{}: {local} is {resolution:?}", self.id);
                self.resolver
                    .state_mut()
                    .replacements
                    .insert(local, resolution);
            }
            rewritten.push((index, self.resolver.evaluation(&self.id, &specifier)?));
        }
        Ok(rewritten)
    }

    fn destructured_require(
        &self,
        decl: &VarDecl,
    ) -> Result<Option<(String, Vec<(String, String)>)>> {
        let [declarator] = decl.decls.as_slice() else {
            return Ok(None);
        };
        let (Pat::Object(object), Some(init)) = (&declarator.name, declarator.init.as_deref())
        else {
            return Ok(None);
        };
        let Some(Marker::Require { module, specifier }) = Marker::parse(init, &self.path)? else {
            return Ok(None);
        };
        if module != self.id {
            return Ok(None);
        }

        let mut bindings = Vec::with_capacity(object.props.len());
        for prop in &object.props {
            let (key, local) = match prop {
                ObjectPatProp::KeyValue(KeyValuePatProp { key, value }) => {
                    let (Some(key), Pat::Ident(local)) = (prop_name_str(key), value.as_ref())
                    else {
                        return Ok(None);
                    };
                    (key.to_string(), local.id.sym.to_string())
                }
                ObjectPatProp::Assign(assign) if assign.value.is_none() => {
                    let name = assign.key.id.sym.to_string();
                    (name.clone(), name)
                }
                _ => return Ok(None),
            };
            bindings.push((key, local));
        }
        Ok(Some((specifier, bindings)))
    }

    /// What an unshadowed identifier stands for, if it is an import or a
    /// replaced binding
    fn resolve_local(&mut self, name: &str) -> Option<Resolution> {
        if self.scopes.is_shadowed(name) {
            return None;
        }
        if let Some(resolution) = self.resolved.get(name) {
            return Some(resolution.clone());
        }
        if let Some(resolution) = self.resolver.state().replacements.get(name) {
            return Some(resolution.clone());
        }
        let import = self.imports.get(name)?;
        match self
            .resolver
            .resolve_import(&self.id, &import.specifier, &import.imported)
        {
            Ok(resolution) => {
                self.resolved.insert(name.to_string(), resolution.clone());
                Some(resolution)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn namespace_import(&self, name: &str) -> Option<&'g ImportEntry> {
        if self.scopes.is_shadowed(name) {
            return None;
        }
        self.imports.get(name).filter(|import| import.is_namespace())
    }

    fn marker_expr(&mut self, marker: Marker) -> Result<Expr> {
        match marker {
            Marker::Require { module, specifier } => {
                let resolution = self.resolver.resolve_import(&module, &specifier, "*")?;
                Ok(self.resolver.expr(&resolution))
            }
            Marker::RequireResolve { module, specifier } => {
                self.resolver.require_resolve(&module, &specifier)
            }
            Marker::Missing { specifier } => {
                self.resolver
                    .state_mut()
                    .helpers
                    .insert(Helper::MissingModule);
                Ok(runtime::missing_module_call(&specifier))
            }
            Marker::Wildcard {
                destination,
                module,
                specifier,
            } => {
                let graph = self.resolver.graph();
                match graph.resolved_target(&module, &specifier) {
                    Some(target) => Ok(self.resolver.wildcard_call(&destination, target)),
                    None => {
                        let resolution = self.resolver.resolve_import(&module, &specifier, "*")?;
                        Ok(self.resolver.expr(&resolution))
                    }
                }
            }
        }
    }

    /// A statement that is a marker whose value is discarded, lowered
    fn discarded_marker(&mut self, stmt: &Stmt) -> Option<Vec<Stmt>> {
        if self.error.is_some() {
            return None;
        }
        let Stmt::Expr(stmt) = stmt else {
            return None;
        };
        let marker = self.parse_marker(&stmt.expr)?;
        match self.marker_stmts(marker) {
            Ok(lowered) => Some(lowered),
            Err(err) => {
                self.fail(err);
                Some(Vec::new())
            }
        }
    }

    /// A marker whose value is discarded
    fn marker_stmts(&mut self, marker: Marker) -> Result<Vec<Stmt>> {
        match marker {
            Marker::Require { module, specifier } => Ok(self
                .resolver
                .evaluation(&module, &specifier)?
                .map(b::expr_stmt)
                .into_iter()
                .collect()),
            Marker::RequireResolve { module, specifier } => {
                self.resolver.require_resolve(&module, &specifier)?;
                Ok(Vec::new())
            }
            Marker::Wildcard {
                destination,
                module,
                specifier,
            } => self
                .resolver
                .lower_wildcard(&module, &destination, &specifier),
            missing @ Marker::Missing { .. } => Ok(vec![b::expr_stmt(self.marker_expr(missing)?)]),
        }
    }

    fn parse_marker(&mut self, expr: &Expr) -> Option<Marker> {
        match Marker::parse(expr, &self.path) {
            Ok(marker) => marker,
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }
}

impl VisitMut for ModuleRewriter<'_, '_> {
    track_all_scopes!(visit_mut);

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        let old = std::mem::take(items);
        items.reserve(old.len());
        for mut item in old {
            if let ModuleItem::Stmt(stmt) = &item
                && let Some(lowered) = self.discarded_marker(stmt)
            {
                items.extend(lowered.into_iter().map(ModuleItem::Stmt));
                continue;
            }
            item.visit_mut_with(self);
            items.push(item);
        }
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        let old = std::mem::take(stmts);
        stmts.reserve(old.len());
        for mut stmt in old {
            if let Some(lowered) = self.discarded_marker(&stmt) {
                stmts.extend(lowered);
                continue;
            }
            stmt.visit_mut_with(self);
            stmts.push(stmt);
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        if let Some(marker) = self.parse_marker(expr) {
            match self.marker_expr(marker) {
                Ok(lowered) => *expr = lowered,
                Err(err) => self.fail(err),
            }
            return;
        }

        match expr {
            Expr::Ident(ident) => {
                if let Some(resolution) = self.resolve_local(&ident.sym) {
                    *expr = self.resolver.expr(&resolution);
                }
                return;
            }
            Expr::Member(member) => {
                if let (Some(local), Some(name)) =
                    (as_ident(&member.obj), member_prop_name(&member.prop))
                    && let Some(import) = self.namespace_import(local)
                {
                    match self.resolver.fold_namespace_member(&self.id, import, name) {
                        Ok(Some(resolution)) => {
                            *expr = self.resolver.expr(&resolution);
                            return;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            self.fail(err);
                            return;
                        }
                    }
                }
            }
            Expr::Call(CallExpr {
                callee: Callee::Expr(callee),
                ..
            }) => {
                // Keep `this` undefined when an imported function becomes a member call
                if let Some(local) = as_ident(callee)
                    && let Some(resolution @ Resolution::Property { .. }) =
                        self.resolve_local(local)
                {
                    **callee = b::seq(vec![b::num(0.0), self.resolver.expr(&resolution)]);
                }
            }
            _ => {}
        }
        let in_assign_pat = std::mem::replace(&mut self.in_assign_pat, false);
        expr.visit_mut_children_with(self);
        self.in_assign_pat = in_assign_pat;
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop
            && self.resolve_local(&ident.sym).is_some()
        {
            expand_shorthand(prop);
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_simple_assign_target(&mut self, target: &mut SimpleAssignTarget) {
        match target {
            SimpleAssignTarget::Ident(binding) => self.rename_written(binding),
            _ => target.visit_mut_children_with(self),
        }
    }

    fn visit_mut_assign_target_pat(&mut self, pat: &mut AssignTargetPat) {
        let in_assign_pat = std::mem::replace(&mut self.in_assign_pat, true);
        pat.visit_mut_children_with(self);
        self.in_assign_pat = in_assign_pat;
    }

    fn visit_mut_for_head(&mut self, head: &mut ForHead) {
        if let ForHead::Pat(pat) = head {
            let in_assign_pat = std::mem::replace(&mut self.in_assign_pat, true);
            pat.visit_mut_with(self);
            self.in_assign_pat = in_assign_pat;
        } else {
            head.visit_mut_children_with(self);
        }
    }

    fn visit_mut_binding_ident(&mut self, binding: &mut BindingIdent) {
        if self.in_assign_pat {
            self.rename_written(binding);
        }
    }
}

impl ModuleRewriter<'_, '_> {
    /// Writes follow a binding's resolution only when it is another binding
    fn rename_written(&mut self, binding: &mut BindingIdent) {
        if let Some(Resolution::Binding(resolved)) = self.resolve_local(&binding.id.sym) {
            binding.id.sym = resolved.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        graph::{Bundle, BundleGraph},
        module_unit::Dependency,
        normalizer::normalize,
        output_format::GlobalFormat,
        printer::print_program,
        wrap_decision::mark_wrapped_modules,
    };

    /// Normalize `modules`, resolving `./<id>` to `<id>`, and rewrite the last one
    fn rewrite_last(modules: &[(&str, &str)]) -> String {
        let mut graph = BundleGraph::new();
        let mut bundle = Bundle::new("main.js");
        let mut ids = Vec::new();
        for (id, source) in modules {
            let mut unit = ModuleUnit::parse(ModuleId::new(id), format!("{id}.js"), source)
                .expect("parses");
            for (other, _) in modules.iter().filter(|(other, _)| other != id) {
                unit.add_dependency(Dependency::new(format!("./{other}")));
            }
            normalize(&mut unit);
            ids.push(unit.id.clone());
            bundle = bundle.with_module(graph.add_module(unit));
        }
        for from in &ids {
            for to in &ids {
                graph.add_resolution(from, &format!("./{}", to.as_str()), to);
            }
        }
        graph.add_bundle(bundle);
        mark_wrapped_modules(&mut graph, "main.js").expect("wrap decision");

        let format = GlobalFormat::default();
        let bundle = graph.bundle("main.js").expect("bundle");
        let mut resolver = SymbolResolver::new(&graph, bundle, &format);
        let last = ids.last().expect("modules");
        let unit = graph.try_module(last).expect("module");
        let body = ModuleRewriter::new(&mut resolver, unit)
            .rewrite(unit.body.clone())
            .expect("rewrites");
        print_program(&body)
    }

    #[test]
    fn test_stable_destructured_require_reads_bindings_directly() {
        let code = rewrite_last(&[
            ("b", "export function f() { return 1; }"),
            ("a", "var { f } = require('./b');\nlog(f());"),
        ]);
        assert_eq!(code, "log($b$f());\n");
    }

    #[test]
    fn test_reassigned_destructured_require_keeps_its_declaration() {
        let code = rewrite_last(&[
            ("b", "export function f() { return 1; }"),
            ("c", "var { f: k } = require('./b');\nk = wrap(k);\nlog(k());"),
        ]);
        assert!(code.starts_with("var {"));
        assert!(code.contains("f: $c$k"));
        assert!(code.contains("} = $b$exports;\n"));
        assert!(code.contains("$c$k = wrap($c$k);"));
        assert!(code.contains("log($c$k());"));
    }

    #[test]
    fn test_imported_member_call_keeps_this_undefined() {
        let code = rewrite_last(&[
            ("b", "exports.f = function () { return this; };\nexports[key()] = 1;"),
            ("a", "import { f } from './b';\nf();"),
        ]);
        assert_eq!(code, "(0, $b$exports.f)();\n");
    }

    #[test]
    fn test_labels_and_shadowed_imports_are_untouched() {
        let code = rewrite_last(&[
            ("b", "export const x = 1;"),
            (
                "a",
                "import { x } from './b';\nx: for (;;) { break x; }\nfunction g(x) { return x; }\nuse({ x });",
            ),
        ]);
        assert!(code.contains("x: for"));
        assert!(code.contains("break x;"));
        assert!(code.contains("return x;"));
        assert!(code.contains("x: $b$x"));
    }
}
