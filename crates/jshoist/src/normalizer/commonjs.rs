//! `require`, `import()` and `module.exports` rewriting
//!
//! Literal `require` calls become canonical markers. In flattened modules the
//! CommonJS free variables are also redirected to the module's own exports
//! binding, and static `exports.NAME = value` statements are promoted to real
//! bindings so the linker can reference them directly.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::{
    ArrowExpr, AssignExpr, AssignTarget, BinExpr, BinaryOp, BindingIdent, CallExpr, Callee, Class,
    Expr, ExprStmt, Function, ModuleItem, Prop, SimpleAssignTarget, Stmt, UnaryExpr, UnaryOp,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

use super::{analysis::ModuleAnalysis, static_export_write};
use crate::{
    ast_builder as b,
    ast_util::{
        as_ident, as_ident_call, as_static_member, as_str_lit, callee_expr, expand_shorthand,
        is_ident_named, member_prop_name, plain_args,
    },
    markers::Marker,
    module_unit::{Dependency, ExportEntry, ModuleId, ModuleUnit},
    runtime,
    scope::{self, ScopeStack, track_scopes},
    types::{FxIndexMap, FxIndexSet},
};

#[derive(Debug)]
pub(super) struct CommonJsRewriter<'u> {
    id: ModuleId,
    exports_ident: String,
    dependencies: &'u mut FxIndexMap<String, Dependency>,
    top_level: &'u FxIndexSet<String>,
    scopes: ScopeStack,
    /// Nesting inside code that may run later or not at all
    deferred_depth: usize,
    /// Nesting inside functions and classes, which rebind `this`
    this_depth: usize,
    rewrite_idioms: bool,
    is_es_module: bool,
}

impl<'u> CommonJsRewriter<'u> {
    pub(super) fn new(
        id: ModuleId,
        dependencies: &'u mut FxIndexMap<String, Dependency>,
        top_level: &'u FxIndexSet<String>,
        rewrite_idioms: bool,
        is_es_module: bool,
    ) -> Self {
        Self {
            exports_ident: id.exports_ident(),
            id,
            dependencies,
            top_level,
            scopes: ScopeStack::new(),
            deferred_depth: 0,
            this_depth: 0,
            rewrite_idioms,
            is_es_module,
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.scopes.is_shadowed(name) && !self.top_level.contains(name)
    }

    fn is_free_ident(&self, expr: &Expr, name: &str) -> bool {
        is_ident_named(expr, name) && self.is_free(name)
    }

    fn require_marker(&mut self, specifier: &str) -> Expr {
        let deferred = self.deferred_depth > 0;
        match self.dependencies.get_mut(specifier) {
            Some(dependency) => {
                if deferred {
                    dependency.must_wrap = true;
                }
                Marker::require(&self.id, specifier).to_expr()
            }
            None => Marker::Missing {
                specifier: specifier.to_string(),
            }
            .to_expr(),
        }
    }

    /// `import("x")` as a promise of the linked exports
    fn dynamic_import(&mut self, specifier: &str) -> Expr {
        let marker = match self.dependencies.get_mut(specifier) {
            Some(dependency) => {
                dependency.must_wrap = true;
                Marker::require(&self.id, specifier).to_expr()
            }
            None => Marker::Missing {
                specifier: specifier.to_string(),
            }
            .to_expr(),
        };
        let resolved = b::call(b::member(b::ident("Promise"), "resolve"), Vec::new());
        b::call(
            b::member(resolved, "then"),
            vec![b::function_expr(&[], vec![b::return_stmt(Some(marker))])],
        )
    }

    fn single_string_arg(call: &CallExpr) -> Option<&str> {
        match plain_args(&call.args)?.as_slice() {
            [arg] => as_str_lit(arg),
            _ => None,
        }
    }

    fn rewrite_require(&mut self, expr: &Expr) -> Option<Expr> {
        let Expr::Call(call) = expr else {
            return None;
        };
        if let Callee::Import(_) = call.callee {
            let specifier = Self::single_string_arg(call)?.to_string();
            return Some(self.dynamic_import(&specifier));
        }
        if let Some(("require", _)) = as_ident_call(expr)
            && self.is_free("require")
        {
            let specifier = Self::single_string_arg(call)?.to_string();
            return Some(self.require_marker(&specifier));
        }
        let (object, "resolve") = as_static_member(callee_expr(call)?)? else {
            return None;
        };
        if !self.is_free_ident(object, "require") {
            return None;
        }
        let marker = Marker::RequireResolve {
            module: self.id.clone(),
            specifier: Self::single_string_arg(call)?.to_string(),
        };
        Some(marker.to_expr())
    }

    fn rewrite_idiom(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Member(member) if self.is_free_ident(&member.obj, "module") => {
                match member_prop_name(&member.prop)? {
                    "exports" => Some(b::ident(&self.exports_ident)),
                    "id" => Some(b::string(self.id.as_str())),
                    "hot" => Some(b::null()),
                    _ => None,
                }
            }
            Expr::Unary(UnaryExpr {
                op: UnaryOp::TypeOf,
                arg,
                ..
            }) => {
                let name = as_ident(arg)?;
                if !self.is_free(name) {
                    return None;
                }
                match name {
                    "module" | "exports" => Some(b::string("object")),
                    "require" => Some(b::string("function")),
                    _ => None,
                }
            }
            Expr::This(_) if self.this_depth == 0 => Some(if self.is_es_module {
                b::undefined()
            } else {
                b::ident(&self.exports_ident)
            }),
            _ => None,
        }
    }

    /// Replacement name for a free CommonJS variable
    fn free_variable(&self, name: &str) -> Option<&str> {
        if !self.is_free(name) {
            return None;
        }
        match name {
            "exports" if self.rewrite_idioms => Some(self.exports_ident.as_str()),
            // Dynamic requires go through the runtime registry
            "require" => Some(runtime::REGISTRY),
            _ => None,
        }
    }

    fn deferred(&mut self, f: impl FnOnce(&mut Self)) {
        self.deferred_depth += 1;
        f(self);
        self.deferred_depth -= 1;
    }
}

impl VisitMut for CommonJsRewriter<'_> {
    track_scopes!(visit_mut: constructor, fn_expr, class_expr, block_stmt, catch_clause,
        for_stmt, for_in_stmt, for_of_stmt, switch_stmt);

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::If(stmt) => {
                stmt.test.visit_mut_with(self);
                self.deferred(|this| {
                    stmt.cons.visit_mut_with(this);
                    if let Some(alt) = &mut stmt.alt {
                        alt.visit_mut_with(this);
                    }
                });
            }
            Stmt::While(_)
            | Stmt::DoWhile(_)
            | Stmt::For(_)
            | Stmt::ForIn(_)
            | Stmt::ForOf(_)
            | Stmt::Try(_)
            | Stmt::Switch(_) => self.deferred(|this| stmt.visit_mut_children_with(this)),
            _ => stmt.visit_mut_children_with(self),
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Some(replacement) = self.rewrite_require(expr) {
            *expr = replacement;
            return;
        }
        if self.rewrite_idioms
            && let Some(replacement) = self.rewrite_idiom(expr)
        {
            *expr = replacement;
            return;
        }
        match expr {
            Expr::Ident(ident) => {
                if let Some(renamed) = self.free_variable(&ident.sym) {
                    *expr = b::ident(renamed);
                }
            }
            Expr::Bin(BinExpr {
                op: BinaryOp::LogicalOr | BinaryOp::LogicalAnd | BinaryOp::NullishCoalescing,
                left,
                right,
                ..
            }) => {
                left.visit_mut_with(self);
                self.deferred(|this| right.visit_mut_with(this));
            }
            Expr::Cond(cond) => {
                cond.test.visit_mut_with(self);
                self.deferred(|this| {
                    cond.cons.visit_mut_with(this);
                    cond.alt.visit_mut_with(this);
                });
            }
            Expr::Seq(_) => self.deferred(|this| expr.visit_mut_children_with(this)),
            _ => expr.visit_mut_children_with(self),
        }
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop
            && self.free_variable(&ident.sym).is_some()
        {
            expand_shorthand(prop);
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_assign_target(&mut self, target: &mut AssignTarget) {
        // `module.exports = v` now targets the exports binding directly
        if self.rewrite_idioms
            && let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = target
            && self.is_free_ident(&member.obj, "module")
            && member_prop_name(&member.prop) == Some("exports")
        {
            *target = AssignTarget::Simple(SimpleAssignTarget::Ident(BindingIdent::from(
                b::id(&self.exports_ident),
            )));
            return;
        }
        target.visit_mut_children_with(self);
    }

    fn visit_mut_simple_assign_target(&mut self, target: &mut SimpleAssignTarget) {
        if let SimpleAssignTarget::Ident(binding) = target {
            if let Some(renamed) = self.free_variable(&binding.id.sym) {
                *binding = BindingIdent::from(b::id(renamed));
            }
            return;
        }
        target.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, func: &mut Function) {
        self.this_depth += 1;
        self.scopes
            .push(scope::function_scope(&func.params, func.body.as_ref()));
        self.deferred(|this| func.visit_mut_children_with(this));
        self.scopes.pop();
        self.this_depth -= 1;
    }

    fn visit_mut_arrow_expr(&mut self, arrow: &mut ArrowExpr) {
        self.scopes.push(scope::arrow_scope(arrow));
        self.deferred(|this| arrow.visit_mut_children_with(this));
        self.scopes.pop();
    }

    fn visit_mut_class(&mut self, class: &mut Class) {
        self.this_depth += 1;
        self.deferred(|this| class.visit_mut_children_with(this));
        self.this_depth -= 1;
    }
}

/// Rewrite a flattened module body, promoting static export writes
pub(super) fn rewrite_hoisted(
    unit: &mut ModuleUnit,
    body: Vec<ModuleItem>,
    analysis: &ModuleAnalysis,
    renames: &FxHashMap<String, String>,
) -> Vec<ModuleItem> {
    let promote = analysis.allows_export_promotion();
    let mut promoted = FxIndexMap::default();
    let mut declared = FxHashSet::default();
    let mut out: Vec<ModuleItem> = Vec::with_capacity(body.len());

    let mut rewriter = CommonJsRewriter::new(
        unit.id.clone(),
        &mut unit.dependencies,
        &analysis.top_level,
        true,
        analysis.has_esm_syntax,
    );
    let is_free = |name: &str| !analysis.top_level.contains(name);

    for mut item in body {
        let name = match static_export_write(&item, is_free) {
            Some((name, _)) if promote && name != "__esModule" => name.to_string(),
            _ => {
                item.visit_mut_with(&mut rewriter);
                out.push(item);
                continue;
            }
        };
        let ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. })) = item else {
            continue;
        };
        let Expr::Assign(AssignExpr { right, .. }) = *expr else {
            continue;
        };
        let mut value = *right;
        value.visit_mut_with(&mut rewriter);

        let exports = b::ident(&rewriter.exports_ident);
        let single_write = analysis.static_export_writes.get(&name) == Some(&1);
        let direct = as_ident(&value).filter(|local| {
            single_write
                && analysis.top_level.contains(*local)
                && !analysis.reassigned.contains(*local)
        });

        let binding = if let Some(local) = direct {
            let binding = renames
                .get(local)
                .cloned()
                .unwrap_or_else(|| local.to_string());
            out.push(b::expr_stmt(b::assign_member(exports, &name, value)).into());
            binding
        } else {
            let binding = rewriter.id.export_ident(&name);
            if declared.insert(binding.clone()) {
                out.push(b::var_stmt(&binding, value).into());
            } else {
                out.push(b::expr_stmt(b::assign_ident(&binding, value)).into());
            }
            out.push(b::expr_stmt(b::assign_member(exports, &name, b::ident(&binding))).into());
            binding
        };
        promoted.insert(name, ExportEntry::Local(binding));
    }

    unit.exports.extend(promoted);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_source, printer::print_program};

    fn rewrite(source: &str, deps: &[&str]) -> (String, FxIndexMap<String, Dependency>) {
        let mut dependencies: FxIndexMap<String, Dependency> = deps
            .iter()
            .map(|dep| ((*dep).to_string(), Dependency::new(*dep)))
            .collect();
        let top_level = FxIndexSet::default();
        let mut body = parse_source("m.js", source).expect("parses");
        body.visit_mut_with(&mut CommonJsRewriter::new(
            ModuleId::new("m"),
            &mut dependencies,
            &top_level,
            true,
            false,
        ));
        (print_program(&body), dependencies)
    }

    #[test]
    fn test_dynamic_import_becomes_promise() {
        let (code, deps) = rewrite("import('./lazy');", &["./lazy"]);
        assert!(code.starts_with("Promise.resolve().then(function"));
        assert!(code.contains("return $hoist$require(\"m\", \"./lazy\");"));
        assert!(deps["./lazy"].must_wrap);
    }

    #[test]
    fn test_non_literal_require_uses_registry() {
        let (code, _) = rewrite("require(name);", &[]);
        assert_eq!(code, "hoistRequire(name);\n");
    }

    #[test]
    fn test_require_resolve_marker() {
        let (code, _) = rewrite("require.resolve('./b');", &["./b"]);
        assert_eq!(code, "$hoist$require_resolve(\"m\", \"./b\");\n");
    }

    #[test]
    fn test_logical_right_side_is_deferred() {
        let (_, deps) = rewrite("require('./a') || require('./b');", &["./a", "./b"]);
        assert!(!deps["./a"].must_wrap);
        assert!(deps["./b"].must_wrap);
    }

    #[test]
    fn test_top_level_this_is_exports() {
        let (code, _) = rewrite("this.x;\nfunction f() { return this; }", &[]);
        assert!(code.starts_with("$m$exports.x;\n"));
        assert!(code.contains("return this;"));
    }

    #[test]
    fn test_module_exports_assignment_targets_exports_binding() {
        let (code, _) = rewrite(
            "module.exports = { exports };\nmodule.exports.y = typeof module;",
            &[],
        );
        assert!(code.starts_with("$m$exports = {"));
        assert!(code.contains("exports: $m$exports"));
        assert!(code.contains("$m$exports.y = \"object\";"));
    }
}
