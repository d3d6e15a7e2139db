//! Lexical scope bookkeeping shared by the visitors
//!
//! JavaScript has three scope-introducing constructs that matter for linking:
//! functions (parameters plus hoisted `var`s), blocks (`let`/`const`/`class`
//! and block-level functions) and catch clauses. The helpers here compute the
//! names each construct declares so a visitor can tell whether an identifier
//! resolves to the module's top level, to an inner binding, or to a global.

use rustc_hash::FxHashSet;
use swc_ecma_ast::{
    ArrowExpr, ArrowFunctionBody, Constructor, Decl, DefaultDecl, ForHead, FunctionBody,
    ModuleDecl, ModuleItem, ObjectPatProp, Param, ParamOrTsParamProp, Pat, Stmt, SwitchCase,
    TsParamPropParam, VarDecl, VarDeclKind, VarDeclOrExpr,
};

use crate::types::FxIndexSet;

/// Names declared by a single scope
pub type ScopeDecls = FxHashSet<String>;

/// Push every name bound by a (possibly destructuring) pattern
pub fn pat_bound_names(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.sym.to_string()),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(prop) => pat_bound_names(&prop.value, out),
                    ObjectPatProp::Assign(prop) => out.push(prop.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pat_bound_names(&rest.arg, out),
                }
            }
        }
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pat_bound_names(elem, out);
            }
        }
        Pat::Rest(rest) => pat_bound_names(&rest.arg, out),
        Pat::Assign(assign) => pat_bound_names(&assign.left, out),
        _ => {}
    }
}

/// Names declared by a variable declaration
pub fn var_decl_names(decl: &VarDecl) -> Vec<String> {
    let mut names = Vec::new();
    for declarator in &decl.decls {
        pat_bound_names(&declarator.name, &mut names);
    }
    names
}

const fn is_lexical(kind: VarDeclKind) -> bool {
    matches!(kind, VarDeclKind::Let | VarDeclKind::Const)
}

/// Collect `var` declarations hoisted out of nested statements (not functions)
fn collect_hoisted_vars(stmts: &[Stmt], out: &mut FxIndexSet<String>) {
    for stmt in stmts {
        collect_hoisted_vars_stmt(stmt, out);
    }
}

fn hoisted_var_decl(decl: &VarDecl, out: &mut FxIndexSet<String>) {
    if decl.kind == VarDeclKind::Var {
        out.extend(var_decl_names(decl));
    }
}

fn collect_hoisted_vars_stmt(stmt: &Stmt, out: &mut FxIndexSet<String>) {
    match stmt {
        Stmt::Decl(Decl::Var(decl)) => hoisted_var_decl(decl, out),
        Stmt::If(stmt) => {
            collect_hoisted_vars_stmt(&stmt.cons, out);
            if let Some(alt) = &stmt.alt {
                collect_hoisted_vars_stmt(alt, out);
            }
        }
        Stmt::Block(block) => collect_hoisted_vars(&block.stmts, out),
        Stmt::Try(stmt) => {
            collect_hoisted_vars(&stmt.block.stmts, out);
            if let Some(handler) = &stmt.handler {
                collect_hoisted_vars(&handler.body.stmts, out);
            }
            if let Some(finalizer) = &stmt.finalizer {
                collect_hoisted_vars(&finalizer.stmts, out);
            }
        }
        Stmt::While(stmt) => collect_hoisted_vars_stmt(&stmt.body, out),
        Stmt::DoWhile(stmt) => collect_hoisted_vars_stmt(&stmt.body, out),
        Stmt::Labeled(stmt) => collect_hoisted_vars_stmt(&stmt.body, out),
        Stmt::With(stmt) => collect_hoisted_vars_stmt(&stmt.body, out),
        Stmt::For(stmt) => {
            if let Some(VarDeclOrExpr::VarDecl(decl)) = &stmt.init {
                hoisted_var_decl(decl, out);
            }
            collect_hoisted_vars_stmt(&stmt.body, out);
        }
        Stmt::ForIn(stmt) => {
            if let ForHead::VarDecl(decl) = &stmt.left {
                hoisted_var_decl(decl, out);
            }
            collect_hoisted_vars_stmt(&stmt.body, out);
        }
        Stmt::ForOf(stmt) => {
            if let ForHead::VarDecl(decl) = &stmt.left {
                hoisted_var_decl(decl, out);
            }
            collect_hoisted_vars_stmt(&stmt.body, out);
        }
        Stmt::Switch(stmt) => {
            for case in &stmt.cases {
                collect_hoisted_vars(&case.cons, out);
            }
        }
        _ => {}
    }
}

/// Collect the block-scoped declarations made directly by a statement list
fn collect_lexical(stmts: &[Stmt], out: &mut FxIndexSet<String>) {
    for stmt in stmts {
        if let Stmt::Decl(decl) = stmt {
            collect_lexical_decl(decl, out);
        }
    }
}

fn collect_lexical_decl(decl: &Decl, out: &mut FxIndexSet<String>) {
    match decl {
        Decl::Var(decl) if is_lexical(decl.kind) => out.extend(var_decl_names(decl)),
        Decl::Fn(func) => {
            out.insert(func.ident.sym.to_string());
        }
        Decl::Class(class) => {
            out.insert(class.ident.sym.to_string());
        }
        _ => {}
    }
}

/// Names declared by one top-level item
fn collect_item(item: &ModuleItem, out: &mut FxIndexSet<String>) {
    match item {
        ModuleItem::Stmt(stmt) => {
            if let Stmt::Decl(decl) = stmt {
                collect_lexical_decl(decl, out);
            }
            collect_hoisted_vars_stmt(stmt, out);
        }
        ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
            out.extend(
                import
                    .specifiers
                    .iter()
                    .map(|specifier| specifier.local().sym.to_string()),
            );
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
            collect_lexical_decl(&export.decl, out);
            if let Decl::Var(decl) = &export.decl {
                hoisted_var_decl(decl, out);
            }
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
            DefaultDecl::Fn(func) => out.extend(func.ident.as_ref().map(|id| id.sym.to_string())),
            DefaultDecl::Class(class) => {
                out.extend(class.ident.as_ref().map(|id| id.sym.to_string()));
            }
            _ => {}
        },
        ModuleItem::ModuleDecl(_) => {}
    }
}

fn body_names(body: &[Stmt], decls: &mut ScopeDecls) {
    let mut names = FxIndexSet::default();
    collect_hoisted_vars(body, &mut names);
    collect_lexical(body, &mut names);
    decls.extend(names);
}

/// Names bound by a function: parameters, hoisted `var`s, its own top-level
/// lexical declarations and the implicit `arguments` object
pub fn function_scope(params: &[Param], body: Option<&FunctionBody>) -> ScopeDecls {
    let mut decls = param_names(params.iter().map(|param| &param.pat));
    if let Some(body) = body {
        body_names(&body.stmts, &mut decls);
    }
    decls.insert("arguments".to_string());
    decls
}

pub fn constructor_scope(constructor: &Constructor) -> ScopeDecls {
    let mut decls = param_names(constructor.params.iter().filter_map(|param| match param {
        ParamOrTsParamProp::Param(param) => Some(&param.pat),
        ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
            TsParamPropParam::Assign(assign) => Some(assign.left.as_ref()),
            TsParamPropParam::Ident(_) => None,
        },
    }));
    if let Some(body) = &constructor.body {
        body_names(&body.stmts, &mut decls);
    }
    decls.insert("arguments".to_string());
    decls
}

/// Names bound by an arrow function; arrows have no own `arguments`
pub fn arrow_scope(arrow: &ArrowExpr) -> ScopeDecls {
    let mut decls = param_names(arrow.params.iter());
    if let ArrowFunctionBody::FunctionBody(body) = arrow.body.as_ref() {
        body_names(&body.stmts, &mut decls);
    }
    decls
}

fn param_names<'a>(params: impl Iterator<Item = &'a Pat>) -> ScopeDecls {
    let mut names = Vec::new();
    for param in params {
        pat_bound_names(param, &mut names);
    }
    names.into_iter().collect()
}

/// Block-scoped names declared directly inside a block
pub fn block_scope(stmts: &[Stmt]) -> ScopeDecls {
    let mut names = FxIndexSet::default();
    collect_lexical(stmts, &mut names);
    names.into_iter().collect()
}

/// All cases of a switch share one block scope
pub fn switch_scope(cases: &[SwitchCase]) -> ScopeDecls {
    let mut names = FxIndexSet::default();
    for case in cases {
        collect_lexical(&case.cons, &mut names);
    }
    names.into_iter().collect()
}

pub fn catch_scope(param: Option<&Pat>) -> ScopeDecls {
    param_names(param.into_iter())
}

/// `for (let i = ...)` binds `i` in a scope around the loop
pub fn for_init_scope(init: Option<&VarDeclOrExpr>) -> ScopeDecls {
    match init {
        Some(VarDeclOrExpr::VarDecl(decl)) if is_lexical(decl.kind) => {
            var_decl_names(decl).into_iter().collect()
        }
        _ => ScopeDecls::default(),
    }
}

pub fn for_head_scope(head: &ForHead) -> ScopeDecls {
    match head {
        ForHead::VarDecl(decl) if is_lexical(decl.kind) => {
            var_decl_names(decl).into_iter().collect()
        }
        _ => ScopeDecls::default(),
    }
}

/// The name a function or class expression binds inside itself
pub fn self_name_scope(name: Option<&swc_ecma_ast::Ident>) -> ScopeDecls {
    name.map(|name| name.sym.to_string()).into_iter().collect()
}

/// Bindings of a module (or merged bundle) top level, in declaration order
pub fn top_level_bindings(body: &[ModuleItem]) -> FxIndexSet<String> {
    let mut names = FxIndexSet::default();
    for item in body {
        collect_item(item, &mut names);
    }
    names
}

/// Stack of the scopes enclosing the node currently being visited
///
/// An empty stack means the visitor is at the top level of the module (or the
/// merged bundle).
#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    scopes: Vec<ScopeDecls>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decls: ScopeDecls) {
        self.scopes.push(decls);
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn is_top_level(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether `name` is bound by some scope nested inside the top level
    pub fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    pub fn scopes(&self) -> &[ScopeDecls] {
        &self.scopes
    }
}

/// Implement scope tracking for the listed node kinds of a `Visit` or
/// `VisitMut` implementation
///
/// The visitor needs a `scopes: ScopeStack` field. Each generated method
/// pushes the scope the node introduces, visits its children and pops.
macro_rules! track_scopes {
    ($mode:ident: $($kind:ident),+ $(,)?) => {
        $( $crate::scope::track_scopes!(@$mode $kind); )+
    };

    (@visit function) => {
        fn visit_function(&mut self, node: &::swc_ecma_ast::Function) {
            self.scopes.push($crate::scope::function_scope(&node.params, node.body.as_ref()));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit constructor) => {
        fn visit_constructor(&mut self, node: &::swc_ecma_ast::Constructor) {
            self.scopes.push($crate::scope::constructor_scope(node));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit arrow_expr) => {
        fn visit_arrow_expr(&mut self, node: &::swc_ecma_ast::ArrowExpr) {
            self.scopes.push($crate::scope::arrow_scope(node));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit fn_expr) => {
        fn visit_fn_expr(&mut self, node: &::swc_ecma_ast::FnExpr) {
            self.scopes.push($crate::scope::self_name_scope(node.ident.as_ref()));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit class_expr) => {
        fn visit_class_expr(&mut self, node: &::swc_ecma_ast::ClassExpr) {
            self.scopes.push($crate::scope::self_name_scope(node.ident.as_ref()));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit block_stmt) => {
        fn visit_block_stmt(&mut self, node: &::swc_ecma_ast::BlockStmt) {
            self.scopes.push($crate::scope::block_scope(&node.stmts));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit catch_clause) => {
        fn visit_catch_clause(&mut self, node: &::swc_ecma_ast::CatchClause) {
            self.scopes.push($crate::scope::catch_scope(node.param.as_ref()));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit for_stmt) => {
        fn visit_for_stmt(&mut self, node: &::swc_ecma_ast::ForStmt) {
            self.scopes.push($crate::scope::for_init_scope(node.init.as_ref()));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit for_in_stmt) => {
        fn visit_for_in_stmt(&mut self, node: &::swc_ecma_ast::ForInStmt) {
            self.scopes.push($crate::scope::for_head_scope(&node.left));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit for_of_stmt) => {
        fn visit_for_of_stmt(&mut self, node: &::swc_ecma_ast::ForOfStmt) {
            self.scopes.push($crate::scope::for_head_scope(&node.left));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit switch_stmt) => {
        fn visit_switch_stmt(&mut self, node: &::swc_ecma_ast::SwitchStmt) {
            self.scopes.push($crate::scope::switch_scope(&node.cases));
            ::swc_ecma_visit::VisitWith::visit_children_with(node, self);
            self.scopes.pop();
        }
    };

    (@visit_mut function) => {
        fn visit_mut_function(&mut self, node: &mut ::swc_ecma_ast::Function) {
            self.scopes.push($crate::scope::function_scope(&node.params, node.body.as_ref()));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut constructor) => {
        fn visit_mut_constructor(&mut self, node: &mut ::swc_ecma_ast::Constructor) {
            self.scopes.push($crate::scope::constructor_scope(node));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut arrow_expr) => {
        fn visit_mut_arrow_expr(&mut self, node: &mut ::swc_ecma_ast::ArrowExpr) {
            self.scopes.push($crate::scope::arrow_scope(node));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut fn_expr) => {
        fn visit_mut_fn_expr(&mut self, node: &mut ::swc_ecma_ast::FnExpr) {
            self.scopes.push($crate::scope::self_name_scope(node.ident.as_ref()));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut class_expr) => {
        fn visit_mut_class_expr(&mut self, node: &mut ::swc_ecma_ast::ClassExpr) {
            self.scopes.push($crate::scope::self_name_scope(node.ident.as_ref()));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut block_stmt) => {
        fn visit_mut_block_stmt(&mut self, node: &mut ::swc_ecma_ast::BlockStmt) {
            self.scopes.push($crate::scope::block_scope(&node.stmts));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut catch_clause) => {
        fn visit_mut_catch_clause(&mut self, node: &mut ::swc_ecma_ast::CatchClause) {
            self.scopes.push($crate::scope::catch_scope(node.param.as_ref()));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut for_stmt) => {
        fn visit_mut_for_stmt(&mut self, node: &mut ::swc_ecma_ast::ForStmt) {
            self.scopes.push($crate::scope::for_init_scope(node.init.as_ref()));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut for_in_stmt) => {
        fn visit_mut_for_in_stmt(&mut self, node: &mut ::swc_ecma_ast::ForInStmt) {
            self.scopes.push($crate::scope::for_head_scope(&node.left));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut for_of_stmt) => {
        fn visit_mut_for_of_stmt(&mut self, node: &mut ::swc_ecma_ast::ForOfStmt) {
            self.scopes.push($crate::scope::for_head_scope(&node.left));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
    (@visit_mut switch_stmt) => {
        fn visit_mut_switch_stmt(&mut self, node: &mut ::swc_ecma_ast::SwitchStmt) {
            self.scopes.push($crate::scope::switch_scope(&node.cases));
            ::swc_ecma_visit::VisitMutWith::visit_mut_children_with(node, self);
            self.scopes.pop();
        }
    };
}

pub(crate) use track_scopes;

/// Every scope-introducing node kind, for visitors without special cases
macro_rules! track_all_scopes {
    ($mode:ident) => {
        $crate::scope::track_scopes!($mode: function, constructor, arrow_expr, fn_expr,
            class_expr, block_stmt, catch_clause, for_stmt, for_in_stmt, for_of_stmt,
            switch_stmt);
    };
}

pub(crate) use track_all_scopes;
