//! Identifier occurrences classified by role
//!
//! `swc_ecma_visit` reaches every [`Ident`] through the same `visit_ident`
//! hook whatever it stands for. [`walk_idents`] walks a tree with the scopes
//! tracked and reports each occurrence as a read, a write or a binding;
//! labels, property names and the imported side of import specifiers are
//! not references and are never reported.

use swc_ecma_ast::{
    AssignTargetPat, BindingIdent, ClassDecl, DefaultDecl, ExportDefaultDecl, ExportSpecifier,
    Expr, FnDecl, ForHead, ImportDecl, ModuleExportName, NamedExport, Prop, SimpleAssignTarget,
    UpdateExpr,
};
use swc_ecma_visit::{Visit, VisitWith};

use crate::scope::{ScopeStack, track_all_scopes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Read,
    /// Assignment target, `++`/`--` operand or `for (x in ...)` head
    Write,
    /// Declaration, parameter or import local
    Binding,
}

/// Receives every identifier occurrence with the scopes enclosing it
pub trait IdentVisitor {
    fn visit_occurrence(&mut self, name: &str, kind: IdentKind, scopes: &ScopeStack);
}

/// Walk `node`, reporting identifier occurrences to `visitor`
pub fn walk_idents<N, V>(node: &N, visitor: V) -> V
where
    N: VisitWith<IdentWalker<V>> + ?Sized,
    V: IdentVisitor,
{
    let mut walker = IdentWalker {
        visitor,
        scopes: ScopeStack::new(),
        pat_kind: IdentKind::Binding,
    };
    node.visit_with(&mut walker);
    walker.visitor
}

#[derive(Debug)]
pub struct IdentWalker<V> {
    visitor: V,
    scopes: ScopeStack,
    /// What a `BindingIdent` inside the current pattern stands for
    pat_kind: IdentKind,
}

impl<V: IdentVisitor> IdentWalker<V> {
    fn report(&mut self, name: &str, kind: IdentKind) {
        self.visitor.visit_occurrence(name, kind, &self.scopes);
    }

    fn with_pat_kind(&mut self, kind: IdentKind, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.pat_kind, kind);
        f(self);
        self.pat_kind = saved;
    }
}

impl<V: IdentVisitor> Visit for IdentWalker<V> {
    track_all_scopes!(visit);

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.report(&ident.sym, IdentKind::Read),
            // Default values inside patterns are ordinary expressions
            _ => self.with_pat_kind(IdentKind::Binding, |this| expr.visit_children_with(this)),
        }
    }

    fn visit_prop(&mut self, prop: &Prop) {
        match prop {
            Prop::Shorthand(ident) => self.report(&ident.sym, IdentKind::Read),
            _ => prop.visit_children_with(self),
        }
    }

    fn visit_binding_ident(&mut self, ident: &BindingIdent) {
        self.report(&ident.id.sym, self.pat_kind);
    }

    fn visit_simple_assign_target(&mut self, target: &SimpleAssignTarget) {
        match target {
            SimpleAssignTarget::Ident(ident) => self.report(&ident.id.sym, IdentKind::Write),
            _ => target.visit_children_with(self),
        }
    }

    fn visit_assign_target_pat(&mut self, pat: &AssignTargetPat) {
        self.with_pat_kind(IdentKind::Write, |this| pat.visit_children_with(this));
    }

    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Pat(pat) => {
                self.with_pat_kind(IdentKind::Write, |this| pat.visit_with(this));
            }
            _ => head.visit_children_with(self),
        }
    }

    fn visit_update_expr(&mut self, update: &UpdateExpr) {
        match update.arg.as_ref() {
            Expr::Ident(ident) => self.report(&ident.sym, IdentKind::Write),
            arg => arg.visit_with(self),
        }
    }

    fn visit_fn_decl(&mut self, decl: &FnDecl) {
        self.report(&decl.ident.sym, IdentKind::Binding);
        decl.function.visit_with(self);
    }

    fn visit_class_decl(&mut self, decl: &ClassDecl) {
        self.report(&decl.ident.sym, IdentKind::Binding);
        decl.class.visit_with(self);
    }

    fn visit_export_default_decl(&mut self, export: &ExportDefaultDecl) {
        match &export.decl {
            DefaultDecl::Fn(func) => {
                if let Some(ident) = &func.ident {
                    self.report(&ident.sym, IdentKind::Binding);
                }
                func.function.visit_with(self);
            }
            DefaultDecl::Class(class) => {
                if let Some(ident) = &class.ident {
                    self.report(&ident.sym, IdentKind::Binding);
                }
                class.class.visit_with(self);
            }
            DefaultDecl::TsInterfaceDecl(_) => {}
        }
    }

    fn visit_import_decl(&mut self, import: &ImportDecl) {
        for specifier in &import.specifiers {
            self.report(&specifier.local().sym, IdentKind::Binding);
        }
    }

    fn visit_named_export(&mut self, export: &NamedExport) {
        if export.src.is_some() {
            return;
        }
        for specifier in &export.specifiers {
            if let ExportSpecifier::Named(named) = specifier
                && let ModuleExportName::Ident(local) = &named.orig
            {
                self.report(&local.sym, IdentKind::Read);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_source;

    #[derive(Default)]
    struct Occurrences(Vec<(String, IdentKind, usize)>);

    impl IdentVisitor for Occurrences {
        fn visit_occurrence(&mut self, name: &str, kind: IdentKind, scopes: &ScopeStack) {
            self.0.push((name.to_string(), kind, scopes.depth()));
        }
    }

    fn occurrences(source: &str) -> Vec<(String, IdentKind, usize)> {
        let body = parse_source("a.js", source).expect("parses");
        walk_idents(body.as_slice(), Occurrences::default()).0
    }

    #[test]
    fn test_roles_of_top_level_occurrences() {
        let found = occurrences("var a = b; a = c; a++; [a, d.e] = f; label: for (g in h) break label;");
        let expected = [
            ("a", IdentKind::Binding),
            ("b", IdentKind::Read),
            ("a", IdentKind::Write),
            ("c", IdentKind::Read),
            ("a", IdentKind::Write),
            ("a", IdentKind::Write),
            ("d", IdentKind::Read),
            ("f", IdentKind::Read),
            ("g", IdentKind::Write),
            ("h", IdentKind::Read),
        ];
        assert_eq!(
            found
                .iter()
                .map(|(name, kind, _)| (name.as_str(), *kind))
                .collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn test_pattern_defaults_are_reads() {
        let found = occurrences("var { x = fallback, y: [z] } = obj; ({ shorthand });");
        assert!(found.contains(&("x".to_string(), IdentKind::Binding, 0)));
        assert!(found.contains(&("fallback".to_string(), IdentKind::Read, 0)));
        assert!(found.contains(&("z".to_string(), IdentKind::Binding, 0)));
        assert!(found.contains(&("shorthand".to_string(), IdentKind::Read, 0)));
        assert!(!found.iter().any(|(name, ..)| name == "y"));
    }

    #[test]
    fn test_module_syntax_occurrences() {
        let found = occurrences(
            "import def, { a as b } from './m';\nexport { b as c };\nexport { d } from './n';\nexport default function e() {}",
        );
        assert_eq!(
            found,
            vec![
                ("def".to_string(), IdentKind::Binding, 0),
                ("b".to_string(), IdentKind::Binding, 0),
                ("b".to_string(), IdentKind::Read, 0),
                ("e".to_string(), IdentKind::Binding, 0),
            ]
        );
    }
}
