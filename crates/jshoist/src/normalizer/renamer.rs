//! Scope-aware renaming of top-level bindings

use rustc_hash::FxHashMap;
use swc_ecma_ast::{
    BreakStmt, ContinueStmt, ExportNamedSpecifier, Ident, ImportNamedSpecifier, LabeledStmt,
    ModuleExportName, NamedExport, ObjectPatProp, Prop,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::{
    ast_util::{expand_assign_pat_prop, expand_shorthand},
    scope::{ScopeStack, track_all_scopes},
};

/// Renames every reference to a top-level binding that no inner scope shadows
#[derive(Debug)]
pub(crate) struct Renamer<'r> {
    renames: &'r FxHashMap<String, String>,
    scopes: ScopeStack,
}

impl<'r> Renamer<'r> {
    pub(crate) fn new(renames: &'r FxHashMap<String, String>) -> Self {
        Self {
            renames,
            scopes: ScopeStack::new(),
        }
    }

    fn renamed(&self, name: &str) -> Option<&'r str> {
        if self.scopes.is_shadowed(name) {
            return None;
        }
        self.renames.get(name).map(String::as_str)
    }
}

impl VisitMut for Renamer<'_> {
    track_all_scopes!(visit_mut);

    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(renamed) = self.renamed(&ident.sym) {
            ident.sym = renamed.into();
        }
    }

    fn visit_mut_labeled_stmt(&mut self, stmt: &mut LabeledStmt) {
        stmt.body.visit_mut_with(self);
    }

    fn visit_mut_break_stmt(&mut self, _: &mut BreakStmt) {}

    fn visit_mut_continue_stmt(&mut self, _: &mut ContinueStmt) {}

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop
            && self.renamed(&ident.sym).is_some()
        {
            expand_shorthand(prop);
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        if let ObjectPatProp::Assign(assign) = prop
            && self.renamed(&assign.key.id.sym).is_some()
        {
            expand_assign_pat_prop(prop);
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_named_export(&mut self, export: &mut NamedExport) {
        // Re-exported names belong to the source module
        if export.src.is_none() {
            export.specifiers.visit_mut_with(self);
        }
    }

    fn visit_mut_export_named_specifier(&mut self, specifier: &mut ExportNamedSpecifier) {
        let ModuleExportName::Ident(local) = &mut specifier.orig else {
            return;
        };
        if let Some(renamed) = self.renamed(&local.sym) {
            if specifier.exported.is_none() {
                specifier.exported = Some(ModuleExportName::Ident(local.clone()));
            }
            local.sym = renamed.into();
        }
    }

    fn visit_mut_import_named_specifier(&mut self, specifier: &mut ImportNamedSpecifier) {
        if let Some(renamed) = self.renamed(&specifier.local.sym) {
            if specifier.imported.is_none() {
                specifier.imported = Some(ModuleExportName::Ident(specifier.local.clone()));
            }
            specifier.local.sym = renamed.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_source, printer::print_program};

    fn rename(source: &str, renames: &[(&str, &str)]) -> String {
        let mut body = parse_source("m.js", source).expect("parses");
        let renames = renames
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect();
        body.visit_mut_with(&mut Renamer::new(&renames));
        print_program(&body)
    }

    #[test]
    fn test_shadowed_references_keep_their_name() {
        let code = rename(
            "var x = 1;\nfunction f(x) {\n  return x;\n}\nf(x);\n",
            &[("x", "$m$x"), ("f", "$m$f")],
        );
        insta::assert_snapshot!(code, @r"
        var $m$x = 1;
        function $m$f(x) {
          return x;
        }
        $m$f($m$x);
        ");
    }

    #[test]
    fn test_shorthands_keep_their_key() {
        let code = rename("use({ x });\nvar { x = 1 } = obj;", &[("x", "$m$x")]);
        assert!(code.contains("x: $m$x"));
        assert!(code.contains("x: $m$x = 1"));
    }

    #[test]
    fn test_labels_and_property_names_are_untouched() {
        let code = rename("x: for (;;) { o.x; break x; }", &[("x", "$m$x")]);
        assert!(code.starts_with("x: for"));
        assert!(code.contains("o.x;"));
        assert!(code.contains("break x;"));
    }

    #[test]
    fn test_export_specifiers_keep_the_exported_name() {
        let code = rename(
            "var x = 1;\nexport { x };\nexport { x as y } from './other';",
            &[("x", "$m$x")],
        );
        assert!(code.contains("export { $m$x as x };"));
        assert!(code.contains("export { x as y } from './other';"));
    }
}
