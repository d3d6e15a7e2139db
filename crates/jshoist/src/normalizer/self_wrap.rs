//! Private-scope treatment for modules that cannot be flattened
//!
//! The body keeps its own names and runs inside a closure that sees genuine
//! `module` and `exports` objects:
//!
//! ```text
//! var $id$exports = {};
//! var module = { exports: $id$exports, id: "<id>" };
//! var exports = module.exports;
//! (function () { <body> }).call(exports);
//! $id$exports = module.exports;
//! ```
//!
//! The shell only runs once the module is wrapped in its init function, so
//! `module` and `exports` stay local to it.

use rustc_hash::FxHashMap;
use swc_ecma_ast::{ModuleItem, Stmt};
use swc_ecma_visit::VisitMutWith;

use super::{
    analysis::ModuleAnalysis,
    commonjs::CommonJsRewriter,
    module_decls::{Lowering, ModuleDeclLowering},
};
use crate::{ast_builder as b, module_unit::ModuleUnit};

pub(super) fn wrap(
    unit: &mut ModuleUnit,
    body: Vec<ModuleItem>,
    analysis: &ModuleAnalysis,
) -> Vec<ModuleItem> {
    let renames = FxHashMap::default();
    let lowered = ModuleDeclLowering::new(&unit.id, Lowering::SelfWrapped, &renames).lower(body);
    // Lowering leaves only statements behind
    let mut inner: Vec<Stmt> = lowered
        .apply_to(unit)
        .into_iter()
        .filter_map(|item| match item {
            ModuleItem::Stmt(stmt) => Some(stmt),
            ModuleItem::ModuleDecl(_) => None,
        })
        .collect();

    inner.visit_mut_with(&mut CommonJsRewriter::new(
        unit.id.clone(),
        &mut unit.dependencies,
        &analysis.top_level,
        false,
        analysis.has_esm_syntax,
    ));

    if analysis.has_esm_syntax {
        inner.insert(
            0,
            b::expr_stmt(b::assign_member(
                b::ident("exports"),
                "__esModule",
                b::boolean(true),
            )),
        );
    }

    let exports_ident = unit.id.exports_ident();
    let closure = b::function_expr(&[], inner);

    unit.flags.self_wrapped = true;
    unit.flags.should_wrap = true;
    unit.flags.is_common_js = true;
    unit.flags.has_exports_identifier = true;

    [
        b::var_stmt(&exports_ident, b::object(Vec::new())),
        b::var_stmt(
            "module",
            b::object(vec![
                ("exports", b::ident(&exports_ident)),
                ("id", b::string(unit.id.as_str())),
            ]),
        ),
        b::var_stmt("exports", b::member(b::ident("module"), "exports")),
        b::expr_stmt(b::call(
            b::member(closure, "call"),
            vec![b::ident("exports")],
        )),
        b::expr_stmt(b::assign_ident(
            &exports_ident,
            b::member(b::ident("module"), "exports"),
        )),
    ]
    .into_iter()
    .map(ModuleItem::Stmt)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{module_unit::ModuleId, normalizer::normalize, printer::print_program};

    #[test]
    fn test_top_level_return_keeps_module_object() {
        let mut unit = ModuleUnit::parse(
            ModuleId::new("w"),
            "w.js",
            "if (done) { return; }\nmodule.exports.x = 1;",
        )
        .expect("parses");
        normalize(&mut unit);

        let code = print_program(&unit.body);
        assert!(code.starts_with(
            "var $w$exports = {};\nvar module = {\n  exports: $w$exports,\n  id: \"w\"\n};\nvar exports = module.exports;\n"
        ));
        assert!(code.contains("if (done) {\n    return;\n  }"));
        assert!(code.contains("module.exports.x = 1;"));
        assert!(code.contains(".call(exports)"));
        assert!(code.trim_end().ends_with("$w$exports = module.exports;"));
        assert!(unit.flags.self_wrapped);
        assert!(!unit.flags.side_effect_free);
    }

    #[test]
    fn test_module_syntax_defines_exports_inside_the_closure() {
        let mut unit = ModuleUnit::parse(
            ModuleId::new("w"),
            "w.js",
            "export const value = eval('1');",
        )
        .expect("parses");
        normalize(&mut unit);

        let code = print_program(&unit.body);
        assert!(code.contains("exports.__esModule = true;"));
        assert!(code.contains("$hoist$export(exports, \"value\", function"));
        assert!(code.contains("return value;"));
    }
}
