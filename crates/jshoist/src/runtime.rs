//! Runtime API shared by the linker and the emitted bundle
//!
//! These names are a wire contract: bundles produced by different builds must
//! agree on them, so they never change with configuration.

use swc_ecma_ast::{BinaryOp, Expr, ModuleItem, Stmt};

use crate::{
    ast_builder as b,
    ast_util::{as_ident_call, as_str_lit, plain_args},
    types::FxIndexSet,
};

/// `$hoist$interopDefault(exports)`: the default export of a CommonJS value
pub const INTEROP_DEFAULT: &str = "$hoist$interopDefault";
/// `$hoist$export(dest, name, getter)`: define a live export binding
pub const EXPORT: &str = "$hoist$export";
/// `$hoist$exportWildcard(dest, source)`: copy non-default exports
pub const EXPORT_WILDCARD: &str = "$hoist$exportWildcard";
/// `$hoist$missingModule(specifier)`: throw a module-not-found error
pub const MISSING_MODULE: &str = "$hoist$missingModule";
/// Module registry shared by all bundles of a build
pub const REGISTRY: &str = "hoistRequire";
/// `hoistRequire.register(id, exports)`
pub const REGISTER: &str = "register";

/// Runtime declarations a bundle depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Helper {
    Registry,
    InteropDefault,
    Export,
    ExportWildcard,
    MissingModule,
}

impl Helper {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Registry => REGISTRY,
            Self::InteropDefault => INTEROP_DEFAULT,
            Self::Export => EXPORT,
            Self::ExportWildcard => EXPORT_WILDCARD,
            Self::MissingModule => MISSING_MODULE,
        }
    }

    fn declaration(self) -> Stmt {
        match self {
            Self::Registry => registry_declaration(),
            Self::InteropDefault => interop_default_declaration(),
            Self::Export => export_declaration(),
            Self::ExportWildcard => export_wildcard_declaration(),
            Self::MissingModule => missing_module_declaration(),
        }
    }
}

/// Declarations of the given helpers, registry first
pub fn prelude(helpers: &FxIndexSet<Helper>) -> Vec<ModuleItem> {
    let mut sorted: Vec<Helper> = helpers.iter().copied().collect();
    sorted.sort();
    sorted
        .into_iter()
        .map(|helper| helper.declaration().into())
        .collect()
}

/// `hoistRequire(id)`
pub fn registry_request(id: &str) -> Expr {
    b::call_ident(REGISTRY, vec![b::string(id)])
}

/// `hoistRequire.register(id, exports)`
pub fn registry_register(id: &str, exports: Expr) -> Expr {
    b::call(
        b::member(b::ident(REGISTRY), REGISTER),
        vec![b::string(id), exports],
    )
}

pub fn missing_module_call(specifier: &str) -> Expr {
    b::call_ident(MISSING_MODULE, vec![b::string(specifier)])
}

pub fn interop_default_call(exports: Expr) -> Expr {
    b::call_ident(INTEROP_DEFAULT, vec![exports])
}

/// `$hoist$export(dest, "name", function () { return value; })`
pub fn export_call(dest: Expr, name: &str, value: Expr) -> Expr {
    b::call_ident(EXPORT, vec![dest, b::string(name), b::getter(value)])
}

/// Destination, name and getter of an export definition
pub fn as_export_call(expr: &Expr) -> Option<(&Expr, &str, &Expr)> {
    let (callee, args) = as_ident_call(expr)?;
    if callee != EXPORT {
        return None;
    }
    let args = plain_args(args)?;
    let [dest, name, getter] = args.as_slice() else {
        return None;
    };
    Some((*dest, as_str_lit(name)?, *getter))
}

pub fn export_wildcard_call(dest: Expr, source: Expr) -> Expr {
    b::call_ident(EXPORT_WILDCARD, vec![dest, source])
}

fn global_this_registry() -> Expr {
    b::member(b::ident("globalThis"), REGISTRY)
}

fn registry_declaration() -> Stmt {
    // var hoistRequire = globalThis.hoistRequire || (function () { ... })();
    let not_found = b::new_expr(
        b::ident("Error"),
        vec![b::binary(
            BinaryOp::Add,
            b::binary(
                BinaryOp::Add,
                b::string("Cannot find module '"),
                b::ident("id"),
            ),
            b::string("'"),
        )],
    );
    let request = b::function_decl(
        REGISTRY,
        &["id"],
        vec![
            b::if_stmt(
                b::not(b::binary(BinaryOp::In, b::ident("id"), b::ident("modules"))),
                vec![b::throw_stmt(not_found)],
                None,
            ),
            b::return_stmt(Some(b::computed_member(
                b::ident("modules"),
                b::ident("id"),
            ))),
        ],
    );
    let register = b::expr_stmt(b::assign_member(
        b::ident(REGISTRY),
        REGISTER,
        b::function_expr(
            &["id", "exports"],
            vec![b::expr_stmt(b::assign_computed(
                b::ident("modules"),
                b::ident("id"),
                b::ident("exports"),
            ))],
        ),
    ));
    let publish = b::expr_stmt(b::assign_member(
        b::ident("globalThis"),
        REGISTRY,
        b::ident(REGISTRY),
    ));
    let factory = b::function_expr(
        &[],
        vec![
            b::var_stmt("modules", b::object(Vec::new())),
            request,
            register,
            publish,
            b::return_stmt(Some(b::ident(REGISTRY))),
        ],
    );
    b::var_stmt(
        REGISTRY,
        b::binary(
            BinaryOp::LogicalOr,
            global_this_registry(),
            b::call(factory, Vec::new()),
        ),
    )
}

fn interop_default_declaration() -> Stmt {
    // function $hoist$interopDefault(a) { return a && a.__esModule ? a["default"] : a; }
    b::function_decl(
        INTEROP_DEFAULT,
        &["a"],
        vec![b::return_stmt(Some(b::cond(
            b::binary(
                BinaryOp::LogicalAnd,
                b::ident("a"),
                b::member(b::ident("a"), "__esModule"),
            ),
            b::computed_member(b::ident("a"), b::string("default")),
            b::ident("a"),
        )))],
    )
}

fn export_declaration() -> Stmt {
    // function $hoist$export(dest, name, get) {
    //   Object.defineProperty(dest, name, { enumerable: true, configurable: true, get: get });
    // }
    b::function_decl(
        EXPORT,
        &["dest", "name", "get"],
        vec![b::expr_stmt(b::call(
            b::member(b::ident("Object"), "defineProperty"),
            vec![
                b::ident("dest"),
                b::ident("name"),
                b::object(vec![
                    ("enumerable", b::boolean(true)),
                    ("configurable", b::boolean(true)),
                    ("get", b::ident("get")),
                ]),
            ],
        ))],
    )
}

fn export_wildcard_declaration() -> Stmt {
    let skip = b::binary(
        BinaryOp::LogicalOr,
        b::binary(
            BinaryOp::LogicalOr,
            b::binary(BinaryOp::EqEqEq, b::ident("key"), b::string("default")),
            b::binary(BinaryOp::EqEqEq, b::ident("key"), b::string("__esModule")),
        ),
        b::call(
            b::member(
                b::member(b::member(b::ident("Object"), "prototype"), "hasOwnProperty"),
                "call",
            ),
            vec![b::ident("dest"), b::ident("key")],
        ),
    );
    let getter = b::function_expr(
        &[],
        vec![b::return_stmt(Some(b::computed_member(
            b::ident("source"),
            b::ident("key"),
        )))],
    );
    let define = b::expr_stmt(b::call(
        b::member(b::ident("Object"), "defineProperty"),
        vec![
            b::ident("dest"),
            b::ident("key"),
            b::object(vec![("enumerable", b::boolean(true)), ("get", getter)]),
        ],
    ));
    let copy = b::function_expr(
        &["key"],
        vec![b::if_stmt(skip, vec![b::return_stmt(None)], None), define],
    );
    b::function_decl(
        EXPORT_WILDCARD,
        &["dest", "source"],
        vec![
            b::expr_stmt(b::call(
                b::member(
                    b::call(
                        b::member(b::ident("Object"), "keys"),
                        vec![b::ident("source")],
                    ),
                    "forEach",
                ),
                vec![copy],
            )),
            b::return_stmt(Some(b::ident("dest"))),
        ],
    )
}

fn missing_module_declaration() -> Stmt {
    let message = b::binary(
        BinaryOp::Add,
        b::binary(
            BinaryOp::Add,
            b::string("Cannot find module '"),
            b::ident("name"),
        ),
        b::string("'"),
    );
    b::function_decl(
        MISSING_MODULE,
        &["name"],
        vec![
            b::var_stmt("err", b::new_expr(b::ident("Error"), vec![message])),
            b::expr_stmt(b::assign_member(
                b::ident("err"),
                "code",
                b::string("MODULE_NOT_FOUND"),
            )),
            b::throw_stmt(b::ident("err")),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_program;

    #[test]
    fn test_prelude_orders_registry_first() {
        let mut helpers = FxIndexSet::default();
        helpers.insert(Helper::MissingModule);
        helpers.insert(Helper::Registry);
        let prelude = prelude(&helpers);
        assert_eq!(prelude.len(), 2);
        let code = print_program(&prelude);
        let registry = code.find("var hoistRequire").expect("registry declared");
        let missing = code
            .find("function $hoist$missingModule")
            .expect("helper declared");
        assert!(registry < missing);
    }

    #[test]
    fn test_interop_helper_shape() {
        let mut helpers = FxIndexSet::default();
        helpers.insert(Helper::InteropDefault);
        insta::assert_snapshot!(print_program(&prelude(&helpers)), @r#"
        function $hoist$interopDefault(a) {
          return a && a.__esModule ? a["default"] : a;
        }
        "#);
    }

    #[test]
    fn test_export_definitions_are_recognized() {
        let call = export_call(b::ident("$a$exports"), "count", b::ident("$a$count"));
        let (dest, name, getter) = as_export_call(&call).expect("export definition");
        assert!(crate::ast_util::is_ident_named(dest, "$a$exports"));
        assert_eq!(name, "count");
        assert!(matches!(getter, Expr::Fn(_)));

        let other = b::call_ident(EXPORT, vec![b::ident("$a$exports")]);
        assert!(as_export_call(&other).is_none());
    }

    #[test]
    fn test_export_helper_defines_a_getter() {
        let mut helpers = FxIndexSet::default();
        helpers.insert(Helper::Export);
        let code = print_program(&prelude(&helpers));
        assert!(code.starts_with("function $hoist$export(dest, name, get) {"));
        assert!(code.contains("Object.defineProperty(dest, name, {"));
        assert!(code.contains("get: get"));
    }
}
