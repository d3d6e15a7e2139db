//! Output format strategies
//!
//! The linker is agnostic of the module system the bundle is loaded by. It
//! asks the format for four things:
//! - statements loading the sibling bundles this bundle reads from,
//! - an expression reaching a module that lives in another bundle,
//! - statements publishing modules other bundles reach into,
//! - statements exposing the entry module's exports.
//!
//! Cross-bundle references always go through the runtime registry, so every
//! format shares the same external import and bundle exports.

use std::fmt;

use swc_ecma_ast::{Expr, ModuleItem};

use crate::{
    ast_builder as b,
    ast_util::is_valid_identifier,
    config::{Config, OutputFormatKind},
    graph::Bundle,
    module_unit::ModuleId,
    runtime,
};

/// Statically known exports of an entry module: exported name and value
pub type NamedExports = Vec<(String, Expr)>;

pub trait OutputFormat: fmt::Debug {
    /// Load the sibling bundles whose modules this bundle references
    fn generate_bundle_imports(&self, bundles: &[&Bundle]) -> Vec<ModuleItem>;

    /// Expression evaluating to the exports of a module in another bundle
    fn generate_external_import(&self, id: &ModuleId) -> Expr {
        runtime::registry_request(id.as_str())
    }

    /// Publish modules that other bundles reference
    fn generate_bundle_exports(&self, exported: Vec<(ModuleId, Expr)>) -> Vec<ModuleItem> {
        exported
            .into_iter()
            .map(|(id, exports)| {
                b::expr_stmt(runtime::registry_register(id.as_str(), exports)).into()
            })
            .collect()
    }

    /// Whether [`Self::generate_main_export`] exposes anything, which keeps
    /// the entries' exports alive
    fn publishes_main_export(&self) -> bool {
        true
    }

    /// Expose an entry's exports
    ///
    /// `named` is `None` when the entry's export names are only known at
    /// runtime.
    fn generate_main_export(
        &self,
        entry: &ModuleId,
        exports: Expr,
        named: Option<NamedExports>,
    ) -> Vec<ModuleItem>;
}

/// Browser script; the entry's exports optionally land on a global variable
#[derive(Debug, Clone, Default)]
pub struct GlobalFormat {
    pub global_name: Option<String>,
}

impl OutputFormat for GlobalFormat {
    fn generate_bundle_imports(&self, _bundles: &[&Bundle]) -> Vec<ModuleItem> {
        // Sibling scripts are loaded by the page
        Vec::new()
    }

    fn publishes_main_export(&self) -> bool {
        self.global_name.is_some()
    }

    fn generate_main_export(
        &self,
        _entry: &ModuleId,
        exports: Expr,
        _named: Option<NamedExports>,
    ) -> Vec<ModuleItem> {
        let Some(global_name) = &self.global_name else {
            return Vec::new();
        };
        let assign = if is_valid_identifier(global_name) {
            b::assign_member(b::ident("globalThis"), global_name, exports)
        } else {
            b::assign_computed(b::ident("globalThis"), b::string(global_name), exports)
        };
        vec![b::expr_stmt(assign).into()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommonJsFormat;

impl OutputFormat for CommonJsFormat {
    fn generate_bundle_imports(&self, bundles: &[&Bundle]) -> Vec<ModuleItem> {
        bundles
            .iter()
            .map(|bundle| b::expr_stmt(b::require(&relative(&bundle.name))).into())
            .collect()
    }

    fn generate_main_export(
        &self,
        _entry: &ModuleId,
        exports: Expr,
        _named: Option<NamedExports>,
    ) -> Vec<ModuleItem> {
        vec![b::expr_stmt(b::assign_member(b::ident("module"), "exports", exports)).into()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EsmFormat;

impl OutputFormat for EsmFormat {
    fn generate_bundle_imports(&self, bundles: &[&Bundle]) -> Vec<ModuleItem> {
        bundles
            .iter()
            .map(|bundle| b::import_side_effect(&relative(&bundle.name)))
            .collect()
    }

    fn generate_main_export(
        &self,
        entry: &ModuleId,
        exports: Expr,
        named: Option<NamedExports>,
    ) -> Vec<ModuleItem> {
        let Some(named) = named else {
            return vec![b::export_default_expr(exports)];
        };

        let mut items = Vec::new();
        let mut specifiers = Vec::with_capacity(named.len());
        for (exported, value) in named {
            let local = match value {
                Expr::Ident(local) => local.sym.to_string(),
                other => {
                    // Live values only exist as bindings; snapshot the rest
                    let local = entry.prefixed(&format!("main${}", sanitize(&exported)));
                    items.push(b::var_stmt(&local, other).into());
                    local
                }
            };
            specifiers.push((local, exported));
        }
        if !specifiers.is_empty() {
            let names: Vec<(&str, &str)> = specifiers
                .iter()
                .map(|(local, exported)| (local.as_str(), exported.as_str()))
                .collect();
            items.push(b::export_named(&names));
        }
        items
    }
}

fn relative(name: &str) -> String {
    if name.starts_with("./") || name.starts_with("../") {
        name.to_string()
    } else {
        format!("./{name}")
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect()
}

/// The format selected by `config`
pub fn output_format_for(config: &Config) -> Box<dyn OutputFormat> {
    match config.output_format {
        OutputFormatKind::Global => Box::new(GlobalFormat {
            global_name: config.global_name.clone(),
        }),
        OutputFormatKind::CommonJs => Box::new(CommonJsFormat),
        OutputFormatKind::Esm => Box::new(EsmFormat),
    }
}
