//! Library for the `ASR` schema, plus the helpers that work across several
//! nodes and tables at once.

use asdl_rt::ScopeId;
use tracing::debug;

#[allow(unused, clippy::all, clippy::pedantic)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/asr.rs"));
}

pub use generated::*;

/// An `ExternalSymbol` whose target cannot be found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelinkError {
    #[error("module `{module}` was not found, so `{symbol}` could not be resolved")]
    ModuleNotFound { module: String, symbol: String },
    #[error("`{symbol}` was not found in module `{module}`")]
    SymbolNotFound { module: String, symbol: String },
}

/// The table `sym` owns, if its variant owns one.
pub fn owned_scope(ir: &Asr, sym: SymbolId) -> Option<ScopeId> {
    match &ir.symbol(sym).kind {
        SymbolKind::Program(x) => Some(x.symtab),
        SymbolKind::Module(x) => Some(x.symtab),
        SymbolKind::Function(x) => Some(x.symtab),
        SymbolKind::Struct(x) => Some(x.symtab),
        SymbolKind::GenericProcedure(_)
        | SymbolKind::ExternalSymbol(_)
        | SymbolKind::Variable(_) => None,
    }
}

/// Walk `path` down through nested tables from `scope`, then look up `name`.
fn find_scoped(ir: &Asr, mut scope: ScopeId, path: &[String], name: &str) -> Option<SymbolId> {
    for inner in path {
        scope = owned_scope(ir, ir.scopes.lookup(scope, inner)?)?;
    }
    ir.scopes.lookup(scope, name)
}

/// Point every unlinked `ExternalSymbol` at the symbol it aliases.
///
/// The alias is not serialized, so after [`deserialize`] it is rebuilt
/// from `module_name`, `scope_names` and `original_name`. Modules are
/// searched in `global` first, then in `modules`, a table of separately
/// loaded modules. Returns how many symbols were linked.
pub fn relink_external_symbols(
    ir: &mut Asr,
    global: ScopeId,
    modules: Option<ScopeId>,
) -> Result<usize, RelinkError> {
    let unlinked: Vec<SymbolId> = ir
        .symbol_nodes
        .iter()
        .filter_map(|(id, node)| match &node.kind {
            SymbolKind::ExternalSymbol(x) if x.external.is_none() => Some(id),
            _ => None,
        })
        .collect();

    for &id in &unlinked {
        let x = ir.symbol(id).downcast::<symbol::ExternalSymbol>();
        let module_scope = [Some(global), modules]
            .into_iter()
            .flatten()
            .find_map(|scope| {
                let module = ir.scopes.lookup(scope, &x.module_name)?;
                if ir.symbol(module).is_a::<symbol::Module>() {
                    owned_scope(ir, module)
                } else {
                    None
                }
            })
            .ok_or_else(|| RelinkError::ModuleNotFound {
                module: x.module_name.clone(),
                symbol: x.original_name.clone(),
            })?;
        let target = find_scoped(ir, module_scope, &x.scope_names, &x.original_name).ok_or_else(|| {
            RelinkError::SymbolNotFound {
                module: x.module_name.clone(),
                symbol: x.original_name.clone(),
            }
        })?;
        debug!(name = %x.name, module = %x.module_name, "relinked external symbol");
        ir.symbol_mut(id)
            .downcast_mut::<symbol::ExternalSymbol>()
            .external = Some(target);
    }
    Ok(unlinked.len())
}
