//! Tests for the generated `asr` library: symbol tables on the wire,
//! external-symbol relinking, gated duplication and scope-tracking walks.

use asdl_ir::asr::*;
use asdl_rt::{DecodeError, DuplicationRefused, PickleOptions, ScopeId, Span};
use pretty_assertions::assert_eq;

use crate::common::{entry_names, span, variable, ProgramFixture};

fn plain(ir: &Asr, node: impl Into<NodeRef>) -> String {
    pickle(ir, node, PickleOptions::PLAIN)
}

/// The table a decoded `TranslationUnit` owns.
fn unit_scope(ir: &Asr, node: NodeRef) -> ScopeId {
    let NodeRef::Unit(id) = node else {
        panic!("expected a unit, got {node:?}");
    };
    ir.unit(id).downcast::<unit::TranslationUnit>().symtab
}

fn owned(ir: &Asr, scope: ScopeId, name: &str) -> ScopeId {
    let sym = ir.scopes.lookup(scope, name).unwrap();
    owned_scope(ir, sym).unwrap()
}

/// Serialize the fixture and read it back into a fresh container,
/// keeping table counters. Returns the container, its root and the root's
/// table.
fn reload(fixture: &ProgramFixture) -> (Asr, NodeRef, ScopeId) {
    let bytes = serialize(&fixture.ir, fixture.unit);
    let mut ir = Asr::new();
    let root = deserialize(&mut ir, &bytes, true).unwrap();
    let global = unit_scope(&ir, root);
    (ir, root, global)
}

#[test]
fn test_fixture_tables() {
    let f = ProgramFixture::new();
    let scopes = &f.ir.scopes;

    assert_eq!(entry_names(&f.ir, f.global), ["m", "main"]);
    assert_eq!(entry_names(&f.ir, f.module_scope), ["x", "f"]);
    assert_eq!(entry_names(&f.ir, f.function_scope), ["a", "r"]);
    assert_eq!(entry_names(&f.ir, f.program_scope), ["f", "y"]);

    assert_eq!(scopes[f.global].counter(), 1);
    assert_eq!(scopes[f.program_scope].counter(), 4);
    assert_eq!(scopes[f.function_scope].parent(), Some(f.module_scope));
    assert_eq!(scopes[f.global].parent(), None);

    assert_eq!(scopes.resolve(f.function_scope, "x"), scopes.lookup(f.module_scope, "x"));
    assert_eq!(scopes.resolve(f.program_scope, "f"), Some(f.external));
    assert_eq!(scopes.home(f.function), Some((f.module_scope, "f")));

    // Factories stamp the owners of the tables they own.
    assert_eq!(scopes[f.function_scope].owner(), Some(&NodeRef::Symbol(f.function)));
    assert_eq!(scopes[f.global].owner(), Some(&NodeRef::Unit(f.unit)));
}

#[test]
fn test_pickle_symbol_references() {
    let f = ProgramFixture::new();
    assert_eq!(
        plain(&f.ir, f.call),
        "(FunctionCall 4 f () [((IntegerConstant 2 (Integer 4)))] (Integer 4) () ())"
    );

    let unit = plain(&f.ir, f.unit);
    assert!(unit.starts_with("(TranslationUnit (SymbolTable 1 {m: (Module (SymbolTable 2 {x: "), "{unit}");
    assert!(unit.contains("f: (ExternalSymbol 4 f 2 f m [] f Public)"), "{unit}");
}

#[test]
fn test_round_trip_keeps_tables() {
    let f = ProgramFixture::new();
    let (ir, root, global) = reload(&f);

    assert_eq!(ir.scopes.len(), f.ir.scopes.len());
    assert_eq!(ir.scopes[global].counter(), 1);
    assert_eq!(entry_names(&ir, global), ["m", "main"]);

    let module_scope = owned(&ir, global, "m");
    let function_scope = owned(&ir, module_scope, "f");
    let program_scope = owned(&ir, global, "main");
    assert_eq!(entry_names(&ir, module_scope), ["x", "f"]);
    assert_eq!(entry_names(&ir, function_scope), ["a", "r"]);
    assert_eq!(entry_names(&ir, program_scope), ["f", "y"]);

    // Parents are rebuilt from nesting, counters kept.
    assert_eq!(ir.scopes[module_scope].parent(), Some(global));
    assert_eq!(ir.scopes[function_scope].parent(), Some(module_scope));
    assert_eq!(ir.scopes[program_scope].parent(), Some(global));
    assert_eq!(ir.scopes[function_scope].counter(), f.ir.scopes[f.function_scope].counter());

    // Owners are stamped while reading.
    let module = ir.scopes.lookup(global, "m").unwrap();
    assert_eq!(ir.scopes[module_scope].owner(), Some(&NodeRef::Symbol(module)));
    assert_eq!(ir.scopes[global].owner(), Some(&root));
}

#[test]
fn test_external_symbols_relink_after_load() {
    let f = ProgramFixture::new();
    let (mut ir, root, global) = reload(&f);

    let program_scope = owned(&ir, global, "main");
    let external = ir.scopes.lookup(program_scope, "f").unwrap();
    assert_eq!(ir.symbol(external).downcast::<symbol::ExternalSymbol>().external, None);
    assert_ne!(plain(&ir, root), plain(&f.ir, f.unit));

    assert_eq!(relink_external_symbols(&mut ir, global, None), Ok(1));
    let function = ir.scopes.lookup(owned(&ir, global, "m"), "f").unwrap();
    assert_eq!(
        ir.symbol(external).downcast::<symbol::ExternalSymbol>().external,
        Some(function)
    );
    assert_eq!(plain(&ir, root), plain(&f.ir, f.unit));

    // Already linked: nothing left to do.
    assert_eq!(relink_external_symbols(&mut ir, global, None), Ok(0));
}

#[test]
fn test_relink_searches_module_table() {
    let mut f = ProgramFixture::new();
    let modules = f.ir.scopes.new_scope(None);
    let module = f.ir.scopes.remove_symbol(f.global, "m").unwrap();
    f.ir.scopes.add_symbol(modules, "m", module);
    f.ir.symbol_mut(f.external).downcast_mut::<symbol::ExternalSymbol>().external = None;

    assert_eq!(relink_external_symbols(&mut f.ir, f.global, Some(modules)), Ok(1));
    assert_eq!(
        f.ir.symbol(f.external).downcast::<symbol::ExternalSymbol>().external,
        Some(f.function)
    );
}

#[test]
fn test_relink_errors() {
    let mut f = ProgramFixture::new();
    let x = f.ir.symbol_mut(f.external).downcast_mut::<symbol::ExternalSymbol>();
    x.external = None;
    x.module_name = "missing".to_string();
    assert_eq!(
        relink_external_symbols(&mut f.ir, f.global, None),
        Err(RelinkError::ModuleNotFound {
            module: "missing".to_string(),
            symbol: "f".to_string(),
        })
    );

    let x = f.ir.symbol_mut(f.external).downcast_mut::<symbol::ExternalSymbol>();
    x.module_name = "m".to_string();
    x.original_name = "g".to_string();
    let err = relink_external_symbols(&mut f.ir, f.global, None).unwrap_err();
    assert_eq!(err.to_string(), "`g` was not found in module `m`");
}

#[test]
fn test_load_symtab_id_modes() {
    let f = ProgramFixture::new();
    let bytes = serialize(&f.ir, f.unit);

    // Every counter is already taken in the fixture's own container.
    let mut same = f.ir.clone();
    assert_eq!(
        deserialize(&mut same, &bytes, true),
        Err(DecodeError::DuplicateScope { counter: 1 })
    );

    let mut fresh = f.ir.clone();
    let root = deserialize(&mut fresh, &bytes, false).unwrap();
    let global = unit_scope(&fresh, root);
    assert_eq!(fresh.scopes[global].counter(), 5);
    assert_eq!(fresh.scopes.len(), 8);
    assert_eq!(entry_names(&fresh, global), ["m", "main"]);
}

#[test]
fn test_failed_decode_rolls_back_tables() {
    let f = ProgramFixture::new();
    let bytes = serialize(&f.ir, f.unit);
    let mut ir = f.ir.clone();
    let symbols = ir.symbol_nodes.len();

    // Every table is read before the unit's empty item list is cut off.
    assert!(matches!(
        deserialize(&mut ir, &bytes[..bytes.len() - 1], false),
        Err(DecodeError::Truncated { .. })
    ));
    assert_eq!(ir.scopes.len(), 4);
    assert_eq!(ir.symbol_nodes.len(), symbols);
    assert_eq!(plain(&ir, f.unit), plain(&f.ir, f.unit));

    // The counters the failed read took are free again.
    let root = deserialize(&mut ir, &bytes, false).unwrap();
    assert_eq!(ir.scopes[unit_scope(&ir, root)].counter(), 5);
}

/// A module whose table lists a function ahead of the entries it uses:
///
/// ```text
/// global
/// └── m: Module
///     ├── first: Function    x = first(); z = later()
///     ├── x: Variable
///     ├── z: Variable
///     └── later: Function
/// ```
struct ForwardRefs {
    ir: Asr,
    unit: UnitId,
    module_scope: ScopeId,
    first: SymbolId,
}

fn function(ir: &mut Asr, parent: ScopeId, name: &str) -> SymbolId {
    let symtab = ir.scopes.new_scope(Some(parent));
    let ret = ir.make_integer(Span::DUMMY, 4);
    let signature = ir.make_function_type(
        Span::DUMMY,
        Vec::new(),
        Some(ret),
        Abi::Source,
        Deftype::Implementation,
        false,
        false,
    );
    ir.make_function(
        span(0, 1),
        symtab,
        name.to_string(),
        signature,
        Vec::new(),
        Vec::new(),
        Vec::new(),
        None,
        Access::Public,
        false,
        false,
        None,
    )
}

/// `target = callee()`
fn assign_call(ir: &mut Asr, target: SymbolId, callee: SymbolId) -> StmtId {
    let ty = ir.make_integer(Span::DUMMY, 4);
    let call = ir.make_function_call(span(4, 10), callee, None, Vec::new(), ty, None, None);
    let target = ir.make_var(span(0, 1), target);
    ir.make_assignment(span(0, 10), target, call, None)
}

impl ForwardRefs {
    fn new() -> Self {
        let mut ir = Asr::new();
        let global = ir.scopes.new_scope(None);
        let module_scope = ir.scopes.new_scope(Some(global));

        let first = function(&mut ir, module_scope, "first");
        ir.scopes.add_symbol(module_scope, "first", first);
        let x = variable(&mut ir, module_scope, "x", Intent::Local);
        let z = variable(&mut ir, module_scope, "z", Intent::Local);
        let later = function(&mut ir, module_scope, "later");
        ir.scopes.add_symbol(module_scope, "later", later);

        let body = vec![assign_call(&mut ir, x, first), assign_call(&mut ir, z, later)];
        ir.symbol_mut(first).downcast_mut::<symbol::Function>().body = body;

        let module = ir.make_module(span(0, 20), module_scope, "m".to_string(), Vec::new(), false, false);
        ir.scopes.add_symbol(global, "m", module);
        let unit = ir.make_translation_unit(span(0, 20), global, Vec::new());
        ForwardRefs {
            ir,
            unit,
            module_scope,
            first,
        }
    }
}

/// Byte offsets of every occurrence of `needle` in `bytes`.
fn occurrences(bytes: &[u8], needle: &[u8]) -> Vec<usize> {
    bytes
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn test_forward_and_self_references_round_trip() {
    let f = ForwardRefs::new();
    assert_eq!(entry_names(&f.ir, f.module_scope), ["first", "x", "z", "later"]);

    let bytes = serialize(&f.ir, f.unit);
    let mut ir = Asr::new();
    let root = deserialize(&mut ir, &bytes, true).unwrap();
    let module_scope = owned(&ir, unit_scope(&ir, root), "m");
    // Functions are written after every other entry, in table order.
    assert_eq!(entry_names(&ir, module_scope), ["x", "z", "first", "later"]);

    let first = ir.scopes.lookup(module_scope, "first").unwrap();
    let later = ir.scopes.lookup(module_scope, "later").unwrap();
    let callee = |id: StmtId| {
        let value = ir.stmt(id).downcast::<stmt::Assignment>().value;
        ir.expr(value).downcast::<expr::FunctionCall>().name
    };
    let body = &ir.symbol(first).downcast::<symbol::Function>().body;
    // `first` calls itself and `later`: both were read as reserved slots
    // and filled once their entries arrived.
    assert_eq!(callee(body[0]), first);
    assert_eq!(callee(body[1]), later);
    assert_eq!(
        ir.scopes[owned(&ir, module_scope, "later")].owner(),
        Some(&NodeRef::Symbol(later))
    );

    assert_eq!(plain(&ir, first), plain(&f.ir, f.first));
    assert_eq!(serialize(&ir, root), bytes);
}

#[test]
fn test_reference_to_missing_entry_is_unresolved() {
    let f = ForwardRefs::new();
    let mut bytes = serialize(&f.ir, f.unit);
    // The call in `first`, then the entry key and name of `later`.
    let found = occurrences(&bytes, b"later");
    assert_eq!(found.len(), 3);
    for &at in &found[1..] {
        bytes[at..at + 5].copy_from_slice(b"other");
    }

    let mut ir = Asr::new();
    let err = deserialize(&mut ir, &bytes, true).unwrap_err();
    assert_eq!(err, DecodeError::UnresolvedSymbol { name: "later".to_string() });
    assert!(err.is_internal_fault());
    // The reserved slot and every table read so far are gone again.
    assert!(ir.scopes.is_empty());
    assert!(ir.symbol_nodes.is_empty());
}

#[test]
fn test_reference_tag_must_match_entry() {
    let f = ForwardRefs::new();
    let mut bytes = serialize(&f.ir, f.unit);
    // `[counter:u64][tag:u8][len:u64]later` is the call's symbol reference.
    let tag = occurrences(&bytes, b"later")[0] - 9;
    assert_eq!(bytes[tag], SymbolTag::Function as u8);
    bytes[tag] = SymbolTag::Variable as u8;

    let mut ir = Asr::new();
    assert_eq!(
        deserialize(&mut ir, &bytes, true),
        Err(DecodeError::SymbolTagMismatch {
            name: "later".to_string(),
            expected: "Variable",
            found: "Function",
        })
    );
}

#[test]
fn test_reference_into_unwritten_table_is_unresolved() {
    let mut f = ForwardRefs::new();
    // A table outside the unit: written as a counter nothing opens.
    let stray = f.ir.scopes.new_scope(None);
    let outside = variable(&mut f.ir, stray, "outside", Intent::Local);
    let value = f.ir.make_var(span(0, 7), outside);
    let print = f.ir.make_print(span(0, 7), vec![value], None, None);
    f.ir.symbol_mut(f.first).downcast_mut::<symbol::Function>().body.push(print);

    let bytes = serialize(&f.ir, f.unit);
    let mut ir = Asr::new();
    let err = deserialize(&mut ir, &bytes, true).unwrap_err();
    assert_eq!(err, DecodeError::UnresolvedScope { counter: f.ir.scopes[stray].counter() });
    assert!(err.is_internal_fault());
}

#[test]
fn test_serialize_is_deterministic() {
    let f = ProgramFixture::new();
    let bytes = serialize(&f.ir, f.unit);
    assert_eq!(serialize(&f.ir, f.unit), bytes);

    let (ir, root, global) = reload(&f);
    let mut relinked = ir.clone();
    relink_external_symbols(&mut relinked, global, None).unwrap();
    // The alias is not on the wire, so linking does not change the bytes.
    assert_eq!(serialize(&ir, root), bytes);
    assert_eq!(serialize(&relinked, root), bytes);
}

#[test]
fn test_duplicator_gates_procedure_calls() {
    let mut f = ProgramFixture::new();

    let mut gated = Duplicator::new(&mut f.ir);
    gated.allow_procedure_calls = false;
    assert_eq!(
        gated.duplicate_expr(f.call),
        Err(DuplicationRefused {
            variant: "FunctionCall",
            flag: "allow_procedure_calls",
        })
    );
    // Expressions without calls copy regardless.
    let sum = gated.duplicate_expr(f.sum).unwrap();
    assert_ne!(sum, f.sum);

    let copy = Duplicator::new(&mut f.ir).duplicate_expr(f.call).unwrap();
    assert_ne!(copy, f.call);
    assert_eq!(plain(&f.ir, copy), plain(&f.ir, f.call));
    let (original, copied) = (
        f.ir.expr(f.call).downcast::<expr::FunctionCall>(),
        f.ir.expr(copy).downcast::<expr::FunctionCall>(),
    );
    // Symbol references are shared, owned children are not.
    assert_eq!(copied.name, f.external);
    assert_eq!(copied.name, original.name);
    assert_ne!(copied.type_, original.type_);
    assert_ne!(copied.args[0].value, original.args[0].value);
}

#[test]
#[should_panic(expected = "duplication of `symbol` is not supported")]
fn test_duplicating_a_symbol_is_internal_error() {
    let mut f = ProgramFixture::new();
    let _ = Duplicator::new(&mut f.ir).duplicate(NodeRef::Symbol(f.function));
}

#[test]
#[should_panic(expected = "duplication of `unit` is not supported")]
fn test_duplicating_a_table_owner_is_internal_error() {
    let mut f = ProgramFixture::new();
    let _ = Duplicator::new(&mut f.ir).duplicate(NodeRef::Unit(f.unit));
}

#[test]
fn test_expr_type_and_value() {
    let f = ProgramFixture::new();
    let call = f.ir.expr(f.call).downcast::<expr::FunctionCall>();
    let two = call.args[0].value.unwrap();

    assert_eq!(f.ir.expr_value(two), Some(two));
    assert_eq!(f.ir.expr_value(f.sum), None);
    assert_eq!(f.ir.expr_value(f.call), None);
    assert_eq!(f.ir.expr_type(f.call), Some(call.type_));
    assert!(f.ir.ttype(f.ir.expr_type(f.sum).unwrap()).is_a::<ttype::Integer>());

    let sum = f.ir.expr(f.sum).downcast::<expr::IntegerBinOp>();
    assert_eq!(f.ir.expr_type(sum.left), None, "`Var` carries no type");
}

#[test]
fn test_field_mask_of_optional_value() {
    let mut f = ProgramFixture::new();
    let folded = f.ir.expr(f.sum).field_mask();
    let ty = f.ir.make_integer(span(0, 0), 4);
    let three = f.ir.make_integer_constant(span(0, 0), 3, ty);
    f.ir.expr_mut(f.sum).downcast_mut::<expr::IntegerBinOp>().value = Some(three);

    let bit = f.ir.expr(f.sum).field_mask() ^ folded;
    assert_eq!(Expr::field_name(bit.trailing_zeros()), Some("value"));
    assert_eq!(f.ir.expr_value(f.sum), Some(three));
}

/// Counts variables and tables reached by the generic walk.
#[derive(Default)]
struct Census {
    variables: Vec<String>,
    scopes: usize,
}

impl WalkVisitor for Census {
    fn visit_variable(&mut self, ir: &Asr, _id: SymbolId, x: &symbol::Variable) {
        self.variables.push(x.name.clone());
        walk::variable(self, ir, x);
    }

    fn visit_scope(&mut self, ir: &Asr, scope: ScopeId) {
        self.scopes += 1;
        walk::scope(self, ir, scope);
    }
}

#[test]
fn test_walk_enters_every_table() {
    let f = ProgramFixture::new();
    let mut census = Census::default();
    census.visit_node(&f.ir, f.unit.into());
    assert_eq!(census.scopes, 4);
    assert_eq!(census.variables, ["x", "a", "r", "y"]);
}

/// Replaces procedure calls by a constant and remembers the current scope
/// at every slot it is offered.
#[derive(Default)]
struct ScopedCalls {
    current: Option<ScopeId>,
    seen: Vec<(ExprTag, Option<ScopeId>)>,
}

impl CallReplacerOnExpressions for ScopedCalls {
    fn call_replacer(&mut self, ir: &mut Asr, slot: &mut ExprId) {
        let node = ir.expr(*slot);
        self.seen.push((node.tag(), self.current));
        if let Some(call) = node.try_downcast::<expr::FunctionCall>() {
            let (span, ty) = (node.span, call.type_);
            *slot = ir.make_integer_constant(span, 42, ty);
        }
    }

    fn set_current_scope(&mut self, scope: Option<ScopeId>) -> Option<ScopeId> {
        std::mem::replace(&mut self.current, scope)
    }
}

#[test]
fn test_call_replacer_tracks_scope() {
    let mut f = ProgramFixture::new();
    let mut calls = ScopedCalls::default();
    calls.visit_node(&mut f.ir, f.unit.into());

    assert_eq!(calls.current, None);
    assert!(calls.seen.contains(&(ExprTag::FunctionCall, Some(f.program_scope))));
    assert!(calls.seen.contains(&(ExprTag::IntegerBinOp, Some(f.function_scope))));
    assert!(calls.seen.iter().all(|(_, scope)| scope.is_some()));

    let program = f.ir.scopes.lookup(f.global, "main").unwrap();
    let body = &f.ir.symbol(program).downcast::<symbol::Program>().body;
    let assign = f.ir.stmt(body[0]).downcast::<stmt::Assignment>();
    assert_eq!(
        plain(&f.ir, assign.value),
        "(IntegerConstant 42 (Integer 4))"
    );
}

#[test]
fn test_dump_json_symbols() {
    let f = ProgramFixture::new();
    let json = dump_json(&f.ir, f.call, None, false);
    assert!(json.starts_with(r#"{"node":"FunctionCall","fields":{"name":"f (SymbolTable4)""#), "{json}");

    let unit = dump_json(&f.ir, f.unit, None, false);
    assert!(
        unit.contains(r#"{"node":"SymbolTable","counter":1,"symbols":{"m":"#),
        "{unit}"
    );
}
