//! Tests for the generated `ast` library: union attributes, nested
//! records and statement rewriting through `select case`.

use asdl_ir::ast::*;
use asdl_rt::{PickleOptions, Span};
use pretty_assertions::assert_eq;

use crate::common::span;

fn plain(ir: &Ast, node: impl Into<NodeRef>) -> String {
    pickle(ir, node, PickleOptions::PLAIN)
}

fn name(ir: &mut Ast, id: &str) -> ExprId {
    ir.make_name(Span::DUMMY, id.to_string(), Vec::new())
}

fn num(ir: &mut Ast, n: i64) -> ExprId {
    ir.make_num(Span::DUMMY, n, None)
}

/// ```fortran
/// program main
///   integer :: x = 1
///   10 print *, 1 + x
/// end program
/// ```
fn program(ir: &mut Ast) -> (ProgramUnitId, StmtId) {
    let int = ir.make_attr_type(span(11, 18), DeclType::TypeInteger, Vec::new(), None);
    let init = num(ir, 1);
    let decl = ir.make_declaration(
        span(11, 29),
        Some(int),
        Vec::new(),
        vec![VarSym {
            span: span(22, 29),
            name: "x".to_string(),
            dims: Vec::new(),
            initializer: Some(init),
        }],
    );
    let one = num(ir, 1);
    let x = name(ir, "x");
    let sum = ir.make_bin_op(span(44, 49), one, Binop::Add, x);
    let print = ir.make_print(span(32, 49), 10, None, vec![sum]);
    let main = ir.make_program(
        span(0, 61),
        "main".to_string(),
        Vec::new(),
        vec![decl],
        vec![print],
        Vec::new(),
    );
    (main, print)
}

#[test]
fn test_attributes_follow_fields() {
    let mut ir = Ast::new();
    let (main, print) = program(&mut ir);

    assert_eq!(ir.stmt(print).label, 10);
    assert_eq!(
        plain(&ir, print),
        "(Print () [(BinOp (Num 1 ()) Add (Name x []))] 10)"
    );
    assert_eq!(
        plain(&ir, main),
        "(Program main [] [(Declaration (AttrType TypeInteger [] ()) [] [(x [] (Num 1 ()))])] \
         [(Print () [(BinOp (Num 1 ()) Add (Name x []))] 10)] [])"
    );

    // The attribute takes the first bit of the union and is always set.
    assert_eq!(Stmt::field_name(0), Some("label"));
    assert_eq!(ir.stmt(print).field_mask() & 1, 1);
}

#[test]
fn test_round_trip() {
    let mut ir = Ast::new();
    let (main, _) = program(&mut ir);
    let unit = ir.make_translation_unit(span(0, 61), vec![main.into()]);

    let bytes = serialize(&ir, unit);
    let mut decoded = Ast::new();
    let root = deserialize(&mut decoded, &bytes, false).unwrap();
    assert_eq!(plain(&decoded, root), plain(&ir, unit));
    assert_eq!(decoded.span(root), span(0, 61));
    assert_eq!(print_tree(&decoded, root, false), print_tree(&ir, unit, false));
}

#[test]
fn test_print_tree_of_attributes() {
    let mut ir = Ast::new();
    let exit = ir.make_exit(span(0, 4), 20, Some("outer".to_string()));
    assert_eq!(
        print_tree(&ir, exit, false),
        "Exit\n|-stmt_name=outer\n└-label=20\n"
    );
}

/// Drops `exit` statements wherever a statement list appears.
struct NoExits;

impl StmtReplacer for NoExits {
    fn transform_stmts(&mut self, ir: &mut Ast, slots: &mut Vec<StmtId>) {
        slots.retain(|&id| !ir.stmt(id).is_a::<stmt::Exit>());
        stmt_replace::transform_stmts(self, ir, slots);
    }
}

#[test]
fn test_stmt_replacer_passes_through_cases() {
    let mut ir = Ast::new();
    let test = name(&mut ir, "k");
    let exit = ir.make_exit(Span::DUMMY, 0, None);
    let stop = ir.make_stop(Span::DUMMY, 0, None);
    let one = num(&mut ir, 1);
    let case = ir.make_case(Span::DUMMY, vec![one], vec![exit, stop]);
    let fallback = ir.make_exit(Span::DUMMY, 0, None);
    let mut select = ir.make_select(Span::DUMMY, 0, None, test, vec![case], vec![fallback]);

    NoExits.replace_stmt(&mut ir, &mut select);
    assert_eq!(
        plain(&ir, select),
        "(Select () (Name k []) [(Case [(Num 1 ())] [(Stop () 0)])] [] 0)"
    );
}

#[test]
fn test_duplicate_nested_records() {
    let mut ir = Ast::new();
    let (main, _) = program(&mut ir);
    let copy = Duplicator::new(&mut ir).duplicate_program_unit(main).unwrap();
    assert_eq!(plain(&ir, copy), plain(&ir, main));

    let decl_of = |ir: &Ast, unit: ProgramUnitId| ir.program_unit(unit).downcast::<program_unit::Program>().decls[0];
    let initializer = |ir: &Ast, unit: ProgramUnitId| {
        let decl = ir.decl(decl_of(ir, unit)).downcast::<decl::Declaration>();
        decl.syms[0].initializer
    };
    assert_ne!(decl_of(&ir, copy), decl_of(&ir, main));
    assert_ne!(initializer(&ir, copy), initializer(&ir, main));
}
