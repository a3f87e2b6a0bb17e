//! Tests for the generated `calc` library.
//!
//! These verify:
//! - Factories, tags and downcasts
//! - Field masks
//! - Dispatch and walk visitors
//! - Expression and statement replacers, and the call-replacer walk
//! - Deep copy
//! - Pickle, tree and JSON renderings
//! - Binary round trips, decode errors, and round-trip properties

use asdl_ir::calc::*;
use asdl_rt::{strip_colors, DecodeError, LineIndex, PickleOptions, Span, FORMAT_VERSION};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::span;

/// `Add(IntConst(3), IntConst(4))`
fn three_plus_four(ir: &mut Calc) -> ExprId {
    let three = ir.make_int_const(span(0, 1), 3);
    let four = ir.make_int_const(span(4, 5), 4);
    ir.make_add(span(0, 5), three, four)
}

/// `let x = 1 + f(2, k=true); print(x, -1.5; sep="|")` inside a block.
fn program(ir: &mut Calc) -> StmtId {
    let one = ir.make_int_const(span(8, 9), 1);
    let two = ir.make_int_const(span(14, 15), 2);
    let yes = ir.make_bool_const(span(19, 23), true);
    let call = ir.make_call(
        span(12, 24),
        "f".to_string(),
        vec![
            Arg { span: span(14, 15), keyword: None, value: two },
            Arg { span: span(17, 23), keyword: Some("k".to_string()), value: yes },
        ],
    );
    let sum = ir.make_add(span(8, 24), one, call);
    let let_x = ir.make_let(span(0, 24), "x".to_string(), sum);
    let x = ir.make_int_const(span(32, 33), 7);
    let half = ir.make_float_const(span(36, 39), 1.5);
    let neg = ir.make_neg(span(35, 39), half);
    let print = ir.make_print(span(26, 48), vec![x, neg], Some("|".to_string()));
    ir.make_block(span(0, 48), vec![let_x, print])
}

fn plain(ir: &Calc, node: impl Into<NodeRef>) -> String {
    pickle(ir, node, PickleOptions::PLAIN)
}

fn decode(bytes: &[u8]) -> (Calc, NodeRef) {
    let mut ir = Calc::new();
    let root = deserialize(&mut ir, bytes, false).unwrap();
    (ir, root)
}

#[test]
fn test_add_round_trip_and_pickle() {
    let mut ir = Calc::new();
    let root = three_plus_four(&mut ir);
    let bytes = serialize(&ir, root);

    let (decoded, node) = decode(&bytes);
    let NodeRef::Expr(id) = node else {
        panic!("root should be an expr, got {node:?}");
    };
    let add = decoded.expr(id).downcast::<expr::Add>();
    assert_eq!(decoded.expr(add.left).downcast::<expr::IntConst>().n, 3);
    assert_eq!(decoded.expr(add.right).downcast::<expr::IntConst>().n, 4);
    assert_eq!(decoded.expr(id).span, span(0, 5));

    assert_eq!(plain(&decoded, id), "(Add (IntConst 3) (IntConst 4))");
}

#[test]
fn test_tags_and_downcasts() {
    let mut ir = Calc::new();
    let id = three_plus_four(&mut ir);
    let node = ir.expr(id);

    assert_eq!(node.tag(), ExprTag::Add);
    assert!(node.is_a::<expr::Add>());
    assert!(!node.is_a::<expr::Mul>());
    assert!(node.try_downcast::<expr::IntConst>().is_none());
    assert_eq!(NodeRef::from(id).tag(), NodeTag::Expr);
    assert_eq!(ExprTag::from_u8(ExprTag::Add as u8), Some(ExprTag::Add));
    assert_eq!(ExprTag::from_u8(200), None);
    assert_eq!(Cmp::ALL.map(Cmp::name), ["Lt", "Eq", "Gt"]);
}

#[test]
#[should_panic(expected = "`expr` node downcast to `Mul` but its tag is `Add`")]
fn test_wrong_downcast_is_internal_error() {
    let mut ir = Calc::new();
    let id = three_plus_four(&mut ir);
    let _ = ir.expr(id).downcast::<expr::Mul>();
}

#[test]
fn test_field_masks() {
    let mut ir = Calc::new();
    let x = ir.make_int_const(Span::DUMMY, 1);
    let bare = ir.make_print(Span::DUMMY, vec![x], None);
    let with_sep = ir.make_print(Span::DUMMY, vec![x], Some(",".to_string()));

    let bare_mask = ir.stmt(bare).field_mask();
    let sep_bit = ir.stmt(with_sep).field_mask() ^ bare_mask;
    assert_eq!(sep_bit.count_ones(), 1);
    assert_eq!(Stmt::field_name(sep_bit.trailing_zeros()), Some("sep"));
    assert_eq!(Stmt::field_name(bare_mask.trailing_zeros()), Some("values"));
    assert_eq!(Stmt::field_name(127), None);

    let arg = Arg { span: Span::DUMMY, keyword: None, value: x };
    assert_eq!(arg.field_mask(), 0b10);
    assert_eq!(Arg::field_name(0), Some("keyword"));
}

/// Evaluates integer arithmetic; every other variant is left to the
/// loud defaults.
struct Eval {
    stack: Vec<i64>,
}

impl Visitor for Eval {
    fn visit_int_const(&mut self, _ir: &Calc, _id: ExprId, x: &expr::IntConst) {
        self.stack.push(x.n);
    }

    fn visit_add(&mut self, ir: &Calc, _id: ExprId, x: &expr::Add) {
        self.visit_expr(ir, x.left);
        self.visit_expr(ir, x.right);
        let (b, a) = (self.stack.pop().unwrap(), self.stack.pop().unwrap());
        self.stack.push(a + b);
    }

    fn visit_neg(&mut self, ir: &Calc, _id: ExprId, x: &expr::Neg) {
        self.visit_expr(ir, x.operand);
        let a = self.stack.pop().unwrap();
        self.stack.push(-a);
    }
}

#[test]
fn test_dispatch_visitor() {
    let mut ir = Calc::new();
    let sum = three_plus_four(&mut ir);
    let neg = ir.make_neg(Span::DUMMY, sum);
    let mut eval = Eval { stack: Vec::new() };
    eval.visit_node(&ir, neg.into());
    assert_eq!(eval.stack, [-7]);
}

#[test]
#[should_panic(expected = "visitor for `Mul` is not implemented")]
fn test_dispatch_visitor_default_fails_loudly() {
    let mut ir = Calc::new();
    let sum = three_plus_four(&mut ir);
    let two = ir.make_int_const(Span::DUMMY, 2);
    let product = ir.make_mul(Span::DUMMY, sum, two);
    Eval { stack: Vec::new() }.visit_expr(&ir, product);
}

#[derive(Default)]
struct Collect {
    ints: Vec<i64>,
    keywords: Vec<String>,
}

impl WalkVisitor for Collect {
    fn visit_int_const(&mut self, _ir: &Calc, _id: ExprId, x: &expr::IntConst) {
        self.ints.push(x.n);
    }

    fn visit_arg(&mut self, ir: &Calc, x: &Arg) {
        self.keywords.extend(x.keyword.clone());
        walk::arg(self, ir, x);
    }
}

#[test]
fn test_walk_visits_every_owned_child() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let mut collect = Collect::default();
    collect.visit_stmt(&ir, block);
    assert_eq!(collect.ints, [1, 2, 7]);
    assert_eq!(collect.keywords, ["k"]);
}

/// Scales every integer constant by ten.
struct Scale;

impl ExprReplacer for Scale {
    fn replace_int_const(&mut self, ir: &mut Calc, slot: &mut ExprId) {
        let node = ir.expr(*slot);
        let (span, n) = (node.span, node.downcast::<expr::IntConst>().n);
        *slot = ir.make_int_const(span, n * 10);
    }
}

#[test]
fn test_expr_replacer_rewrites_slots() {
    let mut ir = Calc::new();
    let original = three_plus_four(&mut ir);
    let mut root = original;
    Scale.replace_expr(&mut ir, &mut root);

    assert_eq!(root, original, "the root is not an IntConst, so its slot keeps its id");
    assert_eq!(plain(&ir, root), "(Add (IntConst 30) (IntConst 40))");
}

#[test]
fn test_expr_replacer_reaches_records() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let StmtKind::Block(x) = &ir.stmt(block).kind else {
        panic!("expected a block");
    };
    let mut value = ir.stmt(x.body[0]).downcast::<stmt::Let>().value;
    Scale.replace_expr(&mut ir, &mut value);
    assert_eq!(
        plain(&ir, value),
        "(Add (IntConst 10) (Call f [(() (IntConst 20)) (k (BoolConst .true.))]))"
    );
}

/// Drops every `Print` statement.
struct DropPrints;

impl StmtReplacer for DropPrints {
    fn transform_stmts(&mut self, ir: &mut Calc, slots: &mut Vec<StmtId>) {
        slots.retain(|&id| !ir.stmt(id).is_a::<stmt::Print>());
        stmt_replace::transform_stmts(self, ir, slots);
    }
}

#[test]
fn test_stmt_replacer_edits_sequences() {
    let mut ir = Calc::new();
    let mut block = program(&mut ir);
    DropPrints.replace_stmt(&mut ir, &mut block);
    let StmtKind::Block(x) = &ir.stmt(block).kind else {
        panic!("expected a block");
    };
    assert_eq!(x.body.len(), 1);
    assert!(ir.stmt(x.body[0]).is_a::<stmt::Let>());
}

/// Replaces each call by the constant 0 and counts the slots it was
/// offered.
#[derive(Default)]
struct InlineCalls {
    slots: usize,
    statement_lists: usize,
}

impl CallReplacerOnExpressions for InlineCalls {
    fn call_replacer(&mut self, ir: &mut Calc, slot: &mut ExprId) {
        self.slots += 1;
        if ir.expr(*slot).is_a::<expr::Call>() {
            let span = ir.expr(*slot).span;
            *slot = ir.make_int_const(span, 0);
        }
    }

    fn transform_stmts(&mut self, ir: &mut Calc, stmts: &mut Vec<StmtId>) {
        self.statement_lists += 1;
        call_replace::transform_stmts(self, ir, stmts);
    }
}

#[test]
fn test_call_replacer_walk() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let mut inline = InlineCalls::default();
    inline.visit_stmt(&mut ir, block);

    assert_eq!(inline.statement_lists, 1);
    // let value, its two operands, print's two values and the negated float
    assert_eq!(inline.slots, 6);
    let text = plain(&ir, block);
    assert!(!text.contains("Call"), "{text}");
    assert!(text.contains("(Add (IntConst 1) (IntConst 0))"), "{text}");
}

#[test]
fn test_duplicate_is_independent() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let before = plain(&ir, block);

    let copy = Duplicator::new(&mut ir).duplicate(block.into()).unwrap();
    let NodeRef::Stmt(copy) = copy else {
        panic!("copy of a stmt should be a stmt");
    };
    assert_ne!(copy, block);
    assert_eq!(plain(&ir, copy), before);

    // Rewrite every constant of the copy; the original must not move.
    let mut slot = copy;
    let mut scale = Scale;
    StmtReplacer::replace_stmt(&mut StmtScale(&mut scale), &mut ir, &mut slot);
    assert_eq!(plain(&ir, block), before);
    assert_ne!(plain(&ir, copy), before);
}

/// Pushes [`Scale`] into the expressions under a statement.
struct StmtScale<'a>(&'a mut Scale);

impl StmtReplacer for StmtScale<'_> {
    fn replace_let(&mut self, ir: &mut Calc, slot: &mut StmtId) {
        let mut value = ir.stmt(*slot).downcast::<stmt::Let>().value;
        self.0.replace_expr(ir, &mut value);
        ir.stmt_mut(*slot).downcast_mut::<stmt::Let>().value = value;
    }

    fn replace_print(&mut self, ir: &mut Calc, slot: &mut StmtId) {
        let mut values = ir.stmt(*slot).downcast::<stmt::Print>().values.clone();
        self.0.transform_exprs(ir, &mut values);
        ir.stmt_mut(*slot).downcast_mut::<stmt::Print>().values = values;
    }
}

#[test]
fn test_pickle_presentation_keeps_tokens() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let flat = plain(&ir, block);
    assert_eq!(flat, plain(&ir, block));

    let fancy = pickle(&ir, block, PickleOptions { use_colors: true, indent: true });
    assert_ne!(fancy, flat);
    let collapse = |text: &str| text.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(collapse(&strip_colors(&fancy)), flat);
    assert!(flat.starts_with("(Block [(Let x (Add (IntConst 1)"), "{flat}");
    assert!(flat.ends_with("\"|\")])"), "{flat}");
}

#[test]
fn test_print_tree() {
    let mut ir = Calc::new();
    let root = three_plus_four(&mut ir);
    let expected = "\
Add
|-left=IntConst
| └-n=3
└-right=IntConst
  └-n=4
";
    assert_eq!(print_tree(&ir, root, false), expected);
    assert_eq!(strip_colors(&print_tree(&ir, root, true)), expected);
}

#[test]
fn test_dump_json() {
    let mut ir = Calc::new();
    let four = ir.make_int_const(span(4, 5), 4);
    assert_eq!(
        dump_json(&ir, four, None, false),
        r#"{"node":"IntConst","fields":{"n":4},"loc":{"first":4,"last":5}}"#
    );

    let lines = LineIndex::new("calc.txt", "let\nx = 4\n");
    let located = dump_json(&ir, four, Some(&lines), false);
    assert!(located.contains(r#""first_filename":"calc.txt","first_line":2"#), "{located}");
    assert!(dump_json(&ir, four, None, true).contains('\n'));
}

#[test]
fn test_decode_errors() {
    let mut ir = Calc::new();
    let root = three_plus_four(&mut ir);
    let bytes = serialize(&ir, root);
    let mut scratch = Calc::new();

    assert_eq!(deserialize(&mut scratch, b"", false), Err(DecodeError::BadMagic));
    assert_eq!(deserialize(&mut scratch, b"ASDX\x01", false), Err(DecodeError::BadMagic));

    let mut wrong_version = bytes.clone();
    wrong_version[4] = FORMAT_VERSION + 1;
    assert_eq!(
        deserialize(&mut scratch, &wrong_version, false),
        Err(DecodeError::VersionMismatch { expected: FORMAT_VERSION, found: FORMAT_VERSION + 1 })
    );

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(
        deserialize(&mut scratch, &trailing, false),
        Err(DecodeError::TrailingBytes { count: 1 })
    );

    let truncated = &bytes[..bytes.len() - 1];
    assert!(matches!(
        deserialize(&mut scratch, truncated, false),
        Err(DecodeError::Truncated { .. })
    ));

    let mut bad_tag = bytes[..5].to_vec();
    bad_tag.push(9);
    assert_eq!(
        deserialize(&mut scratch, &bad_tag, false),
        Err(DecodeError::UnknownTag { union: "node", tag: 9 })
    );

    // Root tag says `expr`, variant tag is out of range.
    let mut bad_variant = bytes[..5].to_vec();
    bad_variant.extend([NodeTag::Expr as u8, 99]);
    assert_eq!(
        deserialize(&mut scratch, &bad_variant, false),
        Err(DecodeError::UnknownTag { union: "expr", tag: 99 })
    );
}

#[test]
fn test_failed_decode_leaves_container_unchanged() {
    let mut ir = Calc::new();
    let block = program(&mut ir);
    let bytes = serialize(&ir, block);
    let before = (ir.expr_nodes.len(), ir.stmt_nodes.len());

    // The `Let` and its operands are allocated before the cut is reached.
    let truncated = &bytes[..bytes.len() - 1];
    assert!(matches!(
        deserialize(&mut ir, truncated, false),
        Err(DecodeError::Truncated { .. })
    ));
    assert_eq!((ir.expr_nodes.len(), ir.stmt_nodes.len()), before);

    let root = deserialize(&mut ir, &bytes, false).unwrap();
    assert_eq!(plain(&ir, root), plain(&ir, block));
}

const DEEP: usize = 100_000;

/// `-(-(...-(0)...))`, `depth` negations deep.
fn neg_chain(ir: &mut Calc, depth: usize) -> ExprId {
    let mut id = ir.make_int_const(Span::DUMMY, 0);
    for _ in 0..depth {
        id = ir.make_neg(Span::DUMMY, id);
    }
    id
}

/// Counts negations through the walk defaults.
#[derive(Default)]
struct Negations(usize);

impl WalkVisitor for Negations {
    fn visit_neg(&mut self, ir: &Calc, _id: ExprId, x: &expr::Neg) {
        self.0 += 1;
        walk::neg(self, ir, x);
    }
}

#[test]
fn test_deep_trees_do_not_overflow() {
    let mut ir = Calc::new();
    let root = neg_chain(&mut ir, DEEP);

    let bytes = serialize(&ir, root);
    let (decoded, decoded_root) = decode(&bytes);
    assert_eq!(serialize(&decoded, decoded_root), bytes);

    let mut negations = Negations::default();
    negations.visit_expr(&ir, root);
    assert_eq!(negations.0, DEEP);

    let copy = Duplicator::new(&mut ir).duplicate_expr(root).unwrap();
    let mut slot = copy;
    Scale.replace_expr(&mut ir, &mut slot);
    let mut inline = InlineCalls::default();
    inline.visit_expr(&mut ir, copy);
    assert_eq!(inline.slots, DEEP);

    let text = plain(&ir, copy);
    assert_eq!(text.matches("(Neg").count(), DEEP);
    assert!(text.ends_with(&format!("(IntConst 0){}", ")".repeat(DEEP))));
}

#[test]
fn test_deep_crafted_payload_is_an_error() {
    let mut bytes = b"ASDL".to_vec();
    bytes.extend([FORMAT_VERSION, NodeTag::Expr as u8]);
    for _ in 0..DEEP {
        bytes.push(ExprTag::Neg as u8);
        bytes.extend([0; 16]);
    }

    let mut ir = Calc::new();
    assert_eq!(
        deserialize(&mut ir, &bytes, false),
        Err(DecodeError::Truncated { offset: bytes.len() })
    );
    assert!(ir.expr_nodes.is_empty());
}

/// A calc expression outside any container, for property tests.
#[derive(Clone, Debug)]
enum Tree {
    Int(i64),
    Float(f64),
    Bool(bool),
    Add(Box<Tree>, Box<Tree>),
    Mul(Box<Tree>, Box<Tree>),
    Neg(Box<Tree>),
    Compare(Box<Tree>, Cmp, Box<Tree>),
    Call(String, Vec<(Option<String>, Tree)>),
}

fn tree() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Tree::Int),
        (-1.0e9..1.0e9f64).prop_map(Tree::Float),
        any::<bool>().prop_map(Tree::Bool),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Tree::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Tree::Mul(Box::new(a), Box::new(b))),
            inner.clone().prop_map(|a| Tree::Neg(Box::new(a))),
            (inner.clone(), prop::sample::select(Cmp::ALL.to_vec()), inner.clone())
                .prop_map(|(a, op, b)| Tree::Compare(Box::new(a), op, Box::new(b))),
            ("[a-z]{1,6}", prop::collection::vec((prop::option::of("[a-z]{1,3}"), inner), 0..3))
                .prop_map(|(f, args)| Tree::Call(f, args)),
        ]
    })
}

fn build(ir: &mut Calc, tree: &Tree, at: &mut u32) -> ExprId {
    *at += 1;
    let span = span(*at, *at + 1);
    match tree {
        Tree::Int(n) => ir.make_int_const(span, *n),
        Tree::Float(x) => ir.make_float_const(span, *x),
        Tree::Bool(b) => ir.make_bool_const(span, *b),
        Tree::Add(a, b) => {
            let (a, b) = (build(ir, a, at), build(ir, b, at));
            ir.make_add(span, a, b)
        }
        Tree::Mul(a, b) => {
            let (a, b) = (build(ir, a, at), build(ir, b, at));
            ir.make_mul(span, a, b)
        }
        Tree::Neg(a) => {
            let a = build(ir, a, at);
            ir.make_neg(span, a)
        }
        Tree::Compare(a, op, b) => {
            let (a, b) = (build(ir, a, at), build(ir, b, at));
            ir.make_compare(span, a, *op, b)
        }
        Tree::Call(f, args) => {
            let args = args
                .iter()
                .map(|(keyword, value)| Arg {
                    span,
                    keyword: keyword.clone(),
                    value: build(ir, value, at),
                })
                .collect();
            ir.make_call(span, f.clone(), args)
        }
    }
}

proptest! {
    #[test]
    fn prop_round_trip(tree in tree(), sep in prop::option::of(".{0,4}")) {
        let mut ir = Calc::new();
        let mut at = 0;
        let value = build(&mut ir, &tree, &mut at);
        let print = ir.make_print(span(0, at + 1), vec![value, value], sep);
        let root = ir.make_block(Span::DUMMY, vec![print]);

        let bytes = serialize(&ir, root);
        let (decoded, node) = decode(&bytes);
        prop_assert_eq!(node.tag(), NodeTag::Stmt);
        prop_assert_eq!(plain(&decoded, node), plain(&ir, root));
        prop_assert_eq!(dump_json(&decoded, node, None, false), dump_json(&ir, root, None, false));
        // Re-encoding the decoded tree is byte for byte the same.
        prop_assert_eq!(serialize(&decoded, node), bytes);
    }

    #[test]
    fn prop_duplicate_renders_identically(tree in tree()) {
        let mut ir = Calc::new();
        let mut at = 0;
        let root = build(&mut ir, &tree, &mut at);
        let copy = Duplicator::new(&mut ir).duplicate_expr(root).unwrap();
        prop_assert_eq!(plain(&ir, copy), plain(&ir, root));
        prop_assert_eq!(print_tree(&ir, copy, false), print_tree(&ir, root, false));
    }
}
