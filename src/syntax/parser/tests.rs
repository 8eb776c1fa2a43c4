use super::*;
use crate::syntax::ast::*;
use crate::syntax::scanner::scan;
use crate::types::{NumericType, TypeContext};

fn tokens(source: &str) -> Vec<Token> {
    let ctx = TypeContext::new(NumericType::Float);
    let mut handler = ErrorHandler::new("test");
    let tokens = scan(source, &ctx, &mut handler);
    assert!(!handler.has_error());
    tokens
}

fn expr(source: &str) -> Expr {
    let mut handler = ErrorHandler::new("test");
    let parsed = parse_expression(tokens(source), &mut handler);
    assert!(!handler.has_error(), "{:?}", handler.diagnostics());
    parsed.unwrap()
}

fn stmts(source: &str) -> Vec<Spanned<Stmt>> {
    let mut handler = ErrorHandler::new("test");
    let parsed = parse_block_item_list(tokens(source), &mut handler);
    assert!(!handler.has_error(), "{:?}", handler.diagnostics());
    parsed
}

fn binary(e: &Expr) -> (BinaryOp, &Expr, &Expr) {
    match &e.kind {
        ExprKind::Binary { op, lhs, rhs } => (*op, lhs, rhs),
        other => panic!("expected binary, got {:?}", other),
    }
}

fn ident(e: &Expr) -> &str {
    match &e.kind {
        ExprKind::Identifier(name) => name,
        other => panic!("expected identifier, got {:?}", other),
    }
}

#[test]
fn test_multiplicative_binds_tighter() {
    let e = expr("a + b * c");
    let (op, lhs, rhs) = binary(&e);
    assert_eq!(op, BinaryOp::Add);
    assert_eq!(ident(lhs), "a");
    assert_eq!(binary(rhs).0, BinaryOp::Mul);
}

#[test]
fn test_left_associative() {
    let e = expr("a - b - c");
    let (op, lhs, rhs) = binary(&e);
    assert_eq!(op, BinaryOp::Sub);
    assert_eq!(binary(lhs).0, BinaryOp::Sub);
    assert_eq!(ident(rhs), "c");
}

#[test]
fn test_bitwise_precedence_ladder() {
    let e = expr("a | b ^ c & d");
    let (op, _, rhs) = binary(&e);
    assert_eq!(op, BinaryOp::BitOr);
    let (op, _, rhs) = binary(rhs);
    assert_eq!(op, BinaryOp::BitXor);
    assert_eq!(binary(rhs).0, BinaryOp::BitAnd);
}

#[test]
fn test_shift_binds_tighter_than_relational() {
    let e = expr("a << 1 < b");
    let (op, lhs, _) = binary(&e);
    assert_eq!(op, BinaryOp::Lt);
    assert_eq!(binary(lhs).0, BinaryOp::Shl);
}

#[test]
fn test_logical_and_binds_tighter_than_or() {
    let e = expr("a || b && c == d");
    let (op, _, rhs) = binary(&e);
    assert_eq!(op, BinaryOp::LogicalOr);
    let (op, _, rhs) = binary(rhs);
    assert_eq!(op, BinaryOp::LogicalAnd);
    assert_eq!(binary(rhs).0, BinaryOp::Eq);
}

#[test]
fn test_conditional_below_logical_or() {
    let e = expr("a || b ? c : d ? e : f");
    match &e.kind {
        ExprKind::Conditional {
            condition,
            else_branch,
            ..
        } => {
            assert_eq!(binary(condition).0, BinaryOp::LogicalOr);
            assert!(matches!(else_branch.kind, ExprKind::Conditional { .. }));
        }
        other => panic!("expected conditional, got {:?}", other),
    }
}

#[test]
fn test_assignment_right_associative() {
    let e = expr("a = b += c");
    match &e.kind {
        ExprKind::Assignment { op, value, .. } => {
            assert_eq!(*op, AssignOp::Assign);
            match &value.kind {
                ExprKind::Assignment { op, .. } => {
                    assert_eq!(*op, AssignOp::Compound(BinaryOp::Add))
                }
                other => panic!("expected assignment, got {:?}", other),
            }
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_casts() {
    match expr("(const int*)x").kind {
        ExprKind::Cast { ty, .. } => {
            assert_eq!(ty.specifiers, vec!["int".to_string()]);
            assert!(ty.is_const);
            assert_eq!(ty.pointer, Some(PointerSpec { is_const: false }));
        }
        other => panic!("expected cast, got {:?}", other),
    }
    match expr("(int * const)x").kind {
        ExprKind::Cast { ty, .. } => {
            assert!(!ty.is_const);
            assert_eq!(ty.pointer, Some(PointerSpec { is_const: true }));
        }
        other => panic!("expected cast, got {:?}", other),
    }
    match expr("(scalar)x").kind {
        ExprKind::Cast { ty, .. } => assert_eq!(ty.specifiers, vec!["scalar".to_string()]),
        other => panic!("expected cast, got {:?}", other),
    }
}

#[test]
fn test_unary_and_postfix() {
    match expr("-x++").kind {
        ExprKind::Unary { op, operand } => {
            assert_eq!(op, UnaryOp::Minus);
            assert!(matches!(operand.kind, ExprKind::PostfixIncDec { .. }));
        }
        other => panic!("expected unary, got {:?}", other),
    }
    match expr("f(a, b[2])").kind {
        ExprKind::Call { callee, args } => {
            assert_eq!(ident(&callee), "f");
            assert_eq!(args.len(), 2);
            assert!(matches!(args[1].kind, ExprKind::Subscript { .. }));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_literals() {
    match expr("1.5f").kind {
        ExprKind::Literal(Literal::Number { lexeme, ty }) => {
            assert_eq!(lexeme, "1.5f");
            assert_eq!(ty, NumericType::Float);
        }
        other => panic!("expected literal, got {:?}", other),
    }
    assert!(matches!(
        expr("true").kind,
        ExprKind::Literal(Literal::Bool(true))
    ));
}

#[test]
fn test_node_ids_unique() {
    let e = expr("a + b * c");
    let (_, lhs, rhs) = binary(&e);
    let (_, rl, rr) = binary(rhs);
    let mut ids = vec![e.id, lhs.id, rhs.id, rl.id, rr.id];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[test]
fn test_declaration_with_multiple_declarators() {
    let items = stmts("const int a = 1, *b, c;");
    match &items[0].node {
        Stmt::VarDeclaration { ty, declarators } => {
            assert!(ty.is_const);
            assert_eq!(declarators.len(), 3);
            assert!(declarators[0].init.is_some());
            assert_eq!(declarators[1].pointer, Some(PointerSpec { is_const: false }));
            assert_eq!(declarators[2].name, "c");
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_control_flow_statements() {
    let items = stmts(
        "for(int i = 0; i < 10; i++) { if(i == 2) continue; else break; }\n\
         while(x) x--;\n\
         do { x++; } while(x < 5);\n\
         switch(x) { case 1: x = 2; break; default: x = 3; }\n\
         print x;\n\
         for_each_synapse { ; }\n",
    );
    assert_eq!(items.len(), 6);
    assert!(matches!(items[0].node, Stmt::For { .. }));
    assert!(matches!(items[1].node, Stmt::While { .. }));
    assert!(matches!(items[2].node, Stmt::Do { .. }));
    assert!(matches!(items[3].node, Stmt::Switch { .. }));
    assert!(matches!(items[4].node, Stmt::Print(_)));
    assert!(matches!(items[5].node, Stmt::ForEachSynapse { .. }));
}

#[test]
fn test_for_with_empty_clauses() {
    let items = stmts("for(;;) break;");
    match &items[0].node {
        Stmt::For {
            init,
            condition,
            increment,
            ..
        } => {
            assert!(init.is_none());
            assert!(condition.is_none());
            assert!(increment.is_none());
        }
        other => panic!("expected for, got {:?}", other),
    }
}

#[test]
fn test_statement_span_line() {
    let items = stmts("x = 1;\n\ny = 2;");
    assert_eq!(items[0].span.line, 1);
    assert_eq!(items[1].span.line, 3);
}

#[test]
fn test_recovers_and_collects_errors() {
    let mut handler = ErrorHandler::new("test");
    let items = parse_block_item_list(
        tokens("int x = ;\nfloat y = 2.0f;\nz = ;\nw = 1;"),
        &mut handler,
    );
    assert_eq!(handler.diagnostics().len(), 2);
    assert_eq!(handler.diagnostics()[0].span.line, 1);
    assert_eq!(handler.diagnostics()[1].span.line, 3);
    assert_eq!(items.len(), 2);
}

#[test]
fn test_invalid_assignment_target() {
    let mut handler = ErrorHandler::new("test");
    parse_block_item_list(tokens("1 = a;"), &mut handler);
    assert!(handler.has_error());
    assert_eq!(handler.diagnostics()[0].message, "Invalid assignment target");
}

#[test]
fn test_expression_rejects_trailing_tokens() {
    let mut handler = ErrorHandler::new("test");
    assert!(parse_expression(tokens("a b"), &mut handler).is_none());
    assert!(handler.has_error());
}

#[test]
fn test_missing_semicolon_reported_at_token() {
    let mut handler = ErrorHandler::new("test");
    parse_block_item_list(tokens("x = 1\ny = 2;"), &mut handler);
    let diag = &handler.diagnostics()[0];
    assert_eq!(diag.message, "Expected ';' after expression");
    assert_eq!(diag.notes[0], "error at 'y'");
}

#[test]
fn test_nesting_limit() {
    let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));

    let mut handler = ErrorHandler::new("test");
    assert!(parse_expression(tokens(&nested(60)), &mut handler).is_some());
    assert!(!handler.has_error());

    let mut handler = ErrorHandler::new("test");
    assert!(parse_expression(tokens(&nested(65)), &mut handler).is_none());
    assert_eq!(handler.diagnostics()[0].message, "Nesting depth exceeded (maximum 64 levels)");

    // Far past the limit is still a diagnostic
    let mut handler = ErrorHandler::new("test");
    assert!(parse_expression(tokens(&nested(5000)), &mut handler).is_none());
    assert!(handler.has_error());
}

#[test]
fn test_nested_blocks_limit() {
    let source = format!("{}x = 1;{}", "{".repeat(100), "}".repeat(100));
    let mut handler = ErrorHandler::new("test");
    parse_block_item_list(tokens(&source), &mut handler);
    assert!(handler
        .diagnostics()
        .iter()
        .any(|d| d.message.starts_with("Nesting depth exceeded")));
}
