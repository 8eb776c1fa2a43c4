mod basics;

use crate::diagnostic::{Diagnostic, ErrorHandler};
use crate::syntax::parser::{parse_block_item_list, parse_expression};
use crate::syntax::scanner::scan;
use crate::typecheck::{
    type_check_expression, type_check_statements, ForEachSynapseNames, TypeTable,
};
use crate::types::{NumericType, ResolvedType, TypeContext};

pub(super) fn context() -> TypeContext {
    TypeContext::new(NumericType::Float)
}

/// Table holding the names most tests refer to.
pub(super) fn env() -> TypeTable {
    let mut env = TypeTable::new();
    env.define("intVal", ResolvedType::INT32)
        .define("floatVal", ResolvedType::FLOAT)
        .define("constIntVal", ResolvedType::INT32.add_const())
        .define("intArray", ResolvedType::INT32.pointer())
        .define("constIntArray", ResolvedType::INT32.add_const().pointer())
        .define("floatArray", ResolvedType::FLOAT.pointer())
        .define("intConstArray", ResolvedType::INT32.pointer().add_const());
    env
}

pub(super) fn check_expr(source: &str, env: &TypeTable) -> Result<ResolvedType, Vec<Diagnostic>> {
    let ctx = context();
    let mut handler = ErrorHandler::new("test");
    let tokens = scan(source, &ctx, &mut handler);
    let expr = parse_expression(tokens, &mut handler);
    assert!(!handler.has_error(), "parse failed: {:?}", handler.diagnostics());
    let expr = expr.unwrap();
    let (_, ty) = type_check_expression(&expr, env, &ctx, &mut handler);
    match ty {
        Some(ty) if !handler.has_error() => Ok(ty),
        _ => Err(handler.into_diagnostics()),
    }
}

pub(super) fn check_stmts(source: &str, env: &TypeTable) -> Result<(), Vec<Diagnostic>> {
    check_stmts_with(source, env, None)
}

pub(super) fn check_stmts_with(
    source: &str,
    env: &TypeTable,
    for_each_synapse: Option<&ForEachSynapseNames>,
) -> Result<(), Vec<Diagnostic>> {
    let ctx = context();
    let mut handler = ErrorHandler::new("test");
    let tokens = scan(source, &ctx, &mut handler);
    let stmts = parse_block_item_list(tokens, &mut handler);
    assert!(!handler.has_error(), "parse failed: {:?}", handler.diagnostics());
    type_check_statements(&stmts, env, &ctx, &mut handler, for_each_synapse);
    if handler.has_error() {
        Err(handler.into_diagnostics())
    } else {
        Ok(())
    }
}

pub(super) fn messages(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.message.as_str()).collect()
}
