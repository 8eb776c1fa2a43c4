//! Snippet compilation: scan, parse, type check and print.
//!
//! Printing only happens when no diagnostic has been recorded for the
//! snippet; otherwise the collected diagnostics are returned as a fatal
//! [`Error::Compile`].

use tracing::debug;

use crate::codegen::environment::Scope;
use crate::codegen::printer::{print_expression, print_statements, ForEachSynapseHandler};
use crate::diagnostic::{render_report, ErrorHandler};
use crate::error::{Error, Result};
use crate::syntax::parser::{parse_block_item_list, parse_expression};
use crate::syntax::scanner::scan;
use crate::syntax::token::Token;
use crate::typecheck::{type_check_expression, type_check_statements, ForEachSynapseNames};
use crate::types::TypeContext;

/// Names and lowering for `for_each_synapse` loops in one snippet.
pub struct ForEachSynapse<'a> {
    pub names: &'a ForEachSynapseNames,
    pub handler: &'a mut dyn ForEachSynapseHandler,
}

fn failed(handler: ErrorHandler, source: &str) -> Error {
    let context = handler.context().to_string();
    let diagnostics = handler.into_diagnostics();
    let report = render_report(&diagnostics, &context, source);
    Error::Compile {
        context,
        diagnostics,
        report,
    }
}

/// Parse, check and print one expression.
pub fn pretty_print_expression(
    source: &str,
    tokens: Vec<Token>,
    context: &TypeContext,
    env: &mut dyn Scope,
    mut handler: ErrorHandler,
) -> Result<String> {
    let Some(expr) = parse_expression(tokens, &mut handler) else {
        return Err(failed(handler, source));
    };
    let (types, _) = type_check_expression(&expr, &*env, context, &mut handler);
    if handler.has_error() {
        return Err(failed(handler, source));
    }
    print_expression(&expr, env, &types)
}

/// Parse, check and print a statement list into `env`.
pub fn pretty_print_statements(
    source: &str,
    tokens: Vec<Token>,
    context: &TypeContext,
    env: &mut dyn Scope,
    mut handler: ErrorHandler,
    for_each_synapse: Option<ForEachSynapse<'_>>,
) -> Result<()> {
    let statements = parse_block_item_list(tokens, &mut handler);
    if handler.has_error() {
        return Err(failed(handler, source));
    }
    let (names, lowering) = match for_each_synapse {
        Some(f) => (Some(f.names), Some(f.handler)),
        None => (None, None),
    };
    let types = type_check_statements(&statements, &*env, context, &mut handler, names);
    if handler.has_error() {
        return Err(failed(handler, source));
    }
    debug!(context = handler.context(), statements = statements.len(), "printing snippet");
    print_statements(&statements, env, &types, lowering)
}

/// Scan then compile a code snippet. `label` names it in diagnostics.
pub fn compile_snippet(
    code: &str,
    label: &str,
    context: &TypeContext,
    env: &mut dyn Scope,
    for_each_synapse: Option<ForEachSynapse<'_>>,
) -> Result<()> {
    let mut handler = ErrorHandler::new(label);
    let tokens = scan(code, context, &mut handler);
    if handler.has_error() {
        return Err(failed(handler, code));
    }
    pretty_print_statements(code, tokens, context, env, handler, for_each_synapse)
}

/// Scan then compile an expression snippet.
pub fn compile_expression(
    code: &str,
    label: &str,
    context: &TypeContext,
    env: &mut dyn Scope,
) -> Result<String> {
    let mut handler = ErrorHandler::new(label);
    let tokens = scan(code, context, &mut handler);
    if handler.has_error() {
        return Err(failed(handler, code));
    }
    pretty_print_expression(code, tokens, context, env, handler)
}
