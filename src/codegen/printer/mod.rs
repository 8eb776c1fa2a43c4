//! Pretty printing of type-checked snippets into target code.
//!
//! Every identifier is resolved through the environment chain, so the same
//! snippet prints differently against different environments. Snippet-local
//! declarations are printed with a `_` prefix so they cannot collide with
//! names the backend generates.

mod expr;
mod stmt;
#[cfg(test)]
mod tests;

use std::collections::HashSet;

use crate::codegen::environment::Scope;
use crate::error::Result;
use crate::span::Spanned;
use crate::syntax::ast::{Expr, Stmt};
use crate::typecheck::ResolvedTypes;

/// Lowers `for_each_synapse` loops for the host that supports them.
pub trait ForEachSynapseHandler {
    /// Open the row loop in `env`, then call `body` with the scope the loop
    /// body should be printed into.
    fn generate(
        &mut self,
        env: &mut dyn Scope,
        body: &mut dyn FnMut(&mut dyn Scope) -> Result<()>,
    ) -> Result<()>;
}

/// Print one expression.
pub fn print_expression(expr: &Expr, env: &mut dyn Scope, types: &ResolvedTypes) -> Result<String> {
    PrettyPrinter::new(types, None).expr(expr, env)
}

/// Print a statement list into `env`'s stream.
pub fn print_statements(
    statements: &[Spanned<Stmt>],
    env: &mut dyn Scope,
    types: &ResolvedTypes,
    for_each_synapse: Option<&mut dyn ForEachSynapseHandler>,
) -> Result<()> {
    let mut printer = PrettyPrinter::new(types, for_each_synapse);
    printer.push_scope();
    for stmt in statements {
        printer.stmt(stmt, env)?;
    }
    printer.pop_scope();
    Ok(())
}

pub(crate) struct PrettyPrinter<'a, 'h> {
    types: &'a ResolvedTypes,
    /// Names declared by the snippet itself, innermost last.
    locals: Vec<HashSet<String>>,
    for_each_synapse: Option<&'h mut dyn ForEachSynapseHandler>,
}

impl<'a, 'h> PrettyPrinter<'a, 'h> {
    fn new(
        types: &'a ResolvedTypes,
        for_each_synapse: Option<&'h mut dyn ForEachSynapseHandler>,
    ) -> Self {
        Self {
            types,
            locals: Vec::new(),
            for_each_synapse,
        }
    }

    fn push_scope(&mut self) {
        self.locals.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare_local(&mut self, name: &str) -> String {
        if self.locals.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string());
        }
        local_name(name)
    }

    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().rev().any(|scope| scope.contains(name))
    }
}

fn local_name(name: &str) -> String {
    format!("_{}", name)
}
