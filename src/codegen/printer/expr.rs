use crate::codegen::environment::Scope;
use crate::codegen::templating::substitute_args;
use crate::error::{Error, Result};
use crate::syntax::ast::*;
use crate::types::ResolvedType;

use super::{local_name, PrettyPrinter};

impl PrettyPrinter<'_, '_> {
    pub(super) fn expr(&mut self, expr: &Expr, env: &mut dyn Scope) -> Result<String> {
        Ok(match &expr.kind {
            ExprKind::Literal(Literal::Number { lexeme, .. }) => lexeme.clone(),
            ExprKind::Literal(Literal::Bool(value)) => value.to_string(),
            ExprKind::Literal(Literal::String(lexeme)) => lexeme.clone(),
            ExprKind::Identifier(name) => self.identifier(name, None, env)?,
            ExprKind::Grouping(inner) => format!("({})", self.expr(inner, env)?),
            ExprKind::Unary { op, operand } => {
                format!("{}{}", op.symbol(), self.expr(operand, env)?)
            }
            ExprKind::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.expr(lhs, env)?,
                op.symbol(),
                self.expr(rhs, env)?
            ),
            ExprKind::Call { callee, args } => self.call(callee, args, env)?,
            ExprKind::Cast { expr: operand, .. } => {
                let ty = self.type_of(expr)?;
                format!("({}){}", ty.name(), self.expr(operand, env)?)
            }
            ExprKind::Assignment { op, target, value } => format!(
                "{} {} {}",
                self.expr(target, env)?,
                op.symbol(),
                self.expr(value, env)?
            ),
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "{} ? {} : {}",
                self.expr(condition, env)?,
                self.expr(then_branch, env)?,
                self.expr(else_branch, env)?
            ),
            ExprKind::Subscript { array, index } => {
                format!("{}[{}]", self.expr(array, env)?, self.expr(index, env)?)
            }
            ExprKind::PrefixIncDec { op, target } => {
                format!("{}{}", op.symbol(), self.expr(target, env)?)
            }
            ExprKind::PostfixIncDec { op, target } => {
                format!("{}{}", self.expr(target, env)?, op.symbol())
            }
        })
    }

    pub(super) fn type_of(&self, expr: &Expr) -> Result<&ResolvedType> {
        self.types
            .get(&expr.id)
            .ok_or_else(|| Error::Untyped(format!("expression node {}", expr.id.0)))
    }

    fn identifier(
        &mut self,
        name: &str,
        ty: Option<&ResolvedType>,
        env: &mut dyn Scope,
    ) -> Result<String> {
        if self.is_local(name) {
            Ok(local_name(name))
        } else {
            env.get_name(name, ty)
        }
    }

    /// Function bindings either carry `$(0)`-style argument slots or are a
    /// plain callable name.
    fn call(&mut self, callee: &Expr, args: &[Expr], env: &mut dyn Scope) -> Result<String> {
        let code = match &callee.kind {
            ExprKind::Identifier(name) => {
                let ty = self.type_of(callee)?.clone();
                self.identifier(name, Some(&ty), env)?
            }
            _ => self.expr(callee, env)?,
        };
        let mut printed = Vec::with_capacity(args.len());
        for arg in args {
            printed.push(self.expr(arg, env)?);
        }
        if code.contains("$(0)") {
            Ok(substitute_args(&code, &printed))
        } else if printed.is_empty() && (code.starts_with('{') || code.ends_with(')')) {
            // Zero-argument templates that are already a call or a block,
            // e.g. `curand_uniform(&$(_rng))` or `remove_synapse()`.
            Ok(code)
        } else {
            Ok(format!("{}({})", code, printed.join(", ")))
        }
    }
}
