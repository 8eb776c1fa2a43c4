use crate::span::Spanned;
use crate::syntax::ast::*;
use crate::types::ResolvedType;

use super::{is_assignable, is_scalar, TResult, TypeCheckError, TypeChecker, TypeEnvironment};

impl<E: TypeEnvironment + ?Sized> TypeChecker<'_, E> {
    pub(super) fn check_stmt(&mut self, stmt: &Spanned<Stmt>) -> TResult<()> {
        match &stmt.node {
            Stmt::Expression(Some(expr)) => self.check_expr(expr).map(|_| ()),
            Stmt::Expression(None) => Ok(()),
            Stmt::Compound(items) => {
                self.push_scope();
                let mut failed = false;
                for item in items {
                    failed |= self.check_stmt(item).is_err();
                }
                self.pop_scope();
                if failed {
                    Err(TypeCheckError)
                } else {
                    Ok(())
                }
            }
            Stmt::VarDeclaration { ty, declarators } => {
                for declarator in declarators {
                    self.check_declarator(ty, declarator)?;
                }
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition)?;
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.check_condition(condition)?;
                self.check_loop_body(body)
            }
            Stmt::Do { body, condition } => {
                self.check_loop_body(body)?;
                self.check_condition(condition)?;
                Ok(())
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.push_scope();
                let result = self.check_for(init.as_deref(), condition.as_ref(), increment.as_ref(), body);
                self.pop_scope();
                result
            }
            Stmt::Switch { condition, body } => {
                let ty = self.check_expr(condition)?;
                if !ty.is_integral() {
                    return self.error(
                        condition.span,
                        format!("Switch condition of type '{}' is not integral", ty),
                    );
                }
                self.switch_depth += 1;
                let result = self.check_stmt(body);
                self.switch_depth -= 1;
                result
            }
            Stmt::Labelled { label, body } => {
                if self.switch_depth == 0 {
                    return self.error(stmt.span, "Label not within a switch statement".to_string());
                }
                if let Label::Case(value) = label {
                    let ty = self.check_expr(value)?;
                    if !ty.is_integral() {
                        return self.error(
                            value.span,
                            format!("Case value of type '{}' is not integral", ty),
                        );
                    }
                }
                self.check_stmt(body)
            }
            Stmt::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return self.error(
                        stmt.span,
                        "'break' not within a loop or switch statement".to_string(),
                    );
                }
                Ok(())
            }
            Stmt::Continue => {
                if self.loop_depth == 0 {
                    return self.error(stmt.span, "'continue' not within a loop".to_string());
                }
                Ok(())
            }
            Stmt::Print(value) => {
                let ty = self.check_expr(value)?;
                let printable = ty.is_numeric()
                    || matches!(value.kind, ExprKind::Literal(Literal::String(_)));
                if !printable {
                    return self.error(
                        value.span,
                        format!("Cannot print value of type '{}'", ty),
                    );
                }
                Ok(())
            }
            Stmt::ForEachSynapse { body } => {
                let names = match self.for_each_synapse {
                    Some(names) if !self.in_for_each_synapse => names,
                    Some(_) => {
                        return self.error(
                            stmt.span,
                            "'for_each_synapse' loops cannot be nested".to_string(),
                        )
                    }
                    None => {
                        return self.error(
                            stmt.span,
                            "'for_each_synapse' is not supported in this context".to_string(),
                        )
                    }
                };
                self.push_scope();
                for (name, ty) in names {
                    self.define_local(name, ty.clone(), stmt.span)?;
                }
                self.in_for_each_synapse = true;
                let result = self.check_loop_body(body);
                self.in_for_each_synapse = false;
                self.pop_scope();
                result
            }
        }
    }

    fn check_declarator(&mut self, spec: &TypeSpec, declarator: &Declarator) -> TResult<()> {
        let declared = self.resolve_type_spec(spec, declarator.pointer)?;
        self.types.insert(declarator.id, declared.clone());
        self.define_local(&declarator.name, declared.clone(), declarator.span)?;

        if let Some(init) = &declarator.init {
            let init_ty = self.check_expr(init)?;
            if !is_assignable(&declared, &init_ty) {
                return self.error(
                    init.span,
                    format!(
                        "Invalid initialisation of '{}' of type '{}' with '{}'",
                        declarator.name, declared, init_ty
                    ),
                );
            }
        }
        Ok(())
    }

    fn check_condition(&mut self, condition: &Expr) -> TResult<ResolvedType> {
        let ty = self.check_expr(condition)?;
        if !is_scalar(&ty) {
            return self.error(
                condition.span,
                format!("Invalid condition of type '{}'", ty),
            );
        }
        Ok(ty)
    }

    fn check_loop_body(&mut self, body: &Spanned<Stmt>) -> TResult<()> {
        self.loop_depth += 1;
        let result = self.check_stmt(body);
        self.loop_depth -= 1;
        result
    }

    fn check_for(
        &mut self,
        init: Option<&Spanned<Stmt>>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Spanned<Stmt>,
    ) -> TResult<()> {
        if let Some(init) = init {
            self.check_stmt(init)?;
        }
        if let Some(condition) = condition {
            self.check_condition(condition)?;
        }
        if let Some(increment) = increment {
            self.check_expr(increment)?;
        }
        self.check_loop_body(body)
    }
}
