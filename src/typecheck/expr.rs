use crate::syntax::ast::*;
use crate::types::{common_type, NumericType, ResolvedType, TypeKind};

use super::{is_assignable, is_exact_match, is_scalar, TResult, TypeChecker, TypeEnvironment};

impl<E: TypeEnvironment + ?Sized> TypeChecker<'_, E> {
    pub(super) fn check_expr(&mut self, expr: &Expr) -> TResult<ResolvedType> {
        let ty = self.check_expr_inner(expr)?;
        self.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> TResult<ResolvedType> {
        match &expr.kind {
            ExprKind::Literal(Literal::Number { ty, .. }) => {
                Ok(ResolvedType::value(*ty).add_const())
            }
            ExprKind::Literal(Literal::Bool(_)) => Ok(ResolvedType::BOOL.add_const()),
            ExprKind::Literal(Literal::String(_)) => {
                Ok(ResolvedType::value(NumericType::Int8).add_const().pointer())
            }
            ExprKind::Identifier(name) => match self.lookup(name) {
                Some(types) if types.len() == 1 => Ok(types[0].clone()),
                Some(_) => self.error(
                    expr.span,
                    format!("Ambiguous reference to overloaded function '{}'", name),
                ),
                None => self.error(expr.span, format!("Undefined identifier '{}'", name)),
            },
            ExprKind::Grouping(inner) => self.check_expr(inner),
            ExprKind::Unary { op, operand } => self.check_unary(expr, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(expr, *op, lhs, rhs),
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
            ExprKind::Cast { ty, expr: operand } => self.check_cast(expr, ty, operand),
            ExprKind::Assignment { op, target, value } => {
                self.check_assignment(expr, *op, target, value)
            }
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.check_expr(condition)?;
                if !is_scalar(&cond_ty) {
                    return self.error(
                        condition.span,
                        format!("Invalid condition of type '{}'", cond_ty),
                    );
                }
                let then_ty = self.check_expr(then_branch)?;
                let else_ty = self.check_expr(else_branch)?;
                match (then_ty.numeric(), else_ty.numeric()) {
                    (Some(a), Some(b)) => Ok(ResolvedType::value(common_type(a, b))),
                    _ if then_ty.is_pointer() && is_exact_match(&then_ty, &else_ty) => {
                        Ok(then_ty)
                    }
                    _ => self.error(
                        expr.span,
                        format!(
                            "Incompatible operand types '{}' and '{}' in conditional",
                            then_ty, else_ty
                        ),
                    ),
                }
            }
            ExprKind::Subscript { array, index } => {
                let array_ty = self.check_expr(array)?;
                let index_ty = self.check_expr(index)?;
                let pointee = match array_ty.pointee() {
                    Some(pointee) => pointee.clone(),
                    None => {
                        return self.error(
                            array.span,
                            format!("Subscripted value of type '{}' is not a pointer", array_ty),
                        )
                    }
                };
                if !index_ty.is_integral() {
                    return self.error(
                        index.span,
                        format!("Array subscript of type '{}' is not an integer", index_ty),
                    );
                }
                Ok(pointee)
            }
            ExprKind::PrefixIncDec { op, target } | ExprKind::PostfixIncDec { op, target } => {
                let ty = self.check_expr(target)?;
                if !is_scalar(&ty) {
                    return self.error(
                        target.span,
                        format!("Invalid operand of type '{}' to '{}'", ty, op.symbol()),
                    );
                }
                if !is_modifiable(target) {
                    return self.error(
                        target.span,
                        format!("Operand of '{}' is not assignable", op.symbol()),
                    );
                }
                if ty.is_const {
                    return self.error(
                        target.span,
                        format!("Cannot {} read-only value of type '{}'", op_verb(*op), ty),
                    );
                }
                Ok(ty)
            }
        }
    }

    fn check_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> TResult<ResolvedType> {
        let ty = self.check_expr(operand)?;
        match op {
            UnaryOp::Deref => match ty.pointee() {
                Some(pointee) => Ok(pointee.clone()),
                None => self.error(
                    expr.span,
                    format!("Cannot dereference value of type '{}'", ty),
                ),
            },
            UnaryOp::AddressOf => {
                if ty.is_numeric() && is_modifiable(operand) {
                    Ok(ty.pointer())
                } else {
                    self.error(
                        expr.span,
                        format!("Cannot take address of value of type '{}'", ty),
                    )
                }
            }
            UnaryOp::Not => {
                if is_scalar(&ty) {
                    Ok(ResolvedType::INT32)
                } else {
                    self.error(expr.span, format!("Invalid operand of type '{}' to '!'", ty))
                }
            }
            UnaryOp::Plus | UnaryOp::Minus => match ty.numeric() {
                Some(n) => Ok(ResolvedType::value(n.promoted())),
                None => self.error(
                    expr.span,
                    format!("Invalid operand of type '{}' to unary '{}'", ty, op.symbol()),
                ),
            },
            UnaryOp::BitNot => match ty.numeric() {
                Some(n) if n.is_integral() => Ok(ResolvedType::value(n.promoted())),
                _ => self.error(expr.span, format!("Invalid operand of type '{}' to '~'", ty)),
            },
        }
    }

    fn check_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> TResult<ResolvedType> {
        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;
        self.binary_result(expr, op, &lhs_ty, &rhs_ty)
    }

    /// Result type of `lhs op rhs`, shared with compound assignment.
    fn binary_result(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs_ty: &ResolvedType,
        rhs_ty: &ResolvedType,
    ) -> TResult<ResolvedType> {
        if op.is_logical() {
            if is_scalar(lhs_ty) && is_scalar(rhs_ty) {
                return Ok(ResolvedType::INT32);
            }
            return self.invalid_operands(expr, op, lhs_ty, rhs_ty);
        }

        match (lhs_ty.numeric(), rhs_ty.numeric()) {
            (Some(a), Some(b)) => {
                if op.is_integral_only() && !(a.is_integral() && b.is_integral()) {
                    return self.invalid_operands(expr, op, lhs_ty, rhs_ty);
                }
                if op.is_relational() {
                    return Ok(ResolvedType::INT32);
                }
                if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    return Ok(ResolvedType::value(a.promoted()));
                }
                Ok(ResolvedType::value(common_type(a, b)))
            }
            // pointer +/- integer, integer + pointer
            (None, Some(b))
                if lhs_ty.is_pointer()
                    && b.is_integral()
                    && matches!(op, BinaryOp::Add | BinaryOp::Sub) =>
            {
                Ok(lhs_ty.clone().remove_const())
            }
            (Some(a), None) if rhs_ty.is_pointer() && a.is_integral() && op == BinaryOp::Add => {
                Ok(rhs_ty.clone().remove_const())
            }
            (None, None) if lhs_ty.is_pointer() && rhs_ty.is_pointer() => {
                let same_pointee =
                    lhs_ty.pointee().map(|p| &p.kind) == rhs_ty.pointee().map(|p| &p.kind);
                if op.is_relational() && same_pointee {
                    Ok(ResolvedType::INT32)
                } else if matches!(op, BinaryOp::Add | BinaryOp::Sub) {
                    self.error(
                        expr.span,
                        format!(
                            "Pointer arithmetic between '{}' and '{}' is not supported",
                            lhs_ty, rhs_ty
                        ),
                    )
                } else {
                    self.invalid_operands(expr, op, lhs_ty, rhs_ty)
                }
            }
            _ => self.invalid_operands(expr, op, lhs_ty, rhs_ty),
        }
    }

    fn invalid_operands(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs_ty: &ResolvedType,
        rhs_ty: &ResolvedType,
    ) -> TResult<ResolvedType> {
        self.error(
            expr.span,
            format!(
                "Invalid operand types '{}' and '{}' to binary '{}'",
                lhs_ty,
                rhs_ty,
                op.symbol()
            ),
        )
    }

    fn check_call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr]) -> TResult<ResolvedType> {
        let candidates = match &callee.kind {
            ExprKind::Identifier(name) => match self.lookup(name) {
                Some(types) => types,
                None => {
                    return self.error(callee.span, format!("Undefined identifier '{}'", name))
                }
            },
            _ => vec![self.check_expr(callee)?],
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.check_expr(arg)?);
        }

        // Most exact argument matches wins; first declared breaks ties.
        let mut best: Option<(usize, &ResolvedType)> = None;
        for candidate in &candidates {
            let func = match candidate.as_function() {
                Some(func) => func,
                None => continue,
            };
            let arity_ok = if func.variadic {
                arg_types.len() >= func.args.len()
            } else {
                arg_types.len() == func.args.len()
            };
            if !arity_ok {
                continue;
            }
            let all_assignable = func
                .args
                .iter()
                .zip(&arg_types)
                .all(|(param, arg)| is_assignable(param, arg));
            if !all_assignable {
                continue;
            }
            let exact = func
                .args
                .iter()
                .zip(&arg_types)
                .filter(|(param, arg)| is_exact_match(param, arg))
                .count();
            if best.map_or(true, |(score, _)| exact > score) {
                best = Some((exact, candidate));
            }
        }

        let chosen = match best {
            Some((_, chosen)) => chosen.clone(),
            None => {
                let name = match &callee.kind {
                    ExprKind::Identifier(name) => name.clone(),
                    _ => "expression".to_string(),
                };
                let args: Vec<String> = arg_types.iter().map(|t| t.name()).collect();
                return self.error(
                    expr.span,
                    format!(
                        "No matching function for call to '{}' with arguments ({})",
                        name,
                        args.join(", ")
                    ),
                );
            }
        };

        let returns = match &chosen.kind {
            TypeKind::Function(func) => (*func.returns).clone(),
            _ => ResolvedType::VOID,
        };
        self.types.insert(callee.id, chosen);
        Ok(returns)
    }

    fn check_cast(&mut self, expr: &Expr, spec: &TypeSpec, operand: &Expr) -> TResult<ResolvedType> {
        let target = self.resolve_type_spec(spec, None)?;
        let source = self.check_expr(operand)?;
        let is_literal = matches!(operand.kind, ExprKind::Literal(_));

        match (&target.kind, &source.kind) {
            (TypeKind::Value(_), TypeKind::Value(_)) => {
                if source.is_const && !target.is_const && !is_literal {
                    return self.error(
                        expr.span,
                        format!("Invalid cast from '{}' to '{}': cannot remove const", source, target),
                    );
                }
                Ok(target)
            }
            (TypeKind::Pointer(t), TypeKind::Pointer(s)) => {
                if t.kind != s.kind {
                    return self.error(
                        expr.span,
                        format!("Invalid cast: cannot reinterpret '{}' as '{}'", source, target),
                    );
                }
                if (s.is_const && !t.is_const) || (source.is_const && !target.is_const) {
                    return self.error(
                        expr.span,
                        format!("Invalid cast from '{}' to '{}': cannot remove const", source, target),
                    );
                }
                Ok(target)
            }
            _ => self.error(
                expr.span,
                format!("Invalid cast from '{}' to '{}'", source, target),
            ),
        }
    }

    fn check_assignment(
        &mut self,
        expr: &Expr,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
    ) -> TResult<ResolvedType> {
        let target_ty = self.check_expr(target)?;
        let value_ty = self.check_expr(value)?;

        if target_ty.is_const {
            return self.error(
                target.span,
                format!("Cannot assign to read-only value of type '{}'", target_ty),
            );
        }

        match op {
            AssignOp::Assign => {
                if !is_assignable(&target_ty, &value_ty) {
                    return self.error(
                        expr.span,
                        format!("Invalid assignment of '{}' to '{}'", value_ty, target_ty),
                    );
                }
            }
            AssignOp::Compound(binary) => {
                if target_ty.is_numeric() && !value_ty.is_numeric() {
                    return self.invalid_operands(expr, binary, &target_ty, &value_ty);
                }
                self.binary_result(expr, binary, &target_ty, &value_ty)?;
            }
        }
        Ok(target_ty)
    }
}

/// Expressions that designate storage.
fn is_modifiable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier(_) | ExprKind::Subscript { .. } => true,
        ExprKind::Unary {
            op: UnaryOp::Deref, ..
        } => true,
        ExprKind::Grouping(inner) => is_modifiable(inner),
        _ => false,
    }
}

fn op_verb(op: IncDec) -> &'static str {
    match op {
        IncDec::Increment => "increment",
        IncDec::Decrement => "decrement",
    }
}
