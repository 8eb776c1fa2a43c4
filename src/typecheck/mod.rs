//! Type checking of parsed snippets.
//!
//! Every expression and declarator is annotated with a [`ResolvedType`],
//! enforcing assignability, constness and cast rules. Errors are recorded
//! in the [`ErrorHandler`] and unwind only the statement being checked;
//! sibling block items are still checked.

mod expr;
mod stmt;
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::diagnostic::ErrorHandler;
use crate::span::{Span, Spanned};
use crate::syntax::ast::{Expr, NodeId, PointerSpec, Stmt, TypeSpec};
use crate::types::{ResolvedType, TypeContext, TypeKind};

/// Resolved type of every expression and declarator, keyed by node.
pub type ResolvedTypes = HashMap<NodeId, ResolvedType>;

/// Names visible to a snippet beyond its own declarations.
pub trait TypeEnvironment {
    /// All types bound to `name`; more than one for overloaded functions.
    fn get_types(&self, name: &str) -> Option<Vec<ResolvedType>>;
}

/// Plain name → types table, for standalone checking and tests.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    names: IndexMap<String, Vec<ResolvedType>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, ty: ResolvedType) -> &mut Self {
        self.names.insert(name.to_string(), vec![ty]);
        self
    }

    /// Add another overload of a function.
    pub fn define_overload(&mut self, name: &str, ty: ResolvedType) -> &mut Self {
        self.names.entry(name.to_string()).or_default().push(ty);
        self
    }
}

impl TypeEnvironment for TypeTable {
    fn get_types(&self, name: &str) -> Option<Vec<ResolvedType>> {
        self.names.get(name).cloned()
    }
}

/// Marker for a recorded type error; the diagnostic is already in the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCheckError;

pub(super) type TResult<T> = Result<T, TypeCheckError>;

/// Names defined inside `for_each_synapse` bodies, e.g. `id_post`.
pub type ForEachSynapseNames = [(String, ResolvedType)];

/// Type check a statement list.
///
/// `for_each_synapse` lists the names a row-scan loop body may use; `None`
/// makes `for_each_synapse` statements an error.
pub fn type_check_statements<E: TypeEnvironment + ?Sized>(
    statements: &[Spanned<Stmt>],
    env: &E,
    context: &TypeContext,
    handler: &mut ErrorHandler,
    for_each_synapse: Option<&ForEachSynapseNames>,
) -> ResolvedTypes {
    let mut checker = TypeChecker::new(env, context, handler, for_each_synapse);
    checker.push_scope();
    for stmt in statements {
        // Errors are already recorded; keep checking siblings.
        let _ = checker.check_stmt(stmt);
    }
    checker.pop_scope();
    checker.types
}

/// Type check a single expression, returning the table and its type.
pub fn type_check_expression<E: TypeEnvironment + ?Sized>(
    expression: &Expr,
    env: &E,
    context: &TypeContext,
    handler: &mut ErrorHandler,
) -> (ResolvedTypes, Option<ResolvedType>) {
    let mut checker = TypeChecker::new(env, context, handler, None);
    let ty = checker.check_expr(expression).ok();
    (checker.types, ty)
}

pub(crate) struct TypeChecker<'a, E: ?Sized> {
    env: &'a E,
    context: &'a TypeContext,
    handler: &'a mut ErrorHandler,
    /// Snippet-local declarations, innermost last.
    scopes: Vec<BTreeMap<String, ResolvedType>>,
    for_each_synapse: Option<&'a ForEachSynapseNames>,
    in_for_each_synapse: bool,
    loop_depth: u32,
    switch_depth: u32,
    types: ResolvedTypes,
}

impl<'a, E: TypeEnvironment + ?Sized> TypeChecker<'a, E> {
    pub(crate) fn new(
        env: &'a E,
        context: &'a TypeContext,
        handler: &'a mut ErrorHandler,
        for_each_synapse: Option<&'a ForEachSynapseNames>,
    ) -> Self {
        Self {
            env,
            context,
            handler,
            scopes: Vec::new(),
            for_each_synapse,
            in_for_each_synapse: false,
            loop_depth: 0,
            switch_depth: 0,
            types: HashMap::new(),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define_local(&mut self, name: &str, ty: ResolvedType, span: Span) -> TResult<()> {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if self.scopes.last().is_some_and(|s| s.contains_key(name)) {
            return self.error(span, format!("Redeclaration of '{}'", name));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
        Ok(())
    }

    /// Resolve `name` through local scopes, then the environment.
    fn lookup(&self, name: &str) -> Option<Vec<ResolvedType>> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(vec![ty.clone()]);
            }
        }
        self.env.get_types(name)
    }

    fn error<T>(&mut self, span: Span, message: String) -> TResult<T> {
        self.handler.error(span, message);
        Err(TypeCheckError)
    }

    /// Resolve a written type, with an optional per-declarator pointer.
    fn resolve_type_spec(
        &mut self,
        spec: &TypeSpec,
        declarator_pointer: Option<PointerSpec>,
    ) -> TResult<ResolvedType> {
        let words: Vec<&str> = spec.specifiers.iter().map(String::as_str).collect();
        let numeric = match self.context.resolve_numeric(&words) {
            Some(n) => n,
            None => return self.error(spec.span, format!("Unknown type '{}'", words.join(" "))),
        };
        let mut ty = ResolvedType::value(numeric);
        ty.is_const = spec.is_const;
        if let Some(pointer) = spec.pointer.or(declarator_pointer) {
            ty = ty.pointer();
            ty.is_const = pointer.is_const;
        }
        Ok(ty)
    }
}

/// Whether a value of type `source` may initialise or be assigned to `target`.
///
/// Numeric values convert freely. Pointers must point to the same type and
/// may gain, but never lose, pointee constness.
pub fn is_assignable(target: &ResolvedType, source: &ResolvedType) -> bool {
    match (&target.kind, &source.kind) {
        (TypeKind::Value(_), TypeKind::Value(_)) => true,
        (TypeKind::Pointer(t), TypeKind::Pointer(s)) => {
            t.kind == s.kind && (!s.is_const || t.is_const)
        }
        _ => false,
    }
}

/// Whether the types match exactly, ignoring top-level const.
fn is_exact_match(target: &ResolvedType, source: &ResolvedType) -> bool {
    target.kind == source.kind
}

/// Numeric or pointer: usable as a condition.
fn is_scalar(ty: &ResolvedType) -> bool {
    ty.is_numeric() || ty.is_pointer()
}
