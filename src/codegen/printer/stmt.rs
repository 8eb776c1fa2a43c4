use crate::codegen::environment::Scope;
use crate::error::{Error, Result};
use crate::span::Spanned;
use crate::syntax::ast::*;
use crate::types::ResolvedType;

use super::PrettyPrinter;

impl PrettyPrinter<'_, '_> {
    pub(super) fn stmt(&mut self, stmt: &Spanned<Stmt>, env: &mut dyn Scope) -> Result<()> {
        match &stmt.node {
            Stmt::Expression(Some(expr)) => {
                let text = self.expr(expr, env)?;
                env.stream().line(&format!("{};", text));
            }
            Stmt::Expression(None) => env.stream().line(";"),
            Stmt::Compound(items) => {
                env.stream().line("{");
                self.push_scope();
                let result = self.block(items, env);
                self.pop_scope();
                result?;
                env.stream().line("}");
            }
            Stmt::VarDeclaration { declarators, .. } => {
                for declarator in declarators {
                    let text = self.declarator(declarator, true, env)?;
                    env.stream().line(&format!("{};", text));
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expr(condition, env)?;
                env.stream().line(&format!("if({})", condition));
                self.body(then_branch, env)?;
                if let Some(else_branch) = else_branch {
                    env.stream().line("else");
                    self.body(else_branch, env)?;
                }
            }
            Stmt::While { condition, body } => {
                let condition = self.expr(condition, env)?;
                env.stream().line(&format!("while({})", condition));
                self.body(body, env)?;
            }
            Stmt::Do { body, condition } => {
                env.stream().line("do");
                self.body(body, env)?;
                let condition = self.expr(condition, env)?;
                env.stream().line(&format!("while({});", condition));
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.push_scope();
                let result = self.for_loop(init.as_deref(), condition.as_ref(), increment.as_ref(), body, env);
                self.pop_scope();
                result?;
            }
            Stmt::Switch { condition, body } => {
                let condition = self.expr(condition, env)?;
                env.stream().line(&format!("switch({})", condition));
                self.body(body, env)?;
            }
            Stmt::Labelled { label, body } => {
                match label {
                    Label::Case(value) => {
                        let value = self.expr(value, env)?;
                        env.stream().line(&format!("case {}:", value));
                    }
                    Label::Default => env.stream().line("default:"),
                }
                self.stmt(body, env)?;
            }
            Stmt::Break => env.stream().line("break;"),
            Stmt::Continue => env.stream().line("continue;"),
            Stmt::Print(value) => {
                let format = match self.type_of(value)?.numeric() {
                    Some(numeric) => numeric.printf_format(),
                    None => "%s",
                };
                let value = self.expr(value, env)?;
                env.stream()
                    .line(&format!("printf(\"{}\\n\", {});", format, value));
            }
            Stmt::ForEachSynapse { body } => {
                let Some(handler) = self.for_each_synapse.take() else {
                    return Err(Error::UndefinedIdentifier("for_each_synapse".to_string()));
                };
                let result = handler.generate(env, &mut |body_env: &mut dyn Scope| {
                    self.stmt(body, body_env)
                });
                self.for_each_synapse = Some(handler);
                result?;
            }
        }
        Ok(())
    }

    fn block(&mut self, items: &[Spanned<Stmt>], env: &mut dyn Scope) -> Result<()> {
        for item in items {
            self.stmt(item, env)?;
        }
        Ok(())
    }

    /// Body of a control statement, always braced so nesting indents.
    fn body(&mut self, body: &Spanned<Stmt>, env: &mut dyn Scope) -> Result<()> {
        if matches!(body.node, Stmt::Compound(_)) {
            return self.stmt(body, env);
        }
        env.stream().line("{");
        self.push_scope();
        let result = self.stmt(body, env);
        self.pop_scope();
        result?;
        env.stream().line("}");
        Ok(())
    }

    fn for_loop(
        &mut self,
        init: Option<&Spanned<Stmt>>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Spanned<Stmt>,
        env: &mut dyn Scope,
    ) -> Result<()> {
        let init = match init.map(|s| &s.node) {
            Some(Stmt::VarDeclaration { declarators, .. }) => {
                let mut parts = Vec::with_capacity(declarators.len());
                for (i, declarator) in declarators.iter().enumerate() {
                    parts.push(self.declarator(declarator, i == 0, env)?);
                }
                parts.join(", ")
            }
            Some(Stmt::Expression(Some(expr))) => self.expr(expr, env)?,
            _ => String::new(),
        };
        let condition = match condition {
            Some(condition) => self.expr(condition, env)?,
            None => String::new(),
        };
        let increment = match increment {
            Some(increment) => self.expr(increment, env)?,
            None => String::new(),
        };
        env.stream()
            .line(&format!("for({}; {}; {})", init, condition, increment));
        self.body(body, env)
    }

    /// `T _name = init`, or `*_name = init` without the base type.
    fn declarator(
        &mut self,
        declarator: &Declarator,
        with_base: bool,
        env: &mut dyn Scope,
    ) -> Result<String> {
        let ty = self
            .types
            .get(&declarator.id)
            .cloned()
            .ok_or_else(|| Error::Untyped(format!("declaration of '{}'", declarator.name)))?;
        let name = self.declare_local(&declarator.name);
        let init = match &declarator.init {
            Some(init) => format!(" = {}", self.expr(init, env)?),
            None => String::new(),
        };

        let (base, pointer) = split_declarator_type(&ty, declarator.pointer);
        let text = if with_base {
            format!("{}{} {}{}", base, pointer, name, init)
        } else {
            format!("{}{}{}", pointer.trim_start(), name, init)
        };
        Ok(text)
    }
}

/// Base type spelling and the `*`/`* const` part of a declarator.
fn split_declarator_type(ty: &ResolvedType, pointer: Option<PointerSpec>) -> (String, &'static str) {
    match (pointer, ty.pointee()) {
        (Some(spec), Some(pointee)) => (
            pointee.name(),
            if spec.is_const { "* const" } else { "*" },
        ),
        _ => (ty.name(), ""),
    }
}
