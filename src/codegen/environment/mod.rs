//! Hierarchical name resolution for code generation.
//!
//! An [`Environment`] maps snippet identifiers to generated code. Each one
//! is chained to a parent scope or to a terminal [`CodeStream`] sink, owns
//! a buffered output stream, and flushes into its parent when dropped, so
//! inner scopes always flush before outer ones.
//!
//! Bindings hold lazy templates: `$(name)` markers are resolved against the
//! owning environment only when the binding is referenced. A binding may
//! depend on initialisers, which are emitted once each, in first-reference
//! order, ahead of the scope's own code. A binding may also be backed by a
//! struct field, which is registered the first time it is referenced.

#[cfg(test)]
mod tests;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::codegen::code_stream::CodeStream;
use crate::codegen::templating::print_subs;
use crate::error::{Error, Result};
use crate::merged::fields::{FieldValue, StructFields};
use crate::typecheck::TypeEnvironment;
use crate::types::{NumericType, ResolvedType};

/// A scope code can be printed into.
pub trait Scope: TypeEnvironment {
    /// Generated code for `name`. `ty` picks between overloads.
    fn get_name(&mut self, name: &str, ty: Option<&ResolvedType>) -> Result<String>;

    /// The scope's buffered output.
    fn stream(&mut self) -> &mut CodeStream;

    /// Add a field to the nearest enclosing merged struct.
    fn register_field(&mut self, name: &str, ty: ResolvedType, value: FieldValue) -> Result<()>;

    /// Resolve every `$(name)` marker in `template`.
    fn print(&mut self, template: &str) -> Result<String> {
        print_subs(template, |name| self.get_name(name, None))
    }

    /// Resolve `template` and write it as a line.
    fn print_line(&mut self, template: &str) -> Result<()> {
        let text = self.print(template)?;
        self.stream().line(&text);
        Ok(())
    }
}

/// What an environment flushes into.
pub enum Context<'p> {
    Parent(&'p mut dyn Scope),
    Sink(&'p mut CodeStream),
}

#[derive(Clone)]
struct FieldBinding {
    name: String,
    ty: ResolvedType,
    value: FieldValue,
}

#[derive(Clone)]
struct Binding {
    ty: ResolvedType,
    template: String,
    initialisers: Vec<usize>,
    field: Option<FieldBinding>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InitState {
    Unused,
    Pending,
    Emitted,
}

struct Initialiser {
    template: String,
    state: InitState,
}

pub struct Environment<'p> {
    context: Context<'p>,
    fields: Option<&'p mut StructFields>,
    bindings: IndexMap<String, Vec<Binding>>,
    initialisers: Vec<Initialiser>,
    /// Resolved initialiser text, in emission order.
    emitted: Vec<String>,
    stream: CodeStream,
}

impl<'p> Environment<'p> {
    /// Child scope of `parent`.
    pub fn new(parent: &'p mut dyn Scope) -> Self {
        Self::with_context(Context::Parent(parent), None)
    }

    /// Outermost scope, flushing into `sink`.
    pub fn root(sink: &'p mut CodeStream) -> Self {
        Self::with_context(Context::Sink(sink), None)
    }

    /// Child scope that can register fields of a merged struct.
    pub fn with_fields(parent: &'p mut dyn Scope, fields: &'p mut StructFields) -> Self {
        Self::with_context(Context::Parent(parent), Some(fields))
    }

    pub fn with_context(context: Context<'p>, fields: Option<&'p mut StructFields>) -> Self {
        Self {
            context,
            fields,
            bindings: IndexMap::new(),
            initialisers: Vec::new(),
            emitted: Vec::new(),
            stream: CodeStream::new(),
        }
    }

    /// Bind `name` to a code template.
    pub fn add(&mut self, name: &str, ty: ResolvedType, template: &str) -> Result<()> {
        self.add_with_initialisers(name, ty, template, &[])
    }

    /// Bind `name` to a code template that needs initialisers in scope.
    pub fn add_with_initialisers(
        &mut self,
        name: &str,
        ty: ResolvedType,
        template: &str,
        initialisers: &[usize],
    ) -> Result<()> {
        self.insert(
            name,
            Binding {
                ty,
                template: template.to_string(),
                initialisers: initialisers.to_vec(),
                field: None,
            },
        )
    }

    /// Add another overload of a function binding.
    pub fn add_overload(&mut self, name: &str, ty: ResolvedType, template: &str) {
        self.bindings.entry(name.to_string()).or_default().push(Binding {
            ty,
            template: template.to_string(),
            initialisers: Vec::new(),
            field: None,
        });
    }

    /// Register an initialiser; returns its index for bindings to depend on.
    pub fn add_initialiser(&mut self, template: &str) -> usize {
        self.initialisers.push(Initialiser {
            template: template.to_string(),
            state: InitState::Unused,
        });
        self.initialisers.len() - 1
    }

    /// Bind `name` to a template reading struct field `field_name`.
    ///
    /// The field is added to the nearest enclosing struct only once `name`
    /// is referenced.
    pub fn add_field(
        &mut self,
        name: &str,
        ty: ResolvedType,
        template: &str,
        field_name: &str,
        field_ty: ResolvedType,
        value: FieldValue,
    ) -> Result<()> {
        self.insert(
            name,
            Binding {
                ty,
                template: template.to_string(),
                initialisers: Vec::new(),
                field: Some(FieldBinding {
                    name: field_name.to_string(),
                    ty: field_ty,
                    value,
                }),
            },
        )
    }

    /// Bind parameters: homogeneous values become literals, the rest
    /// become struct fields named `{name}{suffix}`.
    ///
    /// `value(group, name)` gives the parameter value for each of the
    /// `num_groups` members.
    pub fn add_params<F>(
        &mut self,
        names: &[String],
        suffix: &str,
        ty: NumericType,
        num_groups: usize,
        value: F,
    ) -> Result<()>
    where
        F: Fn(usize, &str) -> f64 + 'static,
    {
        let value = Rc::new(value);
        for name in names {
            let first = value(0, name.as_str());
            let homogeneous = (1..num_groups).all(|g| value(g, name.as_str()) == first);
            let binding_ty = ResolvedType::value(ty).add_const();
            if homogeneous {
                self.add(name, binding_ty, &ty.write_literal(first))?;
            } else {
                let field_name = format!("{}{}", name, suffix);
                let param = name.clone();
                let value = Rc::clone(&value);
                self.add_field(
                    name,
                    binding_ty,
                    &format!("group->{}", field_name),
                    &field_name,
                    ResolvedType::value(ty),
                    Rc::new(move |g| ty.write_literal(value(g, param.as_str()))),
                )?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, binding: Binding) -> Result<()> {
        if self.bindings.contains_key(name) {
            return Err(Error::Redeclaration(name.to_string()));
        }
        self.bindings.insert(name.to_string(), vec![binding]);
        Ok(())
    }

    fn select(&self, name: &str, ty: Option<&ResolvedType>) -> Option<&Binding> {
        let candidates = self.bindings.get(name)?;
        match ty {
            Some(ty) if candidates.len() > 1 => candidates
                .iter()
                .find(|b| b.ty.kind == ty.kind)
                .or_else(|| candidates.first()),
            _ => candidates.first(),
        }
    }

    fn parent_name(&mut self, name: &str, ty: Option<&ResolvedType>) -> Result<String> {
        match &mut self.context {
            Context::Parent(parent) => parent.get_name(name, ty),
            Context::Sink(_) => Err(Error::UndefinedIdentifier(name.to_string())),
        }
    }

    /// Mark an initialiser as used, resolving it (and whatever it
    /// references) on first use.
    fn require_initialiser(&mut self, index: usize) -> Result<()> {
        let template = match self.initialisers.get_mut(index) {
            Some(init) if init.state == InitState::Unused => {
                init.state = InitState::Pending;
                init.template.clone()
            }
            Some(_) => return Ok(()),
            None => return Err(Error::UndefinedIdentifier(format!("initialiser #{}", index))),
        };
        let text = self.print(&template)?;
        self.emitted.push(text);
        if let Some(init) = self.initialisers.get_mut(index) {
            init.state = InitState::Emitted;
        }
        Ok(())
    }
}

impl TypeEnvironment for Environment<'_> {
    fn get_types(&self, name: &str) -> Option<Vec<ResolvedType>> {
        if let Some(bindings) = self.bindings.get(name) {
            return Some(bindings.iter().map(|b| b.ty.clone()).collect());
        }
        match &self.context {
            Context::Parent(parent) => parent.get_types(name),
            Context::Sink(_) => None,
        }
    }
}

impl Scope for Environment<'_> {
    fn get_name(&mut self, name: &str, ty: Option<&ResolvedType>) -> Result<String> {
        let Some(binding) = self.select(name, ty).cloned() else {
            return self.parent_name(name, ty);
        };

        if let Some(field) = binding.field {
            self.register_field(&field.name, field.ty, field.value)?;
        }
        for index in binding.initialisers {
            self.require_initialiser(index)?;
        }

        // A template naming its own binding refers to the parent's meaning.
        print_subs(&binding.template, |marker| {
            if marker == name {
                self.parent_name(marker, None)
            } else {
                self.get_name(marker, None)
            }
        })
    }

    fn stream(&mut self) -> &mut CodeStream {
        &mut self.stream
    }

    fn register_field(&mut self, name: &str, ty: ResolvedType, value: FieldValue) -> Result<()> {
        if let Some(fields) = self.fields.as_deref_mut() {
            return fields.register(name, ty, value);
        }
        match &mut self.context {
            Context::Parent(parent) => parent.register_field(name, ty, value),
            Context::Sink(_) => Err(Error::InconsistentGroup {
                group: name.to_string(),
                message: "field referenced outside a merged struct scope".to_string(),
            }),
        }
    }
}

impl Drop for Environment<'_> {
    fn drop(&mut self) {
        let target: &mut CodeStream = match &mut self.context {
            Context::Parent(parent) => parent.stream(),
            Context::Sink(sink) => &mut **sink,
        };
        for text in &self.emitted {
            target.append_block(text);
        }
        target.append_block(self.stream.as_str());
    }
}
