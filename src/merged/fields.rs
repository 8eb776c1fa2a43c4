//! Struct fields registered on demand while generating code.

use std::fmt;
use std::rc::Rc;

use crate::codegen::code_stream::CodeStream;
use crate::error::{Error, Result};
use crate::types::ResolvedType;

/// Produces the host-side value of a field for the group at an index.
pub type FieldValue = Rc<dyn Fn(usize) -> String>;

#[derive(Clone)]
pub struct StructField {
    pub name: String,
    pub ty: ResolvedType,
    pub value: FieldValue,
}

impl fmt::Debug for StructField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Fields of one merged struct, in registration order.
///
/// A field only exists once some generated code has referenced it, so the
/// final layout is exactly the set of fields the kernels use.
#[derive(Debug, Default, Clone)]
pub struct StructFields {
    fields: Vec<StructField>,
}

impl StructFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field. Registering an existing name with the same type
    /// is a no-op; a different type is a conflict.
    pub fn register(&mut self, name: &str, ty: ResolvedType, value: FieldValue) -> Result<()> {
        if let Some(existing) = self.get(name) {
            if existing.ty.kind == ty.kind {
                return Ok(());
            }
            return Err(Error::FieldConflict {
                name: name.to_string(),
                existing: existing.ty.name(),
                requested: ty.name(),
            });
        }
        tracing::debug!(field = name, ty = %ty, "registered struct field");
        self.fields.push(StructField {
            name: name.to_string(),
            ty,
            value,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Layout order: largest type first, registration order among equals.
    pub fn sorted(&self) -> Vec<&StructField> {
        let mut sorted: Vec<&StructField> = self.fields.iter().collect();
        sorted.sort_by(|a, b| b.ty.size().cmp(&a.ty.size()));
        sorted
    }

    /// Size of one struct instance under C alignment rules.
    pub fn struct_size(&self) -> usize {
        let mut offset = 0usize;
        let mut align = 1usize;
        for field in self.sorted() {
            let size = field.ty.size().max(1);
            offset = offset.div_ceil(size) * size + size;
            align = align.max(size);
        }
        offset.div_ceil(align) * align
    }

    pub fn write_definition(&self, os: &mut CodeStream, struct_name: &str) {
        os.line(&format!("struct {}", struct_name));
        os.line("{");
        for field in self.sorted() {
            os.line(&format!("{} {};", field.ty.name(), field.name));
        }
        os.line("};");
    }

    /// Parameter list of the push function, in layout order.
    pub fn argument_list(&self) -> String {
        self.sorted()
            .iter()
            .map(|f| format!("{} {}", f.ty.name(), f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Host-side values for the group at `group`, in layout order.
    pub fn values(&self, group: usize) -> Vec<String> {
        self.sorted().iter().map(|f| (f.value)(group)).collect()
    }
}
