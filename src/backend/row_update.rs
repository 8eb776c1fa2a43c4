//! Structural row mutation for connectivity updates.
//!
//! Rows are ragged: row `i` owns slots `i * rowStride ..` of every
//! per-synapse array, of which the first `rowLength[i]` are live. Adding a
//! synapse appends to the row; removing one moves the row's last synapse
//! into the freed slot. Both touch every array stored with the
//! connectivity so they stay aligned, and arrays with one copy per batch
//! are updated in every copy.
//!
//! The templates below resolve against a scope binding `id_pre`,
//! `num_pre`, `_row_stride`, `_row_length` and `_ind`.

use std::rc::Rc;

use crate::codegen::code_stream::CodeStream;
use crate::codegen::environment::{Environment, Scope};
use crate::codegen::printer::ForEachSynapseHandler;
use crate::error::Result;
use crate::merged::custom_connectivity::SynapseArray;
use crate::types::ResolvedType;

use super::Backend;

/// Binding of an array's pointer field.
pub fn array_binding(field: &str) -> String {
    format!("_array_{}", field)
}

fn batched(array: &SynapseArray, batch_size: u32) -> bool {
    array.duplicated && batch_size > 1
}

/// Write `value(index)` into `array` at `dst`, in every batch copy if the
/// array has them.
fn gen_store(
    os: &mut CodeStream,
    array: &SynapseArray,
    batch_size: u32,
    dst: &str,
    value: impl Fn(Option<&str>) -> String,
) {
    let target = format!("$({})", array_binding(&array.field));
    if batched(array, batch_size) {
        os.line(&format!("for(unsigned int b = 0; b < {}; b++)", batch_size));
        os.line("{");
        os.line("const unsigned int batchOffset = b * $(_syn_stride);");
        os.line(&format!(
            "{}[batchOffset + {}] = {};",
            target,
            dst,
            value(Some("batchOffset"))
        ));
        os.line("}");
    } else {
        os.line(&format!("{}[{}] = {};", target, dst, value(None)));
    }
}

/// Type of `add_synapse`: postsynaptic index, then one value per array
/// row update code names.
pub fn add_synapse_type(arrays: &[SynapseArray]) -> ResolvedType {
    let mut args = vec![ResolvedType::UINT32];
    args.extend(
        arrays
            .iter()
            .filter(|a| a.is_argument())
            .map(|a| a.ty.clone().remove_const()),
    );
    ResolvedType::function(ResolvedType::VOID, args)
}

/// Body of `add_synapse`; `$(0)` is the postsynaptic index and `$(1)`...
/// the named arrays' values. Arrays without a name are zeroed.
pub fn add_synapse_template<B: Backend + ?Sized>(backend: &B, arrays: &[SynapseArray], batch_size: u32) -> String {
    let mut os = CodeStream::new();
    os.line("{");
    os.line("const unsigned int newIdx = $(_row_start_idx) + $(_row_length)[$(id_pre)];");
    backend.gen_assert(&mut os, "$(_row_length)[$(id_pre)] < $(_row_stride)");
    os.line("$(_ind)[newIdx] = $(0);");
    let mut arg = 1;
    for array in arrays {
        let value = if array.is_argument() {
            arg += 1;
            let value = format!("$({})", arg - 1);
            if batched(array, batch_size) {
                // Evaluated once, then copied into every batch
                let local = format!("{}Val", array.field);
                os.line(&format!("{} {} = {};", array.ty.clone().add_const(), local, value));
                local
            } else {
                value
            }
        } else {
            "0".to_string()
        };
        gen_store(&mut os, array, batch_size, "newIdx", |_| value.clone());
    }
    os.line("$(_row_length)[$(id_pre)]++;");
    os.line("}");
    os.as_str().trim_end().to_string()
}

/// Body of `remove_synapse`: move the row's last synapse into `id_syn`,
/// shrink the row and revisit the current slot.
pub fn remove_synapse_template(arrays: &[SynapseArray], batch_size: u32) -> String {
    let mut os = CodeStream::new();
    os.line("{");
    os.line("const unsigned int lastIdx = $(_row_start_idx) + $(_row_length)[$(id_pre)] - 1;");
    os.line("$(_ind)[$(id_syn)] = $(_ind)[lastIdx];");
    for array in arrays {
        let source = format!("$({})", array_binding(&array.field));
        gen_store(&mut os, array, batch_size, "$(id_syn)", |offset| match offset {
            Some(offset) => format!("{}[{} + lastIdx]", source, offset),
            None => format!("{}[lastIdx]", source),
        });
    }
    os.line("$(_row_length)[$(id_pre)]--;");
    os.line("j--;");
    os.line("}");
    os.as_str().trim_end().to_string()
}

/// Bind row bookkeeping, every array's pointer field and `add_synapse`.
pub fn add_row_bindings<B: Backend + ?Sized>(
    env: &mut Environment<'_>,
    backend: &B,
    arrays: &[SynapseArray],
    batch_size: u32,
) -> Result<()> {
    let const_uint = ResolvedType::UINT32.add_const();
    let row_start = env.add_initialiser("const unsigned int rowStartIdx = $(id_pre) * $(_row_stride);");
    env.add_with_initialisers("_row_start_idx", const_uint.clone(), "rowStartIdx", &[row_start])?;
    let syn_stride = env.add_initialiser("const unsigned int synStride = $(num_pre) * $(_row_stride);");
    env.add_with_initialisers("_syn_stride", const_uint, "synStride", &[syn_stride])?;

    for array in arrays {
        let values = array.values.clone();
        let pointer = array.ty.clone().remove_const().pointer();
        env.add_field(
            &array_binding(&array.field),
            pointer.clone(),
            &format!("group->{}", array.field),
            &array.field,
            pointer,
            Rc::new(move |g| values[g].clone()),
        )?;
    }
    env.add(
        "add_synapse",
        add_synapse_type(arrays),
        &add_synapse_template(backend, arrays, batch_size),
    )
}

/// A name the row loop body binds.
#[derive(Clone, Debug)]
pub struct LoopBinding {
    pub name: String,
    pub ty: ResolvedType,
    pub template: String,
}

/// Lowers `for_each_synapse` into a scan over the live slots of row
/// `id_pre`.
pub struct RowUpdateLoop {
    bindings: Vec<LoopBinding>,
    remove: String,
}

impl RowUpdateLoop {
    /// Per-synapse arrays are bound by name unless they have a copy per
    /// batch, which a single row update cannot address.
    pub fn new(arrays: &[SynapseArray], batch_size: u32) -> Self {
        let bindings = arrays
            .iter()
            .filter(|a| !batched(a, batch_size))
            .filter_map(|a| {
                let name = a.binding.clone()?;
                let ty = if a.read_only { a.ty.clone().add_const() } else { a.ty.clone() };
                Some(LoopBinding {
                    name,
                    ty,
                    template: format!("$({})[$(id_syn)]", array_binding(&a.field)),
                })
            })
            .collect();
        Self {
            bindings,
            remove: remove_synapse_template(arrays, batch_size),
        }
    }

    /// Bind more names in the loop body, e.g. postsynaptic variables.
    pub fn with_bindings(mut self, bindings: impl IntoIterator<Item = LoopBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Names the loop body may use, for type checking.
    pub fn names(&self) -> Vec<(String, ResolvedType)> {
        let const_uint = ResolvedType::UINT32.add_const();
        let mut names = vec![
            ("id_post".to_string(), const_uint.clone()),
            ("id_syn".to_string(), const_uint),
            (
                "remove_synapse".to_string(),
                ResolvedType::function(ResolvedType::VOID, Vec::new()),
            ),
        ];
        names.extend(self.bindings.iter().map(|b| (b.name.clone(), b.ty.clone())));
        names
    }
}

impl ForEachSynapseHandler for RowUpdateLoop {
    fn generate(
        &mut self,
        env: &mut dyn Scope,
        body: &mut dyn FnMut(&mut dyn Scope) -> Result<()>,
    ) -> Result<()> {
        env.print_line("for(int j = 0; j < $(_row_length)[$(id_pre)]; j++)")?;
        env.stream().line("{");
        {
            let mut body_env = Environment::new(env);
            let const_uint = ResolvedType::UINT32.add_const();
            body_env.add("id_post", const_uint.clone(), "$(_ind)[$(_row_start_idx) + j]")?;
            let idx = body_env.add_initialiser("const unsigned int idx = $(_row_start_idx) + j;");
            body_env.add_with_initialisers("id_syn", const_uint, "idx", &[idx])?;
            body_env.add(
                "remove_synapse",
                ResolvedType::function(ResolvedType::VOID, Vec::new()),
                &self.remove,
            )?;
            for binding in &self.bindings {
                body_env.add(&binding.name, binding.ty.clone(), &binding.template)?;
            }
            body(&mut body_env)?;
        }
        env.stream().line("}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cuda::CudaBackend;
    use crate::codegen::pipeline::{compile_snippet, ForEachSynapse};
    use crate::merged::fields::StructFields;
    use crate::types::{NumericType, TypeContext};

    fn arrays() -> Vec<SynapseArray> {
        vec![
            SynapseArray {
                binding: Some("g".to_string()),
                field: "g".to_string(),
                ty: ResolvedType::FLOAT,
                duplicated: false,
                read_only: false,
                values: vec!["d_gSyn".to_string()],
            },
            SynapseArray {
                binding: None,
                field: "_dependentVar0".to_string(),
                ty: ResolvedType::FLOAT,
                duplicated: true,
                read_only: false,
                values: vec!["d_xOther".to_string()],
            },
        ]
    }

    #[test]
    fn test_add_synapse_signature() {
        let ty = add_synapse_type(&arrays());
        assert_eq!(
            ty,
            ResolvedType::function(ResolvedType::VOID, vec![ResolvedType::UINT32, ResolvedType::FLOAT])
        );
    }

    #[test]
    fn test_templates_without_batches() {
        let backend = CudaBackend::default();
        let add = add_synapse_template(&backend, &arrays(), 1);
        assert!(add.starts_with('{'));
        assert!(add.contains("$(_array_g)[newIdx] = $(1);"));
        assert!(add.contains("$(_array__dependentVar0)[newIdx] = 0;"));
        assert!(add.contains("assert($(_row_length)[$(id_pre)] < $(_row_stride));"));

        let remove = remove_synapse_template(&arrays(), 1);
        assert!(remove.contains("$(_array_g)[$(id_syn)] = $(_array_g)[lastIdx];"));
        assert!(remove.ends_with("j--;\n}"));
        assert!(!remove.contains("for(unsigned int b"));
    }

    #[test]
    fn test_batched_argument_evaluated_once() {
        let backend = CudaBackend::default();
        let mut arrays = arrays();
        arrays[0].duplicated = true;
        let add = add_synapse_template(&backend, &arrays, 4);
        let lines: Vec<&str> = add.lines().map(str::trim).collect();
        let hoisted = lines.iter().position(|l| *l == "const float gVal = $(1);").unwrap();
        let first_loop = lines.iter().position(|l| l.starts_with("for(unsigned int b")).unwrap();
        assert!(hoisted < first_loop);
        assert!(lines.contains(&"$(_array_g)[batchOffset + newIdx] = gVal;"));
        assert_eq!(add.matches("$(1)").count(), 1);
    }

    #[test]
    fn test_loop_skips_batched_arrays() {
        let mut arrays = arrays();
        arrays[0].duplicated = true;
        let names = RowUpdateLoop::new(&arrays, 4).names();
        assert!(names.iter().all(|(n, _)| n != "g"));
        let names = RowUpdateLoop::new(&arrays, 1).names();
        assert!(names.iter().any(|(n, _)| n == "g"));
    }

    #[test]
    fn test_row_update_end_to_end() {
        let backend = CudaBackend::default();
        let ctx = TypeContext::new(NumericType::Float);
        let arrays = arrays();
        let mut out = CodeStream::new();
        let mut fields = StructFields::new();
        {
            let mut root = Environment::root(&mut out);
            let mut env = Environment::with_fields(&mut root, &mut fields);
            let const_uint = ResolvedType::UINT32.add_const();
            env.add("id_pre", const_uint.clone(), "lid").unwrap();
            env.add("num_pre", const_uint.clone(), "group->numSrcNeurons").unwrap();
            env.add("_row_stride", const_uint, "group->rowStride").unwrap();
            env.add("_row_length", ResolvedType::UINT32.pointer(), "group->rowLength").unwrap();
            env.add("_ind", ResolvedType::UINT32.pointer(), "group->ind").unwrap();
            add_row_bindings(&mut env, &backend, &arrays, 2).unwrap();

            let mut row_loop = RowUpdateLoop::new(&arrays, 2);
            let names = row_loop.names();
            compile_snippet(
                "for_each_synapse {\n    if (id_post == 3) {\n        remove_synapse();\n    }\n}\nadd_synapse(id_pre, 0.5f);",
                "row update",
                &ctx,
                &mut env,
                Some(ForEachSynapse {
                    names: &names,
                    handler: &mut row_loop,
                }),
            )
            .unwrap();
        }
        let code = out.as_str();
        let lines: Vec<&str> = code.lines().map(str::trim).collect();
        assert_eq!(lines[0], "const unsigned int rowStartIdx = lid * group->rowStride;");
        assert_eq!(lines[1], "const unsigned int synStride = group->numSrcNeurons * group->rowStride;");
        for expected in [
            "for(int j = 0; j < group->rowLength[lid]; j++)",
            "const unsigned int idx = rowStartIdx + j;",
            "if(group->ind[rowStartIdx + j] == 3)",
            "group->ind[idx] = group->ind[lastIdx];",
            "group->g[idx] = group->g[lastIdx];",
            "group->_dependentVar0[batchOffset + idx] = group->_dependentVar0[batchOffset + lastIdx];",
            "group->rowLength[lid]--;",
            "j--;",
            "assert(group->rowLength[lid] < group->rowStride);",
            "group->ind[newIdx] = lid;",
            "group->g[newIdx] = 0.5f;",
            "group->_dependentVar0[batchOffset + newIdx] = 0;",
            "group->rowLength[lid]++;",
        ] {
            assert!(lines.contains(&expected), "missing `{}` in\n{}", expected, code);
        }
        assert!(fields.contains("g"));
        assert!(fields.contains("_dependentVar0"));
        assert_eq!(fields.values(0), vec!["d_gSyn".to_string(), "d_xOther".to_string()]);
    }
}
