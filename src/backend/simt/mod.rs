//! Kernel generation for SIMT devices.
//!
//! Each kernel dispatches over merged groups by lane id (see
//! [`super::dispatch`]); a group body binds the member's struct fields,
//! parameters and arrays into an environment and prints the model's code
//! snippet against it. Struct fields are collected while kernels are
//! generated, so struct definitions, memory placement and push functions
//! are emitted last.

mod host_update;

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::codegen::code_stream::CodeStream;
use crate::codegen::environment::{Environment, Scope};
use crate::codegen::pipeline::{compile_snippet, ForEachSynapse};
use crate::codegen::stdlib::add_standard_library;
use crate::error::{Error, Result};
use crate::merged::custom_connectivity::{resolve_type, synapse_arrays};
use crate::merged::fields::StructFields;
use crate::merged::{merge_groups, GroupMerged, MergeableGroup};
use crate::model::{
    CustomConnectivityUpdate, CustomUpdate, DerivedParam, ModelSpec, Var, VarInit, VarRefDecl, VarReference,
};
use crate::types::{ResolvedType, TypeContext};

use super::dispatch::{gen_group, pad_size, DispatchRange};
use super::memory::MemoryPlanner;
use super::rng::{add_init_rng, add_population_rng, gen_host_rng, init_sequence, HOST_RNG};
use super::row_update::{add_row_bindings, LoopBinding, RowUpdateLoop};
use super::{Backend, Kernel};

const CUSTOM_UPDATE: &str = "CustomUpdate";
const CUSTOM_CONNECTIVITY_UPDATE: &str = "CustomConnectivityUpdate";
const CUSTOM_CONNECTIVITY_HOST_UPDATE: &str = "CustomConnectivityHostUpdate";
const CUSTOM_UPDATE_INIT: &str = "CustomUpdateInit";
const PRE_INIT: &str = "CustomConnectivityUpdatePreInit";
const POST_INIT: &str = "CustomConnectivityUpdatePostInit";
const SPARSE_INIT: &str = "CustomConnectivityUpdateSparseInit";

/// Generated device and host code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Merged struct types, device arrays, start-id tables and globals.
    pub definitions: String,
    /// Host functions pushing merged structs to the device.
    pub runner: String,
    /// Update kernels and their host launchers.
    pub custom_update: String,
    /// Initialisation kernels and their host launcher.
    pub init: String,
}

/// Every merged group of a model, by kernel.
pub struct MergedModel<'m> {
    pub custom_updates: Vec<(String, Vec<GroupMerged<'m, CustomUpdate>>)>,
    pub custom_connectivity_updates: Vec<(String, Vec<GroupMerged<'m, CustomConnectivityUpdate>>)>,
    /// Struct arrays of these live on the host.
    pub custom_connectivity_host_updates: Vec<(String, Vec<GroupMerged<'m, CustomConnectivityUpdate>>)>,
    pub custom_update_init: Vec<GroupMerged<'m, CustomUpdate>>,
    pub pre_init: Vec<GroupMerged<'m, CustomConnectivityUpdate>>,
    pub post_init: Vec<GroupMerged<'m, CustomConnectivityUpdate>>,
    pub sparse_init: Vec<GroupMerged<'m, CustomConnectivityUpdate>>,
}

fn has_init(vars: &[Var], init: impl Fn(&str) -> bool) -> bool {
    vars.iter().any(|v| init(&v.name))
}

impl<'m> MergedModel<'m> {
    pub fn new(model: &'m ModelSpec) -> Self {
        let mut custom_updates = Vec::new();
        let mut custom_connectivity_updates = Vec::new();
        let mut custom_connectivity_host_updates = Vec::new();
        let (mut cu_index, mut ccu_index, mut host_index) = (0, 0, 0);
        for name in model.update_groups() {
            let merged = merge_groups(
                CUSTOM_UPDATE,
                cu_index,
                model.custom_updates.iter().filter(|c| c.update_group == name),
                CustomUpdate::update_hash,
            );
            cu_index += merged.len();
            if !merged.is_empty() {
                custom_updates.push((name.clone(), merged));
            }

            let merged = merge_groups(
                CUSTOM_CONNECTIVITY_UPDATE,
                ccu_index,
                model
                    .custom_connectivity_updates
                    .iter()
                    .filter(|c| c.update_group == name && c.model.has_row_update()),
                CustomConnectivityUpdate::update_hash,
            );
            ccu_index += merged.len();
            if !merged.is_empty() {
                custom_connectivity_updates.push((name.clone(), merged));
            }

            let merged = merge_groups(
                CUSTOM_CONNECTIVITY_HOST_UPDATE,
                host_index,
                model
                    .custom_connectivity_updates
                    .iter()
                    .filter(|c| c.update_group == name && c.model.has_host_update()),
                |c, hasher| {
                    c.model.update_hash(hasher);
                    hasher.update_str(&c.update_group);
                },
            );
            host_index += merged.len();
            if !merged.is_empty() {
                custom_connectivity_host_updates.push((name, merged.into_iter().map(GroupMerged::on_host).collect()));
            }
        }

        let ccus = &model.custom_connectivity_updates;
        let custom_update_init = merge_groups(
            CUSTOM_UPDATE_INIT,
            0,
            model
                .custom_updates
                .iter()
                .filter(|c| has_init(&c.model.vars, |v| *c.var_init(v) != VarInit::Uninitialised)),
            CustomUpdate::init_hash,
        );
        let pre_init = merge_groups(
            PRE_INIT,
            0,
            ccus.iter().filter(|c| {
                c.model.uses_rng()
                    || has_init(&c.model.pre_vars, |v| *c.pre_var_init(v) != VarInit::Uninitialised)
            }),
            |c, hasher| {
                c.element_init_hash(&c.model.pre_vars, &c.pre_var_initialisers, hasher);
                hasher.update_bool(c.model.uses_rng());
            },
        );
        let post_init = merge_groups(
            POST_INIT,
            0,
            ccus.iter()
                .filter(|c| has_init(&c.model.post_vars, |v| *c.post_var_init(v) != VarInit::Uninitialised)),
            |c, hasher| c.element_init_hash(&c.model.post_vars, &c.post_var_initialisers, hasher),
        );
        let sparse_init = merge_groups(
            SPARSE_INIT,
            0,
            ccus.iter()
                .filter(|c| has_init(&c.model.vars, |v| *c.var_init(v) != VarInit::Uninitialised)),
            CustomConnectivityUpdate::sparse_init_hash,
        );

        Self {
            custom_updates,
            custom_connectivity_updates,
            custom_connectivity_host_updates,
            custom_update_init,
            pre_init,
            post_init,
            sparse_init,
        }
    }

    /// Number of merged groups across all kernels.
    pub fn len(&self) -> usize {
        self.custom_updates.iter().map(|(_, g)| g.len()).sum::<usize>()
            + self.custom_connectivity_updates.iter().map(|(_, g)| g.len()).sum::<usize>()
            + self.custom_connectivity_host_updates.iter().map(|(_, g)| g.len()).sum::<usize>()
            + self.custom_update_init.len()
            + self.pre_init.len()
            + self.post_init.len()
            + self.sparse_init.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A name backed by one device array per member.
#[derive(Clone, Debug)]
struct ArrayBinding {
    name: String,
    ty: ResolvedType,
    read_only: bool,
    duplicated: bool,
    values: Vec<String>,
}

impl ArrayBinding {
    fn binding_ty(&self) -> ResolvedType {
        if self.read_only {
            self.ty.clone().add_const()
        } else {
            self.ty.clone()
        }
    }
}

/// Bind each array's element at `index(array)`.
fn bind_elements(
    env: &mut Environment<'_>,
    arrays: &[ArrayBinding],
    index: impl Fn(&ArrayBinding) -> String,
) -> Result<()> {
    for array in arrays {
        let values = array.values.clone();
        env.add_field(
            &array.name,
            array.binding_ty(),
            &format!("group->{}[{}]", array.name, index(array)),
            &array.name,
            array.ty.clone().pointer(),
            Rc::new(move |g| values[g].clone()),
        )?;
    }
    Ok(())
}

/// Bind each array's pointer as `{prefix}{name}`.
fn bind_pointers(env: &mut Environment<'_>, arrays: &[ArrayBinding], prefix: &str) -> Result<()> {
    for array in arrays {
        add_pointer_field(
            env,
            &format!("{}{}", prefix, array.name),
            &array.name,
            array.ty.clone(),
            array.values.clone(),
        )?;
    }
    Ok(())
}

fn add_count_field(env: &mut Environment<'_>, name: &str, field: &str, counts: Vec<u32>) -> Result<()> {
    env.add_field(
        name,
        ResolvedType::UINT32.add_const(),
        &format!("group->{}", field),
        field,
        ResolvedType::UINT32,
        Rc::new(move |g| counts[g].to_string()),
    )
}

fn add_pointer_field(
    env: &mut Environment<'_>,
    name: &str,
    field: &str,
    element: ResolvedType,
    values: Vec<String>,
) -> Result<()> {
    let ty = element.pointer();
    env.add_field(
        name,
        ty.clone(),
        &format!("group->{}", field),
        field,
        ty,
        Rc::new(move |g| values[g].clone()),
    )
}

fn collect_tables<G: MergeableGroup>(
    tables: &mut Vec<(String, Vec<u32>)>,
    groups: &[GroupMerged<'_, G>],
    ranges: Vec<DispatchRange>,
) {
    for (merged, range) in groups.iter().zip(ranges) {
        if range.start_ids.len() > 1 {
            tables.push((merged.start_id_table(), range.start_ids));
        }
    }
}

/// Everything the element initialisation of one merged group needs.
struct ElementInit<'a> {
    label: String,
    count_name: &'static str,
    count_field: &'static str,
    counts: Vec<u32>,
    vars: &'a [Var],
    /// `[member][var]`.
    inits: Vec<Vec<VarInit>>,
    arrays: Vec<ArrayBinding>,
    batch_size: u32,
    /// Device RNG state arrays to seed, one per member.
    population_rng: Option<Vec<String>>,
}

/// A host launch of one kernel.
struct Launch {
    kernel: String,
    blocks: u32,
    block_size: u32,
}

/// Generates every kernel of a model for backend `B`.
pub struct SimtCodegen<'a, B: Backend + ?Sized> {
    backend: &'a B,
    model: &'a ModelSpec,
    context: TypeContext,
}

impl<'a, B: Backend + ?Sized> SimtCodegen<'a, B> {
    pub fn new(backend: &'a B, model: &'a ModelSpec) -> Self {
        Self {
            backend,
            model,
            context: TypeContext::new(model.precision),
        }
    }

    pub fn generate(&self) -> Result<GeneratedCode> {
        let mut merged = MergedModel::new(self.model);
        let mut tables = Vec::new();
        let custom_update = self.gen_custom_updates(&mut merged, &mut tables)?;
        let mut globals = CodeStream::new();
        let init = self.gen_init(&mut merged, &mut globals, &mut tables)?;

        let mut definitions = CodeStream::new();
        let mut runner = CodeStream::new();
        self.gen_merged_structs(&merged, &mut definitions, &mut runner)?;
        for (name, ids) in &tables {
            self.backend.gen_start_id_table(&mut definitions, name, ids);
        }
        definitions.append_block(globals.as_str());

        info!(
            model = %self.model.name,
            backend = self.backend.name(),
            merged_groups = merged.len(),
            "generated model"
        );
        Ok(GeneratedCode {
            definitions: definitions.into_string(),
            runner: runner.into_string(),
            custom_update,
            init,
        })
    }

    fn scalar(&self) -> &'static str {
        self.model.precision.name()
    }

    /// Open a kernel, bind what every kernel body sees and run `body`.
    fn gen_kernel<F>(&self, os: &mut CodeStream, kernel: Kernel, name: &str, params: &str, preamble: &[String], body: F) -> Result<()>
    where
        F: FnOnce(&mut Environment<'_>) -> Result<()>,
    {
        let block_size = self.backend.block_size(kernel);
        os.line(&format!("{}{}({})", self.backend.kernel_prefix(), name, params));
        os.line("{");
        os.line(&format!(
            "const unsigned int id = {} * {} + {};",
            block_size,
            self.backend.block_id(),
            self.backend.thread_id()
        ));
        for line in preamble {
            os.line(line);
        }
        {
            let mut env = Environment::root(os);
            let precision = self.model.precision;
            env.add("id", ResolvedType::UINT32.add_const(), "id")?;
            env.add(
                "dt",
                ResolvedType::value(precision).add_const(),
                &precision.write_literal(self.model.dt),
            )?;
            env.add("batch_size", ResolvedType::UINT32.add_const(), &format!("{}u", self.model.batch_size))?;
            add_standard_library(&mut env);
            body(&mut env)?;
        }
        os.line("}");
        os.blank();
        Ok(())
    }

    /// Launch `launches` in order, then run `host` code.
    fn gen_launcher(&self, os: &mut CodeStream, signature: &str, launches: &[Launch], args: &str, host: &str) {
        os.line(signature);
        os.line("{");
        for launch in launches {
            self.backend
                .gen_kernel_launch(os, &launch.kernel, launch.blocks, launch.block_size, args);
        }
        os.append_block(host);
        os.line("}");
        os.blank();
    }

    fn gen_custom_updates(&self, merged: &mut MergedModel<'_>, tables: &mut Vec<(String, Vec<u32>)>) -> Result<String> {
        let mut os = CodeStream::new();
        let mut launchers = CodeStream::new();
        let scalar = self.scalar();
        let time = ResolvedType::value(self.model.precision).add_const();
        let batch_size = self.model.batch_size;

        for name in self.model.update_groups() {
            let mut launches = Vec::new();

            if let Some((_, groups)) = merged.custom_updates.iter_mut().find(|(n, _)| *n == name) {
                let kernel = format!("{}{}", Kernel::CustomUpdate.name(), name);
                let block_size = self.backend.block_size(Kernel::CustomUpdate);
                let mut id_start = 0;
                self.gen_kernel(&mut os, Kernel::CustomUpdate, &kernel, &format!("{} t", scalar), &[], |env| {
                    env.add("t", time.clone(), "t")?;
                    let lanes = |cu: &CustomUpdate| {
                        if cu.batched && batch_size > 1 {
                            pad_size(cu.size, block_size) * batch_size
                        } else {
                            cu.size
                        }
                    };
                    let ranges = gen_group(env, groups, &mut id_start, block_size, lanes, |group_env, m| {
                        self.gen_custom_update_group(group_env, m, block_size)
                    })?;
                    collect_tables(tables, groups, ranges);
                    Ok(())
                })?;
                info!(kernel = %kernel, groups = groups.len(), lanes = id_start, "generated kernel");
                launches.push(Launch {
                    kernel,
                    blocks: id_start / block_size,
                    block_size,
                });
            }

            if let Some((_, groups)) = merged
                .custom_connectivity_updates
                .iter_mut()
                .find(|(n, _)| *n == name)
            {
                let kernel = format!("{}{}", Kernel::CustomConnectivityUpdate.name(), name);
                let block_size = self.backend.block_size(Kernel::CustomConnectivityUpdate);
                let mut id_start = 0;
                self.gen_kernel(
                    &mut os,
                    Kernel::CustomConnectivityUpdate,
                    &kernel,
                    &format!("{} t", scalar),
                    &[],
                    |env| {
                        env.add("t", time.clone(), "t")?;
                        let ranges = gen_group(
                            env,
                            groups,
                            &mut id_start,
                            block_size,
                            |c: &CustomConnectivityUpdate| c.synapse_group.num_pre,
                            |group_env, m| self.gen_custom_connectivity_update_group(group_env, m),
                        )?;
                        collect_tables(tables, groups, ranges);
                        Ok(())
                    },
                )?;
                info!(kernel = %kernel, groups = groups.len(), lanes = id_start, "generated kernel");
                launches.push(Launch {
                    kernel,
                    blocks: id_start / block_size,
                    block_size,
                });
            }

            let mut host = CodeStream::new();
            if let Some((_, groups)) = merged
                .custom_connectivity_host_updates
                .iter_mut()
                .find(|(n, _)| *n == name)
            {
                for group in groups.iter_mut() {
                    self.gen_host_update_group(&mut host, group)?;
                }
                info!(update_group = %name, groups = groups.len(), "generated host update");
            }

            self.gen_launcher(
                &mut launchers,
                &format!("void update{}({} t)", name, scalar),
                &launches,
                "t",
                host.as_str(),
            );
        }

        os.append_block(launchers.as_str());
        Ok(os.into_string())
    }

    fn gen_init(
        &self,
        merged: &mut MergedModel<'_>,
        globals: &mut CodeStream,
        tables: &mut Vec<(String, Vec<u32>)>,
    ) -> Result<String> {
        let mut os = CodeStream::new();
        let mut launches = Vec::new();
        let seed_param = "unsigned long long deviceRNGSeed";

        if self.init_requires_rng() {
            let kernel = self.backend.gen_global_rng(globals, &mut os);
            os.blank();
            launches.push(Launch {
                kernel,
                blocks: 1,
                block_size: 1,
            });
        }

        let block_size = self.backend.block_size(Kernel::Initialize);
        let mut id_start = 0;
        if !(merged.custom_update_init.is_empty() && merged.pre_init.is_empty() && merged.post_init.is_empty()) {
            let kernel = format!("{}Kernel", Kernel::Initialize.name());
            self.gen_kernel(&mut os, Kernel::Initialize, &kernel, seed_param, &[], |env| {
                let ranges = gen_group(
                    env,
                    &mut merged.custom_update_init,
                    &mut id_start,
                    block_size,
                    |c: &CustomUpdate| c.size,
                    |group_env, m| self.gen_custom_update_init_group(group_env, m),
                )?;
                collect_tables(tables, &merged.custom_update_init, ranges);
                let ranges = gen_group(
                    env,
                    &mut merged.pre_init,
                    &mut id_start,
                    block_size,
                    |c: &CustomConnectivityUpdate| c.synapse_group.num_pre,
                    |group_env, m| self.gen_connectivity_element_init_group(group_env, m, true),
                )?;
                collect_tables(tables, &merged.pre_init, ranges);
                let ranges = gen_group(
                    env,
                    &mut merged.post_init,
                    &mut id_start,
                    block_size,
                    |c: &CustomConnectivityUpdate| c.synapse_group.num_post,
                    |group_env, m| self.gen_connectivity_element_init_group(group_env, m, false),
                )?;
                collect_tables(tables, &merged.post_init, ranges);
                Ok(())
            })?;
            info!(kernel = %kernel, lanes = id_start, "generated kernel");
            launches.push(Launch {
                kernel,
                blocks: id_start / block_size,
                block_size,
            });
        }

        // Sparse initialisation lanes draw from subsequences after these.
        let init_lanes = id_start;
        if !merged.sparse_init.is_empty() {
            let kernel = format!("{}Kernel", Kernel::InitializeSparse.name());
            let block_size = self.backend.block_size(Kernel::InitializeSparse);
            let shared = format!("{}unsigned int shRowLength[{}];", self.backend.shared_prefix(), block_size);
            let mut id_start = 0;
            self.gen_kernel(&mut os, Kernel::InitializeSparse, &kernel, seed_param, &[shared], |env| {
                let ranges = gen_group(
                    env,
                    &mut merged.sparse_init,
                    &mut id_start,
                    block_size,
                    |c: &CustomConnectivityUpdate| c.synapse_group.row_stride,
                    |group_env, m| self.gen_sparse_init_group(group_env, m, block_size, init_lanes),
                )?;
                collect_tables(tables, &merged.sparse_init, ranges);
                Ok(())
            })?;
            info!(kernel = %kernel, lanes = id_start, rng_offset = init_lanes, "generated kernel");
            launches.push(Launch {
                kernel,
                blocks: id_start / block_size,
                block_size,
            });
        }

        os.line("void initialize()");
        os.line("{");
        os.line(&format!("const unsigned long long deviceRNGSeed = {}ull;", self.model.seed));
        if self.host_requires_rng() {
            os.line(&format!("{}.seed(deviceRNGSeed);", HOST_RNG));
        }
        for launch in &launches {
            self.backend
                .gen_kernel_launch(&mut os, &launch.kernel, launch.blocks, launch.block_size, "deviceRNGSeed");
        }
        os.line("}");
        Ok(os.into_string())
    }

    fn host_requires_rng(&self) -> bool {
        self.model
            .custom_connectivity_updates
            .iter()
            .any(|c| c.model.has_host_update() && c.model.uses_host_rng())
    }

    fn init_requires_rng(&self) -> bool {
        let cu = self
            .model
            .custom_updates
            .iter()
            .any(|c| c.var_initialisers.values().any(VarInit::requires_rng));
        let ccu = self.model.custom_connectivity_updates.iter().any(|c| {
            c.var_initialisers
                .values()
                .chain(c.pre_var_initialisers.values())
                .chain(c.post_var_initialisers.values())
                .any(VarInit::requires_rng)
        });
        cu || ccu
    }

    fn var_arrays(&self, vars: &[Var], owners: &[String]) -> Result<Vec<ArrayBinding>> {
        vars.iter()
            .map(|var| {
                Ok(ArrayBinding {
                    name: var.name.clone(),
                    ty: resolve_type(&self.context, &var.ty)?,
                    read_only: var.access.is_read_only(),
                    duplicated: var.access.is_duplicated(),
                    values: owners.iter().map(|o| format!("d_{}{}", var.name, o)).collect(),
                })
            })
            .collect()
    }

    fn ref_arrays(
        &self,
        decls: &[VarRefDecl],
        members: &[(&str, &IndexMap<String, VarReference>)],
    ) -> Result<Vec<ArrayBinding>> {
        let mut arrays = Vec::with_capacity(decls.len());
        for decl in decls {
            let mut refs = Vec::with_capacity(members.len());
            for (owner, references) in members {
                let reference = references.get(&decl.name).ok_or_else(|| Error::InconsistentGroup {
                    group: owner.to_string(),
                    message: format!("variable reference '{}' is not bound", decl.name),
                })?;
                refs.push(reference);
            }
            arrays.push(ArrayBinding {
                name: decl.name.clone(),
                ty: resolve_type(&self.context, &decl.ty)?,
                read_only: decl.read_only,
                duplicated: refs[0].duplicated,
                values: refs.iter().map(|r| r.device_name()).collect(),
            });
        }
        Ok(arrays)
    }

    /// Bind parameters and derived parameters; heterogeneous ones become
    /// struct fields.
    fn add_params(
        &self,
        env: &mut Environment<'_>,
        params: &[String],
        derived: &[DerivedParam],
        members: Vec<(String, IndexMap<String, f64>)>,
    ) -> Result<()> {
        for (owner, values) in &members {
            if let Some(missing) = params.iter().find(|p| !values.contains_key(*p)) {
                return Err(Error::InconsistentGroup {
                    group: owner.clone(),
                    message: format!("parameter '{}' has no value", missing),
                });
            }
        }
        let dt = self.model.dt;
        let derived_values: Vec<IndexMap<String, f64>> = members
            .iter()
            .map(|(_, values)| derived.iter().map(|d| (d.name.clone(), (d.func)(values, dt))).collect())
            .collect();
        let values: Vec<IndexMap<String, f64>> = members.into_iter().map(|(_, v)| v).collect();
        let count = values.len();
        let precision = self.model.precision;

        env.add_params(params, "", precision, count, move |g, name| {
            values[g].get(name).copied().unwrap_or_default()
        })?;
        let names: Vec<String> = derived.iter().map(|d| d.name.clone()).collect();
        env.add_params(&names, "", precision, count, move |g, name| {
            derived_values[g].get(name).copied().unwrap_or_default()
        })
    }

    fn add_egps(&self, env: &mut Environment<'_>, egps: &[(String, String)], owners: &[String]) -> Result<()> {
        for (name, ty) in egps {
            let ty = resolve_type(&self.context, ty)?;
            let values: Vec<String> = owners.iter().map(|o| format!("d_{}{}", name, o)).collect();
            env.add_field(
                name,
                ty.clone(),
                &format!("group->{}", name),
                name,
                ty,
                Rc::new(move |g| values[g].clone()),
            )?;
        }
        Ok(())
    }

    fn gen_custom_update_group(
        &self,
        env: &mut Environment<'_>,
        merged: &mut GroupMerged<'_, CustomUpdate>,
        block_size: u32,
    ) -> Result<()> {
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let model = &archetype.model;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let batched = archetype.batched && self.model.batch_size > 1;
        let vars = self.var_arrays(&model.vars, &owners)?;
        let refs = self.ref_arrays(
            &model.var_refs,
            &members
                .iter()
                .map(|m| (m.name.as_str(), &m.var_references))
                .collect::<Vec<_>>(),
        )?;
        debug!(group = %merged.struct_name(), batched, "custom update body");

        let lid = env.get_name("id", None)?;
        let mut env = Environment::with_fields(env, &mut merged.fields);
        let const_uint = ResolvedType::UINT32.add_const();
        add_count_field(&mut env, "size", "size", members.iter().map(|m| m.size).collect())?;
        if batched {
            let padded = env.add_initialiser(&format!(
                "const unsigned int paddedSize = {} * (($(size) + {} - 1) / {});",
                block_size, block_size, block_size
            ));
            env.add_with_initialisers("_padded_size", const_uint.clone(), "paddedSize", &[padded])?;
            let bid = env.add_initialiser(&format!("const unsigned int bid = {} % $(_padded_size);", lid));
            env.add_with_initialisers("id", const_uint.clone(), "bid", &[bid])?;
            let batch = env.add_initialiser(&format!("const unsigned int batch = {} / $(_padded_size);", lid));
            env.add_with_initialisers("batch", const_uint.clone(), "batch", &[batch])?;
            let offset = env.add_initialiser("const unsigned int batchOffset = $(size) * $(batch);");
            env.add_with_initialisers("_batch_offset", const_uint, "batchOffset", &[offset])?;
        } else {
            env.add("id", const_uint.clone(), &lid)?;
            env.add("batch", const_uint, "0")?;
        }

        let index = |duplicated: bool| {
            if duplicated && batched {
                "$(_batch_offset) + $(id)".to_string()
            } else {
                "$(id)".to_string()
            }
        };
        bind_elements(&mut env, &vars, |a| index(a.duplicated))?;
        bind_elements(&mut env, &refs, |a| index(a.duplicated))?;
        self.add_params(
            &mut env,
            &model.params,
            &model.derived_params,
            members.iter().map(|m| (m.name.clone(), m.params.clone())).collect(),
        )?;
        self.add_egps(&mut env, &model.extra_global_params, &owners)?;

        env.print_line("if($(id) < $(size))")?;
        env.stream().line("{");
        compile_snippet(
            &model.update_code,
            &format!("custom update '{}' update code", archetype.name),
            &self.context,
            &mut env,
            None,
        )?;
        env.stream().line("}");
        Ok(())
    }

    fn gen_custom_connectivity_update_group(
        &self,
        env: &mut Environment<'_>,
        merged: &mut GroupMerged<'_, CustomConnectivityUpdate>,
    ) -> Result<()> {
        let arrays = synapse_arrays(merged, &self.context)?;
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let model = &archetype.model;
        let batch_size = self.model.batch_size;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let connectivity: Vec<String> = members.iter().map(|m| m.synapse_group.name.clone()).collect();
        let pre_vars = self.var_arrays(&model.pre_vars, &owners)?;
        let pre_refs = self.ref_arrays(
            &model.pre_var_refs,
            &members
                .iter()
                .map(|m| (m.name.as_str(), &m.pre_var_references))
                .collect::<Vec<_>>(),
        )?;
        let mut post = self.var_arrays(&model.post_vars, &owners)?;
        post.extend(self.ref_arrays(
            &model.post_var_refs,
            &members
                .iter()
                .map(|m| (m.name.as_str(), &m.post_var_references))
                .collect::<Vec<_>>(),
        )?);
        debug!(group = %merged.struct_name(), arrays = arrays.len(), "connectivity update body");

        let lid = env.get_name("id", None)?;
        let mut env = Environment::with_fields(env, &mut merged.fields);
        env.add("id_pre", ResolvedType::UINT32.add_const(), &lid)?;
        add_count_field(
            &mut env,
            "num_pre",
            "numSrcNeurons",
            members.iter().map(|m| m.synapse_group.num_pre).collect(),
        )?;
        add_count_field(
            &mut env,
            "num_post",
            "numTrgNeurons",
            members.iter().map(|m| m.synapse_group.num_post).collect(),
        )?;
        add_count_field(
            &mut env,
            "_row_stride",
            "rowStride",
            members.iter().map(|m| m.synapse_group.row_stride).collect(),
        )?;
        add_pointer_field(
            &mut env,
            "_row_length",
            "rowLength",
            ResolvedType::UINT32,
            connectivity.iter().map(|c| format!("d_rowLength{}", c)).collect(),
        )?;
        add_pointer_field(
            &mut env,
            "_ind",
            "ind",
            ResolvedType::UINT32,
            connectivity.iter().map(|c| format!("d_ind{}", c)).collect(),
        )?;
        add_row_bindings(&mut env, self.backend, &arrays, batch_size)?;
        self.add_params(
            &mut env,
            &model.params,
            &model.derived_params,
            members.iter().map(|m| (m.name.clone(), m.params.clone())).collect(),
        )?;
        self.add_egps(&mut env, &model.extra_global_params, &owners)?;
        bind_elements(&mut env, &pre_vars, |_| "$(id_pre)".to_string())?;
        bind_elements(&mut env, &pre_refs, |_| "$(id_pre)".to_string())?;
        bind_pointers(&mut env, &post, "_post_")?;
        if model.uses_rng() {
            add_population_rng(
                &mut env,
                self.backend,
                self.model.precision,
                "$(id_pre)",
                owners.iter().map(|o| format!("d_rng{}", o)).collect(),
            )?;
        }

        let post_bindings = post.iter().map(|a| LoopBinding {
            name: a.name.clone(),
            ty: a.binding_ty(),
            template: format!("$(_post_{})[$(id_post)]", a.name),
        });
        let mut row_loop = RowUpdateLoop::new(&arrays, batch_size).with_bindings(post_bindings);
        let names = row_loop.names();

        env.print_line("if($(id_pre) < $(num_pre))")?;
        env.stream().line("{");
        compile_snippet(
            &model.row_update_code,
            &format!("custom connectivity update '{}' row update code", archetype.name),
            &self.context,
            &mut env,
            Some(ForEachSynapse {
                names: &names,
                handler: &mut row_loop,
            }),
        )?;
        env.stream().line("}");
        Ok(())
    }

    fn gen_custom_update_init_group(
        &self,
        env: &mut Environment<'_>,
        merged: &mut GroupMerged<'_, CustomUpdate>,
    ) -> Result<()> {
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let vars = &archetype.model.vars;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let init = ElementInit {
            label: format!("custom update '{}'", archetype.name),
            count_name: "size",
            count_field: "size",
            counts: members.iter().map(|m| m.size).collect(),
            vars,
            inits: members
                .iter()
                .map(|m| vars.iter().map(|v| m.var_init(&v.name).clone()).collect())
                .collect(),
            arrays: self.var_arrays(vars, &owners)?,
            batch_size: if archetype.batched { self.model.batch_size } else { 1 },
            population_rng: None,
        };
        self.gen_element_init(env, &mut merged.fields, init)
    }

    fn gen_connectivity_element_init_group(
        &self,
        env: &mut Environment<'_>,
        merged: &mut GroupMerged<'_, CustomConnectivityUpdate>,
        pre: bool,
    ) -> Result<()> {
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let model = &archetype.model;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let (vars, count_name, count_field) = if pre {
            (&model.pre_vars, "num_pre", "numSrcNeurons")
        } else {
            (&model.post_vars, "num_post", "numTrgNeurons")
        };
        let init = ElementInit {
            label: format!("custom connectivity update '{}'", archetype.name),
            count_name,
            count_field,
            counts: members
                .iter()
                .map(|m| if pre { m.synapse_group.num_pre } else { m.synapse_group.num_post })
                .collect(),
            vars,
            inits: members
                .iter()
                .map(|m| {
                    vars.iter()
                        .map(|v| {
                            let init = if pre { m.pre_var_init(&v.name) } else { m.post_var_init(&v.name) };
                            init.clone()
                        })
                        .collect()
                })
                .collect(),
            arrays: self.var_arrays(vars, &owners)?,
            batch_size: 1,
            population_rng: (pre && model.uses_rng())
                .then(|| owners.iter().map(|o| format!("d_rng{}", o)).collect()),
        };
        self.gen_element_init(env, &mut merged.fields, init)
    }

    fn gen_element_init(&self, env: &mut Environment<'_>, fields: &mut StructFields, init: ElementInit<'_>) -> Result<()> {
        let lid = env.get_name("id", None)?;
        let mut env = Environment::with_fields(env, fields);
        add_count_field(&mut env, init.count_name, init.count_field, init.counts)?;
        env.add("id", ResolvedType::UINT32.add_const(), &lid)?;
        bind_pointers(&mut env, &init.arrays, "_array_")?;
        let seeds_rng = init.population_rng.is_some();
        if let Some(states) = init.population_rng {
            add_pointer_field(&mut env, "_array_rng", "rng", self.backend.population_rng_type(), states)?;
        }

        env.print_line(&format!("if($(id) < $({}))", init.count_name))?;
        env.stream().line("{");
        {
            let mut guard = Environment::new(&mut env);
            if seeds_rng {
                let seed = self
                    .backend
                    .population_rng_init("deviceRNGSeed", "id", "$(_array_rng)[$(id)]");
                guard.print_line(&seed)?;
            }
            if init.inits.iter().flatten().any(VarInit::requires_rng) {
                add_init_rng(&mut guard, self.backend, self.model.precision, &init_sequence("id", 0))?;
            }
            let batch = (init.batch_size > 1).then_some((init.batch_size, init.count_name));
            self.gen_var_inits(&mut guard, init.vars, &init.inits, "$(id)", batch, &init.label)?;
        }
        env.stream().line("}");
        Ok(())
    }

    /// Initialise each variable into `initVal`, then store it at `index`.
    /// With `batch`, duplicated variables are stored in every batch copy,
    /// copies being `count` elements apart.
    fn gen_var_inits(
        &self,
        env: &mut Environment<'_>,
        vars: &[Var],
        inits: &[Vec<VarInit>],
        index: &str,
        batch: Option<(u32, &str)>,
        label: &str,
    ) -> Result<()> {
        for (v, var) in vars.iter().enumerate() {
            let init = &inits[0][v];
            let Some(snippet) = init.snippet() else {
                continue;
            };
            let ty = resolve_type(&self.context, &var.ty)?;
            env.stream().line("{");
            {
                let mut var_env = Environment::new(&mut *env);
                var_env.stream().line(&format!("{} initVal;", ty.name()));
                var_env.add("value", ty.clone(), "initVal")?;
                if let VarInit::Constant(_) = init {
                    let constants: Vec<f64> = inits.iter().map(|m| m[v].constant()).collect();
                    let numeric = ty.numeric().unwrap_or(self.model.precision);
                    var_env.add_params(
                        &["constant".to_string()],
                        &var.name,
                        numeric,
                        constants.len(),
                        move |g, _| constants[g],
                    )?;
                }
                compile_snippet(
                    &snippet,
                    &format!("{} variable '{}' initialisation", label, var.name),
                    &self.context,
                    &mut var_env,
                    None,
                )?;

                let target = format!("$(_array_{})", var.name);
                match batch {
                    Some((batch_size, count)) if var.access.is_duplicated() => {
                        var_env
                            .stream()
                            .line(&format!("for(unsigned int b = 0; b < {}; b++)", batch_size));
                        var_env.stream().line("{");
                        var_env.print_line(&format!("{}[(b * $({})) + {}] = initVal;", target, count, index))?;
                        var_env.stream().line("}");
                    }
                    _ => var_env.print_line(&format!("{}[{}] = initVal;", target, index))?,
                }
            }
            env.stream().line("}");
        }
        Ok(())
    }

    /// One lane per column slot; rows are walked in blocks whose lengths
    /// are staged in shared memory.
    fn gen_sparse_init_group(
        &self,
        env: &mut Environment<'_>,
        merged: &mut GroupMerged<'_, CustomConnectivityUpdate>,
        block_size: u32,
        rng_offset: u32,
    ) -> Result<()> {
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let vars = &archetype.model.vars;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let connectivity: Vec<String> = members.iter().map(|m| m.synapse_group.name.clone()).collect();
        let inits: Vec<Vec<VarInit>> = members
            .iter()
            .map(|m| vars.iter().map(|v| m.var_init(&v.name).clone()).collect())
            .collect();
        let arrays = self.var_arrays(vars, &owners)?;
        let label = format!("custom connectivity update '{}'", archetype.name);
        let tid = self.backend.thread_id();
        let barrier = self.backend.barrier();

        let lid = env.get_name("id", None)?;
        let mut env = Environment::with_fields(env, &mut merged.fields);
        add_count_field(
            &mut env,
            "num_pre",
            "numSrcNeurons",
            members.iter().map(|m| m.synapse_group.num_pre).collect(),
        )?;
        add_count_field(
            &mut env,
            "_row_stride",
            "rowStride",
            members.iter().map(|m| m.synapse_group.row_stride).collect(),
        )?;
        add_pointer_field(
            &mut env,
            "_row_length",
            "rowLength",
            ResolvedType::UINT32,
            connectivity.iter().map(|c| format!("d_rowLength{}", c)).collect(),
        )?;
        add_pointer_field(
            &mut env,
            "_ind",
            "ind",
            ResolvedType::UINT32,
            connectivity.iter().map(|c| format!("d_ind{}", c)).collect(),
        )?;
        bind_pointers(&mut env, &arrays, "_array_")?;
        if inits.iter().flatten().any(VarInit::requires_rng) {
            add_init_rng(
                &mut env,
                self.backend,
                self.model.precision,
                &init_sequence("id", rng_offset),
            )?;
        }

        env.print_line(&format!(
            "const unsigned int numBlocks = ($(num_pre) + {} - 1) / {};",
            block_size, block_size
        ))?;
        env.stream().line(&format!("unsigned int idx = {};", lid));
        env.stream().line("for(unsigned int r = 0; r < numBlocks; r++)");
        env.stream().line("{");
        env.print_line(&format!(
            "const unsigned int numRowsInBlock = (r == (numBlocks - 1)) ? ((($(num_pre) - 1) % {}) + 1) : {};",
            block_size, block_size
        ))?;
        env.stream().line(&format!("{};", barrier));
        env.stream().line(&format!("if({} < numRowsInBlock)", tid));
        env.stream().line("{");
        env.print_line(&format!(
            "shRowLength[{}] = $(_row_length)[(r * {}) + {}];",
            tid, block_size, tid
        ))?;
        env.stream().line("}");
        env.stream().line(&format!("{};", barrier));
        env.stream().line("for(unsigned int i = 0; i < numRowsInBlock; i++)");
        env.stream().line("{");
        env.stream().line(&format!("if({} < shRowLength[i])", lid));
        env.stream().line("{");
        {
            let mut synapse_env = Environment::new(&mut env);
            let const_uint = ResolvedType::UINT32.add_const();
            synapse_env.add("id_pre", const_uint.clone(), &format!("((r * {}) + i)", block_size))?;
            synapse_env.add("id_post", const_uint.clone(), "$(_ind)[idx]")?;
            synapse_env.add("id_syn", const_uint, "idx")?;
            self.gen_var_inits(&mut synapse_env, vars, &inits, "idx", None, &label)?;
        }
        env.stream().line("}");
        env.print_line("idx += $(_row_stride);")?;
        env.stream().line("}");
        env.stream().line("}");
        Ok(())
    }

    fn gen_merged_structs(&self, merged: &MergedModel<'_>, definitions: &mut CodeStream, runner: &mut CodeStream) -> Result<()> {
        let mut planner = MemoryPlanner::new(self.backend.merged_struct_spaces());
        let mut push_calls = CodeStream::new();
        for group in merged.custom_updates.iter().flat_map(|(_, g)| g) {
            self.gen_merged_struct(group, &mut planner, definitions, runner, &mut push_calls)?;
        }
        for group in merged.custom_connectivity_updates.iter().flat_map(|(_, g)| g) {
            self.gen_merged_struct(group, &mut planner, definitions, runner, &mut push_calls)?;
        }
        for group in &merged.custom_update_init {
            self.gen_merged_struct(group, &mut planner, definitions, runner, &mut push_calls)?;
        }
        for group in merged.pre_init.iter().chain(&merged.post_init).chain(&merged.sparse_init) {
            self.gen_merged_struct(group, &mut planner, definitions, runner, &mut push_calls)?;
        }
        for group in merged.custom_connectivity_host_updates.iter().flat_map(|(_, g)| g) {
            self.gen_host_merged_struct(group, definitions, runner, &mut push_calls);
        }
        if self.host_requires_rng() {
            gen_host_rng(definitions, self.model.precision);
            definitions.blank();
        }

        runner.line("void pushMergedGroups()");
        runner.line("{");
        runner.append_block(push_calls.as_str());
        runner.line("}");
        Ok(())
    }

    fn gen_merged_struct<G: MergeableGroup>(
        &self,
        merged: &GroupMerged<'_, G>,
        planner: &mut MemoryPlanner,
        definitions: &mut CodeStream,
        runner: &mut CodeStream,
        push_calls: &mut CodeStream,
    ) -> Result<()> {
        let struct_name = merged.struct_name();
        let array = merged.device_array();
        merged.fields.write_definition(definitions, &struct_name);
        let space = planner.place(&struct_name, merged.array_bytes())?;
        self.backend
            .gen_merged_struct_array(definitions, &space, &struct_name, &array, merged.groups().len());
        definitions.blank();

        let mut params = "unsigned int idx".to_string();
        if !merged.fields.is_empty() {
            params.push_str(", ");
            params.push_str(&merged.fields.argument_list());
        }
        let names: Vec<String> = merged.fields.sorted().iter().map(|f| f.name.clone()).collect();
        runner.line(&format!(
            "void pushMerged{}Group{}ToDevice({})",
            merged.kind(),
            merged.index(),
            params
        ));
        runner.line("{");
        runner.line(&format!("{} group = {{{}}};", struct_name, names.join(", ")));
        self.backend.gen_merged_struct_push(runner, &struct_name, &array);
        runner.line("}");
        runner.blank();

        merged.gen_push_calls(push_calls);
        Ok(())
    }
}
