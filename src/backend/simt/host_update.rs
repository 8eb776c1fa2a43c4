//! Host update code of custom connectivity updates.
//!
//! Each merged group becomes a loop over a host array of structs, run from
//! the update group's launcher once its kernels have been launched. Pre-
//! and postsynaptic variables are bound as host pointers, with
//! `push{V}ToDevice()` and `pull{V}FromDevice()` copying them whole.

use std::rc::Rc;

use tracing::debug;

use crate::backend::rng::add_host_rng;
use crate::backend::Backend;
use crate::codegen::code_stream::CodeStream;
use crate::codegen::environment::Environment;
use crate::codegen::pipeline::compile_snippet;
use crate::codegen::stdlib::add_standard_library;
use crate::error::Result;
use crate::merged::custom_connectivity::resolve_type;
use crate::merged::GroupMerged;
use crate::model::{CustomConnectivityUpdate, Var};
use crate::types::ResolvedType;

use super::{add_count_field, SimtCodegen};

fn add_host_pointer(env: &mut Environment<'_>, name: &str, field: &str, ty: ResolvedType, values: Vec<String>) -> Result<()> {
    env.add_field(
        name,
        ty.clone(),
        &format!("group->{}", field),
        field,
        ty,
        Rc::new(move |g| values[g].clone()),
    )
}

impl<B: Backend + ?Sized> SimtCodegen<'_, B> {
    /// Bind `vars` as host and device pointers plus whole-array copies of
    /// `$(count)` elements.
    fn add_host_vars(&self, env: &mut Environment<'_>, vars: &[Var], owners: &[String], count: &str) -> Result<()> {
        for var in vars {
            let element = resolve_type(&self.context, &var.ty)?;
            let pointer = element.clone().pointer();
            add_host_pointer(
                env,
                &var.name,
                &var.name,
                pointer.clone(),
                owners.iter().map(|o| format!("{}{}", var.name, o)).collect(),
            )?;
            let device = format!("d_{}", var.name);
            add_host_pointer(
                env,
                &format!("_{}", device),
                &device,
                pointer,
                owners.iter().map(|o| format!("{}{}", device, o)).collect(),
            )?;

            let host = format!("$({})", var.name);
            let device = format!("$(_d_{})", var.name);
            let copy = ResolvedType::function(ResolvedType::VOID, Vec::new());
            env.add(
                &format!("push{}ToDevice", var.name),
                copy.clone(),
                &self.backend.variable_push(&host, &device, &element, count),
            )?;
            env.add(
                &format!("pull{}FromDevice", var.name),
                copy,
                &self.backend.variable_pull(&host, &device, &element, count),
            )?;
        }
        Ok(())
    }

    /// Extra global parameters are host pointers; copies take their element
    /// count as argument.
    fn add_host_egps(&self, env: &mut Environment<'_>, egps: &[(String, String)], owners: &[String]) -> Result<()> {
        for (name, ty) in egps {
            let ty = resolve_type(&self.context, ty)?;
            add_host_pointer(
                env,
                name,
                name,
                ty.clone(),
                owners.iter().map(|o| format!("{}{}", name, o)).collect(),
            )?;
            let device = format!("d_{}", name);
            add_host_pointer(
                env,
                &format!("_{}", device),
                &device,
                ty.clone(),
                owners.iter().map(|o| format!("{}{}", device, o)).collect(),
            )?;

            let Some(element) = ty.pointee() else {
                continue;
            };
            let host = format!("$({})", name);
            let device = format!("$(_d_{})", name);
            let copy = ResolvedType::function(ResolvedType::VOID, vec![ResolvedType::UINT32]);
            env.add(
                &format!("push{}ToDevice", name),
                copy.clone(),
                &self.backend.variable_push(&host, &device, element, "$(0)"),
            )?;
            env.add(
                &format!("pull{}FromDevice", name),
                copy,
                &self.backend.variable_pull(&host, &device, element, "$(0)"),
            )?;
        }
        Ok(())
    }

    /// Loop over the members of one merged host update group.
    pub(super) fn gen_host_update_group(
        &self,
        os: &mut CodeStream,
        merged: &mut GroupMerged<'_, CustomConnectivityUpdate>,
    ) -> Result<()> {
        let members = merged.groups().to_vec();
        let archetype = merged.archetype();
        let model = &archetype.model;
        let owners: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let precision = self.model.precision;
        debug!(group = %merged.struct_name(), members = members.len(), "host update body");

        os.line(&format!("// merged custom connectivity host update group {}", merged.index()));
        os.line(&format!("for(unsigned int g = 0; g < {}; g++)", members.len()));
        os.line("{");
        os.line(&format!("const auto *group = &{}[g];", merged.host_array()));
        {
            let mut root = Environment::root(os);
            root.add("t", ResolvedType::value(precision).add_const(), "t")?;
            root.add("dt", ResolvedType::value(precision).add_const(), &precision.write_literal(self.model.dt))?;
            root.add("batch_size", ResolvedType::UINT32.add_const(), &format!("{}u", self.model.batch_size))?;
            add_standard_library(&mut root);

            let mut env = Environment::with_fields(&mut root, &mut merged.fields);
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
            self.add_params(
                &mut env,
                &model.params,
                &model.derived_params,
                members.iter().map(|m| (m.name.clone(), m.params.clone())).collect(),
            )?;
            self.add_host_vars(&mut env, &model.pre_vars, &owners, "$(num_pre)")?;
            self.add_host_vars(&mut env, &model.post_vars, &owners, "$(num_post)")?;
            self.add_host_egps(&mut env, &model.extra_global_params, &owners)?;
            if model.uses_host_rng() {
                add_host_rng(&mut env, precision)?;
            }

            compile_snippet(
                &model.host_update_code,
                &format!("custom connectivity update '{}' host update code", archetype.name),
                &self.context,
                &mut env,
                None,
            )?;
        }
        os.line("}");
        Ok(())
    }

    /// Host struct array and the function filling one of its slots.
    pub(super) fn gen_host_merged_struct(
        &self,
        merged: &GroupMerged<'_, CustomConnectivityUpdate>,
        definitions: &mut CodeStream,
        runner: &mut CodeStream,
        push_calls: &mut CodeStream,
    ) {
        let struct_name = merged.struct_name();
        let array = merged.host_array();
        merged.fields.write_definition(definitions, &struct_name);
        definitions.line(&format!("{} {}[{}];", struct_name, array, merged.groups().len()));
        definitions.blank();

        let mut params = "unsigned int idx".to_string();
        if !merged.fields.is_empty() {
            params.push_str(", ");
            params.push_str(&merged.fields.argument_list());
        }
        let names: Vec<String> = merged.fields.sorted().iter().map(|f| f.name.clone()).collect();
        runner.line(&format!("void {}({})", merged.push_function(), params));
        runner.line("{");
        runner.line(&format!("{} group = {{{}}};", struct_name, names.join(", ")));
        runner.line(&format!("{}[idx] = group;", array));
        runner.line("}");
        runner.blank();

        merged.gen_push_calls(push_calls);
    }
}
