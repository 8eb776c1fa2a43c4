use std::rc::Rc;

use indexmap::IndexMap;

use mergen::model::{
    CustomConnectivityUpdate, CustomConnectivityUpdateModel, SynapseGroupRef, SynapseVar, VarRefDecl,
    VarReference,
};
use mergen::types::NumericType;
use mergen::{generate_model, CudaBackend, Error, ModelSpec, RaggedRows};

fn rewire(code: &str, duplicated: bool) -> CustomConnectivityUpdate {
    let model = Rc::new(CustomConnectivityUpdateModel {
        name: "Rewire".to_string(),
        var_refs: vec![VarRefDecl::new("g", "scalar", false)],
        row_update_code: code.to_string(),
        ..Default::default()
    });
    let mut var_references = IndexMap::new();
    var_references.insert("g".to_string(), VarReference::new("Syn", "g", "scalar", duplicated));
    CustomConnectivityUpdate {
        name: "R".to_string(),
        update_group: "Plasticity".to_string(),
        model,
        params: IndexMap::new(),
        synapse_group: SynapseGroupRef {
            name: "Syn".to_string(),
            num_pre: 64,
            num_post: 64,
            row_stride: 8,
            vars: vec![
                SynapseVar::new("Syn", "g", "scalar", duplicated),
                SynapseVar::new("Syn", "delay", "scalar", true),
            ],
        },
        var_initialisers: IndexMap::new(),
        pre_var_initialisers: IndexMap::new(),
        post_var_initialisers: IndexMap::new(),
        var_references,
        pre_var_references: IndexMap::new(),
        post_var_references: IndexMap::new(),
    }
}

fn generate(update: CustomConnectivityUpdate, batch_size: u32) -> mergen::Result<String> {
    let mut spec = ModelSpec::new("rewire", NumericType::Float);
    spec.batch_size = batch_size;
    spec.custom_connectivity_updates.push(update);
    Ok(generate_model(&spec, &CudaBackend::default())?.custom_update)
}

fn lines(code: &str) -> Vec<&str> {
    code.lines().map(str::trim).collect()
}

// ── generated code ──

#[test]
fn test_add_synapse_updates_every_batch_copy() {
    let code = generate(rewire("add_synapse(id_pre, 1.0f);", false), 4).unwrap();
    let lines = lines(&code);
    for expected in [
        "const unsigned int synStride = group->numSrcNeurons * group->rowStride;",
        "const unsigned int newIdx = rowStartIdx + group->rowLength[lid];",
        "assert(group->rowLength[lid] < group->rowStride);",
        "group->ind[newIdx] = lid;",
        "group->g[newIdx] = 1.0f;",
        "for(unsigned int b = 0; b < 4; b++)",
        "const unsigned int batchOffset = b * synStride;",
        "group->_dependentVar0[batchOffset + newIdx] = 0;",
        "group->rowLength[lid]++;",
    ] {
        assert!(lines.contains(&expected), "missing `{}` in\n{}", expected, code);
    }
}

#[test]
fn test_random_value_shared_by_batch_copies() {
    let code = generate(rewire("add_synapse(id_pre, gennrand_uniform());", true), 4).unwrap();
    let lines = lines(&code);
    let hoisted = lines
        .iter()
        .position(|l| *l == "const float gVal = curand_uniform(&group->rng[lid]);")
        .unwrap_or_else(|| panic!("random value not hoisted in\n{}", code));
    let first_copy = lines
        .iter()
        .position(|l| *l == "group->g[batchOffset + newIdx] = gVal;")
        .unwrap_or_else(|| panic!("batch copies do not reuse the value in\n{}", code));
    assert!(hoisted < first_copy);
    assert_eq!(code.matches("curand_uniform(").count(), 1);
}

#[test]
fn test_remove_synapse_moves_last_synapse() {
    let code = generate(
        rewire("for_each_synapse {\n    if (id_post == id_pre) {\n        remove_synapse();\n    }\n}", false),
        1,
    )
    .unwrap();
    let lines = lines(&code);
    for expected in [
        "for(int j = 0; j < group->rowLength[lid]; j++)",
        "if(group->ind[rowStartIdx + j] == lid)",
        "const unsigned int lastIdx = rowStartIdx + group->rowLength[lid] - 1;",
        "group->ind[idx] = group->ind[lastIdx];",
        "group->g[idx] = group->g[lastIdx];",
        "group->_dependentVar0[idx] = group->_dependentVar0[lastIdx];",
        "group->rowLength[lid]--;",
        "j--;",
    ] {
        assert!(lines.contains(&expected), "missing `{}` in\n{}", expected, code);
    }
    // No batch copies to walk
    assert!(!code.contains("batchOffset"));
}

#[test]
fn test_batched_reference_not_visible_per_synapse() {
    let err = generate(rewire("for_each_synapse {\n    g = 0.0f;\n}", true), 2).unwrap_err();
    assert!(matches!(err, Error::Compile { .. }), "{:?}", err);
}

#[test]
fn test_remove_synapse_outside_loop_is_rejected() {
    let err = generate(rewire("remove_synapse();", false), 1).unwrap_err();
    assert!(matches!(err, Error::Compile { .. }), "{:?}", err);
}

// ── host mirror ──

#[test]
fn test_host_rows_follow_generated_semantics() {
    let mut rows = RaggedRows::new(2, 8, 4).with_array("g", false).with_array("delay", true);
    for post in 0..5 {
        rows.add_synapse(1, post, &[post as f64 * 0.5, 3.0]).unwrap();
    }
    // Same predicate as the generated loop above: drop self connections.
    let removed = rows.remove_where(1, |post, _| post == 1);
    assert_eq!(removed, 1);
    assert_eq!(rows.row(1), &[0, 4, 2, 3]);
    assert_eq!(rows.value("g", 0, 1, 1), Some(2.0));
    for batch in 0..4 {
        assert_eq!(rows.value("delay", batch, 1, 1), Some(3.0));
    }
    assert_eq!(rows.row_length(0), 0);
}
