use std::rc::Rc;

use super::*;

#[test]
fn test_unreferenced_initialiser_not_emitted() {
    let mut out = CodeStream::new();
    {
        let mut env = Environment::root(&mut out);
        let init = env.add_initialiser("const unsigned int lid = id - 64;");
        env.add_with_initialisers("id", ResolvedType::UINT32, "lid", &[init])
            .unwrap();
        env.stream().line("x = 1;");
    }
    assert_eq!(out.as_str(), "x = 1;\n");
}

#[test]
fn test_initialiser_emitted_once_before_body() {
    let mut out = CodeStream::new();
    {
        let mut env = Environment::root(&mut out);
        let init = env.add_initialiser("const unsigned int lid = id - 64;");
        env.add_with_initialisers("id", ResolvedType::UINT32, "lid", &[init])
            .unwrap();
        env.print_line("a[$(id)] = 1;").unwrap();
        env.print_line("b[$(id)] = $(id);").unwrap();
    }
    assert_eq!(
        out.as_str(),
        "const unsigned int lid = id - 64;\na[lid] = 1;\nb[lid] = lid;\n"
    );
}

#[test]
fn test_initialisers_in_first_reference_order_with_dependencies_first() {
    let mut out = CodeStream::new();
    {
        let mut env = Environment::root(&mut out);
        let start = env.add_initialiser("const unsigned int rowStartIdx = 4 * stride;");
        let idx = env.add_initialiser("const unsigned int idx = $(_row_start_idx) + j;");
        let other = env.add_initialiser("const float scale = 2.0f;");
        env.add_with_initialisers("_row_start_idx", ResolvedType::UINT32, "rowStartIdx", &[start])
            .unwrap();
        env.add_with_initialisers("id_syn", ResolvedType::UINT32, "idx", &[idx])
            .unwrap();
        env.add_with_initialisers("scale", ResolvedType::FLOAT, "scale", &[other])
            .unwrap();
        env.print_line("g[$(id_syn)] *= $(scale);").unwrap();
    }
    assert_eq!(
        out.as_str(),
        "const unsigned int rowStartIdx = 4 * stride;\n\
         const unsigned int idx = rowStartIdx + j;\n\
         const float scale = 2.0f;\n\
         g[idx] *= scale;\n"
    );
}

#[test]
fn test_child_flushes_into_parent_at_depth() {
    let mut out = CodeStream::new();
    {
        let mut outer = Environment::root(&mut out);
        outer.add("n", ResolvedType::UINT32, "numNeurons").unwrap();
        outer.stream().line("if(id < 64) {");
        {
            let mut inner = Environment::new(&mut outer);
            let init = inner.add_initialiser("const unsigned int lid = id;");
            inner
                .add_with_initialisers("id", ResolvedType::UINT32, "lid", &[init])
                .unwrap();
            inner.print_line("if($(id) < $(n)) {").unwrap();
            inner.stream().line("go();");
            inner.stream().line("}");
        }
        outer.stream().line("}");
    }
    assert_eq!(
        out.as_str(),
        "if(id < 64) {\n    const unsigned int lid = id;\n    if(lid < numNeurons) {\n        go();\n    }\n}\n"
    );
}

#[test]
fn test_parent_initialiser_hoisted_into_parent() {
    let mut out = CodeStream::new();
    {
        let mut outer = Environment::root(&mut out);
        let init = outer.add_initialiser("const unsigned int lid = id - 32;");
        outer
            .add_with_initialisers("id", ResolvedType::UINT32, "lid", &[init])
            .unwrap();
        outer.stream().line("{");
        {
            let mut inner = Environment::new(&mut outer);
            inner.print_line("x[$(id)] = 0;").unwrap();
        }
        outer.stream().line("}");
    }
    assert_eq!(
        out.as_str(),
        "const unsigned int lid = id - 32;\n{\n    x[lid] = 0;\n}\n"
    );
}

#[test]
fn test_undefined_at_root() {
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    let err = env.get_name("missing", None).unwrap_err();
    assert!(matches!(err, Error::UndefinedIdentifier(name) if name == "missing"));
}

#[test]
fn test_redeclaration_is_fatal() {
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    env.add("x", ResolvedType::FLOAT, "x").unwrap();
    assert!(matches!(
        env.add("x", ResolvedType::FLOAT, "y"),
        Err(Error::Redeclaration(_))
    ));
}

#[test]
fn test_template_naming_itself_refers_to_parent() {
    let mut out = CodeStream::new();
    let mut outer = Environment::root(&mut out);
    outer.add("id", ResolvedType::UINT32, "id").unwrap();
    let mut inner = Environment::new(&mut outer);
    inner.add("id", ResolvedType::UINT32, "($(id) % 64)").unwrap();
    assert_eq!(inner.get_name("id", None).unwrap(), "(id % 64)");
}

#[test]
fn test_overload_selected_by_type() {
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    let float_fn = ResolvedType::function(ResolvedType::FLOAT, vec![ResolvedType::FLOAT]);
    let double_fn = ResolvedType::function(ResolvedType::DOUBLE, vec![ResolvedType::DOUBLE]);
    env.add_overload("exp", float_fn.clone(), "expf");
    env.add_overload("exp", double_fn.clone(), "exp");
    assert_eq!(env.get_name("exp", Some(&float_fn)).unwrap(), "expf");
    assert_eq!(env.get_name("exp", Some(&double_fn)).unwrap(), "exp");
    assert_eq!(env.get_types("exp").unwrap().len(), 2);
}

#[test]
fn test_types_resolved_through_chain() {
    let mut out = CodeStream::new();
    let mut outer = Environment::root(&mut out);
    outer.add("V", ResolvedType::FLOAT, "group->V[lid]").unwrap();
    let inner = Environment::new(&mut outer);
    assert_eq!(inner.get_types("V"), Some(vec![ResolvedType::FLOAT]));
    assert_eq!(inner.get_types("W"), None);
}

#[test]
fn test_field_registered_only_when_referenced() {
    let mut out = CodeStream::new();
    let mut fields = StructFields::new();
    {
        let mut root = Environment::root(&mut out);
        let mut env = Environment::with_fields(&mut root, &mut fields);
        env.add_field(
            "V",
            ResolvedType::FLOAT,
            "group->V[lid]",
            "V",
            ResolvedType::FLOAT.pointer(),
            Rc::new(|g| format!("d_VPop{}", g)),
        )
        .unwrap();
        env.add_field(
            "U",
            ResolvedType::FLOAT,
            "group->U[lid]",
            "U",
            ResolvedType::FLOAT.pointer(),
            Rc::new(|g| format!("d_UPop{}", g)),
        )
        .unwrap();
        env.print_line("$(V) += 1.0f;").unwrap();
    }
    assert_eq!(fields.len(), 1);
    assert!(fields.contains("V"));
    assert_eq!(fields.values(1), vec!["d_VPop1"]);
    assert_eq!(out.as_str(), "group->V[lid] += 1.0f;\n");
}

#[test]
fn test_field_outside_struct_scope_is_error() {
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    env.add_field(
        "V",
        ResolvedType::FLOAT,
        "group->V",
        "V",
        ResolvedType::FLOAT.pointer(),
        Rc::new(|_| String::new()),
    )
    .unwrap();
    assert!(matches!(
        env.get_name("V", None),
        Err(Error::InconsistentGroup { .. })
    ));
}

#[test]
fn test_field_in_child_registers_with_enclosing_struct() {
    let mut out = CodeStream::new();
    let mut fields = StructFields::new();
    {
        let mut root = Environment::root(&mut out);
        let mut group = Environment::with_fields(&mut root, &mut fields);
        let mut body = Environment::new(&mut group);
        body.add_field(
            "g",
            ResolvedType::FLOAT,
            "group->g[idx]",
            "g",
            ResolvedType::FLOAT.pointer(),
            Rc::new(|g| format!("d_gSyn{}", g)),
        )
        .unwrap();
        body.print_line("$(g) = 0.0f;").unwrap();
    }
    assert!(fields.contains("g"));
    assert_eq!(out.as_str(), "group->g[idx] = 0.0f;\n");
}

#[test]
fn test_params_homogeneous_inlined_heterogeneous_fields() {
    let mut out = CodeStream::new();
    let mut fields = StructFields::new();
    {
        let mut root = Environment::root(&mut out);
        let mut env = Environment::with_fields(&mut root, &mut fields);
        let names = vec!["tau".to_string(), "gain".to_string()];
        env.add_params(&names, "", NumericType::Float, 2, |g, name| match name {
            "tau" => 20.0,
            _ => 1.0 + g as f64,
        })
        .unwrap();
        assert_eq!(env.get_name("tau", None).unwrap(), "20.0f");
        assert_eq!(env.get_name("gain", None).unwrap(), "group->gain");
    }
    assert_eq!(fields.len(), 1);
    assert_eq!(fields.values(0), vec!["1.0f"]);
    assert_eq!(fields.values(1), vec!["2.0f"]);
}
