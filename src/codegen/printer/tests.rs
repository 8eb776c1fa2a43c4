use super::*;
use crate::codegen::code_stream::CodeStream;
use crate::codegen::environment::Environment;
use crate::diagnostic::ErrorHandler;
use crate::syntax::parser::{parse_block_item_list, parse_expression};
use crate::syntax::scanner::scan;
use crate::typecheck::{type_check_expression, type_check_statements, TypeEnvironment};
use crate::types::{NumericType, ResolvedType, TypeContext};

fn context() -> TypeContext {
    TypeContext::new(NumericType::Float)
}

fn bind_neuron(env: &mut Environment<'_>) {
    env.add("V", ResolvedType::FLOAT, "group->V[lid]").unwrap();
    env.add("tau", ResolvedType::FLOAT.add_const(), "20.0f").unwrap();
    env.add("idx", ResolvedType::UINT32.add_const(), "lid").unwrap();
    env.add("weights", ResolvedType::FLOAT.pointer(), "group->g").unwrap();
    env.add(
        "clip",
        ResolvedType::function(
            ResolvedType::FLOAT,
            vec![ResolvedType::FLOAT, ResolvedType::FLOAT, ResolvedType::FLOAT],
        ),
        "fminf(fmaxf($(0), $(1)), $(2))",
    )
    .unwrap();
    env.add(
        "exp",
        ResolvedType::function(ResolvedType::FLOAT, vec![ResolvedType::FLOAT]),
        "expf",
    )
    .unwrap();
}

fn print_expr(source: &str) -> String {
    let ctx = context();
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    bind_neuron(&mut env);
    let mut handler = ErrorHandler::new("test");
    let expr = parse_expression(scan(source, &ctx, &mut handler), &mut handler).unwrap();
    let (types, _) = type_check_expression(&expr, &env, &ctx, &mut handler);
    assert!(!handler.has_error(), "{:?}", handler.diagnostics());
    print_expression(&expr, &mut env, &types).unwrap()
}

fn print_stmts(source: &str) -> String {
    let ctx = context();
    let mut out = CodeStream::new();
    {
        let mut env = Environment::root(&mut out);
        bind_neuron(&mut env);
        let mut handler = ErrorHandler::new("test");
        let stmts = parse_block_item_list(scan(source, &ctx, &mut handler), &mut handler);
        let types = type_check_statements(&stmts, &env, &ctx, &mut handler, None);
        assert!(!handler.has_error(), "{:?}", handler.diagnostics());
        print_statements(&stmts, &mut env, &types, None).unwrap();
    }
    out.into_string()
}

#[test]
fn test_identifiers_resolved_through_environment() {
    insta::assert_snapshot!(print_expr("V + tau * 2.0f"), @"group->V[lid] + 20.0f * 2.0f");
}

#[test]
fn test_grouping_preserved() {
    assert_eq!(print_expr("(V + tau) * 2.0f"), "(group->V[lid] + 20.0f) * 2.0f");
}

#[test]
fn test_call_templates_and_plain_functions() {
    assert_eq!(
        print_expr("clip(V, 0.0f, exp(tau))"),
        "fminf(fmaxf(group->V[lid], 0.0f), expf(20.0f))"
    );
}

#[test]
fn test_cast_prints_resolved_type() {
    insta::assert_snapshot!(print_expr("(unsigned int)V"), @"(unsigned int)group->V[lid]");
    // `idx` is const, so the cast keeps the qualifier
    assert_eq!(print_expr("(const scalar)idx"), "(const float)lid");
    assert_eq!(print_expr("(scalar)(idx + 1)"), "(float)(lid + 1)");
}

#[test]
fn test_subscript_and_unary() {
    assert_eq!(print_expr("-weights[idx + 1]"), "-group->g[lid + 1]");
    assert_eq!(print_expr("!V ? V++ : --V"), "!group->V[lid] ? group->V[lid]++ : --group->V[lid]");
}

#[test]
fn test_locals_are_prefixed() {
    assert_eq!(
        print_stmts("int x = 1, *p; const float y = V * x;\nV = y;"),
        "int _x = 1;\nint* _p;\nconst float _y = group->V[lid] * _x;\ngroup->V[lid] = _y;\n"
    );
}

#[test]
fn test_local_shadows_environment() {
    assert_eq!(
        print_stmts("{ float V = 2.0f; V += 1.0f; }\nV = 0.0f;"),
        "{\n    float _V = 2.0f;\n    _V += 1.0f;\n}\ngroup->V[lid] = 0.0f;\n"
    );
}

#[test]
fn test_if_else_braced() {
    assert_eq!(
        print_stmts("if(V > 1.0f) V = 0.0f; else { V += 1.0f; }"),
        "if(group->V[lid] > 1.0f)\n{\n    group->V[lid] = 0.0f;\n}\nelse\n{\n    group->V[lid] += 1.0f;\n}\n"
    );
}

#[test]
fn test_loops() {
    assert_eq!(
        print_stmts("for(int i = 0, j = 2; i < 4; i++) { V += i * j; }"),
        "for(int _i = 0, _j = 2; _i < 4; _i++)\n{\n    group->V[lid] += _i * _j;\n}\n"
    );
    assert_eq!(
        print_stmts("while(V > 0.0f) V -= 1.0f;\ndo { V++; } while(V < tau);"),
        "while(group->V[lid] > 0.0f)\n{\n    group->V[lid] -= 1.0f;\n}\ndo\n{\n    group->V[lid]++;\n}\nwhile(group->V[lid] < 20.0f);\n"
    );
}

#[test]
fn test_switch() {
    assert_eq!(
        print_stmts("switch(idx) { case 1: V = 0.0f; break; default: break; }"),
        "switch(lid)\n{\n    case 1:\n    group->V[lid] = 0.0f;\n    break;\n    default:\n    break;\n}\n"
    );
}

#[test]
fn test_print_lowered_to_printf() {
    assert_eq!(print_stmts("print V;"), "printf(\"%f\\n\", group->V[lid]);\n");
    assert_eq!(print_stmts("print idx;"), "printf(\"%u\\n\", lid);\n");
    assert_eq!(print_stmts("print \"spike\";"), "printf(\"%s\\n\", \"spike\");\n");
}

#[test]
fn test_printing_is_idempotent_and_initialisers_hoisted_once() {
    let ctx = context();
    let mut handler = ErrorHandler::new("test");
    let stmts = parse_block_item_list(scan("V += tau;\nV *= 2.0f;", &ctx, &mut handler), &mut handler);

    let render = || {
        let mut out = CodeStream::new();
        {
            let mut env = Environment::root(&mut out);
            let init = env.add_initialiser("const unsigned int lid = id - 32;");
            env.add_with_initialisers("V", ResolvedType::FLOAT, "group->V[lid]", &[init])
                .unwrap();
            env.add("tau", ResolvedType::FLOAT.add_const(), "20.0f").unwrap();
            let mut handler = ErrorHandler::new("test");
            let types = type_check_statements(&stmts, &env, &ctx, &mut handler, None);
            print_statements(&stmts, &mut env, &types, None).unwrap();
        }
        out.into_string()
    };
    let first = render();
    assert_eq!(first, render());
    assert_eq!(first.matches("const unsigned int lid").count(), 1);
    assert!(first.starts_with("const unsigned int lid = id - 32;\n"));
}

#[test]
fn test_round_trip_preserves_type() {
    // Identity environment: every name prints as itself.
    let ctx = context();
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    env.add("a", ResolvedType::INT32, "a").unwrap();
    env.add("b", ResolvedType::FLOAT, "b").unwrap();
    env.add("p", ResolvedType::DOUBLE.pointer(), "p").unwrap();

    for source in ["a + b * 2", "(a << 2) % 3", "p[a] / (double)b", "a < 2 ? b : 1.0", "-a + ~a"] {
        let mut handler = ErrorHandler::new("test");
        let expr = parse_expression(scan(source, &ctx, &mut handler), &mut handler).unwrap();
        let (types, ty) = type_check_expression(&expr, &env, &ctx, &mut handler);
        let printed = print_expression(&expr, &mut env, &types).unwrap();

        let reparsed = parse_expression(scan(&printed, &ctx, &mut handler), &mut handler).unwrap();
        let (_, reparsed_ty) = type_check_expression(&reparsed, &env, &ctx, &mut handler);
        assert!(!handler.has_error(), "{}: {:?}", source, handler.diagnostics());
        assert_eq!(ty, reparsed_ty, "{}", source);
    }
}

struct RowLoop;

impl ForEachSynapseHandler for RowLoop {
    fn generate(
        &mut self,
        env: &mut dyn Scope,
        body: &mut dyn FnMut(&mut dyn Scope) -> Result<()>,
    ) -> Result<()> {
        env.print_line("for(int j = 0; j < $(row_length); j++)")?;
        env.stream().line("{");
        {
            let mut body_env = Environment::new(env);
            body_env.add("id_post", ResolvedType::UINT32.add_const(), "ind[j]")?;
            body(&mut body_env)?;
        }
        env.stream().line("}");
        Ok(())
    }
}

#[test]
fn test_for_each_synapse_uses_handler() {
    let ctx = context();
    let mut out = CodeStream::new();
    {
        let mut env = Environment::root(&mut out);
        env.add("row_length", ResolvedType::UINT32, "rowLength[i]").unwrap();
        env.add("g", ResolvedType::FLOAT.pointer(), "weights").unwrap();
        let names = vec![("id_post".to_string(), ResolvedType::UINT32.add_const())];
        let mut handler = ErrorHandler::new("test");
        let stmts = parse_block_item_list(
            scan("for_each_synapse { g[id_post] *= 0.5f; }", &ctx, &mut handler),
            &mut handler,
        );
        let types = type_check_statements(&stmts, &env, &ctx, &mut handler, Some(&names));
        assert!(!handler.has_error(), "{:?}", handler.diagnostics());
        let mut row_loop = RowLoop;
        print_statements(&stmts, &mut env, &types, Some(&mut row_loop)).unwrap();
    }
    assert_eq!(
        out.as_str(),
        "for(int j = 0; j < rowLength[i]; j++)\n{\n    {\n        weights[ind[j]] *= 0.5f;\n    }\n}\n"
    );
}

#[test]
fn test_for_each_synapse_without_handler_is_fatal() {
    let ctx = context();
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    let names = vec![("id_post".to_string(), ResolvedType::UINT32.add_const())];
    let mut handler = ErrorHandler::new("test");
    let stmts = parse_block_item_list(scan("for_each_synapse { }", &ctx, &mut handler), &mut handler);
    let types = type_check_statements(&stmts, &env, &ctx, &mut handler, Some(&names));
    assert!(print_statements(&stmts, &mut env, &types, None).is_err());
}

#[test]
fn test_environment_types_visible_to_checker() {
    let mut out = CodeStream::new();
    let mut env = Environment::root(&mut out);
    bind_neuron(&mut env);
    assert_eq!(env.get_types("V"), Some(vec![ResolvedType::FLOAT]));
}
