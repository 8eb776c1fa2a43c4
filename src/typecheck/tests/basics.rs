//! TypeChecker unit tests.

use crate::types::{NumericType, ResolvedType};

use super::*;

#[test]
fn test_literal_types() {
    let env = env();
    assert_eq!(check_expr("1", &env).unwrap(), ResolvedType::INT32.add_const());
    assert_eq!(check_expr("1U", &env).unwrap(), ResolvedType::UINT32.add_const());
    assert_eq!(check_expr("1.0f", &env).unwrap(), ResolvedType::FLOAT.add_const());
    assert_eq!(check_expr("1.0", &env).unwrap(), ResolvedType::DOUBLE.add_const());
    assert_eq!(check_expr("true", &env).unwrap(), ResolvedType::BOOL.add_const());
    assert_eq!(check_expr("0x1F", &env).unwrap(), ResolvedType::INT32.add_const());
}

#[test]
fn test_undefined_identifier() {
    let diags = check_expr("missing + 1", &env()).unwrap_err();
    assert_eq!(messages(&diags), vec!["Undefined identifier 'missing'"]);
}

#[test]
fn test_arithmetic_promotion() {
    let env = env();
    assert_eq!(check_expr("intVal + floatVal", &env).unwrap(), ResolvedType::FLOAT);
    assert_eq!(check_expr("intVal * 2.0", &env).unwrap(), ResolvedType::DOUBLE);
    assert_eq!(check_expr("intVal + 1U", &env).unwrap(), ResolvedType::UINT32);
    assert_eq!(check_expr("true + true", &env).unwrap(), ResolvedType::INT32);
}

#[test]
fn test_relational_and_logical_are_int() {
    let env = env();
    assert_eq!(check_expr("floatVal < 2.0f", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("intVal && floatVal", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("!floatVal", &env).unwrap(), ResolvedType::INT32);
}

#[test]
fn test_integral_only_operators() {
    let env = env();
    assert_eq!(check_expr("intVal % 3", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("intVal << 2U", &env).unwrap(), ResolvedType::INT32);
    assert!(check_expr("floatVal % 2", &env).is_err());
    assert!(check_expr("floatVal & intVal", &env).is_err());
    assert!(check_expr("~floatVal", &env).is_err());
}

#[test]
fn test_subscript() {
    let env = env();
    assert_eq!(check_expr("intArray[4]", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(
        check_expr("constIntArray[intVal]", &env).unwrap(),
        ResolvedType::INT32.add_const()
    );
    let diags = check_expr("intVal[4]", &env).unwrap_err();
    assert!(diags[0].message.contains("is not a pointer"));
    let diags = check_expr("intArray[1.5f]", &env).unwrap_err();
    assert!(diags[0].message.contains("is not an integer"));
}

#[test]
fn test_pointer_arithmetic() {
    let env = env();
    assert_eq!(check_expr("intArray + 4", &env).unwrap(), ResolvedType::INT32.pointer());
    assert_eq!(check_expr("4 + intArray", &env).unwrap(), ResolvedType::INT32.pointer());
    assert_eq!(check_expr("intArray < intArray", &env).unwrap(), ResolvedType::INT32);
    assert!(check_expr("intArray + 1.0f", &env).is_err());
    let diags = check_expr("intArray + intArray", &env).unwrap_err();
    assert!(diags[0].message.contains("Pointer arithmetic"));
}

#[test]
fn test_assignment() {
    let env = env();
    assert_eq!(check_expr("intVal = floatVal", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("floatVal += intVal", &env).unwrap(), ResolvedType::FLOAT);
    assert_eq!(check_expr("intArray[0] = 3", &env).unwrap(), ResolvedType::INT32);

    let diags = check_expr("constIntVal = 3", &env).unwrap_err();
    assert!(diags[0].message.contains("read-only"));
    assert!(check_expr("constIntArray[0] = 3", &env).is_err());
    assert!(check_expr("intConstArray = intArray", &env).is_err());
    assert!(check_expr("intVal = intArray", &env).is_err());
    assert!(check_expr("intVal += intArray", &env).is_err());
    assert!(check_expr("floatVal %= 2", &env).is_err());
}

#[test]
fn test_pointer_assignment_constness() {
    let env = env();
    assert!(check_stmts("const int *p = intArray;", &env).is_ok());
    assert!(check_stmts("int *p = constIntArray;", &env).is_err());
    assert!(check_stmts("float *p = intArray;", &env).is_err());
}

#[test]
fn test_increment_decrement() {
    let env = env();
    assert_eq!(check_expr("intVal++", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("--floatVal", &env).unwrap(), ResolvedType::FLOAT);
    assert_eq!(check_expr("intArray[2]++", &env).unwrap(), ResolvedType::INT32);
    let diags = check_expr("constIntVal++", &env).unwrap_err();
    assert!(diags[0].message.contains("Cannot increment read-only"));
    assert!(check_expr("constIntArray[0]--", &env).is_err());
    assert!(check_expr("(intVal + 1)++", &env).is_err());
}

#[test]
fn test_unary_operators() {
    let env = env();
    assert_eq!(check_expr("*intArray", &env).unwrap(), ResolvedType::INT32);
    assert_eq!(check_expr("&intVal", &env).unwrap(), ResolvedType::INT32.pointer());
    assert_eq!(
        check_expr("-(int)1", &env).unwrap(),
        ResolvedType::value(NumericType::Int32)
    );
    assert!(check_expr("*intVal", &env).is_err());
    assert!(check_expr("&1", &env).is_err());
    assert!(check_expr("-intArray", &env).is_err());
}

#[test]
fn test_conditional() {
    let env = env();
    assert_eq!(
        check_expr("intVal ? floatVal : intVal", &env).unwrap(),
        ResolvedType::FLOAT
    );
    assert_eq!(
        check_expr("intVal ? intArray : intArray", &env).unwrap(),
        ResolvedType::INT32.pointer()
    );
    assert!(check_expr("intVal ? intArray : floatVal", &env).is_err());
}

#[test]
fn test_overload_resolution() {
    let mut env = env();
    env.define_overload(
        "exp",
        ResolvedType::function(ResolvedType::FLOAT, vec![ResolvedType::FLOAT]),
    )
    .define_overload(
        "exp",
        ResolvedType::function(ResolvedType::DOUBLE, vec![ResolvedType::DOUBLE]),
    );
    assert_eq!(check_expr("exp(floatVal)", &env).unwrap(), ResolvedType::FLOAT);
    assert_eq!(check_expr("exp(1.0)", &env).unwrap(), ResolvedType::DOUBLE);
    assert!(check_expr("exp(intArray)", &env).is_err());
    assert!(check_expr("exp(1.0, 2.0)", &env).is_err());

    let diags = check_expr("exp", &env).unwrap_err();
    assert!(diags[0].message.contains("Ambiguous"));
}

#[test]
fn test_variadic_call() {
    let mut env = env();
    env.define(
        "printf",
        ResolvedType::variadic_function(
            ResolvedType::INT32,
            vec![ResolvedType::value(NumericType::Int8).add_const().pointer()],
        ),
    );
    assert_eq!(
        check_expr("printf(\"%d %f\", intVal, floatVal)", &env).unwrap(),
        ResolvedType::INT32
    );
    assert!(check_expr("printf()", &env).is_err());
}

#[test]
fn test_declarations_and_scopes() {
    let env = env();
    assert!(check_stmts("int a = 1; { int a = 2; a++; } a--;", &env).is_ok());
    let diags = check_stmts("int a = 1; float a = 2.0f;", &env).unwrap_err();
    assert_eq!(messages(&diags), vec!["Redeclaration of 'a'"]);
    assert!(check_stmts("{ int b = 1; } b = 2;", &env).is_err());
    assert!(check_stmts("const int c = 1; c = 2;", &env).is_err());
}

#[test]
fn test_declaration_uses_scalar_alias() {
    let env = env();
    assert!(check_stmts("scalar x = floatVal * 2.0f; x += 1;", &env).is_ok());
}

#[test]
fn test_control_flow() {
    let env = env();
    assert!(check_stmts(
        "for(int i = 0; i < 10; i++) { if(i == 5) break; continue; }",
        &env
    )
    .is_ok());
    assert!(check_stmts("while(intVal) { intVal--; }", &env).is_ok());
    assert!(check_stmts("do { intVal++; } while(intVal < 4);", &env).is_ok());
    assert!(check_stmts("do { intVal++; } while(missing);", &env).is_err());
    assert!(check_stmts("do { missing++; } while(intVal);", &env).is_err());
    assert!(check_stmts(
        "switch(intVal) { case 1: floatVal = 2.0f; break; default: break; }",
        &env
    )
    .is_ok());
    // Loop variable does not escape
    assert!(check_stmts("for(int i = 0; i < 2; i++) {} i = 1;", &env).is_err());
}

#[test]
fn test_misplaced_jumps() {
    let env = env();
    assert!(check_stmts("break;", &env).is_err());
    assert!(check_stmts("continue;", &env).is_err());
    assert!(check_stmts("switch(intVal) { default: continue; }", &env).is_err());
    assert!(check_stmts("case 1: intVal = 2;", &env).is_err());
    assert!(check_stmts("switch(floatVal) { default: break; }", &env).is_err());
    assert!(check_stmts("switch(intVal) { case 1.0f: break; }", &env).is_err());
}

#[test]
fn test_print() {
    let env = env();
    assert!(check_stmts("print floatVal;", &env).is_ok());
    assert!(check_stmts("print \"hello\";", &env).is_ok());
    assert!(check_stmts("print intArray;", &env).is_err());
}

#[test]
fn test_errors_recovered_per_statement() {
    let env = env();
    let diags = check_stmts("intVal = missing;\nfloatVal = 1.0f;\nconstIntVal = 2;", &env)
        .unwrap_err();
    assert_eq!(diags.len(), 2);
    assert_eq!(diags[0].span.line, 1);
    assert_eq!(diags[1].span.line, 3);
}

#[test]
fn test_for_each_synapse_names() {
    let env = env();
    let names = vec![("id_post".to_string(), ResolvedType::UINT32)];
    assert!(check_stmts_with(
        "for_each_synapse { floatArray[id_post] += 1.0f; }",
        &env,
        Some(&names)
    )
    .is_ok());
    // Not visible outside the loop
    assert!(check_stmts_with("intVal = id_post;", &env, Some(&names)).is_err());
    assert!(check_stmts_with(
        "for_each_synapse { for_each_synapse { } }",
        &env,
        Some(&names)
    )
    .is_err());
    assert!(check_stmts("for_each_synapse { }", &env).is_err());
}

#[test]
fn test_break_inside_for_each_synapse() {
    let env = env();
    let names = vec![("id_post".to_string(), ResolvedType::UINT32)];
    assert!(check_stmts_with("for_each_synapse { if(id_post > 4) break; }", &env, Some(&names)).is_ok());
}
