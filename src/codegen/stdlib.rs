//! Math functions every snippet may call.

use crate::codegen::environment::Environment;
use crate::types::{NumericType, ResolvedType};

const UNARY: &[&str] = &[
    "cos", "sin", "tan", "acos", "asin", "atan", "cosh", "sinh", "tanh", "exp", "expm1", "exp2", "log",
    "log1p", "log2", "log10", "sqrt", "cbrt", "erf", "erfc", "fabs", "floor", "ceil", "round", "trunc",
];

const BINARY: &[&str] = &["pow", "atan2", "fmod", "fmin", "fmax", "hypot", "fdim"];

fn overloads(env: &mut Environment<'_>, name: &str, arity: usize) {
    for numeric in [NumericType::Float, NumericType::Double] {
        let ty = ResolvedType::value(numeric);
        let template = if numeric == NumericType::Float {
            format!("{}f", name)
        } else {
            name.to_string()
        };
        env.add_overload(name, ResolvedType::function(ty.clone(), vec![ty; arity]), &template);
    }
}

/// Bind the C math library with `float` and `double` overloads.
pub fn add_standard_library(env: &mut Environment<'_>) {
    for name in UNARY {
        overloads(env, name, 1);
    }
    for name in BINARY {
        overloads(env, name, 2);
    }
    overloads(env, "fma", 3);
    env.add_overload(
        "abs",
        ResolvedType::function(ResolvedType::INT32, vec![ResolvedType::INT32]),
        "abs",
    );
    env.add_overload(
        "min",
        ResolvedType::function(ResolvedType::UINT32, vec![ResolvedType::UINT32; 2]),
        "min",
    );
    env.add_overload(
        "max",
        ResolvedType::function(ResolvedType::UINT32, vec![ResolvedType::UINT32; 2]),
        "max",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::code_stream::CodeStream;
    use crate::codegen::pipeline::compile_snippet;
    use crate::types::TypeContext;

    #[test]
    fn test_overload_follows_argument_precision() {
        let ctx = TypeContext::new(NumericType::Float);
        let mut out = CodeStream::new();
        {
            let mut env = Environment::root(&mut out);
            add_standard_library(&mut env);
            env.add("x", ResolvedType::FLOAT, "x").unwrap();
            env.add("y", ResolvedType::DOUBLE, "y").unwrap();
            compile_snippet("x = exp(x);\ny = pow(y, y);", "math", &ctx, &mut env, None).unwrap();
        }
        assert_eq!(out.as_str(), "x = expf(x);\ny = pow(y, y);\n");
    }
}
