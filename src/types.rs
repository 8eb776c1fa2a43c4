//! Resolved types of the snippet language.
//!
//! A [`ResolvedType`] is a numeric value, a pointer, a function or `void`,
//! each with its own `const` qualifier. For a pointer the qualifier on the
//! outer type is the pointer constness (`int * const`) and the qualifier on
//! the pointee is the value constness (`const int *`).

use std::fmt;

use indexmap::IndexMap;

use crate::hash::StructuralHasher;

/// Size in bytes of a device pointer.
pub const POINTER_SIZE: usize = 8;

/// Built-in numeric types, in increasing conversion rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float,
    Double,
}

impl NumericType {
    pub const ALL: [NumericType; 9] = [
        NumericType::Bool,
        NumericType::Int8,
        NumericType::Uint8,
        NumericType::Int16,
        NumericType::Uint16,
        NumericType::Int32,
        NumericType::Uint32,
        NumericType::Float,
        NumericType::Double,
    ];

    /// The C spelling of the type.
    pub fn name(self) -> &'static str {
        match self {
            NumericType::Bool => "bool",
            NumericType::Int8 => "char",
            NumericType::Uint8 => "unsigned char",
            NumericType::Int16 => "short",
            NumericType::Uint16 => "unsigned short",
            NumericType::Int32 => "int",
            NumericType::Uint32 => "unsigned int",
            NumericType::Float => "float",
            NumericType::Double => "double",
        }
    }

    /// Integer conversion rank; floating point types rank above all integers.
    pub fn rank(self) -> u8 {
        match self {
            NumericType::Bool => 0,
            NumericType::Int8 | NumericType::Uint8 => 10,
            NumericType::Int16 | NumericType::Uint16 => 20,
            NumericType::Int32 | NumericType::Uint32 => 30,
            NumericType::Float => 50,
            NumericType::Double => 60,
        }
    }

    pub fn size(self) -> usize {
        match self {
            NumericType::Bool | NumericType::Int8 | NumericType::Uint8 => 1,
            NumericType::Int16 | NumericType::Uint16 => 2,
            NumericType::Int32 | NumericType::Uint32 | NumericType::Float => 4,
            NumericType::Double => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            NumericType::Int8
                | NumericType::Int16
                | NumericType::Int32
                | NumericType::Float
                | NumericType::Double
        )
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, NumericType::Float | NumericType::Double)
    }

    pub fn min(self) -> f64 {
        match self {
            NumericType::Bool => 0.0,
            NumericType::Int8 => i8::MIN as f64,
            NumericType::Uint8 => 0.0,
            NumericType::Int16 => i16::MIN as f64,
            NumericType::Uint16 => 0.0,
            NumericType::Int32 => i32::MIN as f64,
            NumericType::Uint32 => 0.0,
            NumericType::Float => f32::MIN as f64,
            NumericType::Double => f64::MIN,
        }
    }

    pub fn max(self) -> f64 {
        match self {
            NumericType::Bool => 1.0,
            NumericType::Int8 => i8::MAX as f64,
            NumericType::Uint8 => u8::MAX as f64,
            NumericType::Int16 => i16::MAX as f64,
            NumericType::Uint16 => u16::MAX as f64,
            NumericType::Int32 => i32::MAX as f64,
            NumericType::Uint32 => u32::MAX as f64,
            NumericType::Float => f32::MAX as f64,
            NumericType::Double => f64::MAX,
        }
    }

    /// Suffix a literal of this type carries in source text.
    pub fn literal_suffix(self) -> &'static str {
        match self {
            NumericType::Float => "f",
            NumericType::Uint32 => "U",
            _ => "",
        }
    }

    /// `printf` conversion used by the `print` statement.
    pub fn printf_format(self) -> &'static str {
        match self {
            NumericType::Bool
            | NumericType::Int8
            | NumericType::Int16
            | NumericType::Int32 => "%d",
            NumericType::Uint8 | NumericType::Uint16 | NumericType::Uint32 => "%u",
            NumericType::Float | NumericType::Double => "%f",
        }
    }

    /// Write `value` as a literal of this type.
    pub fn write_literal(self, value: f64) -> String {
        match self {
            NumericType::Bool => (value != 0.0).to_string(),
            NumericType::Float => format!("{:?}f", value as f32),
            NumericType::Double => format!("{:?}", value),
            _ => format!("{}{}", value as i64, self.literal_suffix()),
        }
    }

    /// Integer promotion: everything narrower than `int` becomes `int`.
    pub fn promoted(self) -> NumericType {
        if self.is_integral() && self.rank() < NumericType::Int32.rank() {
            NumericType::Int32
        } else {
            self
        }
    }

    fn to_unsigned(self) -> NumericType {
        match self {
            NumericType::Int8 => NumericType::Uint8,
            NumericType::Int16 => NumericType::Uint16,
            NumericType::Int32 => NumericType::Uint32,
            other => other,
        }
    }

    /// Parse a sequence of C type specifier keywords, in any order.
    pub fn from_specifiers(specifiers: &[&str]) -> Option<NumericType> {
        let mut sorted: Vec<&str> = specifiers.to_vec();
        sorted.sort_unstable();
        match sorted.join(" ").as_str() {
            "bool" => Some(NumericType::Bool),
            "char" | "char signed" => Some(NumericType::Int8),
            "char unsigned" => Some(NumericType::Uint8),
            "short" | "int short" | "short signed" | "int short signed" => {
                Some(NumericType::Int16)
            }
            "short unsigned" | "int short unsigned" => Some(NumericType::Uint16),
            "int" | "signed" | "int signed" => Some(NumericType::Int32),
            "unsigned" | "int unsigned" => Some(NumericType::Uint32),
            "float" => Some(NumericType::Float),
            "double" => Some(NumericType::Double),
            _ => None,
        }
    }
}

/// Usual arithmetic conversions between two numeric operands.
pub fn common_type(a: NumericType, b: NumericType) -> NumericType {
    if a == NumericType::Double || b == NumericType::Double {
        return NumericType::Double;
    }
    if a == NumericType::Float || b == NumericType::Float {
        return NumericType::Float;
    }

    let a = a.promoted();
    let b = b.promoted();
    if a == b {
        return a;
    }
    if a.is_signed() == b.is_signed() {
        return if a.rank() >= b.rank() { a } else { b };
    }

    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if unsigned.rank() >= signed.rank() {
        unsigned
    } else if signed.max() >= unsigned.max() {
        signed
    } else {
        signed.to_unsigned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Value(NumericType),
    Pointer(Box<ResolvedType>),
    Function(FunctionType),
    /// Backend type the snippet language cannot spell, e.g. an RNG state.
    Opaque { name: String, size: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub returns: Box<ResolvedType>,
    pub args: Vec<ResolvedType>,
    pub variadic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedType {
    pub kind: TypeKind,
    pub is_const: bool,
}

impl ResolvedType {
    pub const BOOL: ResolvedType = ResolvedType::value(NumericType::Bool);
    pub const INT32: ResolvedType = ResolvedType::value(NumericType::Int32);
    pub const UINT32: ResolvedType = ResolvedType::value(NumericType::Uint32);
    pub const FLOAT: ResolvedType = ResolvedType::value(NumericType::Float);
    pub const DOUBLE: ResolvedType = ResolvedType::value(NumericType::Double);
    pub const VOID: ResolvedType = ResolvedType {
        kind: TypeKind::Void,
        is_const: false,
    };

    pub const fn value(numeric: NumericType) -> Self {
        Self {
            kind: TypeKind::Value(numeric),
            is_const: false,
        }
    }

    pub fn function(returns: ResolvedType, args: Vec<ResolvedType>) -> Self {
        Self {
            kind: TypeKind::Function(FunctionType {
                returns: Box::new(returns),
                args,
                variadic: false,
            }),
            is_const: false,
        }
    }

    pub fn variadic_function(returns: ResolvedType, args: Vec<ResolvedType>) -> Self {
        Self {
            kind: TypeKind::Function(FunctionType {
                returns: Box::new(returns),
                args,
                variadic: true,
            }),
            is_const: false,
        }
    }

    pub fn opaque(name: &str, size: usize) -> Self {
        Self {
            kind: TypeKind::Opaque {
                name: name.to_string(),
                size,
            },
            is_const: false,
        }
    }

    /// Pointer to this type; the pointer itself is not const.
    pub fn pointer(self) -> Self {
        Self {
            kind: TypeKind::Pointer(Box::new(self)),
            is_const: false,
        }
    }

    pub fn add_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn remove_const(mut self) -> Self {
        self.is_const = false;
        self
    }

    pub fn numeric(&self) -> Option<NumericType> {
        match &self.kind {
            TypeKind::Value(n) => Some(*n),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&ResolvedType> {
        match &self.kind {
            TypeKind::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.kind {
            TypeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, TypeKind::Value(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_integral(&self) -> bool {
        self.numeric().is_some_and(NumericType::is_integral)
    }

    /// Size in bytes when stored in a struct.
    pub fn size(&self) -> usize {
        match &self.kind {
            TypeKind::Value(n) => n.size(),
            TypeKind::Pointer(_) => POINTER_SIZE,
            TypeKind::Opaque { size, .. } => *size,
            TypeKind::Void | TypeKind::Function(_) => 0,
        }
    }

    /// C spelling, e.g. `const float*` or `int* const`.
    pub fn name(&self) -> String {
        match &self.kind {
            TypeKind::Void => "void".to_string(),
            TypeKind::Opaque { name, .. } => name.clone(),
            TypeKind::Value(n) => {
                if self.is_const {
                    format!("const {}", n.name())
                } else {
                    n.name().to_string()
                }
            }
            TypeKind::Pointer(pointee) => {
                let base = format!("{}*", pointee.name());
                if self.is_const {
                    format!("{} const", base)
                } else {
                    base
                }
            }
            TypeKind::Function(f) => {
                let mut args: Vec<String> = f.args.iter().map(|a| a.name()).collect();
                if f.variadic {
                    args.push("...".to_string());
                }
                format!("{}({})", f.returns.name(), args.join(", "))
            }
        }
    }

    pub fn update_hash(&self, hasher: &mut StructuralHasher) {
        hasher.update_str(&self.name());
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Model-level type aliases such as `scalar`.
///
/// Alias names are scanned as type specifiers, so they can appear in
/// declarations and casts like built-in types.
#[derive(Clone, Debug)]
pub struct TypeContext {
    aliases: IndexMap<String, NumericType>,
}

impl TypeContext {
    /// Context with `scalar` bound to the model precision.
    pub fn new(precision: NumericType) -> Self {
        let mut aliases = IndexMap::new();
        aliases.insert("scalar".to_string(), precision);
        Self { aliases }
    }

    pub fn with_alias(mut self, name: &str, ty: NumericType) -> Self {
        self.aliases.insert(name.to_string(), ty);
        self
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn alias(&self, name: &str) -> Option<NumericType> {
        self.aliases.get(name).copied()
    }

    /// Resolve a list of specifier words, alias names included.
    pub fn resolve_numeric(&self, specifiers: &[&str]) -> Option<NumericType> {
        if let [single] = specifiers {
            if let Some(ty) = self.alias(single) {
                return Some(ty);
            }
        }
        NumericType::from_specifiers(specifiers)
    }

    /// Resolve a model-level type string like `scalar` or `unsigned int*`.
    pub fn parse_type(&self, text: &str) -> Option<ResolvedType> {
        let mut words: Vec<&str> = Vec::new();
        let mut pointer = false;
        let mut is_const = false;
        for word in text.split_whitespace() {
            let (word, star) = match word.strip_suffix('*') {
                Some(w) => (w, true),
                None => (word, false),
            };
            if word == "const" {
                is_const = true;
            } else if !word.is_empty() {
                words.push(word);
            }
            pointer |= star;
        }
        let value = ResolvedType::value(self.resolve_numeric(&words)?);
        let value = if is_const { value.add_const() } else { value };
        Some(if pointer { value.pointer() } else { value })
    }
}
