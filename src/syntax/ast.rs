use crate::span::{Span, Spanned};
use crate::types::NumericType;

/// Identity of an expression or declarator; keys the resolved type table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Cast {
        ty: TypeSpec,
        expr: Box<Expr>,
    },
    Assignment {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Subscript {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Grouping(Box<Expr>),
    PrefixIncDec {
        op: IncDec,
        target: Box<Expr>,
    },
    PostfixIncDec {
        op: IncDec,
        target: Box<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// Numeric literal; the lexeme is printed verbatim.
    Number { lexeme: String, ty: NumericType },
    Bool(bool),
    /// String literal including its quotes. Only valid in `print`.
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Deref,
    AddressOf,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Deref => "*",
            UnaryOp::AddressOf => "&",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    /// Binding power (left, right) for precedence climbing.
    /// All binary operators are left-associative.
    pub fn binding_power(self) -> (u8, u8) {
        match self {
            BinaryOp::LogicalOr => (2, 3),
            BinaryOp::LogicalAnd => (4, 5),
            BinaryOp::BitOr => (6, 7),
            BinaryOp::BitXor => (8, 9),
            BinaryOp::BitAnd => (10, 11),
            BinaryOp::Eq | BinaryOp::Ne => (12, 13),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => (14, 15),
            BinaryOp::Shl | BinaryOp::Shr => (16, 17),
            BinaryOp::Add | BinaryOp::Sub => (18, 19),
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (20, 21),
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    /// Operators that only accept integral operands.
    pub fn is_integral_only(self) -> bool {
        matches!(
            self,
            BinaryOp::Rem
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::BitAnd
                | BinaryOp::BitXor
                | BinaryOp::BitOr
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Compound(BinaryOp::Mul) => "*=",
            AssignOp::Compound(BinaryOp::Div) => "/=",
            AssignOp::Compound(BinaryOp::Rem) => "%=",
            AssignOp::Compound(BinaryOp::Add) => "+=",
            AssignOp::Compound(BinaryOp::Sub) => "-=",
            AssignOp::Compound(BinaryOp::Shl) => "<<=",
            AssignOp::Compound(BinaryOp::Shr) => ">>=",
            AssignOp::Compound(BinaryOp::BitAnd) => "&=",
            AssignOp::Compound(BinaryOp::BitXor) => "^=",
            AssignOp::Compound(BinaryOp::BitOr) => "|=",
            AssignOp::Compound(_) => "=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncDec {
    Increment,
    Decrement,
}

impl IncDec {
    pub fn symbol(self) -> &'static str {
        match self {
            IncDec::Increment => "++",
            IncDec::Decrement => "--",
        }
    }
}

/// A written type: specifier words, value const and an optional pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpec {
    pub specifiers: Vec<String>,
    pub is_const: bool,
    pub pointer: Option<PointerSpec>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerSpec {
    pub is_const: bool,
}

/// One name introduced by a declaration statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    pub id: NodeId,
    pub name: String,
    /// Pointer declarator (`*` or `* const`) applied to this name only.
    pub pointer: Option<PointerSpec>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    Case(Expr),
    Default,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Expression statement; `None` for an empty `;`.
    Expression(Option<Expr>),
    Compound(Vec<Spanned<Stmt>>),
    VarDeclaration {
        ty: TypeSpec,
        declarators: Vec<Declarator>,
    },
    If {
        condition: Expr,
        then_branch: Box<Spanned<Stmt>>,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    While {
        condition: Expr,
        body: Box<Spanned<Stmt>>,
    },
    Do {
        body: Box<Spanned<Stmt>>,
        condition: Expr,
    },
    For {
        init: Option<Box<Spanned<Stmt>>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    Switch {
        condition: Expr,
        body: Box<Spanned<Stmt>>,
    },
    Labelled {
        label: Label,
        body: Box<Spanned<Stmt>>,
    },
    Break,
    Continue,
    Print(Expr),
    /// Loop over the synapses of the current row.
    ForEachSynapse {
        body: Box<Spanned<Stmt>>,
    },
}

/// Numeric type of a literal, from its lexeme and suffix.
pub fn number_literal_type(lexeme: &str) -> NumericType {
    let lower = lexeme.to_ascii_lowercase();
    if lower.starts_with("0x") {
        return if lower.ends_with('u') {
            NumericType::Uint32
        } else {
            NumericType::Int32
        };
    }
    if lower.ends_with('f') {
        NumericType::Float
    } else if lower.contains('.') || lower.contains('e') {
        NumericType::Double
    } else if lower.ends_with('u') {
        NumericType::Uint32
    } else {
        NumericType::Int32
    }
}
