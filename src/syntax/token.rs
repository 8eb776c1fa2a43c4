use crate::span::Span;

/// All token kinds of the snippet language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Single-character punctuation
    LeftParen,          // (
    RightParen,         // )
    LeftBrace,          // {
    RightBrace,         // }
    LeftSquareBracket,  // [
    RightSquareBracket, // ]
    Comma,              // ,
    Colon,              // :
    Semicolon,          // ;
    Question,           // ?
    Tilde,              // ~

    // One, two or three character operators
    Not,              // !
    NotEqual,         // !=
    Equal,            // =
    EqualEqual,       // ==
    Greater,          // >
    GreaterEqual,     // >=
    ShiftRight,       // >>
    ShiftRightEqual,  // >>=
    Less,             // <
    LessEqual,        // <=
    ShiftLeft,        // <<
    ShiftLeftEqual,   // <<=
    Plus,             // +
    PlusEqual,        // +=
    PlusPlus,         // ++
    Minus,            // -
    MinusEqual,       // -=
    MinusMinus,       // --
    Star,             // *
    StarEqual,        // *=
    Slash,            // /
    SlashEqual,       // /=
    Percent,          // %
    PercentEqual,     // %=
    Ampersand,        // &
    AmpersandEqual,   // &=
    AmpersandAmpersand, // &&
    Pipe,             // |
    PipeEqual,        // |=
    PipePipe,         // ||
    Caret,            // ^
    CaretEqual,       // ^=

    // Literals and names
    Identifier,
    Number,
    String,
    TypeSpecifier,
    TypeQualifier,

    // Keywords
    Do,
    Else,
    False,
    For,
    ForEachSynapse,
    If,
    True,
    While,
    Print,
    Switch,
    Continue,
    Break,
    Case,
    Default,

    EndOfFile,
}

impl TokenKind {
    /// Map a keyword string to its token kind.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        match s {
            "do" => Some(TokenKind::Do),
            "else" => Some(TokenKind::Else),
            "false" => Some(TokenKind::False),
            "for" => Some(TokenKind::For),
            "for_each_synapse" => Some(TokenKind::ForEachSynapse),
            "if" => Some(TokenKind::If),
            "true" => Some(TokenKind::True),
            "while" => Some(TokenKind::While),
            "print" => Some(TokenKind::Print),
            "switch" => Some(TokenKind::Switch),
            "continue" => Some(TokenKind::Continue),
            "break" => Some(TokenKind::Break),
            "case" => Some(TokenKind::Case),
            "default" => Some(TokenKind::Default),
            "const" => Some(TokenKind::TypeQualifier),
            "bool" | "char" | "short" | "int" | "signed" | "unsigned" | "float" | "double" => {
                Some(TokenKind::TypeSpecifier)
            }
            _ => None,
        }
    }

    /// Human-readable description for error messages.
    pub fn description(&self) -> &'static str {
        match self {
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::LeftSquareBracket => "'['",
            TokenKind::RightSquareBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Question => "'?'",
            TokenKind::Tilde => "'~'",
            TokenKind::Not => "'!'",
            TokenKind::NotEqual => "'!='",
            TokenKind::Equal => "'='",
            TokenKind::EqualEqual => "'=='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::ShiftRight => "'>>'",
            TokenKind::ShiftRightEqual => "'>>='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::ShiftLeft => "'<<'",
            TokenKind::ShiftLeftEqual => "'<<='",
            TokenKind::Plus => "'+'",
            TokenKind::PlusEqual => "'+='",
            TokenKind::PlusPlus => "'++'",
            TokenKind::Minus => "'-'",
            TokenKind::MinusEqual => "'-='",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Star => "'*'",
            TokenKind::StarEqual => "'*='",
            TokenKind::Slash => "'/'",
            TokenKind::SlashEqual => "'/='",
            TokenKind::Percent => "'%'",
            TokenKind::PercentEqual => "'%='",
            TokenKind::Ampersand => "'&'",
            TokenKind::AmpersandEqual => "'&='",
            TokenKind::AmpersandAmpersand => "'&&'",
            TokenKind::Pipe => "'|'",
            TokenKind::PipeEqual => "'|='",
            TokenKind::PipePipe => "'||'",
            TokenKind::Caret => "'^'",
            TokenKind::CaretEqual => "'^='",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string literal",
            TokenKind::TypeSpecifier => "type specifier",
            TokenKind::TypeQualifier => "type qualifier",
            TokenKind::Do => "'do'",
            TokenKind::Else => "'else'",
            TokenKind::False => "'false'",
            TokenKind::For => "'for'",
            TokenKind::ForEachSynapse => "'for_each_synapse'",
            TokenKind::If => "'if'",
            TokenKind::True => "'true'",
            TokenKind::While => "'while'",
            TokenKind::Print => "'print'",
            TokenKind::Switch => "'switch'",
            TokenKind::Continue => "'continue'",
            TokenKind::Break => "'break'",
            TokenKind::Case => "'case'",
            TokenKind::Default => "'default'",
            TokenKind::EndOfFile => "end of input",
        }
    }

    /// Assignment operators, simple and compound.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::StarEqual
                | TokenKind::SlashEqual
                | TokenKind::PercentEqual
                | TokenKind::PlusEqual
                | TokenKind::MinusEqual
                | TokenKind::AmpersandEqual
                | TokenKind::CaretEqual
                | TokenKind::PipeEqual
                | TokenKind::ShiftLeftEqual
                | TokenKind::ShiftRightEqual
        )
    }
}

/// One scanned token. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    pub fn line(&self) -> u32 {
        self.span.line
    }
}
