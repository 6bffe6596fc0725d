//! Token kinds and the keyword table (`spec.md` §3 "Tokens", §4.1).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    NullLiteral,
    Identifier(String),

    // Keywords
    Class,
    New,
    This,
    Const,
    If,
    Else,
    For,
    While,
    Do,
    Return,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    In,
    Out,
    Inout,

    // Primitive type names
    Int,
    Uint,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Bool,
    String,
    Void,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    ColonColon,
    Question,
    At,
    AtAt,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntLiteral(v) => write!(f, "int literal {v}"),
            Self::FloatLiteral(v) => write!(f, "float literal {v}"),
            Self::StringLiteral(v) => write!(f, "string literal {v:?}"),
            Self::BoolLiteral(v) => write!(f, "bool literal {v}"),
            Self::NullLiteral => write!(f, "null"),
            Self::Identifier(name) => write!(f, "identifier '{name}'"),
            Self::Eof => write!(f, "end of input"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A lexed token: kind plus its source position (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }
}

/// Maps identifier spellings to their reserved-keyword token kind, if any.
///
/// `true`/`false` are handled separately (they yield `BOOL_LITERAL`, not a
/// bare keyword token) per `spec.md` §3. `"enum"` is deliberately absent:
/// `spec.md` §4.2 carves it out as lexing like a plain identifier (unlike
/// `"class"`), so it never reaches this table at all and top-level dispatch
/// checks for it by comparing `Identifier` text instead.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "class" => TokenKind::Class,
        "new" => TokenKind::New,
        "this" => TokenKind::This,
        "null" => TokenKind::NullLiteral,
        "const" => TokenKind::Const,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "in" => TokenKind::In,
        "out" => TokenKind::Out,
        "inout" => TokenKind::Inout,
        "int" => TokenKind::Int,
        "uint" => TokenKind::Uint,
        "int8" => TokenKind::Int8,
        "int16" => TokenKind::Int16,
        "int32" => TokenKind::Int32,
        "int64" => TokenKind::Int64,
        "uint8" => TokenKind::Uint8,
        "uint16" => TokenKind::Uint16,
        "uint32" => TokenKind::Uint32,
        "uint64" => TokenKind::Uint64,
        "float" => TokenKind::Float,
        "double" => TokenKind::Double,
        "bool" => TokenKind::Bool,
        "string" => TokenKind::String,
        "void" => TokenKind::Void,
        _ => return None,
    })
}

/// Whether `name` is one of the primitive type keywords (`spec.md` §4.2
/// "looks like a type").
pub fn is_primitive_type_name(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Int
            | TokenKind::Uint
            | TokenKind::Int8
            | TokenKind::Int16
            | TokenKind::Int32
            | TokenKind::Int64
            | TokenKind::Uint8
            | TokenKind::Uint16
            | TokenKind::Uint32
            | TokenKind::Uint64
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Bool
            | TokenKind::String
            | TokenKind::Void
    )
}
