//! Token kinds produced by the lexer.

use hxsl_core::{Number, TextSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Struct,
    Namespace,
    Class,
    If,
    Else,
    For,
    While,
    Return,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    In,
    Out,
    InOut,
    Public,
    Private,
    Using,
    Operator,
    Const,
    Static,
}

impl Keyword {
    pub fn spelling(&self) -> &'static str {
        match self {
            Keyword::Struct => "struct",
            Keyword::Namespace => "namespace",
            Keyword::Class => "class",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::In => "in",
            Keyword::Out => "out",
            Keyword::InOut => "inout",
            Keyword::Public => "public",
            Keyword::Private => "private",
            Keyword::Using => "using",
            Keyword::Operator => "operator",
            Keyword::Const => "const",
            Keyword::Static => "static",
        }
    }

    /// All keywords recognized by the default lexer configuration, longest
    /// prefixes first is not required here since the table is keyed by
    /// exact spelling — longest-prefix matching happens in the radix tree
    /// that owns this table.
    pub fn all() -> &'static [Keyword] {
        use Keyword::*;
        &[
            Struct, Namespace, Class, If, Else, For, While, Return, Break, Continue, Switch, Case, Default, In, Out,
            InOut, Public, Private, Using, Operator, Const, Static,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
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
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    Question,
    Colon,
    Dot,
    Arrow,
}

impl Operator {
    /// Every recognized operator spelling, ordered longest-first so the
    /// radix tree's longest-prefix match is simply "first hit wins" when
    /// walked in this order.
    pub fn all_by_length_desc() -> &'static [(&'static str, Operator)] {
        use Operator::*;
        &[
            ("&&", AmpAmp),
            ("||", PipePipe),
            ("<<", Shl),
            (">>", Shr),
            ("==", Eq),
            ("!=", Ne),
            ("<=", Le),
            (">=", Ge),
            ("++", PlusPlus),
            ("--", MinusMinus),
            ("+=", PlusEq),
            ("-=", MinusEq),
            ("*=", StarEq),
            ("/=", SlashEq),
            ("%=", PercentEq),
            ("&=", AmpEq),
            ("|=", PipeEq),
            ("^=", CaretEq),
            ("->", Arrow),
            ("+", Plus),
            ("-", Minus),
            ("*", Star),
            ("/", Slash),
            ("%", Percent),
            ("&", Amp),
            ("|", Pipe),
            ("^", Caret),
            ("~", Tilde),
            ("!", Bang),
            ("=", Assign),
            ("<", Lt),
            (">", Gt),
            ("?", Question),
            (":", Colon),
            (".", Dot),
        ]
    }

    pub fn spelling(&self) -> &'static str {
        Self::all_by_length_desc()
            .iter()
            .find(|(_, op)| op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
}

impl Delimiter {
    pub fn from_byte(b: u8) -> Option<Delimiter> {
        match b {
            b'(' => Some(Delimiter::LParen),
            b')' => Some(Delimiter::RParen),
            b'{' => Some(Delimiter::LBrace),
            b'}' => Some(Delimiter::RBrace),
            b'[' => Some(Delimiter::LBracket),
            b']' => Some(Delimiter::RBracket),
            b',' => Some(Delimiter::Comma),
            b';' => Some(Delimiter::Semicolon),
            _ => None,
        }
    }
}

/// A token's payload, discriminated by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(Keyword),
    Operator(Operator),
    Delimiter(Delimiter),
    Numeric(Number),
    Literal(String),
    NewLine,
    Whitespace,
    Comment,
    Unknown,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
}

impl Token {
    pub fn new(kind: TokenKind, span: TextSpan) -> Self {
        Self { kind, span }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::NewLine | TokenKind::Comment)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(s) => Some(s),
            _ => None,
        }
    }
}
