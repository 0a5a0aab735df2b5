//! Abstract syntax tree for Stencil templates.
//!
//! A [`Program`] is an ordered list of [`TemplateElement`]s: raw text runs and
//! tags. Tags hold at most one [`Statement`]; block statements (`if`, `for`)
//! own their nested element lists together with the inner delimiter [`Tag`]s,
//! so the formatter can reproduce trim markers and comments exactly.
//!
//! Every node carries the [`Span`] it was parsed from. Expression nodes also
//! carry the block comments written around them.

use std::fmt;

use crate::span::Span;

/// A parsed template together with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub elements: Vec<TemplateElement>,
    pub source: String,
}

/// One top-level unit of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateElement {
    /// Literal text copied to the output unchanged.
    Raw(RawTemplate),
    /// A `{{ ... }}` tag.
    Tag(TagTemplate),
}

impl TemplateElement {
    pub fn span(&self) -> Span {
        match self {
            TemplateElement::Raw(raw) => raw.span,
            TemplateElement::Tag(tag) => tag.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTemplate {
    pub value: String,
    pub span: Span,
}

/// An open delimiter, an optional statement and a close delimiter.
///
/// For `if` and `for` statements the close delimiter is the one that ends the
/// trailing `end` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagTemplate {
    pub open: Tag,
    pub statement: Option<Statement>,
    pub close: Tag,
    pub span: Span,
}

impl TagTemplate {
    /// Comments written right after the open delimiter.
    pub fn leading_comments(&self) -> &[Comment] {
        &self.open.comments
    }

    /// Comments written right before the close delimiter.
    pub fn trailing_comments(&self) -> &[Comment] {
        &self.close.comments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
}

/// A single delimiter occurrence.
///
/// `comments` are those attached inside the tag next to this delimiter: after
/// an open delimiter, before a close delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub kind: TagKind,
    /// The configured delimiter text, without the trim marker.
    pub delimiter: String,
    pub trim: bool,
    pub comments: Vec<Comment>,
    pub span: Span,
}

impl Tag {
    /// The delimiter as written, including the `-` trim marker.
    pub fn text(&self) -> String {
        match (self.kind, self.trim) {
            (TagKind::Open, true) => format!("{}-", self.delimiter),
            (TagKind::Close, true) => format!("-{}", self.delimiter),
            (_, false) => self.delimiter.clone(),
        }
    }
}

/// A `/* ... */` block comment. `body` is the text between the markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub body: String,
    pub span: Span,
}

impl Comment {
    pub fn is_multiline(&self) -> bool {
        self.body.contains('\n')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Variable(VariableStatement),
    If(IfStatement),
    For(ForStatement),
    Break(Span),
    Continue(Span),
}

/// `name := value`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStatement {
    pub name: Identifier,
    pub value: Expression,
    pub span: Span,
}

/// `if test }} consequent ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub test: Expression,
    /// Closes the tag holding the condition.
    pub if_close: Tag,
    pub consequent: Vec<TemplateElement>,
    pub alternate: IfAlternate,
    pub span: Span,
}

impl IfStatement {
    /// The delimiter that opens the final `end` tag of this `if` chain.
    pub fn end_open(&self) -> &Tag {
        match &self.alternate {
            IfAlternate::End { end_open } | IfAlternate::Else { end_open, .. } => end_open,
            IfAlternate::ElseIf { statement, .. } => statement.end_open(),
        }
    }
}

/// What follows the consequent body of an [`IfStatement`].
#[derive(Debug, Clone, PartialEq)]
pub enum IfAlternate {
    /// `{{ end`
    End { end_open: Tag },
    /// `{{ else }} body {{ end`
    Else {
        else_open: Tag,
        else_close: Tag,
        body: Vec<TemplateElement>,
        end_open: Tag,
    },
    /// `{{ else if ...`, which owns the remainder of the chain and its `end`.
    ElseIf {
        else_open: Tag,
        statement: Box<IfStatement>,
    },
}

/// `for value, index in iterable }} body {{ end`
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub value: Identifier,
    pub index: Option<Identifier>,
    pub iterable: Expression,
    pub for_close: Tag,
    pub body: Vec<TemplateElement>,
    pub end_open: Tag,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// Comments attached before and after an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comments {
    pub leading: Vec<Comment>,
    pub trailing: Vec<Comment>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
    pub comments: Comments,
}

impl Expression {
    /// Create an expression without comments.
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self {
            kind,
            span,
            comments: Comments::default(),
        }
    }

    /// Whether this expression may be the target of `++`/`--`.
    ///
    /// Parentheses are looked through; the innermost expression must be an
    /// identifier or a member access.
    pub fn is_assignable(&self) -> bool {
        match &self.kind {
            ExpressionKind::Identifier(_) | ExpressionKind::Member { .. } => true,
            ExpressionKind::Parenthesized(inner) => inner.is_assignable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Null,
    Undefined,
    Boolean(bool),
    Numeric(f64),
    String {
        value: String,
        quote: Quote,
    },
    Identifier(String),
    Array(Vec<Expression>),
    Member {
        object: Box<Expression>,
        property: Box<Expression>,
        /// `true` for `a[b]`, `false` for `a.b`.
        computed: bool,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        /// Set when the call came from a `|` segment.
        pipe: bool,
    },
    Unary {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    Update {
        operator: UpdateOperator,
        prefix: bool,
        argument: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    Logical {
        left: Box<Expression>,
        operator: LogicalOperator,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Parenthesized(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    Single,
    Double,
}

impl Quote {
    pub fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    BitNot,
    Not,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

impl UpdateOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOperator::Increment => "++",
            UpdateOperator::Decrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(UnaryOperator, UpdateOperator, BinaryOperator, LogicalOperator);
