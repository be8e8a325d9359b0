use std::fmt;

// ---------------------------------------------------------------------------
// Field paths
// ---------------------------------------------------------------------------

/// Dotted field path, e.g. `payment.amount` or `items.0.sku`.
///
/// Numeric segments index into sequences; every other segment descends into
/// a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Split `raw` on `.`; returns `None` for an empty path or an empty segment.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Interpretation applied by `time()`, `date()` and `datetime()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemporalKind {
    /// Milliseconds since midnight (UTC for epoch inputs).
    Time,
    /// Epoch milliseconds at UTC midnight of the day.
    Date,
    /// Epoch milliseconds.
    DateTime,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Time => "time",
            TemporalKind::Date => "date",
            TemporalKind::DateTime => "datetime",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A string constant already parsed against the temporal operand it is
    /// compared with.
    Temporal { kind: TemporalKind, millis: i64 },
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// `===`, `=!=`, `<`, `<=`, `>`, `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "===",
            CmpOp::Ne => "=!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// String operators; all require a string left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    /// `#==`
    Prefix,
    /// `=@=`
    Contains,
    /// `==#`
    Suffix,
    /// `=#=`
    Regex,
}

impl StrOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrOp::Prefix => "#==",
            StrOp::Contains => "=@=",
            StrOp::Suffix => "==#",
            StrOp::Regex => "=#=",
        }
    }
}

/// A regex compiled once when the expression is compiled.
#[derive(Debug, Clone)]
pub struct Pattern(regex::Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(source).map(Self)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Right-hand side of a string operator.
#[derive(Debug, Clone, PartialEq)]
pub enum StrOperand {
    Value(Box<Expr>),
    Regex(Pattern),
}

// ---------------------------------------------------------------------------
// Quantifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Quantifier {
    /// `have <operand>`: membership, or any-match when the operand uses `?`.
    Have(Box<Expr>),
    /// `have size <op> N`
    HaveSize { op: CmpOp, size: i64 },
    /// `any matches (expr)`
    Any(Box<Expr>),
    /// `all matches (expr)`
    All(Box<Expr>),
    /// `none matches (expr)`
    None(Box<Expr>),
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Field extractor: a quoted path in field position or `field("path")`.
    Field(FieldPath),
    /// `?` or `?.path` inside a `matches` body.
    Placeholder(Option<FieldPath>),
    /// `exist("path")`
    Exist(FieldPath),
    /// `time("path")`, `date("path")`, `datetime("path")`
    Temporal { kind: TemporalKind, path: FieldPath },
    /// `!expr` / `not expr`
    Not(Box<Expr>),
    /// Unary minus.
    Neg(Box<Expr>),
    Logic {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    StrMatch {
        op: StrOp,
        left: Box<Expr>,
        right: StrOperand,
    },
    /// `expr in (..)`, `expr =:= (..)`, `expr not in (..)`.
    InList {
        expr: Box<Expr>,
        list: Vec<Literal>,
        negated: bool,
    },
    /// `target have ..`, `target any|all|none matches (..)`.
    Quantified {
        target: Box<Expr>,
        quantifier: Quantifier,
    },
}

impl Expr {
    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    /// True when `?` occurs anywhere below this node.
    pub fn uses_placeholder(&self) -> bool {
        match self {
            Expr::Placeholder(_) => true,
            Expr::Literal(_) | Expr::Field(_) | Expr::Exist(_) | Expr::Temporal { .. } => false,
            Expr::Not(inner) | Expr::Neg(inner) => inner.uses_placeholder(),
            Expr::Logic { left, right, .. }
            | Expr::Arith { left, right, .. }
            | Expr::Compare { left, right, .. } => {
                left.uses_placeholder() || right.uses_placeholder()
            }
            Expr::StrMatch { left, right, .. } => {
                left.uses_placeholder()
                    || matches!(right, StrOperand::Value(v) if v.uses_placeholder())
            }
            Expr::InList { expr, .. } => expr.uses_placeholder(),
            // A nested quantifier binds its own placeholder; only its target
            // belongs to the enclosing scope.
            Expr::Quantified { target, .. } => target.uses_placeholder(),
        }
    }
}

/// A compiled predicate or value expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    expr: Expr,
}

impl CompiledExpr {
    pub(crate) fn new(source: &str, expr: Expr) -> Self {
        Self {
            source: source.to_string(),
            expr,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// True when the source was empty and the expression is the constant `true`.
    pub fn is_trivial(&self) -> bool {
        self.source.trim().is_empty()
    }
}
