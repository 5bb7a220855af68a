//! Abstract Syntax Tree for rule expressions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::RuleError;

/// AST node for rule expressions
///
/// Trees are immutable once built. Operator children are reference counted,
/// so combining rules shares existing subtrees instead of copying them.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Binary logical connective over two subtrees
    Operator {
        op: LogicalOp,
        left: Arc<Node>,
        right: Arc<Node>,
    },
    /// Single comparison like "age > 30"
    Operand(Condition),
}

/// Node tag, as written in the `type` field of a serialized record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Operator,
    Operand,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Operator => "operator",
            NodeKind::Operand => "operand",
        }
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// Conjunction (and)
    And,
    /// Disjunction (or)
    Or,
}

impl LogicalOp {
    /// Canonical lowercase symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }

    /// Binding strength; `and` binds tighter than `or`
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            LogicalOp::And => 2,
            LogicalOp::Or => 1,
        }
    }

    /// Combine two already evaluated operands
    pub fn apply(&self, left: bool, right: bool) -> bool {
        match self {
            LogicalOp::And => left && right,
            LogicalOp::Or => left || right,
        }
    }
}

impl FromStr for LogicalOp {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" | "and" => Ok(LogicalOp::And),
            "OR" | "or" => Ok(LogicalOp::Or),
            other => Err(RuleError::InvalidArgument(format!(
                "unsupported logical connective: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Single comparison, stored parsed
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparator: Comparator,
    pub literal: Literal,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator, literal: Literal) -> Self {
        Self {
            field: field.into(),
            comparator,
            literal,
        }
    }
}

/// Renders the canonical condition text, e.g. `department == 'Sales'`
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparator, self.literal)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Equal (==)
    Eq,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "==",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Literal value types
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(f64),
    String(String),
}

impl Literal {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Decimal(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            // Debug keeps a fraction or exponent, so the text re-parses as a decimal
            Literal::Decimal(d) => write!(f, "{:?}", d),
            Literal::String(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
        }
    }
}

impl Node {
    /// Build an operator node over two subtrees
    pub fn operator(
        op: LogicalOp,
        left: impl Into<Arc<Node>>,
        right: impl Into<Arc<Node>>,
    ) -> Self {
        Node::Operator {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    /// Build a leaf node
    pub fn operand(condition: Condition) -> Self {
        Node::Operand(condition)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Operator { .. } => NodeKind::Operator,
            Node::Operand(_) => NodeKind::Operand,
        }
    }

    /// The serialized `value`: operator symbol or canonical condition text
    pub fn value(&self) -> String {
        match self {
            Node::Operator { op, .. } => op.symbol().to_string(),
            Node::Operand(cond) => cond.to_string(),
        }
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        match self {
            Node::Operator { left, right, .. } => 1 + left.depth().max(right.depth()),
            Node::Operand(_) => 1,
        }
    }

    /// Number of leaf comparisons
    pub fn operand_count(&self) -> usize {
        match self {
            Node::Operator { left, right, .. } => left.operand_count() + right.operand_count(),
            Node::Operand(_) => 1,
        }
    }

    /// Names of every field the rule reads
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Node::Operator { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Node::Operand(cond) => {
                out.insert(cond.field.as_str());
            }
        }
    }

    fn fmt_child(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent: LogicalOp,
        is_right: bool,
    ) -> fmt::Result {
        let needs_parens = match self {
            // left-associative: a right child of equal precedence must keep its grouping
            Node::Operator { op, .. } => {
                op.precedence() < parent.precedence()
                    || (is_right && op.precedence() == parent.precedence())
            }
            Node::Operand(_) => false,
        };
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Renders the whole tree as an expression that compiles back to the same shape
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Operator { op, left, right } => {
                left.fmt_child(f, *op, false)?;
                write!(f, " {} ", op)?;
                right.fmt_child(f, *op, true)
            }
            Node::Operand(cond) => write!(f, "{}", cond),
        }
    }
}

impl From<Condition> for Node {
    fn from(condition: Condition) -> Self {
        Node::Operand(condition)
    }
}
