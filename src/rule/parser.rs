//! Rule expression parser
//!
//! Grammar, after keyword normalization:
//!
//! ```text
//! expr       := and_expr ( "or" and_expr )*
//! and_expr   := primary ( "and" primary )*
//! primary    := "(" expr ")" | comparison
//! comparison := IDENT ( ">" | "<" | "==" ) ( NUMBER | STRING )
//! ```
//!
//! Both connectives are left-associative, so `a and b and c` becomes
//! `(a and b) and c`.

use crate::config::{EngineConfig, DEFAULT_CONFIG};
use crate::error::{Result, RuleError};
use crate::rule::ast::{Comparator, Condition, Literal, LogicalOp, Node};
use crate::rule::normalizer::{is_ident_continue, is_ident_start, normalize};

/// Compile an expression with the default configuration
pub fn compile(expression: &str) -> Result<Node> {
    compile_with(expression, &DEFAULT_CONFIG)
}

/// Compile an expression into an AST
pub fn compile_with(expression: &str, config: &EngineConfig) -> Result<Node> {
    if expression.len() > config.max_expression_len {
        return Err(RuleError::syntax(
            format!("expression exceeds {} bytes", config.max_expression_len),
            config.max_expression_len,
            "",
        ));
    }
    if expression.trim().is_empty() {
        return Err(RuleError::syntax("empty expression", 0, ""));
    }

    // normalization keeps byte offsets, so tokens index the caller's text
    let tokens = tokenize(&normalize(expression))?;
    let mut parser = Parser::new(expression, tokens, config.max_nesting, config.max_depth);
    let (node, depth) = parser.parse_expression()?;
    parser.expect_end()?;

    tracing::debug!(
        expression,
        depth,
        operands = node.operand_count(),
        "compiled rule"
    );
    Ok(node)
}

/// Parse exactly one comparison, as stored in an operand's condition text
///
/// Keywords are normalized first, so a stored field can never be named
/// `AND`, `OR` or `NOT`.
pub(crate) fn parse_condition(text: &str) -> Result<Condition> {
    let tokens = tokenize(&normalize(text))?;
    let mut parser = Parser::new(text, tokens, 0, 1);
    let condition = parser.parse_comparison()?;
    parser.expect_end()?;
    Ok(condition)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Literal(Literal),
    Comparator(Comparator),
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.text.get(self.pos + offset..)?.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn fragment_from(&self, start: usize) -> &'a str {
        &self.text[start..self.pos]
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn lex_number(&mut self, start: usize) -> Result<Literal> {
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        self.eat_digits();

        let mut is_decimal = false;
        if self.peek() == Some('.') {
            self.pos += 1;
            if self.eat_digits() == 0 {
                return Err(RuleError::syntax(
                    "malformed number",
                    start,
                    self.fragment_from(start),
                ));
            }
            is_decimal = true;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.eat_digits() == 0 {
                return Err(RuleError::syntax(
                    "malformed number",
                    start,
                    self.fragment_from(start),
                ));
            }
            is_decimal = true;
        }

        let lexeme = self.fragment_from(start);
        if is_decimal {
            match lexeme.parse::<f64>() {
                Ok(d) if d.is_finite() => Ok(Literal::Decimal(d)),
                _ => Err(RuleError::syntax("numeric literal out of range", start, lexeme)),
            }
        } else {
            lexeme
                .parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| RuleError::syntax("integer literal out of range", start, lexeme))
        }
    }

    fn lex_string(&mut self, start: usize, quote: char) -> Result<Literal> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(RuleError::syntax(
                        "unterminated string literal",
                        start,
                        self.fragment_from(start),
                    ))
                }
                Some('\\') => {
                    let escape_pos = self.pos - 1;
                    match self.bump() {
                        Some(c @ ('\\' | '\'' | '"')) => value.push(c),
                        Some(_) => {
                            return Err(RuleError::syntax(
                                "unsupported escape sequence",
                                escape_pos,
                                self.fragment_from(escape_pos),
                            ))
                        }
                        None => {
                            return Err(RuleError::syntax(
                                "unterminated string literal",
                                start,
                                self.fragment_from(start),
                            ))
                        }
                    }
                }
                Some(c) if c == quote => return Ok(Literal::String(value)),
                Some(c) => value.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => {
                self.pos += 1;
                TokenKind::OpenParen
            }
            ')' => {
                self.pos += 1;
                TokenKind::CloseParen
            }
            '>' | '<' => {
                self.pos += 1;
                if self.peek() == Some('=') {
                    self.pos += 1;
                    return Err(RuleError::syntax(
                        "unsupported comparator",
                        start,
                        self.fragment_from(start),
                    ));
                }
                TokenKind::Comparator(if c == '>' { Comparator::Gt } else { Comparator::Lt })
            }
            '=' => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(RuleError::syntax("unsupported comparator", start, "="));
                }
                self.pos += 1;
                TokenKind::Comparator(Comparator::Eq)
            }
            '!' if self.peek_at(1) == Some('=') => {
                self.pos += 2;
                return Err(RuleError::syntax("unsupported comparator", start, "!="));
            }
            '\'' | '"' => {
                self.pos += 1;
                TokenKind::Literal(self.lex_string(start, c)?)
            }
            '-' if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) => {
                TokenKind::Literal(self.lex_number(start)?)
            }
            d if d.is_ascii_digit() => TokenKind::Literal(self.lex_number(start)?),
            c if is_ident_start(c) => {
                while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
                    self.bump();
                }
                match self.fragment_from(start) {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    ident => TokenKind::Ident(ident.to_string()),
                }
            }
            other => {
                return Err(RuleError::syntax(
                    "unexpected character",
                    start,
                    other.to_string(),
                ))
            }
        };

        Ok(Some(Token {
            kind,
            start,
            end: self.pos,
        }))
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer { text, pos: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    max_nesting: usize,
    max_depth: usize,
}

/// A parsed subtree with its depth
type Parsed = (Node, usize);

impl<'a> Parser<'a> {
    fn new(text: &'a str, tokens: Vec<Token>, max_nesting: usize, max_depth: usize) -> Self {
        Self {
            text,
            tokens,
            pos: 0,
            nesting: 0,
            max_nesting,
            max_depth,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn fragment(&self, token: &Token) -> &'a str {
        &self.text[token.start..token.end]
    }

    /// Error pointing at the current token, or at the end of input
    fn error_here(&self, expected: &str) -> RuleError {
        match self.peek() {
            Some(token) => {
                let message = match &token.kind {
                    TokenKind::Not => "unsupported connective 'not'".to_string(),
                    _ => format!("expected {}", expected),
                };
                RuleError::syntax(message, token.start, self.fragment(token))
            }
            None => RuleError::syntax(
                format!("expected {}, found end of input", expected),
                self.text.len(),
                "",
            ),
        }
    }

    /// Join two subtrees under a connective, enforcing the depth limit
    fn join(
        &self,
        op: LogicalOp,
        connective: &Token,
        left: Parsed,
        right: Parsed,
    ) -> Result<Parsed> {
        let depth = 1 + left.1.max(right.1);
        if depth > self.max_depth {
            return Err(RuleError::syntax(
                format!("rule tree deeper than {}", self.max_depth),
                connective.start,
                self.fragment(connective),
            ));
        }
        Ok((Node::operator(op, left.0, right.0), depth))
    }

    fn parse_expression(&mut self) -> Result<Parsed> {
        let mut left = self.parse_and()?;
        while let Some(connective) = self.peek().filter(|t| t.kind == TokenKind::Or).cloned() {
            self.advance();
            let right = self.parse_and()?;
            left = self.join(LogicalOp::Or, &connective, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Parsed> {
        let mut left = self.parse_primary()?;
        while let Some(connective) = self.peek().filter(|t| t.kind == TokenKind::And).cloned() {
            self.advance();
            let right = self.parse_primary()?;
            left = self.join(LogicalOp::And, &connective, left, right)?;
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Parsed> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::OpenParen) => {
                let open_start = self.tokens[self.pos].start;
                self.pos += 1;
                self.nesting += 1;
                if self.nesting > self.max_nesting {
                    return Err(RuleError::syntax(
                        format!("parentheses nested deeper than {}", self.max_nesting),
                        open_start,
                        "(",
                    ));
                }
                let inner = self.parse_expression()?;
                match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::CloseParen) => {
                        self.advance();
                    }
                    None => {
                        return Err(RuleError::syntax(
                            "unbalanced parentheses: missing ')'",
                            open_start,
                            &self.text[open_start..],
                        ))
                    }
                    Some(_) => return Err(self.error_here("')'")),
                }
                self.nesting -= 1;
                Ok(inner)
            }
            Some(TokenKind::Ident(_)) => Ok((Node::Operand(self.parse_comparison()?), 1)),
            _ => Err(self.error_here("comparison")),
        }
    }

    fn parse_comparison(&mut self) -> Result<Condition> {
        let field = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(self.error_here("field name")),
        };
        self.advance();

        let comparator = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Comparator(cmp)) => *cmp,
            _ => return Err(self.error_here("comparator '>', '<' or '=='")),
        };
        self.advance();

        let literal = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Literal(lit)) => lit.clone(),
            _ => return Err(self.error_here("number or quoted string")),
        };
        self.advance();

        Ok(Condition {
            field,
            comparator,
            literal,
        })
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::CloseParen => Err(RuleError::syntax(
                "unbalanced parentheses: unexpected ')'",
                token.start,
                ")",
            )),
            Some(_) => Err(self.error_here("'and', 'or' or end of input")),
        }
    }
}
