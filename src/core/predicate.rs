//! Inclusion predicates for packages, options, and dependency edges
//!
//! A `when` expression in deps.toml gates an entry on the requested bundle
//! kind and the host machine. The expression language is deliberately
//! closed: equality tests over a fixed set of variables, combined with
//! `!`, `&&`, `||`, and parentheses.
//!
//! ```text
//! bundle == sdk && machine.os == windows
//! machine.config != debug || bundle == toolchain
//! ```
//!
//! Parsing happens once at configuration load time; a malformed expression
//! is a fatal configuration error, never a silent `false`.

use crate::core::machine::{BuildConfig, MachineSpec};
use crate::core::spec::BundleKind;
use crate::error::ConfigError;

/// A parsed inclusion predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Always true; the absence of a `when` clause
    Always,
    /// The requested bundle kind equals the given kind
    BundleIs(BundleKind),
    /// The host operating system equals the given name
    OsIs(String),
    /// The host architecture equals the given name
    ArchIs(String),
    /// The host build configuration equals the given flavor
    ConfigIs(BuildConfig),
    /// Negation
    Not(Box<Predicate>),
    /// Conjunction
    All(Vec<Predicate>),
    /// Disjunction
    Any(Vec<Predicate>),
}

/// Evaluation context: the session's bundle kind and host machine
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Requested bundle kind
    pub bundle: BundleKind,
    /// Host machine description
    pub machine: &'a MachineSpec,
}

impl Predicate {
    /// Evaluate the predicate for the given context
    ///
    /// Pure and deterministic: the same context always yields the same
    /// answer.
    pub fn evaluate(&self, ctx: EvalContext<'_>) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::BundleIs(kind) => ctx.bundle == *kind,
            Predicate::OsIs(os) => ctx.machine.os == *os,
            Predicate::ArchIs(arch) => ctx.machine.arch == *arch,
            Predicate::ConfigIs(config) => ctx.machine.config == *config,
            Predicate::Not(inner) => !inner.evaluate(ctx),
            Predicate::All(parts) => parts.iter().all(|p| p.evaluate(ctx)),
            Predicate::Any(parts) => parts.iter().any(|p| p.evaluate(ctx)),
        }
    }

    /// Parse a `when` expression
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let mut parser = Parser::new(expression);
        parser.tokenize()?;
        if parser.tokens.is_empty() {
            return Err(parser.error("empty expression"));
        }
        let predicate = parser.parse_or()?;
        parser.expect_end()?;
        Ok(predicate)
    }

    /// Parse an optional `when` expression; `None` means always-included
    pub fn parse_optional(expression: Option<&str>) -> Result<Self, ConfigError> {
        match expression {
            Some(expr) => Self::parse(expr),
            None => Ok(Predicate::Always),
        }
    }
}

/// Recursive-descent parser over a token stream
struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Eq,
    Ne,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            tokens: Vec::new(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::MalformedPredicate {
            expression: self.expression.to_string(),
            error: message.into(),
        }
    }

    fn tokenize(&mut self) -> Result<(), ConfigError> {
        let mut chars = self.expression.char_indices().peekable();
        while let Some(&(i, c)) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '(' => {
                    chars.next();
                    self.tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    self.tokens.push(Token::RParen);
                }
                '!' => {
                    chars.next();
                    if chars.peek().map(|&(_, c)| c) == Some('=') {
                        chars.next();
                        self.tokens.push(Token::Ne);
                    } else {
                        self.tokens.push(Token::Bang);
                    }
                }
                '=' => {
                    chars.next();
                    if chars.next().map(|(_, c)| c) == Some('=') {
                        self.tokens.push(Token::Eq);
                    } else {
                        return Err(self.error("expected '=='"));
                    }
                }
                '&' => {
                    chars.next();
                    if chars.next().map(|(_, c)| c) == Some('&') {
                        self.tokens.push(Token::AndAnd);
                    } else {
                        return Err(self.error("expected '&&'"));
                    }
                }
                '|' => {
                    chars.next();
                    if chars.next().map(|(_, c)| c) == Some('|') {
                        self.tokens.push(Token::OrOr);
                    } else {
                        return Err(self.error("expected '||'"));
                    }
                }
                '\'' => {
                    chars.next();
                    let start = i + 1;
                    let mut end = None;
                    for (j, c) in chars.by_ref() {
                        if c == '\'' {
                            end = Some(j);
                            break;
                        }
                    }
                    let Some(end) = end else {
                        return Err(self.error("unterminated string literal"));
                    };
                    self.tokens
                        .push(Token::Ident(self.expression[start..end].to_string()));
                }
                c if c.is_alphanumeric() || c == '_' || c == '.' => {
                    let start = i;
                    let mut end = i;
                    while let Some(&(j, c)) = chars.peek() {
                        if c.is_alphanumeric() || c == '_' || c == '.' {
                            end = j + c.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    self.tokens
                        .push(Token::Ident(self.expression[start..end].to_string()));
                }
                other => {
                    return Err(self.error(format!("unexpected character '{other}'")));
                }
            }
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Predicate, ConfigError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            parts.push(self.parse_and()?);
        }
        if parts.len() > 1 {
            Ok(Predicate::Any(parts))
        } else {
            parts.pop().ok_or_else(|| self.error("empty expression"))
        }
    }

    fn parse_and(&mut self) -> Result<Predicate, ConfigError> {
        let mut parts = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            parts.push(self.parse_unary()?);
        }
        if parts.len() > 1 {
            Ok(Predicate::All(parts))
        } else {
            parts.pop().ok_or_else(|| self.error("empty expression"))
        }
    }

    fn parse_unary(&mut self) -> Result<Predicate, ConfigError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.next();
                Ok(Predicate::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_or()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Predicate, ConfigError> {
        let variable = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(self.error(format!("expected a variable, got {other:?}")));
            }
        };
        let negated = match self.next() {
            Some(Token::Eq) => false,
            Some(Token::Ne) => true,
            other => {
                return Err(self.error(format!("expected '==' or '!=', got {other:?}")));
            }
        };
        let value = match self.next() {
            Some(Token::Ident(value)) => value,
            other => {
                return Err(self.error(format!("expected a value, got {other:?}")));
            }
        };

        let comparison = match variable.as_str() {
            "bundle" => Predicate::BundleIs(
                BundleKind::parse(&value)
                    .ok_or_else(|| self.error(format!("unknown bundle kind '{value}'")))?,
            ),
            "machine.os" => Predicate::OsIs(value),
            "machine.arch" => Predicate::ArchIs(value),
            "machine.config" => match value.as_str() {
                "debug" => Predicate::ConfigIs(BuildConfig::Debug),
                "release" => Predicate::ConfigIs(BuildConfig::Release),
                other => {
                    return Err(self.error(format!("unknown build config '{other}'")));
                }
            },
            other => {
                return Err(self.error(format!("unknown variable '{other}'")));
            }
        };

        if negated {
            Ok(Predicate::Not(Box::new(comparison)))
        } else {
            Ok(comparison)
        }
    }

    fn expect_end(&self) -> Result<(), ConfigError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.error("trailing tokens"))
        }
    }
}
