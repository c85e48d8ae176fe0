// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restricted condition expressions.
//!
//! Conditions route workflow steps without running arbitrary code. The
//! language is three predicates and boolean glue:
//!
//! ```text
//! has_artifact("prd_epic")
//! artifact("prd_epic").scope == "mvp"
//! phase == "build"
//! !a && (b || c)
//! ```
//!
//! Evaluation is fallible by design: a field test against an artifact
//! that does not exist is *unevaluable*, not false — the engine decides
//! what that means for optional versus required steps.

use serde_json::Value;
use std::str::FromStr;
use sw_core::Phase;
use thiserror::Error;

/// Parse failure with byte position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("condition parse error at byte {at}: {message}")]
pub struct ConditionError {
    pub at: usize,
    pub message: String,
}

/// The condition references state that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("condition references missing input: {0}")]
pub struct Unevaluable(pub String);

/// What an expression needs from the outside world.
pub trait ConditionScope {
    /// The project's current phase.
    fn phase(&self) -> Phase;
    /// Content of the latest artifact of a type, if any exists.
    fn artifact_content(&self, artifact_type: &str) -> Option<Value>;
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
}

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    HasArtifact(String),
    /// `artifact("type").path.to.field == literal`
    FieldTest { artifact_type: String, path: Vec<String>, cmp: Cmp, literal: Value },
    /// `phase == "build"`
    PhaseTest { cmp: Cmp, phase: Phase },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate against a scope.
    pub fn eval(&self, scope: &dyn ConditionScope) -> Result<bool, Unevaluable> {
        match self {
            Expr::HasArtifact(artifact_type) => {
                Ok(scope.artifact_content(artifact_type).is_some())
            }
            Expr::FieldTest { artifact_type, path, cmp, literal } => {
                let content = scope
                    .artifact_content(artifact_type)
                    .ok_or_else(|| Unevaluable(format!("artifact {artifact_type}")))?;
                let mut value = &content;
                for key in path {
                    value = value.get(key).ok_or_else(|| {
                        Unevaluable(format!("field {key} of artifact {artifact_type}"))
                    })?;
                }
                let equal = value == literal;
                Ok(match cmp {
                    Cmp::Eq => equal,
                    Cmp::Ne => !equal,
                })
            }
            Expr::PhaseTest { cmp, phase } => {
                let equal = scope.phase() == *phase;
                Ok(match cmp {
                    Cmp::Eq => equal,
                    Cmp::Ne => !equal,
                })
            }
            Expr::Not(inner) => Ok(!inner.eval(scope)?),
            Expr::And(a, b) => Ok(a.eval(scope)? && b.eval(scope)?),
            Expr::Or(a, b) => Ok(a.eval(scope)? || b.eval(scope)?),
        }
    }
}

/// Parse a condition expression.
pub fn parse_condition(input: &str) -> Result<Expr, ConditionError> {
    let mut parser = Parser { input: input.as_bytes(), pos: 0 };
    let expr = parser.expr()?;
    parser.skip_ws();
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(expr)
}

/// Recursive-descent parser over the raw bytes.
///
/// Grammar:
/// ```text
/// expr    := and ( "||" and )*
/// and     := unary ( "&&" unary )*
/// unary   := "!" unary | "(" expr ")" | predicate
/// predicate := "has_artifact" "(" string ")"
///            | "artifact" "(" string ")" ( "." ident )+ cmp literal
///            | "phase" cmp string
/// cmp     := "==" | "!="
/// literal := string | number | "true" | "false"
/// ```
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> ConditionError {
        ConditionError { at: self.pos, message: message.into() }
    }

    fn skip_ws(&mut self) {
        while self.input.get(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.input[self.pos..].starts_with(token.as_bytes()) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ConditionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}")))
        }
    }

    fn expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.unary()?;
        while self.eat("&&") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        self.skip_ws();
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let inner = self.expr()?;
            self.expect(")")?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, ConditionError> {
        self.skip_ws();
        let ident = self.ident()?;
        match ident.as_str() {
            "has_artifact" => {
                self.expect("(")?;
                let artifact_type = self.string()?;
                self.expect(")")?;
                Ok(Expr::HasArtifact(artifact_type))
            }
            "artifact" => {
                self.expect("(")?;
                let artifact_type = self.string()?;
                self.expect(")")?;
                let mut path = Vec::new();
                while self.eat(".") {
                    path.push(self.ident()?);
                }
                if path.is_empty() {
                    return Err(self.error("artifact() needs a .field path"));
                }
                let cmp = self.cmp()?;
                let literal = self.literal()?;
                Ok(Expr::FieldTest { artifact_type, path, cmp, literal })
            }
            "phase" => {
                let cmp = self.cmp()?;
                let name = self.string()?;
                let phase = Phase::from_str(&name)
                    .map_err(|e| self.error(e.to_string()))?;
                Ok(Expr::PhaseTest { cmp, phase })
            }
            other => Err(self.error(format!("unknown predicate {other:?}"))),
        }
    }

    fn cmp(&mut self) -> Result<Cmp, ConditionError> {
        if self.eat("==") {
            Ok(Cmp::Eq)
        } else if self.eat("!=") {
            Ok(Cmp::Ne)
        } else {
            Err(self.error("expected == or !="))
        }
    }

    fn ident(&mut self) -> Result<String, ConditionError> {
        self.skip_ws();
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn string(&mut self) -> Result<String, ConditionError> {
        self.skip_ws();
        self.expect("\"")?;
        let start = self.pos;
        while self.input.get(self.pos).is_some_and(|b| *b != b'"') {
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            return Err(self.error("unterminated string"));
        }
        let s = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos += 1; // closing quote
        Ok(s)
    }

    fn literal(&mut self) -> Result<Value, ConditionError> {
        self.skip_ws();
        match self.input.get(self.pos) {
            Some(b'"') => Ok(Value::String(self.string()?)),
            Some(b) if b.is_ascii_digit() || *b == b'-' => {
                let start = self.pos;
                self.pos += 1;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
                {
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.input[start..self.pos]);
                serde_json::from_str(&text).map_err(|_| self.error("bad number literal"))
            }
            _ => {
                if self.eat("true") {
                    Ok(Value::Bool(true))
                } else if self.eat("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(self.error("expected literal"))
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
