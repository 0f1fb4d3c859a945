//! Authorization rule predicates: composition and evaluation.
//!
//! Rule predicates are boolean expressions over `@request.auth.*`, bare
//! field references, and `@collection.<name>.<field>` lookups, combined
//! with `&&`, `||`, `=`, `!=` and the any-match operator `?=`. The
//! rendered strings are part of the store's compatibility surface and
//! must not change shape.
//!
//! Rules are composed from a fixed set of fragments rather than written
//! ad hoc:
//! - [`AUTH_PRESENT`]: a non-empty authenticated principal id.
//! - [`membership_of`]: the principal matches a membership row whose
//!   organization matches the target record (directly, or through the
//!   record's own organization relation).
//! - [`role_in`]: the matched membership's role is in a given set.
//!
//! Evaluation covers exactly this grammar, with any-match semantics:
//! an expression referencing `@collection.<name>` holds if any row of
//! that collection satisfies it.

use crate::core::error::StoreError;
use crate::core::store::Record;

/// Requires an authenticated principal.
pub const AUTH_PRESENT: &str = "@request.auth.id != ''";

const MEMBERSHIP_USER_MATCH: &str = "@request.auth.id ?= @collection.org_members.user";

/// How a rule locates the organization a record belongs to.
#[derive(Debug, Clone, Copy)]
pub enum OrgScope {
    /// The record is itself an organization (`id` matches).
    Itself,
    /// The record points at its organization through a relation field.
    Via(&'static str),
}

/// Fragment: the principal holds a membership in the record's
/// organization.
pub fn membership_of(scope: OrgScope) -> String {
    match scope {
        OrgScope::Itself => format!(
            "{} && id ?= @collection.org_members.organization",
            MEMBERSHIP_USER_MATCH
        ),
        OrgScope::Via(field) => format!(
            "{}.id ?= @collection.org_members.organization && {}",
            field, MEMBERSHIP_USER_MATCH
        ),
    }
}

/// Fragment: the matched membership's role is one of `roles`.
pub fn role_in(roles: &[&str]) -> String {
    let clauses: Vec<String> = roles
        .iter()
        .map(|r| format!("@collection.org_members.role = '{}'", r))
        .collect();
    if clauses.len() == 1 {
        clauses.into_iter().next().unwrap()
    } else {
        format!("({})", clauses.join(" || "))
    }
}

/// Compose fragments with logical AND.
pub fn all(parts: &[&str]) -> String {
    parts.join(" && ")
}

/// Collection names referenced through `@collection.<name>.<field>`
/// lookups, in first-appearance order. A rule must not be attached to
/// a collection before everything it references exists.
pub fn referenced_collections(expr: &str) -> Vec<String> {
    const PREFIX: &str = "@collection.";
    let mut names = Vec::new();
    let mut rest = expr;
    while let Some(pos) = rest.find(PREFIX) {
        rest = &rest[pos + PREFIX.len()..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Evaluation inputs: the authenticated principal (if any) and the
/// target record.
pub struct EvalContext<'a> {
    pub auth: Option<&'a Record>,
    pub record: &'a Record,
}

/// Evaluate a predicate against a context. `rows` loads the records of
/// a referenced `@collection.<name>`; it is only called for collections
/// the expression actually names.
///
/// An empty expression is public and evaluates to true.
pub fn evaluate<F>(expr: &str, ctx: &EvalContext, rows: F) -> Result<bool, StoreError>
where
    F: Fn(&str) -> Result<Vec<Record>, StoreError>,
{
    if expr.trim().is_empty() {
        return Ok(true);
    }
    let tokens = tokenize(expr)?;

    let mut referenced: Vec<String> = Vec::new();
    for t in &tokens {
        if let Token::Ref(r) = t
            && let Some(rest) = r.strip_prefix("@collection.")
            && let Some(name) = rest.split('.').next()
            && !referenced.iter().any(|n| n == name)
        {
            referenced.push(name.to_string());
        }
    }

    if referenced.is_empty() {
        let mut parser = Parser::new(&tokens, ctx, &[]);
        return parser.parse_expr();
    }

    // Any-match: the predicate holds if some combination of rows from
    // the referenced collections satisfies it.
    let mut loaded: Vec<(String, Vec<Record>)> = Vec::new();
    for name in &referenced {
        loaded.push((name.clone(), rows(name)?));
    }
    any_match(&tokens, ctx, &loaded, &mut Vec::new())
}

fn any_match<'a>(
    tokens: &[Token],
    ctx: &EvalContext,
    remaining: &'a [(String, Vec<Record>)],
    bound: &mut Vec<(&'a str, &'a Record)>,
) -> Result<bool, StoreError> {
    let Some(((name, rows), rest)) = remaining.split_first() else {
        let mut parser = Parser::new(tokens, ctx, bound);
        return parser.parse_expr();
    };
    for row in rows {
        bound.push((name.as_str(), row));
        let hit = any_match(tokens, ctx, rest, bound)?;
        bound.pop();
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Eq,
    Ne,
    AnyEq,
    Lit(String),
    Ref(String),
}

fn tokenize(expr: &str) -> Result<Vec<Token>, StoreError> {
    let bad = |msg: &str| StoreError::Validation(format!("bad rule expression: {}", msg));
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(bad("expected && or ||"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '!' | '?' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(bad("expected != or ?="));
                }
                tokens.push(if c == '!' { Token::Ne } else { Token::AnyEq });
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '\'' | '"' => {
                chars.next();
                let mut lit = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(ch) => lit.push(ch),
                        None => return Err(bad("unterminated literal")),
                    }
                }
                tokens.push(Token::Lit(lit));
            }
            _ => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "()=!?&|'\"".contains(ch) {
                        break;
                    }
                    ident.push(ch);
                    chars.next();
                }
                if ident.is_empty() {
                    return Err(bad("unexpected character"));
                }
                tokens.push(Token::Ref(ident));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a EvalContext<'a>,
    bound: &'a [(&'a str, &'a Record)],
}

impl<'a> Parser<'a> {
    fn new(
        tokens: &'a [Token],
        ctx: &'a EvalContext<'a>,
        bound: &'a [(&'a str, &'a Record)],
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            ctx,
            bound,
        }
    }

    fn bad(&self, msg: &str) -> StoreError {
        StoreError::Validation(format!("bad rule expression: {}", msg))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<bool, StoreError> {
        let result = self.parse_or()?;
        if self.pos != self.tokens.len() {
            return Err(self.bad("trailing tokens"));
        }
        Ok(result)
    }

    fn parse_or(&mut self) -> Result<bool, StoreError> {
        let mut result = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            result = result || rhs;
        }
        Ok(result)
    }

    fn parse_and(&mut self) -> Result<bool, StoreError> {
        let mut result = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_primary()?;
            result = result && rhs;
        }
        Ok(result)
    }

    fn parse_primary(&mut self) -> Result<bool, StoreError> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_or()?;
            if self.next() != Some(&Token::RParen) {
                return Err(self.bad("missing closing paren"));
            }
            return Ok(inner);
        }
        let left = self.parse_operand()?;
        let op = match self.next() {
            Some(Token::Eq) | Some(Token::AnyEq) => true,
            Some(Token::Ne) => false,
            _ => return Err(self.bad("expected comparison operator")),
        };
        let right = self.parse_operand()?;
        Ok((left == right) == op)
    }

    fn parse_operand(&mut self) -> Result<String, StoreError> {
        match self.next().cloned() {
            Some(Token::Lit(s)) => Ok(s),
            Some(Token::Ref(r)) => Ok(self.resolve(&r)),
            _ => Err(self.bad("expected operand")),
        }
    }

    fn resolve(&self, reference: &str) -> String {
        if let Some(path) = reference.strip_prefix("@request.auth.") {
            return match self.ctx.auth {
                Some(auth) => record_path(auth, path),
                None => String::new(),
            };
        }
        if let Some(rest) = reference.strip_prefix("@collection.") {
            let mut parts = rest.splitn(2, '.');
            let name = parts.next().unwrap_or_default();
            let path = parts.next().unwrap_or_default();
            return match self.bound.iter().find(|(n, _)| *n == name) {
                Some((_, row)) => record_path(row, path),
                None => String::new(),
            };
        }
        record_path(self.ctx.record, reference)
    }
}

/// Resolve a dotted field path against a record. A trailing `.id` on a
/// relation field yields the foreign id the field already holds.
fn record_path(record: &Record, path: &str) -> String {
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    let base = if first == "id" {
        record.id.clone()
    } else {
        value_to_string(record.get(first))
    };
    match rest.as_slice() {
        [] => base,
        ["id"] => base,
        _ => String::new(),
    }
}

fn value_to_string(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
