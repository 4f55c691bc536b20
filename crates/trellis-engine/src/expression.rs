//! Declarative input-expression evaluator.
//!
//! Step inputs and branch guards may carry expression strings tagged with
//! the `expr/` prefix. These are evaluated against a read-only view of the
//! [`Context`](crate::context::Context) — `ctx.request.*` and `ctx.vars.*`
//! — never against live code.
//!
//! **Scope** (hard boundary):
//! - Field access: dot notation rooted at `ctx.request` / `ctx.vars`
//! - Comparisons: `==`, `===`, `!=`, `!==`, `>`, `<`, `>=`, `<=`
//! - Logical: `&&`, `||`, `!` — with value semantics (`a || b` yields the
//!   first truthy operand, `a && b` yields `b` when `a` is truthy, else `a`)
//! - Ternary: `cond ? a : b`, parentheses
//! - Literals: string (single or double quoted), number, bool, null,
//!   undefined
//! - Coercion calls: `number(x)`, `boolean(x)` — the whole whitelist
//!
//! **Explicitly NOT supported**: array indexing, arithmetic, regex,
//! user-defined functions, any form of mutation or I/O.
//!
//! Evaluation is a pure function `(expression, view) → value`. A missing
//! field resolves to undefined (`None`), not an error, so fallback chains
//! like `ctx.vars.x || 5` behave as written.

use serde_json::Value;
use thiserror::Error;

/// Prefix marking a step input or guard as an expression rather than a
/// literal.
pub const EXPR_PREFIX: &str = "expr/";

/// Errors from expression evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExpressionError {
    #[error("parse error: {message}")]
    Parse { message: String },
    #[error("evaluation error: {message}")]
    Eval { message: String },
}

/// Evaluate an expression against a context view.
///
/// `Ok(None)` means the expression resolved to undefined (e.g. a missing
/// field). Errors are reserved for malformed expressions.
pub fn evaluate(expression: &str, view: &Value) -> Result<Option<Value>, ExpressionError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse {
            message: "empty expression".into(),
        });
    }
    let (val, rest) = parse_ternary(&tokens, view)?;
    if !rest.is_empty() {
        return Err(ExpressionError::Parse {
            message: format!("unexpected token: {:?}", rest[0]),
        });
    }
    Ok(val)
}

/// Evaluate an expression and coerce the result to a boolean.
///
/// Used for branch guards. Undefined and null are falsy.
pub fn evaluate_truthy(expression: &str, view: &Value) -> Result<bool, ExpressionError> {
    Ok(truthy(&evaluate(expression, view)?))
}

/// Structural check without a real context — used at workflow-load time.
///
/// Missing fields evaluate to undefined, so a parse against an empty view
/// exercises the full grammar.
pub fn check(expression: &str) -> Result<(), ExpressionError> {
    evaluate(expression, &Value::Null).map(|_| ())
}

/// JavaScript-style truthiness over an optional JSON value.
pub fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String), // field path or function name
    Str(String),   // quoted string literal
    Num(f64),      // numeric literal
    Bool(bool),    // true / false
    Null,          // null
    Undefined,     // undefined
    Eq,            // ==
    StrictEq,      // ===
    Ne,            // !=
    StrictNe,      // !==
    Gt,            // >
    Lt,            // <
    Ge,            // >=
    Le,            // <=
    And,           // &&
    Or,            // ||
    Not,           // !
    Question,      // ?
    Colon,         // :
    LParen,        // (
    RParen,        // )
    Comma,         // ,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '=' if peek(&chars, i + 1) == Some('=') && peek(&chars, i + 2) == Some('=') => {
                tokens.push(Token::StrictEq);
                i += 3;
            }
            '=' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if peek(&chars, i + 1) == Some('=') && peek(&chars, i + 2) == Some('=') => {
                tokens.push(Token::StrictNe);
                i += 3;
            }
            '!' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '&' if peek(&chars, i + 1) == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if peek(&chars, i + 1) == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let quote = chars[i];
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExpressionError::Parse {
                        message: "unterminated string literal".into(),
                    });
                }
                let s: String = chars[start..i].iter().collect();
                tokens.push(Token::Str(s));
                i += 1; // closing quote
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek(&chars, i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str.parse().map_err(|_| ExpressionError::Parse {
                    message: format!("invalid number: {num_str}"),
                })?;
                tokens.push(Token::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match ident.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    "null" => tokens.push(Token::Null),
                    "undefined" => tokens.push(Token::Undefined),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            other => {
                return Err(ExpressionError::Parse {
                    message: format!("unexpected character: {other}"),
                });
            }
        }
    }
    Ok(tokens)
}

fn peek(chars: &[char], idx: usize) -> Option<char> {
    chars.get(idx).copied()
}

// ---------------------------------------------------------------------------
// Recursive descent — precedence: primary > ! > comparison > && > || > ?:
// ---------------------------------------------------------------------------

type Evaluated = Option<Value>;
type ParseResult<'a> = Result<(Evaluated, &'a [Token]), ExpressionError>;

/// ternary = or_expr ( "?" ternary ":" ternary )?
fn parse_ternary<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    let (cond, rest) = parse_or(tokens, view)?;
    if rest.first() != Some(&Token::Question) {
        return Ok((cond, rest));
    }
    let (when_true, rest) = parse_ternary(&rest[1..], view)?;
    if rest.first() != Some(&Token::Colon) {
        return Err(ExpressionError::Parse {
            message: "expected ':' in ternary".into(),
        });
    }
    let (when_false, rest) = parse_ternary(&rest[1..], view)?;
    let picked = if truthy(&cond) { when_true } else { when_false };
    Ok((picked, rest))
}

/// or_expr = and_expr ( "||" and_expr )* — yields the first truthy operand.
fn parse_or<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    let (mut left, mut rest) = parse_and(tokens, view)?;
    while rest.first() == Some(&Token::Or) {
        let (right, r) = parse_and(&rest[1..], view)?;
        if !truthy(&left) {
            left = right;
        }
        rest = r;
    }
    Ok((left, rest))
}

/// and_expr = comparison ( "&&" comparison )* — yields the right operand
/// while the left stays truthy, JS-style.
fn parse_and<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    let (mut left, mut rest) = parse_comparison(tokens, view)?;
    while rest.first() == Some(&Token::And) {
        let (right, r) = parse_comparison(&rest[1..], view)?;
        if truthy(&left) {
            left = right;
        }
        rest = r;
    }
    Ok((left, rest))
}

/// comparison = unary ( compop unary )?
fn parse_comparison<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    let (left, rest) = parse_unary(tokens, view)?;
    let op = match rest.first() {
        Some(Token::Eq) => CompOp::Eq,
        Some(Token::StrictEq) => CompOp::StrictEq,
        Some(Token::Ne) => CompOp::Ne,
        Some(Token::StrictNe) => CompOp::StrictNe,
        Some(Token::Gt) => CompOp::Gt,
        Some(Token::Lt) => CompOp::Lt,
        Some(Token::Ge) => CompOp::Ge,
        Some(Token::Le) => CompOp::Le,
        _ => return Ok((left, rest)),
    };
    let (right, rest) = parse_unary(&rest[1..], view)?;
    Ok((Some(Value::Bool(compare(&left, &right, op))), rest))
}

/// unary = "!" unary | primary
fn parse_unary<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    if tokens.first() == Some(&Token::Not) {
        let (val, rest) = parse_unary(&tokens[1..], view)?;
        return Ok((Some(Value::Bool(!truthy(&val))), rest));
    }
    parse_primary(tokens, view)
}

enum CompOp {
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Gt,
    Lt,
    Ge,
    Le,
}

fn compare(left: &Evaluated, right: &Evaluated, op: CompOp) -> bool {
    match op {
        CompOp::Eq => loose_eq(left, right),
        CompOp::Ne => !loose_eq(left, right),
        CompOp::StrictEq => strict_eq(left, right),
        CompOp::StrictNe => !strict_eq(left, right),
        CompOp::Gt | CompOp::Lt | CompOp::Ge | CompOp::Le => {
            let (l, r) = match (left, right) {
                (Some(l), Some(r)) => (l, r),
                _ => return false,
            };
            if let (Some(l), Some(r)) = (as_f64(l), as_f64(r)) {
                return match op {
                    CompOp::Gt => l > r,
                    CompOp::Lt => l < r,
                    CompOp::Ge => l >= r,
                    CompOp::Le => l <= r,
                    _ => unreachable!(),
                };
            }
            if let (Value::String(l), Value::String(r)) = (l, r) {
                return match op {
                    CompOp::Gt => l > r,
                    CompOp::Lt => l < r,
                    CompOp::Ge => l >= r,
                    CompOp::Le => l <= r,
                    _ => unreachable!(),
                };
            }
            false
        }
    }
}

/// Loose equality: undefined and null are mutually equal; numbers compare
/// by f64 coercion; otherwise same-type value equality.
fn loose_eq(left: &Evaluated, right: &Evaluated) -> bool {
    let l_absent = matches!(left, None | Some(Value::Null));
    let r_absent = matches!(right, None | Some(Value::Null));
    if l_absent || r_absent {
        return l_absent && r_absent;
    }
    same_value(left, right)
}

/// Strict equality: undefined and null are distinct.
fn strict_eq(left: &Evaluated, right: &Evaluated) -> bool {
    match (left, right) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Null), _) | (_, Some(Value::Null)) => false,
        _ => same_value(left, right),
    }
}

fn same_value(left: &Evaluated, right: &Evaluated) -> bool {
    let (l, r) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };
    if let (Some(l), Some(r)) = (as_f64(l), as_f64(r)) {
        return (l - r).abs() < f64::EPSILON;
    }
    match (l, r) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => l == r,
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// primary = Str | Num | Bool | Null | Undefined | call | path | "(" ternary ")"
fn parse_primary<'a>(tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    match tokens.first() {
        None => Err(ExpressionError::Parse {
            message: "unexpected end of expression".into(),
        }),
        Some(Token::Str(s)) => Ok((Some(Value::String(s.clone())), &tokens[1..])),
        Some(Token::Num(n)) => Ok((Some(num_value(*n)), &tokens[1..])),
        Some(Token::Bool(b)) => Ok((Some(Value::Bool(*b)), &tokens[1..])),
        Some(Token::Null) => Ok((Some(Value::Null), &tokens[1..])),
        Some(Token::Undefined) => Ok((None, &tokens[1..])),
        Some(Token::LParen) => {
            let (val, rest) = parse_ternary(&tokens[1..], view)?;
            if rest.first() != Some(&Token::RParen) {
                return Err(ExpressionError::Parse {
                    message: "expected ')'".into(),
                });
            }
            Ok((val, &rest[1..]))
        }
        Some(Token::Ident(name)) => {
            if tokens.get(1) == Some(&Token::LParen) {
                return parse_call(name, &tokens[2..], view);
            }
            Ok((resolve_path(view, name), &tokens[1..]))
        }
        Some(other) => Err(ExpressionError::Parse {
            message: format!("expected value, got {other:?}"),
        }),
    }
}

/// call = ident "(" ternary ")" — whitelisted coercion helpers only.
fn parse_call<'a>(name: &str, tokens: &'a [Token], view: &Value) -> ParseResult<'a> {
    let (arg, rest) = parse_ternary(tokens, view)?;
    if rest.first() != Some(&Token::RParen) {
        return Err(ExpressionError::Parse {
            message: format!("expected ')' after {name}(...)"),
        });
    }
    let rest = &rest[1..];
    let result = match name {
        "number" => coerce_number(&arg),
        "boolean" => Some(Value::Bool(truthy(&arg))),
        other => {
            return Err(ExpressionError::Eval {
                message: format!("unknown function: {other}"),
            });
        }
    };
    Ok((result, rest))
}

fn coerce_number(value: &Evaluated) -> Evaluated {
    match value {
        Some(Value::Number(n)) => Some(Value::Number(n.clone())),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(num_value),
        Some(Value::Bool(b)) => Some(num_value(if *b { 1.0 } else { 0.0 })),
        _ => None,
    }
}

/// Integral floats become JSON integers so `5` stays `5`, not `5.0`.
fn num_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Resolve a dotted field path against the context view. The leading
/// `ctx` segment is optional; only `request.*` and `vars.*` roots exist
/// in the view, so anything else resolves to undefined.
fn resolve_path(view: &Value, path: &str) -> Evaluated {
    let mut segments = path.split('.').peekable();
    if segments.peek() == Some(&"ctx") {
        segments.next();
    }
    let mut current = view;
    for segment in segments {
        match current.get(segment) {
            Some(v) => current = v,
            None => return None,
        }
    }
    Some(current.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
