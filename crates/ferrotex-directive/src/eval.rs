//! The `\eval{}` expression evaluator.
//!
//! Terms are evaluated directly over string slices, without a token stream:
//!
//! - `i ? a : b : c` picks a branch by index, counting from 1 and clamping
//!   to the first and last branch.
//! - `a op b` for `/ + - * %` splits at the *first* top-level operator and
//!   evaluates the right-hand side recursively, so operators group to the
//!   right and there is no precedence: `10-3-2` is `10-(3-2)` = 9 and
//!   `2*3+4` is `2*(3+4)` = 14. Division or modulo by zero gives 0.
//! - `(term)` evaluates the inner term. `name(args)` is recognized but
//!   evaluates to 0.
//! - Integer literals, then identifiers looked up in a [`SymbolTable`].

use log::{debug, warn};
use thiserror::Error;

use crate::scan::span_until;

/// Deepest nesting of sub-terms evaluated before giving up.
pub const MAX_EVAL_DEPTH: usize = 99;

/// Most identifiers a [`SymbolTable`] holds.
pub const MAX_SYMBOLS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("expression nests deeper than {limit} levels")]
    DepthExceeded { limit: usize },
}

/// Identifiers visible to the evaluator, in lookup order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<(String, i64)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing an existing binding. Returns
    /// `false` if the table is full and `name` is new.
    pub fn insert(&mut self, name: impl Into<String>, value: i64) -> bool {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
            return true;
        }
        if self.entries.len() >= MAX_SYMBOLS {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    /// Looks up `name` with surrounding whitespace ignored.
    pub fn get(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates `term` against `symbols`.
///
/// # Errors
///
/// [`EvalError::DepthExceeded`] if the term nests more than
/// [`MAX_EVAL_DEPTH`] levels deep.
///
/// # Examples
///
/// ```
/// use ferrotex_directive::eval::{evaluate, SymbolTable};
///
/// let mut symbols = SymbolTable::new();
/// symbols.insert("fs", 4);
/// assert_eq!(evaluate(&symbols, "fs*2"), Ok(8));
/// assert_eq!(evaluate(&symbols, "fs-2?10:20:30"), Ok(20));
/// ```
pub fn evaluate(symbols: &SymbolTable, term: &str) -> Result<i64, EvalError> {
    eval_term(symbols, term, 1)
}

fn eval_term(symbols: &SymbolTable, term: &str, depth: usize) -> Result<i64, EvalError> {
    if depth > MAX_EVAL_DEPTH {
        warn!("\\eval term nests deeper than {} levels", MAX_EVAL_DEPTH);
        return Err(EvalError::DepthExceeded {
            limit: MAX_EVAL_DEPTH,
        });
    }
    let term = term.trim_start();
    if term.is_empty() {
        return Ok(0);
    }

    let cond = span_until(term, "?");
    if !cond.exhausted(term) {
        return eval_conditional(symbols, cond.segment, &term[cond.stop + 1..], depth);
    }

    let left = span_until(term, "/+-*%");
    if !left.exhausted(term) {
        let lhs = if left.segment.is_empty() {
            0
        } else {
            eval_term(symbols, left.segment, depth + 1)?
        };
        let rhs = eval_term(symbols, &term[left.stop + 1..], depth + 1)?;
        let value = match term.as_bytes()[left.stop] {
            b'+' => lhs.wrapping_add(rhs),
            b'-' => lhs.wrapping_sub(rhs),
            b'*' => lhs.wrapping_mul(rhs),
            b'/' => lhs.checked_div(rhs).unwrap_or(0),
            _ => lhs.checked_rem(rhs).unwrap_or(0),
        };
        return Ok(value);
    }

    let token = left.segment;
    if let Some(paren) = token.find('(') {
        let inner = token.strip_suffix(')').unwrap_or(token);
        if paren == 0 {
            return eval_term(symbols, inner[1..].trim(), depth + 1);
        }
        debug!("function call {} is not supported, evaluating to 0", &token[..paren]);
        return Ok(0);
    }

    if is_numeric(token) {
        return Ok(parse_integer(token));
    }
    Ok(symbols.get(token).unwrap_or(0))
}

fn eval_conditional(
    symbols: &SymbolTable,
    index_term: &str,
    branches: &str,
    depth: usize,
) -> Result<i64, EvalError> {
    let index = if index_term.is_empty() {
        0
    } else {
        eval_term(symbols, index_term, depth + 1)?
    };

    let mut list = Vec::new();
    let mut rest = branches;
    while !rest.is_empty() {
        let span = span_until(rest, ":");
        list.push(span.segment);
        if span.exhausted(rest) {
            break;
        }
        rest = &rest[span.stop + 1..];
    }
    if list.is_empty() {
        return Ok(0);
    }

    let chosen = usize::try_from(index).unwrap_or(0).clamp(1, list.len()) - 1;
    match list[chosen] {
        "" => Ok(0),
        branch => eval_term(symbols, branch, depth + 1),
    }
}

/// An optional sign followed by digits, with blanks allowed anywhere.
fn is_numeric(token: &str) -> bool {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix(['+', '-']).unwrap_or(&compact);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a token accepted by [`is_numeric`], saturating on overflow.
fn parse_integer(token: &str) -> i64 {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    compact.parse::<i64>().unwrap_or_else(|_| {
        if compact.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(term: &str) -> i64 {
        evaluate(&SymbolTable::new(), term).unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("42"), 42);
        assert_eq!(eval("  -7 "), -7);
        assert_eq!(eval("1 000"), 1000);
        assert_eq!(eval(""), 0);
    }

    #[test]
    fn test_operators_group_to_the_right() {
        assert_eq!(eval("2+3*4"), 14);
        assert_eq!(eval("2*3+4"), 14);
        assert_eq!(eval("10-3-2"), 9);
        assert_eq!(eval("7%4"), 3);
        assert_eq!(eval("-5"), -5);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(eval("4/0"), 0);
        assert_eq!(eval("4%0"), 0);
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(eval("(2+3)*4"), 20);
        assert_eq!(eval("((1+1))"), 2);
    }

    #[test]
    fn test_function_call_is_zero() {
        assert_eq!(eval("max(3,4)"), 0);
        assert_eq!(eval("1+max(3,4)"), 1);
    }

    #[test]
    fn test_conditional_branches() {
        assert_eq!(eval("1?10:20:30"), 10);
        assert_eq!(eval("2?10:20:30"), 20);
        assert_eq!(eval("5?10:20:30"), 30);
        assert_eq!(eval("0?10:20:30"), 10);
        assert_eq!(eval("-3?10:20:30"), 10);
        assert_eq!(eval("2?10::30"), 0);
        assert_eq!(eval("1?"), 0);
    }

    #[test]
    fn test_conditional_branch_may_nest() {
        assert_eq!(eval("2?1:(1?5:6)"), 5);
    }

    #[test]
    fn test_symbol_lookup() {
        let mut symbols = SymbolTable::new();
        symbols.insert("fontsize", 4);
        symbols.insert("fs", 4);
        assert_eq!(evaluate(&symbols, "fs+1"), Ok(5));
        assert_eq!(evaluate(&symbols, " fontsize "), Ok(4));
        assert_eq!(evaluate(&symbols, "fs<3?1:2"), Ok(1));
        assert_eq!(evaluate(&symbols, "unknown"), Ok(0));
        assert_eq!(evaluate(&symbols, "fs-1?a:b:fs*10"), Ok(40));
    }

    #[test]
    fn test_symbol_table_rebinding_and_capacity() {
        let mut symbols = SymbolTable::new();
        assert!(symbols.insert("x", 1));
        assert!(symbols.insert("x", 2));
        assert_eq!(symbols.get("x"), Some(2));
        assert_eq!(symbols.len(), 1);
        for i in 1..MAX_SYMBOLS {
            assert!(symbols.insert(format!("v{i}"), 0));
        }
        assert!(!symbols.insert("overflow", 0));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(150), ")".repeat(150));
        assert_eq!(
            evaluate(&SymbolTable::new(), &deep),
            Err(EvalError::DepthExceeded { limit: MAX_EVAL_DEPTH })
        );
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&SymbolTable::new(), &shallow), Ok(1));
    }

    #[test]
    fn test_overflow_wraps_or_saturates() {
        assert_eq!(eval("99999999999999999999"), i64::MAX);
        assert_eq!(eval("9223372036854775807+1"), i64::MIN);
    }
}
