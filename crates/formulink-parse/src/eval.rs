//! Restricted arithmetic evaluator for preview values.
//!
//! The original tool computed preview values by handing the substituted text
//! to a general expression evaluator, which could execute well beyond the
//! documented grammar. This replacement is a small recursive-descent parser
//! over exactly the grammar the DSL composes references with: decimal
//! literals, unary minus, `+ - * /`, and parentheses. Anything else is a
//! typed error with a byte position.

use std::error::Error;
use std::fmt;

use crate::reference::Occurrence;

/// Evaluation failure with the byte offset that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub message: String,
    pub pos: usize,
}

impl EvalError {
    fn new(message: impl Into<String>, pos: usize) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.pos)
    }
}

impl Error for EvalError {}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == b'+' {
                acc += rhs;
            } else {
                acc -= rhs;
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            let at = self.pos;
            self.pos += 1;
            let rhs = self.factor()?;
            if op == b'*' {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(EvalError::new("division by zero", at));
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.bump() {
                    Some(b')') => Ok(inner),
                    _ => Err(EvalError::new("expected ')'", self.pos)),
                }
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => self.number(),
            Some(_) => Err(EvalError::new("unexpected token", self.pos)),
            None => Err(EvalError::new("unexpected end of expression", self.pos)),
        }
    }

    fn number(&mut self) -> Result<f64, EvalError> {
        self.skip_ws();
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let slice = &self.bytes[start..self.pos];
        let text = std::str::from_utf8(slice)
            .map_err(|_| EvalError::new("invalid number", start))?;
        text.parse::<f64>()
            .map_err(|_| EvalError::new(format!("invalid number '{text}'"), start))
    }
}

/// Evaluate a pure arithmetic expression.
pub fn evaluate(text: &str) -> Result<f64, EvalError> {
    let mut cursor = Cursor::new(text);
    let value = cursor.expr()?;
    if cursor.peek().is_some() {
        return Err(EvalError::new("unexpected token", cursor.pos));
    }
    Ok(value)
}

/// True when the text is a bare arithmetic expression (no references).
pub fn is_arithmetic(text: &str) -> bool {
    !text.trim().is_empty() && evaluate(text).is_ok()
}

/// Substitute each occurrence with its numeric value, right-to-left, then
/// evaluate. `values` returning `None` aborts with an error naming the
/// reference that had no value.
pub fn evaluate_with_values<F>(
    text: &str,
    occurrences: &[Occurrence],
    mut values: F,
) -> Result<f64, EvalError>
where
    F: FnMut(&Occurrence) -> Option<f64>,
{
    let mut substituted = text.to_string();
    for occ in occurrences.iter().rev() {
        let value = values(occ)
            .ok_or_else(|| EvalError::new(format!("no value for {}", occ.form), occ.start))?;
        substituted.replace_range(occ.start..occ.end, &format!("({value})"));
    }
    evaluate(&substituted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse;

    #[test]
    fn arithmetic_basics() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("-4 / 2").unwrap(), -2.0);
        assert_eq!(evaluate(" 10.5 ").unwrap(), 10.5);
    }

    #[test]
    fn rejects_foreign_tokens() {
        for bad in ["1 + x", "SUM(1,2)", "2 ** 3", "1; 2", "__import__", "1 @ 2"] {
            assert!(evaluate(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn division_by_zero_is_reported() {
        let err = evaluate("1 / 0").unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(evaluate("1 + 2)").is_err());
        assert!(evaluate("(1 + 2").is_err());
    }

    #[test]
    fn substitutes_reference_values() {
        let text = "[利润表]![一、营业总收入]![本期金额] + [利润表]![一、营业总收入]![本年累计]";
        let occurrences = parse(text);
        assert_eq!(occurrences.len(), 2);
        let value = evaluate_with_values(text, &occurrences, |occ| {
            match occ.form.column() {
                Some("本期金额") => Some(50_000.0),
                Some("本年累计") => Some(100_000.0),
                _ => None,
            }
        })
        .unwrap();
        assert_eq!(value, 150_000.0);
    }

    #[test]
    fn missing_value_names_the_reference() {
        let text = "[利润表]![营业收入]![本期金额]";
        let occurrences = parse(text);
        let err = evaluate_with_values(text, &occurrences, |_| None).unwrap_err();
        assert!(err.message.contains("[利润表]![营业收入]![本期金额]"));
    }

    #[test]
    fn negative_substituted_values_stay_grouped() {
        let text = "2 * [表]![项]![列]";
        let occurrences = parse(text);
        let value = evaluate_with_values(text, &occurrences, |_| Some(-3.0)).unwrap();
        assert_eq!(value, -6.0);
    }
}
