//! Model description readers: JSON (via serde) and the CASA text format.
//!
//! A CASA `.model` file has three lines: strength, parameter count and the
//! arities. A `.constraints` file starts with the constraint count; each
//! constraint is a line with its literal count followed by a line of
//! `sign index` pairs, where `index` is the 0-based flattened value index:
//!
//! ```text
//! 2
//! 2
//! - 0 - 6
//! 3
//! - 1 - 4 + 9
//! ```

use crate::error::ModelError;
use crate::types::{Clause, TestModel};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected end of input: expected {expected}")]
    Missing { expected: &'static str },

    #[error("line {line}: invalid integer '{token}'")]
    BadInteger { line: usize, token: String },

    #[error("line {line}: invalid literal sign '{token}'")]
    BadSign { line: usize, token: String },

    #[error("line {line}: expected {expected} entries, found {found}")]
    Count {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
}

/// Parse a CASA model, with optional constraints text.
pub fn parse_casa(
    name: &str,
    model_src: &str,
    constraints_src: Option<&str>,
) -> Result<TestModel, ParseError> {
    let mut lines = Lines::new(model_src);

    let strength = lines.single("interaction strength")?;
    let parameters = lines.single("parameter count")?;
    let (line, arities) = lines.integers("parameter arities")?;
    if arities.len() != parameters {
        return Err(ParseError::Count {
            line,
            expected: parameters,
            found: arities.len(),
        });
    }

    let constraints = match constraints_src {
        Some(src) => parse_constraints(src)?,
        None => Vec::new(),
    };

    let model = TestModel::new(name, strength, arities).with_constraints(constraints);
    model.validate()?;
    Ok(model)
}

fn parse_constraints(src: &str) -> Result<Vec<Clause>, ParseError> {
    let mut lines = Lines::new(src);
    let total = lines.single("constraint count")?;
    let mut clauses = Vec::with_capacity(total);

    for _ in 0..total {
        let count = lines.single("literal count")?;
        let (line, tokens) = lines.tokens("constraint literals")?;
        if tokens.len() != 2 * count {
            return Err(ParseError::Count {
                line,
                expected: 2 * count,
                found: tokens.len(),
            });
        }
        let mut literals = Vec::with_capacity(count);
        for pair in tokens.chunks(2) {
            let index = parse_int(line, pair[1])? as i64 + 1;
            let literal = match pair[0] {
                "-" => -index,
                "+" => index,
                other => {
                    return Err(ParseError::BadSign {
                        line,
                        token: other.to_string(),
                    })
                }
            };
            literals.push(literal);
        }
        clauses.push(Clause(literals));
    }
    Ok(clauses)
}

/// Non-blank lines with 1-based line numbers.
struct Lines<'a> {
    inner: std::vec::IntoIter<(usize, &'a str)>,
}

impl<'a> Lines<'a> {
    fn new(src: &'a str) -> Self {
        let lines: Vec<(usize, &'a str)> = src
            .lines()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();
        Self {
            inner: lines.into_iter(),
        }
    }

    fn tokens(&mut self, expected: &'static str) -> Result<(usize, Vec<&'a str>), ParseError> {
        match self.inner.next() {
            Some((idx, text)) => Ok((idx + 1, text.split_whitespace().collect())),
            None => Err(ParseError::Missing { expected }),
        }
    }

    fn integers(&mut self, expected: &'static str) -> Result<(usize, Vec<usize>), ParseError> {
        let (line, tokens) = self.tokens(expected)?;
        let values = tokens
            .iter()
            .map(|t| parse_int(line, t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((line, values))
    }

    fn single(&mut self, expected: &'static str) -> Result<usize, ParseError> {
        let (line, values) = self.integers(expected)?;
        match values.as_slice() {
            [v] => Ok(*v),
            _ => Err(ParseError::Count {
                line,
                expected: 1,
                found: values.len(),
            }),
        }
    }
}

fn parse_int(line: usize, token: &str) -> Result<usize, ParseError> {
    token.parse().map_err(|_| ParseError::BadInteger {
        line,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_only() {
        let model = parse_casa("toy", "2\n3\n2 3 2\n", None).unwrap();
        assert_eq!(model.strength, 2);
        assert_eq!(model.arities, vec![2, 3, 2]);
        assert!(model.constraints.is_empty());
    }

    #[test]
    fn test_parse_constraints_are_one_based() {
        let model = parse_casa(
            "toy",
            "2\n3\n2 3 2\n",
            Some("2\n2\n- 0 - 2\n3\n- 1 - 4 + 6\n"),
        )
        .unwrap();
        assert_eq!(
            model.constraints,
            vec![Clause(vec![-1, -3]), Clause(vec![-2, -5, 7])]
        );
    }

    #[test]
    fn test_parse_arity_count_mismatch() {
        let err = parse_casa("toy", "2\n4\n2 3 2\n", None).unwrap_err();
        assert!(matches!(err, ParseError::Count { line: 3, expected: 4, found: 3 }));
    }

    #[test]
    fn test_parse_bad_sign() {
        let err = parse_casa("toy", "2\n2\n2 2\n", Some("1\n1\n* 0\n")).unwrap_err();
        assert!(matches!(err, ParseError::BadSign { .. }));
    }

    #[test]
    fn test_parse_missing_line() {
        let err = parse_casa("toy", "2\n3\n", None).unwrap_err();
        assert!(matches!(err, ParseError::Missing { .. }));
    }

    #[test]
    fn test_parse_rejects_invalid_model() {
        let err = parse_casa("toy", "3\n2\n2 2\n", None).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Model(ModelError::StrengthOutOfRange { .. })
        ));
    }
}
