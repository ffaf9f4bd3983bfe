use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A complete or partial test case: one entry per parameter, `None` for a
/// parameter that has not been fixed yet.
pub type TestCase = Vec<Option<usize>>;

/// A combinatorial test model: parameter arities, interaction strength and
/// constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestModel {
    #[serde(default = "default_name")]
    pub name: String,
    /// Interaction strength `t`.
    pub strength: usize,
    /// `arities[i]` is the number of values parameter `i` can take.
    pub arities: Vec<usize>,
    #[serde(default)]
    pub constraints: Vec<Clause>,
}

fn default_name() -> String {
    "model".to_string()
}

/// A disjunction of signed literals over the flattened, 1-based value space
/// (see [`LiteralMap`]). `-k` excludes value `k`; `+k` requires it.
///
/// A clause made only of negative literals is a forbidden tuple: `[-1, -7]`
/// forbids value 1 and value 7 from appearing together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clause(pub Vec<i64>);

impl Clause {
    pub fn literals(&self) -> &[i64] {
        &self.0
    }
}

impl TestModel {
    pub fn new(name: impl Into<String>, strength: usize, arities: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            strength,
            arities,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<Clause>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, crate::parse::ParseError> {
        let model: TestModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn parameters(&self) -> usize {
        self.arities.len()
    }

    pub fn literal_map(&self) -> LiteralMap {
        LiteralMap::new(&self.arities)
    }

    /// Check the model preconditions: at least one parameter, no empty
    /// domain, `1 <= t <= n`, and every literal inside the value space.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.arities.is_empty() {
            return Err(ModelError::EmptyParameters);
        }
        if let Some(parameter) = self.arities.iter().position(|&a| a == 0) {
            return Err(ModelError::ZeroArity { parameter });
        }
        if self.strength == 0 || self.strength > self.arities.len() {
            return Err(ModelError::StrengthOutOfRange {
                strength: self.strength,
                parameters: self.arities.len(),
            });
        }
        let map = self.literal_map();
        for clause in &self.constraints {
            for &lit in clause.literals() {
                map.decode(lit)?;
            }
        }
        Ok(())
    }

    /// Parameters mentioned by at least one constraint literal.
    pub fn constrained_parameters(&self) -> BTreeSet<usize> {
        let map = self.literal_map();
        self.constraints
            .iter()
            .flat_map(|c| c.literals().iter())
            .filter_map(|&lit| map.decode(lit).ok())
            .map(|(parameter, _)| parameter)
            .collect()
    }
}

/// Mapping between `(parameter, value)` pairs and 1-based literal indices.
///
/// For five parameters of three values each:
///
/// ```text
///  p0  p1  p2  p3  p4
///   1   4   7  10  13
///   2   5   8  11  14
///   3   6   9  12  15
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralMap {
    /// `starts[i]` is the literal of parameter `i`, value 0.
    starts: Vec<usize>,
    arities: Vec<usize>,
}

impl LiteralMap {
    pub fn new(arities: &[usize]) -> Self {
        let mut starts = Vec::with_capacity(arities.len());
        let mut next = 1;
        for &a in arities {
            starts.push(next);
            next += a;
        }
        Self {
            starts,
            arities: arities.to_vec(),
        }
    }

    /// Positive literal for `parameter = value`.
    pub fn literal(&self, parameter: usize, value: usize) -> usize {
        assert!(
            value < self.arities[parameter],
            "value {value} out of range for parameter {parameter}"
        );
        self.starts[parameter] + value
    }

    /// The `(parameter, value)` a signed literal refers to.
    pub fn decode(&self, literal: i64) -> Result<(usize, usize), ModelError> {
        let var = literal.unsigned_abs() as usize;
        if literal == 0 || var > self.var_count() {
            return Err(ModelError::LiteralOutOfRange { literal });
        }
        let parameter = self.starts.partition_point(|&s| s <= var) - 1;
        Ok((parameter, var - self.starts[parameter]))
    }

    /// Number of boolean variables, i.e. the largest literal.
    pub fn var_count(&self) -> usize {
        self.arities.iter().sum()
    }

    pub fn arity(&self, parameter: usize) -> usize {
        self.arities[parameter]
    }

    pub fn parameters(&self) -> usize {
        self.arities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_map_layout() {
        let map = LiteralMap::new(&[3, 3, 3, 3, 3]);
        assert_eq!(map.literal(0, 0), 1);
        assert_eq!(map.literal(2, 2), 9);
        assert_eq!(map.literal(4, 1), 14);
        assert_eq!(map.decode(-10).unwrap(), (3, 0));
        assert_eq!(map.decode(15).unwrap(), (4, 2));
        assert_eq!(map.var_count(), 15);
    }

    #[test]
    fn test_literal_map_mixed_arities() {
        let map = LiteralMap::new(&[2, 4, 1]);
        assert_eq!(map.decode(2).unwrap(), (0, 1));
        assert_eq!(map.decode(3).unwrap(), (1, 0));
        assert_eq!(map.decode(7).unwrap(), (2, 0));
        assert!(map.decode(8).is_err());
        assert!(map.decode(0).is_err());
    }

    #[test]
    fn test_validate_preconditions() {
        assert_eq!(
            TestModel::new("m", 2, vec![]).validate(),
            Err(ModelError::EmptyParameters)
        );
        assert_eq!(
            TestModel::new("m", 2, vec![2, 0, 2]).validate(),
            Err(ModelError::ZeroArity { parameter: 1 })
        );
        assert!(matches!(
            TestModel::new("m", 4, vec![2, 2, 2]).validate(),
            Err(ModelError::StrengthOutOfRange { .. })
        ));
        let bad_literal =
            TestModel::new("m", 2, vec![2, 2]).with_constraints(vec![Clause(vec![-1, -9])]);
        assert_eq!(
            bad_literal.validate(),
            Err(ModelError::LiteralOutOfRange { literal: -9 })
        );
    }

    #[test]
    fn test_constrained_parameters() {
        let model = TestModel::new("m", 2, vec![2, 2, 2, 2])
            .with_constraints(vec![Clause(vec![-1, -6]), Clause(vec![-2, -5])]);
        let constrained: Vec<usize> = model.constrained_parameters().into_iter().collect();
        assert_eq!(constrained, vec![0, 2]);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{ "strength": 2, "arities": [2, 3, 2], "constraints": [[-1, -3]] }"#;
        let model = TestModel::from_json(json).unwrap();
        assert_eq!(model.name, "model");
        assert_eq!(model.constraints, vec![Clause(vec![-1, -3])]);
    }
}
