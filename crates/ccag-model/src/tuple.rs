use std::fmt;

use crate::types::TestCase;

/// A `t`-way combination: fixed values at a sorted set of positions.
///
/// ```text
/// test     = [0, -, -, 1, -]
/// position = [0, 3]
/// schema   = [0, 1]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub positions: Vec<usize>,
    pub schema: Vec<usize>,
    /// Full-length projection, `None` outside `positions`.
    pub test: TestCase,
}

impl Tuple {
    pub fn new(positions: Vec<usize>, schema: Vec<usize>, parameters: usize) -> Self {
        assert_eq!(positions.len(), schema.len(), "positions and schema differ in length");
        let mut test = vec![None; parameters];
        for (&p, &v) in positions.iter().zip(&schema) {
            test[p] = Some(v);
        }
        Self {
            positions,
            schema,
            test,
        }
    }

    /// The tuple of every fixed position in a partial test case.
    pub fn from_test(test: &[Option<usize>]) -> Self {
        let (positions, schema) = test
            .iter()
            .enumerate()
            .filter_map(|(p, v)| v.map(|v| (p, v)))
            .unzip();
        Self {
            positions,
            schema,
            test: test.to_vec(),
        }
    }

    /// Project `test` onto `positions`.
    pub fn extract(test: &[Option<usize>], positions: &[usize]) -> Self {
        let mut projected = vec![None; test.len()];
        let mut schema = Vec::with_capacity(positions.len());
        for &p in positions {
            projected[p] = test[p];
            schema.push(test[p].unwrap_or_default());
        }
        Self {
            positions: positions.to_vec(),
            schema,
            test: projected,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self
            .test
            .iter()
            .map(|v| v.map_or_else(|| "-".to_string(), |v| v.to_string()))
            .collect();
        write!(f, "{}", cells.join(" "))
    }
}
