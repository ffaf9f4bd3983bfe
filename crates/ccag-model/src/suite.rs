use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::TestCase;

/// An ordered list of test cases, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub rows: Vec<TestCase>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<TestCase>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TestCase] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: TestCase) {
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.rows.iter()
    }

    /// Fill every unassigned position with a random value accepted by
    /// `is_valid`, one position at a time.
    ///
    /// A position whose every value is rejected is left unassigned.
    pub fn assign_unfixed_values<R, F>(&mut self, arities: &[usize], mut is_valid: F, rng: &mut R)
    where
        R: Rng + ?Sized,
        F: FnMut(&[Option<usize>]) -> bool,
    {
        for row in &mut self.rows {
            for p in 0..row.len() {
                if row[p].is_some() {
                    continue;
                }
                let mut candidates: Vec<usize> = (0..arities[p]).collect();
                while !candidates.is_empty() {
                    let pick = candidates.swap_remove(rng.gen_range(0..candidates.len()));
                    row[p] = Some(pick);
                    if is_valid(row.as_slice()) {
                        break;
                    }
                    row[p] = None;
                }
            }
        }
    }

    /// The rows as plain value vectors, or `None` if any position is still
    /// unassigned.
    pub fn complete_rows(&self) -> Option<Vec<Vec<usize>>> {
        self.rows
            .iter()
            .map(|row| row.iter().copied().collect::<Option<Vec<usize>>>())
            .collect()
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| v.map_or_else(|| "-".to_string(), |v| v.to_string()))
                .collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}
