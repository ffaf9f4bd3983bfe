//! Minimal forbidden tuples.
//!
//! Every clause is rewritten as the set of partial assignments that falsify
//! it. A negative literal `-k` is falsified by its own value; a positive
//! literal `+k` by any other value of the same parameter, so `[-1, +6]` on
//! arities `[2, 2, 2]` forbids `p0 = 0, p2 = 0`.
//!
//! A parameter whose every value occurs in some forbidden tuple is
//! *implicit*: whatever value a test gives it, the rest of one of those
//! tuples must be avoided. Combining the remainders across all its values
//! yields new forbidden tuples over the other parameters. This repeats
//! until nothing new appears, after which a test case is valid exactly when
//! it contains no forbidden tuple.

use std::collections::{BTreeMap, BTreeSet};

use ccag_model::{LiteralMap, ModelError, TestModel};

/// `(parameter, value)` pairs sorted by parameter, one pair per parameter.
pub type ForbiddenTuple = Vec<(usize, usize)>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenTuples {
    arities: Vec<usize>,
    tuples: Vec<ForbiddenTuple>,
}

impl ForbiddenTuples {
    /// Derive the minimal forbidden tuples of a model's constraints.
    pub fn derive(model: &TestModel) -> Result<Self, ModelError> {
        let map = model.literal_map();
        let mut tuples = Vec::new();
        for clause in &model.constraints {
            tuples.extend(falsifying_tuples(clause.literals(), &map)?);
        }

        let mut set = Self {
            arities: model.arities.clone(),
            tuples,
        };
        set.minimise();
        set.resolve_implicit();
        Ok(set)
    }

    pub fn tuples(&self) -> &[ForbiddenTuple] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// `true` if `test` contains no forbidden tuple.
    pub fn satisfied(&self, test: &[Option<usize>]) -> bool {
        !self.tuples.iter().any(|t| contained(t, test))
    }

    /// Number of forbidden tuples `test` contains.
    pub fn violations(&self, test: &[Option<usize>]) -> u64 {
        self.tuples.iter().filter(|t| contained(t, test)).count() as u64
    }

    fn resolve_implicit(&mut self) {
        let mut pending = self.implicit_parameters();

        while !pending.is_empty() {
            let mut derived = Vec::new();
            for &p in &pending {
                derived.extend(self.combine_over(p));
            }

            let mut touched = BTreeSet::new();
            for tuple in derived {
                if self.tuples.iter().any(|known| is_subset(known, &tuple)) {
                    continue;
                }
                touched.extend(tuple.iter().map(|&(q, _)| q));
                self.tuples.push(tuple);
            }
            self.minimise();

            let implicit = self.implicit_parameters();
            pending = touched.intersection(&implicit).copied().collect();
        }
    }

    /// Forbidden tuples implied by parameter `p` having to take some value.
    fn combine_over(&self, p: usize) -> Vec<ForbiddenTuple> {
        let mut combined: Vec<ForbiddenTuple> = vec![Vec::new()];

        for v in 0..self.arities[p] {
            let remainders: Vec<ForbiddenTuple> = self
                .tuples
                .iter()
                .filter(|t| t.contains(&(p, v)))
                .map(|t| t.iter().copied().filter(|&pair| pair != (p, v)).collect())
                .collect();

            let mut next: Vec<ForbiddenTuple> = Vec::new();
            for a in &combined {
                for b in &remainders {
                    if let Some(merged) = merge(a, b) {
                        if !next.contains(&merged) {
                            next.push(merged);
                        }
                    }
                }
            }
            combined = next;
            if combined.is_empty() {
                break;
            }
        }
        combined
    }

    fn implicit_parameters(&self) -> BTreeSet<usize> {
        let mut seen: Vec<Vec<bool>> = self.arities.iter().map(|&a| vec![false; a]).collect();
        for tuple in &self.tuples {
            for &(p, v) in tuple {
                seen[p][v] = true;
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, values)| values.iter().all(|&s| s))
            .map(|(p, _)| p)
            .collect()
    }

    /// Drop duplicates and every tuple that contains a smaller one.
    fn minimise(&mut self) {
        self.tuples
            .sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        self.tuples.dedup();

        let mut kept: Vec<ForbiddenTuple> = Vec::with_capacity(self.tuples.len());
        for tuple in self.tuples.drain(..) {
            if !kept.iter().any(|k| is_subset(k, &tuple)) {
                kept.push(tuple);
            }
        }
        self.tuples = kept;
    }
}

/// All partial assignments over the clause's parameters that falsify every
/// literal. Empty when the clause is a tautology.
fn falsifying_tuples(literals: &[i64], map: &LiteralMap) -> Result<Vec<ForbiddenTuple>, ModelError> {
    let mut falsifying: BTreeMap<usize, Vec<bool>> = BTreeMap::new();
    for &literal in literals {
        let (p, v) = map.decode(literal)?;
        let mask = falsifying
            .entry(p)
            .or_insert_with(|| vec![true; map.arity(p)]);
        if literal < 0 {
            for (w, allowed) in mask.iter_mut().enumerate() {
                if w != v {
                    *allowed = false;
                }
            }
        } else {
            mask[v] = false;
        }
    }

    let mut tuples: Vec<ForbiddenTuple> = vec![Vec::new()];
    for (p, mask) in falsifying {
        let values: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, &allowed)| allowed)
            .map(|(v, _)| v)
            .collect();
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut extended = Vec::with_capacity(tuples.len() * values.len());
        for tuple in &tuples {
            for &v in &values {
                let mut t = tuple.clone();
                t.push((p, v));
                extended.push(t);
            }
        }
        tuples = extended;
    }
    Ok(tuples)
}

fn merge(a: &ForbiddenTuple, b: &ForbiddenTuple) -> Option<ForbiddenTuple> {
    let mut out = a.clone();
    for &(q, w) in b {
        match out.iter().find(|&&(r, _)| r == q) {
            Some(&(_, x)) if x != w => return None,
            Some(_) => {}
            None => out.push((q, w)),
        }
    }
    out.sort_unstable();
    Some(out)
}

fn is_subset(small: &ForbiddenTuple, big: &ForbiddenTuple) -> bool {
    small.len() <= big.len() && small.iter().all(|pair| big.binary_search(pair).is_ok())
}

fn contained(tuple: &ForbiddenTuple, test: &[Option<usize>]) -> bool {
    tuple.iter().all(|&(p, v)| test[p] == Some(v))
}
