//! Combinatorial index arithmetic.
//!
//! Two dense numberings underpin the coverage matrix:
//! - **parameter subsets**: every sorted `m`-subset of `{0..n-1}` gets a rank
//!   in `[0, C(n, m))` under the combinatorial number system, consistent
//!   with lexicographic order (`{0,1} < {0,2} < ... < {n-2,n-1}`).
//! - **value assignments**: for a chosen subset with arities `a_0..a_{t-1}`,
//!   every assignment gets a mixed-radix rank in `[0, Π a_i)`, most
//!   significant parameter first.
//!
//! Everything here is pure. Binomials and widths use checked arithmetic and
//! report [`ModelError::CapacityExceeded`] instead of wrapping.

use crate::error::ModelError;

/// `C(n, m)`, with `C(n, 0) = 1` and `C(n, m) = 0` when `m > n`.
pub fn binomial(n: usize, m: usize) -> Result<u64, ModelError> {
    if m > n {
        return Ok(0);
    }
    let m = m.min(n - m);
    let mut acc: u128 = 1;
    for x in 1..=m as u128 {
        // acc == C(n, x - 1) here, so the division is exact.
        acc = acc
            .checked_mul(n as u128 - x + 1)
            .ok_or_else(|| ModelError::capacity(format!("C({n}, {m})")))?
            / x;
        if acc > u64::MAX as u128 {
            return Err(ModelError::capacity(format!("C({n}, {m})")));
        }
    }
    Ok(acc as u64)
}

/// Rank of a sorted, strictly increasing subset of `{0..n-1}`.
///
/// `subset_to_rank(&[1, 2], 4) == 3` because `C(4, 2)` enumerates as
/// `01 02 03 12 13 23`.
pub fn subset_to_rank(subset: &[usize], n: usize) -> Result<u64, ModelError> {
    let m = subset.len();
    assert_subset(subset, n);
    let mut rank = binomial(n, m)?;
    for (i, &c) in subset.iter().enumerate() {
        rank -= binomial(n - c - 1, m - i)?;
    }
    Ok(rank - 1)
}

/// Inverse of [`subset_to_rank`]: the `rank`-th `m`-subset of `{0..n-1}`.
pub fn rank_to_subset(rank: u64, n: usize, m: usize) -> Result<Vec<usize>, ModelError> {
    let total = binomial(n, m)?;
    assert!(rank < total, "subset rank {rank} out of range for C({n}, {m}) = {total}");

    let mut remaining = rank;
    let mut subset = Vec::with_capacity(m);
    let mut candidate = 0;
    for i in 0..m {
        loop {
            // Number of subsets whose i-th element is `candidate`.
            let block = binomial(n - candidate - 1, m - i - 1)?;
            if remaining < block {
                break;
            }
            remaining -= block;
            candidate += 1;
        }
        subset.push(candidate);
        candidate += 1;
    }
    Ok(subset)
}

/// All `m`-subsets of `{0..n-1}` in ascending rank order.
pub fn all_subsets(n: usize, m: usize) -> Vec<Vec<usize>> {
    let mut subsets = Vec::new();
    if m > n {
        return subsets;
    }

    let mut current: Vec<usize> = (0..m).collect();
    loop {
        subsets.push(current.clone());
        let Some(i) = (0..m).rev().find(|&i| current[i] < n - m + i) else {
            break;
        };
        current[i] += 1;
        for j in (i + 1)..m {
            current[j] = current[j - 1] + 1;
        }
    }
    subsets
}

/// Mixed-radix rank of `values` over `arities`, most significant first.
///
/// `assignment_to_rank(&[3, 3], &[1, 2]) == 5`.
pub fn assignment_to_rank(arities: &[usize], values: &[usize]) -> usize {
    assert_eq!(
        arities.len(),
        values.len(),
        "assignment {values:?} does not match arities {arities:?}"
    );
    let mut rank = 0;
    let mut radix = 1;
    for (&arity, &value) in arities.iter().zip(values).rev() {
        assert!(value < arity, "value {value} out of range for arity {arity}");
        rank += radix * value;
        radix *= arity;
    }
    rank
}

/// Inverse of [`assignment_to_rank`].
pub fn rank_to_assignment(rank: usize, arities: &[usize]) -> Vec<usize> {
    let mut values = vec![0; arities.len()];
    let mut remaining = rank;
    for (slot, &arity) in values.iter_mut().zip(arities).rev() {
        *slot = remaining % arity;
        remaining /= arity;
    }
    assert_eq!(remaining, 0, "assignment rank {rank} out of range for {arities:?}");
    values
}

/// All assignments over `arities` in ascending rank order.
pub fn all_assignments(arities: &[usize]) -> Vec<Vec<usize>> {
    if arities.iter().any(|&a| a == 0) {
        return Vec::new();
    }
    let total: usize = arities.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut counter = vec![0; arities.len()];
    for _ in 0..total {
        out.push(counter.clone());
        for k in (0..counter.len()).rev() {
            counter[k] += 1;
            if counter[k] < arities[k] {
                break;
            }
            counter[k] = 0;
        }
    }
    out
}

/// `Π arities[i]` for `i` in `subset`.
pub fn product_of_arities(subset: &[usize], arities: &[usize]) -> Result<usize, ModelError> {
    subset.iter().try_fold(1usize, |acc, &p| {
        acc.checked_mul(arities[p])
            .ok_or_else(|| ModelError::capacity(format!("row width of {subset:?}")))
    })
}

pub(crate) fn assert_subset(subset: &[usize], n: usize) {
    assert!(
        subset.windows(2).all(|w| w[0] < w[1]),
        "subset {subset:?} is not strictly increasing"
    );
    assert!(
        subset.last().map_or(true, |&c| c < n),
        "subset {subset:?} exceeds {n} parameters"
    );
}

/// Pascal's triangle up to `C(n, t)`, used for O(t) subset ranking inside a
/// model whose `C(n, t)` has already been checked to fit.
///
/// Entries beyond that bound saturate; the ranking formula never reads them
/// because every term it subtracts is at most `C(n, t)`.
#[derive(Debug, Clone)]
pub struct BinomialTable {
    n: usize,
    t: usize,
    table: Vec<u64>,
}

impl BinomialTable {
    pub fn new(n: usize, t: usize) -> Self {
        let width = t + 1;
        let mut table = vec![0u64; (n + 1) * width];
        for i in 0..=n {
            table[i * width] = 1;
            for j in 1..=t.min(i) {
                let above = table[(i - 1) * width + j];
                let diag = table[(i - 1) * width + j - 1];
                table[i * width + j] = above.saturating_add(diag);
            }
        }
        Self { n, t, table }
    }

    pub fn get(&self, n: usize, m: usize) -> u64 {
        if m > n || m > self.t {
            return 0;
        }
        self.table[n * (self.t + 1) + m]
    }

    /// Same numbering as [`subset_to_rank`], for subsets of size `t`.
    pub fn rank(&self, subset: &[usize]) -> usize {
        assert_eq!(subset.len(), self.t, "expected a {}-subset, got {subset:?}", self.t);
        assert_subset(subset, self.n);
        let n = self.n;
        let m = subset.len();
        let mut rank = self.get(n, m);
        for (i, &c) in subset.iter().enumerate() {
            rank -= self.get(n - c - 1, m - i);
        }
        (rank - 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial_small_values() {
        assert_eq!(binomial(4, 2).unwrap(), 6);
        assert_eq!(binomial(5, 0).unwrap(), 1);
        assert_eq!(binomial(0, 0).unwrap(), 1);
        assert_eq!(binomial(3, 4).unwrap(), 0);
        assert_eq!(binomial(60, 10).unwrap(), 75_394_027_566);
    }

    #[test]
    fn test_binomial_overflow_is_reported() {
        let err = binomial(200, 100).unwrap_err();
        assert!(matches!(err, ModelError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_subset_rank_examples() {
        assert_eq!(subset_to_rank(&[1, 2], 4).unwrap(), 3);
        assert_eq!(rank_to_subset(2, 4, 2).unwrap(), vec![0, 3]);
        assert_eq!(subset_to_rank(&[], 5).unwrap(), 0);
        assert_eq!(rank_to_subset(0, 5, 0).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_all_subsets_lexicographic() {
        let subsets = all_subsets(4, 2);
        assert_eq!(
            subsets,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(all_subsets(3, 0), vec![Vec::<usize>::new()]);
        assert!(all_subsets(2, 3).is_empty());
    }

    #[test]
    fn test_assignment_rank_examples() {
        assert_eq!(assignment_to_rank(&[3, 3], &[1, 2]), 5);
        assert_eq!(rank_to_assignment(4, &[3, 3]), vec![1, 1]);
        assert_eq!(assignment_to_rank(&[], &[]), 0);
    }

    #[test]
    #[should_panic(expected = "out of range for arity")]
    fn test_assignment_value_out_of_range_panics() {
        assignment_to_rank(&[2, 2], &[0, 2]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_assignment_rank_out_of_range_panics() {
        rank_to_assignment(9, &[3, 3]);
    }

    #[test]
    #[should_panic(expected = "not strictly increasing")]
    fn test_table_rank_rejects_unsorted_subset() {
        BinomialTable::new(3, 2).rank(&[2, 0]);
    }

    #[test]
    #[should_panic(expected = "exceeds 3 parameters")]
    fn test_table_rank_rejects_position_beyond_n() {
        BinomialTable::new(3, 2).rank(&[1, 3]);
    }

    #[test]
    fn test_all_assignments_order() {
        let all = all_assignments(&[2, 3]);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], vec![0, 0]);
        assert_eq!(all[1], vec![0, 1]);
        assert_eq!(all[3], vec![1, 0]);
        assert_eq!(all[5], vec![1, 2]);
        assert_eq!(all_assignments(&[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_product_of_arities() {
        assert_eq!(product_of_arities(&[0, 2], &[2, 5, 3]).unwrap(), 6);
        assert_eq!(product_of_arities(&[], &[2, 5, 3]).unwrap(), 1);
        let huge = vec![usize::MAX, 2];
        assert!(product_of_arities(&[0, 1], &huge).is_err());
    }

    #[test]
    fn test_binomial_table_matches_subset_rank() {
        let table = BinomialTable::new(7, 3);
        for (r, subset) in all_subsets(7, 3).iter().enumerate() {
            assert_eq!(table.rank(subset), r);
            assert_eq!(subset_to_rank(subset, 7).unwrap(), r as u64);
        }
        assert_eq!(table.get(7, 3), 35);
    }

    #[test]
    #[should_panic]
    fn test_unsorted_subset_panics() {
        let _ = subset_to_rank(&[2, 1], 4);
    }
}
