//! Dense minimum-cost bipartite assignment with unmatched alternatives.
//!
//! The linker phrases both of its passes as rectangular linear assignment
//! problems: rows are link sources, columns are link targets, entries above
//! the distance bound are forbidden. Every row additionally owns a private
//! "no-link" slack column priced at 1.05 × the largest feasible cost, so a
//! row stays unmatched only when that is globally cheaper than any feasible
//! arrangement. Columns left unchosen are unmatched at no cost.
//!
//! The solve itself is the Jonker–Volgenant style shortest-augmenting-path
//! scheme with row/column potentials, O(n²·m); deterministic for identical
//! input.

/// Multiplier applied to the largest feasible cost to price the no-link
/// alternative.
const NO_LINK_COST_FACTOR: f64 = 1.05;

/// Finite stand-in for forbidden entries inside the solver; large enough to
/// never beat a slack column, small enough to keep potential arithmetic
/// exact.
const FORBIDDEN: f64 = 1e15;

/// Rectangular cost matrix; `f64::INFINITY` marks forbidden pairs.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// All-forbidden matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![f64::INFINITY; rows * cols],
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Set the cost of linking row `r` to column `c`.
    pub fn set(&mut self, r: usize, c: usize, cost: f64) {
        self.data[r * self.cols + c] = cost;
    }

    /// Cost of linking row `r` to column `c`.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    fn max_finite(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|c| c.is_finite())
            .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.max(c))))
    }
}

/// Solve the assignment: for each row, the matched column or `None`.
///
/// Each column is matched to at most one row; forbidden pairs are never
/// matched; the total cost of matched pairs plus no-link alternatives is
/// minimal. An all-forbidden (or empty) matrix yields all-`None`, not an
/// error.
pub fn solve(costs: &CostMatrix) -> Vec<Option<usize>> {
    let n = costs.rows();
    let m = costs.cols();
    if n == 0 {
        return Vec::new();
    }
    let Some(max_cost) = costs.max_finite() else {
        return vec![None; n];
    };
    let no_link = (max_cost * NO_LINK_COST_FACTOR).max(f64::MIN_POSITIVE);

    // Extended matrix: m real columns then n per-row slack columns.
    let total_cols = m + n;
    let cost_at = |r: usize, c: usize| -> f64 {
        if c < m {
            let v = costs.get(r, c);
            if v.is_finite() {
                v
            } else {
                FORBIDDEN
            }
        } else if c == m + r {
            no_link
        } else {
            FORBIDDEN
        }
    };

    let row_to_col = hungarian(n, total_cols, cost_at);
    row_to_col
        .into_iter()
        .map(|c| c.filter(|&c| c < m))
        .collect()
}

/// Shortest-augmenting-path Hungarian algorithm over an `n × m` cost
/// function, `n ≤ m`. Returns the matched column per row.
fn hungarian(n: usize, m: usize, cost: impl Fn(usize, usize) -> f64) -> Vec<Option<usize>> {
    debug_assert!(n <= m);
    // 1-based arrays; p[j] = row matched to column j, 0 = free.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        // Unwind the augmenting path.
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![None; n];
    for j in 1..=m {
        if p[j] != 0 {
            row_to_col[p[j] - 1] = Some(j - 1);
        }
    }
    row_to_col
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, entries: &[(usize, usize, f64)]) -> CostMatrix {
        let mut m = CostMatrix::new(rows, cols);
        for &(r, c, cost) in entries {
            m.set(r, c, cost);
        }
        m
    }

    #[test]
    fn empty_matrix_solves_to_nothing() {
        assert!(solve(&CostMatrix::new(0, 0)).is_empty());
        assert_eq!(solve(&CostMatrix::new(3, 0)), vec![None, None, None]);
    }

    #[test]
    fn all_forbidden_leaves_rows_unmatched() {
        let m = CostMatrix::new(2, 2);
        assert_eq!(solve(&m), vec![None, None]);
    }

    #[test]
    fn picks_globally_optimal_over_greedy() {
        // Greedy grabs (1,0) at 0.5; with the no-link alternative at 2.1 the
        // cheapest total is r0→c1 + r1→c0 = 2.5, beating r0→c0 + slack = 2.7.
        let m = matrix(2, 2, &[(0, 0, 0.6), (0, 1, 2.0), (1, 0, 0.5)]);
        assert_eq!(solve(&m), vec![Some(1), Some(0)]);
    }

    #[test]
    fn swap_reduces_total_cost() {
        let m = matrix(
            2,
            2,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 10.0)],
        );
        // row0→col1 + row1→col0 = 4.0 beats row0→col0 + row1→col1 = 11.0
        // and beats leaving row1 unmatched (1.0 + 10.5 = 11.5).
        assert_eq!(solve(&m), vec![Some(1), Some(0)]);
    }

    #[test]
    fn single_feasible_link_beats_alternative() {
        // A single feasible but costly option: no-link costs 1.05 × it, so
        // linking wins.
        let m = matrix(1, 1, &[(0, 0, 7.0)]);
        assert_eq!(solve(&m), vec![Some(0)]);
    }

    #[test]
    fn unmatched_when_cheaper_globally() {
        // Two rows compete for one column; loser takes its slack.
        let m = matrix(2, 1, &[(0, 0, 1.0), (1, 0, 3.0)]);
        assert_eq!(solve(&m), vec![Some(0), None]);
    }

    #[test]
    fn forbidden_entries_never_matched() {
        let m = matrix(2, 2, &[(0, 1, 1.0), (1, 1, 2.0)]);
        let assignment = solve(&m);
        assert_eq!(assignment[0], Some(1));
        assert_eq!(assignment[1], None);
    }

    #[test]
    fn deterministic_on_exact_ties() {
        let m = matrix(2, 2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let a = solve(&m);
        let b = solve(&m);
        assert_eq!(a, b);
        assert_eq!(a.iter().flatten().count(), 2);
    }
}
