//! Hungarian algorithm for rectangular assignment problems.
//!
//! Shortest-augmenting-path form with row/column potentials. Rows are inserted
//! one at a time; each insertion costs O(n·m), so a full solve is O(n²·m) for
//! `n` rows and `m ≥ n` columns.

use tokio_util::sync::CancellationToken;

/// Why an assignment could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HungarianError {
    #[error("{rows} rows cannot be matched into {cols} columns")]
    TooManyRows { rows: usize, cols: usize },

    #[error("assignment cancelled")]
    Cancelled,
}

/// Minimum-cost assignment of every row to a distinct column.
///
/// `cost(row, col)` must be finite. Returns `assignment[row] = col`. Ties are
/// broken towards lower column indices, so the result is deterministic.
///
/// # Examples
///
/// ```
/// use service_dispatch::hungarian::solve;
///
/// let costs = [[4.0, 1.0, 3.0], [2.0, 0.0, 5.0]];
/// let assignment = solve(2, 3, |r, c| costs[r][c], None).unwrap();
/// assert_eq!(assignment, vec![1, 0]);
/// ```
pub fn solve<F>(
    rows: usize,
    cols: usize,
    cost: F,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<usize>, HungarianError>
where
    F: Fn(usize, usize) -> f64,
{
    if rows > cols {
        return Err(HungarianError::TooManyRows { rows, cols });
    }
    if rows == 0 {
        return Ok(Vec::new());
    }

    // 1-based; index 0 is the virtual root column.
    let mut u = vec![0.0f64; rows + 1];
    let mut v = vec![0.0f64; cols + 1];
    let mut owner = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for row in 1..=rows {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(HungarianError::Cancelled);
        }

        owner[0] = row;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; cols + 1];
        let mut used = vec![false; cols + 1];

        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=cols {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            // rows <= cols guarantees an unused column with finite slack
            debug_assert!(j1 != 0, "no free column while rows <= cols");

            for j in 0..=cols {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the root.
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; rows];
    for j in 1..=cols {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    Ok(assignment)
}
