//! Row-parallel evaluation of per-pixel kernels
//!
//! Runs on rayon with the `parallel` feature and sequentially without it.

/// Evaluate `row_fn` for rows `0..rows` and concatenate the results in row order
pub(crate) fn concat_rows<T, F>(rows: usize, row_fn: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> Vec<T> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..rows).into_par_iter().flat_map_iter(row_fn).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..rows).flat_map(row_fn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_stay_in_order() {
        let out = concat_rows(100, |row| vec![row * 2, row * 2 + 1]);
        assert_eq!(out, (0..200).collect::<Vec<_>>());
    }
}
