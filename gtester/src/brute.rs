//! Exhaustive enumeration helpers for reference functions.
//!
//! Reference functions are allowed to be slow, so they are often easiest to
//! write by trying every arrangement of the input.
//!
//! ```rust
//! use gtester::brute::all_sub_lists;
//!
//! // Every way to order [1, 2] and cut it into contiguous runs
//! let splits = all_sub_lists(&[1, 2]);
//! assert_eq!(splits.len(), 4);
//! assert!(splits.contains(&vec![vec![2], vec![1]]));
//! ```

/// All orderings of `items`.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }

    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for tail in permutations(&rest) {
            let mut perm = Vec::with_capacity(items.len());
            perm.push(head.clone());
            perm.extend(tail);
            out.push(perm);
        }
    }
    out
}

/// For every permutation of `items`, every split into contiguous non-empty runs.
///
/// `[1, 2, 3]` yields `[[1], [2], [3]]`, `[[1, 2], [3]]`, `[[1], [2, 3]]`,
/// `[[1, 2, 3]]` and the same for the other five orderings. An empty input
/// yields a single split with no runs.
pub fn all_sub_lists<T: Clone>(items: &[T]) -> Vec<Vec<Vec<T>>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }

    let cuts = items.len() - 1;
    let mut out = Vec::new();
    for perm in permutations(items) {
        // Bit `cut` set means the run ends after position `cut`
        for mask in 0..(1usize << cuts) {
            let mut runs = Vec::new();
            let mut start = 0;
            for cut in 0..cuts {
                if mask & (1 << cut) != 0 {
                    runs.push(perm[start..=cut].to_vec());
                    start = cut + 1;
                }
            }
            runs.push(perm[start..].to_vec());
            out.push(runs);
        }
    }
    out
}
