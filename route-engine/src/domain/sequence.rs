//! Pure algorithms over an ordered stop sequence.
//!
//! These functions never touch the store. The engine calls them inside a
//! transaction after re-resolving the Route, so they only need to be
//! correct for whatever sequence is current at execution time.

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

/// Choose the element that takes over when the element at `removed` goes away.
///
/// Prefers the next element, then the previous one. Returns `None` when
/// `removed` was the only element (or is out of range).
pub fn adjacent_to<T: Clone>(seq: &[T], removed: usize) -> Option<T> {
    if removed >= seq.len() {
        return None;
    }
    seq.get(removed + 1)
        .or_else(|| removed.checked_sub(1).and_then(|i| seq.get(i)))
        .cloned()
}

/// Move the elements at `from` so that they begin at `to`.
///
/// `to` is an offset into the sequence before the move (the usual list
/// "move rows" convention), clamped to the sequence length. The moved
/// elements keep their relative order, as do the rest. Positions in
/// `from` that are out of range are ignored.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use route_engine::domain::move_positions;
///
/// let seq = vec!['a', 'b', 'c', 'd', 'e'];
/// let from: BTreeSet<usize> = [1, 3].into_iter().collect();
/// assert_eq!(move_positions(&seq, &from, 0), vec!['b', 'd', 'a', 'c', 'e']);
/// ```
pub fn move_positions<T: Clone>(seq: &[T], from: &BTreeSet<usize>, to: usize) -> Vec<T> {
    let to = to.min(seq.len());

    let mut moved = Vec::new();
    let mut rest = Vec::with_capacity(seq.len());
    let mut moved_before_destination = 0;

    for (idx, item) in seq.iter().enumerate() {
        if from.contains(&idx) {
            if idx < to {
                moved_before_destination += 1;
            }
            moved.push(item.clone());
        } else {
            rest.push(item.clone());
        }
    }

    let insert_at = to - moved_before_destination;
    let mut result = Vec::with_capacity(seq.len());
    result.extend_from_slice(&rest[..insert_at]);
    result.extend(moved);
    result.extend_from_slice(&rest[insert_at..]);
    result
}

/// Whether `ordered` names exactly the members of `current`.
///
/// Cardinality must match too, so a list with a repeated identifier is
/// rejected even if its set of members is right.
pub fn same_members<T: Eq + Hash>(current: &[T], ordered: &[T]) -> bool {
    if current.len() != ordered.len() {
        return false;
    }
    let current: HashSet<&T> = current.iter().collect();
    let ordered_set: HashSet<&T> = ordered.iter().collect();
    ordered_set.len() == ordered.len() && current == ordered_set
}
