// src/merge.rs
//! Merge of two newest-first sequences into one, keyed by a monotonic id.
//!
//! Both inputs must already be strictly descending with unique ids; the result
//! keeps that shape. On equal ids the element from `source` is kept.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::message::Message;

/// Anything that can be ordered by a recency id.
pub trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for Message {
    fn key(&self) -> i64 {
        self.id
    }
}

/// Union of `source` and `incoming`, newest first, duplicates collapsed.
pub fn merge_descending<T: Keyed + Clone>(source: &[T], incoming: &[T]) -> Vec<T> {
    let (Some(src_newest), Some(src_oldest)) = (source.first(), source.last()) else {
        return incoming.to_vec();
    };
    let (Some(inc_newest), Some(inc_oldest)) = (incoming.first(), incoming.last()) else {
        return source.to_vec();
    };

    // Disjoint ranges: plain concatenation.
    if inc_oldest.key() > src_newest.key() {
        return [incoming, source].concat();
    }
    if src_oldest.key() > inc_newest.key() {
        return [source, incoming].concat();
    }

    let mut out = Vec::with_capacity(source.len() + incoming.len());
    let (mut i, mut j) = (0usize, 0usize);
    while i < source.len() && j < incoming.len() {
        let (s, n) = (&source[i], &incoming[j]);
        match s.key().cmp(&n.key()) {
            Ordering::Greater => {
                out.push(s.clone());
                i += 1;
            }
            Ordering::Less => {
                out.push(n.clone());
                j += 1;
            }
            Ordering::Equal => {
                out.push(s.clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&source[i..]);
    out.extend_from_slice(&incoming[j..]);
    out
}

/// Elements of `after` whose id does not occur in `before`, in `after` order.
/// Both sequences must be newest first.
pub fn newly_added<T: Keyed + Clone>(before: &[T], after: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(after.len().saturating_sub(before.len()));
    let mut i = 0usize;
    for item in after {
        while i < before.len() && before[i].key() > item.key() {
            i += 1;
        }
        if i < before.len() && before[i].key() == item.key() {
            i += 1;
            continue;
        }
        out.push(item.clone());
    }
    out
}

/// Broken ordering invariant found in a stored sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceViolation {
    Duplicate { id: i64, position: usize },
    OutOfOrder { position: usize, previous: i64, current: i64 },
}

impl std::fmt::Display for SequenceViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate { id, position } => {
                write!(f, "duplicate id {id} at position {position}")
            }
            Self::OutOfOrder {
                position,
                previous,
                current,
            } => write!(
                f,
                "id {current} at position {position} is not older than {previous}"
            ),
        }
    }
}

/// Check that `seq` is strictly descending (which also rules out duplicates).
pub fn validate_sequence<T: Keyed>(seq: &[T]) -> Result<(), SequenceViolation> {
    for (position, pair) in seq.windows(2).enumerate() {
        let (previous, current) = (pair[0].key(), pair[1].key());
        match previous.cmp(&current) {
            Ordering::Greater => {}
            Ordering::Equal => {
                return Err(SequenceViolation::Duplicate {
                    id: current,
                    position: position + 1,
                })
            }
            Ordering::Less => {
                return Err(SequenceViolation::OutOfOrder {
                    position: position + 1,
                    previous,
                    current,
                })
            }
        }
    }
    Ok(())
}

/// Ids that occur more than once, in order of their second appearance.
/// Works on unordered input too.
pub fn find_duplicate_ids<T: Keyed>(seq: &[T]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(seq.len());
    seq.iter()
        .map(Keyed::key)
        .filter(|id| !seen.insert(*id))
        .collect()
}
