use crate::models::Identified;
use std::collections::HashSet;

/// Concatenates `primary` and `secondary`, keeping the first item seen for
/// each identifier. Order of first appearance is preserved, so
/// `merge_unique(a.clone(), a) == dedup(a)`.
pub fn merge_unique<T: Identified>(primary: Vec<T>, secondary: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());
    for item in primary.into_iter().chain(secondary) {
        if seen.insert(item.id().to_owned()) {
            merged.push(item);
        }
    }
    merged
}
