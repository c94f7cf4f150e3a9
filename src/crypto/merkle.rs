//! Merkle root calculation over transaction ids
//!
//! Leaves are the transaction ids as stored (hex strings, or `"0"` for the
//! genesis transaction). Each layer hashes the string concatenation of
//! adjacent pairs left to right. An odd node at the end of a layer is
//! paired with itself.

use super::hash::hash_parts;

/// Calculate the merkle root from an ordered list of transaction ids
///
/// A single id is its own root. An empty list yields an empty root.
pub fn calculate_merkle_root<S: AsRef<str>>(ids: &[S]) -> String {
    if ids.is_empty() {
        return String::new();
    }

    let mut current_level: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| {
                let left = &chunk[0];
                // Duplicate the last hash if odd number
                let right = chunk.get(1).unwrap_or(left);
                hash_parts(&[left, right])
            })
            .collect();
    }

    current_level.remove(0)
}
