// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Ordered set of list positions with index-remapping helpers
//!
//! Link-list diffs are accumulated while the list keeps changing underneath
//! them. Every recorded position has to be moved along whenever an element is
//! inserted or erased before it, and positions have to be translated between
//! the "before inserts" and "after inserts" coordinate spaces. `IndexSet`
//! keeps the positions sorted and provides exactly those operations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSet {
    indices: Vec<usize>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.indices.clone()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// Add `index` to the set; no-op if already present
    pub fn add(&mut self, index: usize) {
        if let Err(pos) = self.indices.binary_search(&index) {
            self.indices.insert(pos, index);
        }
    }

    /// Add an index expressed in the space where every member of the set has
    /// already been removed
    pub fn add_shifted(&mut self, index: usize) {
        let index = self.shift(index);
        self.add(index);
    }

    /// Translate `index` from the space without this set's members into the
    /// space that contains them
    pub fn shift(&self, mut index: usize) -> usize {
        for &existing in &self.indices {
            if existing > index {
                break;
            }
            index += 1;
        }
        index
    }

    /// Translate `index` from the space containing this set's members into
    /// the space where they have been removed
    pub fn unshift(&self, index: usize) -> usize {
        let before = self.indices.partition_point(|&existing| existing < index);
        index - before
    }

    /// Make room for an element inserted at `index`: every member at or after
    /// it moves up by one
    pub fn shift_for_insert_at(&mut self, index: usize) {
        let start = self.indices.partition_point(|&existing| existing < index);
        for existing in &mut self.indices[start..] {
            *existing += 1;
        }
    }

    /// Record an element inserted at `index`
    pub fn insert_at(&mut self, index: usize) {
        self.shift_for_insert_at(index);
        self.add(index);
    }

    /// Account for the element at `index` being erased: drop `index` if it is
    /// a member and move every later member down by one
    pub fn erase_at(&mut self, index: usize) {
        let start = self.indices.partition_point(|&existing| existing < index);
        if self.indices.get(start) == Some(&index) {
            self.indices.remove(start);
        }
        for existing in &mut self.indices[start..] {
            *existing -= 1;
        }
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::new();
        for index in iter {
            set.add(index);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[usize]) -> IndexSet {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_add_keeps_sorted_unique() {
        let mut s = IndexSet::new();
        s.add(5);
        s.add(1);
        s.add(3);
        s.add(3);
        assert_eq!(s.to_vec(), vec![1, 3, 5]);
        assert!(s.contains(3));
        assert!(!s.contains(2));
    }

    #[test]
    fn test_shift_for_insert_at() {
        let mut s = set(&[1, 3, 5]);
        s.shift_for_insert_at(3);
        assert_eq!(s.to_vec(), vec![1, 4, 6]);
    }

    #[test]
    fn test_insert_at() {
        let mut s = set(&[1, 2]);
        s.insert_at(1);
        assert_eq!(s.to_vec(), vec![1, 2, 3]);
        s.insert_at(0);
        assert_eq!(s.to_vec(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_erase_at() {
        let mut s = set(&[1, 3, 5]);
        s.erase_at(3);
        assert_eq!(s.to_vec(), vec![1, 4]);
        s.erase_at(0);
        assert_eq!(s.to_vec(), vec![0, 3]);
        s.erase_at(10);
        assert_eq!(s.to_vec(), vec![0, 3]);
    }

    #[test]
    fn test_unshift_counts_members_before() {
        let s = set(&[1, 3]);
        assert_eq!(s.unshift(0), 0);
        assert_eq!(s.unshift(2), 1);
        assert_eq!(s.unshift(4), 2);
    }

    #[test]
    fn test_add_shifted_skips_existing_members() {
        // Deleting position 0 twice removes original elements 0 and 1
        let mut s = IndexSet::new();
        s.add_shifted(0);
        s.add_shifted(0);
        assert_eq!(s.to_vec(), vec![0, 1]);

        let mut s = set(&[2, 3]);
        s.add_shifted(2);
        assert_eq!(s.to_vec(), vec![2, 3, 4]);
        s.add_shifted(1);
        assert_eq!(s.to_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_shift_inverts_unshift_for_non_members() {
        let s = set(&[0, 4, 5, 9]);
        for index in [1, 2, 3, 6, 7, 8, 10] {
            assert_eq!(s.shift(s.unshift(index)), index);
        }
    }
}
