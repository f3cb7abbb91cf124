// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Diff records produced by the observing replay

use super::index_set::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-table change record
///
/// Rows are deleted by moving the last row into the erased slot, so a deletion
/// is one entry in `moves` (`slot -> index the occupant came from`) plus one
/// in `deletions`, never a shift of every later row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub changed: BTreeSet<usize>,
    pub moves: BTreeMap<usize, usize>,
    pub deletions: usize,
}

impl ChangeInfo {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.moves.is_empty() && self.deletions == 0
    }

    /// Mark `row` as modified, following any move already recorded for it
    pub fn mark_dirty(&mut self, row: usize) {
        let row = self.moves.get(&row).copied().unwrap_or(row);
        self.changed.insert(row);
    }

    /// Record an unordered erase of `row` from a table that had
    /// `prior_num_rows` rows before the erase
    pub fn erase_unordered(&mut self, row: usize, prior_num_rows: usize) {
        let mut last_row = prior_num_rows.saturating_sub(1);
        if let Some(&origin) = self.moves.get(&last_row) {
            last_row = origin;
        }
        self.moves.insert(row, last_row);
        self.deletions += 1;
    }
}

/// Identifies one list-of-links property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkListKey {
    pub table: usize,
    pub row: usize,
    pub col: usize,
}

impl LinkListKey {
    pub fn new(table: usize, row: usize, col: usize) -> Self {
        Self { table, row, col }
    }
}

/// A recorded link-list move, `from` in the pre-transaction coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkListMove {
    pub from: usize,
    pub to: usize,
}

/// Change record for one observed link list
///
/// `inserts` and `changes` are positions in the final list, `deletes` are
/// positions in the list as it was before the transaction. Every operation is
/// translated through what has been recorded so far before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkListInfo {
    pub key: LinkListKey,
    pub inserts: IndexSet,
    pub deletes: IndexSet,
    pub changes: IndexSet,
    pub moves: Vec<LinkListMove>,
    pub did_clear: bool,
}

impl LinkListInfo {
    pub fn new(key: LinkListKey) -> Self {
        Self {
            key,
            inserts: IndexSet::new(),
            deletes: IndexSet::new(),
            changes: IndexSet::new(),
            moves: Vec::new(),
            did_clear: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.did_clear
            && self.inserts.is_empty()
            && self.deletes.is_empty()
            && self.changes.is_empty()
            && self.moves.is_empty()
    }

    pub fn set(&mut self, index: usize) {
        self.changes.add(index);
    }

    pub fn insert(&mut self, index: usize) {
        self.changes.shift_for_insert_at(index);
        self.inserts.insert_at(index);

        for m in &mut self.moves {
            if m.to >= index {
                m.to += 1;
            }
        }
    }

    /// Known limitation: erasing an element that was itself inserted earlier
    /// in the same transaction still records a deletion.
    pub fn erase(&mut self, index: usize) {
        self.changes.erase_at(index);
        self.inserts.erase_at(index);
        let original = self.inserts.unshift(index);
        self.deletes.add_shifted(original);

        self.moves.retain(|m| m.to != index);
        for m in &mut self.moves {
            if m.to > index {
                m.to -= 1;
            }
        }
    }

    /// Swapping two elements reports both positions as modified
    pub fn swap(&mut self, index_a: usize, index_b: usize) {
        self.set(index_a);
        self.set(index_b);
    }

    pub fn clear(&mut self) {
        self.did_clear = true;
        self.changes.clear();
        self.inserts.clear();
        self.deletes.clear();
        self.moves.clear();
    }

    /// The direction of the move decides whether the erase or the insert side
    /// of the update is applied first.
    ///
    /// Known limitation: moves combined with inserts and erases of the same
    /// elements in one transaction can yield a diff that does not match the
    /// final list.
    pub fn move_element(&mut self, from: usize, to: usize) {
        let forward = from < to;

        let from = self.inserts.unshift(from);
        let from = self.deletes.unshift(from);

        self.moves.push(LinkListMove { from, to });

        if forward {
            self.changes.erase_at(from);
            self.inserts.erase_at(from);
            self.deletes.add(from);

            self.changes.shift_for_insert_at(from);
            self.inserts.shift_for_insert_at(from);
        } else {
            self.changes.shift_for_insert_at(from);
            self.inserts.shift_for_insert_at(from);

            self.changes.erase_at(from);
            self.inserts.erase_at(from);
            self.deletes.add(from);
        }
    }
}

/// Everything that changed between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionChanges {
    /// Indexed by table number; tables past the end did not change
    pub tables: Vec<ChangeInfo>,
    pub link_lists: Vec<LinkListInfo>,
}

impl TransactionChanges {
    pub fn table(&self, table: usize) -> Option<&ChangeInfo> {
        self.tables.get(table)
    }

    pub fn link_list(&self, key: LinkListKey) -> Option<&LinkListInfo> {
        self.link_lists.iter().find(|info| info.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(ChangeInfo::is_empty)
            && self.link_lists.iter().all(LinkListInfo::is_empty)
    }

    pub(crate) fn table_mut(&mut self, table: usize) -> &mut ChangeInfo {
        if self.tables.len() <= table {
            let new_len = std::cmp::max(self.tables.len() * 2, table + 1);
            self.tables.resize_with(new_len, ChangeInfo::default);
        }
        &mut self.tables[table]
    }
}
