// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Observing transaction log replay
//!
//! Runs every instruction through [`TransactLogValidator`] first and then
//! accumulates a [`TransactionChanges`] diff: dirty rows and unordered-erase
//! moves per table, plus insert/delete/change/move tracking for every
//! observed link list.

use super::change_info::{LinkListInfo, LinkListKey, TransactionChanges};
use super::validator::TransactLogValidator;
use crate::error::{CoordinatorError, Result};
use crate::storage::{LogInstruction, TransactLogHandler};

#[derive(Debug, Default)]
pub struct TransactLogObserver {
    validator: TransactLogValidator,
    changes: TransactionChanges,
    /// Index into `changes.link_lists` of the selected list, if observed
    active_list: Option<usize>,
}

impl TransactLogObserver {
    /// Create an observer tracking the given link lists in addition to rows
    pub fn new(observed_lists: impl IntoIterator<Item = LinkListKey>) -> Self {
        let mut observer = Self::default();
        for key in observed_lists {
            if observer.changes.link_list(key).is_none() {
                observer.changes.link_lists.push(LinkListInfo::new(key));
            }
        }
        observer
    }

    pub fn changes(&self) -> &TransactionChanges {
        &self.changes
    }

    pub fn into_changes(self) -> TransactionChanges {
        self.changes
    }

    fn mark_dirty(&mut self, row: usize) {
        let table = self.validator.current_table();
        self.changes.table_mut(table).mark_dirty(row);
    }

    fn select_link_list(&mut self, row: usize, col: usize) {
        let key = LinkListKey::new(self.validator.current_table(), row, col);
        self.active_list = self
            .changes
            .link_lists
            .iter()
            .position(|info| info.key == key);
    }

    fn with_active_list(&mut self, f: impl FnOnce(&mut LinkListInfo)) {
        if let Some(index) = self.active_list {
            f(&mut self.changes.link_lists[index]);
        }
    }
}

impl TransactLogHandler for TransactLogObserver {
    fn handle(&mut self, instruction: &LogInstruction) -> Result<()> {
        use LogInstruction::*;

        self.validator.handle(instruction)?;

        match instruction {
            Set { row, .. }
            | SetUnique { row, .. }
            | NullifyLink { row, .. }
            | InsertSubstring { row, .. }
            | EraseSubstring { row, .. } => self.mark_dirty(*row),

            // Rows are only ever appended
            InsertEmptyRows { .. } => {}

            EraseRows {
                row,
                num_rows,
                prior_num_rows,
                unordered,
            } => {
                if !unordered {
                    return Err(CoordinatorError::InvalidTransactionLog(format!(
                        "ordered erase of row {} is not supported",
                        row
                    )));
                }
                if *num_rows != 1 {
                    return Err(CoordinatorError::InvalidTransactionLog(format!(
                        "unordered erase of {} rows at row {} is not supported",
                        num_rows, row
                    )));
                }
                let table = self.validator.current_table();
                self.changes
                    .table_mut(table)
                    .erase_unordered(*row, *prior_num_rows);
            }

            SelectLinkList { col, row } => self.select_link_list(*row, *col),
            LinkListSet { index, .. } => self.with_active_list(|list| list.set(*index)),
            LinkListInsert { index, .. } => self.with_active_list(|list| list.insert(*index)),
            LinkListErase { index } | LinkListNullify { index } => {
                self.with_active_list(|list| list.erase(*index))
            }
            LinkListSwap { index_a, index_b } => {
                self.with_active_list(|list| list.swap(*index_a, *index_b))
            }
            LinkListClear { .. } => self.with_active_list(|list| list.clear()),
            LinkListMove { from, to } => {
                self.with_active_list(|list| list.move_element(*from, *to))
            }

            _ => {}
        }
        Ok(())
    }

    fn parse_complete(&mut self) -> Result<()> {
        self.validator.parse_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldValue;

    fn replay(observer: &mut TransactLogObserver, log: &[LogInstruction]) -> Result<()> {
        for instruction in log {
            observer.handle(instruction)?;
        }
        observer.parse_complete()
    }

    fn set(row: usize) -> LogInstruction {
        LogInstruction::Set {
            col: 0,
            row,
            value: FieldValue::Int(1),
        }
    }

    fn erase(row: usize, prior_num_rows: usize) -> LogInstruction {
        LogInstruction::EraseRows {
            row,
            num_rows: 1,
            prior_num_rows,
            unordered: true,
        }
    }

    #[test]
    fn test_unordered_erase_of_five_rows() {
        // [A, B, C, D, E], erase B: E moves into slot 1
        let mut observer = TransactLogObserver::default();
        replay(
            &mut observer,
            &[LogInstruction::SelectTable { table: 0 }, erase(1, 5)],
        )
        .unwrap();

        let table = observer.changes().table(0).unwrap();
        assert_eq!(table.moves.len(), 1);
        assert_eq!(table.moves.get(&1), Some(&4));
        assert_eq!(table.deletions, 1);
    }

    #[test]
    fn test_appended_rows_then_unordered_erase() {
        for num_rows in 1..8usize {
            for erased in 0..num_rows {
                let mut observer = TransactLogObserver::default();
                let log = vec![
                    LogInstruction::SelectTable { table: 1 },
                    LogInstruction::InsertEmptyRows {
                        row: 0,
                        num_rows,
                        prior_num_rows: 0,
                    },
                    erase(erased, num_rows),
                ];
                replay(&mut observer, &log).unwrap();

                let table = observer.changes().table(1).unwrap();
                assert_eq!(table.moves.get(&erased), Some(&(num_rows - 1)));
                assert_eq!(table.deletions, 1);
            }
        }
    }

    #[test]
    fn test_ordered_erase_rejected() {
        let mut observer = TransactLogObserver::default();
        let result = observer.handle(&LogInstruction::EraseRows {
            row: 0,
            num_rows: 1,
            prior_num_rows: 3,
            unordered: false,
        });
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransactionLog(_))
        ));
    }

    #[test]
    fn test_multi_row_unordered_erase_rejected() {
        let mut observer = TransactLogObserver::default();
        let result = observer.handle(&LogInstruction::EraseRows {
            row: 1,
            num_rows: 2,
            prior_num_rows: 5,
            unordered: true,
        });
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransactionLog(_))
        ));
        assert!(observer.into_changes().tables.is_empty());
    }

    #[test]
    fn test_dirty_rows_per_table() {
        let mut observer = TransactLogObserver::default();
        replay(
            &mut observer,
            &[
                LogInstruction::SelectTable { table: 0 },
                set(2),
                LogInstruction::SelectTable { table: 2 },
                set(0),
                LogInstruction::NullifyLink { col: 1, row: 5 },
                erase(1, 4),
                set(1),
            ],
        )
        .unwrap();

        let changes = observer.into_changes();
        assert_eq!(changes.table(0).unwrap().changed.len(), 1);
        assert!(changes.table(0).unwrap().changed.contains(&2));
        assert!(changes.table(1).unwrap().is_empty());
        let table = changes.table(2).unwrap();
        // Row 1 now holds the row that used to be at index 3
        assert_eq!(
            table.changed.iter().copied().collect::<Vec<_>>(),
            vec![0, 3, 5]
        );
    }

    #[test]
    fn test_validation_still_applies() {
        let mut observer = TransactLogObserver::default();
        let result = replay(
            &mut observer,
            &[
                LogInstruction::SelectTable { table: 0 },
                LogInstruction::EraseColumn { col: 0 },
            ],
        );
        assert_eq!(result, Err(CoordinatorError::SchemaMismatch));
    }

    #[test]
    fn test_new_table_columns_allowed_while_observing() {
        let mut observer = TransactLogObserver::default();
        let result = replay(
            &mut observer,
            &[
                LogInstruction::InsertGroupLevelTable {
                    table: 4,
                    name: "fresh".into(),
                },
                LogInstruction::SelectTable { table: 4 },
                LogInstruction::InsertColumn {
                    col: 0,
                    data_type: crate::storage::DataType::String,
                    name: "name".into(),
                    nullable: true,
                },
            ],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_only_observed_lists_are_tracked() {
        let observed = LinkListKey::new(0, 1, 2);
        let mut observer = TransactLogObserver::new([observed]);
        replay(
            &mut observer,
            &[
                LogInstruction::SelectTable { table: 0 },
                LogInstruction::SelectLinkList { col: 2, row: 1 },
                LogInstruction::LinkListInsert {
                    index: 0,
                    target_row: 9,
                },
                LogInstruction::SelectLinkList { col: 2, row: 3 },
                LogInstruction::LinkListInsert {
                    index: 0,
                    target_row: 9,
                },
                LogInstruction::LinkListClear { old_size: 4 },
                LogInstruction::SelectLinkList { col: 2, row: 1 },
                LogInstruction::LinkListSwap {
                    index_a: 1,
                    index_b: 2,
                },
            ],
        )
        .unwrap();

        let changes = observer.into_changes();
        assert_eq!(changes.link_lists.len(), 1);
        let info = changes.link_list(observed).unwrap();
        assert!(!info.did_clear);
        assert_eq!(info.inserts.to_vec(), vec![0]);
        assert_eq!(info.changes.to_vec(), vec![1, 2]);
        assert!(info.moves.is_empty());
    }

    #[test]
    fn test_list_clear_then_insert() {
        let key = LinkListKey::new(0, 0, 0);
        let mut observer = TransactLogObserver::new([key]);
        replay(
            &mut observer,
            &[
                LogInstruction::SelectTable { table: 0 },
                LogInstruction::SelectLinkList { col: 0, row: 0 },
                LogInstruction::LinkListErase { index: 1 },
                LogInstruction::LinkListMove { from: 0, to: 2 },
                LogInstruction::LinkListClear { old_size: 3 },
                LogInstruction::LinkListInsert {
                    index: 0,
                    target_row: 1,
                },
            ],
        )
        .unwrap();

        let info = observer.changes().link_list(key).unwrap().clone();
        assert!(info.did_clear);
        assert_eq!(info.inserts.to_vec(), vec![0]);
        assert!(info.deletes.is_empty());
        assert!(info.changes.is_empty());
        assert!(info.moves.is_empty());
    }
}
