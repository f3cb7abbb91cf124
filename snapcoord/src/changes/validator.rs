// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Validating transaction log replay
//!
//! Another process may write to the same file using a different schema. Data
//! changes are always fine, and so is creating brand new tables, but any
//! structural change to a table that already existed would invalidate the
//! accessors handed out by this process. The validator rejects those the
//! moment they show up in the log.

use crate::error::{CoordinatorError, Result};
use crate::storage::{LogInstruction, TransactLogHandler};

#[derive(Debug, Default)]
pub struct TransactLogValidator {
    current_table: usize,
    /// Tables created by the transaction being replayed; they may still gain
    /// columns without a schema version bump
    new_tables: Vec<usize>,
}

impl TransactLogValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the table targeted by row and column instructions
    pub fn current_table(&self) -> usize {
        self.current_table
    }

    fn schema_error(instruction: &LogInstruction) -> CoordinatorError {
        log::error!(
            "Rejecting transaction log: unsupported schema change {:?}",
            instruction
        );
        CoordinatorError::SchemaMismatch
    }

    fn require_new_table(&self, instruction: &LogInstruction) -> Result<()> {
        if self.new_tables.contains(&self.current_table) {
            Ok(())
        } else {
            Err(Self::schema_error(instruction))
        }
    }

    fn insert_table(&mut self, table: usize) {
        for existing in &mut self.new_tables {
            if *existing >= table {
                *existing += 1;
            }
        }
        self.new_tables.push(table);
    }
}

impl TransactLogHandler for TransactLogValidator {
    fn handle(&mut self, instruction: &LogInstruction) -> Result<()> {
        use LogInstruction::*;

        match instruction {
            SelectTable { table } => {
                self.current_table = *table;
                Ok(())
            }
            // Subtables are not supported
            SelectDescriptor { levels } => {
                if *levels == 0 {
                    Ok(())
                } else {
                    Err(Self::schema_error(instruction))
                }
            }

            InsertGroupLevelTable { table, .. } => {
                self.insert_table(*table);
                Ok(())
            }
            InsertColumn { .. } | InsertLinkColumn { .. } | AddPrimaryKey { .. }
            | SetLinkType { .. } => self.require_new_table(instruction),

            // Removing, renaming or reordering is never supported while open
            EraseGroupLevelTable { .. }
            | RenameGroupLevelTable { .. }
            | MoveGroupLevelTable { .. }
            | EraseColumn { .. }
            | EraseLinkColumn { .. }
            | RenameColumn { .. }
            | MoveColumn { .. }
            | RemovePrimaryKey => Err(Self::schema_error(instruction)),

            AddSearchIndex { .. }
            | RemoveSearchIndex { .. }
            | SelectLinkList { .. }
            | InsertEmptyRows { .. }
            | EraseRows { .. }
            | SwapRows { .. }
            | ClearTable
            | OptimizeTable
            | Set { .. }
            | SetUnique { .. }
            | NullifyLink { .. }
            | InsertSubstring { .. }
            | EraseSubstring { .. }
            | LinkListSet { .. }
            | LinkListInsert { .. }
            | LinkListErase { .. }
            | LinkListNullify { .. }
            | LinkListClear { .. }
            | LinkListMove { .. }
            | LinkListSwap { .. } => Ok(()),
        }
    }
}
