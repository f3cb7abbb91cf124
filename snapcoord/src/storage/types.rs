// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage engine types
//!
//! Version identifiers and the low-level instruction set recorded in a
//! transaction log. A commit produces one log; replaying the logs between two
//! versions against a [`TransactLogHandler`](super::TransactLogHandler)
//! reproduces every mutation made in between.

use serde::{Deserialize, Serialize};

/// Identifies an exact snapshot of the database file
///
/// Ordered by `(version, index)`. The default value `(0, 0)` is never a real
/// snapshot and is used to mean "no specific version".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionId {
    pub version: u64,
    pub index: u32,
}

impl VersionId {
    pub fn new(version: u64, index: u32) -> Self {
        Self { version, index }
    }

    /// True for the default, untargeted version
    pub fn is_unset(&self) -> bool {
        self.version == 0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.version, self.index)
    }
}

/// Column data types that may appear in column insertion instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    Table,
    Mixed,
    Link,
    LinkList,
}

/// Strength of a link column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Strong,
    Weak,
}

/// Value written by a field-level set instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(i64),
    /// Subtable assignment; the subtable contents are not part of the log
    Table,
    Mixed(Box<FieldValue>),
    Link(usize),
    Null,
}

/// One low-level mutation recorded in a transaction log
///
/// Row and column operations apply to the table chosen by the most recent
/// [`LogInstruction::SelectTable`]; link-list operations apply to the list
/// chosen by the most recent [`LogInstruction::SelectLinkList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogInstruction {
    // Selection
    SelectTable { table: usize },
    SelectDescriptor { levels: usize },
    SelectLinkList { col: usize, row: usize },

    // Group-level schema changes
    InsertGroupLevelTable { table: usize, name: String },
    EraseGroupLevelTable { table: usize },
    RenameGroupLevelTable { table: usize, name: String },
    MoveGroupLevelTable { from: usize, to: usize },

    // Table-level schema changes
    InsertColumn {
        col: usize,
        data_type: DataType,
        name: String,
        nullable: bool,
    },
    InsertLinkColumn {
        col: usize,
        data_type: DataType,
        name: String,
        target_table: usize,
    },
    EraseColumn { col: usize },
    EraseLinkColumn { col: usize },
    RenameColumn { col: usize, name: String },
    MoveColumn { from: usize, to: usize },
    AddPrimaryKey { col: usize },
    RemovePrimaryKey,
    SetLinkType { col: usize, link_type: LinkType },
    AddSearchIndex { col: usize },
    RemoveSearchIndex { col: usize },

    // Rows
    InsertEmptyRows {
        row: usize,
        num_rows: usize,
        prior_num_rows: usize,
    },
    EraseRows {
        row: usize,
        num_rows: usize,
        prior_num_rows: usize,
        unordered: bool,
    },
    SwapRows { row_a: usize, row_b: usize },
    ClearTable,
    OptimizeTable,

    // Field values
    Set {
        col: usize,
        row: usize,
        value: FieldValue,
    },
    SetUnique {
        col: usize,
        row: usize,
        value: FieldValue,
    },
    NullifyLink { col: usize, row: usize },
    InsertSubstring {
        col: usize,
        row: usize,
        pos: usize,
        text: String,
    },
    EraseSubstring {
        col: usize,
        row: usize,
        pos: usize,
        len: usize,
    },

    // Link lists
    LinkListSet { index: usize, target_row: usize },
    LinkListInsert { index: usize, target_row: usize },
    LinkListErase { index: usize },
    LinkListNullify { index: usize },
    LinkListClear { old_size: usize },
    LinkListMove { from: usize, to: usize },
    LinkListSwap { index_a: usize, index_b: usize },
}
