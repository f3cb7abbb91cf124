// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Change diff engine
//!
//! Transaction log replay handlers used when a snapshot is advanced:
//!
//! - [`TransactLogValidator`] only checks that the log contains no schema
//!   change this process cannot cope with.
//! - [`TransactLogObserver`] validates and additionally computes the
//!   per-table and per-link-list diff handed to live queries.

pub mod change_info;
pub mod index_set;
pub mod observer;
pub mod validator;

pub use change_info::{ChangeInfo, LinkListInfo, LinkListKey, LinkListMove, TransactionChanges};
pub use index_set::IndexSet;
pub use observer::TransactLogObserver;
pub use validator::TransactLogValidator;
