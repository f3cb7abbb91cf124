// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database handles and the async query interface

pub mod handle;
pub mod query;

pub use handle::{BindingContext, Realm, RealmId};
pub use query::AsyncQuery;
