// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-path coordination of database handles and async queries

mod cache;
mod notify;
mod pipeline;
pub mod realm_coordinator;
pub mod registry;

pub use realm_coordinator::RealmCoordinator;
pub use registry::CoordinatorRegistry;
