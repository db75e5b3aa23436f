// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Organization chart core: the hierarchy store, read-side projections,
//! a validating storage gateway over any key-value backend, and debounced
//! persistence. Host adapters (filesystem store, CLI) stay thin on top.

pub mod app;
pub mod bookmarks;
pub mod clock;
pub mod designations;
pub mod hierarchy;
pub mod model;
pub mod notice;
pub mod prefs;
pub mod projection;
pub mod storage;
pub mod sync;

pub use app::{Command, CommandError, CommandOutcome, OrgChart};
pub use clock::{Clock, IdSource, ManualClock, SystemClock, TimeIdSource};
pub use hierarchy::{HierarchyError, HierarchyStore, ReportingChange};
pub use model::{Employee, EmployeeId, EmployeePatch, HierarchyTable, NewEmployee, Violation};
pub use storage::{KeyValueStore, MemoryStore, StorageError, StorageGateway};
