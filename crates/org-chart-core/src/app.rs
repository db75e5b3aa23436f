// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Application root: owns every store and routes commands.
//!
//! Hosts construct one [`OrgChart`], feed it [`Command`]s through
//! [`OrgChart::dispatch`] and call [`OrgChart::tick`] periodically so the
//! debounced save can fire.

use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::bookmarks::BookmarkSet;
use crate::clock::{Clock, SystemClock};
use crate::designations::{DesignationCatalog, DesignationError};
use crate::hierarchy::{HierarchyError, HierarchyStore, ReportingChange};
use crate::model::{Employee, EmployeeId, EmployeePatch, HierarchyTable, NewEmployee};
use crate::notice::{NoticeKind, NoticeQueue, NoticeView};
use crate::prefs::{Settings, Theme, ViewMode};
use crate::storage::{InitOutcome, KeyValueStore, StorageError, StorageGateway};
use crate::sync::{PersistenceStatus, PersistenceSynchronizer};

/// Everything a host can ask the chart to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create an employee (or replace one when `id` already exists).
    AddEmployee {
        /// Employee fields, including the initial manager.
        fields: NewEmployee,
        /// Explicit id; generated when absent.
        id: Option<EmployeeId>,
    },
    /// Merge contact fields into an employee.
    UpdateEmployee {
        /// Target employee.
        id: EmployeeId,
        /// Fields to overwrite.
        patch: EmployeePatch,
    },
    /// Remove an employee, re-parenting its reports.
    DeleteEmployee {
        /// Target employee.
        id: EmployeeId,
    },
    /// Move an employee under another manager (or to the top).
    ChangeReportingLine {
        /// Employee to move.
        id: EmployeeId,
        /// New manager; `None` detaches.
        manager: Option<EmployeeId>,
    },
    /// Replace the in-memory table with what storage holds.
    ///
    /// When storage holds no chart the in-memory table is kept as is rather
    /// than reset to empty, so unsaved edits survive a reload of an empty slot.
    LoadEmployees,
    /// Save now, bypassing the debounce.
    PersistEmployees,
    /// Flip the bookmark for an employee id or name.
    ToggleBookmark {
        /// Bookmark key.
        key: String,
    },
    /// Append a job title to the catalog.
    AddDesignation {
        /// Title to add.
        title: String,
    },
    /// Remove a job title from the catalog.
    RemoveDesignation {
        /// Title to remove.
        title: String,
    },
    /// Rename a job title in place.
    RenameDesignation {
        /// Existing title.
        from: String,
        /// Replacement title.
        to: String,
    },
    /// Drop all persisted chart data and reset in-memory state.
    ClearStorage,
}

/// Result of a successful [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Employee created or replaced.
    Added(EmployeeId),
    /// Whether the employee existed and was updated.
    Updated(bool),
    /// The removed employee, if it existed.
    Deleted(Option<Employee>),
    /// Reporting-line change result.
    Reassigned(ReportingChange),
    /// Storage was read.
    Loaded {
        /// Employees now in memory.
        employees: usize,
        /// Whether the stored data had to be repaired.
        recovered: bool,
    },
    /// Table written.
    Persisted,
    /// Whether the key is bookmarked after the toggle.
    Bookmarked(bool),
    /// Whether the catalog changed.
    DesignationsChanged(bool),
    /// Storage cleared.
    Cleared,
}

/// Failure of an awaited command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Structural edit rejected.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// Catalog edit rejected.
    #[error(transparent)]
    Designation(#[from] DesignationError),
    /// Persisting failed; in-memory state is kept.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The organization chart application state.
pub struct OrgChart<S, C = SystemClock> {
    hierarchy: HierarchyStore<C>,
    gateway: StorageGateway<S, C>,
    sync: PersistenceSynchronizer,
    bookmarks: BookmarkSet,
    designations: DesignationCatalog,
    settings: Settings,
    notices: NoticeQueue,
    storage_available: bool,
}

impl<S: KeyValueStore> OrgChart<S> {
    /// Open against `store` with the system clock.
    pub fn open(store: S, now: Instant) -> Self {
        Self::open_with_clock(store, SystemClock, now)
    }
}

impl<S: KeyValueStore, C: Clock + Clone> OrgChart<S, C> {
    /// Open against `store`: probe, migrate, then load employees, bookmarks,
    /// designations and settings.
    pub fn open_with_clock(store: S, clock: C, now: Instant) -> Self {
        let gateway = StorageGateway::with_clock(store, clock.clone());
        let settings = gateway.load_settings();
        let mut chart = Self {
            hierarchy: HierarchyStore::new(clock),
            sync: PersistenceSynchronizer::new(settings.debounce()),
            bookmarks: BookmarkSet::new(),
            designations: DesignationCatalog::default(),
            notices: NoticeQueue::new(settings.max_notices, settings.notice_ttl()),
            storage_available: true,
            settings,
            gateway,
        };

        chart.storage_available = chart.gateway.is_storage_available();
        if !chart.storage_available {
            warn!("storage is unavailable, changes will not persist");
            chart.notices.push(
                NoticeKind::Warn,
                "Storage is unavailable. Changes will not be saved.",
                now,
            );
        }

        match chart.gateway.initialize() {
            InitOutcome::Recovered => {
                chart.notices.push(
                    NoticeKind::Info,
                    "Stored data was damaged and has been recovered.",
                    now,
                );
            }
            InitOutcome::Cleared => {
                chart.notices.push(
                    NoticeKind::Warn,
                    "Stored data was unreadable and has been cleared.",
                    now,
                );
            }
            InitOutcome::Migrated { legacy_data: true } => {
                info!("legacy organization chart migrated");
            }
            InitOutcome::Ready | InitOutcome::Migrated { .. } => {}
        }

        chart.load_employees(now);
        chart.bookmarks = chart.gateway.load_bookmarks();
        chart.designations = chart.gateway.load_designations();
        chart
    }

    /// Run one command. Failures are returned and also raised as notices.
    pub fn dispatch(
        &mut self,
        command: Command,
        now: Instant,
    ) -> Result<CommandOutcome, CommandError> {
        let result = self.run(command, now);
        if let Err(err) = &result {
            self.notices.push(NoticeKind::Error, err.to_string(), now);
        }
        result
    }

    fn run(&mut self, command: Command, now: Instant) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::AddEmployee { fields, id } => {
                let id = self.hierarchy.add_employee(fields, id)?;
                self.sync.schedule(now);
                Ok(CommandOutcome::Added(id))
            }
            Command::UpdateEmployee { id, patch } => {
                let updated = self.hierarchy.update_employee(id.as_str(), patch);
                if updated {
                    self.sync.schedule(now);
                }
                Ok(CommandOutcome::Updated(updated))
            }
            Command::DeleteEmployee { id } => {
                let removed = self.hierarchy.delete_employee(id.as_str());
                if removed.is_some() {
                    self.sync.schedule(now);
                }
                Ok(CommandOutcome::Deleted(removed))
            }
            Command::ChangeReportingLine { id, manager } => {
                let change = self
                    .hierarchy
                    .change_reporting_line(id.as_str(), manager.as_ref().map(EmployeeId::as_str))?;
                if change != ReportingChange::Unchanged {
                    self.sync.schedule(now);
                }
                Ok(CommandOutcome::Reassigned(change))
            }
            Command::LoadEmployees => Ok(self.load_employees(now)),
            Command::PersistEmployees => {
                self.flush()?;
                Ok(CommandOutcome::Persisted)
            }
            Command::ToggleBookmark { key } => Ok(CommandOutcome::Bookmarked(
                self.toggle_bookmark(&key, now)?,
            )),
            Command::AddDesignation { title } => {
                self.designations.add(&title)?;
                self.gateway.save_designations(&self.designations)?;
                Ok(CommandOutcome::DesignationsChanged(true))
            }
            Command::RemoveDesignation { title } => {
                let removed = self.designations.remove(&title);
                if removed {
                    self.gateway.save_designations(&self.designations)?;
                }
                Ok(CommandOutcome::DesignationsChanged(removed))
            }
            Command::RenameDesignation { from, to } => {
                self.designations.rename(&from, &to)?;
                self.gateway.save_designations(&self.designations)?;
                Ok(CommandOutcome::DesignationsChanged(true))
            }
            Command::ClearStorage => {
                self.gateway.clear_storage();
                self.hierarchy.clear();
                self.bookmarks = BookmarkSet::new();
                self.sync.cancel();
                info!("storage cleared");
                Ok(CommandOutcome::Cleared)
            }
        }
    }

    /// Read storage into memory. An empty slot leaves the current table as is.
    fn load_employees(&mut self, now: Instant) -> CommandOutcome {
        let Some(loaded) = self.gateway.load() else {
            if self.sync.status().last_saved.is_none() {
                self.sync.mark_synced(self.gateway.clock().now());
            }
            return CommandOutcome::Loaded {
                employees: self.hierarchy.len(),
                recovered: false,
            };
        };
        if loaded.recovered {
            self.notices.push(
                NoticeKind::Info,
                "Stored data was damaged and has been recovered.",
                now,
            );
        }
        let saved_at = loaded
            .last_modified
            .and_then(|ms| {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
            })
            .unwrap_or_else(|| self.gateway.clock().now());
        let employees = loaded.table.len();
        self.hierarchy.replace_table(loaded.table);
        self.sync.mark_synced(saved_at);
        CommandOutcome::Loaded {
            employees,
            recovered: loaded.recovered,
        }
    }

    /// Advance time: fire a due save and expire notices.
    pub fn tick(&mut self, now: Instant) {
        if let Some(Err(err)) = self.sync.poll(now, self.hierarchy.table(), &self.gateway) {
            self.notices
                .push(NoticeKind::Error, format!("Failed to save changes: {err}"), now);
        }
        self.notices.retain_visible(now);
    }

    /// Save immediately if anything is unsaved.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.sync.flush(self.hierarchy.table(), &self.gateway)
    }

    /// Flip a bookmark and persist the set right away.
    pub fn toggle_bookmark(&mut self, key: &str, now: Instant) -> Result<bool, StorageError> {
        let marked = self.bookmarks.toggle(key, self.gateway.clock().now_millis());
        if let Err(err) = self.gateway.save_bookmarks(&self.bookmarks) {
            self.notices
                .push(NoticeKind::Error, format!("Failed to save bookmarks: {err}"), now);
            return Err(err);
        }
        Ok(marked)
    }

    /// Bookmarked employees that still exist, oldest bookmark first.
    pub fn bookmarked_employees(&self) -> Vec<&Employee> {
        self.bookmarks.resolve(self.hierarchy.table())
    }

    /// Current view mode preference.
    pub fn view_mode(&self) -> ViewMode {
        self.gateway.load_view_mode()
    }

    /// Persist the view mode preference.
    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), StorageError> {
        self.gateway.save_view_mode(mode)
    }

    /// Current theme preference.
    pub fn theme(&self) -> Theme {
        self.gateway.load_theme()
    }

    /// Persist the theme preference.
    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StorageError> {
        self.gateway.save_theme(theme)
    }

    /// Hierarchy store (read access).
    pub fn hierarchy(&self) -> &HierarchyStore<C> {
        &self.hierarchy
    }

    /// Employee table.
    pub fn table(&self) -> &HierarchyTable {
        self.hierarchy.table()
    }

    /// Bookmark set.
    pub fn bookmarks(&self) -> &BookmarkSet {
        &self.bookmarks
    }

    /// Designation catalog.
    pub fn designations(&self) -> &DesignationCatalog {
        &self.designations
    }

    /// Loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Persistence status.
    pub fn persistence(&self) -> &PersistenceStatus {
        self.sync.status()
    }

    /// Whether edits are waiting to be saved.
    pub fn has_unsaved_changes(&self) -> bool {
        self.sync.has_unsaved_changes()
    }

    /// Whether the storage probe succeeded at open.
    pub fn storage_available(&self) -> bool {
        self.storage_available
    }

    /// Live notices.
    pub fn notices(&self, now: Instant) -> Vec<NoticeView> {
        self.notices.visible(now)
    }

    /// Storage gateway.
    pub fn gateway(&self) -> &StorageGateway<S, C> {
        &self.gateway
    }
}
