// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Employee records and the normalized hierarchy table.
//!
//! The table is the single source of truth for the organization graph. It
//! stores both edge directions (`managerId` on the child and `directReports`
//! on the parent) because both are part of the persisted format; every
//! mutation in [`crate::hierarchy`] keeps them in lockstep and
//! [`HierarchyTable::violations`] checks that they are.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use time::OffsetDateTime;

/// Opaque, stable employee identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    /// Wrap a raw id string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EmployeeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EmployeeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EmployeeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A node of the organization graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Stable id; equals the employee's key in the table.
    pub id: EmployeeId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Job title, expected to come from the designation catalog.
    #[serde(default)]
    pub designation: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: String,
    /// Manager edge; `None` for the root.
    #[serde(default)]
    pub manager_id: Option<EmployeeId>,
    /// Children in insertion order.
    #[serde(default)]
    pub direct_reports: Vec<EmployeeId>,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last modification time.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Employee {
    /// Whether this employee has no manager.
    pub fn is_root(&self) -> bool {
        self.manager_id.is_none()
    }
}

/// Field set for creating an employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEmployee {
    /// Display name.
    pub name: String,
    /// Job title.
    pub designation: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Initial manager, if any.
    pub manager_id: Option<EmployeeId>,
}

impl NewEmployee {
    /// Shorthand for a named employee with a title and optional manager.
    pub fn new(
        name: impl Into<String>,
        designation: impl Into<String>,
        manager_id: Option<EmployeeId>,
    ) -> Self {
        Self {
            name: name.into(),
            designation: designation.into(),
            manager_id,
            ..Self::default()
        }
    }
}

/// Partial update of the contact fields.
///
/// Manager changes are deliberately absent: they go through
/// [`crate::hierarchy::HierarchyStore::change_reporting_line`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeePatch {
    /// New display name.
    pub name: Option<String>,
    /// New job title.
    pub designation: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New phone.
    pub phone: Option<String>,
}

impl EmployeePatch {
    /// True when the patch carries no field.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.designation.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }

    pub(crate) fn apply_to(self, employee: &mut Employee) {
        if let Some(name) = self.name {
            employee.name = name;
        }
        if let Some(designation) = self.designation {
            employee.designation = designation;
        }
        if let Some(email) = self.email {
            employee.email = email;
        }
        if let Some(phone) = self.phone {
            employee.phone = phone;
        }
    }
}

/// A broken table invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A `byId` key is not listed in `allIds`.
    MissingFromAllIds(EmployeeId),
    /// An `allIds` entry has no record.
    UnknownInAllIds(EmployeeId),
    /// An id is listed more than once in `allIds`.
    DuplicateInAllIds(EmployeeId),
    /// A record's `id` differs from its key.
    IdMismatch {
        /// Table key.
        key: EmployeeId,
        /// Id stored in the record.
        id: EmployeeId,
    },
    /// `managerId` references a missing employee.
    DanglingManager {
        /// Employee holding the edge.
        id: EmployeeId,
        /// Missing manager id.
        manager: EmployeeId,
    },
    /// `directReports` lists a missing employee.
    DanglingReport {
        /// Manager holding the list.
        manager: EmployeeId,
        /// Missing report id.
        report: EmployeeId,
    },
    /// `directReports` lists an employee whose `managerId` points elsewhere.
    ReportNotOwned {
        /// Manager holding the list.
        manager: EmployeeId,
        /// Listed report.
        report: EmployeeId,
    },
    /// `directReports` lists the same employee twice.
    DuplicateReport {
        /// Manager holding the list.
        manager: EmployeeId,
        /// Repeated report.
        report: EmployeeId,
    },
    /// An employee's manager does not list it as a direct report.
    UnlistedReport {
        /// Manager missing the entry.
        manager: EmployeeId,
        /// Employee pointing at the manager.
        report: EmployeeId,
    },
    /// The employee is its own ancestor.
    Cycle(EmployeeId),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFromAllIds(id) => write!(f, "{id} is missing from allIds"),
            Self::UnknownInAllIds(id) => write!(f, "allIds lists unknown id {id}"),
            Self::DuplicateInAllIds(id) => write!(f, "allIds lists {id} more than once"),
            Self::IdMismatch { key, id } => write!(f, "record under {key} carries id {id}"),
            Self::DanglingManager { id, manager } => {
                write!(f, "{id} reports to unknown manager {manager}")
            }
            Self::DanglingReport { manager, report } => {
                write!(f, "{manager} lists unknown report {report}")
            }
            Self::ReportNotOwned { manager, report } => {
                write!(f, "{manager} lists {report}, which reports elsewhere")
            }
            Self::DuplicateReport { manager, report } => {
                write!(f, "{manager} lists {report} more than once")
            }
            Self::UnlistedReport { manager, report } => {
                write!(f, "{report} reports to {manager} but is not listed")
            }
            Self::Cycle(id) => write!(f, "{id} is its own ancestor"),
        }
    }
}

/// Normalized employee table: records by id, creation order, structural version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyTable {
    by_id: BTreeMap<EmployeeId, Employee>,
    all_ids: Vec<EmployeeId>,
    version: u64,
}

impl HierarchyTable {
    /// Empty table at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a table from raw parts without checking invariants.
    ///
    /// Use [`violations`](Self::violations) or [`repair`](Self::repair) on the result.
    pub fn from_parts(
        by_id: BTreeMap<EmployeeId, Employee>,
        all_ids: Vec<EmployeeId>,
        version: u64,
    ) -> Self {
        Self {
            by_id,
            all_ids,
            version,
        }
    }

    /// Records keyed by id.
    pub fn by_id(&self) -> &BTreeMap<EmployeeId, Employee> {
        &self.by_id
    }

    /// Ids in creation order.
    pub fn all_ids(&self) -> &[EmployeeId] {
        &self.all_ids
    }

    /// Structural version counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Look up one employee.
    pub fn get(&self, id: &str) -> Option<&Employee> {
        self.by_id.get(id)
    }

    /// Whether `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of employees.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when the table holds no employee.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Employees in `allIds` order, skipping ids without a record.
    pub fn iter(&self) -> impl Iterator<Item = &Employee> + '_ {
        self.all_ids.iter().filter_map(|id| self.by_id.get(id))
    }

    /// First employee without a manager, in `allIds` order.
    pub fn root(&self) -> Option<&Employee> {
        self.iter().find(|e| e.is_root())
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Employee> {
        self.by_id.get_mut(id)
    }

    pub(crate) fn insert(&mut self, employee: Employee) {
        if !self.all_ids.contains(&employee.id) {
            self.all_ids.push(employee.id.clone());
        }
        self.by_id.insert(employee.id.clone(), employee);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Employee> {
        let removed = self.by_id.remove(id)?;
        self.all_ids.retain(|other| other.as_str() != id);
        Some(removed)
    }

    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    /// Whether walking up from `start` through manager edges reaches `target`.
    ///
    /// `start` itself counts. The walk stops on a missing manager or a repeated
    /// id, so corrupted cyclic data terminates.
    pub fn chain_contains(&self, start: &str, target: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self
                .by_id
                .get(id)
                .and_then(|e| e.manager_id.as_ref())
                .map(EmployeeId::as_str);
        }
        false
    }

    fn in_cycle(&self, id: &str) -> bool {
        self.by_id
            .get(id)
            .and_then(|e| e.manager_id.as_ref())
            .is_some_and(|manager| self.chain_contains(manager.as_str(), id))
    }

    /// Every broken invariant, in a stable order. Empty for a valid table.
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();

        let mut listed = BTreeSet::new();
        for id in &self.all_ids {
            if !listed.insert(id) {
                out.push(Violation::DuplicateInAllIds(id.clone()));
            } else if !self.by_id.contains_key(id) {
                out.push(Violation::UnknownInAllIds(id.clone()));
            }
        }
        for key in self.by_id.keys() {
            if !listed.contains(key) {
                out.push(Violation::MissingFromAllIds(key.clone()));
            }
        }

        for (key, employee) in &self.by_id {
            if &employee.id != key {
                out.push(Violation::IdMismatch {
                    key: key.clone(),
                    id: employee.id.clone(),
                });
            }
            if let Some(manager) = &employee.manager_id {
                match self.by_id.get(manager) {
                    None => out.push(Violation::DanglingManager {
                        id: key.clone(),
                        manager: manager.clone(),
                    }),
                    Some(m) if !m.direct_reports.contains(key) => {
                        out.push(Violation::UnlistedReport {
                            manager: manager.clone(),
                            report: key.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }

            let mut seen_reports = BTreeSet::new();
            for report in &employee.direct_reports {
                if !seen_reports.insert(report) {
                    out.push(Violation::DuplicateReport {
                        manager: key.clone(),
                        report: report.clone(),
                    });
                    continue;
                }
                match self.by_id.get(report) {
                    None => out.push(Violation::DanglingReport {
                        manager: key.clone(),
                        report: report.clone(),
                    }),
                    Some(r) if r.manager_id.as_ref() != Some(key) => {
                        out.push(Violation::ReportNotOwned {
                            manager: key.clone(),
                            report: report.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }

            if self.in_cycle(key.as_str()) {
                out.push(Violation::Cycle(key.clone()));
            }
        }

        out
    }

    /// Restore every invariant best-effort without bumping the version.
    ///
    /// `allIds` becomes exactly the keys of `byId` (surviving order first),
    /// dangling manager edges are cut, cycles are broken by detaching the first
    /// member found in `allIds` order, and `directReports` is rebuilt from the
    /// manager edges while keeping the surviving order.
    pub fn repair(&mut self) {
        let mut seen = BTreeSet::new();
        let mut all_ids: Vec<EmployeeId> = self
            .all_ids
            .iter()
            .filter(|id| self.by_id.contains_key(*id) && seen.insert((*id).clone()))
            .cloned()
            .collect();
        all_ids.extend(self.by_id.keys().filter(|k| !seen.contains(*k)).cloned());
        self.all_ids = all_ids;

        for (key, employee) in &mut self.by_id {
            if &employee.id != key {
                employee.id = key.clone();
            }
        }

        let known: BTreeSet<EmployeeId> = self.by_id.keys().cloned().collect();
        for employee in self.by_id.values_mut() {
            if employee
                .manager_id
                .as_ref()
                .is_some_and(|m| !known.contains(m))
            {
                employee.manager_id = None;
            }
        }

        for id in self.all_ids.clone() {
            if self.in_cycle(id.as_str()) {
                if let Some(employee) = self.by_id.get_mut(&id) {
                    employee.manager_id = None;
                }
            }
        }

        let mut children: BTreeMap<EmployeeId, Vec<EmployeeId>> = BTreeMap::new();
        for id in &self.all_ids {
            if let Some(manager) = self.by_id.get(id).and_then(|e| e.manager_id.clone()) {
                children.entry(manager).or_default().push(id.clone());
            }
        }
        for (key, employee) in &mut self.by_id {
            let owned = children.remove(key).unwrap_or_default();
            let mut rebuilt: Vec<EmployeeId> = Vec::with_capacity(owned.len());
            for report in &employee.direct_reports {
                if owned.contains(report) && !rebuilt.contains(report) {
                    rebuilt.push(report.clone());
                }
            }
            for report in owned {
                if !rebuilt.contains(&report) {
                    rebuilt.push(report);
                }
            }
            employee.direct_reports = rebuilt;
        }
    }
}
