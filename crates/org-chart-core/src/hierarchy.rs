// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hierarchy store: the four structural mutations over [`HierarchyTable`].
//!
//! Every mutation keeps both edge directions consistent and bumps the table
//! version exactly once when it changes anything. Routine no-ops (unknown id
//! on update/delete) are silent; operations whose callers await an outcome
//! return a [`HierarchyError`].

use thiserror::Error;
use tracing::debug;

use crate::clock::{unix_millis, Clock, IdSource, TimeIdSource};
use crate::model::{Employee, EmployeeId, EmployeePatch, HierarchyTable, NewEmployee};

/// Candidates drawn from the [`IdSource`] before falling back to a counter suffix.
const ID_ATTEMPTS: usize = 16;

/// Failures surfaced by hierarchy operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// The referenced employee does not exist.
    #[error("employee not found: {0}")]
    NotFound(EmployeeId),
    /// The requested manager does not exist.
    #[error("manager not found: {0}")]
    ManagerNotFound(EmployeeId),
    /// The change would make an employee its own ancestor.
    #[error("assigning {manager} as manager of {employee} would create a circular reporting relationship")]
    CyclicReference {
        /// Employee being moved.
        employee: EmployeeId,
        /// Requested manager.
        manager: EmployeeId,
    },
}

/// Outcome of [`HierarchyStore::change_reporting_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportingChange {
    /// The employee already reports to the requested manager.
    Unchanged,
    /// The employee moved between managers.
    Moved {
        /// Previous manager.
        from: Option<EmployeeId>,
        /// New manager.
        to: Option<EmployeeId>,
    },
}

/// Authoritative in-memory organization graph.
pub struct HierarchyStore<C, I = TimeIdSource> {
    table: HierarchyTable,
    clock: C,
    ids: I,
}

impl<C: Clock> HierarchyStore<C> {
    /// Empty store with time-based id generation.
    pub fn new(clock: C) -> Self {
        Self::with_id_source(clock, TimeIdSource::default())
    }
}

impl<C: Clock, I: IdSource> HierarchyStore<C, I> {
    /// Empty store with a custom id source.
    pub fn with_id_source(clock: C, ids: I) -> Self {
        Self {
            table: HierarchyTable::new(),
            clock,
            ids,
        }
    }

    /// Read-only view of the table.
    pub fn table(&self) -> &HierarchyTable {
        &self.table
    }

    /// Structural version counter.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Number of employees.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the store holds no employee.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Employees in creation order.
    pub fn all_employees(&self) -> Vec<&Employee> {
        self.table.iter().collect()
    }

    /// Look up one employee.
    pub fn employee(&self, id: &str) -> Option<&Employee> {
        self.table.get(id)
    }

    /// Direct reports of `id` in insertion order; unknown ids yield an empty list.
    pub fn direct_reports(&self, id: &str) -> Vec<&Employee> {
        crate::projection::direct_reports(&self.table, id)
    }

    /// Replace the whole table (load path; not a structural mutation).
    pub fn replace_table(&mut self, table: HierarchyTable) {
        self.table = table;
    }

    /// Reset to an empty table at version 0 (storage reset path).
    pub fn clear(&mut self) {
        self.table = HierarchyTable::new();
    }

    /// Whether making `new_manager` the manager of `employee` would create a cycle.
    pub fn would_create_cycle(&self, employee: &str, new_manager: &str) -> bool {
        self.table.chain_contains(new_manager, employee)
    }

    fn fresh_id(&mut self) -> EmployeeId {
        let millis = unix_millis(self.clock.now());
        let mut candidate = String::new();
        for _ in 0..ID_ATTEMPTS {
            candidate = self.ids.next_id(millis);
            if !self.table.contains(&candidate) {
                return EmployeeId::new(candidate);
            }
        }
        // The source keeps repeating taken ids; suffix the last one instead.
        // Terminates because the table is finite.
        debug!(%candidate, "id source exhausted, suffixing");
        let mut n: u64 = 1;
        loop {
            let suffixed = format!("{candidate}-{n}");
            if !self.table.contains(&suffixed) {
                return EmployeeId::new(suffixed);
            }
            n += 1;
        }
    }

    /// Create an employee and return its id.
    ///
    /// Re-adding an existing id replaces its contact fields, keeps its reports
    /// and creation time, and moves it to the requested manager.
    pub fn add_employee(
        &mut self,
        fields: NewEmployee,
        explicit_id: Option<EmployeeId>,
    ) -> Result<EmployeeId, HierarchyError> {
        if let Some(manager) = &fields.manager_id {
            if !self.table.contains(manager.as_str()) {
                return Err(HierarchyError::ManagerNotFound(manager.clone()));
            }
        }

        let id = match explicit_id {
            Some(id) => id,
            None => self.fresh_id(),
        };

        if self.table.contains(id.as_str()) {
            return self.readd_employee(id, fields);
        }

        let now = self.clock.now();
        let employee = Employee {
            id: id.clone(),
            name: fields.name,
            designation: fields.designation,
            email: fields.email,
            phone: fields.phone,
            manager_id: fields.manager_id,
            direct_reports: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let manager = employee.manager_id.clone();
        self.table.insert(employee);
        if let Some(manager) = manager {
            self.link(&manager, &id);
        }
        self.table.bump_version();
        debug!(%id, version = self.table.version(), "employee added");
        Ok(id)
    }

    fn readd_employee(
        &mut self,
        id: EmployeeId,
        fields: NewEmployee,
    ) -> Result<EmployeeId, HierarchyError> {
        if let Some(manager) = &fields.manager_id {
            if self.would_create_cycle(id.as_str(), manager.as_str()) {
                return Err(HierarchyError::CyclicReference {
                    employee: id,
                    manager: manager.clone(),
                });
            }
        }
        let now = self.clock.now();
        let previous = self
            .table
            .get(id.as_str())
            .and_then(|e| e.manager_id.clone());
        if previous != fields.manager_id {
            if let Some(old) = &previous {
                self.unlink(old, &id);
            }
            if let Some(new) = &fields.manager_id {
                self.link(new, &id);
            }
        }
        if let Some(employee) = self.table.get_mut(id.as_str()) {
            employee.name = fields.name;
            employee.designation = fields.designation;
            employee.email = fields.email;
            employee.phone = fields.phone;
            employee.manager_id = fields.manager_id;
            employee.updated_at = now;
        }
        self.table.bump_version();
        debug!(%id, version = self.table.version(), "employee re-added");
        Ok(id)
    }

    /// Merge `patch` into an existing employee. Returns `false` (and leaves the
    /// version untouched) when `id` is unknown.
    pub fn update_employee(&mut self, id: &str, patch: EmployeePatch) -> bool {
        let now = self.clock.now();
        let Some(employee) = self.table.get_mut(id) else {
            return false;
        };
        patch.apply_to(employee);
        employee.updated_at = now;
        self.table.bump_version();
        true
    }

    /// Remove an employee, handing its direct reports to its own manager.
    ///
    /// Returns the removed record, or `None` when `id` is unknown.
    pub fn delete_employee(&mut self, id: &str) -> Option<Employee> {
        let removed = self.table.remove(id)?;
        let grand_manager = removed.manager_id.clone();

        if let Some(manager) = &grand_manager {
            self.unlink(manager, &removed.id);
        }
        for report in &removed.direct_reports {
            let Some(child) = self.table.get_mut(report.as_str()) else {
                continue;
            };
            child.manager_id.clone_from(&grand_manager);
            if let Some(manager) = &grand_manager {
                self.link(manager, report);
            }
        }

        self.table.bump_version();
        debug!(
            id,
            reassigned = removed.direct_reports.len(),
            version = self.table.version(),
            "employee deleted"
        );
        Some(removed)
    }

    /// Move `employee_id` under `new_manager` (or make it a root with `None`).
    ///
    /// Cycle detection runs before anything is touched.
    pub fn change_reporting_line(
        &mut self,
        employee_id: &str,
        new_manager: Option<&str>,
    ) -> Result<ReportingChange, HierarchyError> {
        let Some(employee) = self.table.get(employee_id) else {
            return Err(HierarchyError::NotFound(EmployeeId::new(employee_id)));
        };
        let old_manager = employee.manager_id.clone();
        let employee_id = employee.id.clone();

        if old_manager.as_ref().map(EmployeeId::as_str) == new_manager {
            return Ok(ReportingChange::Unchanged);
        }

        let new_manager = match new_manager {
            Some(manager) => {
                if !self.table.contains(manager) {
                    return Err(HierarchyError::ManagerNotFound(EmployeeId::new(manager)));
                }
                if self.would_create_cycle(employee_id.as_str(), manager) {
                    return Err(HierarchyError::CyclicReference {
                        employee: employee_id,
                        manager: EmployeeId::new(manager),
                    });
                }
                Some(EmployeeId::new(manager))
            }
            None => None,
        };

        if let Some(old) = &old_manager {
            self.unlink(old, &employee_id);
        }
        if let Some(new) = &new_manager {
            self.link(new, &employee_id);
        }
        let now = self.clock.now();
        if let Some(employee) = self.table.get_mut(employee_id.as_str()) {
            employee.manager_id.clone_from(&new_manager);
            employee.updated_at = now;
        }
        self.table.bump_version();
        debug!(
            employee = %employee_id,
            from = ?old_manager,
            to = ?new_manager,
            version = self.table.version(),
            "reporting line changed"
        );
        Ok(ReportingChange::Moved {
            from: old_manager,
            to: new_manager,
        })
    }

    fn link(&mut self, manager: &EmployeeId, report: &EmployeeId) {
        if let Some(m) = self.table.get_mut(manager.as_str()) {
            if !m.direct_reports.contains(report) {
                m.direct_reports.push(report.clone());
            }
        }
    }

    fn unlink(&mut self, manager: &EmployeeId, report: &EmployeeId) {
        if let Some(m) = self.table.get_mut(manager.as_str()) {
            m.direct_reports.retain(|r| r != report);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> HierarchyStore<ManualClock> {
        HierarchyStore::new(ManualClock::at_millis(1_700_000_000_000))
    }

    fn add(store: &mut HierarchyStore<ManualClock>, id: &str, manager: Option<&str>) {
        store
            .add_employee(
                NewEmployee::new(id.to_uppercase(), "Engineer", manager.map(EmployeeId::new)),
                Some(EmployeeId::new(id)),
            )
            .unwrap();
    }

    fn reports(store: &HierarchyStore<ManualClock>, id: &str) -> Vec<String> {
        store
            .employee(id)
            .unwrap()
            .direct_reports
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn add_generates_id_and_links_manager() {
        let mut s = store();
        add(&mut s, "e1", None);
        let id = s
            .add_employee(NewEmployee::new("Jane", "Engineer", Some("e1".into())), None)
            .unwrap();
        assert_eq!(id.as_str(), "emp-1700000000000");
        assert_eq!(reports(&s, "e1"), vec!["emp-1700000000000"]);
        assert_eq!(s.version(), 2);
        assert!(s.employee(id.as_str()).unwrap().direct_reports.is_empty());
    }

    struct Repeating(&'static str, usize);

    impl IdSource for Repeating {
        fn next_id(&mut self, _now_millis: u64) -> String {
            self.1 += 1;
            self.0.to_owned()
        }
    }

    #[test]
    fn repeating_id_source_falls_back_to_a_suffix() {
        let mut s = HierarchyStore::with_id_source(
            ManualClock::at_millis(1_700_000_000_000),
            Repeating("dup", 0),
        );
        let first = s.add_employee(NewEmployee::default(), None).unwrap();
        assert_eq!(first.as_str(), "dup");
        let second = s.add_employee(NewEmployee::default(), None).unwrap();
        assert_eq!(second.as_str(), "dup-1");
        let third = s.add_employee(NewEmployee::default(), None).unwrap();
        assert_eq!(third.as_str(), "dup-2");
        assert_eq!(s.len(), 3);
        assert_eq!(s.ids.1, 1 + 2 * ID_ATTEMPTS);
    }

    #[test]
    fn generated_ids_do_not_collide_with_existing_ones() {
        let mut s = store();
        let a = s.add_employee(NewEmployee::default(), None).unwrap();
        let b = s.add_employee(NewEmployee::default(), None).unwrap();
        assert_ne!(a, b);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn add_rejects_unknown_manager() {
        let mut s = store();
        let err = s
            .add_employee(NewEmployee::new("x", "y", Some("ghost".into())), None)
            .unwrap_err();
        assert_eq!(err, HierarchyError::ManagerNotFound("ghost".into()));
        assert_eq!(s.version(), 0);
        assert!(s.is_empty());
    }

    #[test]
    fn readd_is_idempotent_for_listing_and_keeps_reports() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        add(&mut s, "e1", None);
        assert_eq!(s.table().all_ids().len(), 2);
        assert_eq!(reports(&s, "e1"), vec!["e2"]);
        assert!(s.table().violations().is_empty());
        assert_eq!(s.version(), 3);
    }

    #[test]
    fn readd_under_own_report_is_rejected() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        let err = s
            .add_employee(
                NewEmployee::new("E1", "CEO", Some("e2".into())),
                Some("e1".into()),
            )
            .unwrap_err();
        assert!(matches!(err, HierarchyError::CyclicReference { .. }));
        assert_eq!(s.version(), 2);
    }

    #[test]
    fn update_merges_whitelisted_fields() {
        let mut s = store();
        add(&mut s, "e1", None);
        s.clock.advance_millis(5_000);
        let patch = EmployeePatch {
            name: Some("John Smith".into()),
            designation: Some("Senior Manager".into()),
            ..EmployeePatch::default()
        };
        assert!(s.update_employee("e1", patch));
        let e = s.employee("e1").unwrap();
        assert_eq!(e.name, "John Smith");
        assert_eq!(e.designation, "Senior Manager");
        assert!(e.updated_at > e.created_at);
        assert_eq!(s.version(), 2);
    }

    #[test]
    fn update_unknown_is_silent_noop() {
        let mut s = store();
        assert!(!s.update_employee("nobody", EmployeePatch::default()));
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn delete_reparents_children_to_grand_manager() {
        let mut s = store();
        add(&mut s, "ceo", None);
        add(&mut s, "mgr", Some("ceo"));
        add(&mut s, "peer", Some("ceo"));
        add(&mut s, "a", Some("mgr"));
        add(&mut s, "b", Some("mgr"));
        let before = s.len();

        let removed = s.delete_employee("mgr").unwrap();
        assert_eq!(removed.id.as_str(), "mgr");
        assert_eq!(s.len(), before - 1);
        assert_eq!(reports(&s, "ceo"), vec!["peer", "a", "b"]);
        for id in ["a", "b"] {
            assert_eq!(
                s.employee(id).unwrap().manager_id,
                Some(EmployeeId::new("ceo"))
            );
        }
        assert!(s.table().violations().is_empty());
    }

    #[test]
    fn delete_root_promotes_children_to_roots() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        s.delete_employee("e1");
        assert_eq!(s.employee("e2").unwrap().manager_id, None);
        assert_eq!(s.len(), 1);
        assert_eq!(s.table().all_ids(), &[EmployeeId::new("e2")]);
    }

    #[test]
    fn delete_unknown_is_noop() {
        let mut s = store();
        add(&mut s, "e1", None);
        assert!(s.delete_employee("ghost").is_none());
        assert_eq!(s.version(), 1);
    }

    #[test]
    fn change_reporting_line_moves_between_managers() {
        let mut s = store();
        add(&mut s, "m1", None);
        add(&mut s, "m2", Some("m1"));
        add(&mut s, "e", Some("m1"));

        let outcome = s.change_reporting_line("e", Some("m2")).unwrap();
        assert_eq!(
            outcome,
            ReportingChange::Moved {
                from: Some("m1".into()),
                to: Some("m2".into()),
            }
        );
        assert_eq!(reports(&s, "m1"), vec!["m2"]);
        assert_eq!(reports(&s, "m2"), vec!["e"]);
        assert_eq!(s.version(), 4);
    }

    #[test]
    fn change_reporting_line_rejects_descendant_manager() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        add(&mut s, "e3", Some("e2"));
        let version = s.version();

        for target in ["e2", "e3", "e1"] {
            let err = s.change_reporting_line("e1", Some(target)).unwrap_err();
            assert!(matches!(err, HierarchyError::CyclicReference { .. }));
        }
        assert_eq!(s.version(), version);
        assert_eq!(s.employee("e1").unwrap().manager_id, None);
    }

    #[test]
    fn change_reporting_line_to_same_manager_is_unchanged() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        assert_eq!(
            s.change_reporting_line("e2", Some("e1")).unwrap(),
            ReportingChange::Unchanged
        );
        assert_eq!(
            s.change_reporting_line("e1", None).unwrap(),
            ReportingChange::Unchanged
        );
        assert_eq!(s.version(), 2);
    }

    #[test]
    fn change_reporting_line_reports_missing_ids() {
        let mut s = store();
        add(&mut s, "e1", None);
        assert_eq!(
            s.change_reporting_line("ghost", Some("e1")).unwrap_err(),
            HierarchyError::NotFound("ghost".into())
        );
        assert_eq!(
            s.change_reporting_line("e1", Some("ghost")).unwrap_err(),
            HierarchyError::ManagerNotFound("ghost".into())
        );
    }

    #[test]
    fn change_reporting_line_to_root() {
        let mut s = store();
        add(&mut s, "e1", None);
        add(&mut s, "e2", Some("e1"));
        s.change_reporting_line("e2", None).unwrap();
        assert!(reports(&s, "e1").is_empty());
        assert!(s.employee("e2").unwrap().is_root());
        assert!(s.table().violations().is_empty());
    }
}
