// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Derived, read-only views over a [`HierarchyTable`] (tree, breadcrumbs, table pages).
//!
//! Every walk here is guarded against cycles so that a corrupted table still
//! renders instead of looping.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::hierarchy::HierarchyError;
use crate::model::{Employee, EmployeeId, HierarchyTable};

/// An employee with its expanded reporting subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgNode<'a> {
    /// The employee at this node.
    pub employee: &'a Employee,
    /// Expanded direct reports, in `directReports` order.
    pub children: Vec<OrgNode<'a>>,
}

impl OrgNode<'_> {
    /// Number of nodes in this subtree, including the node itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(OrgNode::size).sum::<usize>()
    }

    /// Depth-first pre-order list of `(depth, employee)` pairs.
    pub fn flatten(&self) -> Vec<(usize, &Employee)> {
        let mut out = Vec::new();
        self.flatten_into(0, &mut out);
        out
    }

    fn flatten_into<'s>(&'s self, depth: usize, out: &mut Vec<(usize, &'s Employee)>) {
        out.push((depth, self.employee));
        for child in &self.children {
            child.flatten_into(depth + 1, out);
        }
    }
}

/// An employee together with its manager and direct reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeDetail<'a> {
    /// The selected employee.
    pub employee: &'a Employee,
    /// Its manager, if any.
    pub manager: Option<&'a Employee>,
    /// Its direct reports.
    pub direct_reports: Vec<&'a Employee>,
}

/// One page of the employee table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    /// Zero-based index of the page actually returned.
    pub index: usize,
    /// Rows on this page.
    pub items: Vec<&'a Employee>,
    /// Total number of employees.
    pub total: usize,
    /// Number of pages (at least 1).
    pub page_count: usize,
}

fn expand<'a>(
    table: &'a HierarchyTable,
    employee: &'a Employee,
    path: &mut BTreeSet<&'a EmployeeId>,
) -> OrgNode<'a> {
    path.insert(&employee.id);
    let children = employee
        .direct_reports
        .iter()
        .filter(|id| !path.contains(id))
        .filter_map(|id| table.get(id.as_str()))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|child| expand(table, child, path))
        .collect();
    path.remove(&employee.id);
    OrgNode { employee, children }
}

/// Full organization tree rooted at the first employee without a manager.
pub fn organization_tree(table: &HierarchyTable) -> Option<OrgNode<'_>> {
    let root = table.root()?;
    Some(expand(table, root, &mut BTreeSet::new()))
}

/// Subtree rooted at `id`.
pub fn subtree<'a>(table: &'a HierarchyTable, id: &str) -> Option<OrgNode<'a>> {
    let employee = table.get(id)?;
    Some(expand(table, employee, &mut BTreeSet::new()))
}

/// Breadcrumb trail from the top of the chain down to `id` (inclusive).
///
/// Stops at a missing manager or at the first repeated id.
pub fn ancestor_chain<'a>(table: &'a HierarchyTable, id: &str) -> Vec<&'a Employee> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut current = table.get(id);
    while let Some(employee) = current {
        if !seen.insert(&employee.id) {
            break;
        }
        chain.push(employee);
        current = employee
            .manager_id
            .as_ref()
            .and_then(|m| table.get(m.as_str()));
    }
    chain.reverse();
    chain
}

/// Direct reports of `id`, skipping entries without a record.
pub fn direct_reports<'a>(table: &'a HierarchyTable, id: &str) -> Vec<&'a Employee> {
    table.get(id).map_or_else(Vec::new, |employee| {
        employee
            .direct_reports
            .iter()
            .filter_map(|r| table.get(r.as_str()))
            .collect()
    })
}

/// Employee, manager and reports for a selection; fails for an unknown id.
pub fn employee_detail<'a>(
    table: &'a HierarchyTable,
    id: &str,
) -> Result<EmployeeDetail<'a>, HierarchyError> {
    let employee = table
        .get(id)
        .ok_or_else(|| HierarchyError::NotFound(EmployeeId::new(id)))?;
    Ok(EmployeeDetail {
        employee,
        manager: employee
            .manager_id
            .as_ref()
            .and_then(|m| table.get(m.as_str())),
        direct_reports: direct_reports(table, id),
    })
}

/// Every id below `id`, transitively.
pub fn descendants(table: &HierarchyTable, id: &str) -> BTreeSet<EmployeeId> {
    let mut out = BTreeSet::new();
    let mut stack: Vec<&EmployeeId> = table
        .get(id)
        .map(|e| e.direct_reports.iter().collect())
        .unwrap_or_default();
    while let Some(next) = stack.pop() {
        if next.as_str() == id || !out.insert(next.clone()) {
            continue;
        }
        if let Some(e) = table.get(next.as_str()) {
            stack.extend(e.direct_reports.iter());
        }
    }
    out
}

/// Employees that `id` may report to without creating a cycle: everyone
/// except `id` itself and its transitive reports.
pub fn valid_manager_options<'a>(table: &'a HierarchyTable, id: &str) -> Vec<&'a Employee> {
    let excluded = descendants(table, id);
    table
        .iter()
        .filter(|e| e.id.as_str() != id && !excluded.contains(&e.id))
        .collect()
}

/// Page `index` of the employee table, `per_page` rows each, in creation order.
///
/// An index past the end clamps to the last page.
pub fn page(table: &HierarchyTable, index: usize, per_page: usize) -> Page<'_> {
    let per_page = per_page.max(1);
    let total = table.len();
    let page_count = total.div_ceil(per_page).max(1);
    let index = index.min(page_count - 1);
    let items = table
        .iter()
        .skip(index * per_page)
        .take(per_page)
        .collect();
    Page {
        index,
        items,
        total,
        page_count,
    }
}
