// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Text rendering for terminal output.

use std::fmt::Write as _;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use org_chart_core::bookmarks::BookmarkSet;
use org_chart_core::notice::{NoticeKind, NoticeView};
use org_chart_core::projection::{EmployeeDetail, OrgNode};
use org_chart_core::{Employee, HierarchyTable, KeyValueStore, OrgChart};
use time::format_description::well_known::Rfc3339;

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn manager_name<'a>(table: &'a HierarchyTable, employee: &Employee) -> &'a str {
    employee
        .manager_id
        .as_ref()
        .and_then(|m| table.get(m.as_str()))
        .map_or("-", |m| m.name.as_str())
}

pub fn notice(notice: &NoticeView) {
    let level = match notice.kind {
        NoticeKind::Info => "info",
        NoticeKind::Warn => "warning",
        NoticeKind::Error => "error",
    };
    eprintln!("{level}: {}", notice.message);
}

pub fn employee_table(table: &HierarchyTable, rows: &[&Employee]) -> Table {
    let mut out = new_table(&["ID", "Name", "Designation", "Email", "Phone", "Manager"]);
    for e in rows {
        out.add_row(vec![
            e.id.as_str(),
            e.name.as_str(),
            e.designation.as_str(),
            e.email.as_str(),
            e.phone.as_str(),
            manager_name(table, e),
        ]);
    }
    out
}

pub fn tree(node: &OrgNode<'_>) -> String {
    let mut out = String::new();
    for (depth, e) in node.flatten() {
        let _ = writeln!(
            out,
            "{}{} ({}) [{}]",
            "  ".repeat(depth),
            e.name,
            e.designation,
            e.id
        );
    }
    out
}

pub fn detail(detail: &EmployeeDetail<'_>) -> Result<String> {
    let e = detail.employee;
    let mut out = String::new();
    writeln!(out, "id:          {}", e.id)?;
    writeln!(out, "name:        {}", e.name)?;
    writeln!(out, "designation: {}", e.designation)?;
    writeln!(out, "email:       {}", e.email)?;
    writeln!(out, "phone:       {}", e.phone)?;
    match detail.manager {
        Some(m) => writeln!(out, "manager:     {} [{}]", m.name, m.id)?,
        None => writeln!(out, "manager:     -")?,
    }
    writeln!(out, "created:     {}", e.created_at.format(&Rfc3339)?)?;
    writeln!(out, "updated:     {}", e.updated_at.format(&Rfc3339)?)?;
    writeln!(out, "reports:     {}", detail.direct_reports.len())?;
    for r in &detail.direct_reports {
        writeln!(out, "  - {} [{}]", r.name, r.id)?;
    }
    Ok(out)
}

pub fn bookmark_table(bookmarks: &BookmarkSet, table: &HierarchyTable) -> Table {
    let mut out = new_table(&["Key", "Employee", "Saved (ms)", "State"]);
    for (key, mark) in bookmarks.iter() {
        let employee = table.get(key).map_or("-", |e| e.name.as_str());
        let state = mark
            .state
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string);
        out.add_row(vec![
            key.to_owned(),
            employee.to_owned(),
            mark.timestamp.to_string(),
            state,
        ]);
    }
    out
}

pub fn status<S: KeyValueStore>(chart: &OrgChart<S>) -> Result<String> {
    let persistence = chart.persistence();
    let last_saved = match persistence.last_saved {
        Some(at) => at.format(&Rfc3339)?,
        None => "never".to_owned(),
    };
    let mut out = String::new();
    writeln!(out, "employees:         {}", chart.table().len())?;
    writeln!(out, "version:           {}", chart.table().version())?;
    writeln!(out, "bookmarks:         {}", chart.bookmarks().len())?;
    writeln!(out, "designations:      {}", chart.designations().titles().len())?;
    writeln!(out, "storage available: {}", chart.storage_available())?;
    writeln!(out, "last saved:        {last_saved}")?;
    writeln!(out, "unsaved changes:   {}", chart.has_unsaved_changes())?;
    if let Some(err) = &persistence.last_error {
        writeln!(out, "last error:        {err}")?;
    }
    writeln!(out, "view:              {}", chart.view_mode())?;
    writeln!(out, "theme:             {}", chart.theme())?;
    Ok(out)
}
