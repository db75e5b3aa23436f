// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `org-chart` command-line front end.
//!
//! Each invocation opens the chart from the data directory, runs one
//! command, flushes pending saves and exits.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use org_chart_core::prefs::{Theme, ViewMode};
use org_chart_core::{
    projection, Command, CommandOutcome, EmployeeId, EmployeePatch, NewEmployee, OrgChart,
    ReportingChange,
};
use org_chart_store_fs::FsStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage an organization chart from the terminal")]
struct Args {
    /// Directory holding the chart data (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Add an employee (an existing --id is replaced)
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Job title
        #[arg(long, default_value = "")]
        designation: String,
        /// Contact email
        #[arg(long, default_value = "")]
        email: String,
        /// Contact phone
        #[arg(long, default_value = "")]
        phone: String,
        /// Manager id; omit for a top-level employee
        #[arg(long)]
        manager: Option<String>,
        /// Explicit id; generated when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// Update contact fields of an employee
    Update {
        /// Employee id
        id: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New job title
        #[arg(long)]
        designation: Option<String>,
        /// New email
        #[arg(long)]
        email: Option<String>,
        /// New phone
        #[arg(long)]
        phone: Option<String>,
    },
    /// Delete an employee; its reports move up to its manager
    Delete {
        /// Employee id
        id: String,
    },
    /// Change who an employee reports to
    Reassign {
        /// Employee id
        id: String,
        /// New manager id; omit to make the employee top-level
        #[arg(long)]
        manager: Option<String>,
    },
    /// Paged employee table
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Rows per page (defaults to the stored setting)
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Reporting tree
    Tree {
        /// Only show the subtree under this employee
        #[arg(long)]
        root: Option<String>,
    },
    /// Breadcrumb chain from the top down to an employee
    Chain {
        /// Employee id
        id: String,
    },
    /// Employee details with manager and direct reports
    Show {
        /// Employee id
        id: String,
    },
    /// Toggle a bookmark, or save a named bookmark with --state
    Bookmark {
        /// Employee id or bookmark name
        key: String,
        /// JSON view state to store with a named bookmark
        #[arg(long)]
        state: Option<String>,
    },
    /// List bookmarks
    Bookmarks,
    /// Manage the designation catalog
    Designations {
        #[command(subcommand)]
        action: Option<DesignationCmd>,
    },
    /// Show or set the view mode (graph | grid)
    View {
        /// New view mode
        mode: Option<ViewMode>,
    },
    /// Show or set the theme (light | dark | toggle)
    Theme {
        /// New theme or `toggle`
        theme: Option<String>,
    },
    /// Storage and persistence status
    Status,
    /// Remove all stored chart data
    Clear {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DesignationCmd {
    /// List titles
    List,
    /// Add a title
    Add {
        /// Title
        title: String,
    },
    /// Remove a title
    Remove {
        /// Title
        title: String,
    },
    /// Rename a title in place
    Rename {
        /// Existing title
        from: String,
        /// Replacement title
        to: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let store = match &args.data_dir {
        Some(dir) => FsStore::with_base(dir)
            .with_context(|| format!("open data dir {}", dir.display()))?,
        None => FsStore::new().context("open platform data dir")?,
    };
    debug!(dir = %store.base().display(), "opening organization chart");

    let now = Instant::now();
    let mut chart = OrgChart::open(store, now);
    for notice in chart.notices(now) {
        render::notice(&notice);
    }

    run(&mut chart, args.cmd, now)?;

    if chart.has_unsaved_changes() {
        chart.flush().context("save organization chart")?;
    }
    Ok(())
}

fn run(chart: &mut OrgChart<FsStore>, cmd: Cmd, now: Instant) -> Result<()> {
    match cmd {
        Cmd::Add {
            name,
            designation,
            email,
            phone,
            manager,
            id,
        } => {
            let fields = NewEmployee {
                name,
                designation,
                email,
                phone,
                manager_id: manager.map(EmployeeId::from),
            };
            let outcome = chart.dispatch(
                Command::AddEmployee {
                    fields,
                    id: id.map(EmployeeId::from),
                },
                now,
            )?;
            if let CommandOutcome::Added(id) = outcome {
                println!("{id}");
            }
        }
        Cmd::Update {
            id,
            name,
            designation,
            email,
            phone,
        } => {
            let patch = EmployeePatch {
                name,
                designation,
                email,
                phone,
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one field");
            }
            let outcome = chart.dispatch(
                Command::UpdateEmployee {
                    id: id.clone().into(),
                    patch,
                },
                now,
            )?;
            if outcome == CommandOutcome::Updated(false) {
                bail!("employee not found: {id}");
            }
        }
        Cmd::Delete { id } => {
            let outcome = chart.dispatch(Command::DeleteEmployee { id: id.clone().into() }, now)?;
            match outcome {
                CommandOutcome::Deleted(Some(removed)) => {
                    println!(
                        "deleted {} ({} reports reassigned)",
                        removed.id,
                        removed.direct_reports.len()
                    );
                }
                _ => bail!("employee not found: {id}"),
            }
        }
        Cmd::Reassign { id, manager } => {
            let outcome = chart.dispatch(
                Command::ChangeReportingLine {
                    id: id.into(),
                    manager: manager.map(EmployeeId::from),
                },
                now,
            )?;
            if let CommandOutcome::Reassigned(change) = outcome {
                match change {
                    ReportingChange::Unchanged => println!("unchanged"),
                    ReportingChange::Moved { to: Some(to), .. } => println!("now reports to {to}"),
                    ReportingChange::Moved { to: None, .. } => println!("now top-level"),
                }
            }
        }
        Cmd::List { page, per_page } => {
            let per_page = per_page.unwrap_or(chart.settings().page_size);
            let page = projection::page(chart.table(), page.saturating_sub(1), per_page);
            println!("{}", render::employee_table(chart.table(), &page.items));
            println!(
                "page {} of {} ({} employees)",
                page.index + 1,
                page.page_count,
                page.total
            );
        }
        Cmd::Tree { root } => {
            let table = chart.table();
            let trees: Vec<_> = match root {
                Some(id) => vec![projection::subtree(table, &id)
                    .with_context(|| format!("employee not found: {id}"))?],
                None => table
                    .iter()
                    .filter(|e| e.is_root())
                    .filter_map(|e| projection::subtree(table, e.id.as_str()))
                    .collect(),
            };
            for tree in &trees {
                print!("{}", render::tree(tree));
            }
        }
        Cmd::Chain { id } => {
            let chain = projection::ancestor_chain(chart.table(), &id);
            if chain.is_empty() {
                bail!("employee not found: {id}");
            }
            let names: Vec<&str> = chain.iter().map(|e| e.name.as_str()).collect();
            println!("{}", names.join(" > "));
        }
        Cmd::Show { id } => {
            let detail = projection::employee_detail(chart.table(), &id)?;
            print!("{}", render::detail(&detail)?);
        }
        Cmd::Bookmark { key, state } => match state {
            Some(raw) => {
                let state: serde_json::Value =
                    serde_json::from_str(&raw).context("--state must be valid JSON")?;
                chart.gateway().save_bookmark(&key, Some(state))?;
                println!("saved bookmark {key}");
            }
            None => {
                let outcome = chart.dispatch(Command::ToggleBookmark { key: key.clone() }, now)?;
                if outcome == CommandOutcome::Bookmarked(true) {
                    println!("bookmarked {key}");
                } else {
                    println!("removed bookmark {key}");
                }
            }
        },
        Cmd::Bookmarks => {
            println!("{}", render::bookmark_table(chart.bookmarks(), chart.table()));
        }
        Cmd::Designations { action } => match action.unwrap_or(DesignationCmd::List) {
            DesignationCmd::List => {
                for title in chart.designations().titles() {
                    println!("{title}");
                }
            }
            DesignationCmd::Add { title } => {
                chart.dispatch(Command::AddDesignation { title }, now)?;
            }
            DesignationCmd::Remove { title } => {
                let outcome =
                    chart.dispatch(Command::RemoveDesignation { title: title.clone() }, now)?;
                if outcome == CommandOutcome::DesignationsChanged(false) {
                    bail!("designation not found: {title}");
                }
            }
            DesignationCmd::Rename { from, to } => {
                chart.dispatch(Command::RenameDesignation { from, to }, now)?;
            }
        },
        Cmd::View { mode } => match mode {
            Some(mode) => chart.set_view_mode(mode)?,
            None => println!("{}", chart.view_mode()),
        },
        Cmd::Theme { theme } => match theme.as_deref() {
            None => println!("{}", chart.theme()),
            Some("toggle") => {
                let next = chart.theme().toggled();
                chart.set_theme(next)?;
                println!("{next}");
            }
            Some(raw) => {
                let theme: Theme = raw.parse()?;
                chart.set_theme(theme)?;
            }
        },
        Cmd::Status => print!("{}", render::status(chart)?),
        Cmd::Clear { yes } => {
            if !yes {
                bail!("refusing to clear stored data without --yes");
            }
            chart.dispatch(Command::ClearStorage, now)?;
            println!("storage cleared");
        }
    }
    Ok(())
}
