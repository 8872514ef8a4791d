//! services/bot/src/adapters/employee_directory.rs
//!
//! This module contains the CSV-backed employee directory, the concrete implementation
//! of the `EmployeeDirectoryService` port. Records are held in memory and only replaced
//! wholesale by a reload.

use async_trait::async_trait;
use feedback_desk_core::domain::{DirectorySummary, Employee, UNSPECIFIED_DEPARTMENT};
use feedback_desk_core::ports::{EmployeeDirectoryService, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const REQUIRED_COLUMNS: [&str; 4] = ["name", "department", "role", "email"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An in-memory employee directory loaded from a CSV file.
///
/// Reloads and queries share one mutex, so a query never observes a half-swapped list.
pub struct EmployeeDirectory {
    path: PathBuf,
    state: Mutex<DirectoryState>,
}

#[derive(Default)]
struct DirectoryState {
    employees: Vec<Employee>,
    loaded: bool,
}

impl EmployeeDirectory {
    /// Creates a directory for the given source. Nothing is read until the first query
    /// or an explicit reload.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(DirectoryState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the source if it has never been loaded. Later calls serve whatever the
    /// last reload produced, however old.
    pub async fn ensure_loaded(&self) -> PortResult<()> {
        let mut state = self.state.lock().await;
        if !state.loaded {
            self.reload_locked(&mut state).await?;
        }
        Ok(())
    }

    /// Parses the full source and swaps it in. The previous list survives any failure
    /// except a missing file, which empties the directory.
    async fn reload_locked(&self, state: &mut DirectoryState) -> PortResult<usize> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("Employee data file not found: {}", self.path.display());
                state.employees.clear();
                state.loaded = true;
                return Ok(0);
            }
            Err(e) => {
                error!("Failed to read employee data {}: {}", self.path.display(), e);
                return Err(PortError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let employees = parse_employees(&raw).map_err(|e| {
            error!("Failed to load employee data from {}: {}", self.path.display(), e);
            e
        })?;

        let count = employees.len();
        state.employees = employees;
        state.loaded = true;
        info!("Loaded {} employees from {}", count, self.path.display());
        Ok(count)
    }

    /// Clones up to `limit` employees accepted by `predicate`, in load order.
    async fn matching<F>(&self, limit: usize, predicate: F) -> PortResult<Vec<Employee>>
    where
        F: Fn(&Employee) -> bool,
    {
        self.ensure_loaded().await?;
        let state = self.state.lock().await;
        Ok(state
            .employees
            .iter()
            .filter(|employee| predicate(employee))
            .take(limit)
            .cloned()
            .collect())
    }
}

//=========================================================================================
// CSV Parsing
//=========================================================================================

fn parse_employees(raw: &[u8]) -> PortResult<Vec<Employee>> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw);

    let headers = reader
        .headers()
        .map_err(|e| PortError::Unexpected(format!("unreadable employee header: {}", e)))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|&&name| column(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(PortError::MissingColumns(missing));
    }
    // Every lookup succeeded above.
    let [name_idx, department_idx, role_idx, email_idx] =
        REQUIRED_COLUMNS.map(|name| column(name).unwrap_or_default());

    let mut employees = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| PortError::Unexpected(format!("malformed employee row: {}", e)))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();

        let employee = Employee {
            name: cell(name_idx),
            department: cell(department_idx),
            role: cell(role_idx),
            email: cell(email_idx),
        };
        if employee.name.is_empty() || employee.email.is_empty() {
            // +2: one for the header, one because rows are 1-based for humans.
            warn!(
                "Skipping employee row {} due to missing name/email: {:?}",
                row + 2,
                record
            );
            continue;
        }
        employees.push(employee);
    }

    Ok(employees)
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

//=========================================================================================
// `EmployeeDirectoryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmployeeDirectoryService for EmployeeDirectory {
    async fn reload(&self) -> PortResult<usize> {
        let mut state = self.state.lock().await;
        self.reload_locked(&mut state).await
    }

    async fn summarize(&self) -> PortResult<DirectorySummary> {
        self.ensure_loaded().await?;
        let state = self.state.lock().await;

        let mut summary = DirectorySummary {
            total: state.employees.len(),
            ..Default::default()
        };
        for employee in &state.employees {
            let department = if employee.department.is_empty() {
                UNSPECIFIED_DEPARTMENT.to_string()
            } else {
                employee.department.clone()
            };
            *summary.per_department.entry(department).or_insert(0) += 1;
        }
        Ok(summary)
    }

    async fn search(&self, query: &str, limit: usize) -> PortResult<Vec<Employee>> {
        let needle = query.to_lowercase();
        self.matching(limit, |e| {
            contains_ignore_case(&e.name, &needle) || contains_ignore_case(&e.role, &needle)
        })
        .await
    }

    async fn by_department(&self, department: &str, limit: usize) -> PortResult<Vec<Employee>> {
        let needle = department.to_lowercase();
        self.matching(limit, |e| contains_ignore_case(&e.department, &needle))
            .await
    }

    async fn find_email(&self, name_query: &str) -> PortResult<Vec<Employee>> {
        let needle = name_query.to_lowercase();
        self.matching(usize::MAX, |e| contains_ignore_case(&e.name, &needle))
            .await
    }
}
