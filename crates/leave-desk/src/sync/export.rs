use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use super::{HrSnapshot, HrSource, SyncError};

const DEPARTMENTS: &str = "departments.csv";
const EMPLOYEES: &str = "employees.csv";
const ENTITLEMENTS: &str = "entitlements.csv";
const HOLIDAYS: &str = "holidays.csv";

/// Directory holding the HR system's CSV export. Departments and employees are
/// required; entitlements and holidays may be absent.
#[derive(Debug, Clone)]
pub struct CsvExportSource {
    dir: PathBuf,
}

impl CsvExportSource {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn required<T: DeserializeOwned>(&self, file: &'static str) -> Result<Vec<T>, SyncError> {
        let path = self.dir.join(file);
        let reader = File::open(&path).map_err(|source| SyncError::Io { path, source })?;
        parse_rows(reader, file)
    }

    fn optional<T: DeserializeOwned>(&self, file: &'static str) -> Result<Vec<T>, SyncError> {
        let path = self.dir.join(file);
        match File::open(&path) {
            Ok(reader) => parse_rows(reader, file),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(SyncError::Io { path, source }),
        }
    }
}

impl HrSource for CsvExportSource {
    fn snapshot(&self) -> Result<HrSnapshot, SyncError> {
        Ok(HrSnapshot {
            departments: self.required(DEPARTMENTS)?,
            employees: self.required(EMPLOYEES)?,
            entitlements: self.optional(ENTITLEMENTS)?,
            holidays: self.optional(HOLIDAYS)?,
        })
    }
}

pub(crate) fn parse_rows<T, R>(reader: R, file: &'static str) -> Result<Vec<T>, SyncError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| SyncError::Csv { file, source })
}

pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{EmployeeRow, EntitlementRow};

    #[test]
    fn blank_optional_columns_become_none() {
        let csv = "\
employee_id,first_name,last_name,email,department_code,role,manager_email,status,calendar_id
E-1, Ana ,Ruiz,ana@example.com,ENG,employee,,active,
";
        let rows: Vec<EmployeeRow> = parse_rows(csv.as_bytes(), EMPLOYEES).expect("valid csv");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Ana");
        assert_eq!(rows[0].department_code.as_deref(), Some("ENG"));
        assert_eq!(rows[0].manager_email, None);
        assert_eq!(rows[0].calendar_id, None);
    }

    #[test]
    fn malformed_numbers_name_the_file() {
        let csv = "employee_id,year,total_days\nE-1,2025,lots\n";
        let error = parse_rows::<EntitlementRow, _>(csv.as_bytes(), ENTITLEMENTS)
            .expect_err("total_days is not a number");
        assert!(error.to_string().contains(ENTITLEMENTS));
    }
}
