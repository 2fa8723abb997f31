//! Structural gates run before any transform.
//!
//! Every check is fail-closed: unreadable files, unparseable documents and
//! schema mismatches all produce a failed [`CheckReport`] instead of an
//! error. A failed report halts the transform for its data category only.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extract::{IntertieField, LoadQuantity, INTERTIE_LAYOUT, LOAD_LAYOUT};
use crate::report_xml::{read_document, XmlElement};
use crate::reshape::{canonical_output_columns, wide_reader, OUTPUT_COLUMN_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    OutputColumns,
    IntertieStructure,
    LoadStructure,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutputColumns => "output_columns",
            Self::IntertieStructure => "intertie_structure",
            Self::LoadStructure => "load_structure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    SourceFileUnavailable {
        message: String,
    },
    Unparseable {
        message: String,
    },
    UnexpectedColumnSchema {
        column_count: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
        duplicated: Vec<String>,
    },
    MissingRequiredElement {
        element: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceFileUnavailable { message } => write!(f, "file unavailable ({message})"),
            Self::Unparseable { message } => write!(f, "unparseable ({message})"),
            Self::UnexpectedColumnSchema {
                column_count,
                missing,
                unexpected,
                duplicated,
            } => write!(
                f,
                "expected {OUTPUT_COLUMN_COUNT} columns, found {column_count}; \
                 missing={missing:?} unexpected={unexpected:?} duplicated={duplicated:?}"
            ),
            Self::MissingRequiredElement { element } => {
                write!(f, "missing required element {element}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub check: CheckKind,
    pub file: String,
    pub reason: FailureReason,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {}: {}",
            self.check.as_str(),
            self.file,
            self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub check: CheckKind,
    pub files_checked: usize,
    pub failures: Vec<CheckFailure>,
}

impl CheckReport {
    fn new(check: CheckKind) -> Self {
        Self {
            check,
            files_checked: 0,
            failures: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, file: &str, reason: FailureReason) {
        let failure = CheckFailure {
            check: self.check,
            file: file.to_string(),
            reason,
        };
        warn!(
            component = "validation",
            event = "validation.check.failed",
            check = self.check.as_str(),
            file,
            reason = %failure.reason
        );
        self.failures.push(failure);
    }

    fn finish(self) -> Self {
        info!(
            component = "validation",
            event = "validation.check.finish",
            check = self.check.as_str(),
            files_checked = self.files_checked,
            passed = self.passed(),
            failures = self.failures.len()
        );
        self
    }
}

/// Compares a header row against the canonical 28-column wide layout.
pub fn check_output_header<S: AsRef<str>>(header: &[S]) -> Result<(), FailureReason> {
    let canonical = canonical_output_columns();
    let allowed: HashSet<&str> = canonical.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let mut duplicated = Vec::new();
    let mut unexpected = Vec::new();
    for name in header {
        let name = name.as_ref();
        if !seen.insert(name) {
            duplicated.push(name.to_string());
        }
        if !allowed.contains(name) {
            unexpected.push(name.to_string());
        }
    }
    let missing: Vec<String> = canonical
        .iter()
        .filter(|name| !seen.contains(name.as_str()))
        .cloned()
        .collect();

    if header.len() == OUTPUT_COLUMN_COUNT && unexpected.is_empty() && duplicated.is_empty() {
        Ok(())
    } else {
        Err(FailureReason::UnexpectedColumnSchema {
            column_count: header.len(),
            missing,
            unexpected,
            duplicated,
        })
    }
}

pub fn check_output_columns(path: &Path) -> CheckReport {
    let mut report = CheckReport::new(CheckKind::OutputColumns);
    let file = file_label(path);
    report.files_checked = 1;

    match fs::read_to_string(path) {
        Err(err) => report.fail(
            &file,
            FailureReason::SourceFileUnavailable {
                message: err.to_string(),
            },
        ),
        Ok(source) => {
            let mut reader = wide_reader(&source);
            match reader.headers() {
                Err(err) => report.fail(
                    &file,
                    FailureReason::Unparseable {
                        message: err.to_string(),
                    },
                ),
                Ok(headers) => {
                    let header: Vec<&str> = headers.iter().collect();
                    if let Err(reason) = check_output_header(&header) {
                        report.fail(&file, reason);
                    }
                }
            }
        }
    }

    report.finish()
}

/// Intertie leaves no schedule entry under Totals/Schedules carries.
pub fn missing_intertie_fields(root: &XmlElement) -> Vec<IntertieField> {
    IntertieField::ALL
        .into_iter()
        .filter(|field| !INTERTIE_LAYOUT.has_field(root, *field))
        .collect()
}

/// Load quantities no hourly block carries.
pub fn missing_load_quantities(root: &XmlElement) -> Vec<LoadQuantity> {
    LoadQuantity::ALL
        .into_iter()
        .filter(|quantity| !LOAD_LAYOUT.has_quantity(root, *quantity))
        .collect()
}

pub fn check_intertie_files(dir: &Path, file_names: &[String]) -> CheckReport {
    check_documents(CheckKind::IntertieStructure, dir, file_names, |root| {
        if !root.contains(&INTERTIE_LAYOUT.schedules) {
            return vec![INTERTIE_LAYOUT.schedules.describe()];
        }
        missing_intertie_fields(root)
            .into_iter()
            .map(|field| field.element_name().to_string())
            .collect()
    })
}

pub fn check_load_files(dir: &Path, file_names: &[String]) -> CheckReport {
    check_documents(CheckKind::LoadStructure, dir, file_names, |root| {
        if !root.contains(&LOAD_LAYOUT.hourly_blocks) {
            return vec![LOAD_LAYOUT.hourly_blocks.describe()];
        }
        missing_load_quantities(root)
            .into_iter()
            .map(|quantity| format!("MQ[MarketQuantity=\"{}\"]", quantity.label()))
            .collect()
    })
}

fn check_documents(
    check: CheckKind,
    dir: &Path,
    file_names: &[String],
    missing: impl Fn(&XmlElement) -> Vec<String>,
) -> CheckReport {
    let mut report = CheckReport::new(check);

    for name in file_names {
        report.files_checked += 1;
        let path = dir.join(name);
        if !path.is_file() {
            report.fail(
                name,
                FailureReason::SourceFileUnavailable {
                    message: format!("{} does not exist", path.display()),
                },
            );
            continue;
        }

        match read_document(&path) {
            Err(err) => report.fail(
                name,
                FailureReason::Unparseable {
                    message: err.to_string(),
                },
            ),
            Ok(root) => {
                for element in missing(&root) {
                    report.fail(name, FailureReason::MissingRequiredElement { element });
                }
            }
        }
    }

    report.finish()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
