//! CommAlarm gating: a template form may only be submitted once every
//! configuration tab validates.

use crate::template::{FieldKind, TaskTemplate, TemplateField};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabStatus {
    pub key: String,
    pub label: String,
    pub valid: bool,
    pub issues: Vec<FieldIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// True when submit is enabled.
    pub ready: bool,
    pub tabs: Vec<TabStatus>,
}

impl GateReport {
    pub fn issue_count(&self) -> usize {
        self.tabs.iter().map(|t| t.issues.len()).sum()
    }

    pub fn blocking_tabs(&self) -> Vec<&str> {
        self.tabs
            .iter()
            .filter(|t| !t.valid)
            .map(|t| t.key.as_str())
            .collect()
    }
}

fn check_field(field: &TemplateField, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return field.required.then(|| "required".to_string());
    }
    if let Some(max) = field.max_len {
        let len = value.chars().count();
        if len > max {
            return Some(format!("must be at most {max} characters (got {len})"));
        }
    }
    match &field.kind {
        FieldKind::Text | FieldKind::LongText => None,
        FieldKind::Select { options } => (!options.iter().any(|o| o == value))
            .then(|| format!("must be one of: {}", options.join(", "))),
        FieldKind::Number { min, max } => match value.parse::<f64>() {
            Err(_) => Some("must be a number".to_string()),
            Ok(n) if !n.is_finite() => Some("must be a number".to_string()),
            Ok(n) if min.is_some_and(|m| n < m) => {
                Some(format!("must be at least {}", min.unwrap_or_default()))
            }
            Ok(n) if max.is_some_and(|m| n > m) => {
                Some(format!("must be at most {}", max.unwrap_or_default()))
            }
            Ok(_) => None,
        },
        FieldKind::Url => (!validate::is_http_url(value))
            .then(|| "must be an http(s) URL".to_string()),
        FieldKind::Email => validate::validate_email(value)
            .err()
            .map(|_| "must be a valid email".to_string()),
    }
}

/// Evaluate every tab of `template` against the submitted values.
pub fn gate(template: &TaskTemplate, values: &BTreeMap<String, String>) -> GateReport {
    let tabs: Vec<TabStatus> = template
        .tabs
        .iter()
        .map(|tab| {
            let issues: Vec<FieldIssue> = tab
                .fields
                .iter()
                .filter_map(|field| {
                    check_field(field, values.get(&field.key).map(String::as_str)).map(
                        |message| FieldIssue {
                            field: field.key.clone(),
                            message,
                        },
                    )
                })
                .collect();
            TabStatus {
                key: tab.key.clone(),
                label: tab.label.clone(),
                valid: issues.is_empty(),
                issues,
            }
        })
        .collect();
    GateReport {
        ready: tabs.iter().all(|t| t.valid),
        tabs,
    }
}
