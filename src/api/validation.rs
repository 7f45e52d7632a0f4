//! Field validation for ingested payloads
//!
//! Serde checks the shape of the body; the ranges below are checked here so a
//! rejected payload gets a message naming the offending field. Nothing that
//! fails these checks reaches the store.

use std::fmt;

use crate::{IngestPayload, parse_timestamp};

pub const MAX_HOSTNAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl ToString, message: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn percent(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("must be between 0 and 100, got {value}"),
        ))
    }
}

fn positive(field: &str, value: u64) -> Result<(), ValidationError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be greater than 0"))
    }
}

fn hostname(field: &str, value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if (1..=MAX_HOSTNAME_LEN).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("length must be between 1 and {MAX_HOSTNAME_LEN} characters"),
        ))
    }
}

/// Check every range constraint of an ingest payload
pub fn validate_payload(payload: &IngestPayload) -> Result<(), ValidationError> {
    let metrics = &payload.metrics;

    hostname("hostname", &payload.hostname)?;
    hostname("metrics.hostname", &metrics.hostname)?;

    if parse_timestamp(&metrics.timestamp).is_none() {
        return Err(ValidationError::new(
            "metrics.timestamp",
            format!("invalid timestamp format: {}", metrics.timestamp),
        ));
    }

    percent("metrics.cpu.percent", metrics.cpu.percent)?;
    positive("metrics.cpu.count", metrics.cpu.count as u64)?;
    positive("metrics.cpu.count_logical", metrics.cpu.count_logical as u64)?;
    if let Some(load) = metrics.cpu.load_avg
        && load.iter().any(|value| !value.is_finite() || *value < 0.0)
    {
        return Err(ValidationError::new(
            "metrics.cpu.load_avg",
            "values must be finite and non-negative",
        ));
    }

    positive("metrics.memory.total", metrics.memory.total)?;
    percent("metrics.memory.percent", metrics.memory.percent)?;
    percent("metrics.swap.percent", metrics.swap.percent)?;

    for (i, disk) in metrics.disk.iter().enumerate() {
        positive(&format!("metrics.disk[{i}].total"), disk.total)?;
        percent(&format!("metrics.disk[{i}].percent"), disk.percent)?;
    }

    for (i, process) in metrics.top_processes.iter().flatten().enumerate() {
        if !process.cpu_percent.is_finite() || process.cpu_percent < 0.0 {
            return Err(ValidationError::new(
                format!("metrics.top_processes[{i}].cpu_percent"),
                "must be finite and non-negative",
            ));
        }
        percent(
            &format!("metrics.top_processes[{i}].memory_percent"),
            process.memory_percent,
        )?;
    }

    Ok(())
}
