//! Field validation for submitted forms.
//!
//! A [`Validator`] collects every failing rule of a request before anything
//! is mutated, so the caller sees all field errors at once.

use chrono::{NaiveDate, NaiveTime};
use lettre::Address;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::{AppError, AppResult},
    upload::{ImageRule, UploadedFile},
};

/// Error messages keyed by field name (`students.0.name` for list entries).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// "staff_coordinator_email" -> "staff coordinator email"
pub fn label(field: &str) -> String {
    field.replace('_', " ")
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(field)
    }

    pub fn required_string(
        &mut self,
        field: &str,
        value: Option<String>,
        max: Option<usize>,
    ) -> Option<String> {
        match value {
            Some(value) => self.optional_string(field, Some(value), max),
            None => {
                self.fail(field, format!("The {} field is required.", label(field)));
                None
            }
        }
    }

    pub fn optional_string(
        &mut self,
        field: &str,
        value: Option<String>,
        max: Option<usize>,
    ) -> Option<String> {
        let value = value?;
        if let Some(max) = max {
            if value.chars().count() > max {
                self.fail(
                    field,
                    format!(
                        "The {} must not be greater than {max} characters.",
                        label(field)
                    ),
                );
                return None;
            }
        }
        Some(value)
    }

    pub fn required_email(
        &mut self,
        field: &str,
        value: Option<String>,
        max: Option<usize>,
    ) -> Option<String> {
        if value.is_none() {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        }
        self.optional_email(field, value, max)
    }

    pub fn optional_email(
        &mut self,
        field: &str,
        value: Option<String>,
        max: Option<usize>,
    ) -> Option<String> {
        let value = self.optional_string(field, value, max)?;
        if value.parse::<Address>().is_err() {
            self.fail(
                field,
                format!("The {} must be a valid email address.", label(field)),
            );
            return None;
        }
        Some(value)
    }

    pub fn required_integer(&mut self, field: &str, value: Option<String>) -> Option<i32> {
        if value.is_none() {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        }
        self.optional_integer(field, value)
    }

    pub fn optional_integer(&mut self, field: &str, value: Option<String>) -> Option<i32> {
        let value = value?;
        match value.parse::<i32>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.fail(field, format!("The {} must be an integer.", label(field)));
                None
            }
        }
    }

    pub fn required_date(&mut self, field: &str, value: Option<String>) -> Option<NaiveDate> {
        let Some(value) = value else {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        };
        match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.fail(field, format!("The {} is not a valid date.", label(field)));
                None
            }
        }
    }

    pub fn required_time(&mut self, field: &str, value: Option<String>) -> Option<NaiveTime> {
        let Some(value) = value else {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        };
        match NaiveTime::parse_from_str(&value, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M"))
        {
            Ok(time) => Some(time),
            Err(_) => {
                self.fail(field, format!("The {} is not a valid time.", label(field)));
                None
            }
        }
    }

    pub fn required_image(
        &mut self,
        field: &str,
        file: Option<UploadedFile>,
        rule: &ImageRule,
    ) -> Option<UploadedFile> {
        if file.is_none() {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        }
        self.optional_image(field, file, rule)
    }

    pub fn optional_image(
        &mut self,
        field: &str,
        file: Option<UploadedFile>,
        rule: &ImageRule,
    ) -> Option<UploadedFile> {
        let file = file?;
        let problems = rule.check(field, &file);
        if problems.is_empty() {
            return Some(file);
        }
        for problem in problems {
            self.fail(field, problem);
        }
        None
    }

    /// Aborts the request with every collected error.
    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(self.errors))
        }
    }
}
