use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path prefix under which every grade-scoped resource lives.
pub const GRADE_PATH_PREFIX: &str = "/grade/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradeError {
    #[error("grade {0} outside supported range {min}..={max}", min = Grade::MIN, max = Grade::MAX)]
    OutOfRange(i64),
    #[error("grade value {0:?} is not numeric")]
    NotNumeric(String),
    #[error("path {0:?} does not address a grade resource")]
    NotGradePath(String),
}

/// School grade a piece of content is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 6;
    pub const MAX: u8 = 12;

    pub fn new(value: i64) -> Result<Self, GradeError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(GradeError::OutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Grade> {
        (Self::MIN..=Self::MAX).map(Grade)
    }

    /// Root of this grade's content, e.g. `/grade/6`.
    pub fn root_path(self) -> String {
        format!("{GRADE_PATH_PREFIX}{}", self.0)
    }

    /// Label of the action that takes a viewer to this grade's content.
    pub fn content_label(self) -> String {
        format!("{self} Content")
    }

    /// Extract the grade from a resource path such as `/grade/9`.
    ///
    /// Used while wiring routes, so any failure here is a configuration error.
    pub fn from_resource_path(path: &str) -> Result<Self, GradeError> {
        let segment = path
            .trim_end_matches('/')
            .strip_prefix(GRADE_PATH_PREFIX)
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .ok_or_else(|| GradeError::NotGradePath(path.to_string()))?;
        segment.parse()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade {}", self.0)
    }
}

impl FromStr for Grade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| GradeError::NotNumeric(trimmed.to_string()))?;
        Grade::new(value)
    }
}

impl TryFrom<i64> for Grade {
    type Error = GradeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Grade::new(value)
    }
}

impl From<Grade> for i64 {
    fn from(value: Grade) -> Self {
        i64::from(value.0)
    }
}
