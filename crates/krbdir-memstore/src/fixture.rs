//! Fixture loading.
//!
//! A fixture is a comma-separated text file with one header line followed by records of
//! `name,secret,policy,attributes,modifiedBy,modifiedAt`. Only the name is required.

use chrono::{DateTime, Utc};
use krbdir_core::{Error, PrincipalFlags};
use std::io::{self, BufRead};
use std::path::PathBuf;
use thiserror::Error;

const COLUMNS: usize = 6;

/// Errors raised while loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture file could not be opened.
    #[error("cannot open fixture {}: {source}", path.display())]
    Open {
        /// Fixture path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading the fixture failed part-way.
    #[error("cannot read fixture: {0}")]
    Io(#[from] io::Error),

    /// A line could not be parsed.
    #[error("fixture line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// The fixture holds no records.
    #[error("fixture contains no principals")]
    Empty,
}

impl From<FixtureError> for Error {
    fn from(err: FixtureError) -> Self {
        match err {
            FixtureError::Open { .. } | FixtureError::Io(_) => {
                Self::ConfigurationError(err.to_string())
            }
            FixtureError::Parse { .. } | FixtureError::Empty => Self::BadData(err.to_string()),
        }
    }
}

/// One parsed fixture line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FixtureRecord {
    pub(crate) line: usize,
    pub(crate) name: String,
    pub(crate) secret: Option<String>,
    pub(crate) policy: Option<String>,
    pub(crate) attributes: PrincipalFlags,
    pub(crate) modified_by: Option<String>,
    pub(crate) modified_at: Option<DateTime<Utc>>,
}

/// Reads at most `capacity` records; anything after that is ignored. Blank lines are skipped.
pub(crate) fn read_fixture(
    reader: impl BufRead,
    capacity: usize,
) -> Result<Vec<FixtureRecord>, FixtureError> {
    let mut lines = reader.lines();
    if lines.next().transpose()?.is_none() {
        return Err(FixtureError::Parse {
            line: 1,
            message: "missing header".to_string(),
        });
    }

    let mut records = Vec::new();
    for (index, line) in lines.enumerate() {
        if records.len() >= capacity {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(index + 2, line.trim_end_matches('\r'))?);
    }

    if records.is_empty() {
        return Err(FixtureError::Empty);
    }
    Ok(records)
}

fn parse_line(line: usize, text: &str) -> Result<FixtureRecord, FixtureError> {
    let columns = text.split(',').take(COLUMNS).collect::<Vec<_>>();
    let column = |index: usize| {
        columns
            .get(index)
            .copied()
            .filter(|value| !value.is_empty())
    };
    let parse_error = |message: String| FixtureError::Parse { line, message };

    let name = column(0).ok_or_else(|| parse_error("missing principal name".to_string()))?;

    let attributes = column(3)
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|err| parse_error(format!("invalid attributes `{value}`: {err}")))
        })
        .transpose()?
        .map_or_else(PrincipalFlags::empty, PrincipalFlags::from_bits_retain);

    let modified_at = match column(5) {
        None => None,
        Some(value) => {
            let seconds = value
                .parse::<i64>()
                .map_err(|err| parse_error(format!("invalid modifiedAt `{value}`: {err}")))?;
            if seconds == 0 {
                None
            } else {
                Some(DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                    parse_error(format!("modifiedAt `{value}` is out of range"))
                })?)
            }
        }
    };

    Ok(FixtureRecord {
        line,
        name: name.to_string(),
        secret: column(1).map(str::to_string),
        policy: column(2).map(str::to_string),
        attributes,
        modified_by: column(4).map(str::to_string),
        modified_at,
    })
}
