//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use std::str::FromStr;

use serde::Serialize;
use tcd_core::{Codec, HwAccel, JobId, JobStatus};

/// Map a domain-enum parse failure onto the rusqlite conversion error for
/// the offending column.
fn parse_enum<T: FromStr>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_opt_enum<T: FromStr>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => v.parse::<T>().map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        }),
        None => Ok(None),
    }
}

/// A persisted encoding job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    pub input_path: String,
    pub output_path: String,
    pub codec: Codec,
    pub quality: u32,
    /// Whether hardware encoding was requested at submission.
    pub requested_hw: bool,
    /// Backend actually used, resolved when the job starts.
    pub hw_kind: Option<HwAccel>,
    pub auto_delete_source: bool,
    pub status: JobStatus,
    pub progress: f64,
    pub input_size: Option<i64>,
    pub output_size: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl Job {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: JobId::new(row.get(0)?),
            filename: row.get(1)?,
            input_path: row.get(2)?,
            output_path: row.get(3)?,
            codec: parse_enum(row, 4)?,
            quality: row.get::<_, i64>(5)? as u32,
            requested_hw: row.get::<_, i64>(6)? != 0,
            hw_kind: parse_opt_enum(row, 7)?,
            auto_delete_source: row.get::<_, i64>(8)? != 0,
            status: parse_enum(row, 9)?,
            progress: row.get(10)?,
            input_size: row.get(11)?,
            output_size: row.get(12)?,
            error_message: row.get(13)?,
            created_at: row.get(14)?,
            started_at: row.get(15)?,
            completed_at: row.get(16)?,
        })
    }
}

/// Fields required to create a job; everything else starts at its default.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub filename: String,
    pub input_path: String,
    pub output_path: String,
    pub codec: Codec,
    pub quality: u32,
    pub requested_hw: bool,
    pub auto_delete_source: bool,
    pub input_size: Option<i64>,
}
