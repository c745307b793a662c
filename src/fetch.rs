//! Batched row fetching from the source table.
//!
//! The export loop only depends on the [`BatchFetch`] trait; the MySQL
//! implementation lives here and the tests substitute an in-memory one.
//! Fetching is a plain point-in-time read: repeated calls with the same
//! `after_id` (and no intervening writes to the source) return identical
//! batches, which is what makes re-running after a crash safe.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::{prelude::*, Conn, Value};

/// Index of the unique, ascending row identifier in the source table.
pub const ID_COLUMN_INDEX: usize = 0;

/// Index of the timestamp column used for date partitioning.
pub const TIMESTAMP_COLUMN_INDEX: usize = 4;

/// One exported record: the decoded id and timestamp, plus every field of
/// the source row rendered verbatim for CSV output.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordRow {
    pub id: u64,
    pub timestamp: NaiveDateTime,
    pub fields: Vec<String>,
}

impl CoordRow {
    /// Calendar date of the row's timestamp, the partitioning key.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Source of id-ordered row batches.
#[async_trait]
pub trait BatchFetch {
    /// Fetch up to `limit` rows with id strictly greater than `after_id`,
    /// ascending by id. An empty batch means the source is exhausted.
    async fn fetch(&mut self, after_id: u64, limit: u64) -> Result<Vec<CoordRow>>;
}

/// MySQL-backed fetcher issuing `SELECT * ... WHERE id > ? ORDER BY id LIMIT ?`.
pub struct MysqlFetcher {
    conn: Conn,
    table: String,
}

impl MysqlFetcher {
    /// `table` must already be sanitized; it is interpolated into SQL text.
    pub fn new(conn: Conn, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }
}

#[async_trait]
impl BatchFetch for MysqlFetcher {
    async fn fetch(&mut self, after_id: u64, limit: u64) -> Result<Vec<CoordRow>> {
        let query = format!(
            "SELECT * FROM {} WHERE id > ? ORDER BY id LIMIT ?",
            self.table
        );

        let rows: Vec<mysql_async::Row> = self
            .conn
            .exec(query, (after_id, limit))
            .await
            .with_context(|| format!("failed to fetch batch after row id {after_id}"))?;

        rows.into_iter().map(decode_row).collect()
    }
}

/// Decode a raw MySQL row into a [`CoordRow`].
fn decode_row(row: mysql_async::Row) -> Result<CoordRow> {
    let values = row.unwrap();

    if values.len() <= TIMESTAMP_COLUMN_INDEX {
        bail!(
            "row has {} columns, need at least {}",
            values.len(),
            TIMESTAMP_COLUMN_INDEX + 1
        );
    }

    let id = value_to_id(&values[ID_COLUMN_INDEX])?;
    let timestamp = value_to_timestamp(&values[TIMESTAMP_COLUMN_INDEX])
        .with_context(|| format!("bad timestamp in row {id}"))?;
    let fields = values.iter().map(value_to_string).collect();

    Ok(CoordRow {
        id,
        timestamp,
        fields,
    })
}

fn value_to_id(value: &Value) -> Result<u64> {
    match value {
        Value::Int(i) if *i >= 0 => Ok(*i as u64),
        Value::UInt(u) => Ok(*u),
        Value::Bytes(b) => {
            let s = std::str::from_utf8(b).context("row id is not valid UTF-8")?;
            s.trim().parse().context("row id is not an integer")
        }
        other => bail!("row id column is not an integer: {other:?}"),
    }
}

fn value_to_timestamp(value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::Date(y, mo, d, h, mi, s, us) => {
            NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*mo), u32::from(*d))
                .and_then(|date| {
                    date.and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)
                })
                .ok_or_else(|| {
                    anyhow::anyhow!("invalid datetime {y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}")
                })
        }
        Value::Bytes(b) => {
            let s = std::str::from_utf8(b).context("timestamp is not valid UTF-8")?;
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .with_context(|| format!("cannot parse timestamp '{s}'"))
        }
        other => bail!("timestamp column is not a datetime: {other:?}"),
    }
}

/// Render a MySQL value the way it appears in `SELECT` text output, for
/// verbatim CSV fields. NULL becomes the empty string.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(y, mo, d, h, mi, s, 0) => {
            format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}")
        }
        Value::Date(y, mo, d, h, mi, s, us) => {
            format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}.{us:06}")
        }
        Value::Time(neg, days, h, mi, s, 0) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u32::from(*days) * 24 + u32::from(*h);
            format!("{sign}{hours:02}:{mi:02}:{s:02}")
        }
        Value::Time(neg, days, h, mi, s, us) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u32::from(*days) * 24 + u32::from(*h);
            format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_int_uint_and_bytes() {
        assert_eq!(value_to_id(&Value::Int(42)).unwrap(), 42);
        assert_eq!(value_to_id(&Value::UInt(42)).unwrap(), 42);
        assert_eq!(value_to_id(&Value::Bytes(b"42".to_vec())).unwrap(), 42);
        assert!(value_to_id(&Value::Int(-1)).is_err());
        assert!(value_to_id(&Value::NULL).is_err());
    }

    #[test]
    fn timestamp_from_date_value() {
        let ts = value_to_timestamp(&Value::Date(2013, 10, 3, 14, 30, 5, 0)).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2013, 10, 3).unwrap());
        assert_eq!(ts.format("%H:%M:%S").to_string(), "14:30:05");
    }

    #[test]
    fn timestamp_from_text_value() {
        let ts = value_to_timestamp(&Value::Bytes(b"2013-10-04 00:00:01".to_vec())).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2013, 10, 4).unwrap());
        assert!(value_to_timestamp(&Value::Bytes(b"not a date".to_vec())).is_err());
    }

    #[test]
    fn invalid_calendar_date_rejected() {
        assert!(value_to_timestamp(&Value::Date(2013, 13, 40, 0, 0, 0, 0)).is_err());
    }

    #[test]
    fn values_render_verbatim() {
        assert_eq!(value_to_string(&Value::NULL), "");
        assert_eq!(value_to_string(&Value::Int(-7)), "-7");
        assert_eq!(value_to_string(&Value::Bytes(b"42.7339".to_vec())), "42.7339");
        assert_eq!(
            value_to_string(&Value::Date(2013, 10, 3, 1, 2, 3, 0)),
            "2013-10-03 01:02:03"
        );
        assert_eq!(
            value_to_string(&Value::Date(2013, 10, 3, 1, 2, 3, 40)),
            "2013-10-03 01:02:03.000040"
        );
    }
}
