// src/backup/naming.rs
use chrono::{Datelike, NaiveDate};

/// Top-level folder every backup object is stored under.
pub const KEY_PREFIX: &str = "Database";

/// Builds the object key `Database/<y>/<m>/<d>/<y>-<mm>-<dd> (<token>).zip`.
///
/// Path segments are not zero-padded; the file name's date is.
pub fn build_object_key(date: NaiveDate, token: &str) -> String {
    let (year, month, day) = (date.year(), date.month(), date.day());
    format!(
        "{}/{}/{}/{}/{}-{:02}-{:02} ({}).zip",
        KEY_PREFIX, year, month, day, year, month, day, token
    )
}
