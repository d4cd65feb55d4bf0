// photoprep/src/catalog/sql.rs
//! SQL literal rendering for generated catalog scripts.

use chrono::NaiveDateTime;
use std::fmt::Display;

pub const NULL: &str = "NULL";

/// Quoted string literal; absent or blank values become `NULL`.
pub fn sql_string(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!("'{}'", v.replace('\'', "''")),
        _ => NULL.to_string(),
    }
}

pub fn sql_number<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NULL.to_string(), |v| v.to_string())
}

pub fn sql_timestamp(value: Option<NaiveDateTime>) -> String {
    value.map_or_else(
        || NULL.to_string(),
        |v| format!("'{}'", v.format("%Y-%m-%d %H:%M:%S")),
    )
}

pub fn sql_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Insert `value` into a `(id, name)` lookup table unless already present.
pub fn sql_create_lookup(table: &str, value: Option<&str>) -> Option<String> {
    let literal = sql_string(value);
    if literal == NULL {
        return None;
    }

    Some(format!(
        "INSERT INTO {table} (name) SELECT {literal} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE name = {literal});"
    ))
}

/// Subquery resolving `value` to its lookup id.
pub fn sql_lookup_id(table: &str, value: Option<&str>) -> String {
    let literal = sql_string(value);
    if literal == NULL {
        return literal;
    }

    format!("(SELECT id FROM {table} WHERE name = {literal})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn strings_are_escaped() {
        assert_eq!(sql_string(Some("O'Brien")), "'O''Brien'");
        assert_eq!(sql_string(Some("  ")), "NULL");
        assert_eq!(sql_string(None), "NULL");
    }

    #[test]
    fn numbers_and_timestamps() {
        assert_eq!(sql_number(Some(5.6)), "5.6");
        assert_eq!(sql_number::<u32>(None), "NULL");

        let ts = NaiveDate::from_ymd_opt(2024, 7, 4)
            .unwrap()
            .and_hms_opt(18, 5, 9)
            .unwrap();
        assert_eq!(sql_timestamp(Some(ts)), "'2024-07-04 18:05:09'");
        assert_eq!(sql_timestamp(None), "NULL");
    }

    #[test]
    fn lookups() {
        assert_eq!(
            sql_create_lookup("photo.make", Some("NIKON")).unwrap(),
            "INSERT INTO photo.make (name) SELECT 'NIKON' WHERE NOT EXISTS (SELECT 1 FROM photo.make WHERE name = 'NIKON');"
        );
        assert!(sql_create_lookup("photo.make", None).is_none());
        assert_eq!(
            sql_lookup_id("photo.model", Some("D850")),
            "(SELECT id FROM photo.model WHERE name = 'D850')"
        );
        assert_eq!(sql_lookup_id("photo.model", Some("")), "NULL");
    }
}
