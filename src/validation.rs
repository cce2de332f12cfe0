//! Request validation: list parameters, column filters and bulk sizes.

use crate::case::to_snake_case;
use crate::error::AppError;
use crate::schema::{Column, EntitySchema, SqlType};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;
pub const BULK_LIMIT: usize = 100;

/// Equality filter on one column; `None` matches NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub value: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListParams {
    pub limit: u64,
    pub offset: u64,
    /// (column, descending)
    pub sort: Vec<(&'static str, bool)>,
    pub filters: Vec<ColumnFilter>,
}

impl ListParams {
    /// Parses `limit`, `offset`, `sort` and column filters. Filter keys may be
    /// camelCase or snake_case; unknown keys are rejected.
    pub fn parse(
        schema: &'static EntitySchema,
        query: &HashMap<String, String>,
    ) -> Result<Self, AppError> {
        let limit = match query.get("limit") {
            Some(v) => parse_u64("limit", v)?,
            None => DEFAULT_LIMIT,
        };
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}")));
        }
        let offset = match query.get("offset") {
            Some(v) => parse_u64("offset", v)?,
            None => 0,
        };
        let sort = match query.get("sort") {
            Some(v) => parse_sort(schema, v)?,
            None => Vec::new(),
        };

        let mut keys: Vec<&String> = query
            .keys()
            .filter(|k| !matches!(k.as_str(), "limit" | "offset" | "sort"))
            .collect();
        keys.sort();
        let mut filters = Vec::with_capacity(keys.len());
        for key in keys {
            let column = lookup_column(schema, key)?;
            filters.push(ColumnFilter {
                column: column.name,
                value: filter_value(column, &query[key])?,
            });
        }
        Ok(ListParams {
            limit,
            offset,
            sort,
            filters,
        })
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{name} must be a non-negative integer")))
}

fn lookup_column(schema: &'static EntitySchema, key: &str) -> Result<&'static Column, AppError> {
    schema
        .column(&to_snake_case(key))
        .ok_or_else(|| AppError::BadRequest(format!("unknown field {key:?}")))
}

/// `sort=-createTime,name`: a leading `-` sorts descending.
fn parse_sort(
    schema: &'static EntitySchema,
    raw: &str,
) -> Result<Vec<(&'static str, bool)>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let (desc, key) = match s.strip_prefix('-') {
                Some(k) => (true, k),
                None => (false, s),
            };
            let column = lookup_column(schema, key)?;
            if column.sql_type == SqlType::Jsonb || column.sealed {
                return Err(AppError::BadRequest(format!("cannot sort by {key:?}")));
            }
            Ok((column.name, desc))
        })
        .collect()
}

/// Converts a query-string value to the JSON value bound for `column`.
///
/// `null` matches NULL. On text columns one leading backslash is dropped, so
/// `\null` matches the string "null" and `\\x` matches `\x`.
pub fn filter_value(column: &Column, raw: &str) -> Result<Option<Value>, AppError> {
    let bad = || AppError::BadRequest(format!("invalid value {raw:?} for {}", column.name));
    if column.sealed {
        return Err(AppError::BadRequest(format!("cannot filter on {}", column.name)));
    }
    if raw == "null" {
        return if column.nullable { Ok(None) } else { Err(bad()) };
    }
    let v = match column.sql_type {
        SqlType::Text => Value::String(raw.strip_prefix('\\').unwrap_or(raw).to_string()),
        SqlType::Timestamp => Value::String(raw.to_string()),
        SqlType::Uuid => {
            uuid::Uuid::parse_str(raw).map_err(|_| bad())?;
            Value::String(raw.to_string())
        }
        SqlType::Bool => Value::Bool(raw.parse().map_err(|_| bad())?),
        SqlType::Int | SqlType::BigInt | SqlType::BigSerial => {
            Value::from(raw.parse::<i64>().map_err(|_| bad())?)
        }
        SqlType::Float => {
            let f: f64 = raw.parse().map_err(|_| bad())?;
            serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(bad)?
        }
        SqlType::Jsonb => {
            return Err(AppError::BadRequest(format!("cannot filter on {}", column.name)));
        }
    };
    Ok(Some(v))
}

pub fn check_bulk_size(n: usize) -> Result<(), AppError> {
    if n == 0 {
        return Err(AppError::BadRequest("bulk request must contain at least one item".into()));
    }
    if n > BULK_LIMIT {
        return Err(AppError::BadRequest(format!("bulk request exceeds {BULK_LIMIT} items")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{cluster_cost, connector, environment};
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults() {
        let p = ListParams::parse(&environment::SCHEMA, &query(&[])).unwrap();
        assert_eq!(p.limit, DEFAULT_LIMIT);
        assert_eq!(p.offset, 0);
        assert!(p.sort.is_empty());
        assert!(p.filters.is_empty());
    }

    #[test]
    fn limit_is_bounded() {
        assert!(ListParams::parse(&environment::SCHEMA, &query(&[("limit", "1001")])).is_err());
        assert!(ListParams::parse(&environment::SCHEMA, &query(&[("limit", "0")])).is_err());
        assert!(ListParams::parse(&environment::SCHEMA, &query(&[("limit", "-1")])).is_err());
        let q = query(&[("limit", "1000"), ("offset", "20")]);
        let p = ListParams::parse(&environment::SCHEMA, &q).unwrap();
        assert_eq!((p.limit, p.offset), (1000, 20));
    }

    #[test]
    fn sort_and_filters_accept_camel_case() {
        let id = uuid::Uuid::new_v4().to_string();
        let p = ListParams::parse(
            &environment::SCHEMA,
            &query(&[("sort", "-createTime,name"), ("projectID", &id), ("type", "production")]),
        )
        .unwrap();
        assert_eq!(p.sort, vec![("create_time", true), ("name", false)]);
        assert_eq!(
            p.filters,
            vec![
                ColumnFilter {
                    column: "project_id",
                    value: Some(json!(id)),
                },
                ColumnFilter {
                    column: "type",
                    value: Some(json!("production")),
                },
            ]
        );
    }

    #[test]
    fn bad_filters_are_rejected() {
        let schema = &environment::SCHEMA;
        assert!(ListParams::parse(schema, &query(&[("nope", "x")])).is_err());
        assert!(ListParams::parse(schema, &query(&[("projectId", "not-a-uuid")])).is_err());
        assert!(ListParams::parse(schema, &query(&[("labels", "x")])).is_err());
        assert!(ListParams::parse(schema, &query(&[("sort", "labels")])).is_err());
    }

    #[test]
    fn typed_filter_values() {
        let minutes = cluster_cost::SCHEMA.column("minutes").unwrap();
        assert_eq!(filter_value(minutes, "1.5").unwrap(), Some(json!(1.5)));
        assert!(filter_value(minutes, "abc").is_err());

        let currency = cluster_cost::SCHEMA.column("currency").unwrap();
        assert_eq!(filter_value(currency, "null").unwrap(), None);
        assert_eq!(filter_value(currency, "840").unwrap(), Some(json!(840)));
    }

    #[test]
    fn escaped_null_matches_the_literal_string() {
        let description = environment::SCHEMA.column("description").unwrap();
        assert_eq!(filter_value(description, "null").unwrap(), None);
        assert_eq!(filter_value(description, r"\null").unwrap(), Some(json!("null")));
        assert_eq!(filter_value(description, r"\\null").unwrap(), Some(json!(r"\null")));
        assert_eq!(filter_value(description, "plain").unwrap(), Some(json!("plain")));

        let name = environment::SCHEMA.column("name").unwrap();
        assert!(filter_value(name, "null").is_err());
        assert_eq!(filter_value(name, r"\null").unwrap(), Some(json!("null")));
    }

    #[test]
    fn sealed_columns_cannot_be_filtered_or_sorted() {
        let schema = &connector::SCHEMA;
        assert!(ListParams::parse(schema, &query(&[("configData", "x")])).is_err());
        assert!(ListParams::parse(schema, &query(&[("sort", "configData")])).is_err());
    }

    #[test]
    fn bulk_size() {
        assert!(check_bulk_size(0).is_err());
        assert!(check_bulk_size(BULK_LIMIT).is_ok());
        assert!(check_bulk_size(BULK_LIMIT + 1).is_err());
    }
}
