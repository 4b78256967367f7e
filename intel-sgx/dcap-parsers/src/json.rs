/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Typed field lookup on JSON objects. Each lookup tells apart an absent field from one that
//! is present with the wrong type, so callers can raise the matching error.

use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::iso8601;

pub(crate) type Object = Map<String, Value>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FieldError {
    Missing,
    Invalid,
}

pub(crate) type Field<T> = Result<T, FieldError>;

fn field<'a>(object: &'a Object, name: &str) -> Field<&'a Value> {
    object.get(name).ok_or(FieldError::Missing)
}

pub(crate) fn uint_field(object: &Object, name: &str) -> Field<u32> {
    field(object, name)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(FieldError::Invalid)
}

pub(crate) fn int_field(object: &Object, name: &str) -> Field<i32> {
    field(object, name)?
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or(FieldError::Invalid)
}

pub(crate) fn string_field<'a>(object: &'a Object, name: &str) -> Field<&'a str> {
    field(object, name)?.as_str().ok_or(FieldError::Invalid)
}

pub(crate) fn date_field(object: &Object, name: &str) -> Field<DateTime<Utc>> {
    iso8601::parse(string_field(object, name)?).ok_or(FieldError::Invalid)
}

/// Hex encoded bytes, exactly `hex_len` characters long.
pub(crate) fn bytes_field(object: &Object, name: &str, hex_len: usize) -> Field<Vec<u8>> {
    let hex = string_field(object, name)?;
    if hex.len() != hex_len {
        return Err(FieldError::Invalid);
    }
    base16::decode(hex).map_err(|_| FieldError::Invalid)
}

/// An array of strings. A single non-string element makes the whole field invalid.
pub(crate) fn string_vec_field(object: &Object, name: &str) -> Field<Vec<String>> {
    field(object, name)?
        .as_array()
        .ok_or(FieldError::Invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_owned).ok_or(FieldError::Invalid))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Object {
        match value {
            Value::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn numbers() {
        let o = object(json!({"a": 3, "b": -1, "c": "3", "d": 4294967296u64, "e": 1.5}));
        assert_eq!(uint_field(&o, "a"), Ok(3));
        assert_eq!(uint_field(&o, "b"), Err(FieldError::Invalid));
        assert_eq!(uint_field(&o, "c"), Err(FieldError::Invalid));
        assert_eq!(uint_field(&o, "d"), Err(FieldError::Invalid));
        assert_eq!(uint_field(&o, "e"), Err(FieldError::Invalid));
        assert_eq!(uint_field(&o, "z"), Err(FieldError::Missing));
        assert_eq!(int_field(&o, "b"), Ok(-1));
        assert_eq!(int_field(&o, "d"), Err(FieldError::Invalid));
    }

    #[test]
    fn bytes_and_dates() {
        let o = object(json!({"fmspc": "0192837465AF", "short": "0192", "bad": "ZZ92837465AF", "date": "2017-10-04T11:10:45Z"}));
        assert_eq!(bytes_field(&o, "fmspc", 12), Ok(vec![0x01, 0x92, 0x83, 0x74, 0x65, 0xaf]));
        assert_eq!(bytes_field(&o, "short", 12), Err(FieldError::Invalid));
        assert_eq!(bytes_field(&o, "bad", 12), Err(FieldError::Invalid));
        assert_eq!(date_field(&o, "date"), Ok(Utc.with_ymd_and_hms(2017, 10, 4, 11, 10, 45).unwrap()));
        assert_eq!(date_field(&o, "fmspc"), Err(FieldError::Invalid));
    }

    #[test]
    fn string_vectors() {
        let o = object(json!({"ok": ["INTEL-SA-00079"], "mixed": [456, "INTEL-SA-00079"], "str": "INTEL-SA-00079"}));
        assert_eq!(string_vec_field(&o, "ok"), Ok(vec!["INTEL-SA-00079".to_owned()]));
        assert_eq!(string_vec_field(&o, "mixed"), Err(FieldError::Invalid));
        assert_eq!(string_vec_field(&o, "str"), Err(FieldError::Invalid));
        assert_eq!(string_vec_field(&o, "none"), Err(FieldError::Missing));
    }
}
