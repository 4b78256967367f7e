/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use chrono::{DateTime, NaiveDateTime, Utc};

const ISO8601_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%SZ";

/// Parses a `YYYY-MM-DDThh:mm:ssZ` timestamp. Offsets other than `Z` and fractional seconds
/// are rejected.
pub(crate) fn parse(timestamp: &str) -> Option<DateTime<Utc>> {
    // chrono accepts single digit fields, the wire format does not
    if timestamp.len() != 20 {
        return None;
    }
    NaiveDateTime::parse_from_str(timestamp, ISO8601_FORMAT).ok().map(|t| t.and_utc())
}
