// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Timestamp rendering for the `time` field.
//!
//! Patterns use the `SimpleDateFormat` letter convention (`yyyy-MM-dd'T'HH:mmZ`)
//! that log configuration files are usually written in. A pattern and a time
//! zone name are compiled once into an immutable [`TimeFormatter`]; the sink
//! swaps the whole formatter when either of them changes.
//!
//! Supported letters:
//!
//! | Letter | Meaning                    | Letter | Meaning                      |
//! |--------|----------------------------|--------|------------------------------|
//! | `G`    | era (`AD`)                 | `H`    | hour 0-23                    |
//! | `y`    | year (`yy` = two digits)   | `k`    | hour 1-24                    |
//! | `Y`    | ISO week year              | `K`    | hour 0-11                    |
//! | `M`/`L`| month (`MMM`, `MMMM` names)| `h`    | hour 1-12                    |
//! | `d`    | day of month               | `m`    | minute                       |
//! | `D`    | day of year                | `s`    | second                       |
//! | `E`    | day name (`EEEE` long)     | `S`    | millisecond                  |
//! | `u`    | day number (1 = Monday)    | `z`    | zone abbreviation / id       |
//! | `a`    | `AM`/`PM`                  | `Z`    | `+0800`                      |
//! |        |                            | `X`    | `+08`, `+0800`, `+08:00`, `Z`|
//!
//! Text between single quotes is literal and `''` is a single quote. Other
//! letters are copied through unchanged.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt::{self, Write as _};
use tracing::warn;

pub const DEFAULT_TIME_FORMAT: &str = "yyyy-MM-dd'T'HH:mmZ";
pub const DEFAULT_TIME_ZONE: &str = "UTC";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field { letter: char, width: usize },
}

#[derive(Clone, Debug, PartialEq)]
enum Zone {
    Fixed { offset: FixedOffset, id: String },
    Named(Tz),
}

impl Zone {
    fn parse(name: &str) -> Zone {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("UTC")
            || trimmed.eq_ignore_ascii_case("GMT")
            || trimmed == "Z"
        {
            return Zone::utc();
        }

        let offset_part = ["GMT", "UTC"]
            .iter()
            .find_map(|prefix| strip_prefix_ignore_case(trimmed, prefix))
            .unwrap_or(trimmed);
        if offset_part.starts_with(['+', '-']) {
            if let Some(seconds) = parse_offset_seconds(offset_part) {
                if let Some(offset) = FixedOffset::east_opt(seconds) {
                    return Zone::Fixed {
                        offset,
                        id: format!("GMT{}", format_offset(seconds, true)),
                    };
                }
            }
        }

        match trimmed.parse::<Tz>() {
            Ok(tz) => Zone::Named(tz),
            Err(_) => {
                warn!("ALILOG | Unknown time zone '{trimmed}', falling back to UTC");
                Zone::utc()
            }
        }
    }

    fn utc() -> Zone {
        Zone::Fixed {
            offset: Utc.fix(),
            id: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Parses `+8`, `+08`, `+0800`, `+08:00` and `+8:00` into seconds east of UTC.
fn parse_offset_seconds(value: &str) -> Option<i32> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    // Only ASCII from here on, so byte offsets are char boundaries.
    if !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() > 2 => rest.split_at(rest.len() - 2),
        None => (rest, "0"),
    };
    if hours.is_empty() || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

fn format_offset(seconds: i32, with_colon: bool) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let total_minutes = seconds.abs() / 60;
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    if with_colon {
        format!("{sign}{hours:02}:{minutes:02}")
    } else {
        format!("{sign}{hours:02}{minutes:02}")
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                literal.push('\'');
            } else {
                in_quote = !in_quote;
            }
            continue;
        }
        if in_quote || !is_pattern_letter(c) {
            literal.push(c);
            continue;
        }

        let mut width = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            width += 1;
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(Token::Field { letter: c, width });
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

fn is_pattern_letter(c: char) -> bool {
    matches!(
        c,
        'G' | 'y'
            | 'Y'
            | 'M'
            | 'L'
            | 'd'
            | 'D'
            | 'E'
            | 'u'
            | 'a'
            | 'H'
            | 'k'
            | 'K'
            | 'h'
            | 'm'
            | 's'
            | 'S'
            | 'z'
            | 'Z'
            | 'X'
    )
}

/// A compiled pattern bound to a time zone.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeFormatter {
    pattern: String,
    zone_name: String,
    tokens: Vec<Token>,
    zone: Zone,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_FORMAT, DEFAULT_TIME_ZONE)
    }
}

impl TimeFormatter {
    #[must_use]
    pub fn new(pattern: &str, zone_name: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            zone_name: zone_name.to_string(),
            tokens: tokenize(pattern),
            zone: Zone::parse(zone_name),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// Renders a millisecond Unix timestamp.
    ///
    /// Timestamps outside the representable calendar range are rendered as
    /// the raw millisecond number.
    #[must_use]
    pub fn format_millis(&self, millis: i64) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            return millis.to_string();
        };
        let (local, abbreviation, zone_id) = match &self.zone {
            Zone::Fixed { offset, id } => (utc.with_timezone(offset), id.clone(), id.clone()),
            Zone::Named(tz) => {
                let zoned = utc.with_timezone(tz);
                let abbreviation = zoned.offset().to_string();
                (zoned.fixed_offset(), abbreviation, tz.name().to_string())
            }
        };

        let mut out = String::with_capacity(self.pattern.len() + 8);
        for token in &self.tokens {
            let written = match token {
                Token::Literal(text) => out.write_str(text),
                Token::Field { letter, width } => write_field(
                    &mut out,
                    &local,
                    *letter,
                    *width,
                    &abbreviation,
                    &zone_id,
                ),
            };
            if written.is_err() {
                return millis.to_string();
            }
        }
        out
    }
}

fn write_number(out: &mut String, value: i64, width: usize) -> fmt::Result {
    write!(out, "{value:0width$}")
}

fn write_field(
    out: &mut String,
    local: &DateTime<FixedOffset>,
    letter: char,
    width: usize,
    abbreviation: &str,
    zone_id: &str,
) -> fmt::Result {
    let offset_seconds = local.offset().local_minus_utc();
    match letter {
        'G' => out.write_str(if local.year() > 0 { "AD" } else { "BC" }),
        'y' | 'Y' => {
            let year = if letter == 'y' {
                local.year()
            } else {
                local.iso_week().year()
            };
            let year_of_era = i64::from(if year > 0 { year } else { 1 - year });
            if width == 2 {
                write_number(out, year_of_era % 100, 2)
            } else {
                write_number(out, year_of_era, width)
            }
        }
        'M' | 'L' => {
            let month0 = local.month0() as usize;
            match width {
                1 | 2 => write_number(out, i64::from(local.month()), width),
                3 => out.write_str(&MONTH_NAMES[month0][..3]),
                _ => out.write_str(MONTH_NAMES[month0]),
            }
        }
        'd' => write_number(out, i64::from(local.day()), width),
        'D' => write_number(out, i64::from(local.ordinal()), width),
        'E' => {
            let day = DAY_NAMES[local.weekday().num_days_from_monday() as usize];
            if width >= 4 {
                out.write_str(day)
            } else {
                out.write_str(&day[..3])
            }
        }
        'u' => write_number(out, i64::from(local.weekday().number_from_monday()), width),
        'a' => out.write_str(if local.hour() < 12 { "AM" } else { "PM" }),
        'H' => write_number(out, i64::from(local.hour()), width),
        'k' => {
            let hour = if local.hour() == 0 { 24 } else { local.hour() };
            write_number(out, i64::from(hour), width)
        }
        'K' => write_number(out, i64::from(local.hour() % 12), width),
        'h' => {
            let hour = match local.hour() % 12 {
                0 => 12,
                h => h,
            };
            write_number(out, i64::from(hour), width)
        }
        'm' => write_number(out, i64::from(local.minute()), width),
        's' => write_number(out, i64::from(local.second()), width),
        'S' => write_number(
            out,
            i64::from(local.timestamp_subsec_millis().min(999)),
            width,
        ),
        'z' => {
            if width >= 4 {
                out.write_str(zone_id)
            } else {
                out.write_str(abbreviation)
            }
        }
        'Z' => out.write_str(&format_offset(offset_seconds, false)),
        'X' => {
            if offset_seconds == 0 {
                return out.write_char('Z');
            }
            match width {
                1 => {
                    let full = format_offset(offset_seconds, false);
                    out.write_str(&full[..3])
                }
                2 => out.write_str(&format_offset(offset_seconds, false)),
                _ => out.write_str(&format_offset(offset_seconds, true)),
            }
        }
        other => {
            for _ in 0..width {
                out.write_char(other)?;
            }
            Ok(())
        }
    }
}
