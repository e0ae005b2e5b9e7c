//! `time.star`
//!
//! Formatting and parsing use `strftime` layouts (`%Y-%m-%d %H:%M`).
//! Without a layout, `parse_time` expects RFC 3339.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt::{self, Write};
use tessera_core::{Bindings, EvalError, Function, ModuleBuilder, Object, Value};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// `"UTC"`, `"Z"`, `""` or `"+HH:MM"` / `"-HH:MM"`.
pub fn parse_location(name: &str) -> Option<FixedOffset> {
    match name {
        "" | "UTC" | "Z" => FixedOffset::east_opt(0),
        _ => {
            let (sign, rest) = match name.as_bytes().first()? {
                b'+' => (1, &name[1..]),
                b'-' => (-1, &name[1..]),
                _ => return None,
            };
            let (h, m) = rest.split_once(':')?;
            let h: i32 = h.parse().ok()?;
            let m: i32 = m.parse().ok()?;
            if !(0..24).contains(&h) || !(0..60).contains(&m) {
                return None;
            }
            FixedOffset::east_opt(sign * (h * 3600 + m * 60))
        }
    }
}

fn location_arg(function: &str, name: &str) -> Result<FixedOffset, EvalError> {
    parse_location(name).ok_or_else(|| {
        EvalError::msg(format!(
            "{function}: unknown location {name:?} (use \"UTC\" or an offset like \"+02:00\")"
        ))
    })
}

fn strftime<'a>(function: &str, layout: &'a str) -> Result<Vec<Item<'a>>, EvalError> {
    let items: Vec<Item<'a>> = StrftimeItems::new(layout).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EvalError::msg(format!("{function}: invalid layout {layout:?}")));
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// time.Time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeValue(pub DateTime<FixedOffset>);

impl TimeValue {
    pub fn format(&self, layout: &str) -> Result<String, EvalError> {
        let items = strftime("time.format", layout)?;
        let mut out = String::new();
        write!(out, "{}", self.0.format_with_items(items.iter()))
            .map_err(|_| EvalError::msg(format!("time.format: cannot format with {layout:?}")))?;
        Ok(out)
    }

    fn method<F>(&self, name: &str, body: F) -> Value
    where
        F: Fn(TimeValue, tessera_core::ArgParser) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let this = *self;
        let qualified = format!("time.Time.{name}");
        Value::Function(Function::native(qualified.clone(), move |_thread, args| {
            body(this, args.parser(&qualified))
        }))
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Object for TimeValue {
    fn type_name(&self) -> &str {
        "time.Time"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        use chrono::{Datelike, Timelike};
        let t = self.0;
        Some(match name {
            "year" => Value::Int(i64::from(t.year())),
            "month" => Value::Int(i64::from(t.month())),
            "day" => Value::Int(i64::from(t.day())),
            "hour" => Value::Int(i64::from(t.hour())),
            "minute" => Value::Int(i64::from(t.minute())),
            "second" => Value::Int(i64::from(t.second())),
            "nanosecond" => Value::Int(i64::from(t.nanosecond())),
            "weekday" => Value::Int(i64::from(t.weekday().num_days_from_sunday())),
            "unix" => Value::Int(t.timestamp()),
            "unix_nano" => Value::Int(t.timestamp_nanos_opt().unwrap_or(i64::MAX)),
            "format" => self.method("format", |this, mut p| {
                let layout: String = p.required("layout")?;
                p.finish()?;
                this.format(&layout).map(Value::String)
            }),
            "in_location" => self.method("in_location", |this, mut p| {
                let location: String = p.required("location")?;
                p.finish()?;
                let offset = location_arg("time.Time.in_location", &location)?;
                Ok(Value::object(TimeValue(this.0.with_timezone(&offset))))
            }),
            "add" => self.method("add", |this, mut p| {
                let d = duration_arg("time.Time.add", p.required("duration")?)?;
                p.finish()?;
                this.0
                    .checked_add_signed(d)
                    .map(|t| Value::object(TimeValue(t)))
                    .ok_or_else(|| EvalError::msg("time.Time.add: time out of range"))
            }),
            "sub" => self.method("sub", |this, mut p| {
                let other: Value = p.required("other")?;
                p.finish()?;
                let Some(other) = other.downcast_ref::<TimeValue>() else {
                    return Err(EvalError::msg(format!(
                        "time.Time.sub: got {}, want time.Time",
                        other.type_name()
                    )));
                };
                Ok(Value::object(DurationValue(this.0.signed_duration_since(other.0))))
            }),
            _ => return None,
        })
    }

    fn attr_names(&self) -> Vec<String> {
        [
            "add", "day", "format", "hour", "in_location", "minute", "month", "nanosecond",
            "second", "sub", "unix", "unix_nano", "weekday", "year",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// time.Duration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationValue(pub Duration);

impl Object for DurationValue {
    fn type_name(&self) -> &str {
        "time.Duration"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let nanos = self.0.num_nanoseconds().unwrap_or(i64::MAX) as f64;
        Some(match name {
            "hours" => Value::Float(nanos / 3.6e12),
            "minutes" => Value::Float(nanos / 6e10),
            "seconds" => Value::Float(nanos / 1e9),
            "milliseconds" => Value::Int(self.0.num_milliseconds()),
            "nanoseconds" => Value::Int(self.0.num_nanoseconds().unwrap_or(i64::MAX)),
            _ => return None,
        })
    }

    fn attr_names(&self) -> Vec<String> {
        ["hours", "milliseconds", "minutes", "nanoseconds", "seconds"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn truth(&self) -> bool {
        !self.0.is_zero()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0))
    }
}

fn duration_arg(function: &str, value: Value) -> Result<Duration, EvalError> {
    value
        .downcast_ref::<DurationValue>()
        .map(|d| d.0)
        .ok_or_else(|| {
            EvalError::msg(format!(
                "{function}: got {}, want time.Duration",
                value.type_name()
            ))
        })
}

/// Parse `"1h30m"`, `"-1.5s"`, `"250ms"`. Units: `ns`, `us`, `µs`, `ms`,
/// `s`, `m`, `h`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let (negative, mut rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Some(Duration::zero());
    }
    if rest.is_empty() {
        return None;
    }
    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let amount: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 6e10,
            "h" => 3.6e12,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += amount * scale;
    }
    if total_nanos > i64::MAX as f64 {
        return None;
    }
    let nanos = total_nanos.round() as i64;
    Some(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}

/// `1h30m0s`, `1.5s`, `250ms`, `0s`.
pub fn format_duration(d: Duration) -> String {
    let Some(nanos) = d.num_nanoseconds() else {
        return format!("{}h", d.num_hours());
    };
    if nanos == 0 {
        return "0s".to_string();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs();
    if n < 1_000_000_000 {
        let (value, unit) = if n < 1_000 {
            (n as f64, "ns")
        } else if n < 1_000_000 {
            (n as f64 / 1e3, "µs")
        } else {
            (n as f64 / 1e6, "ms")
        };
        return format!("{sign}{value}{unit}");
    }
    let hours = n / 3_600_000_000_000;
    let minutes = (n / 60_000_000_000) % 60;
    let seconds = (n % 60_000_000_000) as f64 / 1e9;
    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

pub fn parse_time(src: &str, layout: Option<&str>, location: FixedOffset) -> Result<DateTime<FixedOffset>, String> {
    let Some(layout) = layout else {
        return DateTime::parse_from_rfc3339(src).map_err(|e| e.to_string());
    };
    if let Ok(t) = DateTime::parse_from_str(src, layout) {
        return Ok(t);
    }
    let naive = NaiveDateTime::parse_from_str(src, layout)
        .or_else(|_| {
            NaiveDate::parse_from_str(src, layout).map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|e| e.to_string())?;
    location
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("{src:?} is not a valid local time"))
}

fn duration_constant(nanos: i64) -> Value {
    Value::object(DurationValue(Duration::nanoseconds(nanos)))
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("time")
        .value("nanosecond", duration_constant(1))
        .value("microsecond", duration_constant(1_000))
        .value("millisecond", duration_constant(1_000_000))
        .value("second", duration_constant(1_000_000_000))
        .value("minute", duration_constant(60_000_000_000))
        .value("hour", duration_constant(3_600_000_000_000))
        .function("now", |_thread, args| {
            args.parser("time.now").finish()?;
            Ok(Value::object(TimeValue(Utc::now().fixed_offset())))
        })
        .function("from_timestamp", |_thread, args| {
            let mut p = args.parser("time.from_timestamp");
            let sec: i64 = p.required("sec")?;
            let nsec: u32 = p.or_default("nsec", 0)?;
            p.finish()?;
            let t = DateTime::from_timestamp(sec, nsec)
                .ok_or_else(|| EvalError::msg("time.from_timestamp: out of range"))?;
            Ok(Value::object(TimeValue(t.fixed_offset())))
        })
        .function("time", |_thread, args| {
            let mut p = args.parser("time.time");
            let year: i32 = p.or_default("year", 1970)?;
            let month: u32 = p.or_default("month", 1)?;
            let day: u32 = p.or_default("day", 1)?;
            let hour: u32 = p.or_default("hour", 0)?;
            let minute: u32 = p.or_default("minute", 0)?;
            let second: u32 = p.or_default("second", 0)?;
            let nanosecond: u32 = p.or_default("nanosecond", 0)?;
            let location: String = p.or_default("location", "UTC".to_string())?;
            p.finish()?;
            let offset = location_arg("time.time", &location)?;
            let naive = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_nano_opt(hour, minute, second, nanosecond))
                .ok_or_else(|| EvalError::msg("time.time: invalid date or time"))?;
            let t = offset
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| EvalError::msg("time.time: invalid local time"))?;
            Ok(Value::object(TimeValue(t)))
        })
        .function("parse_time", |_thread, args| {
            let mut p = args.parser("time.parse_time");
            let src: String = p.required("x")?;
            let layout: Option<String> = p.optional("format")?;
            let location: String = p.or_default("location", "UTC".to_string())?;
            p.finish()?;
            let offset = location_arg("time.parse_time", &location)?;
            if let Some(layout) = &layout {
                strftime("time.parse_time", layout)?;
            }
            parse_time(&src, layout.as_deref(), offset)
                .map(|t| Value::object(TimeValue(t)))
                .map_err(|e| EvalError::msg(format!("time.parse_time: {e}")))
        })
        .function("parse_duration", |_thread, args| {
            let mut p = args.parser("time.parse_duration");
            let src: String = p.required("d")?;
            p.finish()?;
            parse_duration(&src)
                .map(|d| Value::object(DurationValue(d)))
                .ok_or_else(|| EvalError::msg(format!("time.parse_duration: invalid duration {src:?}")))
        })
        .function("is_valid_timezone", |_thread, args| {
            let mut p = args.parser("time.is_valid_timezone");
            let name: String = p.required("name")?;
            p.finish()?;
            Ok(Value::Bool(parse_location(&name).is_some()))
        })
        .build()
}
