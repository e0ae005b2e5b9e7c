//! `humanize.star`

use crate::time::TimeValue;
use chrono::{DateTime, FixedOffset, Utc};
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;

/// `"3 hours ago"`, `"1 day from now"`, `"now"`.
pub fn relative_time(then: DateTime<FixedOffset>, now: DateTime<FixedOffset>, past: &str, future: &str) -> String {
    let diff = now.signed_duration_since(then).num_seconds();
    let (secs, label) = if diff >= 0 { (diff, past) } else { (-diff, future) };
    let amount = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} {label}")
        } else {
            format!("{n} {unit}s {label}")
        }
    };
    match secs {
        0 => "now".to_string(),
        s if s < MINUTE => amount(s, "second"),
        s if s < HOUR => amount(s / MINUTE, "minute"),
        s if s < DAY => amount(s / HOUR, "hour"),
        s if s < WEEK => amount(s / DAY, "day"),
        s if s < MONTH => amount(s / WEEK, "week"),
        s if s < YEAR => amount(s / MONTH, "month"),
        s if s < 18 * MONTH => amount(1, "year"),
        s if s < 2 * YEAR => amount(2, "year"),
        s if s < 37 * YEAR => amount(s / YEAR, "year"),
        _ => format!("a long while {label}"),
    }
}

fn humanate_bytes(size: u64, base: f64, units: &[&str]) -> String {
    if size < 10 {
        return format!("{size} B");
    }
    let s = size as f64;
    let exp = (s.ln() / base.ln()).floor().min((units.len() - 1) as f64);
    let value = (s / base.powf(exp) * 10.0 + 0.5).floor() / 10.0;
    let unit = units[exp as usize];
    if value < 10.0 {
        format!("{value:.1} {unit}")
    } else {
        format!("{value:.0} {unit}")
    }
}

/// SI sizes: `82854982` → `"83 MB"`.
pub fn bytes(size: u64) -> String {
    humanate_bytes(size, 1000.0, &["B", "kB", "MB", "GB", "TB", "PB", "EB"])
}

/// IEC sizes: `82854982` → `"79 MiB"`.
pub fn ibytes(size: u64) -> String {
    humanate_bytes(size, 1024.0, &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"])
}

/// `1234567` → `"1,234,567"`.
pub fn comma(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1` → `"1st"`, `12` → `"12th"`, `22` → `"22nd"`.
pub fn ordinal(n: i64) -> String {
    let suffix = match (n.abs() % 10, n.abs() % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// `plural(2, "object")` → `"2 objects"`; an explicit plural form wins.
pub fn plural(n: i64, singular: &str, plural: &str) -> String {
    if n == 1 {
        return format!("{n} {singular}");
    }
    if !plural.is_empty() {
        return format!("{n} {plural}");
    }
    let guessed = if singular.ends_with('s')
        || singular.ends_with('x')
        || singular.ends_with("ch")
        || singular.ends_with("sh")
    {
        format!("{singular}es")
    } else if singular.ends_with('y')
        && !singular.ends_with("ay")
        && !singular.ends_with("ey")
        && !singular.ends_with("oy")
    {
        format!("{}ies", &singular[..singular.len() - 1])
    } else {
        format!("{singular}s")
    };
    format!("{n} {guessed}")
}

fn time_arg(function: &str, param: &str, value: Value) -> Result<DateTime<FixedOffset>, EvalError> {
    value
        .downcast_ref::<TimeValue>()
        .map(|t| t.0)
        .ok_or_else(|| {
            EvalError::msg(format!(
                "{function}: for parameter {param}: got {}, want time.Time",
                value.type_name()
            ))
        })
}

fn size_arg(function: &str, n: i64) -> Result<u64, EvalError> {
    u64::try_from(n).map_err(|_| EvalError::msg(format!("{function}: size must be non-negative")))
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("humanize")
        .function("time", |_thread, args| {
            let mut p = args.parser("humanize.time");
            let then = time_arg("humanize.time", "date", p.required("date")?)?;
            p.finish()?;
            let now = Utc::now().fixed_offset();
            Ok(Value::String(relative_time(then, now, "ago", "from now")))
        })
        .function("relative_time", |_thread, args| {
            let mut p = args.parser("humanize.relative_time");
            let a = time_arg("humanize.relative_time", "date1", p.required("date1")?)?;
            let b = time_arg("humanize.relative_time", "date2", p.required("date2")?)?;
            let label_a: String = p.or_default("label1", "before".to_string())?;
            let label_b: String = p.or_default("label2", "after".to_string())?;
            p.finish()?;
            Ok(Value::String(relative_time(a, b, &label_a, &label_b)))
        })
        .function("bytes", |_thread, args| {
            let mut p = args.parser("humanize.bytes");
            let size: i64 = p.required("size")?;
            let iec: bool = p.or_default("iec", false)?;
            p.finish()?;
            let size = size_arg("humanize.bytes", size)?;
            Ok(Value::String(if iec { ibytes(size) } else { bytes(size) }))
        })
        .function("comma", |_thread, args| {
            let mut p = args.parser("humanize.comma");
            let n: i64 = p.required("num")?;
            p.finish()?;
            Ok(Value::String(comma(n)))
        })
        .function("ordinal", |_thread, args| {
            let mut p = args.parser("humanize.ordinal");
            let n: i64 = p.required("num")?;
            p.finish()?;
            Ok(Value::String(ordinal(n)))
        })
        .function("plural", |_thread, args| {
            let mut p = args.parser("humanize.plural");
            let n: i64 = p.required("quantity")?;
            let singular: String = p.required("singular")?;
            let plural_form: String = p.or_default("plural", String::new())?;
            p.finish()?;
            Ok(Value::String(plural(n, &singular, &plural_form)))
        })
        .function("url_encode", |_thread, args| {
            let mut p = args.parser("humanize.url_encode");
            let s: String = p.required("str")?;
            p.finish()?;
            Ok(Value::String(urlencoding::encode(&s).into_owned()))
        })
        .function("url_decode", |_thread, args| {
            let mut p = args.parser("humanize.url_decode");
            let s: String = p.required("str")?;
            p.finish()?;
            urlencoding::decode(&s)
                .map(|decoded| Value::String(decoded.into_owned()))
                .map_err(|e| EvalError::msg(format!("humanize.url_decode: {e}")))
        })
        .build()
}
