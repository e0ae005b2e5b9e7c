//! `sunrise.star`
//!
//! `sunrise.sunrise(lat, lng, date)` and `sunrise.sunset(lat, lng, date)`
//! return a `time.Time` in the date's offset, or `None` where the sun does
//! not rise or set that day (polar day or night). Computed with the NOAA
//! sunrise equation; accurate to about a minute.

use crate::time::TimeValue;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JULIAN: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;
const EARTH_TILT_DEGREES: f64 = 23.4397;
/// Apparent elevation of the sun's upper limb at sunrise, with refraction.
const HORIZON_DEGREES: f64 = -0.833;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Rise,
    Set,
}

/// Unix time of the sun event on `date` at `lat`/`lng` degrees (east and
/// north positive).
pub fn sun_event(lat: f64, lng: f64, date: NaiveDate, event: Event) -> Option<f64> {
    let days_since_epoch = date.num_days_from_ce() as f64 - 719_163.0;
    let julian_date = days_since_epoch + UNIX_EPOCH_JULIAN;
    let n = (julian_date - J2000 + 0.0008).ceil();
    let mean_solar_noon = n - lng / 360.0;

    let m = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
    let m_rad = m.to_radians();
    let center = 1.9148 * m_rad.sin() + 0.02 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
    let ecliptic_longitude = (m + center + 180.0 + 102.9372).rem_euclid(360.0).to_radians();
    let transit =
        J2000 + mean_solar_noon + 0.0053 * m_rad.sin() - 0.0069 * (2.0 * ecliptic_longitude).sin();

    let declination_sin = ecliptic_longitude.sin() * EARTH_TILT_DEGREES.to_radians().sin();
    let declination_cos = declination_sin.asin().cos();
    let lat_rad = lat.to_radians();
    let hour_angle_cos = (HORIZON_DEGREES.to_radians().sin() - lat_rad.sin() * declination_sin)
        / (lat_rad.cos() * declination_cos);
    if !(-1.0..=1.0).contains(&hour_angle_cos) {
        return None;
    }
    let hour_angle = hour_angle_cos.acos().to_degrees();

    let julian = match event {
        Event::Rise => transit - hour_angle / 360.0,
        Event::Set => transit + hour_angle / 360.0,
    };
    Some((julian - UNIX_EPOCH_JULIAN) * SECONDS_PER_DAY)
}

fn event_at(lat: f64, lng: f64, date: DateTime<FixedOffset>, event: Event) -> Option<DateTime<FixedOffset>> {
    let unix = sun_event(lat, lng, date.date_naive(), event)?;
    let secs = unix.floor();
    let nanos = ((unix - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos).map(|t| t.with_timezone(date.offset()))
}

fn function(name: &'static str, event: Event) -> impl Fn(&mut tessera_core::Thread, tessera_core::Arguments) -> Result<Value, EvalError> {
    move |_thread, args| {
        let mut p = args.parser(name);
        let lat: f64 = p.required("lat")?;
        let lng: f64 = p.required("lng")?;
        let date: Value = p.required("date")?;
        p.finish()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(EvalError::msg(format!("{name}: coordinates out of range ({lat}, {lng})")));
        }
        let Some(date) = date.downcast_ref::<TimeValue>() else {
            return Err(EvalError::msg(format!(
                "{name}: for parameter date: got {}, want time.Time",
                date.type_name()
            )));
        };
        Ok(match event_at(lat, lng, date.0, event) {
            Some(t) => Value::object(TimeValue(t)),
            None => Value::None,
        })
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("sunrise")
        .function("sunrise", function("sunrise.sunrise", Event::Rise))
        .function("sunset", function("sunrise.sunset", Event::Set))
        .build()
}
