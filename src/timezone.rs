use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use tzf_rs::Finder;

pub const FALLBACK_ZONE: &str = "UTC";

lazy_static! {
    static ref FINDER: Finder = Finder::new();
}

/// Picks the zone for a place: the provider's name as given, then an offline
/// lookup by coordinates, then `UTC`. Never returns an empty string.
pub fn resolve_timezone(provider_tz: Option<&str>, lat: f64, lon: f64) -> String {
    if let Some(name) = provider_tz.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match lookup_zone(lat, lon) {
        Some(zone) => zone,
        None => {
            log::warn!("No time zone found for ({lat}, {lon}), using {FALLBACK_ZONE}");
            FALLBACK_ZONE.to_string()
        }
    }
}

fn lookup_zone(lat: f64, lon: f64) -> Option<String> {
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return None;
    }
    // tzf-rs takes longitude first
    let zone = std::panic::catch_unwind(|| FINDER.get_tz_name(lon, lat).to_string()).ok()?;
    Some(zone).filter(|z| !z.is_empty())
}

/// Offset of `zone` from UTC at `instant` as `±HH:MM`, positive east of
/// Greenwich. Unknown zones give `+00:00`.
pub fn utc_offset(zone: &str, instant: DateTime<Utc>) -> String {
    let seconds = match zone.parse::<Tz>() {
        Ok(tz) => instant.with_timezone(&tz).offset().fix().local_minus_utc(),
        Err(e) => {
            log::warn!("Unknown time zone {zone:?}: {e}");
            0
        }
    };
    format_offset(seconds)
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}
