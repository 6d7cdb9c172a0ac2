//! Parser for ffmpeg diagnostic output
//!
//! ffmpeg reports on stderr. Two kinds of lines matter:
//!
//! ```text
//!   Duration: 00:02:30.04, start: 0.000000, bitrate: 2640 kb/s
//! frame= 1875 fps=250 q=-1.0 size=    4883kB time=00:01:15.00 bitrate= 533.3kbits/s speed=  10x
//! ```
//!
//! The first appears once per input (and is `N/A` for live streams); the second is
//! rewritten in place with `\r` while the copy runs. The final summary uses `Lsize=`.

use crate::types::ProgressSample;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

#[allow(clippy::expect_used)] // literal pattern
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d{2,}):(\d{2}):(\d{2})").expect("valid duration regex")
});

#[allow(clippy::expect_used)] // literal pattern
static KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=\s*(\S+)").expect("valid key=value regex"));

/// Extract the total media duration from a `Duration: HH:MM:SS` line
///
/// Fractional seconds are ignored.
pub fn parse_duration_line(line: &str) -> Option<Duration> {
    let caps = DURATION_RE.captures(line)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    hms_secs(hours, minutes, seconds).map(Duration::from_secs)
}

/// `hours:minutes:seconds` in whole seconds, `None` on overflow
fn hms_secs(hours: u64, minutes: u64, seconds: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Parse a periodic progress line
///
/// Returns `None` unless the line carries `time=` together with `size=` (or `Lsize=`)
/// or `speed=`. Individual `N/A` values are reported as zero.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let mut time = None;
    let mut size = None;
    let mut speed = None;

    for caps in KEY_VALUE_RE.captures_iter(line) {
        let value = caps.get(2).map(|m| m.as_str());
        match &caps[1] {
            "time" => time = value,
            "size" | "Lsize" => size = value,
            "speed" => speed = value,
            _ => {}
        }
    }

    let time = time?;
    if size.is_none() && speed.is_none() {
        return None;
    }

    Some(ProgressSample {
        elapsed: parse_timestamp(time).unwrap_or_default(),
        speed: speed.and_then(parse_speed).unwrap_or(0.0),
        bytes_written: size.and_then(parse_size).unwrap_or(0),
    })
}

/// Parse `HH:MM:SS(.ff)`; negative timestamps clamp to zero
pub(crate) fn parse_timestamp(value: &str) -> Option<Duration> {
    if value.starts_with('-') {
        return Some(Duration::ZERO);
    }

    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let whole = Duration::from_secs(hms_secs(hours, minutes, 0)?);
    whole.checked_add(Duration::try_from_secs_f64(seconds).ok()?)
}

/// Parse ffmpeg's size notation (`4883kB`, `12MiB`, `512B`)
///
/// ffmpeg's kB is 1024 bytes.
pub(crate) fn parse_size(value: &str) -> Option<u64> {
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier: u64 = match unit {
        "" | "B" => 1,
        "kB" | "KB" | "KiB" => 1024,
        "mB" | "MB" | "MiB" => 1024 * 1024,
        "gB" | "GB" | "GiB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    let bytes = (number * multiplier as f64).round();
    (bytes.is_finite() && bytes <= u64::MAX as f64).then_some(bytes as u64)
}

/// Parse `1.25x`
pub(crate) fn parse_speed(value: &str) -> Option<f64> {
    let speed: f64 = value.strip_suffix('x').unwrap_or(value).trim().parse().ok()?;
    speed.is_finite().then_some(speed)
}
