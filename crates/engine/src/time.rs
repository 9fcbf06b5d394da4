use crate::error::{EngineError, Result, TimeParseReason};

/// Milliseconds per second; the codec's precision.
pub const MILLIS_PER_SECOND: i64 = 1_000;

const MILLIS_PER_MINUTE: u64 = 60_000;
const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Rounds `seconds` to the nearest whole millisecond.
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * MILLIS_PER_SECOND as f64).round() as i64
}

/// Converts whole milliseconds back to seconds.
pub fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / MILLIS_PER_SECOND as f64
}

/// Renders `seconds` as zero-padded `HH:MM:SS`, appending `.fff` when the
/// value has a non-zero millisecond part.
///
/// # Example
/// ```
/// use span_engine::time::format_hhmmss;
///
/// assert_eq!(format_hhmmss(65.0).expect("valid"), "00:01:05");
/// assert_eq!(format_hhmmss(3_725.25).expect("valid"), "01:02:05.250");
/// assert!(format_hhmmss(-1.0).is_err());
/// ```
pub fn format_hhmmss(seconds: f64) -> Result<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(EngineError::InvalidSeconds(seconds));
    }

    let total_ms = seconds_to_millis(seconds) as u64;
    let hours = total_ms / MILLIS_PER_HOUR;
    let minutes = (total_ms % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let secs = (total_ms % MILLIS_PER_MINUTE) / 1_000;
    let millis = total_ms % 1_000;

    if millis == 0 {
        Ok(format!("{hours:02}:{minutes:02}:{secs:02}"))
    } else {
        Ok(format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}"))
    }
}

/// Parses `HH:MM:SS`, `MM:SS` or bare seconds into seconds, rounded to the
/// millisecond. The seconds component may carry a fractional part.
///
/// Minutes and seconds must stay below 60 whenever a larger unit is present.
///
/// # Example
/// ```
/// use span_engine::time::parse_hhmmss;
///
/// assert_eq!(parse_hhmmss("01:02:05.250").expect("valid"), 3_725.25);
/// assert_eq!(parse_hhmmss("02:05").expect("valid"), 125.0);
/// assert_eq!(parse_hhmmss("90").expect("valid"), 90.0);
/// assert!(parse_hhmmss("00:61").is_err());
/// ```
pub fn parse_hhmmss(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(parse_error(text, TimeParseReason::Empty));
    }

    let components: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match components.as_slice() {
        [seconds] => ("0", "0", *seconds),
        [minutes, seconds] => ("0", *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return Err(parse_error(text, TimeParseReason::TooManyComponents)),
    };

    let hours = parse_whole(hours).ok_or_else(|| parse_error(text, TimeParseReason::NotNumeric))?;
    let minutes =
        parse_whole(minutes).ok_or_else(|| parse_error(text, TimeParseReason::NotNumeric))?;
    let seconds_ms =
        parse_seconds_ms(seconds).ok_or_else(|| parse_error(text, TimeParseReason::NotNumeric))?;

    if components.len() > 1 && (minutes >= 60 || seconds_ms >= MILLIS_PER_MINUTE) {
        return Err(parse_error(text, TimeParseReason::ComponentOutOfRange));
    }

    let total_ms = hours
        .checked_mul(MILLIS_PER_HOUR)
        .and_then(|ms| ms.checked_add(minutes.checked_mul(MILLIS_PER_MINUTE)?))
        .and_then(|ms| ms.checked_add(seconds_ms))
        .filter(|ms| *ms <= i64::MAX as u64)
        .ok_or_else(|| parse_error(text, TimeParseReason::ComponentOutOfRange))?;

    Ok(millis_to_seconds(total_ms as i64))
}

fn parse_error(text: &str, reason: TimeParseReason) -> EngineError {
    EngineError::TimeParse {
        value: text.to_string(),
        reason,
    }
}

fn parse_whole(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok()
}

/// Parses `SS` or `SS.fff...` into milliseconds, rounding extra fraction digits.
fn parse_seconds_ms(value: &str) -> Option<u64> {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    let whole_ms = parse_whole(whole)?.checked_mul(1_000)?;

    let Some(fraction) = fraction else {
        return Some(whole_ms);
    };
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let padded: String = fraction.chars().chain("000".chars()).take(4).collect();
    let ten_thousandths = padded.parse::<u64>().ok()?;
    let fraction_ms = (ten_thousandths + 5) / 10;
    whole_ms.checked_add(fraction_ms)
}
