//! Parsing for human-written duration strings such as `"24h"` or `"1h30m"`.

use std::time::Duration;

/// Parse a duration made of one or more `<number><unit>` segments.
///
/// Supported units: `ms`, `s`, `m`, `h`, `d`. Numbers may carry a decimal
/// fraction (`"1.5h"`). Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns a description of the problem when the string is empty, a segment
/// is missing its number or unit, or a unit is unknown.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("expected a number in duration '{s}'"));
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let unit_ms: u64 = match unit {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "" => return Err(format!("missing unit in duration '{s}'")),
            other => return Err(format!("unknown unit '{other}' in duration '{s}'")),
        };

        let segment = if let Ok(whole) = number.parse::<u64>() {
            whole
                .checked_mul(unit_ms)
                .map(Duration::from_millis)
                .ok_or_else(|| format!("duration '{s}' out of range"))?
        } else {
            let value: f64 = number
                .parse()
                .map_err(|_| format!("invalid number '{number}' in duration '{s}'"))?;
            #[allow(clippy::cast_precision_loss)]
            let secs = value * unit_ms as f64 / 1_000.0;
            Duration::try_from_secs_f64(secs)
                .map_err(|e| format!("duration '{s}' out of range: {e}"))?
        };

        total = total
            .checked_add(segment)
            .ok_or_else(|| format!("duration '{s}' out of range"))?;
        rest = next;
    }

    Ok(total)
}
