//! CSS length parsing for slide distances.

use serde::Deserialize;

use crate::host::Size;

/// Side the element slides in from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Top,
    Right,
    #[default]
    Bottom,
    Left,
}

impl Direction {
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Top | Direction::Bottom)
    }

    /// Translation in px for an element `distance` away from its resting place.
    pub fn offset(self, distance: f64) -> (f64, f64) {
        match self {
            Direction::Top => (0.0, -distance),
            Direction::Right => (distance, 0.0),
            Direction::Bottom => (0.0, distance),
            Direction::Left => (-distance, 0.0),
        }
    }
}

/// Layout inputs for relative units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceContext {
    /// Bounding box of the element itself, used by `%`.
    pub container: Size,
    pub root_font_size: Option<f64>,
    pub viewport: Size,
}

const FALLBACK_DISTANCE: f64 = 50.0;
const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Resolves `input` to px.
///
/// Accepts `px`, `rem`, `em`, `%`, `vh` and `vw`. `em` resolves against the
/// root font size like `rem`. Anything else falls back to its leading number,
/// or 50 when that is missing or zero.
pub fn parse_distance(input: &str, direction: Direction, ctx: &DistanceContext) -> f64 {
    let Some((value, unit)) = split_length(input) else {
        return match leading_number(input) {
            Some(n) if n != 0.0 => n,
            _ => FALLBACK_DISTANCE,
        };
    };
    match unit {
        "px" => value,
        "rem" | "em" => {
            let font_size = ctx
                .root_font_size
                .filter(|px| *px != 0.0 && px.is_finite())
                .unwrap_or(DEFAULT_FONT_SIZE);
            value * font_size
        }
        "%" => {
            let dimension = if direction.is_vertical() {
                ctx.container.height
            } else {
                ctx.container.width
            };
            value / 100.0 * dimension
        }
        "vh" => value / 100.0 * ctx.viewport.height,
        "vw" => value / 100.0 * ctx.viewport.width,
        _ => value,
    }
}

const UNITS: [&str; 6] = ["rem", "px", "em", "%", "vh", "vw"];

/// Splits `-?\d+\.?\d*<unit>` into its number and unit.
fn split_length(input: &str) -> Option<(f64, &'static str)> {
    let unit = UNITS.into_iter().find(|unit| input.ends_with(unit))?;
    let number = &input[..input.len() - unit.len()];
    let digits = number.strip_prefix('-').unwrap_or(number);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (digits, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int.is_empty() || !all_digits(int) || !all_digits(frac) {
        return None;
    }
    number.parse().ok().map(|value| (value, unit))
}

/// Longest numeric prefix, after leading whitespace.
fn leading_number(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DistanceContext {
        DistanceContext {
            container: Size::new(400.0, 200.0),
            root_font_size: Some(16.0),
            viewport: Size::new(1000.0, 800.0),
        }
    }

    #[test]
    fn resolves_every_unit() {
        let ctx = ctx();
        assert_eq!(parse_distance("50%", Direction::Bottom, &ctx), 100.0);
        assert_eq!(parse_distance("50%", Direction::Left, &ctx), 200.0);
        assert_eq!(parse_distance("2rem", Direction::Bottom, &ctx), 32.0);
        assert_eq!(parse_distance("1.5em", Direction::Top, &ctx), 24.0);
        assert_eq!(parse_distance("-20px", Direction::Top, &ctx), -20.0);
        assert_eq!(parse_distance("10vh", Direction::Top, &ctx), 80.0);
        assert_eq!(parse_distance("10vw", Direction::Top, &ctx), 100.0);
        assert_eq!(parse_distance("12.px", Direction::Top, &ctx), 12.0);
    }

    #[test]
    fn missing_root_font_size_defaults_to_16() {
        let ctx = DistanceContext {
            root_font_size: None,
            ..ctx()
        };
        assert_eq!(parse_distance("2rem", Direction::Bottom, &ctx), 32.0);
    }

    #[test]
    fn unknown_formats_fall_back_to_leading_number_or_50() {
        let ctx = ctx();
        assert_eq!(parse_distance("garbage", Direction::Bottom, &ctx), 50.0);
        assert_eq!(parse_distance("", Direction::Bottom, &ctx), 50.0);
        assert_eq!(parse_distance("0", Direction::Bottom, &ctx), 50.0);
        assert_eq!(parse_distance("30", Direction::Bottom, &ctx), 30.0);
        assert_eq!(parse_distance(" 12.5pt", Direction::Bottom, &ctx), 12.5);
        assert_eq!(parse_distance(".5px ", Direction::Bottom, &ctx), 0.5);
        assert_eq!(parse_distance("1e2furlongs", Direction::Bottom, &ctx), 100.0);
    }

    #[test]
    fn offsets_point_away_from_the_resting_place() {
        assert_eq!(Direction::Top.offset(10.0), (0.0, -10.0));
        assert_eq!(Direction::Right.offset(10.0), (10.0, 0.0));
        assert_eq!(Direction::Bottom.offset(10.0), (0.0, 10.0));
        assert_eq!(Direction::Left.offset(10.0), (-10.0, 0.0));
    }

    #[test]
    fn directions_deserialize_lowercase() {
        let d: Direction = serde_json::from_str(r#""left""#).unwrap();
        assert_eq!(d, Direction::Left);
        assert_eq!(Direction::default(), Direction::Bottom);
    }
}
