use super::named::named_color;
use super::{Color, ColorError};

/// Parse hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`), `rgb[a]()`, `hsl[a]()`
/// and CSS named colors.
pub(super) fn parse_color(input: &str) -> Result<Color, ColorError> {
    let invalid = || ColorError::InvalidColor(input.to_string());
    let value = input.trim().to_ascii_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }

    if let Some((name, args)) = split_function(&value) {
        let parsed = match name {
            "rgb" | "rgba" => parse_rgb_args(args),
            "hsl" | "hsla" => parse_hsl_args(args),
            _ => None,
        };
        return parsed.ok_or_else(invalid);
    }

    if value == "transparent" {
        return Ok(Color::rgba(0, 0, 0, 0));
    }

    named_color(&value).ok_or_else(invalid)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// `name(args)` -> (`name`, `args`)
fn split_function(value: &str) -> Option<(&str, &str)> {
    let open = value.find('(')?;
    let args = value[open + 1..].strip_suffix(')')?;
    Some((value[..open].trim(), args))
}

/// Accepts both `1, 2, 3, 0.5` and `1 2 3 / 50%`
fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// `50%` -> 0.5, `0.5` -> 0.5
fn parse_alpha(raw: &str) -> Option<u8> {
    let alpha = match raw.strip_suffix('%') {
        Some(pct) => parse_number(pct)? / 100.0,
        None => parse_number(raw)?,
    };
    Some((alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |raw: &str| -> Option<u8> {
        let value = match raw.strip_suffix('%') {
            Some(pct) => parse_number(pct)? * 2.55,
            None => parse_number(raw)?,
        };
        Some(value.clamp(0.0, 255.0).round() as u8)
    };

    let alpha = match parts.get(3) {
        Some(raw) => parse_alpha(raw)?,
        None => 255,
    };

    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

fn parse_hsl_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let hue = parse_number(parts[0].strip_suffix("deg").unwrap_or(parts[0]))?;
    let percent = |raw: &str| -> Option<f64> {
        let value = parse_number(raw.strip_suffix('%')?)?;
        Some((value / 100.0).clamp(0.0, 1.0))
    };

    let alpha = match parts.get(3) {
        Some(raw) => parse_alpha(raw)?,
        None => 255,
    };

    let mut color = super::adjust::hsl_to_rgb(hue, percent(parts[1])?, percent(parts[2])?);
    color.a = alpha;
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_color("#fff"), Ok(Color::WHITE));
        assert_eq!(parse_color("#1A1A1A"), Ok(Color::from_hex(0x1a1a1a)));
        assert_eq!(parse_color("#00000080"), Ok(Color::rgba(0, 0, 0, 128)));
        assert_eq!(parse_color("#f008"), Ok(Color::rgba(255, 0, 0, 136)));
    }

    #[test]
    fn parses_functional_forms() {
        assert_eq!(parse_color("rgb(51, 51, 51)"), Ok(Color::from_hex(0x333333)));
        assert_eq!(
            parse_color("rgba(255, 0, 0, 0.5)"),
            Ok(Color::rgba(255, 0, 0, 128))
        );
        assert_eq!(
            parse_color("rgb(0 128 255 / 50%)"),
            Ok(Color::rgba(0, 128, 255, 128))
        );
        assert_eq!(parse_color("hsl(0, 100%, 50%)"), Ok(Color::rgb(255, 0, 0)));
        assert_eq!(parse_color("hsl(120deg 100% 25%)"), Ok(Color::rgb(0, 128, 0)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(parse_color("White"), Ok(Color::WHITE));
        assert_eq!(parse_color(" navy "), Ok(Color::from_hex(0x000080)));
        assert_eq!(parse_color("transparent"), Ok(Color::rgba(0, 0, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "#ggg", "#12345", "rgb(1, 2)", "hsl(10, 20, 30)", "blurple", "rgb(1,2,3"] {
            assert_eq!(
                parse_color(bad),
                Err(ColorError::InvalidColor(bad.to_string())),
                "{bad:?} should not parse"
            );
        }
    }
}
