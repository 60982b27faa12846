use super::Color;

fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance in `[0, 1]`; alpha is ignored
pub fn relative_luminance(color: Color) -> f64 {
    0.2126 * linearize(color.r) + 0.7152 * linearize(color.g) + 0.0722 * linearize(color.b)
}

/// WCAG contrast ratio in `[1, 21]`, rounded to two decimals.
///
/// Symmetric in its arguments. Rounding makes black on white exactly 21.
pub fn contrast(a: Color, b: Color) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    let ratio = (lighter + 0.05) / (darker + 0.05);
    ((ratio * 100.0).round() / 100.0).clamp(1.0, 21.0)
}

/// Black or white, whichever contrasts more with `background` (black on ties)
pub fn readable_color(background: Color) -> Color {
    if contrast(background, Color::BLACK) >= contrast(background, Color::WHITE) {
        Color::BLACK
    } else {
        Color::WHITE
    }
}
