use super::Color;

/// Hue in degrees, saturation and lightness in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Hsl {
    h: f64,
    s: f64,
    l: f64,
}

fn rgb_to_hsl(color: Color) -> Hsl {
    let r = f64::from(color.r) / 255.0;
    let g = f64::from(color.g) / 255.0;
    let b = f64::from(color.b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let delta = max - min;
    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Hsl { h: h * 60.0, s, l }
}

pub(super) fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Color {
    let hue = hue.rem_euclid(360.0);
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let m = lightness - chroma / 2.0;
    let to_channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::rgb(to_channel(r), to_channel(g), to_channel(b))
}

fn from_hsl(hsl: Hsl, alpha: u8) -> Color {
    let mut color = hsl_to_rgb(hsl.h, hsl.s, hsl.l);
    color.a = alpha;
    color
}

/// Lower HSL lightness by `amount` (0..1)
pub fn darken(color: Color, amount: f64) -> Color {
    let mut hsl = rgb_to_hsl(color);
    hsl.l = (hsl.l - amount).clamp(0.0, 1.0);
    from_hsl(hsl, color.a)
}

/// Raise HSL lightness by `amount` (0..1)
pub fn lighten(color: Color, amount: f64) -> Color {
    let mut hsl = rgb_to_hsl(color);
    hsl.l = (hsl.l + amount).clamp(0.0, 1.0);
    from_hsl(hsl, color.a)
}

/// Lower HSL saturation by `amount` (0..1)
pub fn desaturate(color: Color, amount: f64) -> Color {
    let mut hsl = rgb_to_hsl(color);
    hsl.s = (hsl.s - amount).clamp(0.0, 1.0);
    from_hsl(hsl, color.a)
}

/// Rotate the hue by 180 degrees
pub fn complement(color: Color) -> Color {
    let mut hsl = rgb_to_hsl(color);
    hsl.h = (hsl.h + 180.0).rem_euclid(360.0);
    from_hsl(hsl, color.a)
}

/// Blend `first` into `second`, `weight` being the share of `first` (0..1).
///
/// Alpha participates the way CSS preprocessors mix: when the alphas differ
/// the more opaque color pulls the channels towards itself.
pub fn mix(weight: f64, first: Color, second: Color) -> Color {
    let weight = weight.clamp(0.0, 1.0);
    let alpha_delta = first.alpha() - second.alpha();
    let x = weight * 2.0 - 1.0;
    // Fully weighted mixes of opposite alphas would divide by zero
    let normalized = if x * alpha_delta == -1.0 {
        x
    } else {
        (x + alpha_delta) / (1.0 + x * alpha_delta)
    };
    let first_weight = (normalized + 1.0) / 2.0;
    let second_weight = 1.0 - first_weight;

    let channel = |a: u8, b: u8| {
        (f64::from(a) * first_weight + f64::from(b) * second_weight)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    let alpha = first.alpha() * weight + second.alpha() * (1.0 - weight);

    Color::rgba(
        channel(first.r, second.r),
        channel(first.g, second.g),
        channel(first.b, second.b),
        (alpha * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_round_trips_primary_colors() {
        for color in [
            Color::rgb(255, 0, 0),
            Color::rgb(0, 255, 0),
            Color::rgb(0, 0, 255),
            Color::from_hex(0x336699),
            Color::WHITE,
            Color::BLACK,
        ] {
            let hsl = rgb_to_hsl(color);
            assert_eq!(hsl_to_rgb(hsl.h, hsl.s, hsl.l), color);
        }
    }

    #[test]
    fn darken_and_lighten_clamp() {
        let gray = Color::from_hex(0x808080);
        assert_eq!(darken(gray, 0.9), Color::BLACK);
        assert_eq!(lighten(gray, 0.9), Color::WHITE);
        assert_eq!(darken(Color::from_hex(0xeeeeee), 0.4), Color::from_hex(0x888888));
    }

    #[test]
    fn adjustments_keep_alpha() {
        let translucent = Color::rgba(200, 40, 40, 128);
        assert_eq!(darken(translucent, 0.2).a, 128);
        assert_eq!(complement(translucent).a, 128);
    }

    #[test]
    fn desaturate_moves_towards_gray() {
        let red = Color::rgb(255, 0, 0);
        assert_eq!(desaturate(red, 1.0), Color::from_hex(0x808080));
    }

    #[test]
    fn complement_of_red_is_cyan() {
        assert_eq!(complement(Color::rgb(255, 0, 0)), Color::rgb(0, 255, 255));
    }

    #[test]
    fn mix_weights_the_first_color() {
        assert_eq!(mix(1.0, Color::BLACK, Color::WHITE), Color::BLACK);
        assert_eq!(mix(0.0, Color::BLACK, Color::WHITE), Color::WHITE);
        assert_eq!(
            mix(0.25, Color::BLACK, Color::WHITE),
            Color::from_hex(0xbfbfbf)
        );
    }

    #[test]
    fn mix_of_opposite_alphas_at_full_weight() {
        let clear = Color::rgba(0, 0, 0, 0);
        assert_eq!(mix(1.0, clear, Color::WHITE), clear);
        assert_eq!(mix(0.0, Color::WHITE, clear), clear);
        assert_eq!(mix(1.0, Color::WHITE, clear), Color::WHITE);
    }
}
