use serde::{Deserialize, Serialize};
use tracing::warn;

use super::adjust::{complement, darken, desaturate, lighten, mix};
use super::contrast::{contrast, readable_color};
use super::{Color, ColorError};

/// WCAG AA minimum for normal text
pub const AA_NORMAL_TEXT: f64 = 4.5;
/// WCAG AA minimum for large text (titles)
pub const AA_LARGE_TEXT: f64 = 3.0;
pub const AAA_NORMAL_TEXT: f64 = 7.0;
pub const AAA_LARGE_TEXT: f64 = 4.5;

pub const DEFAULT_SUGGESTION_COUNT: usize = 5;

/// Candidate count used when picking a single best color
const BEST_COLOR_POOL: usize = 10;

const FALLBACKS: [(u32, &str); 6] = [
    (0x000000, "Black"),
    (0xffffff, "White"),
    (0x1a1a1a, "Near Black"),
    (0xf5f5f5, "Near White"),
    (0x333333, "Dark Gray"),
    (0xe0e0e0, "Light Gray"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionMethod {
    Preferred,
    Readable,
    Darken,
    Lighten,
    Desaturate,
    Complement,
    Mix,
    Fallback,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSuggestion {
    pub color: Color,
    pub label: String,
    pub method: SuggestionMethod,
    /// Contrast against the background the suggestion was made for
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcagLevel {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA")]
    Aa,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastCheck {
    pub is_valid: bool,
    pub ratio: f64,
    pub level: WcagLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeValidation {
    pub background_text: ContrastCheck,
    pub background_title: ContrastCheck,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

struct Collector {
    background: Color,
    target_ratio: f64,
    count: usize,
    found: Vec<ColorSuggestion>,
}

impl Collector {
    fn is_full(&self) -> bool {
        self.found.len() >= self.count
    }

    fn contains(&self, color: Color) -> bool {
        self.found.iter().any(|s| s.color == color)
    }

    fn offer(&mut self, color: Color, label: impl Into<String>, method: SuggestionMethod) {
        let ratio = contrast(self.background, color);
        if ratio >= self.target_ratio {
            self.found.push(ColorSuggestion {
                color,
                label: label.into(),
                method,
                ratio,
            });
        }
    }

    /// Offer `make(step)` for each step until the collector fills up
    fn sweep(
        &mut self,
        steps: impl IntoIterator<Item = u32>,
        method: SuggestionMethod,
        make: impl Fn(f64) -> Color,
        label: impl Fn(u32) -> String,
    ) {
        for percent in steps {
            if self.is_full() {
                break;
            }
            let color = make(f64::from(percent) / 100.0);
            self.offer(color, label(percent), method);
        }
    }

    fn finish(self) -> Vec<ColorSuggestion> {
        let mut unique: Vec<ColorSuggestion> = Vec::with_capacity(self.found.len());
        for suggestion in self.found {
            if !unique.iter().any(|s| s.color == suggestion.color) {
                unique.push(suggestion);
            }
        }
        // Stable, so equal ratios keep strategy order
        unique.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
        unique.truncate(self.count);
        unique
    }
}

/// Search for up to `count` colors reaching `target_ratio` against `background`.
///
/// When `preferred` already passes it is returned alone. Otherwise the
/// strategies are tried in a fixed order (auto-readable, darken, lighten,
/// desaturate, complement, mix, fixed fallbacks) and the passing candidates
/// come back deduplicated, highest contrast first.
pub fn suggest_colors(
    background: Color,
    preferred: Color,
    count: usize,
    target_ratio: f64,
) -> Vec<ColorSuggestion> {
    let mut collector = Collector {
        background,
        target_ratio,
        count,
        found: Vec::new(),
    };

    let preferred_ratio = contrast(background, preferred);
    if preferred_ratio >= target_ratio {
        collector.offer(preferred, "Preferred", SuggestionMethod::Preferred);
        return collector.finish();
    }

    if !collector.is_full() {
        collector.offer(readable_color(background), "Auto", SuggestionMethod::Readable);
    }

    collector.sweep(
        (10..=90).step_by(10),
        SuggestionMethod::Darken,
        |amount| darken(preferred, amount),
        |pct| format!("{pct}% Darker"),
    );
    collector.sweep(
        (10..=90).step_by(10),
        SuggestionMethod::Lighten,
        |amount| lighten(preferred, amount),
        |pct| format!("{pct}% Lighter"),
    );
    collector.sweep(
        (20..=80).step_by(20),
        SuggestionMethod::Desaturate,
        |amount| desaturate(preferred, amount),
        |pct| format!("{pct}% Less Saturated"),
    );

    if !collector.is_full() {
        collector.offer(complement(preferred), "Complement", SuggestionMethod::Complement);
    }

    collector.sweep(
        (10..=30).step_by(10),
        SuggestionMethod::Mix,
        |share| mix(share, preferred, background),
        |pct| format!("Mixed {pct}%"),
    );

    for (hex, label) in FALLBACKS {
        if collector.is_full() {
            break;
        }
        let color = Color::from_hex(hex);
        if !collector.contains(color) {
            collector.offer(color, label, SuggestionMethod::Fallback);
        }
    }

    collector.finish()
}

fn emergency_pair() -> Vec<ColorSuggestion> {
    [(Color::BLACK, "Black"), (Color::WHITE, "White")]
        .into_iter()
        .map(|(color, label)| ColorSuggestion {
            color,
            label: label.to_string(),
            method: SuggestionMethod::Emergency,
            ratio: 21.0,
        })
        .collect()
}

fn try_suggest(
    background: &str,
    preferred: &str,
    count: usize,
    target_ratio: f64,
) -> Result<Vec<ColorSuggestion>, ColorError> {
    if !(1.0..=21.0).contains(&target_ratio) {
        return Err(ColorError::InvalidRatio(target_ratio));
    }
    let background: Color = background.parse()?;
    let preferred: Color = preferred.parse()?;
    Ok(suggest_colors(background, preferred, count, target_ratio))
}

/// [`suggest_colors`] over color strings.
///
/// Unparseable input (or a ratio outside `[1, 21]`) yields the black/white
/// emergency pair instead of an error.
pub fn suggest(
    background: &str,
    preferred: &str,
    count: usize,
    target_ratio: f64,
) -> Vec<ColorSuggestion> {
    match try_suggest(background, preferred, count, target_ratio) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!(error = %e, "color suggestion failed, returning emergency pair");
            emergency_pair()
        }
    }
}

/// `preferred` if it passes AA on `background`, else the highest-contrast suggestion
pub fn best_accessible(background: Color, preferred: Color) -> Color {
    if contrast(background, preferred) >= AA_NORMAL_TEXT {
        return preferred;
    }

    suggest_colors(background, preferred, BEST_COLOR_POOL, AA_NORMAL_TEXT)
        .first()
        .map(|s| s.color)
        .unwrap_or_else(|| readable_color(background))
}

/// String form of [`best_accessible`]; a passing `preferred` comes back verbatim
pub fn best_accessible_color(background: &str, preferred: &str) -> String {
    let Ok(bg) = background.parse::<Color>() else {
        warn!(background, "unparseable background color, using black");
        return Color::BLACK.to_string();
    };
    let Ok(pref) = preferred.parse::<Color>() else {
        return readable_color(bg).to_string();
    };

    if contrast(bg, pref) >= AA_NORMAL_TEXT {
        return preferred.to_string();
    }
    best_accessible(bg, pref).to_string()
}

/// Grade one color pair against WCAG (AA 4.5 / AAA 7, or 3 / 4.5 for large text)
pub fn validate_contrast(first: &str, second: &str, large_text: bool) -> ContrastCheck {
    let (Ok(a), Ok(b)) = (first.parse::<Color>(), second.parse::<Color>()) else {
        return ContrastCheck {
            is_valid: false,
            ratio: 0.0,
            level: WcagLevel::Fail,
            message: "Invalid color format".to_string(),
        };
    };

    let ratio = contrast(a, b);
    let (aa, aaa) = if large_text {
        (AA_LARGE_TEXT, AAA_LARGE_TEXT)
    } else {
        (AA_NORMAL_TEXT, AAA_NORMAL_TEXT)
    };

    let (level, message) = if ratio >= aaa {
        (WcagLevel::Aaa, format!("Excellent contrast ratio: {ratio:.2}:1"))
    } else if ratio >= aa {
        (WcagLevel::Aa, format!("Good contrast ratio: {ratio:.2}:1"))
    } else {
        (
            WcagLevel::Fail,
            format!("Poor contrast ratio: {ratio:.2}:1. Minimum required: {aa}:1"),
        )
    };

    ContrastCheck {
        is_valid: ratio >= aa,
        ratio,
        level,
        message,
    }
}

/// Text must pass AA for normal text, the title AA for large text
pub fn validate_theme(background: &str, text: &str, title: &str) -> ThemeValidation {
    let background_text = validate_contrast(background, text, false);
    let background_title = validate_contrast(background, title, true);

    let mut errors = Vec::new();
    if !background_text.is_valid {
        errors.push(format!(
            "Text color has insufficient contrast with background. {}",
            background_text.message
        ));
    }
    if !background_title.is_valid {
        errors.push(format!(
            "Title color has insufficient contrast with background. {}",
            background_title.message
        ));
    }

    ThemeValidation {
        is_valid: background_text.is_valid && background_title.is_valid,
        background_text,
        background_title,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(value: u32) -> Color {
        Color::from_hex(value)
    }

    #[test]
    fn passing_preferred_is_returned_alone() {
        let result = suggest("#ffffff", "#333333", 5, AA_NORMAL_TEXT);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].color, hex(0x333333));
        assert_eq!(result[0].method, SuggestionMethod::Preferred);
    }

    #[test]
    fn light_gray_on_white_gets_dark_alternatives() {
        let result = suggest("#ffffff", "#eeeeee", 5, AA_NORMAL_TEXT);

        assert!(!result.is_empty() && result.len() <= 5);
        assert!(result.iter().all(|s| s.color != hex(0xeeeeee)));
        assert!(result
            .iter()
            .all(|s| contrast(Color::WHITE, s.color) >= AA_NORMAL_TEXT));
        assert!(result
            .iter()
            .any(|s| FALLBACKS.iter().any(|(h, _)| hex(*h) == s.color)));
        assert!(result.windows(2).all(|w| w[0].ratio >= w[1].ratio));
        assert_eq!(result[0].color, Color::BLACK);
    }

    #[test]
    fn strategies_run_in_order_until_count_is_reached() {
        let result = suggest_colors(Color::WHITE, hex(0xeeeeee), 5, AA_NORMAL_TEXT);
        let methods: Vec<SuggestionMethod> = result.iter().map(|s| s.method).collect();

        // Auto-readable black, then the four darkest steps of the darken sweep
        assert_eq!(methods[0], SuggestionMethod::Readable);
        assert!(methods[1..].iter().all(|m| *m == SuggestionMethod::Darken));
        assert_eq!(result[1].label, "80% Darker");
        assert_eq!(result[4].label, "50% Darker");
    }

    #[test]
    fn duplicates_keep_the_first_occurrence() {
        // On black the auto-readable color is white, so the "White" fallback must not repeat it
        let result = suggest_colors(Color::BLACK, hex(0x050505), 10, AA_NORMAL_TEXT);
        let whites: Vec<&ColorSuggestion> =
            result.iter().filter(|s| s.color == Color::WHITE).collect();
        assert_eq!(whites.len(), 1);
        assert_eq!(whites[0].method, SuggestionMethod::Readable);
    }

    #[test]
    fn large_text_target_accepts_more_candidates() {
        let strict = suggest("#ffffff", "#999999", 10, AA_NORMAL_TEXT);
        let relaxed = suggest("#ffffff", "#999999", 10, AA_LARGE_TEXT);
        assert!(relaxed.iter().all(|s| s.ratio >= AA_LARGE_TEXT));
        assert!(relaxed.iter().any(|s| s.ratio < AA_NORMAL_TEXT));
        assert!(strict.iter().all(|s| s.ratio >= AA_NORMAL_TEXT));
    }

    #[test]
    fn malformed_input_falls_back_to_emergency_pair() {
        for result in [
            suggest("not-a-color", "#eeeeee", 5, AA_NORMAL_TEXT),
            suggest("#ffffff", "#zzzzzz", 5, AA_NORMAL_TEXT),
            suggest("#ffffff", "#eeeeee", 5, f64::NAN),
        ] {
            assert_eq!(result.len(), 2);
            assert_eq!(result[0].color, Color::BLACK);
            assert_eq!(result[1].color, Color::WHITE);
            assert!(result
                .iter()
                .all(|s| s.method == SuggestionMethod::Emergency && s.ratio == 21.0));
        }
    }

    #[test]
    fn zero_count_yields_nothing() {
        assert!(suggest("#ffffff", "#eeeeee", 0, AA_NORMAL_TEXT).is_empty());
    }

    #[test]
    fn best_color_prefers_the_input_when_it_passes() {
        assert_eq!(best_accessible_color("#ffffff", "#333"), "#333");
        assert_eq!(best_accessible_color("#ffffff", "#eeeeee"), "#000000");
        assert_eq!(best_accessible_color("#ffffff", "nonsense"), "#000000");
        assert_eq!(best_accessible_color("#111111", "nonsense"), "#ffffff");
        assert_eq!(best_accessible_color("nonsense", "#eeeeee"), "#000000");
    }

    #[test]
    fn theme_with_pale_text_fails_both_checks() {
        let result = validate_theme("#ffffff", "#fafafa", "#f0f0f0");
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("Text color"));
        assert!(result.errors[1].starts_with("Title color"));
        assert!(result.errors[1].ends_with("Minimum required: 3:1"));
    }

    #[test]
    fn title_only_needs_large_text_contrast() {
        // #949494 on white is about 3.03: enough for a title, not for body text
        let result = validate_theme("#ffffff", "#000000", "#949494");
        assert!(result.is_valid);
        assert_eq!(result.background_text.level, WcagLevel::Aaa);
        assert_eq!(result.background_title.level, WcagLevel::Aa);

        let result = validate_theme("#ffffff", "#949494", "#000000");
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn invalid_colors_fail_validation() {
        let check = validate_contrast("#ffffff", "bogus", false);
        assert!(!check.is_valid);
        assert_eq!(check.ratio, 0.0);
        assert_eq!(check.message, "Invalid color format");
    }
}
