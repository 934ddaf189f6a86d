//! Field extraction from flattened card text
//!
//! Each field is an ordered table of patterns, most specific first. The
//! first pattern that matches decides the value, even when its
//! normalisation yields `None` (an unrendered `∞` must not fall through to a
//! looser pattern that would pick up some other number on the card).

use regex::{Captures, Regex};
use url::Url;

use crate::domain::{DomTree, ImageRef};

/// Numeric token: thousands separators, optional fraction, or the `∞` placeholder
const NUM: &str = r"(∞|[0-9][0-9,]*(?:\.[0-9]+)?|\.[0-9]+)";

/// Unrendered value: dashes or `N/A` standing alone
const PLACEHOLDER: &str = r"(?:-{1,3}|—|–|N/?A)(?:\s|$)";

/// Icons are under this size on both sides; background art is at or above it on both
pub const ICON_MAX_PX: f64 = 64.0;

/// Known non-instrument images: platform logos and UI glyphs
const IMAGE_DENYLIST: &[&str] = &[
    "favicon",
    "logo.svg",
    "ratex-logo",
    "exponent-logo",
    "/icons/",
    "arrow",
    "chevron",
    "tooltip",
    "question",
    "info-circle",
    "spinner",
    "placeholder",
];

/// One entry of a field table
pub struct FieldPattern<T> {
    pub regex: Regex,
    pub normalize: fn(&Captures<'_>) -> Option<T>,
}

impl<T> FieldPattern<T> {
    pub fn new(pattern: &str, normalize: fn(&Captures<'_>) -> Option<T>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            normalize,
        })
    }
}

/// Ordered fallback patterns for a single field
pub struct FieldTable<T> {
    pub field: &'static str,
    pub patterns: Vec<FieldPattern<T>>,
}

impl<T> FieldTable<T> {
    pub fn new(field: &'static str, patterns: Vec<FieldPattern<T>>) -> Self {
        Self { field, patterns }
    }

    /// First matching pattern wins
    pub fn extract(&self, text: &str) -> Option<T> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(text) {
                return (pattern.normalize)(&caps);
            }
        }
        None
    }

    /// Index of the pattern that matched, for diagnostics
    pub fn matched_pattern(&self, text: &str) -> Option<usize> {
        self.patterns.iter().position(|p| p.regex.is_match(text))
    }
}

fn first_number(caps: &Captures<'_>) -> Option<f64> {
    caps.get(1).and_then(|m| parse_number(m.as_str()))
}

fn second_number(caps: &Captures<'_>) -> Option<f64> {
    caps.get(2).and_then(|m| parse_number(m.as_str()))
}

fn labels_alternation(labels: &[&str]) -> String {
    labels
        .iter()
        .map(|l| regex::escape(l).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

impl FieldTable<f64> {
    /// Value with a unit suffix (`x` or `%`) after one of `labels`.
    ///
    /// Only values following their label are read. A value above the label
    /// cannot be told apart from the previous field's value.
    pub fn labelled(field: &'static str, labels: &[&str], suffix: &str) -> Result<Self, regex::Error> {
        let label = labels_alternation(labels);
        let suffix = regex::escape(suffix);
        let patterns = vec![
            // Label: --
            FieldPattern::new(&format!(r"(?i)(?:{label})\s*[:：]?\s*{PLACEHOLDER}"), |_| None)?,
            // Label: 133x
            FieldPattern::new(&format!(r"(?i)(?:{label})\s*[:：]?\s*{NUM}\s*{suffix}"), first_number)?,
            // Label (tooltip) ≈ 133x
            FieldPattern::new(
                &format!(r"(?i)(?:{label})[^0-9∞\n]{{0,40}}\n?[^0-9A-Za-z∞\n]{{0,40}}{NUM}\s*{suffix}"),
                first_number,
            )?,
            // Suffix missing entirely
            FieldPattern::new(&format!(r"(?i)(?:{label})\s*[:：]?\s*{NUM}"), first_number)?,
        ];
        Ok(Self::new(field, patterns))
    }

    /// One bound of a quoted `lo% - hi%` range
    pub fn range_bound(field: &'static str, labels: &[&str], upper: bool) -> Result<Self, regex::Error> {
        let label = labels_alternation(labels);
        let pick: fn(&Captures<'_>) -> Option<f64> = if upper { second_number } else { first_number };
        let patterns = vec![
            FieldPattern::new(
                &format!(r"(?i)(?:{label})\s*[:：]?\s*{NUM}\s*%?\s*[-–~]\s*{NUM}\s*%"),
                pick,
            )?,
            FieldPattern::new(&format!(r"{NUM}\s*%\s*[-–~]\s*{NUM}\s*%"), pick)?,
        ];
        Ok(Self::new(field, patterns))
    }
}

/// Parse a rendered number: strips `,` separators and a trailing `%`/`x`.
/// `∞` is the "not rendered yet" placeholder and yields `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if s.contains('∞') {
        return None;
    }
    if let Some(stripped) = s
        .strip_suffix('%')
        .or_else(|| s.strip_suffix('x'))
        .or_else(|| s.strip_suffix('X'))
    {
        s = stripped.trim_end();
    }
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rewrite protocol-relative URLs to https and reject anything unparseable
pub fn normalize_image_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        trimmed.to_string()
    };
    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "https" | "http" | "data" => Some(url.to_string()),
        _ => None,
    }
}

pub fn is_denylisted(src: &str) -> bool {
    let lc = src.to_ascii_lowercase();
    IMAGE_DENYLIST.iter().any(|d| lc.contains(d))
}

/// Small square-ish icon: both sides known and under the threshold
pub fn is_icon_sized(img: &ImageRef) -> bool {
    matches!((img.width, img.height), (Some(w), Some(h)) if w < ICON_MAX_PX && h < ICON_MAX_PX)
}

/// `url(...)` inside an inline style
pub fn background_url(style: &str) -> Option<String> {
    let caps = BACKGROUND_URL.captures(style)?;
    normalize_image_url(caps.get(1)?.as_str())
}

static BACKGROUND_URL: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*url\(\s*['"]?([^'")]+)['"]?\s*\)"#)
        .expect("background url pattern")
});

/// Instrument icon for `base_asset` among the card's images.
///
/// Preference: an allowed image naming the asset in `alt`/`src`, then the
/// first allowed icon-sized image.
pub fn pick_symbol_image(images: &[ImageRef], base_asset: &str) -> Option<String> {
    let needle = base_asset.trim_end_matches('+').to_ascii_lowercase();
    let allowed: Vec<&ImageRef> = images.iter().filter(|i| !is_denylisted(&i.src)).collect();

    let named = allowed.iter().find(|img| {
        let alt = img.alt.as_deref().unwrap_or_default().to_ascii_lowercase();
        let src = img.src.to_ascii_lowercase();
        !needle.is_empty() && (alt.contains(&needle) || src.contains(&needle)) && !is_background_sized(img)
    });
    if let Some(img) = named {
        if let Some(url) = normalize_image_url(&img.src) {
            return Some(url);
        }
    }

    allowed
        .iter()
        .filter(|img| is_icon_sized(img))
        .find_map(|img| normalize_image_url(&img.src))
}

fn is_background_sized(img: &ImageRef) -> bool {
    matches!((img.width, img.height), (Some(w), Some(h)) if w >= ICON_MAX_PX && h >= ICON_MAX_PX)
}

/// Project art: an inline `background-image` on the card or below it,
/// falling back to the first large allowed `<img>`.
pub fn pick_background_image<T: DomTree>(tree: &T, card: T::Node) -> Option<String> {
    for node in tree.descendants(card) {
        if let Some(url) = tree.attr(node, "style").and_then(background_url) {
            if !is_denylisted(&url) {
                return Some(url);
            }
        }
    }
    tree.images(card)
        .iter()
        .filter(|img| !is_denylisted(&img.src) && is_background_sized(img))
        .find_map(|img| normalize_image_url(&img.src))
}

/// Alt text of the first large allowed image, used as a project-name fallback
pub fn background_alt<T: DomTree>(tree: &T, card: T::Node) -> Option<String> {
    tree.images(card)
        .iter()
        .filter(|img| !is_denylisted(&img.src) && is_background_sized(img))
        .find_map(|img| img.alt.clone())
        .map(|alt| alt.trim().to_string())
        .filter(|alt| !alt.is_empty())
}

/// Project name explicitly labelled on the card
pub static PROJECT_NAME: std::sync::LazyLock<FieldTable<String>> = std::sync::LazyLock::new(|| {
    let clean = |caps: &Captures<'_>| -> Option<String> {
        let name = caps.get(1)?.as_str().trim();
        (!name.is_empty()).then(|| name.to_string())
    };
    FieldTable::new(
        "projectName",
        vec![
            FieldPattern::new(r"(?i)(?:Project|Protocol)\s*[:：]\s*([A-Za-z][A-Za-z0-9 .+-]{0,30}[A-Za-z0-9+])", clean)
                .expect("project pattern"),
            FieldPattern::new(r"\b[Bb]y\s+([A-Z][A-Za-z0-9.+-]{1,30})\b", clean).expect("by pattern"),
        ],
    )
});

/// Explicit maturity timestamp text, e.g. `Maturity 2025-11-28 08:00`
pub static MATURITY_TEXT: std::sync::LazyLock<FieldTable<String>> = std::sync::LazyLock::new(|| {
    let join = |caps: &Captures<'_>| -> Option<String> {
        let date = caps.get(1)?.as_str().replace('/', "-");
        Some(match caps.get(2) {
            Some(time) => format!("{date} {}", time.as_str()),
            None => date,
        })
    };
    let date = r"(\d{4}[-/]\d{2}[-/]\d{2})(?:[ T](\d{2}:\d{2}(?::\d{2})?))?";
    FieldTable::new(
        "maturity",
        vec![
            FieldPattern::new(&format!(r"(?i)(?:Maturity|Matures|Expiry|Expires)(?:\s+(?:on|at))?\s*[:：]?\s*{date}"), join)
                .expect("labelled maturity pattern"),
            FieldPattern::new(&format!(r"\b{date}"), join).expect("bare maturity pattern"),
        ],
    )
});

/// Countdown like `23d 10h` or `23 days 10h 5m`, as (days, hours, minutes)
pub static COUNTDOWN: std::sync::LazyLock<FieldTable<(i64, i64, i64)>> = std::sync::LazyLock::new(|| {
    let parts = |caps: &Captures<'_>| -> Option<(i64, i64, i64)> {
        let num = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<i64>().ok());
        Some((num(1)?, num(2)?, num(3)?))
    };
    FieldTable::new(
        "countdown",
        vec![FieldPattern::new(
            r"(?i)\b(\d+)\s*d(?:ays?)?\s+(\d+)\s*h(?:rs?|ours?)?(?:\s+(\d+)\s*m(?:in)?)?\b",
            parts,
        )
        .expect("countdown pattern")],
    )
});
