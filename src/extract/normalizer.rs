//! Source vocabulary and canonical record construction
//!
//! Both platforms describe the same instrument with different labels and
//! different maturity encodings. This module is the only place that knows
//! either vocabulary.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::fields::{
    background_alt, pick_background_image, pick_symbol_image, FieldTable, COUNTDOWN, MATURITY_TEXT,
    PROJECT_NAME,
};
use crate::domain::{AssetRecord, DomTree, Source};

/// Field labels as rendered by one platform
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub source: Source,
    pub leverage_labels: &'static [&'static str],
    pub apy_labels: &'static [&'static str],
    pub implied_labels: &'static [&'static str],
    pub range_labels: &'static [&'static str],
    pub asset_boost_labels: &'static [&'static str],
    pub ratex_boost_labels: &'static [&'static str],
    /// Token that must appear in a card's text for the leverage field
    pub card_leverage_token: &'static str,
    /// Token that must appear in a card's text for the APY field
    pub card_apy_token: &'static str,
}

pub const RATEX_VOCABULARY: Vocabulary = Vocabulary {
    source: Source::Ratex,
    leverage_labels: &["Yield Exposure"],
    apy_labels: &["Underlying APY", "Base APY"],
    implied_labels: &["Implied Yield", "Implied APY"],
    range_labels: &["Yield Range", "Range"],
    asset_boost_labels: &["Asset Boost"],
    ratex_boost_labels: &["RateX Boost"],
    card_leverage_token: "Yield Exposure",
    card_apy_token: "APY",
};

pub const EXPONENT_VOCABULARY: Vocabulary = Vocabulary {
    source: Source::Exponent,
    leverage_labels: &["Effective Exposure"],
    apy_labels: &["Underlying APY", "Underlying Yield"],
    implied_labels: &["Implied APY", "Fixed APY", "Implied Yield"],
    range_labels: &["APY Range", "Range"],
    asset_boost_labels: &["Points Boost", "Asset Boost"],
    ratex_boost_labels: &[],
    card_leverage_token: "Effective Exposure",
    card_apy_token: "APY",
};

pub fn vocabulary(source: Source) -> &'static Vocabulary {
    match source {
        Source::Ratex => &RATEX_VOCABULARY,
        Source::Exponent => &EXPONENT_VOCABULARY,
    }
}

/// Compiled field tables for one vocabulary
pub struct SourceTables {
    pub leverage: FieldTable<f64>,
    pub apy: FieldTable<f64>,
    pub implied_yield: FieldTable<f64>,
    pub range_lower: FieldTable<f64>,
    pub range_upper: FieldTable<f64>,
    pub asset_boost: FieldTable<f64>,
    pub ratex_boost: Option<FieldTable<f64>>,
}

impl SourceTables {
    fn compile(vocab: &Vocabulary) -> Result<Self, regex::Error> {
        Ok(Self {
            leverage: FieldTable::labelled("leverage", vocab.leverage_labels, "x")?,
            apy: FieldTable::labelled("apy", vocab.apy_labels, "%")?,
            implied_yield: FieldTable::labelled("impliedYield", vocab.implied_labels, "%")?,
            range_lower: FieldTable::range_bound("rangeLower", vocab.range_labels, false)?,
            range_upper: FieldTable::range_bound("rangeUpper", vocab.range_labels, true)?,
            asset_boost: FieldTable::labelled("assetBoost", vocab.asset_boost_labels, "x")?,
            ratex_boost: if vocab.ratex_boost_labels.is_empty() {
                None
            } else {
                Some(FieldTable::labelled("ratexBoost", vocab.ratex_boost_labels, "x")?)
            },
        })
    }
}

static RATEX_TABLES: LazyLock<SourceTables> =
    LazyLock::new(|| SourceTables::compile(&RATEX_VOCABULARY).expect("ratex field tables"));

static EXPONENT_TABLES: LazyLock<SourceTables> =
    LazyLock::new(|| SourceTables::compile(&EXPONENT_VOCABULARY).expect("exponent field tables"));

pub fn tables(source: Source) -> &'static SourceTables {
    match source {
        Source::Ratex => &RATEX_TABLES,
        Source::Exponent => &EXPONENT_TABLES,
    }
}

// `xSOL-2511`, `hyloSOL+-2511`: base, then YYMM
static RATEX_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z][A-Za-z0-9]*\+?)-(\d{2}(?:0[1-9]|1[0-2]))\b").expect("ratex name pattern")
});

// `YT-hyloSOL-10DEC25`: base, then DDMMMYY
static EXPONENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bYT-([A-Za-z][A-Za-z0-9.+]*)-(\d{1,2}[A-Za-z]{3}\d{2})\b").expect("exponent name pattern")
});

/// Instrument-name pattern for a platform
pub fn instrument_pattern(source: Source) -> &'static Regex {
    match source {
        Source::Ratex => &RATEX_NAME,
        Source::Exponent => &EXPONENT_NAME,
    }
}

/// A parsed instrument-name match
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentName {
    /// Canonical identifier, `<base>-<code>`
    pub asset: String,
    pub base_asset: String,
    /// Maturity suffix as rendered: `2511` or `10DEC25`
    pub maturity_code: String,
    /// The text that matched, e.g. `YT-hyloSOL-10DEC25`
    pub matched: String,
}

/// Every instrument name in `text`, in order of appearance
pub fn find_instruments(source: Source, text: &str) -> Vec<InstrumentName> {
    instrument_pattern(source)
        .captures_iter(text)
        .filter_map(|caps| {
            let base = caps.get(1)?.as_str();
            let code = caps.get(2)?.as_str();
            let code = match source {
                Source::Ratex => code.to_string(),
                Source::Exponent => code.to_ascii_uppercase(),
            };
            Some(InstrumentName {
                asset: format!("{base}-{code}"),
                base_asset: base.to_string(),
                maturity_code: code,
                matched: caps.get(0)?.as_str().to_string(),
            })
        })
        .collect()
}

// =============================================================================
// Maturity parsing
// =============================================================================

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS`, read as UTC
pub fn parse_maturity_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// `YYMM` month code: last Friday of that month, 00:00 UTC
pub fn maturity_from_month_code(code: &str) -> Option<DateTime<Utc>> {
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = 2000 + code[..2].parse::<i32>().ok()?;
    let month = code[2..].parse::<u32>().ok()?;

    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last_day = first_of_next.pred_opt()?;
    // Friday is 4 days from Monday
    let back = (last_day.weekday().num_days_from_monday() + 7 - 4) % 7;
    let friday = last_day - Duration::days(back as i64);
    Some(Utc.from_utc_datetime(&friday.and_hms_opt(0, 0, 0)?))
}

/// `DDMMMYY` day code (`10DEC25`), 00:00 UTC
pub fn maturity_from_day_code(code: &str) -> Option<DateTime<Utc>> {
    let code = code.trim().to_ascii_uppercase();
    let split = code.find(|c: char| c.is_ascii_alphabetic())?;
    let (day, rest) = code.split_at(split);
    if rest.len() != 5 {
        return None;
    }
    let (mon, year) = rest.split_at(3);
    let day = day.parse::<u32>().ok()?;
    let month = MONTHS.iter().position(|m| *m == mon)? as u32 + 1;
    let year = 2000 + year.parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// `last_updated` plus a `(days, hours, minutes)` countdown; `None` when out of range
pub fn maturity_from_countdown(
    (days, hours, minutes): (i64, i64, i64),
    last_updated: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let span = TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_hours(hours)?)?
        .checked_add(&TimeDelta::try_minutes(minutes)?)?;
    last_updated.checked_add_signed(span)
}

/// Resolve an instrument's maturity from whatever the card offers.
///
/// Platform A: explicit date, then countdown, then month code.
/// Platform B: day code in the name, then explicit date.
pub fn resolve_maturity(
    source: Source,
    name: &InstrumentName,
    card_text: &str,
    last_updated: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let explicit = || MATURITY_TEXT.extract(card_text).and_then(|t| parse_maturity_text(&t));
    match source {
        Source::Ratex => explicit()
            .or_else(|| {
                COUNTDOWN
                    .extract(card_text)
                    .and_then(|countdown| maturity_from_countdown(countdown, last_updated))
            })
            .or_else(|| maturity_from_month_code(&name.maturity_code)),
        Source::Exponent => maturity_from_day_code(&name.maturity_code).or_else(explicit),
    }
}

// =============================================================================
// Record construction
// =============================================================================

/// Build the canonical record for one located card.
///
/// Analytics fields are left `None`; they are filled by the analytics pass.
pub fn normalize_card<T: DomTree>(
    tree: &T,
    card: T::Node,
    card_text: &str,
    name: &InstrumentName,
    source: Source,
    last_updated: DateTime<Utc>,
) -> AssetRecord {
    let tables = tables(source);
    let mut record = AssetRecord::new(&name.asset, &name.base_asset, source);

    record.leverage = tables.leverage.extract(card_text);
    record.apy = tables.apy.extract(card_text);
    record.implied_yield = tables.implied_yield.extract(card_text);
    record.range_lower = tables.range_lower.extract(card_text);
    record.range_upper = tables.range_upper.extract(card_text);
    record.asset_boost = tables.asset_boost.extract(card_text);
    record.ratex_boost = tables.ratex_boost.as_ref().and_then(|t| t.extract(card_text));

    record.maturity = resolve_maturity(source, name, card_text, last_updated);

    record.project_name = PROJECT_NAME
        .extract(card_text)
        .or_else(|| name_line_above(card_text, &name.matched, vocabulary(source)))
        .or_else(|| background_alt(tree, card));
    record.project_background_image = pick_background_image(tree, card);
    record.asset_symbol_image = pick_symbol_image(&tree.images(card), &name.base_asset);

    record
}

/// The line right above the instrument name, when it reads like a project name
fn name_line_above(card_text: &str, matched: &str, vocab: &Vocabulary) -> Option<String> {
    let lines: Vec<&str> = card_text.lines().map(str::trim).collect();
    let idx = lines.iter().position(|l| l.contains(matched))?;
    let candidate = *lines.get(idx.checked_sub(1)?)?;

    let is_label = vocab
        .leverage_labels
        .iter()
        .chain(vocab.apy_labels)
        .chain(vocab.implied_labels)
        .chain(vocab.range_labels)
        .chain(vocab.asset_boost_labels)
        .any(|l| candidate.eq_ignore_ascii_case(l));

    let plausible = (2..=30).contains(&candidate.len())
        && candidate.starts_with(|c: char| c.is_ascii_alphabetic())
        && !candidate.chars().any(|c| c.is_ascii_digit() || c == '%');

    (plausible && !is_label).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomSnapshot, RawNode};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_find_ratex_instruments() {
        let names = find_instruments(Source::Ratex, "xSOL-2511 and hyloSOL+-2512, not Nov-2025");
        let assets: Vec<_> = names.iter().map(|n| n.asset.as_str()).collect();
        assert_eq!(assets, vec!["xSOL-2511", "hyloSOL+-2512"]);
        assert_eq!(names[1].base_asset, "hyloSOL+");
        assert_eq!(names[1].maturity_code, "2512");
    }

    #[test]
    fn test_find_exponent_instruments() {
        let names = find_instruments(Source::Exponent, "YT-hyloSOL-10dec25\nYT-xSOL-5JAN26");
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].asset, "hyloSOL-10DEC25");
        assert_eq!(names[0].matched, "YT-hyloSOL-10dec25");
        assert_eq!(names[1].base_asset, "xSOL");
    }

    #[test]
    fn test_month_code_is_last_friday() {
        assert_eq!(maturity_from_month_code("2511"), Some(utc(2025, 11, 28, 0)));
        // Dec 2025 ends on a Wednesday
        assert_eq!(maturity_from_month_code("2512"), Some(utc(2025, 12, 26, 0)));
        // Oct 2025 ends on a Friday
        assert_eq!(maturity_from_month_code("2510"), Some(utc(2025, 10, 31, 0)));
        assert_eq!(maturity_from_month_code("2513"), None);
        assert_eq!(maturity_from_month_code("25a1"), None);
    }

    #[test]
    fn test_day_code() {
        assert_eq!(maturity_from_day_code("10DEC25"), Some(utc(2025, 12, 10, 0)));
        assert_eq!(maturity_from_day_code("5jan26"), Some(utc(2026, 1, 5, 0)));
        assert_eq!(maturity_from_day_code("31FEB26"), None);
        assert_eq!(maturity_from_day_code("10XYZ25"), None);
    }

    #[test]
    fn test_parse_maturity_text() {
        assert_eq!(parse_maturity_text("2025-11-28"), Some(utc(2025, 11, 28, 0)));
        assert_eq!(parse_maturity_text("2025-11-28 08:00"), Some(utc(2025, 11, 28, 8)));
        assert_eq!(parse_maturity_text("2025-11-28T00:00:00Z"), Some(utc(2025, 11, 28, 0)));
        assert_eq!(parse_maturity_text("soon"), None);
    }

    #[test]
    fn test_resolve_maturity_order() {
        let lu = utc(2025, 11, 5, 0);
        let name = &find_instruments(Source::Ratex, "xSOL-2511")[0];

        assert_eq!(
            resolve_maturity(Source::Ratex, name, "Maturity 2025-11-27", lu),
            Some(utc(2025, 11, 27, 0))
        );
        assert_eq!(
            resolve_maturity(Source::Ratex, name, "Ends in 23d 10h", lu),
            Some(utc(2025, 11, 28, 10))
        );
        assert_eq!(
            resolve_maturity(Source::Ratex, name, "no dates", lu),
            Some(utc(2025, 11, 28, 0))
        );

        // Countdown too large for a timestamp: fall back to the month code
        assert_eq!(
            resolve_maturity(Source::Ratex, name, "Ends in 999999999999d 1h", lu),
            Some(utc(2025, 11, 28, 0))
        );

        let name = &find_instruments(Source::Exponent, "YT-xSOL-10DEC25")[0];
        assert_eq!(
            resolve_maturity(Source::Exponent, name, "Maturity 2025-11-27", lu),
            Some(utc(2025, 12, 10, 0))
        );
    }

    #[test]
    fn test_countdown_overflow() {
        let lu = utc(2025, 11, 5, 0);
        assert_eq!(maturity_from_countdown((23, 10, 0), lu), Some(utc(2025, 11, 28, 10)));
        assert_eq!(maturity_from_countdown((999_999_999_999, 1, 0), lu), None);
        assert_eq!(maturity_from_countdown((0, i64::MAX, 0), lu), None);
        assert_eq!(maturity_from_countdown((i64::MAX / 2, 0, 0), lu), None);
    }

    #[test]
    fn test_unrendered_values_stay_null() {
        let ratex = tables(Source::Ratex);
        let text = "xSOL-2511\nAsset Boost 2x\nYield Exposure\n--\nUnderlying APY\n--\nImplied Yield\n--\nYield Range\n--";
        assert_eq!(ratex.leverage.extract(text), None);
        assert_eq!(ratex.apy.extract(text), None);
        assert_eq!(ratex.implied_yield.extract(text), None);
        assert_eq!(ratex.range_lower.extract(text), None);
        assert_eq!(ratex.range_upper.extract(text), None);
        assert_eq!(ratex.asset_boost.extract(text), Some(2.0));

        // Empty spans drop out of the flattened text entirely
        let text = "xSOL-2511\nUnderlying APY\n7.86%\nImplied Yield\nYield Exposure\nAsset Boost\nRateX Boost 1.5x";
        assert_eq!(ratex.apy.extract(text), Some(7.86));
        assert_eq!(ratex.implied_yield.extract(text), None);
        assert_eq!(ratex.leverage.extract(text), None);
        assert_eq!(ratex.asset_boost.extract(text), None);
        assert_eq!(ratex.ratex_boost.as_ref().and_then(|t| t.extract(text)), Some(1.5));

        let exponent = tables(Source::Exponent);
        let text = "YT-xSOL-10DEC25\nEffective Exposure\nN/A\nUnderlying Yield\n6%\nFixed APY\n--\nPoints Boost\n—";
        assert_eq!(exponent.leverage.extract(text), None);
        assert_eq!(exponent.apy.extract(text), Some(6.0));
        assert_eq!(exponent.implied_yield.extract(text), None);
        assert_eq!(exponent.asset_boost.extract(text), None);
    }

    #[test]
    fn test_same_concept_different_labels() {
        let ratex = "Yield Exposure\n133x\nUnderlying APY\n7.86%";
        let exponent = "Effective Exposure\n133x\nUnderlying APY\n7.86%";
        assert_eq!(tables(Source::Ratex).leverage.extract(ratex), Some(133.0));
        assert_eq!(tables(Source::Exponent).leverage.extract(exponent), Some(133.0));
        assert_eq!(tables(Source::Ratex).leverage.extract(exponent), None);
        assert!(tables(Source::Exponent).ratex_boost.is_none());
    }

    #[test]
    fn test_normalize_card() {
        let dom = DomSnapshot::from_raw(
            RawNode::element(
                "div",
                vec![
                    RawNode::text("Hylo"),
                    RawNode::text("xSOL-2511"),
                    RawNode::img("//cdn.example.com/xsol.png", 32, 32).with_attr("alt", "xSOL"),
                    RawNode::text("Yield Exposure"),
                    RawNode::text("133x"),
                    RawNode::text("Underlying APY"),
                    RawNode::text("7.86%"),
                    RawNode::text("Implied Yield"),
                    RawNode::text("62.115%"),
                    RawNode::text("Range 10% - 90%"),
                    RawNode::text("Asset Boost 2x"),
                    RawNode::text("RateX Boost 1.5x"),
                ],
            )
            .with_attr("style", "background-image: url(//cdn.example.com/hylo-bg.jpg)"),
        );
        let card = dom.root();
        let text = dom.text(card);
        let name = &find_instruments(Source::Ratex, &text)[0];

        let record = normalize_card(&dom, card, &text, name, Source::Ratex, utc(2025, 11, 5, 0));
        assert_eq!(record.asset, "xSOL-2511");
        assert_eq!(record.leverage, Some(133.0));
        assert_eq!(record.apy, Some(7.86));
        assert_eq!(record.implied_yield, Some(62.115));
        assert_eq!(record.range_lower, Some(10.0));
        assert_eq!(record.range_upper, Some(90.0));
        assert_eq!(record.asset_boost, Some(2.0));
        assert_eq!(record.ratex_boost, Some(1.5));
        assert_eq!(record.maturity, Some(utc(2025, 11, 28, 0)));
        assert_eq!(record.project_name.as_deref(), Some("Hylo"));
        assert_eq!(
            record.project_background_image.as_deref(),
            Some("https://cdn.example.com/hylo-bg.jpg")
        );
        assert_eq!(
            record.asset_symbol_image.as_deref(),
            Some("https://cdn.example.com/xsol.png")
        );
        assert_eq!(record.yt_price_current, None);
    }
}
