use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

/// Covered amount and percentage encoded in a coverage description such as
/// "High Cost $500,000 at 80%".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CoverageTerms {
    pub amount: Decimal,
    pub percentage: Decimal,
}

static TERMS_PATTERN: OnceLock<Regex> = OnceLock::new();
static DOTTED_THOUSANDS: OnceLock<Regex> = OnceLock::new();

fn terms_pattern() -> &'static Regex {
    TERMS_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\$\s*([0-9][0-9.,]*)\s*(?:at|al|a|@|-)?\s*([0-9]+(?:[.,][0-9]+)?)\s*%")
            .expect("coverage terms pattern compiles")
    })
}

fn dotted_thousands() -> &'static Regex {
    DOTTED_THOUSANDS.get_or_init(|| {
        Regex::new(r"^[0-9]{1,3}(\.[0-9]{3})+(,[0-9]+)?$").expect("thousands pattern compiles")
    })
}

pub(crate) fn parse_coverage_terms(description: &str) -> Option<CoverageTerms> {
    let captures = terms_pattern().captures(description)?;
    let amount = parse_amount(captures.get(1)?.as_str())?;
    let percentage = Decimal::from_str(&captures.get(2)?.as_str().replace(',', ".")).ok()?;
    Some(CoverageTerms { amount, percentage })
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim_end_matches(['.', ',']);
    let normalized = if dotted_thousands().is_match(trimmed) {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace(',', "")
    };
    Decimal::from_str(&normalized).ok()
}
