use crate::error::{OnboardingError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Youngest age the provider accepts for a verified person.
const MIN_AGE_YEARS: i32 = 18;
const MIN_BIRTH_YEAR: i32 = 1900;

/// A validated date of birth, zero-padded the way the provider expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dob {
    pub day: String,
    pub month: String,
    pub year: String,
}

/// Raw day/month/year strings as they arrive from the flat submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct DobInput<'a> {
    pub day: Option<&'a str>,
    pub month: Option<&'a str>,
    pub year: Option<&'a str>,
}

impl DobInput<'_> {
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.month.is_none() && self.year.is_none()
    }
}

/// Validates a day/month/year triad.
///
/// The three parts are all-or-nothing: if any one is present the other two
/// become required. Day and month are zero-padded to two digits, the year is
/// bounded to `1900..=current_year - 18`, and the assembled date must be a
/// real calendar date.
pub fn validate_dob(base: &str, input: DobInput<'_>) -> Result<Dob> {
    let day_raw = input
        .day
        .ok_or_else(|| OnboardingError::missing(format!("{base}.day")))?;
    let month_raw = input
        .month
        .ok_or_else(|| OnboardingError::missing(format!("{base}.month")))?;
    let year_raw = input
        .year
        .ok_or_else(|| OnboardingError::missing(format!("{base}.year")))?;

    let day: u32 = day_raw
        .parse()
        .map_err(|_| OnboardingError::validation(format!("{base}.day"), "not a number"))?;
    let month: u32 = month_raw
        .parse()
        .map_err(|_| OnboardingError::validation(format!("{base}.month"), "not a number"))?;
    let year: i32 = year_raw
        .parse()
        .map_err(|_| OnboardingError::validation(format!("{base}.year"), "not a number"))?;

    let latest_year = Utc::now().year() - MIN_AGE_YEARS;
    if year < MIN_BIRTH_YEAR || year > latest_year {
        return Err(OnboardingError::validation(
            format!("{base}.year"),
            format!("year must be between {MIN_BIRTH_YEAR} and {latest_year}"),
        ));
    }

    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return Err(OnboardingError::validation(
            base,
            "not a valid calendar date",
        ));
    }

    Ok(Dob {
        day: format!("{day:02}"),
        month: format!("{month:02}"),
        year: year.to_string(),
    })
}

/// Validates an ownership percentage.
///
/// The raw string must parse as a decimal in `[0, 100]` and must round-trip
/// exactly through parse-and-restringify, so inputs like `"50abc"` or `"050"`
/// are rejected. A value of exactly zero is only legal when the owner flag is
/// not set, and is then omitted from the payload; `Ok(None)` signals the
/// omission.
pub fn validate_percent(field: &str, raw: &str, owner_flag: bool) -> Result<Option<String>> {
    let parsed = Decimal::from_str(raw)
        .map_err(|_| OnboardingError::validation(field, "not a number"))?;

    if parsed < Decimal::ZERO || parsed > Decimal::from(100) {
        return Err(OnboardingError::validation(
            field,
            "must be between 0 and 100",
        ));
    }

    if parsed.to_string() != raw {
        return Err(OnboardingError::validation(field, "malformed number"));
    }

    if parsed.is_zero() {
        if owner_flag {
            return Err(OnboardingError::validation(
                field,
                "an owner must hold a non-zero share",
            ));
        }
        return Ok(None);
    }

    Ok(Some(raw.to_owned()))
}

/// Per-country lookup table of accepted state/province codes.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    by_country: HashMap<String, HashSet<String>>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, country: &str, states: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_country
            .entry(country.to_owned())
            .or_default()
            .extend(states.into_iter().map(Into::into));
        self
    }

    /// A state is only valid when a table exists for the country and lists
    /// the code. A missing table is a validation failure, not a pass.
    pub fn validate(&self, field: &str, country: Option<&str>, state: &str) -> Result<()> {
        let country = country.ok_or_else(|| {
            OnboardingError::validation(field, "no country to validate the state against")
        })?;
        let known = self.by_country.get(country).ok_or_else(|| {
            OnboardingError::validation(field, format!("no state table for country '{country}'"))
        })?;
        if known.contains(state) {
            Ok(())
        } else {
            Err(OnboardingError::validation(
                field,
                format!("'{state}' is not a known state for country '{country}'"),
            ))
        }
    }
}

/// Business/merchant category codes must come from the provided code table.
pub fn validate_category_code(field: &str, raw: &str, codes: &HashSet<String>) -> Result<()> {
    if codes.contains(raw) {
        Ok(())
    } else {
        Err(OnboardingError::validation(
            field,
            format!("'{raw}' is not a known category code"),
        ))
    }
}

pub fn validate_url(field: &str, raw: &str) -> Result<()> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(())
    } else {
        Err(OnboardingError::validation(
            field,
            "must start with http:// or https://",
        ))
    }
}
