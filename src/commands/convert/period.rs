use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

pub struct PeriodParser {
    year_month: Regex,
    year: Regex,
}

impl PeriodParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            year_month: Regex::new(r"\b(\d{4})\s*/\s*(\d{1,2})\b")
                .context("failed to compile year/month period regex")?,
            year: Regex::new(r"\b(\d{4})\b").context("failed to compile year period regex")?,
        })
    }

    /// `"2020 / 03 - Marzo"` -> 2020-03-01, `"2020"` -> 2020-01-01.
    /// The year/month form is tried first so a longer string never loses its
    /// month to the bare-year match. A year/month pair with an impossible
    /// month (`"2020 / 13"`) yields `None` rather than a January date.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        if let Some(captures) = self.year_month.captures(raw) {
            let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
            let month = captures.get(2)?.as_str().parse::<u32>().ok()?;
            return NaiveDate::from_ymd_opt(year, month, 1);
        }

        let year = self
            .year
            .captures(raw)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())?;
        NaiveDate::from_ymd_opt(year, 1, 1)
    }
}
