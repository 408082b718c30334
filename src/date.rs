//! Publication date formatting.

use anyhow::Context as _;
use chrono::{DateTime, FixedOffset, Locale, TimeZone as _, Utc};

const DISPLAY_FORMAT: &str = "%d %b %Y";

#[derive(Debug, Clone, Copy)]
pub struct DateFormatter {
    locale: Locale,
}

impl DateFormatter {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Formats an ISO timestamp as `dd MMM yyyy` in the configured locale.
    ///
    /// The timestamp's own offset is kept, so `2021-03-25T00:00:00+0000` is always the 25th.
    pub fn format(&self, iso: &str) -> anyhow::Result<String> {
        let parsed = parse_iso(iso).with_context(|| format!("parse publication date {iso:?}"))?;
        Ok(parsed
            .format_localized(DISPLAY_FORMAT, self.locale)
            .to_string())
    }

    /// Abbreviated month names, January first.
    pub fn month_abbreviations(&self) -> Vec<String> {
        (1..=12)
            .filter_map(|month| Utc.with_ymd_and_hms(2000, month, 1, 0, 0, 0).single())
            .map(|d| d.format_localized("%b", self.locale).to_string())
            .collect()
    }

    /// BCP 47 tag for the `lang` attribute, e.g. `pt-BR`.
    pub fn html_lang(&self) -> String {
        format!("{:?}", self.locale).replace('_', "-")
    }
}

fn parse_iso(iso: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    let s = iso.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    // The CMS emits offsets without a colon (`+0000`), which RFC 3339 rejects.
    Ok(DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")?)
}
