use crate::domain::model::NormalizedEntry;
use crate::utils::error::NormalizeError;
use chrono::{Datelike, NaiveDate};

/// Month abbreviations as the calendar displays them, January first.
///
/// Lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthTable {
    abbreviations: [String; 12],
}

impl MonthTable {
    /// Abbreviations used by Spanish-language booking pages.
    pub fn spanish() -> Self {
        Self::from_abbreviations([
            "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
        ])
    }

    pub fn from_abbreviations<S: AsRef<str>>(abbreviations: [S; 12]) -> Self {
        Self {
            abbreviations: abbreviations.map(|a| a.as_ref().trim().to_lowercase()),
        }
    }

    /// Builds a table from a configured list; `None` unless there are exactly
    /// twelve entries.
    pub fn from_slice(abbreviations: &[String]) -> Option<Self> {
        let array: [String; 12] = abbreviations.to_vec().try_into().ok()?;
        Some(Self::from_abbreviations(array))
    }

    /// Month number (1-12) for an abbreviation.
    pub fn month_number(&self, abbreviation: &str) -> Option<u32> {
        let needle = abbreviation.to_lowercase();
        self.abbreviations
            .iter()
            .position(|a| *a == needle)
            .map(|index| index as u32 + 1)
    }

    pub fn abbreviations(&self) -> &[String] {
        &self.abbreviations
    }
}

impl Default for MonthTable {
    fn default() -> Self {
        Self::spanish()
    }
}

/// Turns partial labels like `"14 jul"` into calendar dates.
///
/// The year is inferred from `today`: a month earlier than the current month
/// belongs to next year. That only holds for short lookahead windows (a few
/// weeks), which is all a paginated weekly calendar exposes.
#[derive(Debug, Clone, Default)]
pub struct DateNormalizer {
    months: MonthTable,
}

impl DateNormalizer {
    pub fn new(months: MonthTable) -> Self {
        Self { months }
    }

    pub fn normalize(&self, label: &str, today: NaiveDate) -> Result<NaiveDate, NormalizeError> {
        let tokens: Vec<&str> = label.split_whitespace().collect();
        let [day_token, month_token] = tokens.as_slice() else {
            return Err(NormalizeError::invalid(
                label,
                format!("expected '<day> <month>', found {} token(s)", tokens.len()),
            ));
        };

        let day: u32 = day_token
            .parse()
            .map_err(|_| NormalizeError::invalid(label, format!("'{}' is not a day number", day_token)))?;

        let month = self.months.month_number(month_token).ok_or_else(|| {
            NormalizeError::invalid(label, format!("unknown month '{}'", month_token))
        })?;

        let year = if month < today.month() {
            today.year() + 1
        } else {
            today.year()
        };

        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            NormalizeError::invalid(
                label,
                format!("{}-{:02}-{:02} is not a calendar date", year, month, day),
            )
        })
    }

    /// Normalizes a label and its times into a persisted entry.
    ///
    /// Times are `HH:MM`, so string order is chronological order.
    pub fn normalize_entry(
        &self,
        label: &str,
        times: &[String],
        today: NaiveDate,
    ) -> Result<NormalizedEntry, NormalizeError> {
        let date = self.normalize(label, today)?;
        let mut times = times.to_vec();
        times.sort();
        times.dedup();
        Ok(NormalizedEntry { date, times })
    }

    pub fn months(&self) -> &MonthTable {
        &self.months
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_month_stays_in_current_year() {
        let normalizer = DateNormalizer::default();
        assert_eq!(
            normalizer.normalize("20 dic", date(2024, 12, 15)).unwrap(),
            date(2024, 12, 20)
        );
    }

    #[test]
    fn test_earlier_month_rolls_into_next_year() {
        let normalizer = DateNormalizer::default();
        assert_eq!(
            normalizer.normalize("05 ene", date(2024, 12, 15)).unwrap(),
            date(2025, 1, 5)
        );
    }

    #[test]
    fn test_every_month_resolves_against_table() {
        let normalizer = DateNormalizer::default();
        let today = date(2024, 6, 10);
        for (index, abbreviation) in MonthTable::spanish().abbreviations().iter().enumerate() {
            let month = index as u32 + 1;
            let resolved = normalizer
                .normalize(&format!("1 {}", abbreviation), today)
                .unwrap();
            assert_eq!(resolved.month(), month);
            let expected_year = if month < 6 { 2025 } else { 2024 };
            assert_eq!(resolved.year(), expected_year, "month {}", abbreviation);
        }
    }

    #[test]
    fn test_case_insensitive_and_extra_whitespace() {
        let normalizer = DateNormalizer::default();
        assert_eq!(
            normalizer.normalize("  14   JUL ", date(2024, 7, 1)).unwrap(),
            date(2024, 7, 14)
        );
    }

    #[test]
    fn test_february_never_has_31_days() {
        let normalizer = DateNormalizer::default();
        for today in [date(2023, 1, 1), date(2024, 2, 1), date(2024, 12, 31)] {
            assert!(matches!(
                normalizer.normalize("31 feb", today),
                Err(NormalizeError::InvalidLabel { .. })
            ));
        }
    }

    #[test]
    fn test_leap_day_depends_on_resolved_year() {
        let normalizer = DateNormalizer::default();
        // March 2023 rolls February into 2024, a leap year.
        assert_eq!(
            normalizer.normalize("29 feb", date(2023, 3, 1)).unwrap(),
            date(2024, 2, 29)
        );
        assert!(normalizer.normalize("29 feb", date(2025, 1, 10)).is_err());
    }

    #[test]
    fn test_wrong_token_count_is_invalid() {
        let normalizer = DateNormalizer::default();
        let today = date(2024, 5, 1);
        assert!(normalizer.normalize("abc", today).is_err());
        assert!(normalizer.normalize("", today).is_err());
        assert!(normalizer.normalize("lun 14 jul", today).is_err());
    }

    #[test]
    fn test_unknown_month_or_day_is_invalid() {
        let normalizer = DateNormalizer::default();
        let today = date(2024, 5, 1);
        assert!(normalizer.normalize("14 jly", today).is_err());
        assert!(normalizer.normalize("xx jul", today).is_err());
        assert!(normalizer.normalize("0 jul", today).is_err());
    }

    #[test]
    fn test_custom_month_table() {
        let english = MonthTable::from_abbreviations([
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ]);
        let normalizer = DateNormalizer::new(english);
        assert_eq!(
            normalizer.normalize("3 aug", date(2024, 7, 20)).unwrap(),
            date(2024, 8, 3)
        );
        assert!(normalizer.normalize("3 ago", date(2024, 7, 20)).is_err());
    }

    #[test]
    fn test_from_slice_requires_twelve_entries() {
        let eleven: Vec<String> = (1..=11).map(|m| format!("m{}", m)).collect();
        assert!(MonthTable::from_slice(&eleven).is_none());

        let twelve: Vec<String> = (1..=12).map(|m| format!("m{}", m)).collect();
        let table = MonthTable::from_slice(&twelve).unwrap();
        assert_eq!(table.month_number("M12"), Some(12));
    }

    #[test]
    fn test_entry_times_are_sorted_and_unique() {
        let normalizer = DateNormalizer::default();
        let times = vec![
            "11:00".to_string(),
            "09:30".to_string(),
            "11:00".to_string(),
        ];
        let entry = normalizer
            .normalize_entry("14 jul", &times, date(2024, 7, 1))
            .unwrap();
        assert_eq!(entry.date, date(2024, 7, 14));
        assert_eq!(entry.times, vec!["09:30", "11:00"]);
    }
}
