use crate::core::normalizer::MonthTable;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str =
    "https://www.doctoralia.es/angie-sanchez-gallego/psicologo/madrid";
pub const DEFAULT_OUTPUT_PATH: &str = "public/api/horarios.json";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_PAGE_COUNT: usize = 5;
/// Year inference only holds for a lookahead of a few weeks.
pub const MAX_PAGE_COUNT: usize = 8;

/// CSS selectors into the booking page markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub day: String,
    pub day_label: String,
    pub slot: String,
    pub next_page: String,
    pub cookie_accept: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            day: "div.calendar-day.day-available".to_string(),
            day_label: "p.small.text-muted".to_string(),
            slot: "button.calendar-slot-available".to_string(),
            next_page: "button[aria-label='Next']".to_string(),
            cookie_accept: "#onetrust-accept-btn-handler".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Upper bound when waiting for a control to become clickable.
    pub wait_timeout: Duration,
    pub settle_poll: Duration,
    pub settle_timeout: Duration,
    pub stale_retry_delay: Duration,
    /// Reads per day before giving up on a stale element.
    pub stale_attempts: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(15),
            settle_poll: Duration::from_millis(250),
            settle_timeout: Duration::from_secs(4),
            stale_retry_delay: Duration::from_millis(500),
            stale_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    /// Extra Chrome command line switches.
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            args: Vec::new(),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub target_url: String,
    pub page_count: usize,
    pub output_path: String,
    pub browser: BrowserSettings,
    pub timing: Timing,
    pub selectors: Selectors,
    pub months: MonthTable,
    /// Reference date for year inference; the local date when unset.
    pub today: Option<NaiveDate>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            page_count: DEFAULT_PAGE_COUNT,
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            browser: BrowserSettings::default(),
            timing: Timing::default(),
            selectors: Selectors::default(),
            months: MonthTable::default(),
            today: None,
        }
    }
}

impl ScrapeSettings {
    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

impl ConfigProvider for ScrapeSettings {
    fn target_url(&self) -> &str {
        &self.target_url
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn page_count(&self) -> usize {
        self.page_count
    }
}

impl Validate for ScrapeSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("target.url", &self.target_url)?;
        validation::validate_url("browser.webdriver_url", &self.browser.webdriver_url)?;
        validation::validate_path("output.path", &self.output_path)?;
        validation::validate_range("target.pages", self.page_count, 1, MAX_PAGE_COUNT)?;
        validation::validate_positive_number(
            "timing.stale_attempts",
            self.timing.stale_attempts as u64,
            1,
        )?;
        for (field, duration) in [
            ("browser.wait_timeout_secs", self.timing.wait_timeout),
            ("timing.settle_poll_ms", self.timing.settle_poll),
            ("timing.settle_timeout_ms", self.timing.settle_timeout),
            ("timing.stale_retry_delay_ms", self.timing.stale_retry_delay),
        ] {
            validation::validate_positive_number(field, duration.as_millis() as u64, 1)?;
        }
        validation::validate_month_table("locale.months", self.months.abbreviations())?;

        for (field, selector) in [
            ("selectors.day", &self.selectors.day),
            ("selectors.day_label", &self.selectors.day_label),
            ("selectors.slot", &self.selectors.slot),
            ("selectors.next_page", &self.selectors.next_page),
            ("selectors.cookie_accept", &self.selectors.cookie_accept),
        ] {
            validation::validate_non_empty_string(field, selector)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ScrapeSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.page_count, 5);
        assert_eq!(settings.timing.stale_attempts, 3);
        assert_eq!(settings.output_path, "public/api/horarios.json");
    }

    #[test]
    fn test_rejects_zero_pages_and_blank_selectors() {
        let mut settings = ScrapeSettings::default();
        settings.page_count = 0;
        assert!(settings.validate().is_err());
        settings.page_count = 52;
        assert!(settings.validate().is_err());

        let mut settings = ScrapeSettings::default();
        settings.selectors.slot = " ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timings() {
        let zeroed: [fn(&mut Timing); 4] = [
            |t| t.wait_timeout = Duration::ZERO,
            |t| t.settle_poll = Duration::ZERO,
            |t| t.settle_timeout = Duration::ZERO,
            |t| t.stale_retry_delay = Duration::ZERO,
        ];

        for zero in zeroed {
            let mut settings = ScrapeSettings::default();
            zero(&mut settings.timing);
            assert!(settings.validate().is_err(), "{:?}", settings.timing);
        }
    }

    #[test]
    fn test_settings_provide_run_parameters() {
        let settings = ScrapeSettings {
            page_count: 3,
            ..ScrapeSettings::default()
        };
        let provider: &dyn ConfigProvider = &settings;

        assert_eq!(provider.page_count(), 3);
        assert_eq!(provider.output_path(), "public/api/horarios.json");
        assert_eq!(provider.target_url(), settings.target_url);
    }

    #[test]
    fn test_explicit_today_overrides_clock() {
        let settings = ScrapeSettings {
            today: NaiveDate::from_ymd_opt(2024, 12, 15),
            ..ScrapeSettings::default()
        };
        assert_eq!(settings.today(), NaiveDate::from_ymd_opt(2024, 12, 15).unwrap());
    }
}
