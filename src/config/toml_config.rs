use crate::config::settings::{ScrapeSettings, Selectors};
use crate::core::normalizer::MonthTable;
use crate::utils::error::{Result, ScrapeError};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub target: Option<TargetConfig>,
    pub browser: Option<BrowserConfig>,
    pub timing: Option<TimingConfig>,
    pub selectors: Option<Selectors>,
    pub locale: Option<LocaleConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub webdriver_url: Option<String>,
    pub headless: Option<bool>,
    pub args: Option<Vec<String>>,
    pub wait_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    pub settle_poll_ms: Option<u64>,
    pub settle_timeout_ms: Option<u64>,
    pub stale_retry_delay_ms: Option<u64>,
    pub stale_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Month abbreviations as the calendar displays them, January first.
    pub months: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScrapeError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScrapeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left untouched.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScrapeError::ConfigError {
            message: format!("placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Overlays every value present in the file onto `settings`.
    pub fn apply(&self, settings: &mut ScrapeSettings) -> Result<()> {
        if let Some(target) = &self.target {
            if let Some(url) = &target.url {
                settings.target_url = url.clone();
            }
            if let Some(pages) = target.pages {
                settings.page_count = pages;
            }
        }

        if let Some(browser) = &self.browser {
            if let Some(url) = &browser.webdriver_url {
                settings.browser.webdriver_url = url.clone();
            }
            if let Some(headless) = browser.headless {
                settings.browser.headless = headless;
            }
            if let Some(args) = &browser.args {
                settings.browser.args = args.clone();
            }
            if let Some(secs) = browser.wait_timeout_secs {
                settings.timing.wait_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(timing) = &self.timing {
            if let Some(ms) = timing.settle_poll_ms {
                settings.timing.settle_poll = Duration::from_millis(ms);
            }
            if let Some(ms) = timing.settle_timeout_ms {
                settings.timing.settle_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = timing.stale_retry_delay_ms {
                settings.timing.stale_retry_delay = Duration::from_millis(ms);
            }
            if let Some(attempts) = timing.stale_attempts {
                settings.timing.stale_attempts = attempts;
            }
        }

        if let Some(selectors) = &self.selectors {
            settings.selectors = selectors.clone();
        }

        if let Some(locale) = &self.locale {
            crate::utils::validation::validate_month_table("locale.months", &locale.months)?;
            settings.months = MonthTable::from_slice(&locale.months).ok_or_else(|| {
                ScrapeError::InvalidConfigValueError {
                    field: "locale.months".to_string(),
                    value: locale.months.join(","),
                    reason: "Expected 12 month abbreviations".to_string(),
                }
            })?;
        }

        if let Some(output) = &self.output {
            settings.output_path = output.path.clone();
        }

        Ok(())
    }

    pub fn to_settings(&self) -> Result<ScrapeSettings> {
        let mut settings = ScrapeSettings::default();
        self.apply(&mut settings)?;
        Ok(settings)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.to_settings()?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[target]
url = "https://booking.example.com/dr-who"
pages = 3

[browser]
webdriver_url = "http://127.0.0.1:4444"
headless = false
args = ["--lang=es-ES"]
wait_timeout_secs = 5

[timing]
settle_poll_ms = 100
stale_attempts = 4

[selectors]
day = "div.day"
slot = "button.slot"

[locale]
months = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"]

[output]
path = "site/api/slots.json"
"#;

        let settings = TomlConfig::from_toml_str(toml_content)
            .unwrap()
            .to_settings()
            .unwrap();

        assert_eq!(settings.target_url, "https://booking.example.com/dr-who");
        assert_eq!(settings.page_count, 3);
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.args, vec!["--lang=es-ES"]);
        assert_eq!(settings.timing.wait_timeout, Duration::from_secs(5));
        assert_eq!(settings.timing.settle_poll, Duration::from_millis(100));
        assert_eq!(settings.timing.stale_attempts, 4);
        assert_eq!(settings.selectors.day, "div.day");
        // Unset selectors keep their defaults.
        assert_eq!(settings.selectors.day_label, "p.small.text-muted");
        assert_eq!(settings.months.month_number("aug"), Some(8));
        assert_eq!(settings.output_path, "site/api/slots.json");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = TomlConfig::from_toml_str("").unwrap().to_settings().unwrap();
        assert_eq!(settings.page_count, 5);
        assert_eq!(settings.output_path, "public/api/horarios.json");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("HORARIOS_TEST_TARGET", "https://test.example.com/agenda");

        let toml_content = r#"
[target]
url = "${HORARIOS_TEST_TARGET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.target.unwrap().url.unwrap(),
            "https://test.example.com/agenda"
        );

        std::env::remove_var("HORARIOS_TEST_TARGET");
    }

    #[test]
    fn test_short_month_table_is_rejected() {
        let toml_content = r#"
[locale]
months = ["ene", "feb"]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.to_settings().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[target]
url = "invalid-url"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[target]
pages = 2
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.to_settings().unwrap().page_count, 2);
    }
}
