pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::settings::ScrapeSettings;
#[cfg(feature = "cli")]
use crate::config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "horarios-scraper")]
#[command(about = "Scrapes published appointment availability from a booking calendar")]
pub struct CliConfig {
    /// Booking page to scrape
    #[arg(long)]
    pub url: Option<String>,

    /// Where the JSON file is written
    #[arg(long)]
    pub output: Option<String>,

    /// Number of weekly calendar pages to read
    #[arg(long)]
    pub pages: Option<usize>,

    /// Address of a running chromedriver
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Reference date (YYYY-MM-DD) used to infer the year of each day
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Replay a recorded calendar (JSON) instead of opening a browser
    #[arg(long)]
    pub replay: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Defaults, then the configuration file, then command line flags.
    pub fn resolve(&self) -> Result<ScrapeSettings> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.to_settings()?,
            None => ScrapeSettings::default(),
        };

        if let Some(url) = &self.url {
            settings.target_url = url.clone();
        }
        if let Some(output) = &self.output {
            settings.output_path = output.clone();
        }
        if let Some(pages) = self.pages {
            settings.page_count = pages;
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            settings.browser.webdriver_url = webdriver_url.clone();
        }
        if self.headed {
            settings.browser.headless = false;
        }
        if self.today.is_some() {
            settings.today = self.today;
        }

        Ok(settings)
    }
}
