pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::replay::{CalendarFixture, ReplayFactory, ReplaySession};
pub use adapters::webdriver::{WebDriverFactory, WebDriverSession};
pub use config::{cli::LocalStorage, settings::ScrapeSettings};
pub use crate::core::{
    engine::{RunSummary, ScrapeEngine},
    normalizer::{DateNormalizer, MonthTable},
    scanner::CalendarScanner,
    store::ResultStore,
};
pub use utils::error::{Result, ScrapeError};
