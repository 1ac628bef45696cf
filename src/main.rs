use anyhow::Context;
use clap::Parser;
use horarios_scraper::utils::error::ErrorSeverity;
use horarios_scraper::utils::{logger, validation::Validate};
use horarios_scraper::{
    CalendarFixture, CliConfig, LocalStorage, ReplayFactory, RunSummary, ScrapeEngine,
    ScrapeError, WebDriverFactory,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting horarios-scraper");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let storage = LocalStorage::current_dir();

    let result = match &config.replay {
        Some(path) => {
            let fixture = CalendarFixture::from_file(path)
                .with_context(|| format!("failed to load replay fixture '{}'", path))?;
            tracing::info!("🎞️  Replaying recorded calendar from {}", path);
            let factory = ReplayFactory::new(fixture, settings.selectors.clone());
            ScrapeEngine::new(factory, storage, settings)
                .run_until(shutdown_signal())
                .await
        }
        None => {
            let factory = WebDriverFactory::new(settings.browser.clone());
            ScrapeEngine::new(factory, storage, settings)
                .run_until(shutdown_signal())
                .await
        }
    };

    match result {
        Ok(summary) => report(&summary),
        Err(e) => exit_with(&e),
    }

    Ok(())
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn report(summary: &RunSummary) {
    tracing::info!("✅ Scrape completed successfully!");
    if !summary.persist.dropped.is_empty() {
        tracing::warn!(
            "⚠️ {} date label(s) could not be processed: {}",
            summary.persist.dropped.len(),
            summary.persist.dropped.join(", ")
        );
    }
    println!(
        "✅ {} day(s) with availability saved to {}",
        summary.persist.written, summary.persist.path
    );
}

fn exit_with(e: &ScrapeError) -> ! {
    tracing::error!(
        "❌ Scrape failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
