// Adapters layer: concrete browsing sessions behind the domain ports.

pub mod replay;
pub mod webdriver;
