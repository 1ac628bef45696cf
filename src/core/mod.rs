pub mod engine;
pub mod extractor;
pub mod normalizer;
pub mod scanner;
pub mod settle;
pub mod store;

pub use crate::domain::model::{DayReading, NormalizedEntry, RawSlotMap, ResultSet};
pub use crate::domain::ports::{BrowsingSession, SessionFactory, Storage};
pub use crate::utils::error::Result;
