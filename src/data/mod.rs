//! Data module - loading, cleaning and enrichment of the input tables

mod cleaner;
mod enricher;
mod loader;
mod model;

pub use cleaner::{CleanError, CleaningReport, TableCleaner, CUSTOMER_COLUMNS, PROPERTY_COLUMNS};
pub use enricher::{BinEdges, EnrichError, Enricher, EnrichmentReport, Interval};
pub use loader::{LoaderError, TableLoader};
pub use model::{
    is_null_token, parse_date, CustomerRecord, Entity, PropertyRecord, Sex, UnmappedCategory,
    YesNo, NULL_SENTINELS,
};
