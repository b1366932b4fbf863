//! Feast feature store integration

pub mod client;
pub mod definitions;
pub mod store;

pub use client::{
    EntityRow, FeatureRow, FeatureSelection, FeatureServerClient, HistoricalEntityRow,
    HttpFeatureServer,
};
pub use definitions::FeatureRegistry;
pub use store::{FeatureStoreAdapter, DEFAULT_FEATURE_SERVICE};
