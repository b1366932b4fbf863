//! Static feature definitions mirroring the feature repository.
//!
//! Entities, feature views, and feature services are declared in code and
//! consumed as read-only metadata: listing operations and feature-service
//! expansion resolve against these definitions.

use crate::error::FeatureStoreError;

/// Value type of a feature field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Float32,
    Int64,
    String,
}

/// An entity key features are joined on.
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: &'static str,
    pub join_key: &'static str,
    pub dtype: FeatureType,
}

/// A single feature field within a view.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub dtype: FeatureType,
}

/// A named group of features over one entity.
#[derive(Debug, Clone)]
pub struct FeatureViewDef {
    pub name: &'static str,
    pub entity: &'static str,
    pub ttl_days: u32,
    pub fields: Vec<FieldDef>,
}

/// A reusable bundle of feature views served together.
#[derive(Debug, Clone)]
pub struct FeatureServiceDef {
    pub name: &'static str,
    pub views: Vec<&'static str>,
}

/// The full set of definitions for one feature repository.
#[derive(Debug, Clone)]
pub struct FeatureRegistry {
    pub entities: Vec<EntityDef>,
    pub views: Vec<FeatureViewDef>,
    pub services: Vec<FeatureServiceDef>,
}

impl FeatureRegistry {
    /// Definitions for the fraud detection repository: one transaction
    /// entity, one view with the five model features, one feature service.
    pub fn fraud_detection() -> Self {
        Self {
            entities: vec![EntityDef {
                name: "transaction",
                join_key: "trans_num",
                dtype: FeatureType::String,
            }],
            views: vec![FeatureViewDef {
                name: "transaction_features",
                entity: "transaction",
                ttl_days: 365,
                fields: vec![
                    FieldDef {
                        name: "amt",
                        dtype: FeatureType::Float32,
                    },
                    FieldDef {
                        name: "city_pop",
                        dtype: FeatureType::Int64,
                    },
                    FieldDef {
                        name: "category_encoded",
                        dtype: FeatureType::Int64,
                    },
                    FieldDef {
                        name: "gender_encoded",
                        dtype: FeatureType::Int64,
                    },
                    FieldDef {
                        name: "state_encoded",
                        dtype: FeatureType::Int64,
                    },
                ],
            }],
            services: vec![FeatureServiceDef {
                name: "fraud_detection_v1",
                views: vec!["transaction_features"],
            }],
        }
    }

    pub fn feature_view_names(&self) -> Vec<String> {
        self.views.iter().map(|v| v.name.to_string()).collect()
    }

    pub fn feature_service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.to_string()).collect()
    }

    pub fn get_service(&self, name: &str) -> Result<&FeatureServiceDef, FeatureStoreError> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| FeatureStoreError::UnknownService(name.to_string()))
    }

    /// Fully qualified `view:feature` names for every feature in a service.
    pub fn service_features(&self, name: &str) -> Result<Vec<String>, FeatureStoreError> {
        let service = self.get_service(name)?;
        let mut features = Vec::new();
        for view_name in &service.views {
            if let Some(view) = self.views.iter().find(|v| v.name == *view_name) {
                for field in &view.fields {
                    features.push(format!("{}:{}", view.name, field.name));
                }
            }
        }
        Ok(features)
    }
}
