//! Data models for entities, configuration and model metadata.

pub mod config;
pub mod entity;
pub mod metadata;

pub use config::{EngineConfig, EvaluationConfig, ExtractionConfig, TrainingConfig};
pub use entity::{
    AnnotatedValue, AnnotationMap, EntityMap, EntitySpan, OrderedMap, SpanSource, ValueRecord,
};
pub use metadata::{ModelMetadata, ModelStats};
