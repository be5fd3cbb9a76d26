//! Prelude for commonly used types in plantstat.

pub use crate::engine::{AnalysisEngine, EngineConfig};
pub use crate::error::{EngineError, Result};
pub use crate::logging::LoggingConfig;
pub use crate::sources::{CsvOptions, CsvSource};
pub use crate::summary::{EquipmentRecord, EquipmentSummary, TypeAverages};
