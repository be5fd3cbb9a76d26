//! # plantstat: statistical summaries for equipment datasets
//!
//! plantstat turns a CSV of chemical equipment records (name, type,
//! flowrate, pressure, temperature) into one immutable
//! [`EquipmentSummary`](summary::EquipmentSummary): descriptive statistics,
//! a Pearson correlation matrix, per-type distributions and averages, and
//! z-score outliers. It leverages DataFusion for query execution over
//! Arrow record batches and emits structured logs through `tracing`.
//!
//! The engine is deliberately narrow: it neither stores datasets nor
//! renders charts. Storage, authentication, and visualization are
//! collaborators that consume the serialized summary.
//!
//! ## Quick Start
//!
//! ```rust
//! use plantstat::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
//!            P-101,Pump,120.5,4.2,65.0\n\
//!            P-102,Pump,130.0,4.6,66.5\n\
//!            E-201,Exchanger,80.0,2.1,120.0\n";
//!
//! let summary = AnalysisEngine::new()
//!     .analyze_bytes(csv.as_bytes().to_vec())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(summary.total_equipment, 3);
//! assert_eq!(summary.type_distribution["Pump"], 2);
//! assert_eq!(summary.correlation["Flowrate"]["Flowrate"], 1.0);
//! # });
//! ```
//!
//! ## Pipeline
//!
//! Three stages run in sequence over a single input:
//!
//! 1. **Schema validation** ([`schema`]) — the five required columns must
//!    be present, matched exactly; every missing column is reported.
//! 2. **Cleaning** ([`cleaning`]) — each measurement cell is coerced to
//!    `f64` on its own; rows with any uncoercible measurement are dropped.
//! 3. **Aggregation** ([`engine`] + [`analyzers`]) — the cleaned table is
//!    registered with an in-memory DataFusion session and the analyzers
//!    compute their states through SQL aggregation.
//!
//! Degenerate inputs resolve by policy, not panic: an empty cleaned table
//! yields zeroed averages and empty maps, and zero-variance columns yield
//! 0.0 correlations and no outlier flags.
//!
//! ## Modules
//!
//! - [`engine`] — the [`AnalysisEngine`](engine::AnalysisEngine) façade
//!   and its configuration
//! - [`sources`] — CSV ingestion into a raw all-text table
//! - [`schema`] — required-column validation
//! - [`cleaning`] — numeric coercion and row dropping
//! - [`analyzers`] — the aggregation analyzers
//! - [`summary`] — the output value and its serialization contract
//! - [`table`] — raw and cleaned table types
//! - [`security`] — SQL identifier hygiene
//! - [`logging`] — `tracing` subscriber setup
//! - [`error`] — the public error taxonomy

pub mod analyzers;
pub mod cleaning;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod schema;
pub mod security;
pub mod sources;
pub mod summary;
pub mod table;
