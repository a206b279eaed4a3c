#![warn(missing_docs)]
//! Vergress Core - Orchestration and Comparison Engine
//!
//! This crate is the pure-logic heart of the regression harness:
//! - [`Measurement`] / [`Query`] / [`RunMatrix`] data model
//! - [`Orchestrator`] driving the version × query × repetition loop through
//!   a [`CellExecutor`] seam
//! - [`Selector`] run selection and [`compare_all`] adjacent-pair regression
//!   comparison with a percentage tolerance
//!
//! Everything that touches a process, socket or network lives behind the
//! `CellExecutor` trait in `vergress-harness`; this crate is fully testable
//! with scripted executors and synthetic matrices.

mod compare;
mod error;
mod matrix;
mod measurement;
mod orchestrator;

pub use compare::{
    Comparison, ComparisonReport, DEFAULT_THRESHOLD_PCT, Selector, compare, compare_all,
    select_fastest,
};
pub use error::{ContractViolation, ExecutionError, OrchestrationError, Stage};
pub use matrix::{Cell, RunMatrix};
pub use measurement::{Measurement, Query, ResourceUsage};
pub use orchestrator::{CellExecutor, ErrorPolicy, Orchestrator};
