//! Tabular datasets: decoding, schema profiling and the cleaning pipeline
//!
//! A table is a polars [`DataFrame`](polars::prelude::DataFrame). Column kinds
//! are inferred once by [`profiler::profile`] and carried through every
//! transform step so each step only looks at the columns it applies to.

pub mod io;
pub mod profiler;
pub mod transforms;

pub use io::{read_csv_bytes, write_csv_bytes};
pub use profiler::{ColumnKind, ColumnProfile, SchemaSummary, profile, summarize};
pub use transforms::{StepOutcome, Transform, TransformPipeline, TransformReport};
