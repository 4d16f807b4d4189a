//! Scene pairing and derived-product connectivity checks.
//!
//! Pairing turns a set of scenes into adjacent (primary, secondary) jobs.
//! Connectivity checks that the products those jobs produce cover an
//! unbroken date chain; gaps are reported, never repaired.

mod sequential;
mod span;

pub use sequential::build_sequential_pairs;
pub use span::{
    connected, find_gaps, is_fully_connected, overlap_days, split_pair_filename,
    ConnectivityReport, Gap, ProductSpan,
};
