// =============================================================================
// Signals Module
// =============================================================================
//
// - Combiner: weighted composite + recommendation classifier
// - Engine:   per-cycle fan-out, last-known view, cadence loop

pub mod combiner;
pub mod engine;

pub use engine::SignalEngine;
