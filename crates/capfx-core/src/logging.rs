// Effect runtime logging
//
// This module provides logging utilities for the effect runtime. Everything is
// emitted at trace or debug level.

use tracing::{debug, enabled, trace, Level};

use crate::capability::{Layer, Record};

/// Log the start of a root computation
pub fn log_run_start(runner: &str) {
    trace!("Running root computation: {runner}");
}

/// Log a scope being pushed onto the record
pub fn log_scope_installed(layer: &Layer, record: &Record) {
    if !enabled!(Level::TRACE) {
        return;
    }
    let capabilities = layer.names();
    let depth = record.depth();
    trace!(depth, "Installed capability scope: {capabilities:?}");
}

/// Log a cancellation request forwarded through a slot
pub fn log_cancel_requested(generation: u64, armed: bool) {
    debug!(generation, armed, "Cancellation requested");
}

/// Log one step of the sequential composer
pub fn log_composer_step(step: u64, synchronous: bool) {
    trace!(step, synchronous, "Composer step completed");
}

/// Log a raised domain error reaching a handler
pub fn log_error_raised(handler: &str) {
    debug!("Error raised to handler: {handler}");
}
