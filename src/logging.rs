//! Tracing instrumentation for the dispatcher.
//!
//! One span per command, tagged with the command kind and the worker's
//! fragment id, so a multi-worker run's logs can be filtered down to a
//! single command or a single worker.

use crate::command::CommandKind;

/// Open (but do not enter) the span `GrapeInstance::on_receive` wraps every
/// dispatch in.
#[must_use]
pub fn command_span(kind: CommandKind, fid: u32) -> tracing::Span {
    tracing::info_span!("command", kind = ?kind, fid)
}

/// Install a subscriber that prints to stderr, filterable via `RUST_LOG`.
/// Only used by tests and examples; the embedding process owns subscriber
/// setup in production, same as the upstream engine's worker process does.
#[cfg(test)]
pub fn init_test_subscriber() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_span_carries_kind_and_fid() {
        init_test_subscriber();
        let span = command_span(CommandKind::CreateGraph, 2);
        let _enter = span.enter();
        tracing::info!("inside span");
    }
}
