//! Lifecycle events for bindings and deferred compactions.
//!
//! Emitted under the `reclaim::lifecycle` target so a subscriber can route
//! them apart from diagnostic logs.

use reclaim_core::id::BindingToken;

use crate::registry::CleanupCause;

pub const TARGET: &str = "reclaim::lifecycle";

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) enum Lifecycle<'a> {
    BindingReleased {
        token: BindingToken,
        label: Option<&'a str>,
        cause: CleanupCause,
        held_ms: u64,
    },
    CompactionRun {
        delay_ms: u64,
    },
}

impl Lifecycle<'_> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Lifecycle::BindingReleased { .. } => "binding_released",
            Lifecycle::CompactionRun { .. } => "compaction_run",
        }
    }

    #[cfg(feature = "tracing")]
    pub(crate) fn emit(&self) {
        let event = self.name();
        match self {
            Lifecycle::BindingReleased {
                token,
                label,
                cause,
                held_ms,
            } => tracing::trace!(
                target: TARGET,
                event,
                %token,
                label = label.unwrap_or(""),
                ?cause,
                held_ms
            ),
            Lifecycle::CompactionRun { delay_ms } => {
                tracing::trace!(target: TARGET, event, delay_ms)
            }
        }
    }

    #[cfg(not(feature = "tracing"))]
    pub(crate) fn emit(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_named_for_filtering() {
        let released = Lifecycle::BindingReleased {
            token: BindingToken::fresh(),
            label: Some("fetch"),
            cause: CleanupCause::Fulfilled,
            held_ms: 3,
        };
        assert_eq!(released.name(), "binding_released");
        assert_eq!(Lifecycle::CompactionRun { delay_ms: 50 }.name(), "compaction_run");
        released.emit();
    }
}
