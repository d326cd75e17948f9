//! Single-slot cancellation for the in-flight request.

use tokio_util::sync::CancellationToken;

/// Holds the token of the one request allowed in flight.
#[derive(Debug, Default)]
pub struct CancellationController {
    slot: Option<CancellationToken>,
}

impl CancellationController {
    /// Create an empty controller.
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Install a fresh token for a new request, replacing any stale one.
    pub fn begin(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.slot = Some(token.clone());
        token
    }

    /// Signal the in-flight request. Returns `false` when nothing is in
    /// flight.
    pub fn cancel(&self) -> bool {
        self.slot.as_ref().is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Clear the slot after settlement.
    pub fn finish(&mut self) {
        self.slot = None;
    }
}
