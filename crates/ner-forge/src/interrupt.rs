use ner_forge_core::CancellationToken;

/// Turns interrupts (e.g. Ctrl-C) into cancellation.
///
/// The first interrupt cancels `token` and calls `on_cancel`, which lets the
/// request in flight finish. A second interrupt means the user doesn't want
/// to wait for it: this returns `true` and the caller should exit right
/// away. Returns `false` once `next_interrupt` reports that interrupts can't
/// be listened for anymore.
pub async fn handle_interrupts<F, Fut>(
    token: CancellationToken,
    mut next_interrupt: F,
    on_cancel: impl FnOnce(),
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !next_interrupt().await {
        return false;
    }
    debug!("interrupted, cancelling after the current request");
    token.cancel();
    on_cancel();

    if !next_interrupt().await {
        return false;
    }
    warn!("interrupted again, aborting");
    true
}
