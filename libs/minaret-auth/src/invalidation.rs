use async_trait::async_trait;

/// Notified when the pipeline gives up on a session.
///
/// Called once per exhausted recovery, after credentials have been cleared.
/// Implementations typically publish a logged-out state.
#[async_trait]
pub trait SessionInvalidationHandler: Send + Sync {
    async fn on_session_invalidated(&self);
}
