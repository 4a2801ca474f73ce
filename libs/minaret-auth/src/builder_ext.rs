use tower::ServiceExt;

use crate::layer::SessionAuthLayer;

/// Extension trait installing the session pipeline into a
/// [`minaret_http::HttpClientBuilder`].
///
/// ```ignore
/// use minaret_auth::HttpClientBuilderExt;
///
/// let client = HttpClientBuilder::new()
///     .with_session_auth(SessionAuthLayer::new(store, coordinator))
///     .build()?;
/// ```
pub trait HttpClientBuilderExt {
    /// Attach stored bearer tokens and recover once from expired sessions.
    #[must_use]
    fn with_session_auth(self, layer: SessionAuthLayer) -> Self;
}

impl HttpClientBuilderExt for minaret_http::HttpClientBuilder {
    fn with_session_auth(self, layer: SessionAuthLayer) -> Self {
        self.with_auth_layer(move |svc| {
            tower::ServiceBuilder::new()
                .layer(layer)
                .service(svc)
                .boxed_clone()
        })
    }
}
