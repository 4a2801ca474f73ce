use std::sync::Arc;

use httpmock::MockServer;
use minaret_auth::{CredentialStore, MemoryCredentialStore, TokenPair};
use url::Url;

use crate::{ApiClient, ApiClientConfig};

pub fn config_for(server: &MockServer) -> ApiClientConfig {
    ApiClientConfig::for_testing(Url::parse(&server.base_url()).unwrap())
}

pub fn store_with(access: &str, refresh: &str) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_tokens(TokenPair::new(access, refresh)))
}

pub fn api_client(server: &MockServer, store: Arc<MemoryCredentialStore>) -> ApiClient {
    let store: Arc<dyn CredentialStore> = store;
    ApiClient::builder(config_for(server), store).build().unwrap()
}
