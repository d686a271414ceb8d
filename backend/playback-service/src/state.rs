/// Shared application state
use crypto_core::TokenSigner;
use std::sync::Arc;

use crate::catalog::CatalogSource;
use crate::services::{PlaybackResolver, PlaylistRewriter, UpstreamClient};
use crate::settings::PlaybackSettings;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogSource>,
    pub settings: Arc<dyn PlaybackSettings>,
    pub signer: Arc<TokenSigner>,
    pub resolver: PlaybackResolver,
    pub rewriter: PlaylistRewriter,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        settings: Arc<dyn PlaybackSettings>,
        signer: Arc<TokenSigner>,
        token_ttl_secs: i64,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            catalog,
            settings,
            resolver: PlaybackResolver::new(signer.clone(), token_ttl_secs),
            rewriter: PlaylistRewriter::new(signer.clone(), token_ttl_secs),
            signer,
            upstream,
        }
    }
}
