use crate::api::routes;
use crate::config::{SharedConfig, TlsProvider};
use crate::db::SharedStore;
use std::future::Future;
use std::net::SocketAddr;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub store: SharedStore,
}

pub fn new(
    config: SharedConfig,
    store: SharedStore,
) -> impl Future<Output = hyper::Result<()>> {
    if config.api.tls != TlsProvider::None {
        // Certificate provisioning happens outside this crate.
        tracing::warn!(tls = ?config.api.tls, "TLS is not terminated here, serving plain HTTP");
    }
    axum::Server::bind(&config.api_bind_addr()).serve(
        routes::router(config, store).into_make_service_with_connect_info::<SocketAddr>(),
    )
}
