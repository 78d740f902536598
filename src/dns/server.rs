use crate::config::{Protocol, SharedConfig};
use crate::db::SharedStore;
use crate::dns::handlers::Handler;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

/// Builds the DNS server with the transports selected by
/// `general.protocol`, listening on `general.listen`.
pub async fn new(config: SharedConfig, store: SharedStore) -> anyhow::Result<ServerFuture<Handler>> {
    let listen = config.general.listen;
    let tcp_timeout = config.general.dns_tcp_timeout;
    let protocol = config.general.protocol;
    let handler = Handler::new(&config, store)?;
    let mut dns_server = ServerFuture::new(handler);
    if matches!(protocol, Protocol::Both | Protocol::Udp) {
        dns_server.register_socket(UdpSocket::bind(listen).await?);
    }
    if matches!(protocol, Protocol::Both | Protocol::Tcp) {
        dns_server.register_listener(TcpListener::bind(listen).await?, tcp_timeout);
    }
    Ok(dns_server)
}
