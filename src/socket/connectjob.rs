use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{CachingResolver, Name};
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

/// Runs one preconnect: DNS -> TCP -> TLS.
/// Roughly equivalent to net::TransportConnectJob + SSLConnectJob.
#[derive(Debug)]
pub struct ConnectJob {
    host: Name,
    port: u16,
    secure: bool,
    tls: TlsConfig,
    timeout: Duration,
}

impl ConnectJob {
    pub fn new(origin: &Url, tls: TlsConfig, timeout: Duration) -> Result<Self, NetError> {
        let host = Name::from_url(origin).ok_or(NetError::InvalidUrl)?;
        let port = origin.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let secure = match origin.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::DisallowedUrlScheme),
        };
        Ok(Self { host, port, secure, tls, timeout })
    }

    /// Connects within the job's timeout. The timeout covers resolution,
    /// every TCP attempt and the TLS handshake together.
    pub async fn connect(&self, resolver: &CachingResolver) -> Result<SocketType, NetError> {
        match tokio::time::timeout(self.timeout, self.connect_inner(resolver)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(host = %self.host, port = self.port, "connect job timed out");
                Err(NetError::ConnectionTimedOut)
            }
        }
    }

    async fn connect_inner(&self, resolver: &CachingResolver) -> Result<SocketType, NetError> {
        let (addrs, _) = resolver.resolve(self.host.clone()).await?;

        let mut last_error = NetError::ConnectionFailed;
        let mut stream = None;
        for ip in addrs {
            let addr = SocketAddr::new(ip, self.port);
            match TcpStream::connect(addr).await.connection_context(self.host.as_str(), self.port) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::trace!(%addr, error = %e, "TCP connect attempt failed");
                    last_error = e;
                }
            }
        }
        let stream = stream.ok_or(last_error)?;
        let _ = stream.set_nodelay(true);

        if !self.secure {
            return Ok(SocketType::Tcp(stream));
        }

        let connector = self.tls.build_connector()?;
        let mut config = connector.configure().map_err(|_| NetError::SslProtocolError)?;
        if !TlsConfig::should_set_sni(self.host.as_str()) {
            config.set_use_server_name_indication(false);
            config.set_verify_hostname(false);
        }

        let tls_stream =
            tokio_boring::connect(config, self.host.as_str(), stream).await.map_err(|e| {
                tracing::debug!(host = %self.host, error = ?e, "TLS handshake failed");
                NetError::SslProtocolError
            })?;

        Ok(SocketType::Ssl(tls_stream))
    }
}
