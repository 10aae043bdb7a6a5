//! Directory connection management
//!
//! Resolves the server URL, connects to the first reachable address and
//! authenticates with a simple bind. A handle is only handed out once the
//! server has accepted the credentials.

use crate::protocol::{
    DirectorySession, LdapSession, MessageKind, RESULT_INVALID_CREDENTIALS, RESULT_SUCCESS,
};
use crate::registry::DirectoryConfig;
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use mailtable_common::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::lookup_host;
use tracing::{debug, info, warn};

/// Default LDAP port
pub const DEFAULT_PORT: u16 = 389;

/// Host and port parsed from an `ldap://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapUrl {
    pub host: String,
    pub port: u16,
}

impl LdapUrl {
    /// Parse `ldap://host[:port][/dn...]`; IPv6 hosts must be bracketed
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = |why: &str| Error::Connect(format!("invalid ldap url '{}': {}", url, why));

        let (scheme, rest) = url.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case("ldap") {
            return Err(invalid("unsupported scheme"));
        }

        let authority = rest.split(['/', '?']).next().unwrap_or_default();

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            let port = match after {
                "" => None,
                p => Some(p.strip_prefix(':').ok_or_else(|| invalid("bad port"))?),
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port = match port {
            Some(p) => p.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| invalid("bad port"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "ldap://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "ldap://{}:{}", self.host, self.port)
        }
    }
}

/// Opens transport sessions to a directory server
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: DirectorySession + 'static;

    async fn connect(&self, url: &LdapUrl) -> Result<Self::Session>;
}

/// Plain TCP connector trying every resolved address in order
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// Connect to the first candidate address that accepts
    pub async fn connect_candidates(&self, addrs: &[SocketAddr]) -> Result<LdapSession> {
        let mut last_error = None;

        for addr in addrs {
            let url = format!("ldap://{}", addr);
            match LdapConnAsync::with_settings(LdapConnSettings::new(), &url).await {
                Ok((conn, ldap)) => {
                    tokio::spawn(async move {
                        if let Err(e) = conn.drive().await {
                            warn!(error = %e, "ldap connection driver error");
                        }
                    });
                    debug!(%addr, "connected to ldap server");
                    return Ok(LdapSession::new(ldap, *addr));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "ldap connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Connect(match last_error {
            Some(e) => format!("could not connect to any of {} addresses: {}", addrs.len(), e),
            None => "no candidate addresses".to_string(),
        }))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Session = LdapSession;

    async fn connect(&self, url: &LdapUrl) -> Result<LdapSession> {
        let addrs: Vec<SocketAddr> = lookup_host((url.host.as_str(), url.port))
            .await
            .map_err(|e| Error::Connect(format!("could not resolve {}: {}", url.host, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(Error::Connect(format!("no addresses found for {}", url.host)));
        }

        debug!(%url, candidates = addrs.len(), "resolved ldap server");
        self.connect_candidates(&addrs).await
    }
}

/// Authenticate with a simple bind and wait for its response
pub async fn authenticate<S: DirectorySession + ?Sized>(
    session: &mut S,
    username: &str,
    password: &str,
) -> Result<()> {
    let id = session.bind(username, password).await?;
    let message = session.next_message().await?;

    if message.id != id {
        return Err(Error::Protocol(format!(
            "bind response id {} does not match request {}",
            message.id, id
        )));
    }

    match message.kind {
        MessageKind::BindResponse(result) => match result.code {
            RESULT_SUCCESS => Ok(()),
            RESULT_INVALID_CREDENTIALS => Err(Error::Auth(format!(
                "ldap server refused credentials for '{}'",
                username
            ))),
            code => Err(Error::Protocol(format!(
                "failed to bind, result #{}: {}",
                code, result.message
            ))),
        },
        other => Err(Error::Protocol(format!(
            "expected bind-response, got {}",
            other.name()
        ))),
    }
}

/// Authenticated session paired with its configuration
pub struct ConnectionHandle<S> {
    session: S,
    config: Arc<DirectoryConfig>,
}

impl<S: DirectorySession> ConnectionHandle<S> {
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Configuration and session borrowed together for one lookup
    pub fn parts_mut(&mut self) -> (&DirectoryConfig, &mut S) {
        (&self.config, &mut self.session)
    }

    /// Terminate the session
    pub async fn close(mut self) {
        self.session.close().await;
        debug!(identifier = %self.config.identifier, "ldap connection closed");
    }
}

impl<S> std::fmt::Debug for ConnectionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("identifier", &self.config.identifier)
            .finish_non_exhaustive()
    }
}

/// Opens authenticated connections
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager<C = TcpConnector> {
    connector: C,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Connect and bind; a failed bind closes the session before returning
    pub async fn open(&self, config: Arc<DirectoryConfig>) -> Result<ConnectionHandle<C::Session>> {
        let url = LdapUrl::parse(&config.url)?;
        let mut session = self.connector.connect(&url).await?;

        if let Err(e) = authenticate(&mut session, &config.username, &config.password).await {
            warn!(identifier = %config.identifier, error = %e, "ldap bind failed");
            session.close().await;
            return Err(e);
        }

        info!(identifier = %config.identifier, %url, "ldap server accepted credentials");
        Ok(ConnectionHandle { session, config })
    }
}
