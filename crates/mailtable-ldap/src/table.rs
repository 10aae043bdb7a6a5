//! LDAP lookup table

use crate::connection::{ConnectionHandle, ConnectionManager, Connector, TcpConnector};
use crate::mapper;
use crate::registry::ConfigRegistry;
use crate::search::PagedSearch;
use async_trait::async_trait;
use mailtable_common::config::LdapSettings;
use mailtable_common::{Error, ExpansionList, LookupBackend, LookupService, Result, ServiceSet};
use std::sync::Arc;
use tracing::debug;

/// Lookup backend answering alias and virtual lookups from a directory
#[derive(Debug)]
pub struct LdapTable<C = TcpConnector> {
    registry: Arc<ConfigRegistry>,
    settings: LdapSettings,
    connections: ConnectionManager<C>,
    identifier: Option<String>,
}

impl LdapTable<TcpConnector> {
    /// Create a table connecting over TCP
    pub fn new(registry: Arc<ConfigRegistry>, settings: LdapSettings) -> Self {
        Self::with_connector(registry, settings, TcpConnector)
    }
}

impl<C: Connector> LdapTable<C> {
    pub fn with_connector(registry: Arc<ConfigRegistry>, settings: LdapSettings, connector: C) -> Self {
        Self {
            registry,
            settings,
            connections: ConnectionManager::new(connector),
            identifier: None,
        }
    }

    /// Identifier of the configuration this table is bound to
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }
}

#[async_trait]
impl<C> LookupBackend for LdapTable<C>
where
    C: Connector + 'static,
{
    type Handle = ConnectionHandle<C::Session>;

    fn services(&self) -> ServiceSet {
        ServiceSet::empty()
            .with(LookupService::Alias)
            .with(LookupService::Virtual)
    }

    async fn configure(&mut self, config: &str) -> Result<()> {
        let config = self.registry.register_from_text(config).await?;
        self.identifier = Some(config.identifier.clone());
        Ok(())
    }

    async fn open(&self) -> Result<Self::Handle> {
        let identifier = self
            .identifier
            .as_deref()
            .ok_or_else(|| Error::Config("ldap table is not configured".to_string()))?;
        let config = self.registry.find(identifier).await.ok_or_else(|| {
            Error::Config(format!("unknown ldap configuration '{}'", identifier))
        })?;

        self.connections.open(config).await
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self, handle: Self::Handle) {
        handle.close().await;
    }

    async fn lookup(
        &self,
        handle: &mut Self::Handle,
        key: &str,
        service: LookupService,
    ) -> Result<Option<ExpansionList>> {
        match service {
            LookupService::Virtual if mapper::is_domain_key(key) => {
                debug!(key, "virtual domain lookup, no query");
                Ok(None)
            }
            LookupService::Alias | LookupService::Virtual => {
                let (config, session) = handle.parts_mut();
                let expansions = PagedSearch::new(config, self.settings.max_filter_len)
                    .execute(session, key)
                    .await?;
                Ok(Some(expansions))
            }
            other => {
                debug!(service = %other, "lookup service not supported by ldap table");
                Ok(None)
            }
        }
    }
}
