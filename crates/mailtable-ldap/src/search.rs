//! Paged search execution
//!
//! One lookup issues a subtree search for the configured attribute and keeps
//! requesting pages while the server returns a non-empty paged-results
//! cookie. Every response must carry the id of the outstanding request.
//! The result code of a search completion only ends the page; entries
//! already received are kept.
//!
//! There is no timeout at this layer: a server that stops answering blocks
//! the lookup until the transport gives up.

use crate::mapper;
use crate::protocol::{DirectorySession, MessageId, MessageKind, PageCursor, SearchRequest};
use crate::registry::DirectoryConfig;
use crate::template;
use mailtable_common::{Error, ExpansionList, Result};
use tracing::{debug, warn};

/// Paged search for one directory configuration
#[derive(Debug, Clone, Copy)]
pub struct PagedSearch<'a> {
    config: &'a DirectoryConfig,
    max_filter_len: usize,
}

impl<'a> PagedSearch<'a> {
    pub fn new(config: &'a DirectoryConfig, max_filter_len: usize) -> Self {
        Self {
            config,
            max_filter_len,
        }
    }

    /// Run the search for `key`.
    ///
    /// On failure nothing collected so far is returned; the cause is logged
    /// and reported as [`Error::Lookup`]. Responses still queued for the
    /// aborted request are discarded so the session stays usable.
    pub async fn execute<S>(&self, session: &mut S, key: &str) -> Result<ExpansionList>
    where
        S: DirectorySession + ?Sized,
    {
        match self.run(session, key).await {
            Ok(expansions) => Ok(expansions),
            Err(e) => {
                session.discard_pending().await;
                warn!(
                    identifier = %self.config.identifier,
                    key,
                    code = e.code(),
                    error = %e,
                    "ldap lookup aborted"
                );
                Err(Error::Lookup)
            }
        }
    }

    async fn run<S>(&self, session: &mut S, key: &str) -> Result<ExpansionList>
    where
        S: DirectorySession + ?Sized,
    {
        let filter = template::expand(&self.config.filter, key, self.max_filter_len)?;
        let request = SearchRequest {
            base_dn: &self.config.basedn,
            filter: &filter,
            attribute: &self.config.attribute,
            page_size: self.config.page_size,
        };

        let mut expansions = ExpansionList::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;

        loop {
            let id = session.search(&request, cursor.as_ref()).await?;
            pages += 1;

            cursor = self.read_page(session, id, &mut expansions).await?;
            if cursor.is_none() {
                break;
            }
        }

        debug!(
            identifier = %self.config.identifier,
            filter = %filter,
            pages,
            entries = expansions.len(),
            "ldap search completed"
        );
        Ok(expansions)
    }

    /// Consume responses until the end of the current page
    async fn read_page<S>(
        &self,
        session: &mut S,
        id: MessageId,
        expansions: &mut ExpansionList,
    ) -> Result<Option<PageCursor>>
    where
        S: DirectorySession + ?Sized,
    {
        loop {
            let message = session.next_message().await?;
            if message.id != id {
                return Err(Error::Protocol(format!(
                    "response id {} does not match request {}",
                    message.id, id
                )));
            }

            match message.kind {
                MessageKind::SearchResult { result, cursor } => {
                    if !result.is_success() {
                        debug!(
                            identifier = %self.config.identifier,
                            code = result.code,
                            message = %result.message,
                            "search page ended with non-success result"
                        );
                    }
                    return Ok(cursor);
                }
                MessageKind::SearchEntry(entry) => {
                    mapper::append_entry(&entry, &self.config.attribute, expansions)?;
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected {} message during search",
                        other.name()
                    )));
                }
            }
        }
    }
}
