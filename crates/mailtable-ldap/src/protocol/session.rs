//! Directory session backed by an `ldap3` connection
//!
//! `ldap3` correlates responses with their requests and collects a whole
//! page before returning. The session replays each page as individual
//! messages tagged with the id `ldap3` assigned to the request.

use super::{
    DirectorySession, LdapResult, MessageId, MessageKind, PageCursor, ProtocolMessage,
    SearchEntry, SearchRequest,
};
use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{Ldap, ResultEntry, Scope, SearchResult};
use mailtable_common::{Error, Result};
use std::collections::VecDeque;
use std::net::SocketAddr;
use tracing::debug;

/// LDAP session bound to one server connection
#[derive(Debug)]
pub struct LdapSession {
    ldap: Ldap,
    peer: SocketAddr,
    pending: VecDeque<ProtocolMessage>,
}

impl LdapSession {
    /// Wrap a connected `ldap3` handle whose driver is already running
    pub fn new(ldap: Ldap, peer: SocketAddr) -> Self {
        Self {
            ldap,
            peer,
            pending: VecDeque::new(),
        }
    }

    /// Address of the directory server
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn request_failed(&self, what: &str, e: ldap3::LdapError) -> Error {
        Error::Protocol(format!("{} to {} failed: {}", what, self.peer, e))
    }
}

fn convert_result(result: ldap3::LdapResult) -> LdapResult {
    LdapResult {
        code: result.rc,
        matched_dn: result.matched,
        message: result.text,
    }
}

fn convert_entry(entry: ResultEntry) -> MessageKind {
    if entry.is_ref() {
        return MessageKind::SearchReference;
    }
    if entry.is_intermediate() {
        return MessageKind::Intermediate;
    }

    let entry = ldap3::SearchEntry::construct(entry);
    MessageKind::SearchEntry(SearchEntry {
        dn: entry.dn,
        attributes: entry.attrs.into_iter().collect(),
    })
}

/// Continuation cookie from the paged-results response control, if any
fn page_cursor(controls: &[Control]) -> Option<PageCursor> {
    controls.iter().find_map(|Control(kind, raw)| match kind {
        Some(ControlType::PagedResults) if raw.val.is_some() => {
            PageCursor::new(raw.parse::<PagedResults>().cookie)
        }
        _ => None,
    })
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<MessageId> {
        let result = match self.ldap.simple_bind(dn, password).await {
            Ok(result) => result,
            Err(e) => return Err(self.request_failed("bind", e)),
        };
        let id = self.ldap.last_id();

        self.pending.push_back(ProtocolMessage {
            id,
            kind: MessageKind::BindResponse(convert_result(result)),
        });
        Ok(id)
    }

    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
        cursor: Option<&PageCursor>,
    ) -> Result<MessageId> {
        let control = PagedResults {
            size: i32::try_from(request.page_size).unwrap_or(i32::MAX),
            cookie: cursor.map(|c| c.as_bytes().to_vec()).unwrap_or_default(),
        };

        let page = self
            .ldap
            .with_controls(control)
            .search(
                request.base_dn,
                Scope::Subtree,
                request.filter,
                vec![request.attribute],
            )
            .await;
        let SearchResult(entries, result) = match page {
            Ok(page) => page,
            Err(e) => return Err(self.request_failed("search", e)),
        };
        let id = self.ldap.last_id();

        debug!(peer = %self.peer, id, entries = entries.len(), rc = result.rc, "ldap page received");

        for entry in entries {
            self.pending.push_back(ProtocolMessage {
                id,
                kind: convert_entry(entry),
            });
        }
        let cursor = page_cursor(&result.ctrls);
        self.pending.push_back(ProtocolMessage {
            id,
            kind: MessageKind::SearchResult {
                result: convert_result(result),
                cursor,
            },
        });

        Ok(id)
    }

    async fn next_message(&mut self) -> Result<ProtocolMessage> {
        self.pending.pop_front().ok_or_else(|| {
            Error::Protocol(format!("no response pending from {}", self.peer))
        })
    }

    async fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(peer = %self.peer, dropped = self.pending.len(), "discarding unread ldap responses");
            self.pending.clear();
        }
    }

    async fn close(&mut self) {
        self.pending.clear();
        if let Err(e) = self.ldap.unbind().await {
            debug!(peer = %self.peer, error = %e, "unbind failed");
        }
    }
}
