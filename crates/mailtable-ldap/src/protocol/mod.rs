//! LDAPv3 protocol primitives
//!
//! The [`DirectorySession`] trait is the seam between lookup logic and the
//! wire: it issues requests, hands out their message ids, and yields decoded
//! responses one at a time. [`LdapSession`] implements it on top of `ldap3`.

mod session;

pub use session::LdapSession;

use async_trait::async_trait;
use mailtable_common::Result;

/// Per-request correlation number echoed by every response
pub type MessageId = i32;

/// LDAP result code for success
pub const RESULT_SUCCESS: u32 = 0;

/// LDAP result code for a rejected bind
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;

/// Result component of bind responses and search completions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapResult {
    pub code: u32,
    pub matched_dn: String,
    pub message: String,
}

impl LdapResult {
    pub fn is_success(&self) -> bool {
        self.code == RESULT_SUCCESS
    }
}

/// One entry returned by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub dn: String,
    pub attributes: Vec<(String, Vec<String>)>,
}

impl SearchEntry {
    /// Values of an attribute, matched case-insensitively
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

/// Paged-results continuation cookie; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(Vec<u8>);

impl PageCursor {
    /// Wrap a cookie, returning `None` when the server signalled the last page
    pub fn new(cookie: Vec<u8>) -> Option<Self> {
        if cookie.is_empty() {
            None
        } else {
            Some(Self(cookie))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Decoded protocol operation carried by a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    BindResponse(LdapResult),
    SearchEntry(SearchEntry),
    SearchResult {
        result: LdapResult,
        cursor: Option<PageCursor>,
    },
    /// Continuation reference to another server
    SearchReference,
    /// Intermediate response
    Intermediate,
}

impl MessageKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::BindResponse(_) => "bind-response",
            MessageKind::SearchEntry(_) => "search-entry",
            MessageKind::SearchResult { .. } => "search-result",
            MessageKind::SearchReference => "search-reference",
            MessageKind::Intermediate => "intermediate",
        }
    }
}

/// One decoded response unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub id: MessageId,
    pub kind: MessageKind,
}

/// Parameters of a subtree search for a single attribute
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub base_dn: &'a str,
    pub filter: &'a str,
    pub attribute: &'a str,
    pub page_size: u32,
}

/// Request/response primitives of an authenticated directory session
#[async_trait]
pub trait DirectorySession: Send {
    /// Send a simple bind request
    async fn bind(&mut self, dn: &str, password: &str) -> Result<MessageId>;

    /// Send a paged subtree search, continuing from `cursor` when given
    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
        cursor: Option<&PageCursor>,
    ) -> Result<MessageId>;

    /// Wait for the next response message
    async fn next_message(&mut self) -> Result<ProtocolMessage>;

    /// Drop every response not yet consumed, leaving the session ready for
    /// the next request
    async fn discard_pending(&mut self);

    /// Terminate the session
    async fn close(&mut self);
}
