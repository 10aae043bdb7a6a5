//! mailtable LDAP - directory-backed alias and virtual lookups
//!
//! Resolves lookup keys into expansion lists by running paged LDAP searches
//! against a directory server. The flow for one lookup is:
//! registry → connection → filter template → paged search → result mapping.
//!
//! Substituted keys are not escaped against filter metacharacters. Callers
//! must only pass keys they trust to be well-formed.

pub mod connection;
pub mod mapper;
pub mod protocol;
pub mod registry;
pub mod search;
pub mod table;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionHandle, ConnectionManager, Connector, LdapUrl, TcpConnector};
pub use protocol::{DirectorySession, LdapSession, MessageId, MessageKind, PageCursor, ProtocolMessage};
pub use registry::{ConfigRegistry, DirectoryConfig};
pub use search::PagedSearch;
pub use table::LdapTable;
