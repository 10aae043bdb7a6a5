//! Common types for mailtable lookups

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Characters allowed in a local part besides ASCII alphanumerics
const LOCALPART_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";

/// Maximum length of a local part or username
const MAX_LOCALPART_LEN: usize = 255;

/// Kind of lookup requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupService {
    /// Local alias expansion (`/etc/mail/aliases` style)
    Alias,
    /// Virtual domain / recipient mapping
    Virtual,
    /// Authentication credentials
    Credentials,
    /// Network address matching
    Netaddr,
    /// System user information
    Userinfo,
}

impl LookupService {
    fn bit(self) -> u8 {
        match self {
            LookupService::Alias => 1 << 0,
            LookupService::Virtual => 1 << 1,
            LookupService::Credentials => 1 << 2,
            LookupService::Netaddr => 1 << 3,
            LookupService::Userinfo => 1 << 4,
        }
    }
}

impl std::fmt::Display for LookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupService::Alias => write!(f, "alias"),
            LookupService::Virtual => write!(f, "virtual"),
            LookupService::Credentials => write!(f, "credentials"),
            LookupService::Netaddr => write!(f, "netaddr"),
            LookupService::Userinfo => write!(f, "userinfo"),
        }
    }
}

/// Set of lookup services a backend supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceSet(u8);

impl ServiceSet {
    /// Empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a service to the set
    pub fn with(self, service: LookupService) -> Self {
        Self(self.0 | service.bit())
    }

    /// Check whether the set contains a service
    pub fn contains(&self, service: LookupService) -> bool {
        self.0 & service.bit() != 0
    }
}

impl FromIterator<LookupService> for ServiceSet {
    fn from_iter<I: IntoIterator<Item = LookupService>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string
    pub fn parse(s: &str) -> Option<Self> {
        let (local, domain) = s.rsplit_once('@')?;
        if valid_localpart(local) && valid_domain(domain) {
            Some(Self::new(local, domain.to_ascii_lowercase()))
        } else {
            None
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Parse(format!("Invalid email address: {}", s)))
    }
}

fn valid_localpart(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LOCALPART_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCALPART_SPECIALS.contains(c))
}

fn valid_domain(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// One resolved delivery target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ExpansionNode {
    /// Forward to another address
    Address(EmailAddress),
    /// Deliver to a local user
    Username(String),
    /// Append to a mailbox file
    Filename(PathBuf),
    /// Pipe to a command
    Filter(String),
    /// Read more expansions from a file
    Include(PathBuf),
}

impl ExpansionNode {
    /// Parse one alias value into an expansion node.
    ///
    /// Accepted forms, tried in order: `|command`, `:include:/path`,
    /// `/path`, `user@domain`, `username`.
    pub fn parse(value: &str) -> crate::Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(crate::Error::Parse("empty expansion".to_string()));
        }

        if let Some(command) = value.strip_prefix('|') {
            let command = command.trim();
            if command.is_empty() {
                return Err(crate::Error::Parse("empty filter command".to_string()));
            }
            return Ok(ExpansionNode::Filter(command.to_string()));
        }

        if let Some(path) = value.strip_prefix(":include:") {
            let path = path.trim();
            if !path.starts_with('/') {
                return Err(crate::Error::Parse(format!(
                    "include path must be absolute: {}",
                    path
                )));
            }
            return Ok(ExpansionNode::Include(PathBuf::from(path)));
        }

        if value.starts_with('/') {
            return Ok(ExpansionNode::Filename(PathBuf::from(value)));
        }

        if value.contains('@') {
            return EmailAddress::parse(value)
                .map(ExpansionNode::Address)
                .ok_or_else(|| crate::Error::Parse(format!("invalid address: {}", value)));
        }

        if valid_localpart(value) {
            return Ok(ExpansionNode::Username(value.to_ascii_lowercase()));
        }

        Err(crate::Error::Parse(format!("invalid expansion: {}", value)))
    }
}

impl std::fmt::Display for ExpansionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpansionNode::Address(addr) => write!(f, "{}", addr),
            ExpansionNode::Username(user) => write!(f, "{}", user),
            ExpansionNode::Filename(path) => write!(f, "{}", path.display()),
            ExpansionNode::Filter(command) => write!(f, "|{}", command),
            ExpansionNode::Include(path) => write!(f, ":include:{}", path.display()),
        }
    }
}

/// Ordered result of a successful lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionList {
    nodes: Vec<ExpansionNode>,
}

impl ExpansionList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, keeping insertion order
    pub fn push(&mut self, node: ExpansionNode) {
        self.nodes.push(node);
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExpansionNode> {
        self.nodes.iter()
    }

    pub fn into_nodes(self) -> Vec<ExpansionNode> {
        self.nodes
    }
}

impl Extend<ExpansionNode> for ExpansionList {
    fn extend<I: IntoIterator<Item = ExpansionNode>>(&mut self, iter: I) {
        self.nodes.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ExpansionList {
    type Item = &'a ExpansionNode;
    type IntoIter = std::slice::Iter<'a, ExpansionNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
