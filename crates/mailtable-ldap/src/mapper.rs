//! Mapping of directory entries to expansion lists

use crate::protocol::SearchEntry;
use mailtable_common::{Error, ExpansionList, ExpansionNode, Result};

/// A virtual-table key without `@` names a domain, not a recipient
pub fn is_domain_key(key: &str) -> bool {
    !key.contains('@')
}

/// Parse every value of `attribute` in `entry` and append it to `expansions`
pub fn append_entry(
    entry: &SearchEntry,
    attribute: &str,
    expansions: &mut ExpansionList,
) -> Result<()> {
    let values = entry.values(attribute).ok_or_else(|| {
        Error::Protocol(format!("entry '{}' has no '{}' attribute", entry.dn, attribute))
    })?;

    for value in values {
        expansions.push(ExpansionNode::parse(value)?);
    }
    Ok(())
}
