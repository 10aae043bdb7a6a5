//! Lookup backend contract
//!
//! A backend is configured once from its raw configuration text, then opened
//! into one or more handles. Each handle is driven by one caller at a time.

use crate::types::{ExpansionList, LookupService, ServiceSet};
use crate::Result;
use async_trait::async_trait;

/// Lookup backend trait implemented by every table kind
#[async_trait]
pub trait LookupBackend: Send + Sync {
    /// Live connection state owned by the caller between `open` and `close`
    type Handle: Send;

    /// Lookup services this backend can answer
    fn services(&self) -> ServiceSet;

    /// Parse and validate the backend configuration
    async fn configure(&mut self, config: &str) -> Result<()>;

    /// Open a new handle
    async fn open(&self) -> Result<Self::Handle>;

    /// Reload backend state
    async fn refresh(&self) -> Result<()>;

    /// Close a handle, releasing its resources
    async fn close(&self, handle: Self::Handle);

    /// Resolve a key.
    ///
    /// `Ok(None)` means the key exists without an expansion to return, or the
    /// service is not handled by this backend.
    async fn lookup(
        &self,
        handle: &mut Self::Handle,
        key: &str,
        service: LookupService,
    ) -> Result<Option<ExpansionList>>;
}
