//! Filter template expansion
//!
//! Every `%k` is replaced by the key. A `%` followed by anything else is
//! dropped, so `%%k` also yields the key.
//!
//! The key is inserted verbatim: filter metacharacters such as `*`, `(`,
//! `)` and `\` are not escaped, so a key containing them changes the
//! meaning of the filter.

use mailtable_common::{Error, Result};

/// Bounded string builder for search filters
#[derive(Debug)]
pub struct FilterBuilder {
    buf: String,
    capacity: usize,
}

impl FilterBuilder {
    /// Builder accepting up to twice `max_filter_len` bytes
    pub fn with_limit(max_filter_len: usize) -> Self {
        Self {
            buf: String::new(),
            capacity: max_filter_len.saturating_mul(2),
        }
    }

    /// Append a literal run or a key
    pub fn push(&mut self, part: &str) -> Result<()> {
        if self.buf.len() + part.len() > self.capacity {
            return Err(Error::LimitExceeded(format!(
                "search filter longer than {} bytes",
                self.capacity
            )));
        }
        self.buf.push_str(part);
        Ok(())
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Replace every `%k` in `template` with `key`
pub fn expand(template: &str, key: &str, max_filter_len: usize) -> Result<String> {
    let mut builder = FilterBuilder::with_limit(max_filter_len);
    let mut parts = template.split('%');

    if let Some(head) = parts.next() {
        builder.push(head)?;
    }
    for part in parts {
        match part.strip_prefix('k') {
            Some(rest) => {
                builder.push(key)?;
                builder.push(rest)?;
            }
            None => builder.push(part)?,
        }
    }

    Ok(builder.finish())
}
