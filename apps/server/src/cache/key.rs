//! Cache key fingerprints

use crate::db::SqlValue;
use crate::query::QueryOptions;
use sha2::{Digest, Sha256};

/// Fingerprint a statement and its parameters.
///
/// Keys look like `<namespace>:<sha256 hex>`. The namespace comes from
/// `options.cache_namespace` and is the only option that takes part in the
/// key, so callers can drop a whole family of reads with
/// [`ResultCache::invalidate_prefix`](super::ResultCache::invalidate_prefix).
/// Any difference in SQL text, parameter value, type or order yields a
/// different digest.
pub fn compute_key(sql: &str, params: &[SqlValue], options: &QueryOptions) -> String {
    let mut buf = Vec::with_capacity(sql.len() + params.len() * 16 + 16);
    buf.extend_from_slice(&(sql.len() as u64).to_le_bytes());
    buf.extend_from_slice(sql.as_bytes());
    buf.extend_from_slice(&(params.len() as u64).to_le_bytes());
    for param in params {
        param.write_fingerprint(&mut buf);
    }

    let digest = Sha256::digest(&buf);
    format!("{}:{:x}", options.namespace(), digest)
}
