use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocindexError, Result};

/// 128-bit content digest (MD5, lowercase hex) used only to notice that a
/// file changed. Vector ids are derived separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an in-memory buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Fingerprint(format!("{:x}", md5::compute(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(hex: String) -> Self {
        Fingerprint(hex)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a file's full byte content.
pub fn compute_fingerprint(path: &Path) -> Result<Fingerprint> {
    let content = std::fs::read(path).map_err(DocindexError::Io)?;
    Ok(Fingerprint::of_bytes(&content))
}
