//! Upload key naming.

use std::fmt;

use uuid::Uuid;

/// Object key of the form `{prefix}/{uuid}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey(String);

impl UploadKey {
    /// Generate a fresh key. Surrounding slashes on the prefix and a leading
    /// dot on the extension are ignored.
    pub fn generate(prefix: &str, extension: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let extension = extension.trim_start_matches('.');
        let name = Uuid::new_v4();

        if prefix.is_empty() {
            Self(format!("{}.{}", name, extension))
        } else {
            Self(format!("{}/{}.{}", prefix, name, extension))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content type for an artifact extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
