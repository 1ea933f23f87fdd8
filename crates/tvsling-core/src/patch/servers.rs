// Server-address configuration update.
//
// The web root carries a JSON server-list manifest. This step pins the
// client to single-server mode and appends the normalized target URL with
// set semantics.

use serde::{Deserialize, Serialize};

use super::{PatchContext, write_text};
use crate::error::PatchError;

/// `www/config.json`: `{ "multiserver": bool, "servers": [url, ...] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ServerManifest {
    #[serde(default)]
    pub multiserver: bool,
    #[serde(default)]
    pub servers: Vec<String>,
}

pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let path = ctx.workspace().www().join("config.json");

    // Read-or-create: a package without the manifest gets a fresh one.
    let mut manifest = if path.is_file() {
        let content = std::fs::read(&path).map_err(|source| PatchError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice::<ServerManifest>(&content)?
    } else {
        ServerManifest::default()
    };

    manifest.multiserver = false;

    let server = normalize_url(ctx.server_url.as_str());
    if !manifest.servers.iter().any(|s| normalize_url(s) == server) {
        manifest.servers.push(server);
    }

    let json = serde_json::to_string_pretty(&manifest)?;
    write_text(&path, &json)
}

/// Trailing-slash-insensitive comparison form.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn normalization_strips_trailing_slash() {
        assert_eq!(normalize_url("http://a/"), "http://a");
        assert_eq!(normalize_url("http://a"), "http://a");
    }

    #[test]
    fn manifest_defaults_are_empty() {
        let manifest: ServerManifest = serde_json::from_str("{}").unwrap();
        assert!(!manifest.multiserver);
        assert!(manifest.servers.is_empty());
    }
}
