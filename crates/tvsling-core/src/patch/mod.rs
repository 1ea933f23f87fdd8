// The package patch pipeline.
//
// A closed set of tagged steps applied in canonical order to the extracted
// archive. Every step is idempotent by contract -- pipelines run again
// across retries -- and each step either mutates files directly or queues
// HTML fragments on the context, never both. Queued fragments are written
// into `index.html` by a single flush after all steps ran.

mod autologin;
mod diagnostics;
mod index;
mod manifest;
mod playback;
mod plugins;
mod servers;
mod styling;

pub use plugins::PluginPatch;

use std::path::Path;

use secrecy::SecretString;
use tracing::{debug, warn};
use tvsling_api::ServerInfoClient;
use url::Url;

use crate::archive::ArchiveWorkspace;
use crate::error::PatchError;

/// One idempotent transformation of the extracted archive.
///
/// The discriminants are ordered; [`apply_pipeline`] always executes in
/// this sequence regardless of the order steps were enabled in
/// (auto-login must observe the server-list state left by
/// [`ServerConfig`](Self::ServerConfig)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStep {
    IndexRewrite,
    PlaybackShim,
    ServerConfig,
    AutoLogin,
    DiagnosticLogging,
    CustomStyle,
    ManifestPrivileges,
}

impl PatchStep {
    /// Canonical execution order.
    pub const CANONICAL_ORDER: [Self; 7] = [
        Self::IndexRewrite,
        Self::PlaybackShim,
        Self::ServerConfig,
        Self::AutoLogin,
        Self::DiagnosticLogging,
        Self::CustomStyle,
        Self::ManifestPrivileges,
    ];

    async fn apply(self, ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
        match self {
            Self::IndexRewrite => index::apply(ctx),
            Self::PlaybackShim => playback::apply(ctx),
            Self::ServerConfig => servers::apply(ctx),
            Self::AutoLogin => autologin::apply(ctx).await,
            Self::DiagnosticLogging => diagnostics::apply(ctx),
            Self::CustomStyle => styling::apply(ctx),
            Self::ManifestPrivileges => manifest::apply(ctx),
        }
    }
}

/// Data shared by the patch steps: step toggles plus the literal inputs
/// some steps inject. Immutable for the duration of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PatchSettings {
    /// Literal CSS appended by [`PatchStep::CustomStyle`].
    pub custom_css: Option<String>,
    /// Third-party plugins whose compatibility fragments should be queued.
    pub plugins: Vec<PluginPatch>,
    /// Grant the diagnostic WebSocket origin in the manifest CSP.
    pub diagnostics: bool,
}

/// An HTML fragment queued for the single write-back, tagged with the
/// marker that makes re-insertion detectable.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub marker: String,
    pub html: String,
}

/// Mutable state threaded through one pipeline run.
pub struct PatchContext<'a> {
    workspace: &'a ArchiveWorkspace,
    pub server_url: Url,
    pub user_id: Option<String>,
    pub access_token: Option<SecretString>,
    settings: &'a PatchSettings,
    server_info: Option<ServerInfoClient>,
    server_id: Option<String>,
    head_fragments: Vec<Fragment>,
    body_fragments: Vec<Fragment>,
}

impl<'a> PatchContext<'a> {
    pub fn new(
        workspace: &'a ArchiveWorkspace,
        server_url: Url,
        settings: &'a PatchSettings,
    ) -> Self {
        Self {
            workspace,
            server_url,
            user_id: None,
            access_token: None,
            settings,
            server_info: None,
            server_id: None,
            head_fragments: Vec::new(),
            body_fragments: Vec::new(),
        }
    }

    /// Attach stored credentials for the auto-login step.
    pub fn with_credentials(mut self, user_id: String, access_token: SecretString) -> Self {
        self.user_id = Some(user_id);
        self.access_token = Some(access_token);
        self
    }

    /// Attach the client used to resolve the authoritative server id.
    pub fn with_server_info_client(mut self, client: ServerInfoClient) -> Self {
        self.server_info = Some(client);
        self
    }

    /// Pre-seed the server id (tests, or callers that already know it).
    pub fn with_server_id(mut self, server_id: String) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub(crate) fn workspace(&self) -> &ArchiveWorkspace {
        self.workspace
    }

    pub(crate) fn settings(&self) -> &PatchSettings {
        self.settings
    }

    /// The authoritative server identifier, fetched once from the server's
    /// public-info endpoint and cached for the rest of the run.
    pub(crate) async fn resolve_server_id(&mut self) -> Option<String> {
        if self.server_id.is_some() {
            return self.server_id.clone();
        }
        let client = self.server_info.as_ref()?;
        match client.fetch_public_info(&self.server_url).await {
            Ok(info) => {
                self.server_id = Some(info.id.clone());
                Some(info.id)
            }
            Err(err) => {
                warn!(%err, "could not resolve server id");
                None
            }
        }
    }

    pub(crate) fn queue_head(&mut self, marker: impl Into<String>, html: impl Into<String>) {
        self.head_fragments.push(Fragment {
            marker: marker.into(),
            html: html.into(),
        });
    }

    #[allow(dead_code)]
    pub(crate) fn queue_body(&mut self, marker: impl Into<String>, html: impl Into<String>) {
        self.body_fragments.push(Fragment {
            marker: marker.into(),
            html: html.into(),
        });
    }
}

/// Execute the enabled steps in canonical order, then flush queued
/// fragments into `index.html`.
///
/// Recoverable step failures (a missing asset) are logged and skipped;
/// the pipeline continues. Everything else aborts the install attempt.
pub async fn apply_pipeline(
    ctx: &mut PatchContext<'_>,
    enabled: &[PatchStep],
) -> Result<(), PatchError> {
    for step in PatchStep::CANONICAL_ORDER {
        if !enabled.contains(&step) {
            continue;
        }
        debug!(?step, "applying patch step");
        match step.apply(ctx).await {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                warn!(?step, %err, "patch step skipped");
            }
            Err(err) => return Err(err),
        }
    }

    flush_fragments(ctx)
}

/// Single write-back of all queued fragments, immediately before
/// `</head>` / `</body>`. Fragments whose marker is already present are
/// not inserted twice.
fn flush_fragments(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    if ctx.head_fragments.is_empty() && ctx.body_fragments.is_empty() {
        return Ok(());
    }

    let index_path = ctx.workspace.www().join("index.html");
    let Ok(mut content) = std::fs::read_to_string(&index_path) else {
        warn!(path = %index_path.display(), "index.html missing, dropping queued fragments");
        return Ok(());
    };

    let mut changed = false;
    changed |= insert_before(&mut content, "</head>", &ctx.head_fragments);
    changed |= insert_before(&mut content, "</body>", &ctx.body_fragments);

    if changed {
        write_text(&index_path, &content)?;
    }
    Ok(())
}

fn insert_before(content: &mut String, anchor: &str, fragments: &[Fragment]) -> bool {
    let mut changed = false;
    for fragment in fragments {
        if content.contains(&fragment.marker) {
            continue;
        }
        if let Some(pos) = content.find(anchor) {
            content.insert_str(pos, &fragment.html);
            changed = true;
        } else {
            warn!(anchor, marker = %fragment.marker, "anchor not found, fragment dropped");
        }
    }
    changed
}

/// Shared helper: write a patched text file back in place.
pub(crate) fn write_text(path: &Path, content: &str) -> Result<(), PatchError> {
    std::fs::write(path, content).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Shared helper: read a text file a step wants to transform.
pub(crate) fn read_text(path: &Path) -> Result<String, PatchError> {
    if !path.is_file() {
        return Err(PatchError::MissingAsset(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}
