// Playback-compatibility shim.
//
// The client ships a wrapper around a third-party embedded player that
// the platform's web runtime cannot load. The shim prepends a local
// implementation of the expected player interface backed by the
// diagnostic bridge's `/player.html` surface, and stamps a marker so a
// second run is a byte-identical no-op.

use walkdir::WalkDir;

use super::{PatchContext, read_text, write_text};
use crate::error::PatchError;
use crate::{BRIDGE_ORIGIN, BRIDGE_PORT};

/// File-name hint identifying the third-party player bundle.
const PLAYER_BUNDLE_HINT: &str = "youtube";

/// Idempotence marker stamped at the top of a patched bundle.
pub(crate) const SHIM_MARKER: &str = "/* tvsling:playback-shim */";

pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let www = ctx.workspace().www();
    if !www.is_dir() {
        return Err(PatchError::MissingAsset(www));
    }

    let mut patched_any = false;
    for entry in WalkDir::new(&www).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        if !name.ends_with(".js") || !name.contains(PLAYER_BUNDLE_HINT) {
            continue;
        }

        let content = read_text(entry.path())?;
        if content.starts_with(SHIM_MARKER) {
            continue; // already patched
        }

        let mut patched = String::with_capacity(SHIM_MARKER.len() + shim_source().len() + content.len());
        patched.push_str(SHIM_MARKER);
        patched.push('\n');
        patched.push_str(&shim_source());
        patched.push_str(&content);
        write_text(entry.path(), &patched)?;
        patched_any = true;
    }

    if patched_any {
        tracing::debug!("playback shim applied");
    }
    Ok(())
}

/// The bridge-backed player: implements the interface the wrapper expects
/// (play/pause/stop/seek/state/volume) against an iframe served by the
/// local bridge.
fn shim_source() -> String {
    format!(
        r#"(function () {{
  var frame = null;
  function bridge(path) {{ return '{BRIDGE_ORIGIN}' + path; }}
  function post(cmd, arg) {{
    if (frame && frame.contentWindow) {{
      frame.contentWindow.postMessage({{ command: cmd, argument: arg }}, '*');
    }}
  }}
  window.EmbeddedPlayer = {{
    load: function (videoId, host) {{
      frame = document.createElement('iframe');
      frame.className = 'embeddedPlayerFrame';
      frame.src = bridge('/player.html?videoId=' + encodeURIComponent(videoId));
      (host || document.body).appendChild(frame);
    }},
    play: function () {{ post('play'); }},
    pause: function () {{ post('pause'); }},
    stop: function () {{
      post('stop');
      if (frame) {{ frame.remove(); frame = null; }}
    }},
    seekTo: function (seconds) {{ post('seek', seconds); }},
    setVolume: function (level) {{ post('volume', level); }},
    getPlayerState: function () {{ return frame ? 1 : 0; }},
    port: {BRIDGE_PORT}
  }};
}})();
"#
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::archive::ArchiveWorkspace;
    use crate::patch::PatchSettings;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use url::Url;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn make_archive_with_player(dir: &Path) -> PathBuf {
        let path = dir.join("app.wgt");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("config.xml", options).unwrap();
        writer.write_all(b"<widget></widget>").unwrap();
        writer.start_file("www/index.html", options).unwrap();
        writer
            .write_all(b"<html><head></head><body></body></html>")
            .unwrap();
        writer.start_file("www/youtubeplayer.js", options).unwrap();
        writer.write_all(b"var player = 'external';").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn shim_applies_once() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_archive_with_player(dir.path());
        let ws = ArchiveWorkspace::extract(&archive).unwrap();
        let settings = PatchSettings::default();
        let url = Url::parse("http://media.local:8096").unwrap();
        let mut ctx = PatchContext::new(&ws, url, &settings);

        apply(&mut ctx).unwrap();
        let bundle = ws.www().join("youtubeplayer.js");
        let once = std::fs::read_to_string(&bundle).unwrap();
        assert!(once.starts_with(SHIM_MARKER));
        assert!(once.contains("var player = 'external';"));

        // Idempotence: second run is byte-identical.
        apply(&mut ctx).unwrap();
        let twice = std::fs::read_to_string(&bundle).unwrap();
        assert_eq!(once, twice);
    }
}
