// Manifest privilege/CSP patch.
//
// Rewrites the archive-level manifest (`config.xml`) to declare the
// background network service, the platform privileges the patched client
// needs, and a content-security-policy admitting the local bridge origin.
// Pre-existing declarations are removed first so reinstalls never
// accumulate duplicates.

use tracing::debug;

use super::{PatchContext, read_text, write_text};
use crate::error::PatchError;
use crate::{BRIDGE_ORIGIN, BRIDGE_WS_ORIGIN};

/// Service id of the background bridge service.
pub(crate) const SERVICE_ID: &str = "tvsling.bridge.service";

const PRIVILEGES: [&str; 3] = ["internet", "filesystem.read", "volume.set"];

pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let path = ctx.workspace().manifest();
    let content = read_text(&path)?;

    let csp = if ctx.settings().diagnostics {
        format!("default-src 'self' 'unsafe-inline' {BRIDGE_ORIGIN} {BRIDGE_WS_ORIGIN}")
    } else {
        format!("default-src 'self' 'unsafe-inline' {BRIDGE_ORIGIN}")
    };
    let csp_element = format!("<content-security-policy>{csp}</content-security-policy>");

    // Idempotence is keyed on the whole payload, not the service id
    // alone: toggling diagnostics between runs must rewrite the CSP.
    if content.contains(SERVICE_ID) && content.contains(&csp_element) {
        debug!("manifest already carries the bridge service and CSP");
        return Ok(());
    }

    let mut patched = content;
    strip_element(&mut patched, "<service", "</service>");
    strip_element(&mut patched, "<privilege", "</privilege>");
    strip_element(
        &mut patched,
        "<content-security-policy",
        "</content-security-policy>",
    );

    let mut block = String::new();
    block.push_str(&format!(
        "  <service id=\"{SERVICE_ID}\" on-boot=\"false\" auto-restart=\"false\">\n\
         \x20   <content src=\"service/bridge.js\"/>\n\
         \x20 </service>\n"
    ));
    for privilege in PRIVILEGES {
        block.push_str(&format!("  <privilege name=\"{privilege}\"/>\n"));
    }
    block.push_str(&format!("  {csp_element}\n"));

    let Some(pos) = patched.find("</widget>") else {
        return Err(PatchError::MissingAsset(path));
    };
    patched.insert_str(pos, &block);

    write_text(&path, &patched)
}

/// Remove `open ... close` element blocks, repeatedly. A self-closing
/// opening tag (`<tag ... />`) is removed on its own.
fn strip_element(content: &mut String, open: &str, close: &str) {
    while let Some(start) = content.find(open) {
        let Some(tag_end_rel) = content[start..].find('>') else {
            break; // unterminated tag; leave as-is rather than corrupt
        };
        let tag_end = start + tag_end_rel;
        let end = if content[..tag_end].ends_with('/') {
            tag_end + 1
        } else {
            let Some(close_rel) = content[start..].find(close) else {
                break; // unbalanced; leave as-is rather than corrupt
            };
            start + close_rel + close.len()
        };
        content.replace_range(start..end, "");
    }
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

    fn make_archive(dir: &Path, manifest: &str) -> PathBuf {
        let path = dir.join("app.wgt");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("config.xml", options).unwrap();
        writer.write_all(manifest.as_bytes()).unwrap();
        writer.start_file("www/index.html", options).unwrap();
        writer
            .write_all(b"<html><head></head><body></body></html>")
            .unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn strip_removes_existing_services() {
        let mut manifest = String::from(
            "<widget>\
             <service id=\"old.service\"><content src=\"x.js\"/></service>\
             <name>App</name></widget>",
        );
        strip_element(&mut manifest, "<service", "</service>");
        assert!(!manifest.contains("old.service"));
        assert!(manifest.contains("<name>App</name>"));
    }

    #[test]
    fn strip_removes_self_closing_elements() {
        let mut manifest = String::from(
            "<widget><content-security-policy default-src=\"none\"/>\
             <name>App</name></widget>",
        );
        strip_element(
            &mut manifest,
            "<content-security-policy",
            "</content-security-policy>",
        );
        assert!(!manifest.contains("content-security-policy"));
        assert!(manifest.contains("<name>App</name>"));
    }

    #[test]
    fn unbalanced_service_left_untouched() {
        let mut manifest = String::from("<widget><service id=\"broken\"></widget>");
        let original = manifest.clone();
        strip_element(&mut manifest, "<service", "</service>");
        assert_eq!(manifest, original);
    }

    #[test]
    fn self_closing_csp_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_archive(
            dir.path(),
            "<widget id=\"app\">\n  <content-security-policy default-src=\"none\"/>\n</widget>",
        );
        let ws = ArchiveWorkspace::extract(&archive).unwrap();
        let settings = PatchSettings::default();
        let url = Url::parse("http://media.local:8096").unwrap();
        let mut ctx = PatchContext::new(&ws, url, &settings);

        apply(&mut ctx).unwrap();
        let manifest = std::fs::read_to_string(ws.manifest()).unwrap();
        assert_eq!(manifest.matches("<content-security-policy").count(), 1);
        assert!(!manifest.contains("default-src=\"none\""));
        assert!(manifest.contains(SERVICE_ID));
    }

    #[test]
    fn enabling_diagnostics_rewrites_the_csp() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_archive(dir.path(), "<widget id=\"app\">\n</widget>");
        let ws = ArchiveWorkspace::extract(&archive).unwrap();
        let url = Url::parse("http://media.local:8096").unwrap();

        let plain = PatchSettings::default();
        let mut ctx = PatchContext::new(&ws, url.clone(), &plain);
        apply(&mut ctx).unwrap();
        let first = std::fs::read_to_string(ws.manifest()).unwrap();
        assert!(!first.contains(BRIDGE_WS_ORIGIN));

        // Re-running with identical settings is byte-identical.
        apply(&mut ctx).unwrap();
        assert_eq!(std::fs::read_to_string(ws.manifest()).unwrap(), first);

        let diagnostics = PatchSettings {
            diagnostics: true,
            ..Default::default()
        };
        let mut ctx = PatchContext::new(&ws, url, &diagnostics);
        apply(&mut ctx).unwrap();
        let second = std::fs::read_to_string(ws.manifest()).unwrap();
        assert!(second.contains(BRIDGE_WS_ORIGIN));
        assert_eq!(second.matches("<content-security-policy").count(), 1);
        assert_eq!(second.matches("<service id=").count(), 1);
    }
}
