// Index rewrite: base-href insertion and root-relative path rewriting,
// plus the plugin-compatibility sub-pipeline.

use super::{PatchContext, read_text, write_text};
use crate::error::PatchError;

/// Mutates `www/index.html` in place, then queues the enabled plugins'
/// compatibility fragments. The file mutation and the fragment queueing
/// belong to different patch units: the rewrite touches the file, the
/// plugin patches only append to the context.
pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let index_path = ctx.workspace().www().join("index.html");
    let content = read_text(&index_path)?;

    let mut patched = content.clone();
    ensure_base_href(&mut patched);
    rewrite_root_relative(&mut patched);

    if patched != content {
        write_text(&index_path, &patched)?;
    }

    for plugin in ctx.settings().plugins.clone() {
        plugin.queue_fragments(ctx);
    }

    Ok(())
}

/// Insert `<base href="./">` right after `<head>` when no base tag exists.
/// The packaged web root is loaded from the filesystem, so absolute
/// navigation breaks without it.
fn ensure_base_href(content: &mut String) {
    if content.contains("<base ") {
        return;
    }
    if let Some(pos) = content.find("<head>") {
        content.insert_str(pos + "<head>".len(), "<base href=\"./\">");
    }
}

/// Rewrite root-relative `src`/`href` attributes to workspace-relative
/// ones. Protocol-relative URLs (`//cdn...`) are left alone.
fn rewrite_root_relative(content: &mut String) {
    for attr in ["src=\"/", "href=\"/"] {
        loop {
            let Some(pos) = find_single_slash(content, attr) else {
                break;
            };
            // Drop the leading slash: `src="/foo"` -> `src="foo"`.
            content.remove(pos + attr.len() - 1);
        }
    }
}

/// Position of the next `attr` occurrence not followed by a second slash.
fn find_single_slash(content: &str, attr: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = content[from..].find(attr) {
        let pos = from + offset;
        let after = pos + attr.len();
        if content.as_bytes().get(after) != Some(&b'/') {
            return Some(pos);
        }
        from = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_href_inserted_once() {
        let mut html = String::from("<html><head><title>x</title></head></html>");
        ensure_base_href(&mut html);
        assert!(html.contains("<head><base href=\"./\">"));

        let first = html.clone();
        ensure_base_href(&mut html);
        assert_eq!(html, first, "second run must be a no-op");
    }

    #[test]
    fn root_relative_paths_become_relative() {
        let mut html =
            String::from(r#"<script src="/main.js"></script><link href="/css/app.css">"#);
        rewrite_root_relative(&mut html);
        assert_eq!(
            html,
            r#"<script src="main.js"></script><link href="css/app.css">"#
        );
    }

    #[test]
    fn protocol_relative_urls_untouched() {
        let mut html = String::from(r#"<script src="//cdn.example.com/lib.js"></script>"#);
        let original = html.clone();
        rewrite_root_relative(&mut html);
        assert_eq!(html, original);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let mut html = String::from(r#"<img src="/a.png"><img src="/b.png">"#);
        rewrite_root_relative(&mut html);
        let first = html.clone();
        rewrite_root_relative(&mut html);
        assert_eq!(html, first);
    }
}
