// Auto-login credential injection.
//
// Seeds the client's local storage with a credentials record so the app
// opens signed in. Requires a stored access token and user id; the
// authoritative server id comes from the server's public-info endpoint
// (fetched once per pipeline run, cached on the context). Any missing
// field means a silent skip -- a package without auto-login is still a
// valid package.

use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::debug;

use super::PatchContext;
use crate::error::PatchError;

pub(crate) const AUTOLOGIN_MARKER: &str = "tvsling-autologin";

pub(super) async fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let (Some(user_id), Some(token)) = (ctx.user_id.clone(), ctx.access_token.clone()) else {
        debug!("no stored credentials, skipping auto-login injection");
        return Ok(());
    };

    let Some(server_id) = ctx.resolve_server_id().await else {
        debug!("server id unavailable, skipping auto-login injection");
        return Ok(());
    };

    let server = ctx.server_url.as_str().trim_end_matches('/');
    let record = json!({
        "Servers": [{
            "ManualAddress": server,
            "LocalAddress": server,
            "Id": server_id,
            "UserId": user_id,
            "AccessToken": token.expose_secret(),
            "DateLastAccessed": Utc::now().timestamp_millis(),
        }]
    });

    ctx.queue_head(
        AUTOLOGIN_MARKER,
        format!(
            "<script data-patch=\"{AUTOLOGIN_MARKER}\">\
             try{{localStorage.setItem('servercredentials',JSON.stringify({record}));}}\
             catch(e){{}}</script>"
        ),
    );
    Ok(())
}
