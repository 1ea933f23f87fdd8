// Custom styling injection: a literal style block before `</head>`.

use tracing::debug;

use super::PatchContext;
use crate::error::PatchError;

pub(crate) const STYLE_MARKER: &str = "tvsling-custom-style";

pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    let Some(css) = ctx.settings().custom_css.clone() else {
        debug!("no custom CSS configured, skipping");
        return Ok(());
    };

    ctx.queue_head(
        STYLE_MARKER,
        format!("<style data-patch=\"{STYLE_MARKER}\">{css}</style>"),
    );
    Ok(())
}
