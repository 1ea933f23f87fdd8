// Plugin-compatibility patches.
//
// A closed set of known third-party client plugins that need extra
// script/style glue on this platform. Each entry queues fragments on the
// context; none of them touch files directly.

use std::str::FromStr;

use super::PatchContext;

/// Known third-party plugins with dedicated compatibility patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginPatch {
    /// Skip-intro buttons need a focusable overlay for remote navigation.
    SkipIntro,
    /// Media-bar backdrops assume a pointer; throttle them on TV hardware.
    MediaBar,
    /// Custom-menu entries render off-screen without viewport pinning.
    CustomMenu,
}

impl PluginPatch {
    /// All plugins with a compatibility patch, in application order.
    pub const ALL: [Self; 3] = [Self::SkipIntro, Self::MediaBar, Self::CustomMenu];

    /// Stable name used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::SkipIntro => "skip-intro",
            Self::MediaBar => "media-bar",
            Self::CustomMenu => "custom-menu",
        }
    }

    /// Stable marker embedded in the fragment so re-insertion is detectable.
    pub(crate) fn marker(self) -> &'static str {
        match self {
            Self::SkipIntro => "tvsling-plugin-skip-intro",
            Self::MediaBar => "tvsling-plugin-media-bar",
            Self::CustomMenu => "tvsling-plugin-custom-menu",
        }
    }

    pub(crate) fn queue_fragments(self, ctx: &mut PatchContext<'_>) {
        let marker = self.marker();
        match self {
            Self::SkipIntro => {
                ctx.queue_head(
                    marker,
                    format!(
                        "<script data-patch=\"{marker}\">\
                         document.addEventListener('viewshow',function(){{\
                         var b=document.querySelector('.skipIntro');\
                         if(b){{b.tabIndex=0;b.classList.add('focusable');}}\
                         }});</script>"
                    ),
                );
            }
            Self::MediaBar => {
                ctx.queue_head(
                    marker,
                    format!(
                        "<style data-patch=\"{marker}\">\
                         .mediaBarBackdrop{{transition:none !important;}}\
                         </style>"
                    ),
                );
            }
            Self::CustomMenu => {
                ctx.queue_head(
                    marker,
                    format!(
                        "<style data-patch=\"{marker}\">\
                         .customMenu{{max-height:100vh;overflow-y:auto;}}\
                         </style>"
                    ),
                );
            }
        }
    }
}

impl FromStr for PluginPatch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plugin| plugin.name() == value)
            .ok_or_else(|| {
                let known = Self::ALL.map(Self::name).join(", ");
                format!("unknown plugin '{value}' (known: {known})")
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn names_round_trip() {
        for plugin in PluginPatch::ALL {
            assert_eq!(plugin.name().parse::<PluginPatch>().unwrap(), plugin);
        }
    }

    #[test]
    fn unknown_name_lists_known_plugins() {
        let err = "nope".parse::<PluginPatch>().unwrap_err();
        assert!(err.contains("skip-intro"));
    }
}
