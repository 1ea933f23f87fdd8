// Diagnostic logging injection.
//
// Mirrors console output and uncaught errors to the local diagnostic
// bridge over WebSocket. The CSP grant for the WebSocket origin is the
// manifest step's responsibility -- this step only queues the script.

use super::PatchContext;
use crate::BRIDGE_WS_ORIGIN;
use crate::error::PatchError;

pub(crate) const DIAGNOSTICS_MARKER: &str = "tvsling-diagnostics";

pub(super) fn apply(ctx: &mut PatchContext<'_>) -> Result<(), PatchError> {
    ctx.queue_head(
        DIAGNOSTICS_MARKER,
        format!(
            "<script data-patch=\"{DIAGNOSTICS_MARKER}\">{}</script>",
            mirror_source()
        ),
    );
    Ok(())
}

fn mirror_source() -> String {
    format!(
        "(function(){{\
         var ws;try{{ws=new WebSocket('{BRIDGE_WS_ORIGIN}/log');}}catch(e){{return;}}\
         function send(level,args){{\
         if(ws.readyState===1){{ws.send(JSON.stringify({{level:level,message:Array.prototype.slice.call(args).join(' ')}}));}}\
         }}\
         ['log','warn','error'].forEach(function(level){{\
         var original=console[level];\
         console[level]=function(){{send(level,arguments);original.apply(console,arguments);}};\
         }});\
         window.addEventListener('error',function(e){{send('uncaught',[e.message,e.filename,e.lineno]);}});\
         }})();"
    )
}
