use tracing::info_span;

use crate::context::TurnContext;

pub fn sign_in_span(connection: &str, ctx: &TurnContext) -> tracing::Span {
    info_span!(
        "auth.sign_in",
        connection,
        user = ctx.from_id().unwrap_or("-"),
        conversation = ctx.conversation_id().unwrap_or("-")
    )
}

pub fn sign_out_span(connection: &str, ctx: &TurnContext) -> tracing::Span {
    info_span!(
        "auth.sign_out",
        connection,
        user = ctx.from_id().unwrap_or("-"),
        conversation = ctx.conversation_id().unwrap_or("-")
    )
}
