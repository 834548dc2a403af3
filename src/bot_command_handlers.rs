use teloxide::prelude::*;

use crate::constants::{ABOUT_MSG, START_MSG};
use crate::data_backend::escape_markdown_v2;
use crate::data_types::HandlerResult;
use crate::db_operations::UserStore;
use crate::notifications::send_tracked;
use crate::shared_main::{make_inline_markup, profile_from_chat};

pub async fn start(bot: Bot, msg: Message, store: UserStore) -> HandlerResult {
    store.touch_user(msg.chat.id.0, &profile_from_chat(&msg.chat), None)?;

    send_tracked(
        &bot,
        &store,
        msg.chat.id,
        &escape_markdown_v2(START_MSG),
        make_inline_markup(0, false, true),
        None,
    )
    .await;
    Ok(())
}

pub async fn about(bot: Bot, msg: Message, store: UserStore) -> HandlerResult {
    store.touch_user(msg.chat.id.0, &profile_from_chat(&msg.chat), None)?;

    send_tracked(
        &bot,
        &store,
        msg.chat.id,
        &escape_markdown_v2(ABOUT_MSG),
        make_inline_markup(0, false, true),
        None,
    )
    .await;
    Ok(())
}

/// Anything that is not a known command gets the /start treatment.
pub async fn fallback(bot: Bot, msg: Message, store: UserStore) -> HandlerResult {
    start(bot, msg, store).await
}
