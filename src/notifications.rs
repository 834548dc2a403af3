//! Delivery of meal plans to subscribers, including what each delivery
//! outcome does to the subscriber's stored state.

use std::collections::BTreeMap;
use std::time::Duration;

use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardMarkup, MessageId, ParseMode},
    ApiError, RequestError,
};
use tokio::time::sleep;

use crate::constants::{DEVELOPER_CHAT_IDS, MENSEN};
use crate::data_backend::mensa_parser::build_menu_message;
use crate::data_types::{MealFilter, SubscriptionState};
use crate::db_operations::UserStore;
use crate::menu_manager::MenuManager;
use crate::shared_main::make_inline_markup;

/// Transient failures are retried in place this many times, with a fixed
/// delay in between. Exhausting the retries never demotes the subscriber.
const SEND_ATTEMPTS: u32 = 3;
const SEND_RETRY_DELAY: Duration = Duration::from_secs(5);

/// What one send/edit came to, after retries and classification.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Message went out; the handle is stored for later in-place edits.
    Delivered(MessageId),
    /// Telegram refused an edit with identical content; nothing to do.
    Unchanged,
    /// Recipient can never be reached again without new user action.
    PermanentFailure(String),
    /// Still failing after all retries; subscriber state stays untouched.
    TransientFailure(String),
    /// The chat id changed upstream; the stored row has to follow.
    Migrated(ChatId),
}

enum SendErrorClass {
    NotModified,
    Permanent,
    Transient,
    Migrated(ChatId),
}

fn classify_send_error(err: &RequestError) -> SendErrorClass {
    match err {
        RequestError::Api(ApiError::MessageNotModified) => SendErrorClass::NotModified,
        RequestError::MigrateToChatId(new_id) => SendErrorClass::Migrated(ChatId(*new_id)),
        // blocked, kicked, deactivated, chat not found, malformed request:
        // the recipient is gone for good
        RequestError::Api(_) => SendErrorClass::Permanent,
        // network problems, timeouts, rate limits
        _ => SendErrorClass::Transient,
    }
}

/// Sends `text` to the chat, editing `message_id` in place when present.
/// Transient errors are retried here with a bounded loop; everything else is
/// classified and handed back for the caller to apply.
pub async fn deliver_menu_message(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    markup: InlineKeyboardMarkup,
    message_id: Option<i32>,
) -> DeliveryOutcome {
    let mut last_error = String::new();

    for attempt in 1..=SEND_ATTEMPTS {
        let result = match message_id {
            Some(id) => {
                bot.edit_message_text(chat_id, MessageId(id), text)
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(markup.clone())
                    .await
            }
            None => {
                bot.send_message(chat_id, text)
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(markup.clone())
                    .await
            }
        };

        let err = match result {
            Ok(message) => return DeliveryOutcome::Delivered(message.id),
            Err(err) => err,
        };

        match classify_send_error(&err) {
            SendErrorClass::NotModified => return DeliveryOutcome::Unchanged,
            SendErrorClass::Migrated(new_id) => return DeliveryOutcome::Migrated(new_id),
            SendErrorClass::Permanent => return DeliveryOutcome::PermanentFailure(err.to_string()),
            SendErrorClass::Transient => {
                log::warn!(
                    "Zustellung an {} fehlgeschlagen (Versuch {}/{}): {}",
                    chat_id,
                    attempt,
                    SEND_ATTEMPTS,
                    err
                );
                last_error = err.to_string();
                if attempt < SEND_ATTEMPTS {
                    sleep(SEND_RETRY_DELAY).await;
                }
            }
        }
    }

    DeliveryOutcome::TransientFailure(last_error)
}

/// Folds a delivery outcome into the subscriber row. Returns a report for
/// the developer channel when one is warranted.
pub fn apply_delivery_outcome(
    store: &UserStore,
    chat_id: i64,
    outcome: &DeliveryOutcome,
) -> rusqlite::Result<Option<String>> {
    match outcome {
        DeliveryOutcome::Delivered(message_id) => {
            store.set_message_id(chat_id, message_id.0)?;
            Ok(None)
        }
        DeliveryOutcome::Unchanged => Ok(None),
        DeliveryOutcome::PermanentFailure(reason) => {
            store.mark_unreachable(chat_id)?;
            log::error!("Nachricht an #{} dauerhaft unzustellbar: {}", chat_id, reason);
            Ok(Some(format!(
                "Nachricht an #{chat_id} dauerhaft unzustellbar:\n\n{reason}"
            )))
        }
        DeliveryOutcome::TransientFailure(reason) => {
            log::error!(
                "Zustellung an #{} nach {} Versuchen aufgegeben: {}",
                chat_id,
                SEND_ATTEMPTS,
                reason
            );
            Ok(None)
        }
        DeliveryOutcome::Migrated(new_id) => {
            log::info!("Chat {} migriert zu {}", chat_id, new_id.0);
            store.migrate_chat_id(chat_id, new_id.0)?;
            Ok(None)
        }
    }
}

/// Delivery plus bookkeeping: the counterpart of a bare `send_message` for
/// everything that should track the last message handle and react to
/// delivery failures. Never returns an error; failures end up in the log and
/// the developer channel.
pub async fn send_tracked(
    bot: &Bot,
    store: &UserStore,
    chat_id: ChatId,
    text: &str,
    markup: InlineKeyboardMarkup,
    message_id: Option<i32>,
) {
    let outcome = deliver_menu_message(bot, chat_id, text, markup, message_id).await;
    match apply_delivery_outcome(store, chat_id.0, &outcome) {
        Ok(Some(dev_report)) => send_developer_message(bot, &dev_report).await,
        Ok(None) => {}
        Err(e) => log::error!("Status-Update für {} fehlgeschlagen: {}", chat_id, e),
    }
}

/// Error reports and diagnostics go to the configured developer chats. Must
/// never take the caller down.
pub async fn send_developer_message(bot: &Bot, text: &str) {
    for chat_id in DEVELOPER_CHAT_IDS.get().map(Vec::as_slice).unwrap_or_default() {
        if let Err(e) = bot.send_message(ChatId(*chat_id), text).await {
            log::error!("Entwickler-Nachricht an {} fehlgeschlagen: {}", chat_id, e);
        }
    }
}

/// One broadcast pass: fresh plans for every cafeteria, then delivery to all
/// subscribers with auto updates. A single subscriber's failure never aborts
/// the batch.
pub async fn send_notifications(
    bot: &Bot,
    menu_manager: &MenuManager,
    store: &UserStore,
) -> anyhow::Result<()> {
    // clear cache to ensure latest results
    menu_manager.clear_cache().await;

    let mut plans: BTreeMap<u32, String> = BTreeMap::new();
    for (&mensa_id, name) in MENSEN.iter() {
        log::debug!("Hole Plan für {} (#{})", name, mensa_id);
        match menu_manager.get_menu(mensa_id).await {
            Ok(menu) => {
                plans.insert(mensa_id, build_menu_message(&menu, MealFilter::All));
            }
            // upstream outage for one cafeteria, its subscribers are skipped
            // this cycle
            Err(e) => log::error!("Plan für {} (#{}) nicht abrufbar: {}", name, mensa_id, e),
        }
    }

    let markup = make_inline_markup(0, true, false);

    for subscriber in store.notification_subscribers()? {
        let SubscriptionState::Subscribed(mensa_id) = subscriber.notifications else {
            continue;
        };
        let Some(text) = plans.get(&mensa_id) else {
            log::warn!(
                "Kein Plan für Mensa {}, #{} wird übersprungen",
                mensa_id,
                subscriber.chat_id
            );
            continue;
        };

        store.bump_counter(subscriber.chat_id)?;

        log::debug!("Sende Plan an #{}", subscriber.chat_id);
        send_tracked(
            bot,
            store,
            ChatId(subscriber.chat_id),
            text,
            markup.clone(),
            subscriber.message_id,
        )
        .await;
    }

    Ok(())
}
