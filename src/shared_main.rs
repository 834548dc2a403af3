//! Keyboard building, the inline-callback dispatch and the setup helpers
//! shared by both run modes.

use std::env;

use regex_lite::Regex;
use static_init::dynamic;
use teloxide::{
    prelude::*,
    types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message},
};

use crate::constants::{
    FETCH_FAILED_MSG, MENSEN, NAV_PAGES, NAV_PAGE_TITLES, NO_SELECTION_MSG, UNKNOWN_CMD_MSG,
};
use crate::data_backend::{escape_markdown_v2, mensa_parser::build_menu_message};
use crate::data_types::{HandlerResult, MealFilter, SubscriptionState};
use crate::db_operations::{ChatProfile, UserStore};
use crate::errors::TimeParseError;
use crate::menu_manager::MenuManager;
use crate::notifications::{send_developer_message, send_tracked};

pub fn logger_init(module_path: &str) {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .filter_module(
            module_path,
            if env::var(pretty_env_logger::env_logger::DEFAULT_FILTER_ENV).unwrap_or_default()
                == "debug"
            {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            },
        )
        .init();
}

/// `HH:MM`, as the broadcast-time argument.
pub fn parse_broadcast_time(txt: &str) -> Result<(u32, u32), TimeParseError> {
    #[dynamic]
    static RE: Regex = Regex::new("^([01]?[0-9]|2[0-3]):([0-5][0-9])$").unwrap();

    let txt = txt.trim();
    if txt.is_empty() {
        return Err(TimeParseError::NoTimePassed);
    }

    let caps = RE.captures(txt).ok_or(TimeParseError::InvalidTimePassed)?;
    let hour = caps.get(1).unwrap().as_str().parse::<u32>().unwrap();
    let minute = caps.get(2).unwrap().as_str().parse::<u32>().unwrap();

    Ok((hour, minute))
}

/// Page the cafeteria's button lives on, so the keyboard stays where the
/// user navigated to.
pub fn get_page_by_id(mensa_id: u32) -> usize {
    NAV_PAGES
        .iter()
        .position(|page| page.iter().any(|row| row.contains(&mensa_id)))
        .unwrap_or(0)
}

/// The enable button is offered unless the chat is already subscribed to the
/// cafeteria it currently has selected.
pub fn show_enable_button(state: SubscriptionState, selection: u32) -> bool {
    match state {
        SubscriptionState::Subscribed(id) => id != selection,
        _ => true,
    }
}

/// One page of cafeteria buttons, optionally with the auto-update toggle on
/// top, and the `<<`/`>>` paging row at the bottom.
pub fn make_inline_markup(page: usize, show_noti_btn: bool, enable: bool) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    if show_noti_btn {
        rows.push(vec![if enable {
            InlineKeyboardButton::callback("Auto-Update aktivieren", "5$1")
        } else {
            InlineKeyboardButton::callback("Auto-Update deaktivieren", "5$0")
        }]);
    }

    for row in NAV_PAGES[page] {
        rows.push(
            row.iter()
                .map(|mensa_id| {
                    let name = MENSEN.get(mensa_id).copied().unwrap_or("???");
                    InlineKeyboardButton::callback(name, format!("{}${}", mensa_id, name))
                })
                .collect(),
        );
    }

    let prev_page = (page + NAV_PAGES.len() - 1) % NAV_PAGES.len();
    let next_page = (page + 1) % NAV_PAGES.len();
    rows.push(vec![
        InlineKeyboardButton::callback("<<", format!("page${}", prev_page)),
        InlineKeyboardButton::callback(">>", format!("page${}", next_page)),
    ]);

    InlineKeyboardMarkup::new(rows)
}

pub fn profile_from_chat(chat: &Chat) -> ChatProfile {
    ChatProfile {
        first_name: chat.first_name().map(str::to_owned),
        last_name: chat.last_name().map(str::to_owned),
        username: chat.username().map(str::to_owned),
        title: chat.title().map(str::to_owned),
    }
}

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    menu_manager: MenuManager,
    store: UserStore,
) -> HandlerResult {
    let Some(q_data) = q.data else {
        return Ok(());
    };

    // acknowledge callback query to remove the loading alert
    bot.answer_callback_query(q.id).await?;

    let Some(Message { id, chat, .. }) = q.message else {
        return Ok(());
    };
    let profile = profile_from_chat(&chat);

    let (cmd, arg) = q_data.split_once('$').unwrap_or((q_data.as_str(), ""));

    if cmd == "page" {
        let page = arg.parse::<usize>().unwrap_or(0) % NAV_PAGES.len();
        let (state, selection) = store.touch_user(chat.id.0, &profile, None)?;

        let mut msg = format!("Seite {} / {}\n", page + 1, NAV_PAGES.len());
        for (i, title) in NAV_PAGE_TITLES.iter().enumerate() {
            let icon = if i == page { "▪️" } else { "▫" };
            msg += &format!("\n{} {}", icon, title);
        }

        let markup = make_inline_markup(page, true, show_enable_button(state, selection));
        send_tracked(
            &bot,
            &store,
            chat.id,
            &escape_markdown_v2(&msg),
            markup,
            Some(id.0),
        )
        .await;
    } else if let Ok(num) = cmd.parse::<u32>() {
        if num > 400 {
            // a cafeteria was picked: remember the selection, show its plan
            let mensa_id = num;
            let (state, selection) = store.touch_user(chat.id.0, &profile, Some(mensa_id))?;

            let text = match menu_manager.get_menu(mensa_id).await {
                Ok(menu) => build_menu_message(&menu, MealFilter::All),
                Err(e) => {
                    log::error!("Speiseplan für Mensa {} nicht abrufbar: {}", mensa_id, e);
                    escape_markdown_v2(FETCH_FAILED_MSG)
                }
            };

            let markup = make_inline_markup(
                get_page_by_id(mensa_id),
                true,
                show_enable_button(state, selection),
            );
            send_tracked(&bot, &store, chat.id, &text, markup, Some(id.0)).await;
        } else if num == 5 && !arg.is_empty() {
            let (_, selection) = store.touch_user(chat.id.0, &profile, None)?;

            if arg == "1" {
                match store.enable_notifications(chat.id.0)? {
                    Some(mensa_id) => {
                        let msg = format!(
                            "Auto-Update aktiviert für {}",
                            MENSEN.get(&mensa_id).copied().unwrap_or("???")
                        );
                        let markup = make_inline_markup(get_page_by_id(mensa_id), true, false);
                        send_tracked(
                            &bot,
                            &store,
                            chat.id,
                            &escape_markdown_v2(&msg),
                            markup,
                            Some(id.0),
                        )
                        .await;
                    }
                    None => {
                        let markup = make_inline_markup(0, true, true);
                        send_tracked(
                            &bot,
                            &store,
                            chat.id,
                            &escape_markdown_v2(NO_SELECTION_MSG),
                            markup,
                            Some(id.0),
                        )
                        .await;
                    }
                }
            } else {
                store.disable_notifications(chat.id.0)?;
                let markup = make_inline_markup(get_page_by_id(selection), true, true);
                send_tracked(
                    &bot,
                    &store,
                    chat.id,
                    &escape_markdown_v2("Auto-Update deaktiviert"),
                    markup,
                    Some(id.0),
                )
                .await;
            }
        } else {
            unknown_inline_command(&bot, &store, chat.id, &q_data).await;
        }
    } else {
        unknown_inline_command(&bot, &store, chat.id, &q_data).await;
    }

    Ok(())
}

async fn unknown_inline_command(bot: &Bot, store: &UserStore, chat_id: ChatId, payload: &str) {
    log::error!("Inlinekommando nicht erkannt: {}", payload);

    let markup = make_inline_markup(0, false, true);
    send_tracked(
        bot,
        store,
        chat_id,
        &escape_markdown_v2(UNKNOWN_CMD_MSG),
        markup,
        None,
    )
    .await;

    send_developer_message(
        bot,
        &format!(
            "Inlinekommando nicht erkannt.\n\nData: {}\nChat: {}",
            payload, chat_id
        ),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            _ => panic!("not a callback button"),
        }
    }

    #[test]
    fn broadcast_time_parsing() {
        assert_eq!(parse_broadcast_time("16:00").unwrap(), (16, 0));
        assert_eq!(parse_broadcast_time("7:30").unwrap(), (7, 30));
        assert!(matches!(
            parse_broadcast_time("24:00"),
            Err(TimeParseError::InvalidTimePassed)
        ));
        assert!(matches!(
            parse_broadcast_time("nachmittags"),
            Err(TimeParseError::InvalidTimePassed)
        ));
        assert!(matches!(
            parse_broadcast_time("  "),
            Err(TimeParseError::NoTimePassed)
        ));
    }

    #[test]
    fn every_cafeteria_is_on_exactly_one_page() {
        for &mensa_id in MENSEN.keys() {
            let page = get_page_by_id(mensa_id);
            assert!(NAV_PAGES[page]
                .iter()
                .any(|row| row.contains(&mensa_id)));
        }
        assert_eq!(get_page_by_id(421), 0);
        assert_eq!(get_page_by_id(455), 1);
        assert_eq!(get_page_by_id(532), 2);
        // unknown ids fall back to the first page
        assert_eq!(get_page_by_id(9), 0);
    }

    #[test]
    fn enable_button_depends_on_subscription_and_selection() {
        assert!(show_enable_button(SubscriptionState::None, 421));
        assert!(show_enable_button(SubscriptionState::Failed, 421));
        assert!(show_enable_button(SubscriptionState::Subscribed(421), 411));
        assert!(!show_enable_button(SubscriptionState::Subscribed(421), 421));
    }

    #[test]
    fn keyboard_carries_toggle_rows_and_paging() {
        let markup = make_inline_markup(0, true, true);
        let rows = &markup.inline_keyboard;

        // toggle + three cafeteria rows + paging
        assert_eq!(rows.len(), 5);
        assert_eq!(callback_data(&rows[0][0]), "5$1");
        assert_eq!(callback_data(&rows[1][0]), "421$Mensa Arcisstr.");
        assert_eq!(rows[1][0].text, "Mensa Arcisstr.");

        let paging = rows.last().unwrap();
        assert_eq!(callback_data(&paging[0]), "page$2");
        assert_eq!(callback_data(&paging[1]), "page$1");
    }

    #[test]
    fn keyboard_without_toggle_row() {
        let markup = make_inline_markup(2, false, false);
        let rows = &markup.inline_keyboard;

        assert_eq!(rows.len(), 4);
        assert_eq!(callback_data(&rows[0][0]), "512$StuCafé Adalbertstr.");
    }
}
