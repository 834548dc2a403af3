//! Subscriber persistence. One row per chat, created lazily on first contact
//! and never deleted; delivery failures only demote the notification state.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::data_types::SubscriptionState;

/// Profile fields mirrored into the row on every interaction.
#[derive(Debug, Clone, Default)]
pub struct ChatProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub chat_id: i64,
    pub notifications: SubscriptionState,
    pub current_selection: u32,
    pub counter: i64,
    pub message_id: Option<i32>,
}

/// Handle to the user table, threaded through the handlers. Opens a
/// connection per operation, which keeps it `Clone` and cheap to share.
#[derive(Clone)]
pub struct UserStore {
    db_path: PathBuf,
}

impl UserStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        UserStore {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn conn(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.db_path)
    }

    pub fn check_or_create_tables(&self) -> rusqlite::Result<()> {
        self.conn()?
            .prepare(
                "create table if not exists users (
                chat_id integer not null unique primary key,
                first_name text,
                last_name text,
                username text,
                title text,
                notifications integer not null,
                current_selection integer not null,
                counter integer not null,
                message_id integer
                )",
            )?
            .execute([])?;

        Ok(())
    }

    /// Called on every interaction: creates the row with defaults if the
    /// chat is new, otherwise bumps the counter, refreshes the profile and
    /// records a new cafeteria selection if one was made. Returns the
    /// notification state and selection after the update.
    pub fn touch_user(
        &self,
        chat_id: i64,
        profile: &ChatProfile,
        selection: Option<u32>,
    ) -> rusqlite::Result<(SubscriptionState, u32)> {
        let conn = self.conn()?;

        let existing: Option<(i64, u32)> = conn
            .prepare_cached("SELECT notifications, current_selection FROM users WHERE chat_id = ?1")?
            .query_row(params![chat_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        match existing {
            None => {
                conn.prepare_cached(
                    "insert into users
                    (chat_id, first_name, last_name, username, title,
                     notifications, current_selection, counter)
                    values (?1, ?2, ?3, ?4, ?5, 0, 0, 0)",
                )?
                .execute(params![
                    chat_id,
                    profile.first_name,
                    profile.last_name,
                    profile.username,
                    profile.title,
                ])?;

                Ok((SubscriptionState::None, 0))
            }
            Some((notifications, previous_selection)) => {
                let selection = selection.unwrap_or(previous_selection);

                conn.prepare_cached(
                    "UPDATE users
                    SET first_name = ?2, last_name = ?3, username = ?4, title = ?5,
                        current_selection = ?6, counter = counter + 1
                    WHERE chat_id = ?1",
                )?
                .execute(params![
                    chat_id,
                    profile.first_name,
                    profile.last_name,
                    profile.username,
                    profile.title,
                    selection,
                ])?;

                Ok((SubscriptionState::from_db(notifications), selection))
            }
        }
    }

    /// Subscribes the chat to its currently selected cafeteria. Fails softly
    /// (returns `None`) when no cafeteria is selected.
    pub fn enable_notifications(&self, chat_id: i64) -> rusqlite::Result<Option<u32>> {
        let conn = self.conn()?;

        let selection: Option<u32> = conn
            .prepare_cached("SELECT current_selection FROM users WHERE chat_id = ?1")?
            .query_row(params![chat_id], |row| row.get(0))
            .optional()?;

        match selection {
            Some(selection) if selection != 0 => {
                conn.prepare_cached("UPDATE users SET notifications = ?2 WHERE chat_id = ?1")?
                    .execute(params![chat_id, selection])?;
                Ok(Some(selection))
            }
            _ => Ok(None),
        }
    }

    /// Idempotent; also the way a user leaves the failed state behind.
    pub fn disable_notifications(&self, chat_id: i64) -> rusqlite::Result<()> {
        self.conn()?
            .prepare_cached("UPDATE users SET notifications = 0 WHERE chat_id = ?1")?
            .execute(params![chat_id])?;
        Ok(())
    }

    /// Permanent delivery failure. Terminal until the chat interacts and
    /// subscribes again.
    pub fn mark_unreachable(&self, chat_id: i64) -> rusqlite::Result<()> {
        self.conn()?
            .prepare_cached("UPDATE users SET notifications = -1 WHERE chat_id = ?1")?
            .execute(params![chat_id])?;
        Ok(())
    }

    /// Remembers the handle of the last sent message so the next delivery
    /// can edit in place.
    pub fn set_message_id(&self, chat_id: i64, message_id: i32) -> rusqlite::Result<()> {
        self.conn()?
            .prepare_cached("UPDATE users SET message_id = ?2 WHERE chat_id = ?1")?
            .execute(params![chat_id, message_id])?;
        Ok(())
    }

    /// Telegram moved the chat to a new id; all other state carries over.
    pub fn migrate_chat_id(&self, old_chat_id: i64, new_chat_id: i64) -> rusqlite::Result<()> {
        self.conn()?
            .prepare_cached("UPDATE users SET chat_id = ?2 WHERE chat_id = ?1")?
            .execute(params![old_chat_id, new_chat_id])?;
        Ok(())
    }

    pub fn bump_counter(&self, chat_id: i64) -> rusqlite::Result<()> {
        self.conn()?
            .prepare_cached("UPDATE users SET counter = counter + 1 WHERE chat_id = ?1")?
            .execute(params![chat_id])?;
        Ok(())
    }

    pub fn get_subscriber(&self, chat_id: i64) -> rusqlite::Result<Option<Subscriber>> {
        self.conn()?
            .prepare_cached(
                "SELECT chat_id, notifications, current_selection, counter, message_id
                FROM users WHERE chat_id = ?1",
            )?
            .query_row(params![chat_id], row_to_subscriber)
            .optional()
    }

    /// Everyone with auto updates enabled, i.e. `notifications > 0`. Failed
    /// and unsubscribed chats never show up here.
    pub fn notification_subscribers(&self) -> rusqlite::Result<Vec<Subscriber>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT chat_id, notifications, current_selection, counter, message_id
            FROM users WHERE notifications > 0",
        )?;

        let subscribers = stmt
            .query_map([], row_to_subscriber)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(subscribers)
    }
}

fn row_to_subscriber(row: &rusqlite::Row) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        chat_id: row.get(0)?,
        notifications: SubscriptionState::from_db(row.get(1)?),
        current_selection: row.get(2)?,
        counter: row.get(3)?,
        message_id: row.get(4)?,
    })
}
