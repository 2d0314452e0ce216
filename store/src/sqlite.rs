use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

use parley_types::{
    Chat, ChatField, ChatId, ChatOverrides, Message, MessageId, NewChat, NewMessage, NewPrompt,
    Prompt, PromptId, Sender,
};

use crate::sqlite_util::{from_millis, open_secure_db, to_millis};
use crate::{ChatStore, StoreError};

const CHAT_COLUMNS: &str = "id, name, timestamp, messages_limit, tokens_limit, temperature, model";
const MESSAGE_COLUMNS: &str = "id, chat_id, text, sender, timestamp, in_prompts, fixed_in_prompt";
const PROMPT_COLUMNS: &str = "id, name, declare, prompt";

/// SQLite-backed [`ChatStore`].
#[derive(Debug)]
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS chats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            messages_limit INTEGER,
            tokens_limit INTEGER,
            temperature REAL,
            model TEXT
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL REFERENCES chats(id),
            text TEXT NOT NULL,
            sender TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            in_prompts INTEGER NOT NULL DEFAULT 1,
            fixed_in_prompt INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, id);

        CREATE TABLE IF NOT EXISTS prompts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            declare TEXT NOT NULL DEFAULT '',
            prompt TEXT NOT NULL
        );
    ";

    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = open_secure_db(path.as_ref())?;
        Self::initialize(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db })
    }

    fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
        let messages_limit: Option<i64> = row.get(3)?;
        let tokens_limit: Option<i64> = row.get(4)?;
        let temperature: Option<f64> = row.get(5)?;
        Ok(Chat {
            id: ChatId::new(row.get(0)?),
            name: row.get(1)?,
            timestamp: from_millis(row.get(2)?),
            overrides: ChatOverrides {
                messages_limit: messages_limit.map(clamp_limit),
                tokens_limit: tokens_limit.map(clamp_limit),
                temperature: temperature.map(|t| t as f32),
                model: row.get(6)?,
            },
        })
    }

    fn message_from_row(row: &Row<'_>) -> rusqlite::Result<(Message, String)> {
        let sender: String = row.get(3)?;
        let message = Message {
            id: MessageId::new(row.get(0)?),
            chat_id: ChatId::new(row.get(1)?),
            text: row.get(2)?,
            sender: Sender::User,
            timestamp: from_millis(row.get(4)?),
            in_prompts: row.get(5)?,
            fixed_in_prompt: row.get(6)?,
        };
        Ok((message, sender))
    }

    fn finish_message((mut message, sender): (Message, String)) -> Result<Message, StoreError> {
        message.sender = Sender::parse(&sender).ok_or_else(|| {
            StoreError::Corrupt(format!("message {} has unknown sender {sender:?}", message.id))
        })?;
        Ok(message)
    }

    fn prompt_from_row(row: &Row<'_>) -> rusqlite::Result<Prompt> {
        Ok(Prompt {
            id: PromptId::new(row.get(0)?),
            name: row.get(1)?,
            declare: row.get(2)?,
            prompt: row.get(3)?,
        })
    }

    fn get_message(&self, id: MessageId) -> Result<Message, StoreError> {
        let row = self
            .db
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.value()],
                Self::message_from_row,
            )
            .optional()?
            .ok_or(StoreError::MessageNotFound(id))?;
        Self::finish_message(row)
    }
}

fn clamp_limit(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

fn field_value(field: &ChatField) -> Value {
    match field {
        ChatField::Name(name) => Value::Text(name.clone()),
        ChatField::MessagesLimit(limit) | ChatField::TokensLimit(limit) => {
            Value::Integer(i64::from(*limit))
        }
        ChatField::Temperature(value) => Value::Real(f64::from(*value)),
        ChatField::Model(model) => Value::Text(model.clone()),
    }
}

impl ChatStore for SqliteStore {
    fn create_chat(&mut self, chat: NewChat) -> Result<ChatId, StoreError> {
        self.db.execute(
            "INSERT INTO chats (name, timestamp) VALUES (?1, ?2)",
            params![chat.name, to_millis(chat.timestamp)],
        )?;
        let id = ChatId::new(self.db.last_insert_rowid());
        tracing::debug!(chat_id = %id, "Chat row created");
        Ok(id)
    }

    fn get_chat_by_id(&self, id: ChatId) -> Result<Chat, StoreError> {
        self.db
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id.value()],
                Self::chat_from_row,
            )
            .optional()?
            .ok_or(StoreError::ChatNotFound(id))
    }

    fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY timestamp DESC, id DESC"
        ))?;
        let chats = stmt
            .query_map([], Self::chat_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chats)
    }

    fn update_chat_field_by_id(
        &mut self,
        id: ChatId,
        field: ChatField,
    ) -> Result<Chat, StoreError> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE chats SET {} = ?1 WHERE id = ?2", field.column());
        let changed = self
            .db
            .execute(&sql, params![field_value(&field), id.value()])?;
        if changed == 0 {
            return Err(StoreError::ChatNotFound(id));
        }
        self.get_chat_by_id(id)
    }

    fn create_message(&mut self, message: NewMessage) -> Result<Message, StoreError> {
        self.db.execute(
            "INSERT INTO messages (chat_id, text, sender, timestamp, in_prompts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.chat_id.value(),
                message.text.as_str(),
                message.sender.as_str(),
                to_millis(message.timestamp),
                message.in_prompts,
            ],
        )?;
        let id = MessageId::new(self.db.last_insert_rowid());
        Ok(message.persisted(id))
    }

    fn get_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![chat_id.value()], Self::message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::finish_message).collect()
    }

    fn update_message_flags(
        &mut self,
        id: MessageId,
        in_prompts: bool,
        fixed_in_prompt: bool,
    ) -> Result<Message, StoreError> {
        let changed = self.db.execute(
            "UPDATE messages SET in_prompts = ?1, fixed_in_prompt = ?2 WHERE id = ?3",
            params![in_prompts, fixed_in_prompt, id.value()],
        )?;
        if changed == 0 {
            return Err(StoreError::MessageNotFound(id));
        }
        self.get_message(id)
    }

    fn create_prompt(&mut self, prompt: NewPrompt) -> Result<Prompt, StoreError> {
        self.db.execute(
            "INSERT INTO prompts (name, declare, prompt) VALUES (?1, ?2, ?3)",
            params![prompt.name, prompt.declare, prompt.prompt],
        )?;
        let id = PromptId::new(self.db.last_insert_rowid());
        Ok(prompt.persisted(id))
    }

    fn get_all_prompts(&self) -> Result<Vec<Prompt>, StoreError> {
        let mut stmt = self
            .db
            .prepare(&format!("SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY id"))?;
        let prompts = stmt
            .query_map([], Self::prompt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(prompts)
    }

    fn get_prompt_by_id(&self, id: PromptId) -> Result<Prompt, StoreError> {
        self.db
            .query_row(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                params![id.value()],
                Self::prompt_from_row,
            )
            .optional()?
            .ok_or(StoreError::PromptNotFound(id))
    }
}
