use serde::{Deserialize, Serialize};

/// 呼び出し側が所有する会話履歴。古いものから順に並ぶ。
pub type ConversationHistory = Vec<ConversationTurn>;

/// 発話者の role。
///
/// `user` と `assistant` 以外の値も受け付け、そのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Role {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(value: Role) -> String {
        match value {
            Role::User => "user".to_string(),
            Role::Assistant => "assistant".to_string(),
            Role::Other(role) => role,
        }
    }
}

/// 会話中の単一の発話。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> ConversationTurn {
        ConversationTurn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> ConversationTurn {
        ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// `history` を複製して末尾に `turn` を追加する。元の `history` は変更しない。
pub fn append_turn(history: &[ConversationTurn], turn: ConversationTurn) -> ConversationHistory {
    let mut appended = Vec::with_capacity(history.len() + 1);
    appended.extend_from_slice(history);
    appended.push(turn);
    appended
}
