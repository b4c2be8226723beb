use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the chat-platform collaborator.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message send to channel {channel_id} failed: {reason}")]
    Send { channel_id: u64, reason: String },

    #[error("Message edit {message_id} in channel {channel_id} failed: {reason}")]
    Edit {
        channel_id: u64,
        message_id: u64,
        reason: String,
    },

    #[error("Message delete {message_id} in channel {channel_id} failed: {reason}")]
    Delete {
        channel_id: u64,
        message_id: u64,
        reason: String,
    },

    #[error("Direct message to user {user_id} failed: {reason}")]
    DirectMessage { user_id: u64, reason: String },

    #[error("No log channel configured for guild {guild_id}")]
    NoLogChannel { guild_id: u64 },
}

/// Interface to the external chat platform.
///
/// The scheduling core never talks to the platform directly — task handlers
/// invoke these methods with ids carried in their payloads, and the host bot
/// process supplies the real implementation. Implementations must be
/// `Send + Sync` so a single client can be shared across handlers via `Arc`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a message to a channel. Returns the id of the created message.
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<u64, ChatError>;

    /// Replace the content of an existing message.
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        text: &str,
    ) -> Result<(), ChatError>;

    /// Delete a message.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), ChatError>;

    /// Send a direct message to a user.
    async fn send_dm(&self, user_id: u64, text: &str) -> Result<(), ChatError>;

    /// Post to the guild's operational log channel.
    ///
    /// Which channel that is (and whether one is configured at all) is the
    /// platform side's business; callers only name the guild.
    async fn send_guild_log(&self, guild_id: u64, text: &str) -> Result<(), ChatError>;
}
