//! Wire protocol vocabulary
//!
//! Newline-terminated text lines over TCP. The first client line is a
//! login request, the first server block is a [`Reply`]; after that every
//! line is a chat line or a server notice.

use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;

/// Prefix field of the login line
const LOGIN_TAG: &str = "LOGIN";

/// Longest username the client will put on the wire
pub const MAX_USERNAME_LEN: usize = 15;

/// Sent once to every remaining connection when the server stops
pub const SHUTDOWN_NOTICE: &str = "Server is shutting down";

/// Client → Server login request: `LOGIN:<username>:<password>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    /// Build a request on the client side, applying the login screen rules.
    ///
    /// The username is trimmed and must be 1 to 15 characters without a
    /// colon. The password is trimmed and must be non-empty; a colon in it
    /// would break the three-field grammar so it is refused too.
    pub fn new(username: &str, password: &str) -> Result<Self, ChatError> {
        let username = username.trim();
        if username.is_empty()
            || username.chars().count() > MAX_USERNAME_LEN
            || username.contains(':')
        {
            return Err(ChatError::InvalidUsername);
        }

        let password = password.trim();
        if password.is_empty() || password.contains(':') {
            return Err(ChatError::InvalidPassword);
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Server-side parse: exactly three colon-separated fields, the first
/// being `LOGIN`. Trailing empty fields are discarded before counting, so
/// `LOGIN:bob:` is two fields and `LOGIN:a:b:` is three. Field contents are
/// not otherwise checked.
impl FromStr for LoginRequest {
    type Err = ChatError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim_end_matches(':').split(':');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(LOGIN_TAG), Some(username), Some(password), None) => Ok(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(ChatError::LoginRejected),
        }
    }
}

impl fmt::Display for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", LOGIN_TAG, self.username, self.password)
    }
}

/// Server → Client handshake replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    LoginSuccess,
    LoginFailed,
    /// Connection refused before login because the server is full
    ServerFull,
}

impl Reply {
    pub fn as_str(self) -> &'static str {
        match self {
            Reply::LoginSuccess => "LOGIN_SUCCESS",
            Reply::LoginFailed => "LOGIN_FAILED",
            Reply::ServerFull => "SERVER_FULL",
        }
    }

    /// Recognize a reply line; anything else is `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "LOGIN_SUCCESS" => Some(Reply::LoginSuccess),
            "LOGIN_FAILED" => Some(Reply::LoginFailed),
            "SERVER_FULL" => Some(Reply::ServerFull),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast once when a logged-in participant leaves
pub fn departure_notice(nickname: &str) -> String {
    format!("{} disconnected", nickname)
}

/// `<nickname>: <text>`
pub fn chat_line(nickname: &str, text: &str) -> String {
    format!("{}: {}", nickname, text)
}
