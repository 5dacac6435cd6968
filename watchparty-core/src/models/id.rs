use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Alphabet for human-shareable room codes.
const ROOM_CODE_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Generate a 12-character nanoid for entity IDs
pub fn generate_id() -> String {
    nanoid!(12)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub const fn from_string(id: String) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque internal room identifier
    RoomId
);
string_id!(
    /// Per-connection member identifier, replaced on reconnect
    MemberId
);
string_id!(
    /// Transport connection identifier
    ConnectionId
);
string_id!(
    /// Client-persisted identifier that survives reconnects
    SessionId
);
string_id!(PollId);

impl RoomId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid!(16))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl PollId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

/// Short human-shareable room code.
///
/// Always stored upper-case so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalize user input ("ab12cd ", "AB12CD") into a code.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// Generate a random code of `len` upper-case alphanumeric characters.
    #[must_use]
    pub fn generate(len: usize) -> Self {
        Self(nanoid!(len, &ROOM_CODE_ALPHABET))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id();
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn test_member_ids_are_unique() {
        let id1 = MemberId::new();
        let id2 = MemberId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 12);
    }

    #[test]
    fn test_room_code_generation() {
        let code = RoomCode::generate(6);
        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_room_code_is_case_insensitive() {
        assert_eq!(RoomCode::parse("ab12cd"), RoomCode::parse(" AB12CD "));
        assert_eq!(RoomCode::parse("xYz789").as_str(), "XYZ789");
    }
}
