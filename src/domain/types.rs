//! Small value types shared across the domain.

use serde::{Deserialize, Serialize};

/// What a notification is about.
///
/// Stored as text in the notifications table; `as_str`/`parse` keep the wire
/// form in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Like,
    Comment,
    Post,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Post => "post",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "follow" => Some(NotificationKind::Follow),
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "post" => Some(NotificationKind::Post),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [
            NotificationKind::Follow,
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Post,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("poke"), None);
    }
}
