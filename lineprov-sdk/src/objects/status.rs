//! Outcome status of a betting event.

/// Outcome status of an event.
///
/// The numeric codes are part of the wire contract with the bet-maker and
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventStatus {
    /// The match has not finished yet. The only legal initial status.
    NotFinished = 1,
    /// The first team won.
    Won = 2,
    /// The first team lost.
    Lost = 3,
}

impl EventStatus {
    /// Every status, in code order.
    pub const ALL: [EventStatus; 3] = [EventStatus::NotFinished, EventStatus::Won, EventStatus::Lost];

    /// Numeric wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a status by its wire code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(EventStatus::NotFinished),
            2 => Some(EventStatus::Won),
            3 => Some(EventStatus::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::NotFinished => write!(f, "not_finished"),
            EventStatus::Won => write!(f, "won"),
            EventStatus::Lost => write!(f, "lost"),
        }
    }
}

impl serde::Serialize for EventStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for EventStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = i64::deserialize(deserializer)?;
        EventStatus::from_code(code).ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Signed(code),
                &"an event status code (1, 2 or 3)",
            )
        })
    }
}
