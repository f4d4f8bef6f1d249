use thiserror::Error;

use crate::core::types::{FactionId, GroupId};

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Faction not present in engagement: {0}")]
    UnknownFaction(FactionId),

    #[error("Order for group {group} rejected: {reason}")]
    CommandRejected { group: GroupId, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;
