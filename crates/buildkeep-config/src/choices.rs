//! Enumerated configuration choices.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Whether the daemon is managed on this host or provided externally.
///
/// `Auto` defers to the daemon address: container schemes and loopback TCP
/// addresses are managed locally, everything else is treated as provided.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LocalityPreference {
    /// Infer locality from the daemon address.
    #[default]
    Auto,
    /// Always manage the daemon container on this host.
    Local,
    /// Never touch the container runtime; connect only.
    Remote,
}

/// Errors encountered while parsing a choice from text.
pub type ChoiceParseError = strum::ParseError;
