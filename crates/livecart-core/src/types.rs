use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One line of the live chat. `emoji` is free text chosen by the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub message: String,
    #[serde(default)]
    pub emoji: String,
    pub created_at: String,
}

/// A placed order. `customer_id` is the customer number the buyer typed in,
/// not the internal customer record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_name: String,
    pub size: String,
    pub quantity: u32,
    /// Unit price in server currency units.
    pub price: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub customer_number: String,
    #[serde(default)]
    pub name: Option<String>,
    pub activation_status: ActivationStatus,
    pub created_at: String,
}

/// Customer lifecycle. New customers wait for an admin to activate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    #[default]
    Pending,
    Active,
    Blocked,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStatus::Pending => "pending",
            ActivationStatus::Active => "active",
            ActivationStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActivationStatus::Pending),
            "active" => Ok(ActivationStatus::Active),
            "blocked" => Ok(ActivationStatus::Blocked),
            other => Err(format!("unknown activation status: {other}")),
        }
    }
}

/// An entry of the public show calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
}

/// A live-stream room as last reported by the streaming provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRoom {
    pub id: String,
    pub name: String,
    /// Opaque provider metadata (ingest URLs, provider room id, ...).
    #[serde(default)]
    pub provider: Value,
    pub created_at: String,
}

/// The scrolling banner shown above the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TickerState {
    pub text: String,
    pub enabled: bool,
}
