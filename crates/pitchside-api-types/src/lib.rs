//! Shared wire types for the Pitchside backend interface.
//!
//! Field names follow the remote interface (camelCase on the wire).
//! Timestamps are [`Time`] values: nanoseconds since the Unix epoch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nanoseconds since the Unix epoch.
pub type Time = i64;

pub const NANOS_PER_MINUTE: Time = 60 * 1_000_000_000;

/// Opaque identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub loyalty_points: u64,
    pub membership_id: String,
    pub membership_tier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub status: String,
    pub created_at: Time,
    pub user: Principal,
    pub time_slot: Time,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: Time,
    /// Length in minutes.
    pub duration: u64,
    pub is_live: bool,
    pub is_enabled: bool,
}

/// Desired `(start_time, is_enabled, is_live)` state for a bulk update.
pub type TimeSlotState = (Time, bool, bool);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub stock: u64,
    pub category: String,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: String,
    pub created_at: Time,
    pub user: Principal,
    pub total_amount: u64,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipTier {
    pub id: String,
    pub name: String,
    pub description: String,
    pub benefits: Vec<String>,
    pub monthly_fee: u64,
    pub reward_multiplier: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsCategory {
    pub id: String,
    pub multiplier: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub created_at: Time,
    pub user: Principal,
    pub comment: String,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user: Principal,
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Principal,
    pub message: String,
    pub timestamp: Time,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueInfo {
    pub hours: String,
    pub faqs: Vec<String>,
    pub name: String,
    pub facilities: Vec<String>,
    pub location: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContactInfo {
    pub description: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInvitation {
    pub id: String,
    pub status: String,
    pub created_at: Time,
    pub whatsapp: String,
    pub email: String,
    pub slack: String,
    pub invite_link: String,
    pub phone: String,
    pub sent_channels: Vec<String>,
    pub telegram: String,
}

/// Contact handles an admin invitation is delivered through.
///
/// Empty strings mean the channel is not used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationChannels {
    pub email: String,
    pub phone: String,
    pub whatsapp: String,
    pub telegram: String,
    pub slack: String,
}

impl InvitationChannels {
    /// Names of the channels that carry a non-empty handle.
    pub fn active(&self) -> Vec<String> {
        [
            ("email", &self.email),
            ("phone", &self.phone),
            ("whatsapp", &self.whatsapp),
            ("telegram", &self.telegram),
            ("slack", &self.slack),
        ]
        .into_iter()
        .filter(|(_, handle)| !handle.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeConfiguration {
    pub allowed_countries: Vec<String>,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub product_name: String,
    pub currency: String,
    pub quantity: u64,
    pub price_in_cents: u64,
    pub product_description: String,
}

/// Checkout session descriptor returned (JSON-encoded) by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}
