//! Remote procedure boundary to the venue backend.
//!
//! [`VenueBackend`] is consumed, never implemented, by the cache and the
//! data-access layer. Every call is made on behalf of the caller the client
//! was built for; [`Session`] tracks which client is current.

pub mod memory;
mod session;

use async_trait::async_trait;
use pitchside_api_types::{
    AdminInvitation, Booking, BusinessContactInfo, InvitationChannels, LeaderboardEntry,
    MembershipTier, Notification, Order, PointsCategory, Product, Review, ShoppingItem,
    StripeConfiguration, Time, TimeSlot, TimeSlotState, UserProfile, VenueInfo,
};
use thiserror::Error;

pub use session::{Session, SessionState};

/// Failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No backend client is available yet.
    #[error("backend client is not available")]
    NotReady,
    /// The backend refused the request (validation, authorization, conflicts).
    #[error("request rejected: {message}")]
    Rejected { message: String },
    /// The request did not reach the backend or the reply was lost.
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl RpcError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Only transport failures are worth repeating; a rejection will be
    /// rejected again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Operations exposed by the venue backend, as seen by one caller.
#[async_trait]
pub trait VenueBackend: Send + Sync {
    // Profile and roles
    async fn get_caller_user_profile(&self) -> RpcResult<Option<UserProfile>>;
    async fn save_caller_user_profile(&self, profile: UserProfile) -> RpcResult<()>;
    async fn is_caller_admin(&self) -> RpcResult<bool>;

    // Bookings and availability
    async fn get_my_bookings(&self) -> RpcResult<Vec<Booking>>;
    async fn get_available_time_slots(&self) -> RpcResult<Vec<TimeSlot>>;
    async fn get_all_time_slots(&self) -> RpcResult<Vec<TimeSlot>>;
    async fn create_booking(&self, time_slot: Time) -> RpcResult<String>;
    async fn extend_booking_15_minutes(&self, booking_id: String) -> RpcResult<()>;
    async fn create_time_slot(&self, start_time: Time, duration: u64) -> RpcResult<()>;
    async fn toggle_time_slot_availability(&self, start_time: Time) -> RpcResult<()>;
    async fn toggle_time_slot_live_status(&self, start_time: Time) -> RpcResult<()>;
    async fn bulk_set_time_slot_states(&self, states: Vec<TimeSlotState>) -> RpcResult<()>;

    // Store
    async fn get_products(&self) -> RpcResult<Vec<Product>>;
    async fn add_product(&self, product: Product) -> RpcResult<()>;
    async fn update_product(&self, product: Product) -> RpcResult<()>;
    async fn delete_product(&self, product_id: String) -> RpcResult<()>;
    async fn get_my_orders(&self) -> RpcResult<Vec<Order>>;
    async fn create_order(&self, items: Vec<String>, total_amount: u64) -> RpcResult<String>;

    // Loyalty program
    async fn get_membership_tiers(&self) -> RpcResult<Vec<MembershipTier>>;
    async fn create_membership_tier(&self, tier: MembershipTier) -> RpcResult<String>;
    async fn update_membership_tier(&self, tier: MembershipTier) -> RpcResult<()>;
    async fn delete_membership_tier(&self, tier_id: String) -> RpcResult<()>;
    async fn get_points_categories(&self) -> RpcResult<Vec<PointsCategory>>;
    async fn create_points_category(&self, category: PointsCategory) -> RpcResult<String>;
    async fn update_points_category(&self, category: PointsCategory) -> RpcResult<()>;
    async fn delete_points_category(&self, category_id: String) -> RpcResult<()>;
    async fn get_points_guide(&self) -> RpcResult<String>;
    async fn update_points_guide(&self, guide: String) -> RpcResult<()>;
    async fn get_award_points_for_promotional_bookings(&self) -> RpcResult<bool>;
    async fn set_award_points_for_promotional_bookings(&self, value: bool) -> RpcResult<()>;
    async fn get_leaderboard(&self) -> RpcResult<Vec<LeaderboardEntry>>;

    // Reviews
    async fn get_reviews(&self) -> RpcResult<Vec<Review>>;
    async fn add_review(&self, rating: u8, comment: String) -> RpcResult<String>;

    // Notifications
    async fn get_my_notifications(&self) -> RpcResult<Vec<Notification>>;
    async fn get_unread_notification_count(&self) -> RpcResult<u64>;
    async fn mark_notification_as_read(&self, notification_id: String) -> RpcResult<()>;
    async fn mark_all_notifications_as_read(&self) -> RpcResult<()>;
    async fn delete_notification(&self, notification_id: String) -> RpcResult<()>;
    async fn delete_all_notifications(&self) -> RpcResult<()>;

    // Venue metadata
    async fn get_venue_info(&self) -> RpcResult<Option<VenueInfo>>;
    async fn update_venue_info(&self, info: VenueInfo) -> RpcResult<()>;
    async fn get_business_contact_info(&self) -> RpcResult<Option<BusinessContactInfo>>;
    async fn update_business_contact_info(&self, info: BusinessContactInfo) -> RpcResult<()>;

    // Admin invitations
    async fn get_admin_invitations(&self) -> RpcResult<Vec<AdminInvitation>>;
    async fn create_admin_invitation(&self, channels: InvitationChannels) -> RpcResult<String>;

    // Payments
    async fn is_stripe_configured(&self) -> RpcResult<bool>;
    async fn set_stripe_configuration(&self, config: StripeConfiguration) -> RpcResult<()>;
    /// Returns the JSON-encoded checkout session descriptor.
    async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: String,
        cancel_url: String,
    ) -> RpcResult<String>;
}
