use pitchside_api_types::{
    BusinessContactInfo, CheckoutSession, InvitationChannels, MembershipTier, PointsCategory,
    Product, ShoppingItem, StripeConfiguration, Time, TimeSlotState, UserProfile, VenueInfo,
};
use tracing::info;

use super::{DataAccess, MutationError};
use crate::cache::Mutation;

type MutationResult<T> = Result<T, MutationError>;

const PAYMENT_SUCCESS_PATH: &str = "payment-success";
const PAYMENT_FAILURE_PATH: &str = "payment-failure";

impl DataAccess {
    pub async fn save_caller_user_profile(&self, profile: UserProfile) -> MutationResult<()> {
        self.mutate(Mutation::SaveCallerUserProfile, |actor| async move {
            actor.save_caller_user_profile(profile).await
        })
        .await
    }

    // Loyalty program

    pub async fn create_membership_tier(&self, tier: MembershipTier) -> MutationResult<String> {
        self.mutate(Mutation::CreateMembershipTier, |actor| async move {
            actor.create_membership_tier(tier).await
        })
        .await
    }

    pub async fn update_membership_tier(&self, tier: MembershipTier) -> MutationResult<()> {
        self.mutate(Mutation::UpdateMembershipTier, |actor| async move {
            actor.update_membership_tier(tier).await
        })
        .await
    }

    pub async fn delete_membership_tier(&self, tier_id: String) -> MutationResult<()> {
        self.mutate(Mutation::DeleteMembershipTier, |actor| async move {
            actor.delete_membership_tier(tier_id).await
        })
        .await
    }

    pub async fn create_points_category(
        &self,
        category: PointsCategory,
    ) -> MutationResult<String> {
        self.mutate(Mutation::CreatePointsCategory, |actor| async move {
            actor.create_points_category(category).await
        })
        .await
    }

    pub async fn update_points_category(&self, category: PointsCategory) -> MutationResult<()> {
        self.mutate(Mutation::UpdatePointsCategory, |actor| async move {
            actor.update_points_category(category).await
        })
        .await
    }

    pub async fn delete_points_category(&self, category_id: String) -> MutationResult<()> {
        self.mutate(Mutation::DeletePointsCategory, |actor| async move {
            actor.delete_points_category(category_id).await
        })
        .await
    }

    pub async fn update_points_guide(&self, guide: String) -> MutationResult<()> {
        self.mutate(Mutation::UpdatePointsGuide, |actor| async move {
            actor.update_points_guide(guide).await
        })
        .await
    }

    pub async fn set_award_points_for_promotional_bookings(
        &self,
        value: bool,
    ) -> MutationResult<()> {
        self.mutate(
            Mutation::SetAwardPointsForPromotionalBookings,
            |actor| async move { actor.set_award_points_for_promotional_bookings(value).await },
        )
        .await
    }

    // Bookings and availability

    pub async fn create_booking(&self, time_slot: Time) -> MutationResult<String> {
        self.mutate(Mutation::CreateBooking, |actor| async move {
            actor.create_booking(time_slot).await
        })
        .await
    }

    pub async fn extend_booking(&self, booking_id: String) -> MutationResult<()> {
        self.mutate(Mutation::ExtendBooking, |actor| async move {
            actor.extend_booking_15_minutes(booking_id).await
        })
        .await
    }

    pub async fn create_time_slot(&self, start_time: Time, duration: u64) -> MutationResult<()> {
        self.mutate(Mutation::CreateTimeSlot, |actor| async move {
            actor.create_time_slot(start_time, duration).await
        })
        .await
    }

    pub async fn toggle_time_slot_availability(&self, start_time: Time) -> MutationResult<()> {
        self.mutate(Mutation::ToggleTimeSlotAvailability, |actor| async move {
            actor.toggle_time_slot_availability(start_time).await
        })
        .await
    }

    pub async fn toggle_time_slot_live_status(&self, start_time: Time) -> MutationResult<()> {
        self.mutate(Mutation::ToggleTimeSlotLiveStatus, |actor| async move {
            actor.toggle_time_slot_live_status(start_time).await
        })
        .await
    }

    pub async fn bulk_set_time_slot_states(
        &self,
        states: Vec<TimeSlotState>,
    ) -> MutationResult<()> {
        self.mutate(Mutation::BulkSetTimeSlotStates, |actor| async move {
            actor.bulk_set_time_slot_states(states).await
        })
        .await
    }

    // Store

    pub async fn add_product(&self, product: Product) -> MutationResult<()> {
        self.mutate(Mutation::AddProduct, |actor| async move {
            actor.add_product(product).await
        })
        .await
    }

    pub async fn update_product(&self, product: Product) -> MutationResult<()> {
        self.mutate(Mutation::UpdateProduct, |actor| async move {
            actor.update_product(product).await
        })
        .await
    }

    pub async fn delete_product(&self, product_id: String) -> MutationResult<()> {
        self.mutate(Mutation::DeleteProduct, |actor| async move {
            actor.delete_product(product_id).await
        })
        .await
    }

    pub async fn create_order(
        &self,
        items: Vec<String>,
        total_amount: u64,
    ) -> MutationResult<String> {
        self.mutate(Mutation::CreateOrder, |actor| async move {
            actor.create_order(items, total_amount).await
        })
        .await
    }

    /// Open a payment session. Redirects land on `payment-success` or
    /// `payment-failure` under the configured checkout base.
    pub async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
    ) -> MutationResult<CheckoutSession> {
        let success_url = self.checkout_base.join(PAYMENT_SUCCESS_PATH)?;
        let cancel_url = self.checkout_base.join(PAYMENT_FAILURE_PATH)?;

        let raw = self
            .mutate(Mutation::CreateCheckoutSession, |actor| async move {
                actor
                    .create_checkout_session(items, success_url.into(), cancel_url.into())
                    .await
            })
            .await?;

        let session: CheckoutSession = serde_json::from_str(&raw)?;
        info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    // Community

    pub async fn add_review(&self, rating: u8, comment: String) -> MutationResult<String> {
        self.mutate(Mutation::AddReview, |actor| async move {
            actor.add_review(rating, comment).await
        })
        .await
    }

    // Venue and admin

    pub async fn update_venue_info(&self, info: VenueInfo) -> MutationResult<()> {
        self.mutate(Mutation::UpdateVenueInfo, |actor| async move {
            actor.update_venue_info(info).await
        })
        .await
    }

    pub async fn update_business_contact_info(
        &self,
        info: BusinessContactInfo,
    ) -> MutationResult<()> {
        self.mutate(Mutation::UpdateBusinessContactInfo, |actor| async move {
            actor.update_business_contact_info(info).await
        })
        .await
    }

    pub async fn set_stripe_configuration(
        &self,
        config: StripeConfiguration,
    ) -> MutationResult<()> {
        self.mutate(Mutation::SetStripeConfiguration, |actor| async move {
            actor.set_stripe_configuration(config).await
        })
        .await
    }

    pub async fn create_admin_invitation(
        &self,
        channels: InvitationChannels,
    ) -> MutationResult<String> {
        self.mutate(Mutation::CreateAdminInvitation, |actor| async move {
            actor.create_admin_invitation(channels).await
        })
        .await
    }

    // Notifications

    pub async fn mark_notification_as_read(&self, notification_id: String) -> MutationResult<()> {
        self.mutate(Mutation::MarkNotificationAsRead, |actor| async move {
            actor.mark_notification_as_read(notification_id).await
        })
        .await
    }

    pub async fn mark_all_notifications_as_read(&self) -> MutationResult<()> {
        self.mutate(Mutation::MarkAllNotificationsAsRead, |actor| async move {
            actor.mark_all_notifications_as_read().await
        })
        .await
    }

    pub async fn delete_notification(&self, notification_id: String) -> MutationResult<()> {
        self.mutate(Mutation::DeleteNotification, |actor| async move {
            actor.delete_notification(notification_id).await
        })
        .await
    }

    pub async fn delete_all_notifications(&self) -> MutationResult<()> {
        self.mutate(Mutation::DeleteAllNotifications, |actor| async move {
            actor.delete_all_notifications().await
        })
        .await
    }
}
