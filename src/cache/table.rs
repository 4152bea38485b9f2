//! Mutation → read invalidation table.
//!
//! Every mutation the client can run is listed here together with the reads
//! it makes stale. Data-access code never names keys to invalidate; it names
//! the [`Mutation`] and the table does the rest.

use std::fmt;

use super::keys::Resource;

/// Remote write operations exposed through the data-access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mutation {
    SaveCallerUserProfile,

    CreateMembershipTier,
    UpdateMembershipTier,
    DeleteMembershipTier,
    CreatePointsCategory,
    UpdatePointsCategory,
    DeletePointsCategory,
    UpdatePointsGuide,
    SetAwardPointsForPromotionalBookings,

    CreateBooking,
    ExtendBooking,
    CreateTimeSlot,
    ToggleTimeSlotAvailability,
    ToggleTimeSlotLiveStatus,
    BulkSetTimeSlotStates,

    AddProduct,
    UpdateProduct,
    DeleteProduct,
    CreateOrder,
    CreateCheckoutSession,

    AddReview,

    UpdateVenueInfo,
    UpdateBusinessContactInfo,
    SetStripeConfiguration,
    CreateAdminInvitation,

    MarkNotificationAsRead,
    MarkAllNotificationsAsRead,
    DeleteNotification,
    DeleteAllNotifications,
}

/// What a settled mutation does to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationRule {
    pub invalidates: &'static [Resource],
    /// Refetch observed keys right away instead of waiting for the next read.
    pub refetch: bool,
}

const PROFILE: &[Resource] = &[Resource::CurrentUserProfile];
const TIERS: &[Resource] = &[Resource::MembershipTiers];
const CATEGORIES: &[Resource] = &[Resource::PointsCategories];
const GUIDE: &[Resource] = &[Resource::PointsGuide];
const AWARD_FLAG: &[Resource] = &[Resource::AwardPointsForPromotionalBookings];
const BOOKING: &[Resource] = &[
    Resource::MyBookings,
    Resource::AvailableTimeSlots,
    Resource::MyNotifications,
    Resource::UnreadNotificationCount,
    Resource::CurrentUserProfile,
];
const EXTENSION: &[Resource] = &[
    Resource::MyBookings,
    Resource::AvailableTimeSlots,
    Resource::AllTimeSlots,
];
const SLOTS: &[Resource] = &[Resource::AllTimeSlots, Resource::AvailableTimeSlots];
const PRODUCTS: &[Resource] = &[Resource::Products];
const ORDER: &[Resource] = &[Resource::MyOrders, Resource::CurrentUserProfile];
const REVIEWS: &[Resource] = &[Resource::Reviews];
const VENUE: &[Resource] = &[Resource::VenueInfo];
const CONTACT: &[Resource] = &[Resource::BusinessContactInfo];
const STRIPE: &[Resource] = &[Resource::StripeConfigured];
const INVITATIONS: &[Resource] = &[Resource::AdminInvitations];
const NOTIFICATIONS: &[Resource] = &[
    Resource::MyNotifications,
    Resource::UnreadNotificationCount,
];

impl Mutation {
    pub const ALL: [Mutation; 29] = [
        Mutation::SaveCallerUserProfile,
        Mutation::CreateMembershipTier,
        Mutation::UpdateMembershipTier,
        Mutation::DeleteMembershipTier,
        Mutation::CreatePointsCategory,
        Mutation::UpdatePointsCategory,
        Mutation::DeletePointsCategory,
        Mutation::UpdatePointsGuide,
        Mutation::SetAwardPointsForPromotionalBookings,
        Mutation::CreateBooking,
        Mutation::ExtendBooking,
        Mutation::CreateTimeSlot,
        Mutation::ToggleTimeSlotAvailability,
        Mutation::ToggleTimeSlotLiveStatus,
        Mutation::BulkSetTimeSlotStates,
        Mutation::AddProduct,
        Mutation::UpdateProduct,
        Mutation::DeleteProduct,
        Mutation::CreateOrder,
        Mutation::CreateCheckoutSession,
        Mutation::AddReview,
        Mutation::UpdateVenueInfo,
        Mutation::UpdateBusinessContactInfo,
        Mutation::SetStripeConfiguration,
        Mutation::CreateAdminInvitation,
        Mutation::MarkNotificationAsRead,
        Mutation::MarkAllNotificationsAsRead,
        Mutation::DeleteNotification,
        Mutation::DeleteAllNotifications,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mutation::SaveCallerUserProfile => "saveCallerUserProfile",
            Mutation::CreateMembershipTier => "createMembershipTier",
            Mutation::UpdateMembershipTier => "updateMembershipTier",
            Mutation::DeleteMembershipTier => "deleteMembershipTier",
            Mutation::CreatePointsCategory => "createPointsCategory",
            Mutation::UpdatePointsCategory => "updatePointsCategory",
            Mutation::DeletePointsCategory => "deletePointsCategory",
            Mutation::UpdatePointsGuide => "updatePointsGuide",
            Mutation::SetAwardPointsForPromotionalBookings => {
                "setAwardPointsForPromotionalBookings"
            }
            Mutation::CreateBooking => "createBooking",
            Mutation::ExtendBooking => "extendBooking15Minutes",
            Mutation::CreateTimeSlot => "createTimeSlot",
            Mutation::ToggleTimeSlotAvailability => "toggleTimeSlotAvailability",
            Mutation::ToggleTimeSlotLiveStatus => "toggleTimeSlotLiveStatus",
            Mutation::BulkSetTimeSlotStates => "bulkSetTimeSlotStates",
            Mutation::AddProduct => "addProduct",
            Mutation::UpdateProduct => "updateProduct",
            Mutation::DeleteProduct => "deleteProduct",
            Mutation::CreateOrder => "createOrder",
            Mutation::CreateCheckoutSession => "createCheckoutSession",
            Mutation::AddReview => "addReview",
            Mutation::UpdateVenueInfo => "updateVenueInfo",
            Mutation::UpdateBusinessContactInfo => "updateBusinessContactInfo",
            Mutation::SetStripeConfiguration => "setStripeConfiguration",
            Mutation::CreateAdminInvitation => "createAdminInvitation",
            Mutation::MarkNotificationAsRead => "markNotificationAsRead",
            Mutation::MarkAllNotificationsAsRead => "markAllNotificationsAsRead",
            Mutation::DeleteNotification => "deleteNotification",
            Mutation::DeleteAllNotifications => "deleteAllNotifications",
        }
    }

    pub fn rule(self) -> InvalidationRule {
        let (invalidates, refetch) = match self {
            Mutation::SaveCallerUserProfile => (PROFILE, false),

            Mutation::CreateMembershipTier
            | Mutation::UpdateMembershipTier
            | Mutation::DeleteMembershipTier => (TIERS, true),
            Mutation::CreatePointsCategory
            | Mutation::UpdatePointsCategory
            | Mutation::DeletePointsCategory => (CATEGORIES, true),
            Mutation::UpdatePointsGuide => (GUIDE, true),
            Mutation::SetAwardPointsForPromotionalBookings => (AWARD_FLAG, true),

            Mutation::CreateBooking => (BOOKING, false),
            Mutation::ExtendBooking => (EXTENSION, false),
            Mutation::CreateTimeSlot
            | Mutation::ToggleTimeSlotAvailability
            | Mutation::ToggleTimeSlotLiveStatus
            | Mutation::BulkSetTimeSlotStates => (SLOTS, false),

            Mutation::AddProduct | Mutation::UpdateProduct | Mutation::DeleteProduct => {
                (PRODUCTS, false)
            }
            Mutation::CreateOrder => (ORDER, false),
            Mutation::CreateCheckoutSession => (PROFILE, false),

            Mutation::AddReview => (REVIEWS, false),

            Mutation::UpdateVenueInfo => (VENUE, false),
            Mutation::UpdateBusinessContactInfo => (CONTACT, false),
            Mutation::SetStripeConfiguration => (STRIPE, false),
            Mutation::CreateAdminInvitation => (INVITATIONS, false),

            Mutation::MarkNotificationAsRead
            | Mutation::MarkAllNotificationsAsRead
            | Mutation::DeleteNotification
            | Mutation::DeleteAllNotifications => (NOTIFICATIONS, false),
        };

        InvalidationRule {
            invalidates,
            refetch,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render the whole table, one mutation per line.
pub fn render() -> String {
    let width = Mutation::ALL
        .iter()
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for mutation in Mutation::ALL {
        let rule = mutation.rule();
        let keys: Vec<&str> = rule.invalidates.iter().map(|r| r.as_str()).collect();
        let marker = if rule.refetch { " (refetch)" } else { "" };
        out.push_str(&format!(
            "{:<width$}  {}{}\n",
            mutation.as_str(),
            keys.join(", "),
            marker,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_mutation_invalidates_something() {
        for mutation in Mutation::ALL {
            assert!(
                !mutation.rule().invalidates.is_empty(),
                "{mutation} has no invalidation targets"
            );
        }
    }

    #[test]
    fn mutation_names_are_unique() {
        let names: HashSet<_> = Mutation::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), Mutation::ALL.len());
    }

    #[test]
    fn booking_touches_bookings_slots_notifications_and_profile() {
        let rule = Mutation::CreateBooking.rule();
        let keys: HashSet<_> = rule.invalidates.iter().copied().collect();

        assert_eq!(
            keys,
            HashSet::from([
                Resource::MyBookings,
                Resource::AvailableTimeSlots,
                Resource::MyNotifications,
                Resource::UnreadNotificationCount,
                Resource::CurrentUserProfile,
            ])
        );
        assert!(!rule.refetch);
    }

    #[test]
    fn loyalty_admin_mutations_refetch_eagerly() {
        for mutation in [
            Mutation::CreateMembershipTier,
            Mutation::UpdateMembershipTier,
            Mutation::DeleteMembershipTier,
            Mutation::CreatePointsCategory,
            Mutation::UpdatePointsCategory,
            Mutation::DeletePointsCategory,
            Mutation::UpdatePointsGuide,
            Mutation::SetAwardPointsForPromotionalBookings,
        ] {
            assert!(mutation.rule().refetch, "{mutation} should refetch");
        }

        assert!(!Mutation::AddProduct.rule().refetch);
        assert!(!Mutation::MarkAllNotificationsAsRead.rule().refetch);
    }

    #[test]
    fn notification_mutations_share_targets() {
        let expected = Mutation::MarkNotificationAsRead.rule().invalidates;
        for mutation in [
            Mutation::MarkAllNotificationsAsRead,
            Mutation::DeleteNotification,
            Mutation::DeleteAllNotifications,
        ] {
            assert_eq!(mutation.rule().invalidates, expected);
        }
        assert!(expected.contains(&Resource::UnreadNotificationCount));
    }

    #[test]
    fn slot_admin_mutations_hit_both_slot_views() {
        for mutation in [
            Mutation::CreateTimeSlot,
            Mutation::ToggleTimeSlotAvailability,
            Mutation::ToggleTimeSlotLiveStatus,
            Mutation::BulkSetTimeSlotStates,
        ] {
            let targets = mutation.rule().invalidates;
            assert!(targets.contains(&Resource::AllTimeSlots));
            assert!(targets.contains(&Resource::AvailableTimeSlots));
        }
    }

    #[test]
    fn render_lists_every_mutation() {
        let table = render();
        assert_eq!(table.lines().count(), Mutation::ALL.len());
        assert!(table.contains("createMembershipTier"));
        assert!(table.contains("membershipTiers (refetch)"));
    }
}
