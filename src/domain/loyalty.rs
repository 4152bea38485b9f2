//! Loyalty point previews shown before a booking is confirmed.

use pitchside_api_types::{MembershipTier, PointsCategory, UserProfile};

/// Points a booking is worth before any multiplier.
pub const BASE_BOOKING_POINTS: u64 = 10;

/// Id of the points category whose multiplier applies to bookings.
pub const BOOKING_CATEGORY_ID: &str = "booking";

/// Membership tier the profile belongs to, matched by tier id.
pub fn tier_for<'a>(
    profile: &UserProfile,
    tiers: &'a [MembershipTier],
) -> Option<&'a MembershipTier> {
    tiers.iter().find(|tier| tier.id == profile.membership_tier)
}

/// Points the caller would earn for one booking.
///
/// Zero when promotional awards are off or there is no profile. A missing
/// tier or booking category counts as a multiplier of one.
pub fn points_for_booking(
    award_enabled: bool,
    profile: Option<&UserProfile>,
    tiers: &[MembershipTier],
    categories: &[PointsCategory],
) -> u64 {
    let Some(profile) = profile.filter(|_| award_enabled) else {
        return 0;
    };

    let tier_multiplier = tier_for(profile, tiers).map_or(1, |tier| tier.reward_multiplier);
    let category_multiplier = categories
        .iter()
        .find(|category| category.id == BOOKING_CATEGORY_ID)
        .map_or(1, |category| category.multiplier);

    BASE_BOOKING_POINTS
        .saturating_mul(tier_multiplier)
        .saturating_mul(category_multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(tier: &str) -> UserProfile {
        UserProfile {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            loyalty_points: 0,
            membership_id: "m-1".to_string(),
            membership_tier: tier.to_string(),
        }
    }

    fn tier(id: &str, multiplier: u64) -> MembershipTier {
        MembershipTier {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            benefits: Vec::new(),
            monthly_fee: 0,
            reward_multiplier: multiplier,
        }
    }

    fn category(id: &str, multiplier: u64) -> PointsCategory {
        PointsCategory {
            id: id.to_string(),
            multiplier,
            name: id.to_string(),
            kind: "activity".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn multipliers_compound() {
        let gold = profile("gold");
        let points = points_for_booking(
            true,
            Some(&gold),
            &[tier("silver", 2), tier("gold", 3)],
            &[category("store", 5), category("booking", 2)],
        );
        assert_eq!(points, 60);
    }

    #[test]
    fn missing_multipliers_default_to_one() {
        let member = profile("unknown");
        assert_eq!(points_for_booking(true, Some(&member), &[], &[]), 10);
    }

    #[test]
    fn disabled_or_signed_out_earns_nothing() {
        let gold = profile("gold");
        let tiers = [tier("gold", 3)];

        assert_eq!(points_for_booking(false, Some(&gold), &tiers, &[]), 0);
        assert_eq!(points_for_booking(true, None, &tiers, &[]), 0);
    }
}
