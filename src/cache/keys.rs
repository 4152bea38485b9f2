//! Cache key definitions.
//!
//! A [`CacheKey`] is a [`Resource`] tag plus an optional parameter tuple.
//! [`KeyPattern`] selects keys for invalidation.

use std::fmt;

/// Remote read resources the client caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    // Caller
    CurrentUserProfile,
    IsCallerAdmin,

    // Loyalty program
    MembershipTiers,
    PointsCategories,
    PointsGuide,
    AwardPointsForPromotionalBookings,
    Leaderboard,

    // Bookings
    MyBookings,
    AvailableTimeSlots,
    AllTimeSlots,

    // Store
    Products,
    MyOrders,

    // Community
    Reviews,

    // Venue metadata
    VenueInfo,
    BusinessContactInfo,

    // Admin
    StripeConfigured,
    AdminInvitations,

    // Notifications
    MyNotifications,
    UnreadNotificationCount,
}

impl Resource {
    pub const ALL: [Resource; 19] = [
        Resource::CurrentUserProfile,
        Resource::IsCallerAdmin,
        Resource::MembershipTiers,
        Resource::PointsCategories,
        Resource::PointsGuide,
        Resource::AwardPointsForPromotionalBookings,
        Resource::Leaderboard,
        Resource::MyBookings,
        Resource::AvailableTimeSlots,
        Resource::AllTimeSlots,
        Resource::Products,
        Resource::MyOrders,
        Resource::Reviews,
        Resource::VenueInfo,
        Resource::BusinessContactInfo,
        Resource::StripeConfigured,
        Resource::AdminInvitations,
        Resource::MyNotifications,
        Resource::UnreadNotificationCount,
    ];

    /// Stable tag used in logs, metrics and key display.
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::CurrentUserProfile => "currentUserProfile",
            Resource::IsCallerAdmin => "isAdmin",
            Resource::MembershipTiers => "membershipTiers",
            Resource::PointsCategories => "pointsCategories",
            Resource::PointsGuide => "pointsGuide",
            Resource::AwardPointsForPromotionalBookings => "awardPointsForPromotionalBookings",
            Resource::Leaderboard => "leaderboard",
            Resource::MyBookings => "myBookings",
            Resource::AvailableTimeSlots => "availableTimeSlots",
            Resource::AllTimeSlots => "allTimeSlots",
            Resource::Products => "products",
            Resource::MyOrders => "myOrders",
            Resource::Reviews => "reviews",
            Resource::VenueInfo => "venueInfo",
            Resource::BusinessContactInfo => "businessContactInfo",
            Resource::StripeConfigured => "stripeConfigured",
            Resource::AdminInvitations => "adminInvitations",
            Resource::MyNotifications => "myNotifications",
            Resource::UnreadNotificationCount => "unreadNotificationCount",
        }
    }

    /// Reads scoped to the signed-in caller. Without a principal they resolve
    /// to an empty value instead of reaching the backend.
    pub fn requires_identity(self) -> bool {
        matches!(
            self,
            Resource::CurrentUserProfile
                | Resource::MyBookings
                | Resource::AvailableTimeSlots
                | Resource::MyOrders
                | Resource::MyNotifications
                | Resource::UnreadNotificationCount
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component of a parameterized key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyParam {
    Str(String),
    Int(i64),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParam::Str(value) => f.write_str(value),
            KeyParam::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        KeyParam::Str(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        KeyParam::Str(value)
    }
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        KeyParam::Int(value)
    }
}

/// Address of one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource: Resource,
    params: Vec<KeyParam>,
}

impl CacheKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }
}

impl From<Resource> for CacheKey {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        Ok(())
    }
}

/// Selects cache keys for invalidation or refetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Every key in the store.
    All,
    /// Every key of one resource, whatever its parameters.
    Resource(Resource),
    /// Exactly one key.
    Exact(CacheKey),
}

impl KeyPattern {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyPattern::All => true,
            KeyPattern::Resource(resource) => key.resource == *resource,
            KeyPattern::Exact(exact) => exact == key,
        }
    }
}

impl From<Resource> for KeyPattern {
    fn from(resource: Resource) -> Self {
        KeyPattern::Resource(resource)
    }
}

impl From<CacheKey> for KeyPattern {
    fn from(key: CacheKey) -> Self {
        KeyPattern::Exact(key)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::All => f.write_str("*"),
            KeyPattern::Resource(resource) => write!(f, "{resource}/*"),
            KeyPattern::Exact(key) => write!(f, "{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn key_display_includes_params() {
        let key = CacheKey::new(Resource::MyBookings);
        assert_eq!(key.to_string(), "myBookings");

        let key = CacheKey::new(Resource::Products)
            .with_param("bats")
            .with_param(2_i64);
        assert_eq!(key.to_string(), "products/bats/2");
    }

    #[test]
    fn resource_pattern_matches_any_params() {
        let pattern = KeyPattern::Resource(Resource::Products);

        assert!(pattern.matches(&CacheKey::new(Resource::Products)));
        assert!(pattern.matches(&CacheKey::new(Resource::Products).with_param("bats")));
        assert!(!pattern.matches(&CacheKey::new(Resource::Reviews)));
    }

    #[test]
    fn exact_pattern_requires_equal_params() {
        let key = CacheKey::new(Resource::Products).with_param("bats");
        let pattern = KeyPattern::from(key.clone());

        assert!(pattern.matches(&key));
        assert!(!pattern.matches(&CacheKey::new(Resource::Products)));
        assert!(!pattern.matches(&CacheKey::new(Resource::Products).with_param("balls")));
    }

    #[test]
    fn all_pattern_matches_everything() {
        for resource in Resource::ALL {
            assert!(KeyPattern::All.matches(&CacheKey::new(resource)));
        }
    }

    #[test]
    fn resource_tags_are_unique() {
        let tags: HashSet<_> = Resource::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(tags.len(), Resource::ALL.len());
    }

    #[test]
    fn caller_scoped_resources() {
        assert!(Resource::MyBookings.requires_identity());
        assert!(Resource::UnreadNotificationCount.requires_identity());
        assert!(Resource::AvailableTimeSlots.requires_identity());
        assert!(!Resource::Products.requires_identity());
        assert!(!Resource::Leaderboard.requires_identity());
    }
}
