use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use pitchside_api_types::{
    AdminInvitation, Booking, BusinessContactInfo, LeaderboardEntry, MembershipTier, Notification,
    Order, PointsCategory, Product, Review, TimeSlot, UserProfile, VenueInfo,
};
use tracing::warn;

use super::{DataAccess, QueryState};
use crate::cache::{FetchError, Loader, Resource, loader};
use crate::rpc::{RpcError, RpcResult, Session, SessionState, VenueBackend};

type ReadResult<T> = Result<QueryState<T>, FetchError>;

/// Loader for `resource`, resolving the backend client at call time so
/// stored loaders follow sign-in and sign-out.
pub(super) fn loader_for(session: Arc<Session>, resource: Resource) -> Loader {
    match resource {
        Resource::CurrentUserProfile => bind(session, resource, |actor| async move {
            actor.get_caller_user_profile().await
        }),
        Resource::IsCallerAdmin => bind(session, resource, |actor| async move {
            Ok::<_, RpcError>(actor.is_caller_admin().await.unwrap_or_else(|err| {
                warn!(error = %err, "Admin status check failed; treating caller as non-admin");
                false
            }))
        }),
        Resource::MembershipTiers => bind(session, resource, |actor| async move {
            actor.get_membership_tiers().await
        }),
        Resource::PointsCategories => bind(session, resource, |actor| async move {
            actor.get_points_categories().await
        }),
        Resource::PointsGuide => bind(session, resource, |actor| async move {
            actor.get_points_guide().await
        }),
        Resource::AwardPointsForPromotionalBookings => bind(session, resource, |actor| async move {
            actor.get_award_points_for_promotional_bookings().await
        }),
        Resource::Leaderboard => bind(session, resource, |actor| async move {
            actor.get_leaderboard().await
        }),
        Resource::MyBookings => bind(session, resource, |actor| async move {
            actor.get_my_bookings().await
        }),
        Resource::AvailableTimeSlots => bind(session, resource, |actor| async move {
            actor.get_available_time_slots().await
        }),
        Resource::AllTimeSlots => bind(session, resource, |actor| async move {
            actor.get_all_time_slots().await
        }),
        Resource::Products => bind(session, resource, |actor| async move {
            actor.get_products().await
        }),
        Resource::MyOrders => bind(session, resource, |actor| async move {
            actor.get_my_orders().await
        }),
        Resource::Reviews => bind(session, resource, |actor| async move {
            actor.get_reviews().await
        }),
        Resource::VenueInfo => bind(session, resource, |actor| async move {
            actor.get_venue_info().await
        }),
        Resource::BusinessContactInfo => bind(session, resource, |actor| async move {
            actor.get_business_contact_info().await
        }),
        Resource::StripeConfigured => bind(session, resource, |actor| async move {
            actor.is_stripe_configured().await
        }),
        Resource::AdminInvitations => bind(session, resource, |actor| async move {
            actor.get_admin_invitations().await
        }),
        Resource::MyNotifications => bind(session, resource, |actor| async move {
            actor.get_my_notifications().await
        }),
        Resource::UnreadNotificationCount => bind(session, resource, |actor| async move {
            actor.get_unread_notification_count().await
        }),
    }
}

fn bind<T, F, Fut>(session: Arc<Session>, resource: Resource, call: F) -> Loader
where
    T: Any + Default + Send + Sync,
    F: Fn(Arc<dyn VenueBackend>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<T>> + Send + 'static,
{
    loader(move || {
        let pending = match session.snapshot() {
            SessionState::Initializing => Err(RpcError::NotReady),
            SessionState::Ready {
                principal: None, ..
            } if resource.requires_identity() => Ok(None),
            SessionState::Ready { actor, .. } => Ok(Some(call(actor))),
        };
        async move {
            match pending? {
                Some(read) => read.await,
                None => Ok(T::default()),
            }
        }
    })
}

impl DataAccess {
    pub async fn caller_user_profile(&self) -> ReadResult<Option<UserProfile>> {
        self.query(Resource::CurrentUserProfile).await
    }

    pub async fn is_caller_admin(&self) -> ReadResult<bool> {
        self.query(Resource::IsCallerAdmin).await
    }

    pub async fn membership_tiers(&self) -> ReadResult<Vec<MembershipTier>> {
        self.query(Resource::MembershipTiers).await
    }

    pub async fn points_categories(&self) -> ReadResult<Vec<PointsCategory>> {
        self.query(Resource::PointsCategories).await
    }

    pub async fn points_guide(&self) -> ReadResult<String> {
        self.query(Resource::PointsGuide).await
    }

    pub async fn award_points_for_promotional_bookings(&self) -> ReadResult<bool> {
        self.query(Resource::AwardPointsForPromotionalBookings).await
    }

    pub async fn leaderboard(&self) -> ReadResult<Vec<LeaderboardEntry>> {
        self.query(Resource::Leaderboard).await
    }

    pub async fn my_bookings(&self) -> ReadResult<Vec<Booking>> {
        self.query(Resource::MyBookings).await
    }

    pub async fn available_time_slots(&self) -> ReadResult<Vec<TimeSlot>> {
        self.query(Resource::AvailableTimeSlots).await
    }

    pub async fn all_time_slots(&self) -> ReadResult<Vec<TimeSlot>> {
        self.query(Resource::AllTimeSlots).await
    }

    pub async fn products(&self) -> ReadResult<Vec<Product>> {
        self.query(Resource::Products).await
    }

    pub async fn my_orders(&self) -> ReadResult<Vec<Order>> {
        self.query(Resource::MyOrders).await
    }

    pub async fn reviews(&self) -> ReadResult<Vec<Review>> {
        self.query(Resource::Reviews).await
    }

    pub async fn venue_info(&self) -> ReadResult<Option<VenueInfo>> {
        self.query(Resource::VenueInfo).await
    }

    pub async fn business_contact_info(&self) -> ReadResult<Option<BusinessContactInfo>> {
        self.query(Resource::BusinessContactInfo).await
    }

    pub async fn is_stripe_configured(&self) -> ReadResult<bool> {
        self.query(Resource::StripeConfigured).await
    }

    pub async fn admin_invitations(&self) -> ReadResult<Vec<AdminInvitation>> {
        self.query(Resource::AdminInvitations).await
    }

    pub async fn my_notifications(&self) -> ReadResult<Vec<Notification>> {
        self.query(Resource::MyNotifications).await
    }

    pub async fn unread_notification_count(&self) -> ReadResult<u64> {
        self.query(Resource::UnreadNotificationCount).await
    }
}

#[cfg(test)]
mod tests {
    use pitchside_api_types::Principal;
    use url::Url;

    use super::*;
    use crate::cache::{CacheConfig, CacheKey};
    use crate::rpc::memory::MemoryBackend;

    fn access(session: Session) -> DataAccess {
        DataAccess::new(
            CacheConfig::default(),
            Arc::new(session),
            Url::parse("https://club.example/").unwrap(),
        )
    }

    #[tokio::test]
    async fn initializing_session_is_pending_without_rpc() {
        let access = access(Session::new());

        assert!(access.products().await.unwrap().is_pending());
        assert!(access.my_bookings().await.unwrap().is_pending());
        assert!(access.store().is_empty());
    }

    #[tokio::test]
    async fn anonymous_caller_gets_empty_caller_scoped_reads() {
        let backend = MemoryBackend::new();
        let access = access(Session::ready(backend.client(None), None));

        assert_eq!(access.my_bookings().await.unwrap(), QueryState::Ready(Vec::new()));
        assert_eq!(access.unread_notification_count().await.unwrap(), QueryState::Ready(0));
        assert_eq!(access.caller_user_profile().await.unwrap(), QueryState::Ready(None));
        assert_eq!(backend.total_calls(), 0);
        assert!(access.store().get(&CacheKey::new(Resource::MyBookings)).is_none());
    }

    #[tokio::test]
    async fn public_reads_hit_backend_once() {
        let backend = MemoryBackend::new();
        let access = access(Session::ready(backend.client(None), None));

        access.products().await.unwrap();
        access.products().await.unwrap();
        assert_eq!(backend.calls("get_products"), 1);
    }

    #[tokio::test]
    async fn admin_check_failure_reads_as_false() {
        let backend = MemoryBackend::new();
        let user = Principal::new("user-1");
        backend.fail_next("is_caller_admin", RpcError::rejected("boom"));
        let access = access(Session::ready(backend.client(Some(user.clone())), Some(user)));

        assert_eq!(access.is_caller_admin().await.unwrap(), QueryState::Ready(false));
    }

    #[tokio::test]
    async fn every_resource_loader_matches_its_accessor_type() {
        let backend = MemoryBackend::new();
        let admin = Principal::new("admin");
        backend.grant_admin(&admin);
        let access = access(Session::ready(backend.client(Some(admin.clone())), Some(admin)));

        access.caller_user_profile().await.unwrap();
        access.is_caller_admin().await.unwrap();
        access.membership_tiers().await.unwrap();
        access.points_categories().await.unwrap();
        access.points_guide().await.unwrap();
        access.award_points_for_promotional_bookings().await.unwrap();
        access.leaderboard().await.unwrap();
        access.my_bookings().await.unwrap();
        access.available_time_slots().await.unwrap();
        access.all_time_slots().await.unwrap();
        access.products().await.unwrap();
        access.my_orders().await.unwrap();
        access.reviews().await.unwrap();
        access.venue_info().await.unwrap();
        access.business_contact_info().await.unwrap();
        access.is_stripe_configured().await.unwrap();
        access.admin_invitations().await.unwrap();
        access.my_notifications().await.unwrap();
        access.unread_notification_count().await.unwrap();

        assert_eq!(access.store().len(), Resource::ALL.len());
    }
}
