//! End-to-end cache behavior through the public data-access layer.
//!
//! Every test drives `DataAccess` against the in-memory backend and checks
//! what reaches the backend and what the cache serves afterwards.

use std::sync::Arc;
use std::time::Duration;

use pitchside::cache::{CacheConfig, CacheKey, EntryStatus, KeyPattern, Mutation, Resource};
use pitchside::hooks::{DataAccess, QueryState};
use pitchside::rpc::memory::MemoryBackend;
use pitchside::rpc::{RpcError, Session};
use pitchside_api_types::{
    MembershipTier, NANOS_PER_MINUTE, Principal, Product, TimeSlot, UserProfile, VenueInfo,
};
use tokio::time::Instant;
use url::Url;

const MEMBER: &str = "member-1";
const ADMIN: &str = "admin-1";
const FIRST_SLOT: i64 = 1_767_621_600 * 1_000_000_000;

fn checkout_base() -> Url {
    Url::parse("https://club.example/").unwrap()
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.grant_admin(&Principal::new(ADMIN));
    backend.seed_profile(
        &Principal::new(MEMBER),
        UserProfile {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            loyalty_points: 0,
            membership_id: "m-1".to_string(),
            membership_tier: "standard".to_string(),
        },
    );
    for offset in 0..3 {
        backend.seed_slot(TimeSlot {
            start_time: FIRST_SLOT + offset * 30 * NANOS_PER_MINUTE,
            duration: 30,
            is_live: true,
            is_enabled: true,
        });
    }
    backend
}

fn signed_in(backend: &MemoryBackend, name: &str) -> DataAccess {
    let principal = Principal::new(name);
    DataAccess::new(
        CacheConfig::default(),
        Arc::new(Session::ready(
            backend.client(Some(principal.clone())),
            Some(principal),
        )),
        checkout_base(),
    )
}

fn anonymous(backend: &MemoryBackend) -> DataAccess {
    DataAccess::new(
        CacheConfig::default(),
        Arc::new(Session::ready(backend.client(None), None)),
        checkout_base(),
    )
}

fn ready<T>(state: QueryState<T>) -> T {
    state.ready().expect("session is ready")
}

fn gold_tier() -> MembershipTier {
    MembershipTier {
        id: "gold".to_string(),
        name: "Gold".to_string(),
        description: String::new(),
        benefits: Vec::new(),
        monthly_fee: 2_000,
        reward_multiplier: 2,
    }
}

fn assert_stale(access: &DataAccess, resources: &[Resource]) {
    for resource in resources {
        let entry = access
            .store()
            .get(&CacheKey::new(*resource))
            .expect("read was cached");
        assert_eq!(entry.status, EntryStatus::Stale, "{resource} is not stale");
    }
}

#[tokio::test]
async fn booking_refreshes_every_dependent_read() {
    let backend = backend();
    let access = signed_in(&backend, MEMBER);

    assert_eq!(ready(access.available_time_slots().await.unwrap()).len(), 3);
    assert!(ready(access.my_bookings().await.unwrap()).is_empty());
    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 0);
    let before = ready(access.caller_user_profile().await.unwrap()).unwrap();
    assert_eq!(before.loyalty_points, 0);

    access.create_booking(FIRST_SLOT).await.unwrap();

    for resource in [
        Resource::MyBookings,
        Resource::AvailableTimeSlots,
        Resource::UnreadNotificationCount,
        Resource::CurrentUserProfile,
    ] {
        let entry = access.store().get(&CacheKey::new(resource)).unwrap();
        assert_eq!(entry.status, EntryStatus::Stale, "{resource} not stale");
    }

    let slots = ready(access.available_time_slots().await.unwrap());
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|slot| slot.start_time != FIRST_SLOT));

    let bookings = ready(access.my_bookings().await.unwrap());
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].time_slot, FIRST_SLOT);

    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 1);
    let after = ready(access.caller_user_profile().await.unwrap()).unwrap();
    assert_eq!(after.loyalty_points, 10);

    assert_eq!(backend.calls("get_my_bookings"), 2);
    assert_eq!(backend.calls("get_available_time_slots"), 2);
}

#[tokio::test]
async fn mark_all_read_zeroes_unread_count() {
    let backend = backend();
    let access = signed_in(&backend, MEMBER);
    let member = Principal::new(MEMBER);
    backend.notify(&member, "Nets resurfaced");
    backend.notify(&member, "Ground closed Sunday");

    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 2);
    assert_eq!(ready(access.my_notifications().await.unwrap()).len(), 2);

    access.mark_all_notifications_as_read().await.unwrap();

    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 0);
    let notifications = ready(access.my_notifications().await.unwrap());
    assert!(notifications.iter().all(|notification| notification.read));
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_share_one_load() {
    let backend = backend();
    backend.set_latency(Duration::from_millis(100));
    let access = anonymous(&backend);

    let (first, second, third) = tokio::join!(
        access.products(),
        access.products(),
        access.products()
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert!(third.is_ok());
    assert_eq!(backend.calls("get_products"), 1);
}

#[tokio::test]
async fn repeated_invalidation_costs_one_load() {
    let backend = backend();
    let access = anonymous(&backend);
    access.products().await.unwrap();

    let pattern = KeyPattern::Resource(Resource::Products);
    assert_eq!(access.store().invalidate(&pattern), 1);
    assert_eq!(access.store().invalidate(&pattern), 1);

    access.products().await.unwrap();
    access.products().await.unwrap();
    assert_eq!(backend.calls("get_products"), 2);
}

#[tokio::test]
async fn signed_out_caller_scoped_reads_are_empty() {
    let backend = backend();
    let access = anonymous(&backend);

    assert!(ready(access.available_time_slots().await.unwrap()).is_empty());
    assert!(ready(access.my_bookings().await.unwrap()).is_empty());
    assert!(ready(access.my_orders().await.unwrap()).is_empty());
    assert!(ready(access.my_notifications().await.unwrap()).is_empty());
    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 0);
    assert_eq!(ready(access.caller_user_profile().await.unwrap()), None);
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn uninitialized_session_reads_are_pending() {
    let access = DataAccess::new(
        CacheConfig::default(),
        Arc::new(Session::new()),
        checkout_base(),
    );

    assert!(access.products().await.unwrap().is_pending());
    assert!(access.available_time_slots().await.unwrap().is_pending());
}

#[tokio::test]
async fn failed_booking_leaves_cache_as_it_was() {
    let backend = backend();
    let access = signed_in(&backend, MEMBER);
    access.my_bookings().await.unwrap();
    access.available_time_slots().await.unwrap();

    backend.fail_next("create_booking", RpcError::transport("connection reset"));
    assert!(access.create_booking(FIRST_SLOT).await.is_err());
    assert!(!access.is_pending(Mutation::CreateBooking));

    for resource in [Resource::MyBookings, Resource::AvailableTimeSlots] {
        let entry = access.store().get(&CacheKey::new(resource)).unwrap();
        assert_eq!(entry.status, EntryStatus::Idle);
    }
    assert_eq!(ready(access.available_time_slots().await.unwrap()).len(), 3);
    assert_eq!(backend.calls("get_available_time_slots"), 1);
}

#[tokio::test]
async fn duplicate_tier_keeps_cached_tiers() {
    let backend = backend();
    let access = signed_in(&backend, ADMIN);
    let gold = MembershipTier {
        id: "gold".to_string(),
        name: "Gold".to_string(),
        description: String::new(),
        benefits: Vec::new(),
        monthly_fee: 2_000,
        reward_multiplier: 2,
    };
    access.create_membership_tier(gold.clone()).await.unwrap();
    assert_eq!(ready(access.membership_tiers().await.unwrap()), vec![gold.clone()]);

    let err = access.create_membership_tier(gold.clone()).await.unwrap_err();
    assert!(err.is_rejection());

    let entry = access
        .store()
        .get(&CacheKey::new(Resource::MembershipTiers))
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Idle);
    assert_eq!(ready(access.membership_tiers().await.unwrap()), vec![gold]);
    assert_eq!(backend.calls("get_membership_tiers"), 1);
}

#[tokio::test]
async fn rejected_booking_of_taken_slot_is_reported() {
    let backend = backend();
    let first = signed_in(&backend, MEMBER);
    let second = signed_in(&backend, ADMIN);

    first.create_booking(FIRST_SLOT).await.unwrap();
    let err = second.create_booking(FIRST_SLOT).await.unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test(start_paused = true)]
async fn polling_and_invalidation_never_load_concurrently() {
    let backend = backend();
    let latency = Duration::from_millis(50);
    backend.set_latency(latency);
    let access = signed_in(&backend, MEMBER);
    let key = CacheKey::new(Resource::UnreadNotificationCount);
    let started = Instant::now();

    let pollers = access.start_polling();
    assert_eq!(pollers.len(), 2);
    assert_eq!(ready(access.unread_notification_count().await.unwrap()), 0);

    let period = Duration::from_millis(access.config().notification_poll_interval_ms);
    tokio::time::sleep_until(started + period + Duration::from_millis(10)).await;
    assert_eq!(backend.calls("get_unread_notification_count"), 2);

    backend.notify(&Principal::new(MEMBER), "Rain delay");
    access.store().invalidate(&KeyPattern::Exact(key.clone()));

    let read_started = Instant::now();
    let count = ready(access.unread_notification_count().await.unwrap());
    assert_eq!(count, 1);
    assert!(read_started.elapsed() >= latency + Duration::from_millis(40));
    assert_eq!(backend.calls("get_unread_notification_count"), 3);
    assert_eq!(access.store().get(&key).unwrap().status, EntryStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn observed_reads_refetch_eagerly_when_flagged() {
    let backend = backend();
    let access = signed_in(&backend, ADMIN);
    let _tiers = access.observe(Resource::MembershipTiers);
    access.membership_tiers().await.unwrap();

    access
        .create_membership_tier(MembershipTier {
            id: "gold".to_string(),
            name: "Gold".to_string(),
            description: String::new(),
            benefits: Vec::new(),
            monthly_fee: 2_000,
            reward_multiplier: 2,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(backend.calls("get_membership_tiers"), 2);
    let entry = access
        .store()
        .get(&CacheKey::new(Resource::MembershipTiers))
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Idle);
    assert_eq!(entry.value_as::<Vec<MembershipTier>>().unwrap().len(), 1);
}

#[tokio::test]
async fn product_edits_only_touch_product_reads() {
    let backend = backend();
    let access = signed_in(&backend, ADMIN);
    access.products().await.unwrap();
    access.reviews().await.unwrap();

    access
        .add_product(Product {
            id: "bat-1".to_string(),
            name: "Bat".to_string(),
            description: "English willow".to_string(),
            stock: 4,
            category: "equipment".to_string(),
            price: 5_000,
        })
        .await
        .unwrap();

    let store = access.store();
    assert_eq!(
        store.get(&CacheKey::new(Resource::Products)).unwrap().status,
        EntryStatus::Stale
    );
    assert_eq!(
        store.get(&CacheKey::new(Resource::Reviews)).unwrap().status,
        EntryStatus::Idle
    );
    assert_eq!(ready(access.products().await.unwrap()).len(), 1);
}

#[tokio::test]
async fn identity_changes_reset_the_cache() {
    let backend = backend();
    let access = anonymous(&backend);
    access.products().await.unwrap();

    let member = Principal::new(MEMBER);
    access.sign_in(backend.client(Some(member.clone())), member);
    let entry = access.store().get(&CacheKey::new(Resource::Products)).unwrap();
    assert_eq!(entry.status, EntryStatus::Stale);

    access.create_booking(FIRST_SLOT).await.unwrap();
    assert_eq!(ready(access.my_bookings().await.unwrap()).len(), 1);

    access.sign_out(backend.client(None));
    assert!(access.store().is_empty());
    assert!(ready(access.my_bookings().await.unwrap()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn subscriptions_survive_sign_out() {
    let backend = backend();
    let admin = Principal::new(ADMIN);
    let access = signed_in(&backend, ADMIN);
    let key = CacheKey::new(Resource::MembershipTiers);
    let _tiers = access.observe(Resource::MembershipTiers);
    access.membership_tiers().await.unwrap();

    access.sign_out(backend.client(None));
    let entry = access.store().get(&key).unwrap();
    assert_eq!(entry.observers, 1);
    assert!(entry.value.is_none());

    access.sign_in(backend.client(Some(admin.clone())), admin);
    access.create_membership_tier(gold_tier()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(backend.calls("get_membership_tiers"), 2);
    let entry = access.store().get(&key).unwrap();
    assert_eq!(entry.observers, 1);
    assert_eq!(entry.status, EntryStatus::Idle);
    assert_eq!(entry.value_as::<Vec<MembershipTier>>().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_mutations_each_leave_their_reads_stale() {
    const ROUNDS: usize = 50;
    let backend = backend();
    let access = Arc::new(signed_in(&backend, ADMIN));

    let reviews = {
        let access = Arc::clone(&access);
        tokio::spawn(async move {
            for round in 0..ROUNDS {
                access.reviews().await.unwrap();
                access.add_review(5, format!("round {round}")).await.unwrap();
                assert_stale(&access, &[Resource::Reviews]);
            }
        })
    };
    let venue = {
        let access = Arc::clone(&access);
        tokio::spawn(async move {
            for round in 0..ROUNDS {
                access.venue_info().await.unwrap();
                access
                    .update_venue_info(VenueInfo {
                        name: format!("Ground {round}"),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_stale(&access, &[Resource::VenueInfo]);
            }
        })
    };
    let products = {
        let access = Arc::clone(&access);
        tokio::spawn(async move {
            for round in 0..ROUNDS {
                access.products().await.unwrap();
                access
                    .add_product(Product {
                        id: format!("ball-{round}"),
                        name: "Match ball".to_string(),
                        description: String::new(),
                        stock: 1,
                        category: "equipment".to_string(),
                        price: 2_500,
                    })
                    .await
                    .unwrap();
                assert_stale(&access, &[Resource::Products]);
            }
        })
    };
    let notifications = {
        let access = Arc::clone(&access);
        tokio::spawn(async move {
            for _ in 0..ROUNDS {
                access.my_notifications().await.unwrap();
                access.unread_notification_count().await.unwrap();
                access.mark_all_notifications_as_read().await.unwrap();
                assert_stale(
                    &access,
                    &[Resource::MyNotifications, Resource::UnreadNotificationCount],
                );
            }
        })
    };

    for task in [reviews, venue, products, notifications] {
        task.await.unwrap();
    }
    assert_eq!(ready(access.products().await.unwrap()).len(), ROUNDS);
}

#[test]
fn every_mutation_declares_its_reads() {
    for mutation in Mutation::ALL {
        assert!(
            !mutation.rule().invalidates.is_empty(),
            "{mutation} invalidates nothing"
        );
    }

    let booking = Mutation::CreateBooking.rule();
    assert!(booking.invalidates.contains(&Resource::MyBookings));
    assert!(booking.invalidates.contains(&Resource::AvailableTimeSlots));
}
