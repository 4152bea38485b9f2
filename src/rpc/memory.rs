//! In-memory [`VenueBackend`] used by tests and the demo command.
//!
//! State is shared by every client handed out by one [`MemoryBackend`]; each
//! client acts on behalf of the principal it was built for. Calls are counted
//! per operation and can be made to fail or to take time.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use pitchside_api_types::{
    AdminInvitation, Booking, BusinessContactInfo, InvitationChannels, LeaderboardEntry,
    MembershipTier, Notification, Order, PointsCategory, Principal, Product, Review,
    ShoppingItem, StripeConfiguration, Time, TimeSlot, TimeSlotState, UserProfile, VenueInfo,
};
use time::OffsetDateTime;
use tracing::debug;

use super::{RpcError, RpcResult, VenueBackend};
use crate::cache::lock::lock;

const BOOKING_POINTS: u64 = 10;

#[derive(Default)]
struct Data {
    profiles: HashMap<Principal, UserProfile>,
    admins: HashSet<Principal>,
    slots: BTreeMap<Time, TimeSlot>,
    bookings: Vec<Booking>,
    products: Vec<Product>,
    orders: Vec<Order>,
    tiers: Vec<MembershipTier>,
    categories: Vec<PointsCategory>,
    points_guide: String,
    award_promotional: bool,
    reviews: Vec<Review>,
    notifications: Vec<Notification>,
    venue: Option<VenueInfo>,
    contact: Option<BusinessContactInfo>,
    invitations: Vec<AdminInvitation>,
    stripe: Option<StripeConfiguration>,
}

impl Data {
    fn is_booked(&self, start_time: Time) -> bool {
        self.bookings.iter().any(|b| b.time_slot == start_time)
    }

    fn notify(&mut self, id: String, user: &Principal, kind: &str, message: String) {
        self.notifications.push(Notification {
            id,
            read: false,
            kind: kind.to_string(),
            user: user.clone(),
            message,
            timestamp: now(),
        });
    }

    fn award(&mut self, user: &Principal, points: u64) {
        if let Some(profile) = self.profiles.get_mut(user) {
            profile.loyalty_points += points;
        }
    }
}

#[derive(Default)]
struct State {
    data: Mutex<Data>,
    calls: DashMap<&'static str, usize>,
    failures: DashMap<&'static str, VecDeque<RpcError>>,
    latency_ms: AtomicU64,
    next_id: AtomicU64,
}

/// Shared in-memory backend state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client acting on behalf of `principal` (`None`: anonymous).
    pub fn client(&self, principal: Option<Principal>) -> Arc<dyn VenueBackend> {
        Arc::new(MemoryClient {
            backend: self.clone(),
            principal,
        })
    }

    /// Number of calls made to `op` (the snake_case operation name).
    pub fn calls(&self, op: &str) -> usize {
        self.state.calls.get(op).map(|count| *count).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.calls.iter().map(|entry| *entry.value()).sum()
    }

    /// Make the next call to `op` fail with `err`. Queued failures are used
    /// in order.
    pub fn fail_next(&self, op: &'static str, err: RpcError) {
        self.state.failures.entry(op).or_default().push_back(err);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn grant_admin(&self, principal: &Principal) {
        lock(&self.state.data, "memory.grant_admin")
            .admins
            .insert(principal.clone());
    }

    pub fn seed_profile(&self, principal: &Principal, profile: UserProfile) {
        lock(&self.state.data, "memory.seed_profile")
            .profiles
            .insert(principal.clone(), profile);
    }

    pub fn seed_slot(&self, slot: TimeSlot) {
        lock(&self.state.data, "memory.seed_slot")
            .slots
            .insert(slot.start_time, slot);
    }

    pub fn seed_product(&self, product: Product) {
        lock(&self.state.data, "memory.seed_product")
            .products
            .push(product);
    }

    pub fn seed_tier(&self, tier: MembershipTier) {
        lock(&self.state.data, "memory.seed_tier").tiers.push(tier);
    }

    pub fn seed_category(&self, category: PointsCategory) {
        lock(&self.state.data, "memory.seed_category")
            .categories
            .push(category);
    }

    pub fn seed_venue_info(&self, info: VenueInfo) {
        lock(&self.state.data, "memory.seed_venue_info").venue = Some(info);
    }

    pub fn set_award_promotional(&self, value: bool) {
        lock(&self.state.data, "memory.set_award_promotional").award_promotional = value;
    }

    /// Deliver a notification to `principal`.
    pub fn notify(&self, principal: &Principal, message: impl Into<String>) -> String {
        let id = self.next_id("notification");
        lock(&self.state.data, "memory.notify").notify(
            id.clone(),
            principal,
            "system",
            message.into(),
        );
        id
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    async fn enter(&self, op: &'static str) -> RpcResult<()> {
        *self.state.calls.entry(op).or_insert(0) += 1;

        let latency = Duration::from_millis(self.state.latency_ms.load(Ordering::SeqCst));
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .state
            .failures
            .get_mut(op)
            .and_then(|mut queue| queue.pop_front());
        if let Some(err) = injected {
            debug!(op, error = %err, "Injected backend failure");
            return Err(err);
        }
        Ok(())
    }

    fn data(&self, op: &'static str) -> std::sync::MutexGuard<'_, Data> {
        lock(&self.state.data, op)
    }
}

fn now() -> Time {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as Time
}

fn unauthorized(action: &str) -> RpcError {
    RpcError::rejected(format!("Unauthorized: only admins can {action}"))
}

struct MemoryClient {
    backend: MemoryBackend,
    principal: Option<Principal>,
}

impl MemoryClient {
    fn caller(&self) -> RpcResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| RpcError::rejected("Unauthorized: sign in required"))
    }

    fn require_admin(&self, data: &Data, action: &str) -> RpcResult<()> {
        match &self.principal {
            Some(principal) if data.admins.contains(principal) => Ok(()),
            _ => Err(unauthorized(action)),
        }
    }
}

#[async_trait]
impl VenueBackend for MemoryClient {
    async fn get_caller_user_profile(&self) -> RpcResult<Option<UserProfile>> {
        self.backend.enter("get_caller_user_profile").await?;
        let data = self.backend.data("memory.get_caller_user_profile");
        Ok(self
            .principal
            .as_ref()
            .and_then(|principal| data.profiles.get(principal).cloned()))
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> RpcResult<()> {
        self.backend.enter("save_caller_user_profile").await?;
        let caller = self.caller()?.clone();
        self.backend
            .data("memory.save_caller_user_profile")
            .profiles
            .insert(caller, profile);
        Ok(())
    }

    async fn is_caller_admin(&self) -> RpcResult<bool> {
        self.backend.enter("is_caller_admin").await?;
        let data = self.backend.data("memory.is_caller_admin");
        Ok(self
            .principal
            .as_ref()
            .is_some_and(|principal| data.admins.contains(principal)))
    }

    async fn get_my_bookings(&self) -> RpcResult<Vec<Booking>> {
        self.backend.enter("get_my_bookings").await?;
        let caller = self.caller()?;
        let data = self.backend.data("memory.get_my_bookings");
        Ok(data
            .bookings
            .iter()
            .filter(|booking| &booking.user == caller)
            .cloned()
            .collect())
    }

    async fn get_available_time_slots(&self) -> RpcResult<Vec<TimeSlot>> {
        self.backend.enter("get_available_time_slots").await?;
        let data = self.backend.data("memory.get_available_time_slots");
        Ok(data
            .slots
            .values()
            .filter(|slot| slot.is_enabled && !data.is_booked(slot.start_time))
            .cloned()
            .collect())
    }

    async fn get_all_time_slots(&self) -> RpcResult<Vec<TimeSlot>> {
        self.backend.enter("get_all_time_slots").await?;
        let data = self.backend.data("memory.get_all_time_slots");
        Ok(data.slots.values().cloned().collect())
    }

    async fn create_booking(&self, time_slot: Time) -> RpcResult<String> {
        self.backend.enter("create_booking").await?;
        let caller = self.caller()?.clone();
        let booking_id = self.backend.next_id("booking");
        let notification_id = self.backend.next_id("notification");

        let mut data = self.backend.data("memory.create_booking");
        match data.slots.get(&time_slot) {
            Some(slot) if slot.is_enabled => {}
            _ => return Err(RpcError::rejected("Time slot is not available")),
        }
        if data.is_booked(time_slot) {
            return Err(RpcError::rejected("Time slot is already booked"));
        }

        data.bookings.push(Booking {
            id: booking_id.clone(),
            status: "confirmed".to_string(),
            created_at: now(),
            user: caller.clone(),
            time_slot,
        });
        data.award(&caller, BOOKING_POINTS);
        data.notify(
            notification_id,
            &caller,
            "booking",
            format!("Booking {booking_id} confirmed"),
        );
        Ok(booking_id)
    }

    async fn extend_booking_15_minutes(&self, booking_id: String) -> RpcResult<()> {
        self.backend.enter("extend_booking_15_minutes").await?;
        let caller = self.caller()?.clone();
        let mut data = self.backend.data("memory.extend_booking_15_minutes");
        let booking = data
            .bookings
            .iter_mut()
            .find(|booking| booking.id == booking_id && booking.user == caller)
            .ok_or_else(|| RpcError::rejected("Booking not found"))?;
        booking.status = "extended".to_string();
        Ok(())
    }

    async fn create_time_slot(&self, start_time: Time, duration: u64) -> RpcResult<()> {
        self.backend.enter("create_time_slot").await?;
        let mut data = self.backend.data("memory.create_time_slot");
        self.require_admin(&data, "create time slots")?;
        if data.slots.contains_key(&start_time) {
            return Err(RpcError::rejected("Time slot already exists"));
        }
        data.slots.insert(
            start_time,
            TimeSlot {
                start_time,
                duration,
                is_live: false,
                is_enabled: true,
            },
        );
        Ok(())
    }

    async fn toggle_time_slot_availability(&self, start_time: Time) -> RpcResult<()> {
        self.backend.enter("toggle_time_slot_availability").await?;
        let mut data = self.backend.data("memory.toggle_time_slot_availability");
        self.require_admin(&data, "change slot availability")?;
        let slot = data
            .slots
            .get_mut(&start_time)
            .ok_or_else(|| RpcError::rejected("Time slot not found"))?;
        slot.is_enabled = !slot.is_enabled;
        Ok(())
    }

    async fn toggle_time_slot_live_status(&self, start_time: Time) -> RpcResult<()> {
        self.backend.enter("toggle_time_slot_live_status").await?;
        let mut data = self.backend.data("memory.toggle_time_slot_live_status");
        self.require_admin(&data, "change slot status")?;
        let slot = data
            .slots
            .get_mut(&start_time)
            .ok_or_else(|| RpcError::rejected("Time slot not found"))?;
        slot.is_live = !slot.is_live;
        Ok(())
    }

    async fn bulk_set_time_slot_states(&self, states: Vec<TimeSlotState>) -> RpcResult<()> {
        self.backend.enter("bulk_set_time_slot_states").await?;
        let mut data = self.backend.data("memory.bulk_set_time_slot_states");
        self.require_admin(&data, "change slot states")?;
        for (start_time, is_enabled, is_live) in states {
            if let Some(slot) = data.slots.get_mut(&start_time) {
                slot.is_enabled = is_enabled;
                slot.is_live = is_live;
            }
        }
        Ok(())
    }

    async fn get_products(&self) -> RpcResult<Vec<Product>> {
        self.backend.enter("get_products").await?;
        Ok(self.backend.data("memory.get_products").products.clone())
    }

    async fn add_product(&self, product: Product) -> RpcResult<()> {
        self.backend.enter("add_product").await?;
        let mut data = self.backend.data("memory.add_product");
        self.require_admin(&data, "add products")?;
        if data.products.iter().any(|p| p.id == product.id) {
            return Err(RpcError::rejected(format!(
                "Product {} already exists",
                product.id
            )));
        }
        data.products.push(product);
        Ok(())
    }

    async fn update_product(&self, product: Product) -> RpcResult<()> {
        self.backend.enter("update_product").await?;
        let mut data = self.backend.data("memory.update_product");
        self.require_admin(&data, "update products")?;
        let existing = data
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| RpcError::rejected("Product not found"))?;
        *existing = product;
        Ok(())
    }

    async fn delete_product(&self, product_id: String) -> RpcResult<()> {
        self.backend.enter("delete_product").await?;
        let mut data = self.backend.data("memory.delete_product");
        self.require_admin(&data, "delete products")?;
        let before = data.products.len();
        data.products.retain(|p| p.id != product_id);
        if data.products.len() == before {
            return Err(RpcError::rejected("Product not found"));
        }
        Ok(())
    }

    async fn get_my_orders(&self) -> RpcResult<Vec<Order>> {
        self.backend.enter("get_my_orders").await?;
        let caller = self.caller()?;
        let data = self.backend.data("memory.get_my_orders");
        Ok(data
            .orders
            .iter()
            .filter(|order| &order.user == caller)
            .cloned()
            .collect())
    }

    async fn create_order(&self, items: Vec<String>, total_amount: u64) -> RpcResult<String> {
        self.backend.enter("create_order").await?;
        let caller = self.caller()?.clone();
        if items.is_empty() {
            return Err(RpcError::rejected("Order has no items"));
        }
        let order_id = self.backend.next_id("order");
        let mut data = self.backend.data("memory.create_order");
        data.orders.push(Order {
            id: order_id.clone(),
            status: "pending".to_string(),
            created_at: now(),
            user: caller.clone(),
            total_amount,
            items,
        });
        data.award(&caller, total_amount / 100);
        Ok(order_id)
    }

    async fn get_membership_tiers(&self) -> RpcResult<Vec<MembershipTier>> {
        self.backend.enter("get_membership_tiers").await?;
        Ok(self.backend.data("memory.get_membership_tiers").tiers.clone())
    }

    async fn create_membership_tier(&self, tier: MembershipTier) -> RpcResult<String> {
        self.backend.enter("create_membership_tier").await?;
        let mut data = self.backend.data("memory.create_membership_tier");
        self.require_admin(&data, "create membership tiers")?;
        if data.tiers.iter().any(|t| t.id == tier.id) {
            return Err(RpcError::rejected(format!("Tier {} already exists", tier.id)));
        }
        let id = tier.id.clone();
        data.tiers.push(tier);
        Ok(id)
    }

    async fn update_membership_tier(&self, tier: MembershipTier) -> RpcResult<()> {
        self.backend.enter("update_membership_tier").await?;
        let mut data = self.backend.data("memory.update_membership_tier");
        self.require_admin(&data, "update membership tiers")?;
        let existing = data
            .tiers
            .iter_mut()
            .find(|t| t.id == tier.id)
            .ok_or_else(|| RpcError::rejected("Tier not found"))?;
        *existing = tier;
        Ok(())
    }

    async fn delete_membership_tier(&self, tier_id: String) -> RpcResult<()> {
        self.backend.enter("delete_membership_tier").await?;
        let mut data = self.backend.data("memory.delete_membership_tier");
        self.require_admin(&data, "delete membership tiers")?;
        data.tiers.retain(|t| t.id != tier_id);
        Ok(())
    }

    async fn get_points_categories(&self) -> RpcResult<Vec<PointsCategory>> {
        self.backend.enter("get_points_categories").await?;
        Ok(self
            .backend
            .data("memory.get_points_categories")
            .categories
            .clone())
    }

    async fn create_points_category(&self, category: PointsCategory) -> RpcResult<String> {
        self.backend.enter("create_points_category").await?;
        let mut data = self.backend.data("memory.create_points_category");
        self.require_admin(&data, "create points categories")?;
        if data.categories.iter().any(|c| c.id == category.id) {
            return Err(RpcError::rejected(format!(
                "Category {} already exists",
                category.id
            )));
        }
        let id = category.id.clone();
        data.categories.push(category);
        Ok(id)
    }

    async fn update_points_category(&self, category: PointsCategory) -> RpcResult<()> {
        self.backend.enter("update_points_category").await?;
        let mut data = self.backend.data("memory.update_points_category");
        self.require_admin(&data, "update points categories")?;
        let existing = data
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| RpcError::rejected("Category not found"))?;
        *existing = category;
        Ok(())
    }

    async fn delete_points_category(&self, category_id: String) -> RpcResult<()> {
        self.backend.enter("delete_points_category").await?;
        let mut data = self.backend.data("memory.delete_points_category");
        self.require_admin(&data, "delete points categories")?;
        data.categories.retain(|c| c.id != category_id);
        Ok(())
    }

    async fn get_points_guide(&self) -> RpcResult<String> {
        self.backend.enter("get_points_guide").await?;
        Ok(self.backend.data("memory.get_points_guide").points_guide.clone())
    }

    async fn update_points_guide(&self, guide: String) -> RpcResult<()> {
        self.backend.enter("update_points_guide").await?;
        let mut data = self.backend.data("memory.update_points_guide");
        self.require_admin(&data, "update the points guide")?;
        data.points_guide = guide;
        Ok(())
    }

    async fn get_award_points_for_promotional_bookings(&self) -> RpcResult<bool> {
        self.backend
            .enter("get_award_points_for_promotional_bookings")
            .await?;
        Ok(self
            .backend
            .data("memory.get_award_points_for_promotional_bookings")
            .award_promotional)
    }

    async fn set_award_points_for_promotional_bookings(&self, value: bool) -> RpcResult<()> {
        self.backend
            .enter("set_award_points_for_promotional_bookings")
            .await?;
        let mut data = self
            .backend
            .data("memory.set_award_points_for_promotional_bookings");
        self.require_admin(&data, "change loyalty settings")?;
        data.award_promotional = value;
        Ok(())
    }

    async fn get_leaderboard(&self) -> RpcResult<Vec<LeaderboardEntry>> {
        self.backend.enter("get_leaderboard").await?;
        let data = self.backend.data("memory.get_leaderboard");
        let mut scores: Vec<(&Principal, u64)> = data
            .profiles
            .iter()
            .map(|(principal, profile)| (principal, profile.loyalty_points))
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        Ok(scores
            .into_iter()
            .enumerate()
            .map(|(index, (user, score))| LeaderboardEntry {
                rank: index as u64 + 1,
                user: user.clone(),
                score,
            })
            .collect())
    }

    async fn get_reviews(&self) -> RpcResult<Vec<Review>> {
        self.backend.enter("get_reviews").await?;
        Ok(self.backend.data("memory.get_reviews").reviews.clone())
    }

    async fn add_review(&self, rating: u8, comment: String) -> RpcResult<String> {
        self.backend.enter("add_review").await?;
        let caller = self.caller()?.clone();
        if !(1..=5).contains(&rating) {
            return Err(RpcError::rejected("Rating must be between 1 and 5"));
        }
        let id = self.backend.next_id("review");
        self.backend.data("memory.add_review").reviews.push(Review {
            id: id.clone(),
            created_at: now(),
            user: caller,
            comment,
            rating,
        });
        Ok(id)
    }

    async fn get_my_notifications(&self) -> RpcResult<Vec<Notification>> {
        self.backend.enter("get_my_notifications").await?;
        let caller = self.caller()?;
        let data = self.backend.data("memory.get_my_notifications");
        Ok(data
            .notifications
            .iter()
            .filter(|n| &n.user == caller)
            .cloned()
            .collect())
    }

    async fn get_unread_notification_count(&self) -> RpcResult<u64> {
        self.backend.enter("get_unread_notification_count").await?;
        let caller = self.caller()?;
        let data = self.backend.data("memory.get_unread_notification_count");
        Ok(data
            .notifications
            .iter()
            .filter(|n| &n.user == caller && !n.read)
            .count() as u64)
    }

    async fn mark_notification_as_read(&self, notification_id: String) -> RpcResult<()> {
        self.backend.enter("mark_notification_as_read").await?;
        let caller = self.caller()?.clone();
        let mut data = self.backend.data("memory.mark_notification_as_read");
        let notification = data
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user == caller)
            .ok_or_else(|| RpcError::rejected("Notification not found"))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_notifications_as_read(&self) -> RpcResult<()> {
        self.backend.enter("mark_all_notifications_as_read").await?;
        let caller = self.caller()?.clone();
        let mut data = self.backend.data("memory.mark_all_notifications_as_read");
        data.notifications
            .iter_mut()
            .filter(|n| n.user == caller)
            .for_each(|n| n.read = true);
        Ok(())
    }

    async fn delete_notification(&self, notification_id: String) -> RpcResult<()> {
        self.backend.enter("delete_notification").await?;
        let caller = self.caller()?.clone();
        let mut data = self.backend.data("memory.delete_notification");
        data.notifications
            .retain(|n| !(n.id == notification_id && n.user == caller));
        Ok(())
    }

    async fn delete_all_notifications(&self) -> RpcResult<()> {
        self.backend.enter("delete_all_notifications").await?;
        let caller = self.caller()?.clone();
        let mut data = self.backend.data("memory.delete_all_notifications");
        data.notifications.retain(|n| n.user != caller);
        Ok(())
    }

    async fn get_venue_info(&self) -> RpcResult<Option<VenueInfo>> {
        self.backend.enter("get_venue_info").await?;
        Ok(self.backend.data("memory.get_venue_info").venue.clone())
    }

    async fn update_venue_info(&self, info: VenueInfo) -> RpcResult<()> {
        self.backend.enter("update_venue_info").await?;
        let mut data = self.backend.data("memory.update_venue_info");
        self.require_admin(&data, "update venue info")?;
        data.venue = Some(info);
        Ok(())
    }

    async fn get_business_contact_info(&self) -> RpcResult<Option<BusinessContactInfo>> {
        self.backend.enter("get_business_contact_info").await?;
        Ok(self
            .backend
            .data("memory.get_business_contact_info")
            .contact
            .clone())
    }

    async fn update_business_contact_info(&self, info: BusinessContactInfo) -> RpcResult<()> {
        self.backend.enter("update_business_contact_info").await?;
        let mut data = self.backend.data("memory.update_business_contact_info");
        self.require_admin(&data, "update contact info")?;
        data.contact = Some(info);
        Ok(())
    }

    async fn get_admin_invitations(&self) -> RpcResult<Vec<AdminInvitation>> {
        self.backend.enter("get_admin_invitations").await?;
        let data = self.backend.data("memory.get_admin_invitations");
        self.require_admin(&data, "list invitations")?;
        Ok(data.invitations.clone())
    }

    async fn create_admin_invitation(&self, channels: InvitationChannels) -> RpcResult<String> {
        self.backend.enter("create_admin_invitation").await?;
        let sent_channels = channels.active();
        if sent_channels.is_empty() {
            return Err(RpcError::rejected("At least one contact channel is required"));
        }
        let id = self.backend.next_id("invitation");
        let mut data = self.backend.data("memory.create_admin_invitation");
        self.require_admin(&data, "invite admins")?;
        data.invitations.push(AdminInvitation {
            invite_link: format!("/admin/invite/{id}"),
            id: id.clone(),
            status: "sent".to_string(),
            created_at: now(),
            whatsapp: channels.whatsapp,
            email: channels.email,
            slack: channels.slack,
            phone: channels.phone,
            sent_channels,
            telegram: channels.telegram,
        });
        Ok(id)
    }

    async fn is_stripe_configured(&self) -> RpcResult<bool> {
        self.backend.enter("is_stripe_configured").await?;
        Ok(self
            .backend
            .data("memory.is_stripe_configured")
            .stripe
            .is_some())
    }

    async fn set_stripe_configuration(&self, config: StripeConfiguration) -> RpcResult<()> {
        self.backend.enter("set_stripe_configuration").await?;
        let mut data = self.backend.data("memory.set_stripe_configuration");
        self.require_admin(&data, "configure payments")?;
        data.stripe = Some(config);
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: String,
        cancel_url: String,
    ) -> RpcResult<String> {
        self.backend.enter("create_checkout_session").await?;
        self.caller()?;
        if self
            .backend
            .data("memory.create_checkout_session")
            .stripe
            .is_none()
        {
            return Err(RpcError::rejected("Stripe is not configured"));
        }
        if items.is_empty() {
            return Err(RpcError::rejected("Checkout has no items"));
        }

        let id = self.backend.next_id("cs");
        let session = serde_json::json!({
            "id": id,
            "url": format!("https://checkout.test/{id}?success={success_url}&cancel={cancel_url}"),
        });
        Ok(session.to_string())
    }
}
