use std::{process, sync::Arc};

use pitchside::{
    cache::{CacheConfig, FetchError, Resource, table},
    config::{self, LoadError},
    domain::{DomainError, loyalty, schedule},
    hooks::{DataAccess, MutationError, QueryState},
    infra::{error::InfraError, telemetry},
    rpc::{Session, memory::MemoryBackend},
};
use pitchside_api_types::{
    MembershipTier, NANOS_PER_MINUTE, PointsCategory, Principal, TimeSlot, UserProfile,
};
use thiserror::Error;
use time::{OffsetDateTime, Time};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const DEMO_MEMBER: &str = "member-1";
const DEMO_SESSION_HOURS: i64 = 2;

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("read failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("mutation failed: {0}")]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    Demo(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Some(config::Command::Table(_)) => {
            print!("{}", table::render());
            Ok(())
        }
        Some(config::Command::Demo(_)) | None => run_demo(settings).await,
    }
}

/// Book a session as a member and show the cache following along.
async fn run_demo(settings: config::Settings) -> Result<(), AppError> {
    let backend = seed_backend()?;
    let member = Principal::new(DEMO_MEMBER);

    let access = DataAccess::new(
        CacheConfig::from(&settings.cache),
        Arc::new(Session::ready(backend.client(None), None)),
        settings.backend.checkout_base.clone(),
    );
    let janitor = access.spawn_janitor();

    let visible = ready(access.available_time_slots().await?)?;
    let anonymous_bookings = ready(access.my_bookings().await?)?;
    println!(
        "anonymous: {} open slots, {} bookings",
        visible.len(),
        anonymous_bookings.len()
    );

    access.sign_in(backend.client(Some(member.clone())), member.clone());
    let pollers = access.start_polling();
    let _slots = access.observe(Resource::AvailableTimeSlots);
    let _bookings = access.observe(Resource::MyBookings);

    let profile = ready(access.caller_user_profile().await?)?;
    let tiers = ready(access.membership_tiers().await?)?;
    let categories = ready(access.points_categories().await?)?;
    let award = ready(access.award_points_for_promotional_bookings().await?)?;
    let preview = loyalty::points_for_booking(award, profile.as_ref(), &tiers, &categories);

    let slots = ready(access.available_time_slots().await?)?;
    let Some(slot) = slots.first() else {
        return Err(AppError::Demo("no open slots to book".to_string()));
    };
    let label = schedule::format_slot(slot.start_time)?;
    println!("booking {label} (worth {preview} points)");

    let booking_id = access.create_booking(slot.start_time).await?;
    info!(booking_id = %booking_id, "Demo booking created");

    let slots = ready(access.available_time_slots().await?)?;
    let bookings = ready(access.my_bookings().await?)?;
    let unread = ready(access.unread_notification_count().await?)?;
    let points = ready(access.caller_user_profile().await?)?
        .map_or(0, |profile| profile.loyalty_points);
    println!(
        "after booking: {} open slots, {} bookings, {unread} unread, {points} points",
        slots.len(),
        bookings.len()
    );

    access.mark_all_notifications_as_read().await?;
    let unread = ready(access.unread_notification_count().await?)?;
    println!("after mark-all-read: {unread} unread");

    access.sign_out(backend.client(None));
    println!(
        "signed out: {} cached reads, {} backend calls",
        access.store().len(),
        backend.total_calls()
    );

    drop(pollers);
    janitor.abort();
    Ok(())
}

fn seed_backend() -> Result<MemoryBackend, AppError> {
    let backend = MemoryBackend::new();
    let member = Principal::new(DEMO_MEMBER);

    backend.seed_profile(
        &member,
        UserProfile {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            loyalty_points: 0,
            membership_id: "m-1".to_string(),
            membership_tier: "gold".to_string(),
        },
    );
    backend.seed_tier(MembershipTier {
        id: "gold".to_string(),
        name: "Gold".to_string(),
        description: "Priority nets and double points".to_string(),
        benefits: vec!["Priority booking".to_string()],
        monthly_fee: 2_000,
        reward_multiplier: 2,
    });
    backend.seed_category(PointsCategory {
        id: "booking".to_string(),
        multiplier: 1,
        name: "Bookings".to_string(),
        kind: "activity".to_string(),
        description: "Points for every session booked".to_string(),
    });
    backend.set_award_promotional(true);

    let opening = OffsetDateTime::now_utc()
        .replace_time(Time::MIDNIGHT)
        .unix_timestamp_nanos();
    let start = i64::try_from(opening)
        .map_err(|_| AppError::Demo("current date is out of range".to_string()))?
        + 10 * 60 * NANOS_PER_MINUTE;
    let end = start + DEMO_SESSION_HOURS * 60 * NANOS_PER_MINUTE;

    for start_time in schedule::generate_slots(start, end, schedule::DEFAULT_SLOT_MINUTES)? {
        backend.seed_slot(TimeSlot {
            start_time,
            duration: schedule::DEFAULT_SLOT_MINUTES,
            is_live: true,
            is_enabled: true,
        });
    }

    Ok(backend)
}

fn ready<T>(state: QueryState<T>) -> Result<T, AppError> {
    state
        .ready()
        .ok_or_else(|| AppError::Demo("backend client is not ready".to_string()))
}
