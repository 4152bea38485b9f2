//! Time slot arithmetic for the availability console and booking screens.

use pitchside_api_types::{Booking, NANOS_PER_MINUTE, Time};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use super::DomainError;

/// Default slot length in minutes.
pub const DEFAULT_SLOT_MINUTES: u64 = 30;

/// Minutes added by one booking extension.
pub const EXTENSION_MINUTES: u64 = 15;

/// Most slots one call may generate: a fortnight of 15-minute slots.
pub const MAX_GENERATED_SLOTS: usize = 14 * 24 * 4;

const SLOT_LABEL_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [month repr:short] [day padding:none] [hour]:[minute]"
);

/// Slot start times covering `[start, end)` every `step_minutes`.
///
/// Ranges needing more than [`MAX_GENERATED_SLOTS`] slots are rejected.
pub fn generate_slots(start: Time, end: Time, step_minutes: u64) -> Result<Vec<Time>, DomainError> {
    if end <= start {
        return Err(DomainError::validation("end time must be after start time"));
    }
    let step = minutes_to_nanos(step_minutes)?;
    if step == 0 {
        return Err(DomainError::validation("slot length must be positive"));
    }

    let span = i128::from(end) - i128::from(start);
    let step_wide = i128::from(step);
    let count = (span + step_wide - 1) / step_wide;
    if count > MAX_GENERATED_SLOTS as i128 {
        return Err(DomainError::validation(format!(
            "range needs {count} slots; at most {MAX_GENERATED_SLOTS} can be generated at once"
        )));
    }

    let mut slots = Vec::with_capacity(count as usize);
    let mut current = start;
    while current < end {
        slots.push(current);
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(slots)
}

/// Label such as `Mon, Jan 5 14:30` (UTC).
pub fn format_slot(time: Time) -> Result<String, DomainError> {
    let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(time))
        .map_err(|err| DomainError::validation(format!("timestamp out of range: {err}")))?;
    at.format(SLOT_LABEL_FORMAT)
        .map_err(|err| DomainError::validation(format!("cannot format slot time: {err}")))
}

/// End of `booking` after one extension, given the slot length it was booked with.
pub fn extension_end(booking: &Booking, slot_minutes: u64) -> Result<Time, DomainError> {
    let length = minutes_to_nanos(slot_minutes.saturating_add(EXTENSION_MINUTES))?;
    booking
        .time_slot
        .checked_add(length)
        .ok_or_else(|| DomainError::validation("extended booking ends out of range"))
}

fn minutes_to_nanos(minutes: u64) -> Result<Time, DomainError> {
    Time::try_from(minutes)
        .ok()
        .and_then(|minutes| minutes.checked_mul(NANOS_PER_MINUTE))
        .ok_or_else(|| DomainError::validation(format!("{minutes} minutes is out of range")))
}
