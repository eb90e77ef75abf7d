//! Input bounds and fixed policy constants.

use crate::model::{Ms, DAY_MS, MINUTE_MS};

/// Fixed booking length at creation time; confirmation may extend it.
pub const DEFAULT_BOOKING_MS: Ms = 30 * MINUTE_MS;

/// Customers may cancel up to this long before the reservation starts.
pub const CANCEL_CUTOFF_MS: Ms = 10 * MINUTE_MS;

/// Total no-show count at which a customer is blocked for the company.
pub const NO_SHOW_BLOCK_THRESHOLD: u64 = 3;

pub const NO_SHOW_BLOCK_REASON: &str = "Did not come 3 times";

/// Reminders fire for reservations starting within this horizon.
pub const REMINDER_HORIZON_MS: Ms = 5 * MINUTE_MS;

pub const REMINDER_SCAN_INTERVAL_SECS: u64 = 30;

/// Storage conflicts from racing bookings are retried this many times
/// before surfacing as SlotAlreadyBooked.
pub const MAX_BOOKING_RETRIES: u32 = 3;

pub const MAX_BASE_SLOTS_PER_REQUEST: usize = 64;
pub const MAX_REPEAT_COUNT: u32 = 104;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_REASON_LEN: usize = 512;

/// A single availability window may not exceed a full day.
pub const MAX_SLOT_DURATION_MS: Ms = DAY_MS;

pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000; // year 2100
