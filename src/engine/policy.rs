use ulid::Ulid;

use crate::limits::{NO_SHOW_BLOCK_REASON, NO_SHOW_BLOCK_THRESHOLD};
use crate::model::CustomerBlock;

/// Fires once the customer's all-time no-show total reaches the threshold
/// and the company has no block row for them yet.
pub(super) fn should_block(total_no_shows: u64, existing: Option<&CustomerBlock>) -> bool {
    existing.is_none() && total_no_shows >= NO_SHOW_BLOCK_THRESHOLD
}

pub(super) fn block_row(customer_id: Ulid, company_id: Ulid) -> CustomerBlock {
    CustomerBlock {
        id: Ulid::new(),
        company_id,
        customer_id,
        reason: NO_SHOW_BLOCK_REASON.to_string(),
        banned_until: None,
        forever: true,
    }
}
