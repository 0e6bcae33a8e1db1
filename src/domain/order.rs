use crate::{
    entity::sea_orm_active_enums::OrderStatus,
    error::{AppError, AppResult},
};

fn rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Processing => 1,
        OrderStatus::Shipped => 2,
        OrderStatus::Delivered => 3,
        OrderStatus::Cancelled => 4,
    }
}

pub fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled)
}

/// Fulfilment only moves forward. Cancelled is reachable from every state
/// before Delivered, and nothing leaves Delivered or Cancelled.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    if is_terminal(from) {
        return false;
    }
    match to {
        OrderStatus::Cancelled => true,
        _ => rank(to) > rank(from),
    }
}

/// Same-status updates are accepted as no-ops.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> AppResult<()> {
    if from == to || can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}
