use crate::{
    entity::sea_orm_active_enums::ReturnStatus,
    error::{AppError, AppResult},
};

/// Requested returns are approved or rejected; only approved ones are refunded.
pub fn check_return_transition(from: ReturnStatus, to: ReturnStatus) -> AppResult<()> {
    use ReturnStatus::*;

    let allowed = from == to
        || matches!(
            (from, to),
            (Requested, Approved) | (Requested, Rejected) | (Approved, Refunded)
        );
    if allowed {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "return request cannot move from {} to {}",
            from.as_str(),
            to.as_str()
        )))
    }
}
