use crate::error::AppError;
use crate::models::TagList;

/// Gate applied before any mutation of a tag list. Anyone authenticated may
/// add tags to a shared list; only its creator may retire it.
pub fn authorize_tag_list_mutation(tag_list: &TagList, acting_user_id: i64) -> Result<(), AppError> {
    if tag_list.user_id == acting_user_id {
        Ok(())
    } else {
        tracing::warn!(
            tag_list_id = %tag_list.id,
            owner_id = %tag_list.user_id,
            acting_user_id = %acting_user_id,
            "Ownership check failed"
        );
        Err(AppError::Authorization(format!(
            "Only the owner of tag list {} may modify it",
            tag_list.id
        )))
    }
}
