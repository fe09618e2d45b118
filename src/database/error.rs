use thiserror::Error as ThisError;

/// Failure taxonomy shared by every action in the crate. Transport layers map
/// variants to status codes through [`Error::code`].
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{entity} with specified id doesn't exist")]
    NotFound { entity: &'static str },

    /// The fact row already exists, or the request contradicts itself
    /// (self-subscription).
    #[error("{0}")]
    Conflict(String),

    /// Removal of a fact row that is not there.
    #[error("{0}")]
    Absence(String),

    #[error("you don't have permission to perform this action")]
    Unauthorized,

    #[error("failed to store media: {0}")]
    Media(#[from] std::io::Error),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str) -> Self {
        Error::NotFound { entity }
    }

    pub fn code(&self) -> u16 {
        match self {
            Error::Validation { .. } | Error::Absence(_) => 400,
            Error::Unauthorized => 403,
            Error::NotFound { .. } => 404,
            Error::Conflict(_) => 409,
            Error::Media(_) | Error::Query(_) => 500,
        }
    }
}

/// Maps a storage-level unique violation onto the "already exists" conflict,
/// so a race past the pre-check still surfaces as [`Error::Conflict`].
pub(crate) fn unique_conflict(e: sqlx::Error, message: &str) -> Error {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return Error::Conflict(message.to_string());
        }
    }
    Error::Query(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(Error::validation("name", "field is required").code(), 400);
        assert_eq!(Error::Absence("not present".into()).code(), 400);
        assert_eq!(Error::Unauthorized.code(), 403);
        assert_eq!(Error::not_found("recipe").code(), 404);
        assert_eq!(Error::Conflict("already added".into()).code(), 409);
        assert_eq!(Error::Query(sqlx::Error::PoolClosed).code(), 500);
    }

    #[test]
    fn validation_message_carries_field() {
        let e = Error::validation("cooking_time", "must be greater than 0");
        assert_eq!(e.to_string(), "cooking_time: must be greater than 0");
    }
}
