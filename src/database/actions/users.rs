use sqlx::{Pool, Postgres};

use crate::error::Error;
use crate::schema::{User, UserView, Uuid, Viewer};

use super::relations::is_subscribed;

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Wire view of a user. `is_subscribed` is relative to the viewer: always
/// false for an anonymous viewer and for the user looking at themselves.
pub async fn get_user_view(
    user: &User,
    viewer: Viewer,
    pool: &Pool<Postgres>,
) -> Result<UserView, Error> {
    let is_subscribed = match viewer.user_id() {
        Some(viewer_id) if viewer_id != user.id => is_subscribed(viewer_id, user.id, pool).await?,
        _ => false,
    };

    Ok(UserView {
        email: user.email.clone(),
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        is_subscribed,
    })
}
