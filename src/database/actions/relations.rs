use sqlx::{Pool, Postgres};

use crate::constants::SUBSCRIPTION_COUNT_PER_PAGE;
use crate::error::{unique_conflict, Error};
use crate::pagination::PageContext;
use crate::schema::{RecipeSummary, SubscriptionView, User, UserRow, Uuid};

use super::{recipes, users};

pub async fn is_favorite(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM user_favorites WHERE recipe_id = $1 AND user_id = $2",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

pub async fn is_in_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM user_shopping_cart WHERE recipe_id = $1 AND user_id = $2",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

pub async fn is_subscribed(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM user_subscriptions WHERE user_id = $1 AND author_id = $2",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// Adds a recipe to the user's favorites. Not idempotent: a second add for
/// the same pair is a conflict.
pub async fn add_to_favorites(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    let recipe = recipes::get_recipe(recipe_id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;

    let result = sqlx::query(
        "INSERT INTO user_favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| unique_conflict(e, "recipe is already in favorites"))?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict("recipe is already in favorites".to_string()));
    }

    log::info!("user {user_id} favorited recipe {recipe_id}");

    Ok(RecipeSummary::from(&recipe))
}

/// Not idempotent either: removing a pair that is not there is an error.
pub async fn remove_from_favorites(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    recipes::get_recipe(recipe_id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;

    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Absence("recipe is not in favorites".to_string()));
    }

    Ok(())
}

pub async fn add_to_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    let recipe = recipes::get_recipe(recipe_id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;

    let result = sqlx::query(
        "INSERT INTO user_shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| unique_conflict(e, "recipe is already in the shopping cart"))?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(
            "recipe is already in the shopping cart".to_string(),
        ));
    }

    log::info!("user {user_id} added recipe {recipe_id} to the shopping cart");

    Ok(RecipeSummary::from(&recipe))
}

pub async fn remove_from_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    recipes::get_recipe(recipe_id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;

    let result = sqlx::query("DELETE FROM user_shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Absence(
            "recipe is not in the shopping cart".to_string(),
        ));
    }

    Ok(())
}

/// Subscribes `user_id` to `author_id`. Self-subscription is rejected before
/// any write.
pub async fn subscribe(
    author_id: Uuid,
    user_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    let author = users::get_user_by_id(pool, author_id)
        .await?
        .ok_or(Error::not_found("user"))?;

    if author.id == user_id {
        return Err(Error::Conflict("you cannot subscribe to yourself".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO user_subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| unique_conflict(e, "you are already subscribed to this author"))?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(
            "you are already subscribed to this author".to_string(),
        ));
    }

    log::info!("user {user_id} subscribed to author {author_id}");

    subscription_view(&author, user_id, recipes_limit, pool).await
}

pub async fn unsubscribe(
    author_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    users::get_user_by_id(pool, author_id)
        .await?
        .ok_or(Error::not_found("user"))?;

    let result = sqlx::query("DELETE FROM user_subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Absence(
            "you are not subscribed to this author".to_string(),
        ));
    }

    Ok(())
}

/// All authors the user follows, each with a condensed recipe listing.
pub async fn fetch_subscriptions(
    user_id: Uuid,
    recipes_limit: Option<i64>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM user_subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let author = User::from(row);
        views.push(subscription_view(&author, user_id, recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(
        views,
        total_count,
        SUBSCRIPTION_COUNT_PER_PAGE,
        offset,
    ))
}

async fn subscription_view(
    author: &User,
    user_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    let recipes: Vec<RecipeSummary> = match recipes_limit {
        Some(limit) => {
            sqlx::query_as(
                "
                SELECT id, name, image, cooking_time FROM recipes
                WHERE author_id = $1 ORDER BY id DESC LIMIT $2
            ",
            )
            .bind(author.id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "
                SELECT id, name, image, cooking_time FROM recipes
                WHERE author_id = $1 ORDER BY id DESC
            ",
            )
            .bind(author.id)
            .fetch_all(pool)
            .await?
        }
    };

    let recipes_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author.id)
        .fetch_one(pool)
        .await?;

    let is_subscribed = is_subscribed(user_id, author.id, pool).await?;

    Ok(SubscriptionView {
        email: author.email.clone(),
        id: author.id,
        username: author.username.clone(),
        first_name: author.first_name.clone(),
        last_name: author.last_name.clone(),
        is_subscribed,
        recipes,
        recipes_count: recipes_count.0,
    })
}
