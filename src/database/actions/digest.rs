use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres};

use crate::constants::DIGEST_WINDOW_DAYS;
use crate::error::Error;
use crate::schema::{Recipe, User, Uuid};

pub async fn recent_recipes_by_author(
    author_id: Uuid,
    since: DateTime<Utc>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, Error> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = $1 AND pub_date >= $2 ORDER BY id",
    )
    .bind(author_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Letter body listing fresh recipes; the mail sender is an external
/// collaborator.
pub fn format_digest(first_name: &str, recipes: &[Recipe], base_url: &str) -> String {
    let mut body = format!(
        "Добрый день, {first_name}. Новые рецепты от авторов, на которых вы подписаны: \n"
    );
    for recipe in recipes {
        body.push_str(&format!("{} - {}/recipes/{}\n", recipe.name, base_url, recipe.id));
    }

    body
}

/// For every user with at least one subscription, collects recipes their
/// authors published in the last week and formats the digest body. Users
/// whose authors published nothing are skipped.
pub async fn weekly_digest(
    base_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<(User, String)>, Error> {
    let since = Utc::now() - Duration::days(DIGEST_WINDOW_DAYS);

    let subscribers: Vec<User> = sqlx::query_as(
        "
        SELECT DISTINCT u.*
        FROM users u
        INNER JOIN user_subscriptions s ON s.user_id = u.id
        ORDER BY u.id
    ",
    )
    .fetch_all(pool)
    .await?;

    let mut digests = Vec::new();
    for subscriber in subscribers {
        let authors: Vec<(Uuid,)> =
            sqlx::query_as("SELECT author_id FROM user_subscriptions WHERE user_id = $1 ORDER BY author_id")
                .bind(subscriber.id)
                .fetch_all(pool)
                .await?;

        let mut recipes = Vec::new();
        for (author_id,) in authors {
            recipes.extend(recent_recipes_by_author(author_id, since, pool).await?);
        }

        if !recipes.is_empty() {
            let body = format_digest(&subscriber.first_name, &recipes, base_url);
            digests.push((subscriber, body));
        }
    }

    Ok(digests)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: Uuid, name: &str) -> Recipe {
        Recipe {
            id,
            author_id: 1,
            name: name.to_string(),
            image: "recipes/test.png".to_string(),
            text: String::new(),
            cooking_time: 1,
            pub_date: Utc::now(),
        }
    }

    #[test]
    fn digest_body_lists_recipe_links() {
        let recipes = vec![recipe(4, "test_recipe")];
        let body = format_digest("Анна", &recipes, "http://158.160.0.123");

        assert_eq!(
            body,
            "Добрый день, Анна. Новые рецепты от авторов, на которых вы подписаны: \n\
             test_recipe - http://158.160.0.123/recipes/4\n"
        );
    }

    #[test]
    fn digest_body_without_recipes_is_just_the_greeting() {
        let body = format_digest("Анна", &[], "http://localhost");
        assert!(body.ends_with(": \n"));
        assert_eq!(body.lines().count(), 1);
    }
}
