use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::constants::RECIPE_COUNT_PER_PAGE;
use crate::error::Error;
use crate::filters::RecipeFilter;
use crate::media::MediaStore;
use crate::pagination::PageContext;
use crate::payload::{RecipeIngredientPayload, RecipePayload};
use crate::schema::{
    Recipe, RecipeIngredientView, RecipeRow, RecipeView, Session, Tag, Uuid, Viewer,
};

use super::{relations, users};

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Resolves a recipe for mutation: it must exist and the session must belong
/// to its author or to an admin.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &Session,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;

    if recipe.author_id != session.user_id && !session.is_admin {
        return Err(Error::Unauthorized);
    }

    Ok(recipe)
}

/// Newest-first recipe listing with the composable filter applied.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Viewer,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    filter.apply(&mut builder, viewer);
    builder.push(" ORDER BY r.id DESC LIMIT ");
    builder.push_bind(RECIPE_COUNT_PER_PAGE);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows: Vec<RecipeRow> = builder.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

pub async fn list_recipe_tags(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY rt.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientView>, Error> {
    let list: Vec<RecipeIngredientView> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

/// Assembles the nested read representation for one recipe. Viewer-relative
/// flags are false for an anonymous viewer.
pub async fn get_recipe_view(
    recipe: &Recipe,
    viewer: Viewer,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let author = users::get_user_by_id(pool, recipe.author_id)
        .await?
        .ok_or(Error::not_found("user"))?;
    let author = users::get_user_view(&author, viewer, pool).await?;

    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer.user_id() {
        Some(user_id) => (
            relations::is_favorite(recipe.id, user_id, pool).await?,
            relations::is_in_shopping_cart(recipe.id, user_id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name.clone(),
        image: recipe.image.clone(),
        text: recipe.text.clone(),
        cooking_time: recipe.cooking_time,
    })
}

pub async fn create_recipe(
    payload: &RecipePayload,
    session: &Session,
    media: &dyn MediaStore,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    payload.validate()?;
    let name = payload
        .name
        .as_deref()
        .ok_or_else(|| Error::validation("name", "field is required"))?;
    let text = payload
        .text
        .as_deref()
        .ok_or_else(|| Error::validation("text", "field is required"))?;
    let cooking_time = payload
        .cooking_time
        .ok_or_else(|| Error::validation("cooking_time", "field is required"))?;
    let image = payload
        .image
        .as_ref()
        .ok_or_else(|| Error::validation("image", "field is required"))?
        .decode()?;

    require_tags(&payload.tags, pool).await?;
    require_ingredients(&payload.ingredients, pool).await?;

    let image_path = media.store(&image)?;

    let mut tx = pool.begin().await?;
    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(session.user_id)
    .bind(name)
    .bind(&image_path)
    .bind(text)
    .bind(cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    insert_associations(recipe.id, &payload.tags, &payload.ingredients, &mut tx).await?;
    tx.commit().await?;

    log::info!("user {} published recipe {}", session.user_id, recipe.id);

    get_recipe_view(&recipe, session.viewer(), pool).await
}

/// Replace-strategy update: scalars change only when present in the payload,
/// tag and ingredient associations are deleted and re-inserted as a set,
/// all inside one transaction.
pub async fn update_recipe(
    id: Uuid,
    payload: &RecipePayload,
    session: &Session,
    media: &dyn MediaStore,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    payload.validate()?;

    require_tags(&payload.tags, pool).await?;
    require_ingredients(&payload.ingredients, pool).await?;

    let image_path = match payload.image.as_ref() {
        Some(input) => Some(media.store(&input.decode()?)?),
        None => None,
    };

    let mut tx = pool.begin().await?;
    sqlx::query(
        "
        UPDATE recipes SET
        name = COALESCE($1, name),
        image = COALESCE($2, image),
        text = COALESCE($3, text),
        cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(payload.name.as_deref())
    .bind(image_path.as_deref())
    .bind(payload.text.as_deref())
    .bind(payload.cooking_time)
    .bind(recipe.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tx)
        .await?;
    insert_associations(recipe.id, &payload.tags, &payload.ingredients, &mut tx).await?;

    tx.commit().await.map_err(|e| {
        log::error!("update of recipe {} rolled back: {e}", recipe.id);
        e
    })?;

    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(Error::not_found("recipe"))?;
    get_recipe_view(&recipe, session.viewer(), pool).await
}

pub async fn delete_recipe(id: Uuid, session: &Session, pool: &Pool<Postgres>) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await?;

    log::info!("user {} deleted recipe {}", session.user_id, recipe.id);

    Ok(())
}

async fn require_tags(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<(), Error> {
    let unique: Vec<Uuid> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&unique)
        .fetch_one(pool)
        .await?;

    if found.0 != unique.len() as i64 {
        return Err(Error::not_found("tag"));
    }
    Ok(())
}

async fn require_ingredients(
    ingredients: &[RecipeIngredientPayload],
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let ids: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(pool)
        .await?;

    if found.0 != ids.len() as i64 {
        return Err(Error::not_found("ingredient"));
    }
    Ok(())
}

async fn insert_associations(
    recipe_id: Uuid,
    tags: &[Uuid],
    ingredients: &[RecipeIngredientPayload],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    if !tags.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        builder.push_values(tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        builder.build().execute(&mut **tx).await?;
    }

    if !ingredients.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
        builder.push_values(ingredients.iter(), |mut b, ingredient| {
            b.push_bind(recipe_id)
                .push_bind(ingredient.id)
                .push_bind(ingredient.amount);
        });
        builder.build().execute(&mut **tx).await?;
    }

    Ok(())
}
