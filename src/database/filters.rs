use sqlx::{Postgres, QueryBuilder};

use crate::schema::{Uuid, Viewer};

/// Ingredient search: case-insensitive match on the start of the name.
#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl IngredientFilter {
    /// ILIKE pattern for the prefix search, with LIKE metacharacters in the
    /// query treated literally.
    pub fn search_pattern(&self) -> Option<String> {
        self.name
            .as_ref()
            .map(|query| format!("{}%", escape_like(query)))
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Recipe listing predicates, AND-combined; every dimension is optional.
/// The viewer-scoped flags are ignored for an anonymous viewer.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    /// Appends the WHERE fragments onto a query that already selects from
    /// `recipes r` and ends in an open `WHERE TRUE`.
    pub(crate) fn apply(&self, builder: &mut QueryBuilder<'_, Postgres>, viewer: Viewer) {
        if !self.tags.is_empty() {
            builder.push(
                " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                 INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug = ANY(",
            );
            builder.push_bind(self.tags.clone());
            builder.push("))");
        }

        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ");
            builder.push_bind(author);
        }

        if let Some(user_id) = viewer.user_id() {
            if self.is_favorited {
                builder.push(
                    " AND r.id IN (SELECT f.recipe_id FROM user_favorites f WHERE f.user_id = ",
                );
                builder.push_bind(user_id);
                builder.push(")");
            }
            if self.is_in_shopping_cart {
                builder.push(
                    " AND r.id IN (SELECT c.recipe_id FROM user_shopping_cart c WHERE c.user_id = ",
                );
                builder.push_bind(user_id);
                builder.push(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(filter: &RecipeFilter, viewer: Viewer) -> String {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");
        filter.apply(&mut builder, viewer);
        builder.sql().to_string()
    }

    #[test]
    fn empty_filter_adds_nothing() {
        let sql = rendered(&RecipeFilter::default(), Viewer::Anonymous);
        assert_eq!(sql, "SELECT r.* FROM recipes r WHERE TRUE");
    }

    #[test]
    fn tags_and_author_compose() {
        let filter = RecipeFilter {
            tags: vec!["breakfast".to_string(), "dinner".to_string()],
            author: Some(7),
            ..Default::default()
        };
        let sql = rendered(&filter, Viewer::Anonymous);
        assert!(sql.contains("t.slug = ANY("));
        assert!(sql.contains("r.author_id = "));
    }

    #[test]
    fn favorited_scopes_to_authenticated_viewer() {
        let filter = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };
        let sql = rendered(&filter, Viewer::User(3));
        assert!(sql.contains("user_favorites"));
    }

    #[test]
    fn viewer_flags_are_noops_for_anonymous() {
        let filter = RecipeFilter {
            is_favorited: true,
            is_in_shopping_cart: true,
            ..Default::default()
        };
        let sql = rendered(&filter, Viewer::Anonymous);
        assert_eq!(sql, "SELECT r.* FROM recipes r WHERE TRUE");
    }

    #[test]
    fn cart_flag_scopes_to_cart_table() {
        let filter = RecipeFilter {
            is_in_shopping_cart: true,
            ..Default::default()
        };
        let sql = rendered(&filter, Viewer::User(3));
        assert!(sql.contains("user_shopping_cart"));
        assert!(!sql.contains("user_favorites"));
    }

    #[test]
    fn prefix_pattern_is_anchored_at_start() {
        let filter = IngredientFilter {
            name: Some("абри".to_string()),
        };
        assert_eq!(filter.search_pattern(), Some("абри%".to_string()));
    }

    #[test]
    fn prefix_pattern_escapes_metacharacters() {
        let filter = IngredientFilter {
            name: Some("50%_sugar".to_string()),
        };
        assert_eq!(filter.search_pattern(), Some("50\\%\\_sugar%".to_string()));
    }

    #[test]
    fn no_query_means_no_pattern() {
        assert_eq!(IngredientFilter::default().search_pattern(), None);
    }
}
