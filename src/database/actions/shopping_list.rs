use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::constants::{SHOPPING_LIST_FOOTER, SHOPPING_LIST_HEADER};
use crate::error::Error;
use crate::schema::{CartIngredientRow, Uuid};

/// One line of the shopping list after merging duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Every ingredient row reachable through the user's cart, in stable
/// association-row order.
pub async fn list_cart_ingredients(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, Error> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM user_shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        ORDER BY c.id, ri.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Merges rows sharing the same (name, measurement unit) pair, summing
/// amounts. Entries keep the order of first encounter.
pub fn aggregate_ingredients(rows: &[CartIngredientRow]) -> Vec<ShoppingListEntry> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut entries: Vec<ShoppingListEntry> = Vec::new();

    for row in rows {
        let key = (row.name.clone(), row.measurement_unit.clone());
        match index.get(&key) {
            Some(&at) => entries[at].amount += row.amount as i64,
            None => {
                index.insert(key, entries.len());
                entries.push(ShoppingListEntry {
                    name: row.name.clone(),
                    measurement_unit: row.measurement_unit.clone(),
                    amount: row.amount as i64,
                });
            }
        }
    }

    entries
}

/// Plain-text report handed to the download endpoint.
pub fn render_shopping_list(entries: &[ShoppingListEntry]) -> String {
    let mut report = String::from(SHOPPING_LIST_HEADER);
    for (n, entry) in entries.iter().enumerate() {
        report.push_str(&format!(
            "{}. {}, {} - {}\n",
            n + 1,
            entry.name,
            entry.measurement_unit,
            entry.amount
        ));
    }
    report.push_str(SHOPPING_LIST_FOOTER);

    report
}

pub async fn download_shopping_list(user_id: Uuid, pool: &Pool<Postgres>) -> Result<String, Error> {
    let rows = list_cart_ingredients(user_id, pool).await?;
    let entries = aggregate_ingredients(&rows);

    Ok(render_shopping_list(&entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn merges_duplicates_across_recipes_in_first_encounter_order() {
        // Recipe 1: flour 200 g, sugar 100 g. Recipe 2: flour 300 g, eggs 2 pcs.
        let rows = vec![
            row("Flour", "g", 200),
            row("Sugar", "g", 100),
            row("Flour", "g", 300),
            row("Eggs", "pcs", 2),
        ];

        let entries = aggregate_ingredients(&rows);

        assert_eq!(
            entries,
            vec![
                ShoppingListEntry {
                    name: "Flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 500,
                },
                ShoppingListEntry {
                    name: "Sugar".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 100,
                },
                ShoppingListEntry {
                    name: "Eggs".to_string(),
                    measurement_unit: "pcs".to_string(),
                    amount: 2,
                },
            ]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let rows = vec![row("Milk", "ml", 200), row("Milk", "g", 50)];
        let entries = aggregate_ingredients(&rows);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn renders_numbered_report_with_header_and_footer() {
        let rows = vec![
            row("Flour", "g", 200),
            row("Sugar", "g", 100),
            row("Flour", "g", 300),
            row("Eggs", "pcs", 2),
        ];
        let report = render_shopping_list(&aggregate_ingredients(&rows));

        assert_eq!(
            report,
            "Список покупок:\n\
             1. Flour, g - 500\n\
             2. Sugar, g - 100\n\
             3. Eggs, pcs - 2\n\
             \n\n Foodgram ©"
        );
    }

    #[test]
    fn empty_cart_renders_header_and_footer_only() {
        let report = render_shopping_list(&[]);
        assert_eq!(report, "Список покупок:\n\n\n Foodgram ©");
    }
}
