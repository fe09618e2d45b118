pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;

pub const SHOPPING_LIST_HEADER: &str = "Список покупок:\n";
pub const SHOPPING_LIST_FOOTER: &str = "\n\n Foodgram ©";

pub const DIGEST_WINDOW_DAYS: i64 = 7;

/// Subdirectory of the media root that recipe images land in.
pub const MEDIA_RECIPES_DIR: &str = "recipes";
