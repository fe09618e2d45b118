use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::error::Error;
use crate::media::ImageFile;
use crate::schema::Uuid;

/// Recipe image as it arrives at the boundary: either a
/// `data:image/<ext>;base64,<payload>` string or bytes that were uploaded
/// out-of-band.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Encoded(String),
    Raw(Vec<u8>),
}

impl ImageInput {
    pub fn decode(&self) -> Result<ImageFile, Error> {
        match self {
            ImageInput::Encoded(data) if data.starts_with("data:image") => {
                let (header, payload) = data
                    .split_once(";base64,")
                    .ok_or_else(|| Error::validation("image", "expected a base64 data URI"))?;
                let ext = header.rsplit('/').next().unwrap_or("png");
                let content = STANDARD
                    .decode(payload)
                    .map_err(|_| Error::validation("image", "invalid base64 payload"))?;

                Ok(ImageFile::new(ext, content))
            }
            ImageInput::Encoded(_) => {
                Err(Error::validation("image", "unsupported image encoding"))
            }
            ImageInput::Raw(content) => Ok(ImageFile::raw(content.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientPayload {
    pub id: Uuid,
    pub amount: i32,
}

/// Flat write payload for recipe create/update. Tags and ingredients are
/// always replaced wholesale; scalar fields left out of an update keep their
/// stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<RecipeIngredientPayload>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInput>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i32>,
}

impl RecipePayload {
    /// Fails fast on the first violation: cooking time, then amounts, then
    /// repeated ingredient ids.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(cooking_time) = self.cooking_time {
            if cooking_time <= 0 {
                return Err(Error::validation(
                    "cooking_time",
                    "cooking time must be greater than 0",
                ));
            }
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        for ingredient in &self.ingredients {
            if ingredient.amount <= 0 {
                return Err(Error::validation(
                    "ingredients",
                    "ingredient amount must be greater than 0",
                ));
            }
            if !seen.insert(ingredient.id) {
                return Err(Error::validation(
                    "ingredients",
                    "ingredient must not repeat",
                ));
            }
        }

        Ok(())
    }
}
