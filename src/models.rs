use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::schema::{dishes, ingredients};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Meals,
    Desserts,
    Drinks,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Meals => "meals",
            Category::Desserts => "desserts",
            Category::Drinks => "drinks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meals" => Ok(Category::Meals),
            "desserts" => Ok(Category::Desserts),
            "drinks" => Ok(Category::Drinks),
            _ => Err(AppError::Validation("invalid category".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct Dish {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub image: Option<String>,
}

impl Dish {
    /// Field-level coalesce: whatever the patch carries wins, the rest stays.
    pub(crate) fn merge(&mut self, patch: &DishPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(category) = patch.category {
            self.category = category.as_str().to_string();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
    }
}

#[derive(Insertable)]
#[table_name = "dishes"]
pub(crate) struct NewDish<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub price: f64,
    pub image: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct Ingredient {
    pub id: i32,
    pub dish_id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[table_name = "ingredients"]
pub(crate) struct NewIngredient<'a> {
    pub dish_id: i32,
    pub name: &'a str,
}

/// A dish as returned to clients: the row plus its ingredient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishWithIngredients {
    #[serde(flatten)]
    pub dish: Dish,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Raw multipart fields, collected before any validation happens.
#[derive(Debug, Default)]
pub struct DishForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub image: Option<UploadedImage>,
}

impl DishForm {
    /// Records one text field. Repeated `ingredients` fields accumulate, so a
    /// single value and a one-element list end up the same.
    pub fn set_text(&mut self, name: &str, value: String) {
        if name == "ingredients" || name == "ingredients[]" {
            self.ingredients.get_or_insert_with(Vec::new).push(value);
            return;
        }
        if value.is_empty() {
            return;
        }
        match name {
            "title" => self.title = Some(value),
            "description" => self.description = Some(value),
            "category" => self.category = Some(value),
            "price" => self.price = Some(value),
            _ => log::debug!("ignoring unknown form field {name}"),
        }
    }

    pub(crate) fn into_draft(self) -> Result<DishDraft, AppError> {
        let ingredients = self.ingredients.map(normalize_ingredients);
        match (
            self.title,
            self.description,
            self.category,
            self.price,
            ingredients,
        ) {
            (Some(title), Some(description), Some(category), Some(price), Some(ingredients))
                if !ingredients.is_empty() =>
            {
                Ok(DishDraft {
                    title,
                    description,
                    category,
                    price,
                    ingredients,
                    image: self.image,
                })
            }
            _ => Err(AppError::missing_fields()),
        }
    }

    pub(crate) fn into_patch(self) -> Result<DishPatch, AppError> {
        let category = self.category.as_deref().map(str::parse::<Category>).transpose()?;
        let price = self.price.as_deref().map(parse_price).transpose()?;
        let ingredients = match self.ingredients.map(normalize_ingredients) {
            Some(list) if list.is_empty() => {
                return Err(AppError::Validation(
                    "a dish needs at least one ingredient".to_string(),
                ))
            }
            other => other,
        };
        Ok(DishPatch {
            title: self.title,
            description: self.description,
            category,
            price,
            ingredients,
            image: self.image,
        })
    }
}

/// A create request that passed the presence checks. Category and price are
/// still raw: the duplicate-title check has to run before they are judged.
#[derive(Debug)]
pub(crate) struct DishDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub ingredients: Vec<String>,
    pub image: Option<UploadedImage>,
}

#[derive(Debug, Default)]
pub(crate) struct DishPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<f64>,
    pub ingredients: Option<Vec<String>>,
    pub image: Option<UploadedImage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub title: Option<String>,
    pub ingredients: Option<String>,
    pub category: Option<String>,
}

/// Index filters after boundary normalization. The category is compared
/// verbatim against the stored value, so an unknown one simply matches
/// nothing.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct DishFilter {
    pub title: Option<String>,
    pub ingredients: Vec<String>,
    pub category: Option<String>,
}

impl From<IndexQuery> for DishFilter {
    fn from(query: IndexQuery) -> Self {
        let ingredients = query
            .ingredients
            .map(|csv| csv.split(',').map(str::to_string).collect())
            .map(normalize_ingredients)
            .unwrap_or_default();
        DishFilter {
            title: query.title.filter(|title| !title.is_empty()),
            ingredients,
            category: query.category.filter(|category| !category.is_empty()),
        }
    }
}

pub(crate) fn parse_price(raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::Validation("invalid price".to_string())),
    }
}

fn normalize_ingredients(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
