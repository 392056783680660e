use std::collections::{HashMap, HashSet};

use diesel::prelude::*;

use crate::db::DbConnection;
use crate::models::{Dish, DishFilter, Ingredient, NewDish, NewIngredient};
use crate::schema::{dishes, ingredients};

pub(crate) fn find_dish(conn: &DbConnection, dish_id: i32) -> QueryResult<Option<Dish>> {
    dishes::table.find(dish_id).first(conn).optional()
}

pub(crate) fn find_dish_by_title(conn: &DbConnection, title: &str) -> QueryResult<Option<Dish>> {
    dishes::table
        .filter(dishes::title.eq(title))
        .first(conn)
        .optional()
}

/// Inserts the row and reads back its id through the unique title, which
/// works the same on every backend.
pub(crate) fn insert_dish(conn: &DbConnection, dish: &NewDish) -> QueryResult<i32> {
    diesel::insert_into(dishes::table)
        .values(dish)
        .execute(conn)?;
    dishes::table
        .filter(dishes::title.eq(dish.title))
        .select(dishes::id)
        .first(conn)
}

pub(crate) fn update_dish(conn: &DbConnection, dish: &Dish) -> QueryResult<usize> {
    diesel::update(dishes::table.find(dish.id))
        .set((
            dishes::title.eq(&dish.title),
            dishes::description.eq(&dish.description),
            dishes::category.eq(&dish.category),
            dishes::price.eq(dish.price),
            dishes::image.eq(&dish.image),
        ))
        .execute(conn)
}

pub(crate) fn delete_dish(conn: &DbConnection, dish_id: i32) -> QueryResult<usize> {
    diesel::delete(dishes::table.find(dish_id)).execute(conn)
}

pub(crate) fn insert_ingredients(
    conn: &DbConnection,
    dish_id: i32,
    names: &[String],
) -> QueryResult<usize> {
    let rows: Vec<NewIngredient> = names
        .iter()
        .map(|name| NewIngredient { dish_id, name })
        .collect();
    diesel::insert_into(ingredients::table)
        .values(&rows)
        .execute(conn)
}

pub(crate) fn delete_ingredients(conn: &DbConnection, dish_id: i32) -> QueryResult<usize> {
    diesel::delete(ingredients::table.filter(ingredients::dish_id.eq(dish_id))).execute(conn)
}

/// Wholesale replacement; callers run it inside a transaction.
pub(crate) fn replace_ingredients(
    conn: &DbConnection,
    dish_id: i32,
    names: &[String],
) -> QueryResult<usize> {
    delete_ingredients(conn, dish_id)?;
    insert_ingredients(conn, dish_id, names)
}

pub(crate) fn find_ingredients(conn: &DbConnection, dish_id: i32) -> QueryResult<Vec<Ingredient>> {
    ingredients::table
        .filter(ingredients::dish_id.eq(dish_id))
        .order((ingredients::name.asc(), ingredients::id.asc()))
        .load(conn)
}

/// Upper bound on the dish ids bound into a single `IN (...)` list. Older
/// SQLite builds refuse statements with more than 999 variables.
const DISH_IDS_PER_QUERY: usize = 900;

/// Loads the ingredients of all given dishes, grouped per dish. The ids are
/// sent in fixed-size chunks so large catalogs stay under the bind limit.
pub(crate) fn ingredients_by_dish(
    conn: &DbConnection,
    dish_ids: &[i32],
) -> QueryResult<HashMap<i32, Vec<Ingredient>>> {
    let mut grouped: HashMap<i32, Vec<Ingredient>> = HashMap::new();
    for chunk in dish_ids.chunks(DISH_IDS_PER_QUERY) {
        let rows: Vec<Ingredient> = ingredients::table
            .filter(ingredients::dish_id.eq_any(chunk.to_vec()))
            .order((ingredients::name.asc(), ingredients::id.asc()))
            .load(conn)?;
        for row in rows {
            grouped.entry(row.dish_id).or_default().push(row);
        }
    }
    Ok(grouped)
}

/// Escapes the LIKE wildcards so a title filter matches literally.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Dishes matching every filter, ordered by title. With ingredient names in
/// the filter a dish must carry all of them.
pub(crate) fn search_dishes(conn: &DbConnection, filter: &DishFilter) -> QueryResult<Vec<Dish>> {
    let mut query = dishes::table.into_boxed();
    if let Some(title) = &filter.title {
        query = query.filter(dishes::title.like(like_pattern(title)).escape('\\'));
    }
    if let Some(category) = &filter.category {
        query = query.filter(dishes::category.eq(category.clone()));
    }
    let mut found = query.order(dishes::title.asc()).load::<Dish>(conn)?;

    if filter.ingredients.is_empty() || found.is_empty() {
        return Ok(found);
    }

    // Only the wanted names are bound here, never the candidate dish ids.
    let wanted: HashSet<&str> = filter.ingredients.iter().map(String::as_str).collect();
    let matches: Vec<(i32, String)> = ingredients::table
        .filter(ingredients::name.eq_any(filter.ingredients.clone()))
        .select((ingredients::dish_id, ingredients::name))
        .load(conn)?;
    let mut carried: HashMap<i32, HashSet<String>> = HashMap::new();
    for (dish_id, name) in matches {
        carried.entry(dish_id).or_default().insert(name);
    }
    found.retain(|dish| {
        carried.get(&dish.id).map_or(false, |names| {
            wanted.iter().all(|name| names.contains(*name))
        })
    });
    Ok(found)
}
