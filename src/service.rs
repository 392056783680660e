use diesel::Connection;
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, Config, StateMachine};

use crate::db::{DbConnection, DbPool};
use crate::error::AppError;
use crate::models::{
    parse_price, Category, DishFilter, DishForm, DishWithIngredients, IndexQuery, NewDish,
};
use crate::query;
use crate::storage::DiskStorage;

type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

/// The five dish operations. Every method blocks on the database and the
/// upload directory, so handlers call them through `web::block`.
pub struct DishService {
    pool: DbPool,
    storage: DiskStorage,
    circuit_breaker: CircuitBreakerType,
    max_image_bytes: usize,
}

impl DishService {
    pub fn new(pool: DbPool, storage: DiskStorage, max_image_bytes: usize) -> Self {
        DishService {
            pool,
            storage,
            circuit_breaker: Config::new().build(),
            max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn create(&self, form: DishForm) -> Result<i32, AppError> {
        let draft = form.into_draft()?;
        self.with_connection(|conn| {
            if query::find_dish_by_title(conn, &draft.title)?.is_some() {
                return Err(AppError::duplicate_title());
            }
            let category: Category = draft.category.parse()?;
            let price = parse_price(&draft.price)?;

            let image = draft
                .image
                .as_ref()
                .map(|image| self.storage.save(image))
                .transpose()?;

            let created = conn.transaction::<_, AppError, _>(|| {
                let dish_id = query::insert_dish(
                    conn,
                    &NewDish {
                        title: &draft.title,
                        description: &draft.description,
                        category: category.as_str(),
                        price,
                        image: image.as_deref(),
                    },
                )?;
                query::insert_ingredients(conn, dish_id, &draft.ingredients)?;
                Ok(dish_id)
            });
            if created.is_err() {
                if let Some(stored) = &image {
                    self.discard(stored);
                }
            }
            let dish_id = created?;
            log::info!(
                "dish {} '{}' created with {} ingredient(s)",
                dish_id,
                draft.title,
                draft.ingredients.len()
            );
            Ok(dish_id)
        })
    }

    pub fn update(&self, id: i32, form: DishForm) -> Result<(), AppError> {
        let patch = form.into_patch()?;
        self.with_connection(|conn| {
            let mut dish = query::find_dish(conn, id)?.ok_or_else(|| AppError::dish_not_found(id))?;
            let previous_image = dish.image.clone();

            let new_image = patch
                .image
                .as_ref()
                .map(|image| self.storage.save(image))
                .transpose()?;
            dish.merge(&patch);
            if new_image.is_some() {
                dish.image = new_image.clone();
            }

            let updated = conn.transaction::<_, AppError, _>(|| {
                query::update_dish(conn, &dish)?;
                if let Some(names) = &patch.ingredients {
                    query::replace_ingredients(conn, id, names)?;
                }
                Ok(())
            });
            match (&updated, &new_image) {
                (Err(_), Some(stored)) => self.discard(stored),
                (Ok(()), Some(_)) => {
                    if let Some(old) = &previous_image {
                        self.discard(old);
                    }
                }
                _ => {}
            }
            updated?;
            log::info!("dish {} updated", id);
            Ok(())
        })
    }

    pub fn show(&self, id: i32) -> Result<DishWithIngredients, AppError> {
        self.with_connection(|conn| {
            let dish = query::find_dish(conn, id)?.ok_or_else(|| AppError::dish_not_found(id))?;
            let ingredients = query::find_ingredients(conn, id)?;
            Ok(DishWithIngredients { dish, ingredients })
        })
    }

    pub fn index(&self, params: IndexQuery) -> Result<Vec<DishWithIngredients>, AppError> {
        let filter = DishFilter::from(params);
        self.with_connection(|conn| {
            let dishes = query::search_dishes(conn, &filter)?;
            let ids: Vec<i32> = dishes.iter().map(|dish| dish.id).collect();
            let mut grouped = query::ingredients_by_dish(conn, &ids)?;
            Ok(dishes
                .into_iter()
                .map(|dish| DishWithIngredients {
                    ingredients: grouped.remove(&dish.id).unwrap_or_default(),
                    dish,
                })
                .collect())
        })
    }

    pub fn delete(&self, id: i32) -> Result<(), AppError> {
        self.with_connection(|conn| {
            let image = conn.transaction::<_, AppError, _>(|| {
                let dish = query::find_dish(conn, id)?.ok_or_else(|| AppError::dish_not_found(id))?;
                query::delete_ingredients(conn, id)?;
                query::delete_dish(conn, id)?;
                Ok(dish.image)
            })?;
            if let Some(stored) = &image {
                self.discard(stored);
            }
            log::info!("dish {} deleted", id);
            Ok(())
        })
    }

    /// Checks out a pooled connection and runs `f` behind the circuit
    /// breaker. Only store failures are counted against it.
    fn with_connection<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&DbConnection) -> Result<T, AppError>,
    {
        let result = self.circuit_breaker.call_with(
            |err: &AppError| err.is_outage(),
            || {
                let conn = self.pool.get()?;
                f(&*conn)
            },
        );
        match result {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(err)) => Err(err),
            Err(failsafe::Error::Rejected) => {
                log::warn!("circuit breaker open, rejecting dish store call");
                Err(AppError::Unavailable)
            }
        }
    }

    fn discard(&self, stored: &str) {
        if let Err(err) = self.storage.delete(stored) {
            log::warn!("could not remove image {}: {}", stored, err);
        }
    }
}
