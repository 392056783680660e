use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse};
use futures_util::TryStreamExt;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::{DishForm, IndexQuery, UploadedImage};
use crate::service::DishService;

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(create_dish)
        .service(show_dish)
        .service(list_dishes)
        .service(update_dish)
        .service(delete_dish);
}

#[post("/dishes")]
async fn create_dish(
    user: AuthenticatedUser,
    service: web::Data<DishService>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_dish_form(payload, service.max_image_bytes()).await?;
    let dish_id = web::block(move || service.create(form)).await??;
    log::debug!("user {} created dish {}", user.id, dish_id);
    Ok(HttpResponse::Created().finish())
}

#[get("/dishes/{id}")]
async fn show_dish(
    _user: AuthenticatedUser,
    id: web::Path<i32>,
    service: web::Data<DishService>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let dish = web::block(move || service.show(id)).await??;
    Ok(HttpResponse::Ok().json(dish))
}

#[get("/dishes")]
async fn list_dishes(
    _user: AuthenticatedUser,
    params: web::Query<IndexQuery>,
    service: web::Data<DishService>,
) -> Result<HttpResponse, AppError> {
    let params = params.into_inner();
    let dishes = web::block(move || service.index(params)).await??;
    Ok(HttpResponse::Ok().json(dishes))
}

#[put("/dishes/{id}")]
async fn update_dish(
    user: AuthenticatedUser,
    id: web::Path<i32>,
    service: web::Data<DishService>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let form = read_dish_form(payload, service.max_image_bytes()).await?;
    web::block(move || service.update(id, form)).await??;
    log::debug!("user {} updated dish {}", user.id, id);
    Ok(HttpResponse::Created().finish())
}

#[delete("/dishes/{id}")]
async fn delete_dish(
    user: AuthenticatedUser,
    id: web::Path<i32>,
    service: web::Data<DishService>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    web::block(move || service.delete(id)).await??;
    log::debug!("user {} deleted dish {}", user.id, id);
    Ok(HttpResponse::Ok().finish())
}

/// Drains the multipart stream into a `DishForm`. The image is buffered in
/// memory and capped at `max_image_bytes`.
async fn read_dish_form(mut payload: Multipart, max_image_bytes: usize) -> Result<DishForm, AppError> {
    let mut form = DishForm::default();
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition().clone();
        let name = disposition.get_name().unwrap_or_default().to_string();

        if name == "image" {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.try_next().await? {
                if bytes.len() + chunk.len() > max_image_bytes {
                    return Err(AppError::Validation(format!(
                        "image is larger than {max_image_bytes} bytes"
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            match disposition.get_filename() {
                Some(file_name) if !file_name.is_empty() && !bytes.is_empty() => {
                    form.image = Some(UploadedImage {
                        file_name: file_name.to_string(),
                        bytes,
                    });
                }
                _ => {}
            }
            continue;
        }

        let mut value = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if value.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                return Err(AppError::Validation(format!("field {name} is too long")));
            }
            value.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(value)
            .map_err(|_| AppError::Validation(format!("field {name} is not valid UTF-8")))?;
        form.set_text(&name, value);
    }
    Ok(form)
}
