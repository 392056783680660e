use std::io;

use actix_web::{middleware, web, App, HttpServer};

use dish_catalog::auth::AuthGate;
use dish_catalog::config::Config;
use dish_catalog::service::DishService;
use dish_catalog::storage::DiskStorage;
use dish_catalog::{db, routes};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    // set up database connection pool
    let pool = db::establish_pool(&config.database_url, config.pool_size).map_err(io::Error::other)?;
    {
        let conn = pool.get().map_err(io::Error::other)?;
        db::create_tables(&conn).map_err(io::Error::other)?;
    }

    let storage = DiskStorage::open(&config.upload_dir)?;
    log::info!("storing dish images in {}", storage.root().display());

    let service = web::Data::new(DishService::new(pool, storage, config.max_image_bytes));
    let auth = web::Data::new(AuthGate::new(&config.auth_secret));

    log::info!("starting HTTP server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(auth.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::config)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    log::info!("server stopped, database pool released");
    Ok(())
}
