mod handlers;
mod models;
mod utils;
mod db;
mod errors;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    // Validate JWT secret
    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    if jwt_secret.is_empty() {
        panic!("JWT_SECRET cannot be empty");
    }

    // Initialize the database pool
    let pool = db::create_pool().await;

    // The public image area must exist before the first upload lands
    let image_dir = utils::storage::image_dir();
    std::fs::create_dir_all(&image_dir)?;

    info!("Serving employee images from {}", image_dir.display());
    info!("Starting server at 127.0.0.1:8080");

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .service(
                web::resource("/v1/employee")
                    .route(web::get().to(handlers::employee::get_employees))
                    .route(web::post().to(handlers::employee::create_employee)),
            )
            .service(
                web::resource("/v1/employee/{id}")
                    .route(web::get().to(handlers::employee::show_employee))
                    .route(web::patch().to(handlers::employee::update_employee))
                    .route(web::delete().to(handlers::employee::delete_employee)),
            )
            .service(
                web::resource("/v1/employee/{id}/edit")
                    .route(web::get().to(handlers::employee::edit_employee)),
            )
            .service(
                web::resource("/v1/department")
                    .route(web::get().to(handlers::department::get_departments)),
            )
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}
