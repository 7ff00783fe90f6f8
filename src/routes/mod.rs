use actix_web::web;

pub mod destination_image;
pub mod health;
pub mod itinerary;
pub mod modify;
pub mod places;

/// Route tree, shared between the server bootstrap and service tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check)).service(
        web::scope("/api")
            .service(
                web::scope("/itineraries")
                    .route("/generate", web::post().to(itinerary::generate_itinerary))
                    .route("/modify-activity", web::post().to(modify::modify_activity))
                    .route("/modify-day", web::post().to(modify::modify_day)),
            )
            .route("/places", web::get().to(places::autocomplete))
            .route(
                "/destination-image",
                web::get().to(destination_image::destination_image),
            ),
    );
}
