pub mod cors;
pub mod response;
pub mod routes;
pub mod server;

pub use cors::CorsLayer;
pub use routes::{router, AppState};
pub use server::Server;
