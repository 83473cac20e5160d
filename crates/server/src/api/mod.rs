pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod signing;

pub use routes::create_router;
