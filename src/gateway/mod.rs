pub mod events;
mod hub;
mod session;
mod ws;

pub use hub::Hub;
pub use ws::gateway_ws;
