pub mod api;
mod gauge;
pub mod server;
mod state;

pub use gauge::GaugeView;
pub use server::run_server;
pub use state::AppState;
