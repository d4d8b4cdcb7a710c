//! Domain data sources queried by the tools.

pub mod students;
pub mod weather;

pub use students::{StoreError, StudentStore};
pub use weather::WeatherStore;
