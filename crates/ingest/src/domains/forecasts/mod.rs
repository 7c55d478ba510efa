mod convert_forecast;
mod forecast_service;

pub use convert_forecast::*;
pub use forecast_service::*;
