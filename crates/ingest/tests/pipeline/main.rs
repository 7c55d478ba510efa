mod forecast_pipeline;
mod helpers;
mod history_pipeline;
