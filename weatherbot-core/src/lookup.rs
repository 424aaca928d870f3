//! HTTP clients for the two upstream lookups the agent can call.

pub mod geocoding;
pub mod openweather;

pub use geocoding::GeocodingClient;
pub use openweather::WeatherClient;
