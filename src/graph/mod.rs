pub mod client;
pub mod insights;
pub mod params;
