pub mod creative;
pub mod errors;
pub mod events;
pub mod ids;
pub mod media;
pub mod model;
pub mod parser;
pub mod tracking;
