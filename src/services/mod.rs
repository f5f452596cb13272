pub mod audit;
pub mod spotify;
