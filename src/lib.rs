pub mod aggregate;
pub mod chart;
pub mod dashboard;
pub mod discover;
pub mod load;
pub mod normalize;
