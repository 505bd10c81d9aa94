pub mod assignment;
pub mod bidding;
pub mod common;
pub mod feedback;
pub mod load;
pub mod offer;
pub mod user;
pub mod vehicle;
