pub mod assignment;
pub mod bidding;
pub mod catalog;
pub mod feedback;
pub mod matching;
pub mod offers;
pub mod scoring;
pub mod status;

#[cfg(test)]
pub(crate) mod fixtures;
