pub mod cache;
pub mod details;
pub mod wanikani;
