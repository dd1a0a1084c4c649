pub mod emotion;
pub mod utils;
