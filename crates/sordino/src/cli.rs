pub mod filter;
pub mod shape;
