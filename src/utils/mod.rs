pub mod detached;
pub mod jwt;
