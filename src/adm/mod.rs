pub mod result;
pub mod seed;
pub mod users;
