pub mod movie;
pub mod outcome;
pub mod page;
pub mod seed;
