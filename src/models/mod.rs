pub mod catalog;
pub mod cost;
pub mod dates;
pub mod profile;
pub mod stop;
pub mod trip;
