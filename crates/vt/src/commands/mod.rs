pub mod list;
pub mod providers;
pub mod ps;
pub mod start;
pub mod status;
pub mod stop;
pub mod validate;
