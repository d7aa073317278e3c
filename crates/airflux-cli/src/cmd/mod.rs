pub mod new;
pub mod start;
pub mod stop;
pub mod versions;
