pub mod prelude;

pub mod shows;
pub mod users;
