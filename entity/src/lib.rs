pub mod profiles;
pub mod sessions;
pub mod users;
