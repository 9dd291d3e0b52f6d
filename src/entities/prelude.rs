pub use super::shows::Entity as Shows;
pub use super::users::Entity as Users;
