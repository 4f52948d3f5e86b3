pub mod users;

pub use users::Entity as Users;
pub use users::UserStatus;

/// User account record, shared by every `UserStore` implementation
pub type User = users::Model;
