pub mod authentication;
pub mod ownership;
pub mod session;
pub mod user;

pub use authentication::*;
pub use ownership::*;
pub use session::*;
pub use user::*;
