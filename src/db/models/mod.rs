//! Database models, one file per table family.

pub mod in_app_notification;
pub mod interest;
pub mod release_notification;

pub use self::in_app_notification::*;
pub use self::interest::*;
pub use self::release_notification::*;
