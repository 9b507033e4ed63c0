pub mod in_app_notification_repository;
pub mod interest_repository;
pub mod release_notification_repository;

pub use in_app_notification_repository::InAppNotificationRepository;
pub use interest_repository::InterestRepository;
pub use release_notification_repository::ReleaseNotificationRepository;
