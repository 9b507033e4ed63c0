pub mod calendar;
pub mod channels;
pub mod dispatcher;
pub mod eligibility;
pub mod fanout;
pub mod init;
pub mod interest;
pub mod notifications;
pub mod retention;
pub mod scheduler;

#[cfg(test)]
pub mod test_support;
