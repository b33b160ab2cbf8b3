pub mod customers;
pub mod email;
pub mod http;
pub mod notifications;

pub use customers::{InMemoryCustomerRecordStore, PgCustomerRecordStore};
pub use email::{LogEmailSender, SmtpEmailSender};
pub use http::ReqwestHttpClient;
pub use notifications::{InMemoryNotificationStore, PgNotificationStore};
