pub mod connection;
pub mod schema;
mod quota;
mod tx;
mod user_store;

pub use connection::*;
pub use quota::UserQuota;
pub use user_store::UserStore;
