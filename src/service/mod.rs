//! Controllers: each operation runs in the session it is handed and ends it with
//! exactly one commit or rollback.

mod create;
mod link;
mod single;

pub use create::OwnedCreate;
pub use link::{ChildLink, JoinLink};
pub use single::SingleResource;
