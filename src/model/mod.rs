pub mod query;
pub mod table;
pub mod validator;

pub use query::*;
pub use table::*;
pub use validator::*;
