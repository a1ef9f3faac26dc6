mod defaults;
mod load;
mod schema;

pub use defaults::{DEFAULT_AUTHOR, DEFAULT_EMAIL, ENV_PREFIX};
pub use load::load;
pub use schema::Settings;
