mod children;
mod schema;
pub mod utils;

pub use utils::{test_client, test_db};
