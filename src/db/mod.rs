pub mod ai_preferences;
pub mod children;
pub mod profiles;
pub mod session_notes;
pub mod sessions;
pub mod settings;
pub mod users;

pub use ai_preferences::*;
pub use children::*;
pub use profiles::*;
pub use session_notes::*;
pub use sessions::*;
pub use settings::*;
pub use users::*;
