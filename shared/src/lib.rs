pub mod entities;
pub mod combat;
pub mod items;
pub mod messages;

pub use entities::*;
pub use combat::*;
pub use items::*;
pub use messages::*;
