pub mod connections;
pub mod messages;
pub mod profiles;

pub use connections::{Connection, ConnectionFilter, ConnectionStatus};
pub use messages::{ChatEntry, EntryKey, LocalId, Message, NewMessage, PendingMessage};
pub use profiles::{NewProfile, Profile, ProfileUpdate, parse_skills};
