// Agora common library - main library exports

pub mod capped_set;
pub mod crypto;
pub mod hash;
pub mod messages;
pub mod nsect;
pub mod queries;
pub mod rounds;
pub mod types;

// Flattened re-exports
pub use self::hash::BlockId;
pub use self::types::*;
