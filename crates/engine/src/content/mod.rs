mod compiler;
mod database;
mod discovery;
mod types;

pub use compiler::{
    compile_def_database, compile_defs_from_str, ContentCompileError, ContentErrorCode,
    SourceLocation,
};
pub use database::{
    ActorArchetype, ActorDefId, DefDatabase, LevelDef, LevelDefId, StartZoneDef, ZoneBox,
};
pub use types::{ContentDiscoveryError, ContentRequest};
