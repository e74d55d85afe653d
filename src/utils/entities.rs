// Entities this tool is allowed to sync. Table identifiers taken from
// configuration must name one of these.
pub const SYNC_ENTITIES: &[&str] = &["Cases"];

pub const STAGING_SUFFIX: &str = "_staging";
