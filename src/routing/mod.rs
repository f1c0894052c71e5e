//! Route table: compiled `[routes]` entries consulted per request

mod pattern;
mod table;

pub use self::pattern::PathPattern;
pub use self::table::{CorsPolicy, ResolvedRoute, RouteRule, RouteTable};
