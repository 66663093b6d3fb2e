pub mod events;
pub mod member_source;
pub mod members;

pub use member_source::CacheMemberSource;
