mod link;
mod profile;

pub use link::{Link, LinkUpdate, NewLink, ReorderRequest, ToggleActiveRequest};
pub use profile::{Profile, ProfileUpdate, PublicProfile, SocialLinks};
