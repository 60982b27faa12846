use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::Link;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub owner_id: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub title_color: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub facebook: Option<String>,
    pub tiktok: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub facebook: Option<String>,
    pub tiktok: Option<String>,
}

/// Full replacement of the editable profile fields.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 160, message = "Bio must be 160 characters or less"))]
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub title_color: Option<String>,
    #[serde(default)]
    pub social: SocialLinks,
}

impl ProfileUpdate {
    /// Social URLs must point at their own platform, empty values are allowed
    pub fn social_errors(&self) -> Vec<String> {
        let checks: [(&Option<String>, &[&str], &str); 6] = [
            (&self.social.facebook, &["facebook.com"], "Facebook"),
            (&self.social.twitter, &["twitter.com", "x.com"], "Twitter/X"),
            (&self.social.instagram, &["instagram.com"], "Instagram"),
            (&self.social.linkedin, &["linkedin.com"], "LinkedIn"),
            (&self.social.tiktok, &["tiktok.com"], "TikTok"),
            (&self.social.youtube, &["youtube.com"], "YouTube"),
        ];

        checks
            .iter()
            .filter_map(|(value, hosts, platform)| match value.as_deref() {
                Some(v) if !v.is_empty() && !hosts.iter().any(|h| v.contains(h)) => {
                    Some(format!("Must be a valid {platform} URL"))
                }
                _ => None,
            })
            .collect()
    }
}

/// What visitors see at `/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub profile: Profile,
    /// Active links in position order
    pub links: Vec<Link>,
    /// Active links flagged for the featured carousel
    pub slider: Vec<Link>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_links_must_match_their_platform() {
        let update = ProfileUpdate {
            username: "ada".into(),
            social: SocialLinks {
                twitter: Some("https://x.com/ada".into()),
                instagram: Some("https://example.com/ada".into()),
                youtube: Some(String::new()),
                ..SocialLinks::default()
            },
            ..ProfileUpdate::default()
        };

        assert_eq!(update.social_errors(), vec!["Must be a valid Instagram URL"]);
    }
}
