use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One outbound link; its `position` is scoped to `owner_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub position: i64,
    pub is_active: bool,
    pub clicks: i64,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub icon: Option<String>,
    pub appear_in_slider: bool,
    pub banner_image: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLink {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial edit of a link. Position only moves through reorder.
///
/// Optional columns take three states: an absent field keeps the stored value,
/// `null` clears it and a string replaces it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LinkUpdate {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(url(message = "Invalid URL format"))]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub background_color: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub text_color: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub icon: Option<Option<String>>,
    pub appear_in_slider: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub banner_image: Option<Option<String>>,
}

/// Marks a field that appeared in the body, `null` included
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleActiveRequest {
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_null_apart_from_absent() {
        let update: LinkUpdate = serde_json::from_str(
            r##"{"description": null, "background_color": "#112233", "appear_in_slider": true}"##,
        )
        .unwrap();

        assert_eq!(update.description, Some(None));
        assert_eq!(update.background_color, Some(Some("#112233".to_string())));
        assert_eq!(update.text_color, None);
        assert_eq!(update.banner_image, None);
        assert_eq!(update.appear_in_slider, Some(true));
        assert_eq!(update.title, None);
    }
}
