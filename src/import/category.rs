use crate::common::constants::DEFAULT_CATEGORY_ID;
use crate::common::types::Category;

/// Resolves free-text category input against the known categories.
///
/// Exact name match beats exact id match, which beats substring matches.
/// Among substring matches the category found earliest in the input wins;
/// at equal positions the category listed first wins.
pub fn map_category_to_id(input: &str, categories: &[Category]) -> String {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return DEFAULT_CATEGORY_ID.to_string();
    }

    if let Some(category) = categories.iter().find(|c| c.name.to_lowercase() == needle) {
        return category.id.clone();
    }
    if let Some(category) = categories.iter().find(|c| c.id.to_lowercase() == needle) {
        return category.id.clone();
    }

    categories
        .iter()
        .filter_map(|category| {
            let name = category.name.trim().to_lowercase();
            if name.is_empty() {
                return None;
            }
            needle.find(&name).map(|position| (position, category))
        })
        // min_by_key keeps the first of equal minima
        .min_by_key(|(position, _)| *position)
        .map(|(_, category)| category.id.clone())
        .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("konzert", "Konzert"),
            Category::new("theater", "Theater"),
            Category::new("kinder", "Kinder"),
            Category::new("party", "Party"),
        ]
    }

    #[test]
    fn test_exact_name_and_id() {
        assert_eq!(map_category_to_id("konzert", &categories()), "konzert");
        assert_eq!(map_category_to_id(" PARTY ", &categories()), "party");
    }

    #[test]
    fn test_earliest_substring_wins() {
        assert_eq!(map_category_to_id("Kindertheater", &categories()), "kinder");
        assert_eq!(map_category_to_id("Theater für Kinder", &categories()), "theater");
    }

    #[test]
    fn test_equal_position_prefers_first_listed() {
        let categories = vec![Category::new("kino", "Kino"), Category::new("kinoabend", "Kinoabend")];
        assert_eq!(map_category_to_id("Kinoabende im Park", &categories), "kino");
    }

    #[test]
    fn test_default_fallback() {
        assert_eq!(map_category_to_id("", &categories()), "default");
        assert_eq!(map_category_to_id("unknown", &categories()), "default");
        assert_eq!(map_category_to_id("   ", &[]), "default");
    }
}
