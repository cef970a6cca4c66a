use indexmap::IndexMap;
use serde::{Serialize, Serializer};

pub const DEFAULT_AVATAR_URL: &str =
    "https://upload.wikimedia.org/wikipedia/commons/thumb/b/bc/Unknown_person.jpg/434px-Unknown_person.jpg";

pub const DEFAULT_ALLERGY_OPTIONS: [&str; 23] = [
    "Nuts",
    "Dairy",
    "Gluten",
    "Seafood",
    "Soy",
    "Eggs",
    "Sesame",
    "Corn",
    "Mustard",
    "Celery",
    "Sulfites",
    "Legumes",
    "Nightshades",
    "Chocolate",
    "Alcohol",
    "Caffeine",
    "Pork",
    "Red Meat",
    "Garlic",
    "Onion",
    "Spices",
    "Lupin",
    "Poppy seeds",
];

/// Insertion-ordered set of allergy names, unique case-insensitively.
/// The first spelling inserted is the one displayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllergySet {
    entries: IndexMap<String, String>,
}

impl AllergySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for blanks and duplicates.
    pub fn insert(&mut self, name: &str) -> bool {
        let display = name.trim();
        if display.is_empty() {
            return false;
        }
        let key = display.to_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, display.to_string());
        true
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.insert(name.as_ref());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.values().cloned().collect()
    }

    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllergySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AllergySet::new();
        set.extend(iter);
        set
    }
}

impl Serialize for AllergySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// The user's profile; lives for the whole session and survives resets.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub name: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub allergies: AllergySet,
    pub allergy_options: AllergySet,
    pub setup_complete: bool,
    /// Last description the inference model answered for.
    #[serde(skip)]
    pub analyzed_description: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            avatar: None,
            allergies: AllergySet::new(),
            allergy_options: DEFAULT_ALLERGY_OPTIONS.iter().collect(),
            setup_complete: false,
            analyzed_description: None,
        }
    }
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() { "Guest" } else { name }
    }

    pub fn avatar_url(&self) -> &str {
        self.avatar
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_AVATAR_URL)
    }

    /// Replace the selection. Selected names are also offered as options.
    pub fn select_allergies<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selected: AllergySet = names.into_iter().collect();
        self.allergy_options.extend(selected.iter());
        self.allergies = selected;
    }

    /// Add inferred allergens to both the options and the selection.
    pub fn add_inferred(&mut self, inferred: &[String]) {
        self.allergy_options.extend(inferred);
        self.allergies.extend(inferred);
    }

    /// Sidebar card text.
    pub fn summary(&self) -> String {
        let allergies = if self.allergies.is_empty() {
            "None selected".to_string()
        } else {
            self.allergies.joined()
        };
        format!("## {}\n⚠️ **Allergies:** {}", self.display_name(), allergies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allergy_set_keeps_first_spelling_and_order() {
        let set: AllergySet = ["Nuts", "dairy", "nuts", " Dairy ", "", "Shrimp"]
            .into_iter()
            .collect();
        assert_eq!(set.to_vec(), vec!["Nuts", "dairy", "Shrimp"]);
        assert!(set.contains("NUTS"));
    }

    #[test]
    fn test_default_profile_has_catalogue() {
        let profile = UserProfile::default();
        assert_eq!(profile.allergy_options.len(), 23);
        assert!(profile.allergies.is_empty());
        assert_eq!(profile.display_name(), "Guest");
        assert_eq!(profile.avatar_url(), DEFAULT_AVATAR_URL);
    }

    #[test]
    fn test_inferred_allergens_join_options_and_selection() {
        let mut profile = UserProfile::default();
        profile.select_allergies(["Gluten"]);
        profile.add_inferred(&["wheat".to_string(), "gluten".to_string(), "shrimp".to_string()]);
        assert_eq!(profile.allergies.to_vec(), vec!["Gluten", "wheat", "shrimp"]);
        assert_eq!(profile.allergy_options.len(), 25);
    }

    #[test]
    fn test_summary_without_allergies() {
        let profile = UserProfile {
            name: "Ada".to_string(),
            ..Default::default()
        };
        assert!(profile.summary().contains("## Ada"));
        assert!(profile.summary().contains("None selected"));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let set: AllergySet = ["Soy", "Eggs"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["Soy","Eggs"]"#);
    }
}
