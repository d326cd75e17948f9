//! Maps structured selections onto the service's tag vocabulary.
//!
//! Each output field is resolved by walking its category predicates in a
//! fixed priority order. Within one predicate, categories are visited in
//! key order. The first selection whose value appears in the predicate's
//! lookup table wins; unresolved fields take the defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default style tag.
pub const DEFAULT_STYLE: &str = "anime";
/// Default pose tag.
pub const DEFAULT_POSE: &str = "standing";
/// Default camera tag.
pub const DEFAULT_CAMERA: &str = "full-body";
/// Default lighting tag.
pub const DEFAULT_LIGHTING: &str = "natural";

/// One chosen option per category key. Absent key means unselected.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredSelections(BTreeMap<String, String>);

impl StructuredSelections {
    /// Empty selection set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Select `value` for `category`, replacing any previous choice.
    /// Returns the replaced value.
    pub fn select(&mut self, category: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(category.into(), value.into())
    }

    /// Unselect a category.
    pub fn deselect(&mut self, category: &str) -> Option<String> {
        self.0.remove(category)
    }

    /// Chosen value for a category.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&str> {
        self.0.get(category).map(String::as_str)
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of selected categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Remove every selection.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterate `(category, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StructuredSelections {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Tag vocabulary understood by the generation service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GenerationTags {
    /// Rendering style.
    pub style: String,
    /// Character pose.
    pub pose: String,
    /// Camera framing.
    pub camera: String,
    /// Lighting setup.
    pub lighting: String,
}

impl Default for GenerationTags {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
            pose: DEFAULT_POSE.to_string(),
            camera: DEFAULT_CAMERA.to_string(),
            lighting: DEFAULT_LIGHTING.to_string(),
        }
    }
}

type LookupTable = &'static [(&'static str, &'static str)];

/// A category-key test paired with the table used when it matches.
struct Rule {
    matches: fn(&str) -> bool,
    table: LookupTable,
}

const IDENTITY_STYLES: LookupTable = &[
    ("日本人", "anime"),
    ("アジア人", "anime"),
    ("欧米人", "realistic"),
    ("ハーフ", "semi-realistic"),
    ("エルフ", "fantasy"),
];

const CLOTHING_STYLES: LookupTable = &[
    ("ファンタジー", "fantasy"),
    ("SF", "sci-fi"),
    ("制服", "anime"),
    ("和服", "anime"),
    ("カジュアル", "realistic"),
    ("スーツ", "realistic"),
];

const POSES: LookupTable = &[
    ("立ち", "standing"),
    ("座り", "sitting"),
    ("歩き", "walking"),
    ("走り", "running"),
    ("戦闘", "action"),
    ("剣を構える", "action"),
];

const CAMERAS: LookupTable = &[
    ("全身", "full-body"),
    ("上半身", "upper-body"),
    ("バストアップ", "bust-up"),
    ("顔アップ", "close-up"),
    ("俯瞰", "high-angle"),
];

fn is_identity_category(key: &str) -> bool {
    key.contains("ethnicity") || key.contains("identity")
}

fn is_clothing_category(key: &str) -> bool {
    key.contains("clothing")
}

fn is_pose_category(key: &str) -> bool {
    key.contains("pose")
}

fn is_composition_category(key: &str) -> bool {
    key.contains("composition")
}

/// Identity outranks clothing for the style field.
const STYLE_RULES: &[Rule] = &[
    Rule {
        matches: is_identity_category,
        table: IDENTITY_STYLES,
    },
    Rule {
        matches: is_clothing_category,
        table: CLOTHING_STYLES,
    },
];

const POSE_RULES: &[Rule] = &[Rule {
    matches: is_pose_category,
    table: POSES,
}];

const CAMERA_RULES: &[Rule] = &[Rule {
    matches: is_composition_category,
    table: CAMERAS,
}];

fn lookup(table: LookupTable, value: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(option, _)| *option == value)
        .map(|(_, tag)| *tag)
}

fn resolve(selections: &StructuredSelections, rules: &[Rule]) -> Option<&'static str> {
    rules.iter().find_map(|rule| {
        selections
            .iter()
            .filter(|(key, _)| (rule.matches)(key))
            .find_map(|(_, value)| lookup(rule.table, value))
    })
}

/// Map selections to generation tags. Pure; unknown values fall through to
/// the defaults.
#[must_use]
pub fn map_selections(selections: &StructuredSelections) -> GenerationTags {
    GenerationTags {
        style: resolve(selections, STYLE_RULES)
            .unwrap_or(DEFAULT_STYLE)
            .to_string(),
        pose: resolve(selections, POSE_RULES)
            .unwrap_or(DEFAULT_POSE)
            .to_string(),
        camera: resolve(selections, CAMERA_RULES)
            .unwrap_or(DEFAULT_CAMERA)
            .to_string(),
        lighting: DEFAULT_LIGHTING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_defaults() {
        let tags = map_selections(&StructuredSelections::new());
        assert_eq!(
            tags,
            GenerationTags {
                style: "anime".to_string(),
                pose: "standing".to_string(),
                camera: "full-body".to_string(),
                lighting: "natural".to_string(),
            }
        );
    }

    #[test]
    fn test_identity_wins_over_clothing() {
        let selections: StructuredSelections =
            [("basic-ethnicity", "日本人"), ("clothing-theme", "SF")]
                .into_iter()
                .collect();
        assert_eq!(map_selections(&selections).style, "anime");

        let reversed: StructuredSelections =
            [("clothing-theme", "SF"), ("basic-ethnicity", "日本人")]
                .into_iter()
                .collect();
        assert_eq!(map_selections(&reversed).style, "anime");
    }

    #[test]
    fn test_unmatched_identity_falls_to_clothing() {
        let selections: StructuredSelections =
            [("basic-ethnicity", "未知"), ("clothing-theme", "SF")]
                .into_iter()
                .collect();
        assert_eq!(map_selections(&selections).style, "sci-fi");
    }

    #[test]
    fn test_pose_and_composition_share_category() {
        let mut selections = StructuredSelections::new();
        selections.select("pose-composition", "上半身");
        let tags = map_selections(&selections);
        assert_eq!(tags.camera, "upper-body");
        assert_eq!(tags.pose, DEFAULT_POSE);

        selections.select("pose-composition", "座り");
        let tags = map_selections(&selections);
        assert_eq!(tags.pose, "sitting");
        assert_eq!(tags.camera, DEFAULT_CAMERA);
    }

    #[test]
    fn test_select_replaces_previous_value() {
        let mut selections = StructuredSelections::new();
        assert_eq!(selections.select("clothing-theme", "SF"), None);
        assert_eq!(
            selections.select("clothing-theme", "制服"),
            Some("SF".to_string())
        );
        assert_eq!(selections.len(), 1);
        assert_eq!(selections.get("clothing-theme"), Some("制服"));
    }

    #[test]
    fn test_unknown_values_use_defaults() {
        let selections: StructuredSelections = [("mood", "happy"), ("pose", "逆立ち")]
            .into_iter()
            .collect();
        assert_eq!(map_selections(&selections), GenerationTags::default());
    }
}
