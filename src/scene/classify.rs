//! Mesh-name classification
//!
//! Imported fixture assets arrive as flat mesh lists whose only metadata is
//! the node name. An ordered rule list is evaluated once per mesh at load
//! time into an immutable table; rendering never does string matching again.
//! Rule order carries the priority: exact names first, specific substrings
//! before the generic ones they contain.

use std::collections::HashMap;

use log::debug;

use super::shell::ShellDescriptor;

/// How a rule matches a mesh name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatcher {
    Exact(String),
    Contains(String),
}

impl NameMatcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(id) => name == id,
            NameMatcher::Contains(fragment) => name.contains(fragment.as_str()),
        }
    }
}

/// Which material family a mesh renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Metal,
    Glass,
}

/// The load-time verdict for one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Fixture variant this mesh belongs to, when the rule knows it
    pub variant: Option<usize>,
    /// Shell tag for translucent surfaces
    pub shell: Option<ShellDescriptor>,
    pub material: MaterialKind,
}

impl Classification {
    pub fn metal() -> Self {
        Self {
            variant: None,
            shell: None,
            material: MaterialKind::Metal,
        }
    }

    pub fn glass(shell: ShellDescriptor) -> Self {
        Self {
            variant: None,
            shell: Some(shell),
            material: MaterialKind::Glass,
        }
    }

    pub fn with_variant(mut self, variant: usize) -> Self {
        self.variant = Some(variant);
        self
    }
}

/// One ordered matching rule.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub matcher: NameMatcher,
    pub classification: Classification,
}

impl ClassificationRule {
    pub fn exact(id: impl Into<String>, classification: Classification) -> Self {
        Self {
            matcher: NameMatcher::Exact(id.into()),
            classification,
        }
    }

    pub fn contains(fragment: impl Into<String>, classification: Classification) -> Self {
        Self {
            matcher: NameMatcher::Contains(fragment.into()),
            classification,
        }
    }
}

/// Immutable name-to-classification mapping, built once per asset load.
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    entries: HashMap<String, Classification>,
}

impl ClassificationTable {
    /// Classify every name against the rules, first match wins. Names no rule
    /// matches fall back to plain metal.
    pub fn build<'a>(
        rules: &[ClassificationRule],
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut entries = HashMap::new();
        for name in names {
            let classification = rules
                .iter()
                .find(|rule| rule.matcher.matches(name))
                .map(|rule| rule.classification);
            let classification = classification.unwrap_or_else(|| {
                debug!("mesh {:?} matched no classification rule, treating as metal", name);
                Classification::metal()
            });
            entries.insert(name.to_owned(), classification);
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Classification> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The rule list for the reference chandelier assets: two concentric glass
/// shells split into front and back halves, metal arms and stem.
pub fn chandelier_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::exact("stem", Classification::metal()),
        // Specific fragments before the generic ones they contain.
        ClassificationRule::contains(
            "glass_outer_back",
            Classification::glass(ShellDescriptor::back(1)),
        ),
        ClassificationRule::contains(
            "glass_outer",
            Classification::glass(ShellDescriptor::front(1)),
        ),
        ClassificationRule::contains(
            "glass_inner_back",
            Classification::glass(ShellDescriptor::back(0)),
        ),
        ClassificationRule::contains(
            "glass_inner",
            Classification::glass(ShellDescriptor::front(0)),
        ),
        ClassificationRule::contains("metal", Classification::metal()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            ClassificationRule::contains("glass_outer_back", Classification::glass(ShellDescriptor::back(1))),
            ClassificationRule::contains("glass_outer", Classification::glass(ShellDescriptor::front(1))),
        ];
        let table = ClassificationTable::build(
            &rules,
            ["branch2_glass_outer_back", "branch2_glass_outer"],
        );
        assert_eq!(
            table.get("branch2_glass_outer_back").unwrap().shell,
            Some(ShellDescriptor::back(1))
        );
        assert_eq!(
            table.get("branch2_glass_outer").unwrap().shell,
            Some(ShellDescriptor::front(1))
        );
    }

    #[test]
    fn test_exact_beats_generic_substring() {
        let rules = vec![
            ClassificationRule::exact(
                "stem_glass",
                Classification::glass(ShellDescriptor::front(0)).with_variant(9),
            ),
            ClassificationRule::contains("glass", Classification::glass(ShellDescriptor::front(1))),
        ];
        let table = ClassificationTable::build(&rules, ["stem_glass", "arm_glass"]);
        assert_eq!(table.get("stem_glass").unwrap().variant, Some(9));
        assert_eq!(
            table.get("arm_glass").unwrap().shell,
            Some(ShellDescriptor::front(1))
        );
    }

    #[test]
    fn test_unmatched_defaults_to_metal() {
        let table = ClassificationTable::build(&chandelier_rules(), ["mystery_node"]);
        let c = table.get("mystery_node").unwrap();
        assert_eq!(c.material, MaterialKind::Metal);
        assert_eq!(c.shell, None);
    }

    #[test]
    fn test_chandelier_rules_cover_both_shells() {
        let table = ClassificationTable::build(
            &chandelier_rules(),
            [
                "branch0_glass_inner",
                "branch0_glass_inner_back",
                "branch0_glass_outer",
                "branch0_glass_outer_back",
                "branch0_metal_arm",
                "stem",
            ],
        );
        assert_eq!(table.len(), 6);
        assert_eq!(
            table.get("branch0_glass_inner").unwrap().shell,
            Some(ShellDescriptor::front(0))
        );
        assert_eq!(
            table.get("branch0_glass_outer_back").unwrap().shell,
            Some(ShellDescriptor::back(1))
        );
        assert_eq!(table.get("branch0_metal_arm").unwrap().material, MaterialKind::Metal);
        assert_eq!(table.get("stem").unwrap().material, MaterialKind::Metal);
    }
}
