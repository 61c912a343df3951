// FormatCatalog - ranking and grouping of renditions
//
// Turns the flat rendition list from an extraction into per-container
// groups for display:
// - Ranking by vertical resolution (stable, highest first)
// - Grouping by container in first-seen order
// - "Best" is the first entry of each group

use serde::{Deserialize, Serialize};

use super::models::Rendition;
use super::resolution::height_of;

/// Renditions sharing one container, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenditionGroup {
    pub container: String,
    pub renditions: Vec<Rendition>,
}

impl RenditionGroup {
    pub fn best(&self) -> Option<&Rendition> {
        self.renditions.first()
    }

    pub fn is_best(&self, index: usize) -> bool {
        is_best(index)
    }
}

/// Grouped view over one extraction's renditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatCatalog {
    groups: Vec<RenditionGroup>,
}

impl FormatCatalog {
    /// Rank then group
    pub fn build(renditions: &[Rendition]) -> Self {
        Self {
            groups: group_by_container(&rank(renditions)),
        }
    }

    pub fn groups(&self) -> &[RenditionGroup] {
        &self.groups
    }

    pub fn group(&self, container: &str) -> Option<&RenditionGroup> {
        self.groups.iter().find(|g| g.container == container)
    }

    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.container.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Stable sort by height, highest first. Ties keep their input order.
pub fn rank(renditions: &[Rendition]) -> Vec<Rendition> {
    let mut ranked = renditions.to_vec();
    // sort_by_key is stable
    ranked.sort_by_key(|r| std::cmp::Reverse(height_of(Some(&r.resolution))));
    ranked
}

/// Groups in first-seen container order; members keep the input order,
/// so callers rank first.
pub fn group_by_container(renditions: &[Rendition]) -> Vec<RenditionGroup> {
    let mut groups: Vec<RenditionGroup> = Vec::new();

    for rendition in renditions {
        match groups.iter_mut().find(|g| g.container == rendition.container) {
            Some(group) => group.renditions.push(rendition.clone()),
            None => groups.push(RenditionGroup {
                container: rendition.container.clone(),
                renditions: vec![rendition.clone()],
            }),
        }
    }

    groups
}

/// Position predicate, not a quality threshold
pub fn is_best(index: usize) -> bool {
    index == 0
}
