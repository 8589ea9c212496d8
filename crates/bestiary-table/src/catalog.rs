use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derives the URL and filesystem safe identifier of an animal name.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        String::from("animal")
    } else {
        slug.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Success,
    Failed,
    Placeholder,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Handle of an [`AnimalEntry`] inside its [`Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimalId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalEntry {
    pub name: String,
    pub slug: String,
    pub source_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjectiveGroup {
    pub adjective: String,
    pub animals: Vec<AnimalId>,
}

/// Adjective groups in table order, all pointing into one arena of distinct animals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    animals: Vec<AnimalEntry>,
    groups: Vec<AdjectiveGroup>,
}

impl Catalog {
    /// Distinct animals, in order of first appearance.
    pub fn animals(&self) -> &[AnimalEntry] {
        &self.animals
    }

    pub fn animal(&self, id: AnimalId) -> &AnimalEntry {
        &self.animals[id.0]
    }

    pub fn groups(&self) -> &[AdjectiveGroup] {
        &self.groups
    }

    pub fn group(&self, adjective: &str) -> Option<&AdjectiveGroup> {
        self.groups.iter().find(|g| g.adjective == adjective)
    }

    /// Entries of a group, in table order.
    pub fn members<'a>(
        &'a self,
        group: &'a AdjectiveGroup,
    ) -> impl Iterator<Item = &'a AnimalEntry> + 'a {
        group.animals.iter().map(move |&id| self.animal(id))
    }

    /// Entries still waiting for a download outcome, each listed once however many
    /// groups mention it.
    pub fn targets(&self) -> impl Iterator<Item = &AnimalEntry> + '_ {
        self.animals.iter().filter(|a| !a.status.is_terminal())
    }

    pub fn find(&self, name: &str) -> Option<AnimalId> {
        let key = name.to_lowercase();
        self.animals
            .iter()
            .position(|a| a.name.to_lowercase() == key)
            .map(AnimalId)
    }

    /// Stores the download outcome of the entry with the given slug.
    ///
    /// An entry is resolved once: returns false when the slug is unknown or the entry
    /// already left [`DownloadStatus::Pending`].
    pub fn resolve(
        &mut self,
        slug: &str,
        status: DownloadStatus,
        local_path: Option<&Path>,
    ) -> bool {
        let Some(entry) = self.animals.iter_mut().find(|a| a.slug == slug) else {
            return false;
        };
        if entry.status.is_terminal() {
            log::warn!("Animal {:?} already resolved as {:?}", entry.name, entry.status);
            return false;
        }
        entry.status = status;
        entry.local_path = local_path.map(Path::to_path_buf);
        true
    }

    /// Resolves every outcome in turn, returning how many entries were updated.
    /// Outcomes still [`DownloadStatus::Pending`] are left out.
    pub fn apply<'a, I>(&mut self, outcomes: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, DownloadStatus, Option<&'a Path>)>,
    {
        outcomes
            .into_iter()
            .filter(|(_, status, _)| status.is_terminal())
            .filter(|&(slug, status, path)| self.resolve(slug, status, path))
            .count()
    }
}

/// Single-threaded builder enforcing one entry per animal name.
#[derive(Debug, Default)]
pub(crate) struct CatalogBuilder {
    catalog: Catalog,
    by_name: HashMap<String, AnimalId>,
    by_adjective: HashMap<String, usize>,
    slugs: HashSet<String>,
}

impl CatalogBuilder {
    /// Returns the entry already known under this name, or creates it.
    pub(crate) fn intern(&mut self, name: &str, source_url: Option<&str>) -> AnimalId {
        let key = name.to_lowercase();
        if let Some(&id) = self.by_name.get(&key) {
            let entry = &mut self.catalog.animals[id.0];
            if entry.source_url.is_none() {
                entry.source_url = source_url.map(String::from);
            }
            return id;
        }

        let slug = self.unique_slug(name);
        let id = AnimalId(self.catalog.animals.len());
        self.catalog.animals.push(AnimalEntry {
            name: name.to_string(),
            slug,
            source_url: source_url.map(String::from),
            local_path: None,
            status: DownloadStatus::Pending,
        });
        self.by_name.insert(key, id);
        id
    }

    fn unique_slug(&mut self, name: &str) -> String {
        let base = slugify(name);
        let mut slug = base.clone();
        let mut n = 2;
        while self.slugs.contains(&slug) {
            slug = format!("{base}-{n}");
            n += 1;
        }
        self.slugs.insert(slug.clone());
        slug
    }

    /// Ensures the adjective exists, then appends the animals it does not hold yet.
    pub(crate) fn extend_group(&mut self, adjective: &str, animals: &[AnimalId]) {
        let idx = match self.by_adjective.get(adjective) {
            Some(&idx) => idx,
            None => {
                self.catalog.groups.push(AdjectiveGroup {
                    adjective: adjective.to_string(),
                    animals: Vec::new(),
                });
                let idx = self.catalog.groups.len() - 1;
                self.by_adjective.insert(adjective.to_string(), idx);
                idx
            }
        };
        let group = &mut self.catalog.groups[idx];
        for id in animals {
            if !group.animals.contains(id) {
                group.animals.push(*id);
            }
        }
    }

    pub(crate) fn finish(self) -> Catalog {
        self.catalog
    }
}
