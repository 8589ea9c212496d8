//! The HTML page listing every adjective with its animals.

use std::env;
use std::path::{Component, Path, PathBuf};

use bestiary_table::{Catalog, DownloadStatus};

/// What the report shows, in table order. Images are local files only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    pub groups: Vec<ReportGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportGroup {
    pub adjective: String,
    pub animals: Vec<ReportAnimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAnimal {
    pub name: String,
    /// `None` when a placeholder is shown instead
    pub image: Option<PathBuf>,
}

impl From<&Catalog> for ReportView {
    fn from(catalog: &Catalog) -> Self {
        let groups = catalog
            .groups()
            .iter()
            .map(|group| ReportGroup {
                adjective: group.adjective.clone(),
                animals: catalog
                    .members(group)
                    .map(|entry| ReportAnimal {
                        name: entry.name.clone(),
                        image: match entry.status {
                            DownloadStatus::Success => entry.local_path.clone(),
                            _ => None,
                        },
                    })
                    .collect(),
            })
            .collect();
        Self { groups }
    }
}

impl ReportView {
    /// Renders the page, image paths being made relative to `report_dir`.
    pub fn render(&self, report_dir: &Path) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Collateral adjectives</title>\n<style>\n\
             .animals { display: flex; flex-wrap: wrap; gap: 1em; list-style: none; padding: 0; }\n\
             .animals img, .animals .no-image { width: 160px; height: 120px; object-fit: cover; }\n\
             .no-image { background: #ddd; display: flex; align-items: center; justify-content: center; }\n\
             </style>\n</head>\n<body>\n<h1>Collateral adjectives</h1>\n",
        );

        for group in &self.groups {
            html.push_str(&format!(
                "<section>\n<h2>{}</h2>\n<ul class=\"animals\">\n",
                escape(&group.adjective)
            ));
            for animal in &group.animals {
                let name = escape(&animal.name);
                let figure = match &animal.image {
                    Some(path) => {
                        let src = relative_to(path, report_dir);
                        format!(
                            "<img src=\"{}\" alt=\"{name}\">",
                            escape(&src.to_string_lossy().replace('\\', "/"))
                        )
                    }
                    None => String::from("<div class=\"no-image\">No image</div>"),
                };
                html.push_str(&format!(
                    "<li><figure>{figure}<figcaption>{name}</figcaption></figure></li>\n"
                ));
            }
            if group.animals.is_empty() {
                html.push_str("<li><em>No animal listed</em></li>\n");
            }
            html.push_str("</ul>\n</section>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        if !dir.as_os_str().is_empty() {
            fs_err::create_dir_all(dir)?;
        }
        fs_err::write(path, self.render(dir))?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Path of `path` as seen from the `base` directory.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let (path, base) = match (absolute(path), absolute(base)) {
        (Some(path), Some(base)) => (path, base),
        _ => return path.to_path_buf(),
    };

    let path: Vec<_> = path.components().collect();
    let base: Vec<_> = base.components().collect();
    let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();
    if common == 0 {
        return path.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push(Component::ParentDir);
    }
    relative.extend(&path[common..]);
    relative
}

fn absolute(path: &Path) -> Option<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                normalized.pop();
            }
            c => normalized.push(c),
        }
    }
    Some(normalized)
}
