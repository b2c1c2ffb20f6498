use crate::automation::{Automation, Invocation};
use crate::error::{Result, ToolError};
use crate::toolbox::ToolOutcome;
use crate::web::open_target;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

const SEARCH_RESULTS_MAX: usize = 10;
const WALK_STEPS_MAX: usize = 20_000;

const SHORTCUTS: &[(&str, &str)] = &[
    ("desktop", "Desktop"),
    ("downloads", "Downloads"),
    ("documents", "Documents"),
    ("home", ""),
    ("pictures", "Pictures"),
    ("movies", "Movies"),
    ("music", "Music"),
];

/// Resolves spoken folder names ("desktop", "~/Code", "Projects") against a home directory.
#[derive(Debug, Clone)]
pub struct Locations {
    home: PathBuf,
}

impl Locations {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Uses `$HOME`, falling back to the current directory.
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(home)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn shortcut(&self, name: &str) -> Option<PathBuf> {
        let key = name.trim().to_ascii_lowercase();
        SHORTCUTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, sub)| self.home.join(sub))
    }

    fn expand(&self, raw: &str) -> PathBuf {
        if raw == "~" {
            return self.home.clone();
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return self.home.join(rest);
        }
        PathBuf::from(raw)
    }

    /// Resolve a location argument. Relative paths hang off the home directory.
    pub async fn resolve(&self, location: Option<&str>, default: &str) -> PathBuf {
        let raw = location
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default);
        if let Some(p) = self.shortcut(raw) {
            return p;
        }
        let mut path = self.expand(raw);
        if !path.is_absolute() {
            path = self.home.join(path);
        }
        if exists(&path).await {
            return path;
        }

        // Models sometimes invent another user's Desktop path; retry under ours.
        let text = path.to_string_lossy().to_string();
        if let Some((_, tail)) = text.split_once("/Desktop") {
            let candidate = self.home.join("Desktop").join(tail.trim_start_matches('/'));
            if exists(&candidate).await {
                return candidate;
            }
        }
        path
    }

    /// `~`-abbreviated form for speaking back to the user.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.home) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => path.display().to_string(),
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

fn normalize_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Find a directory under `parent` by exact, case-insensitive, normalized, then partial match.
pub async fn find_dir_fuzzy(parent: &Path, target: &str) -> Option<PathBuf> {
    let target_norm = normalize_name(target);
    if target_norm.is_empty() {
        return None;
    }
    let mut entries = tokio::fs::read_dir(parent).await.ok()?;

    let mut normalized_eq = None;
    let mut partial = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !is_dir(&path).await {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.eq_ignore_ascii_case(target) {
            return Some(path);
        }
        let norm = normalize_name(&name);
        if norm.is_empty() {
            continue;
        }
        if norm == target_norm {
            normalized_eq.get_or_insert(path);
        } else if norm.contains(&target_norm) || target_norm.contains(&norm) {
            partial.get_or_insert(path);
        }
    }
    normalized_eq.or(partial)
}

fn reject_traversal(name: &str) -> Result<()> {
    if Path::new(name)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::InvalidArguments(
            "Folder names cannot contain '..'.".to_string(),
        ));
    }
    Ok(())
}

#[tracing::instrument(level = "info", skip(automation, locations))]
pub(crate) async fn find_file(
    automation: &dyn Automation,
    locations: &Locations,
    filename: &str,
    search_path: Option<&str>,
) -> Result<ToolOutcome> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please specify a file name to search for.".to_string(),
        ));
    }
    let mut root = match search_path.map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => locations.resolve(Some(p), "home").await,
        None => locations.home().to_path_buf(),
    };
    if !exists(&root).await {
        root = locations.home().to_path_buf();
    }

    let mut results = Vec::new();
    if automation.supports_app_control() {
        let root_arg = root.to_string_lossy().to_string();
        let inv = if root == locations.home() {
            Invocation::new("mdfind", ["-name", filename])
        } else {
            Invocation::new("mdfind", ["-onlyin", root_arg.as_str(), "-name", filename])
        };
        match automation.run(&inv, Duration::from_secs(10)).await {
            Ok(out) if out.success => {
                results.extend(
                    out.stdout
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .take(SEARCH_RESULTS_MAX)
                        .map(PathBuf::from),
                );
            }
            Ok(out) => tracing::debug!(stderr = %out.stderr.trim(), "spotlight search failed"),
            Err(e) => tracing::debug!(error = %e, "spotlight search failed"),
        }
    }
    if results.is_empty() {
        results = walk_for_name(&root, filename).await;
    }

    let shown: Vec<String> = results.iter().map(|p| locations.display(p)).collect();
    let message = match shown.len() {
        0 => {
            return Err(ToolError::ExecutionFailed(format!(
                "I could not find '{filename}' in {}.",
                locations.display(&root)
            )));
        }
        1 => format!("I found it at {}.", shown[0]),
        n => format!("I found {n} matches. The first one is at {}.", shown[0]),
    };
    let details = shown.join("\n");
    Ok(ToolOutcome::with_data(message, serde_json::json!({ "paths": shown })).details(details))
}

/// Depth-first name search, skipping hidden entries.
async fn walk_for_name(root: &Path, needle: &str) -> Vec<PathBuf> {
    let needle = needle.to_lowercase();
    let mut stack = vec![root.to_path_buf()];
    let mut out = Vec::new();
    let mut steps = 0usize;

    while let Some(dir) = stack.pop() {
        steps += 1;
        if steps >= WALK_STEPS_MAX {
            break;
        }
        let Ok(mut rd) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = rd.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if name.to_lowercase().contains(&needle) {
                out.push(path.clone());
                if out.len() >= SEARCH_RESULTS_MAX {
                    return out;
                }
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                stack.push(path);
            }
        }
    }
    out.sort();
    out
}

#[tracing::instrument(level = "info", skip(locations))]
pub(crate) async fn create_folder(
    locations: &Locations,
    folder_name: &str,
    location: Option<&str>,
) -> Result<ToolOutcome> {
    let folder_name = folder_name.trim();
    if folder_name.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please give the folder a name.".to_string(),
        ));
    }
    reject_traversal(folder_name)?;

    let raw = location
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("desktop");
    let base = match locations.shortcut(raw) {
        Some(p) => p,
        None => {
            let p = locations.expand(raw);
            if p.is_absolute() {
                p
            } else {
                locations.home().join("Desktop").join(p)
            }
        }
    };
    let full = base.join(folder_name);
    let shown = locations.display(&full);

    if tokio::fs::try_exists(&full).await.unwrap_or(false) {
        return Err(ToolError::ExecutionFailed(format!(
            "A folder named '{folder_name}' already exists at {shown}."
        )));
    }
    tokio::fs::create_dir_all(&full).await.map_err(|e| {
        ToolError::ExecutionFailed(format!("I could not create {shown}: {e}"))
    })?;
    tracing::info!(path = %full.display(), "folder created");
    Ok(ToolOutcome::with_data(
        format!("Created folder '{folder_name}' at {shown}"),
        serde_json::json!({ "path": shown }),
    ))
}

#[tracing::instrument(level = "info", skip(automation, locations))]
pub(crate) async fn open_folder(
    automation: &dyn Automation,
    locations: &Locations,
    folder_name: &str,
    location: Option<&str>,
) -> Result<ToolOutcome> {
    let mut name = folder_name.trim();
    if name.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please specify a folder name to open.".to_string(),
        ));
    }
    if name.to_ascii_lowercase().ends_with(" folder") {
        name = name[..name.len() - " folder".len()].trim();
    }

    let mut target = if name.starts_with('~') || Path::new(name).is_absolute() {
        locations.expand(name)
    } else {
        locations.resolve(location, "desktop").await.join(name)
    };

    if !is_dir(&target).await {
        if let (Some(parent), Some(base)) = (target.parent(), target.file_name()) {
            if let Some(found) = find_dir_fuzzy(parent, &base.to_string_lossy()).await {
                target = found;
            }
        }
    }
    let shown = locations.display(&target);
    if !is_dir(&target).await {
        return Err(ToolError::ExecutionFailed(format!(
            "Directory '{shown}' not found."
        )));
    }

    open_target(automation, &target.to_string_lossy()).await?;
    Ok(ToolOutcome::with_data(
        format!("Opened folder {shown}"),
        serde_json::json!({ "path": shown }),
    ))
}

fn preview(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join(", ")
}

#[tracing::instrument(level = "info", skip(locations))]
pub(crate) async fn list_contents(
    locations: &Locations,
    location: Option<&str>,
) -> Result<ToolOutcome> {
    let dir = locations.resolve(location, "desktop").await;
    let shown = locations.display(&dir);
    let mut rd = tokio::fs::read_dir(&dir).await.map_err(|e| {
        ToolError::ExecutionFailed(format!("I cannot access {shown}: {e}"))
    })?;

    let mut folders = Vec::new();
    let mut files = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if is_dir(&entry.path()).await {
            folders.push(name);
        } else {
            files.push(name);
        }
    }
    folders.sort();
    files.sort();

    let (nd, nf) = (folders.len(), files.len());
    let message = match (nd, nf) {
        (0, 0) => format!("{shown} is currently empty."),
        (d, 0) if d <= 8 => format!("There are {d} folders in {shown}: {}.", preview(&folders, 8)),
        (d, 0) => format!(
            "There are {d} folders in {shown}. The first few are: {}.",
            preview(&folders, 8)
        ),
        (0, f) if f <= 8 => format!("There are {f} files in {shown}: {}.", preview(&files, 8)),
        (0, f) => format!(
            "There are {f} files in {shown}. The first few are: {}.",
            preview(&files, 8)
        ),
        (d, f) => format!(
            "{shown} contains {d} folders and {f} files. Folders: {}. Files: {}.",
            preview(&folders, 5),
            preview(&files, 5)
        ),
    };

    let mut sections = Vec::new();
    if !folders.is_empty() {
        sections.push(format!("Folders:\n  {}", folders.join("\n  ")));
    }
    if !files.is_empty() {
        sections.push(format!("Files:\n  {}", files.join("\n  ")));
    }
    Ok(ToolOutcome::with_data(
        message,
        serde_json::json!({ "folders": folders, "files": files }),
    )
    .details(sections.join("\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::RecordingAutomation;

    fn home() -> (tempfile::TempDir, Locations) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Desktop")).unwrap();
        let locations = Locations::new(tmp.path());
        (tmp, locations)
    }

    #[tokio::test]
    async fn resolve_maps_shortcuts_and_relative_paths() {
        let (tmp, loc) = home();
        assert_eq!(loc.resolve(Some("Desktop"), "home").await, tmp.path().join("Desktop"));
        assert_eq!(loc.resolve(None, "home").await, tmp.path().join(""));
        assert_eq!(loc.resolve(Some("~/Code"), "home").await, tmp.path().join("Code"));
        assert_eq!(loc.resolve(Some("Code"), "home").await, tmp.path().join("Code"));
        assert_eq!(loc.display(&tmp.path().join("Desktop/x")), "~/Desktop/x");
    }

    #[tokio::test]
    async fn resolve_repairs_foreign_desktop_paths() {
        let (tmp, loc) = home();
        std::fs::create_dir_all(tmp.path().join("Desktop/Jarvis")).unwrap();
        assert_eq!(
            loc.resolve(Some("/Users/someone/Desktop/Jarvis"), "desktop").await,
            tmp.path().join("Desktop/Jarvis")
        );
    }

    #[tokio::test]
    async fn fuzzy_dir_matching_prefers_exact_then_normalized() {
        let (tmp, _) = home();
        let desk = tmp.path().join("Desktop");
        std::fs::create_dir_all(desk.join("My-Project")).unwrap();
        std::fs::create_dir_all(desk.join("My Project Archive")).unwrap();
        assert_eq!(
            find_dir_fuzzy(&desk, "my project").await,
            Some(desk.join("My-Project"))
        );
        assert_eq!(
            find_dir_fuzzy(&desk, "archive").await,
            Some(desk.join("My Project Archive"))
        );
        assert_eq!(find_dir_fuzzy(&desk, "!!").await, None);
    }

    #[tokio::test]
    async fn fuzzy_dir_matching_skips_files_and_missing_parents() {
        let (tmp, _) = home();
        let desk = tmp.path().join("Desktop");
        std::fs::write(desk.join("reports.txt"), "x").unwrap();
        assert_eq!(find_dir_fuzzy(&desk, "reports").await, None);
        assert_eq!(find_dir_fuzzy(&tmp.path().join("gone"), "reports").await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn folder_lookups_share_a_single_threaded_runtime() {
        let (tmp, loc) = home();
        for name in ["Alpha", "Beta", "Gamma"] {
            std::fs::create_dir_all(tmp.path().join("Desktop").join(name)).unwrap();
        }
        let auto = RecordingAutomation::new();
        let (a, b, c) = tokio::join!(
            open_folder(&auto, &loc, "alpha", None),
            open_folder(&auto, &loc, "beta folder", None),
            list_contents(&loc, Some("desktop")),
        );
        assert_eq!(a.unwrap().message, "Opened folder ~/Desktop/Alpha");
        assert_eq!(b.unwrap().message, "Opened folder ~/Desktop/Beta");
        assert_eq!(c.unwrap().data["folders"], serde_json::json!(["Alpha", "Beta", "Gamma"]));
    }

    #[tokio::test]
    async fn create_folder_refuses_duplicates_and_traversal() {
        let (tmp, loc) = home();
        let out = create_folder(&loc, "Jarvis", None).await.unwrap();
        assert_eq!(out.message, "Created folder 'Jarvis' at ~/Desktop/Jarvis");
        assert!(tmp.path().join("Desktop/Jarvis").is_dir());

        assert!(create_folder(&loc, "Jarvis", Some("desktop")).await.is_err());
        assert!(create_folder(&loc, "../escape", None).await.is_err());
        assert!(create_folder(&loc, "  ", None).await.is_err());
    }

    #[tokio::test]
    async fn list_contents_splits_folders_and_files() {
        let (tmp, loc) = home();
        let desk = tmp.path().join("Desktop");
        std::fs::create_dir_all(desk.join("b-folder")).unwrap();
        std::fs::write(desk.join("a.txt"), "x").unwrap();
        std::fs::write(desk.join(".hidden"), "x").unwrap();

        let out = list_contents(&loc, Some("desktop")).await.unwrap();
        assert_eq!(
            out.message,
            "~/Desktop contains 1 folders and 1 files. Folders: b-folder. Files: a.txt."
        );
        assert_eq!(out.data["files"], serde_json::json!(["a.txt"]));
        assert!(out.details.unwrap().contains("Folders:"));
    }

    #[tokio::test]
    async fn list_contents_reports_missing_directory() {
        let (_tmp, loc) = home();
        assert!(list_contents(&loc, Some("nowhere")).await.is_err());
    }

    #[tokio::test]
    async fn find_file_falls_back_to_walking() {
        let (tmp, loc) = home();
        std::fs::create_dir_all(tmp.path().join("Documents/cv")).unwrap();
        std::fs::write(tmp.path().join("Documents/cv/Resume.pdf"), "x").unwrap();

        let auto = RecordingAutomation::new();
        let out = find_file(&auto, &loc, "resume", Some("documents")).await.unwrap();
        assert_eq!(out.message, "I found it at ~/Documents/cv/Resume.pdf.");
        assert!(find_file(&auto, &loc, "missing.bin", None).await.is_err());
    }

    #[tokio::test]
    async fn open_folder_strips_suffix_and_matches_fuzzily() {
        let (tmp, loc) = home();
        std::fs::create_dir_all(tmp.path().join("Desktop/My-Notes")).unwrap();
        let auto = RecordingAutomation::new();
        let out = open_folder(&auto, &loc, "my notes folder", None).await.unwrap();
        assert_eq!(out.message, "Opened folder ~/Desktop/My-Notes");
        let calls = auto.invocations();
        assert_eq!(calls.last().unwrap().program, "open");

        assert!(open_folder(&auto, &loc, "Nope", None).await.is_err());
    }
}
