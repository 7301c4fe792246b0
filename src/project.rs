use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use serde::Serialize;

use crate::model::{Command, ProjectDocument};
use crate::paths;

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NotFound(String),
    AlreadyExists(String),
    InvalidName(String),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {e}"),
            ProjectError::Json(e) => write!(f, "JSON error: {e}"),
            ProjectError::NotFound(what) => write!(f, "{what} not found"),
            ProjectError::AlreadyExists(what) => write!(f, "{what} already exists"),
            ProjectError::InvalidName(msg) => write!(f, "Invalid project name: {msg}"),
        }
    }
}

impl std::error::Error for ProjectError {}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        ProjectError::Json(e)
    }
}

// ── File helpers ────────────────────────────────────────────────────

/// Per-file mutex map to serialize concurrent writes to the same path.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Atomically write bytes to a file using write-to-temp-then-rename.
///
/// 1. Acquires a per-file mutex to prevent concurrent writes to the same path
/// 2. Writes data to a `.tmp` sibling file
/// 3. Calls `fsync` to flush to disk
/// 4. Renames the `.tmp` file to the target path
///
/// Readers never observe a half-written project or history file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ProjectError> {
    let lock = {
        let mut locks = FILE_LOCKS
            .lock()
            .map_err(|e| ProjectError::Io(std::io::Error::other(e.to_string())))?;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    };
    let _guard = lock
        .lock()
        .map_err(|e| ProjectError::Io(std::io::Error::other(e.to_string())))?;

    // foo.json → foo.json.tmp
    let file_name = path.file_name().unwrap_or_default();
    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

/// Copy a project file that failed to parse to `<file>.bak`.
fn preserve_unreadable(path: &Path) {
    let backup = paths::unreadable_backup(path);
    match fs::copy(path, &backup) {
        Ok(_) => log::warn!("Kept unreadable project as {}", backup.display()),
        Err(e) => log::warn!("Failed to back up {}: {e}", path.display()),
    }
}

/// Reject names that would escape the project directory.
fn validate_name(name: &str) -> Result<(), ProjectError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProjectError::InvalidName("name is empty".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ProjectError::InvalidName(format!(
            "'{name}' must be a plain file name"
        )));
    }
    Ok(())
}

// ── Store ───────────────────────────────────────────────────────────

/// Owns the active project document and the path it was loaded from.
///
/// Exactly one project is active. Every operation leaves `document`
/// initialized, falling back to an empty project when a file is missing or
/// unreadable.
pub struct ProjectStore {
    projects_dir: PathBuf,
    audio_dir: PathBuf,
    active_path: PathBuf,
    document: ProjectDocument,
}

impl ProjectStore {
    /// Open the store and load `initial` (a file name inside `projects_dir`).
    pub fn open(projects_dir: PathBuf, audio_dir: PathBuf, initial: &str) -> Self {
        let active_path = projects_dir.join(paths::project_file_name(initial));
        let mut store = Self {
            projects_dir,
            audio_dir,
            active_path: active_path.clone(),
            document: ProjectDocument::empty(),
        };
        store.load(&active_path);
        store
    }

    pub fn document(&self) -> &ProjectDocument {
        &self.document
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn send_to_all(&self) -> bool {
        self.document.send_to_all
    }

    pub fn current_project_name(&self) -> String {
        paths::project_stem(&self.active_path)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ProjectError> {
        validate_name(name)?;
        Ok(self
            .projects_dir
            .join(paths::project_file_name(name.trim())))
    }

    /// Load `path` and make it active. A missing file, or one that is not a
    /// JSON object, yields an empty project rather than an error. An
    /// unreadable file is first copied to `<file>.bak` so the next save
    /// cannot destroy its contents.
    pub fn load(&mut self, path: &Path) {
        self.document = match read_json::<ProjectDocument>(path) {
            Ok(doc) => {
                log::info!("Loaded project {}", path.display());
                doc
            }
            Err(ProjectError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("{} not found, starting with an empty project", path.display());
                ProjectDocument::empty()
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {e}; starting empty", path.display());
                preserve_unreadable(path);
                ProjectDocument::empty()
            }
        };
        self.active_path = path.to_path_buf();
    }

    /// Persist the in-memory project to the active path.
    pub fn save(&self) -> Result<(), ProjectError> {
        self.save_to(&self.active_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ProjectError> {
        write_json(path, &self.document)?;
        log::info!("Saved project {}", path.display());
        Ok(())
    }

    /// Create an empty project called `name`, write it, and make it active.
    /// Returns the new project's name.
    pub fn new_project(&mut self, name: &str) -> Result<String, ProjectError> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(ProjectError::AlreadyExists(format!(
                "Project '{}'",
                path.display()
            )));
        }
        write_json(&path, &ProjectDocument::empty())?;
        self.document = ProjectDocument::empty();
        self.active_path = path;
        let created = self.current_project_name();
        log::info!("Created project '{created}'");
        Ok(created)
    }

    /// Make an existing project active.
    pub fn switch_to(&mut self, name: &str) -> Result<String, ProjectError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ProjectError::NotFound(format!("Project '{}'", path.display())));
        }
        self.load(&path);
        Ok(self.current_project_name())
    }

    /// Write a copy of the current project under `name`, leaving the active
    /// project unchanged. Rendered audio in the current project's namespace
    /// is copied to the new namespace on a best-effort basis.
    pub fn save_as(&self, name: &str) -> Result<String, ProjectError> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(ProjectError::AlreadyExists(format!(
                "Project '{}'",
                path.display()
            )));
        }
        self.save_to(&path)?;

        let new_name = paths::project_stem(&path);
        let copied = self.copy_audio_namespace(&self.current_project_name(), &new_name);
        log::info!(
            "Saved '{}' as '{new_name}' ({copied} audio file(s) copied)",
            self.current_project_name()
        );
        Ok(new_name)
    }

    /// Copy every file in one audio namespace to another. Individual failures
    /// are logged and skipped. Returns the number of files copied.
    fn copy_audio_namespace(&self, from: &str, to: &str) -> usize {
        let src = paths::namespace_dir(&self.audio_dir, from);
        let entries = match fs::read_dir(&src) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let dst = paths::namespace_dir(&self.audio_dir, to);
        if let Err(e) = fs::create_dir_all(&dst) {
            log::warn!("Cannot create audio directory {}: {e}", dst.display());
            return 0;
        }

        let mut copied = 0;
        for entry in entries.filter_map(Result::ok) {
            let from_path = entry.path();
            if !from_path.is_file() {
                continue;
            }
            let to_path = dst.join(entry.file_name());
            match fs::copy(&from_path, &to_path) {
                Ok(_) => copied += 1,
                Err(e) => log::warn!(
                    "Failed to copy {} to {}: {e}",
                    from_path.display(),
                    to_path.display()
                ),
            }
        }
        copied
    }

    /// Project file names in the project directory, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>, ProjectError> {
        let mut names: Vec<String> = fs::read_dir(&self.projects_dir)?
            .filter_map(Result::ok)
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext == paths::PROJECT_EXTENSION)
            })
            .filter(|e| e.file_name() != paths::SETTINGS_FILE)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Upsert `cmd` into the project stored at `project_path` and save it.
    ///
    /// When that is the active project the in-memory document is updated;
    /// otherwise the file is read, updated and written on its own. Returns
    /// true when the active project changed.
    pub fn store_command(&mut self, project_path: &Path, cmd: Command) -> Result<bool, ProjectError> {
        if project_path == self.active_path.as_path() {
            self.upsert_command(cmd);
            self.save()?;
            return Ok(true);
        }
        if !project_path.exists() {
            return Err(ProjectError::NotFound(format!(
                "Project '{}'",
                project_path.display()
            )));
        }
        let mut doc = read_json::<ProjectDocument>(project_path)?;
        doc.upsert_command(cmd);
        write_json(project_path, &doc)?;
        log::info!("Saved command into inactive project {}", project_path.display());
        Ok(false)
    }

    /// Insert or replace a command by name. Does not save.
    pub fn upsert_command(&mut self, cmd: Command) -> bool {
        self.document.upsert_command(cmd)
    }

    /// Replace the whole document. Does not save.
    pub fn replace_document(&mut self, doc: ProjectDocument) {
        self.document = doc;
    }

    pub fn set_send_to_all(&mut self, value: bool) {
        self.document.send_to_all = value;
    }
}
