use git2::{ErrorCode, Oid, Repository};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, SplitError};

pub struct GitRepository {
    pub repo: Mutex<Repository>,
    pub path: String,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let repo = Repository::discover(&path).map_err(|_| SplitError::RepoNotFound(path_str.clone()))?;

        Ok(Self {
            repo: Mutex::new(repo),
            path: path_str,
        })
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self.repo.lock().map_err(|_| SplitError::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }

    /// The `.git` directory (the repository itself when bare).
    pub fn git_dir(&self) -> Result<PathBuf> {
        self.with_repo(|repo| Ok(repo.path().to_path_buf()))
    }

    /// Resolve a revision (branch, tag, `HEAD`, hex id) to a commit id.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid> {
        self.with_repo(|repo| resolve_commit(repo, spec))
    }

    /// Point `name` at `target`, creating the reference if needed. Short
    /// names are taken as branches.
    pub fn update_reference(&self, name: &str, target: Oid, log_message: &str) -> Result<String> {
        let full_name = reference_name(name);
        self.with_repo(|repo| {
            repo.reference(&full_name, target, true, log_message)?;
            Ok(full_name.clone())
        })
    }
}

pub fn resolve_commit(repo: &Repository, spec: &str) -> Result<Oid> {
    let object = repo.revparse_single(spec).map_err(|e| match e.code() {
        ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
            SplitError::ReferenceNotFound(spec.to_string())
        }
        _ => SplitError::Git(e),
    })?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| SplitError::ReferenceNotFound(format!("{} is not a commit", spec)))?;
    Ok(commit.id())
}

pub fn reference_name(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("refs/heads/{}", name)
    }
}
