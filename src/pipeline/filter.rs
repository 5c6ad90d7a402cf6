use std::path::{Path, PathBuf};

use crate::watch::{ChangeEvent, ChangeKind};

/// A created file that is worth sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub base_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotCreated,
    NoFileName,
    Hidden,
    WrongExtension,
}

/// Applies the share policy: created, not hidden, `.png`.
pub fn candidate(event: &ChangeEvent) -> Result<CandidateFile, Rejection> {
    if event.kind != ChangeKind::Created {
        return Err(Rejection::NotCreated);
    }

    let base_name = base_name(&event.path).ok_or(Rejection::NoFileName)?;

    // editors and screenshot tools write dotfiles first, then rename
    if base_name.starts_with('.') {
        return Err(Rejection::Hidden);
    }
    if !base_name.ends_with(crate::SHARE_EXTENSION) {
        return Err(Rejection::WrongExtension);
    }

    Ok(CandidateFile {
        base_name: base_name.to_string(),
        path: event.path.clone(),
    })
}

fn base_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
