//! Which project the pipeline works on.

use crate::core::ProjectContext;
use parking_lot::RwLock;
use std::path::Path;

/// The result of feeding a workspace change into the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectUpdate {
    /// The active project was replaced or cleared.
    Changed(Option<ProjectContext>),
    /// The active project was touched but did not change.
    Refreshed(ProjectContext),
    /// Nothing to report.
    Unchanged,
}

/// Holds the active [`ProjectContext`].
///
/// The context is replaced as a whole, so readers never observe a root that
/// disagrees with its build directory or binary name.
#[derive(Debug, Default)]
pub struct ProjectTracker {
    current: RwLock<Option<ProjectContext>>,
}

impl ProjectTracker {
    /// Creates a tracker without an active project.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active project.
    #[must_use]
    pub fn current(&self) -> Option<ProjectContext> {
        self.current.read().clone()
    }

    /// Makes the project rooted at `root` active.
    pub fn activate(&self, root: &Path) -> ProjectUpdate {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|ctx| ctx.root() == root) {
            return ProjectUpdate::Unchanged;
        }
        let ctx = ProjectContext::from_root(root);
        *current = Some(ctx.clone());
        ProjectUpdate::Changed(Some(ctx))
    }

    /// A file of the project rooted at `root` was saved or opened.
    pub fn file_saved_or_added(&self, root: &Path) -> ProjectUpdate {
        match self.activate(root) {
            ProjectUpdate::Unchanged => self
                .current()
                .map_or(ProjectUpdate::Unchanged, ProjectUpdate::Refreshed),
            update => update,
        }
    }

    /// The focused file changed; `root` is its project, if any.
    pub fn file_changed(&self, root: Option<&Path>) -> ProjectUpdate {
        root.map_or(ProjectUpdate::Unchanged, |root| self.activate(root))
    }

    /// The last file was closed.
    pub fn no_open_file(&self) -> ProjectUpdate {
        match self.current.write().take() {
            Some(_) => ProjectUpdate::Changed(None),
            None => ProjectUpdate::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_first_file_activates_project() {
        let tracker = ProjectTracker::new();

        let update = tracker.file_saved_or_added(Path::new("/w/demo"));

        assert_eq!(
            update,
            ProjectUpdate::Changed(Some(ProjectContext::from_root("/w/demo")))
        );
        assert_eq!(tracker.current().unwrap().root(), Path::new("/w/demo"));
    }

    #[test]
    fn test_saving_in_same_project_refreshes() {
        let tracker = ProjectTracker::new();
        tracker.file_saved_or_added(Path::new("/w/demo"));

        let update = tracker.file_saved_or_added(Path::new("/w/demo"));

        assert_eq!(
            update,
            ProjectUpdate::Refreshed(ProjectContext::from_root("/w/demo"))
        );
    }

    #[test]
    fn test_focus_change_only_reports_new_projects() {
        let tracker = ProjectTracker::new();
        assert_eq!(tracker.file_changed(None), ProjectUpdate::Unchanged);

        tracker.file_changed(Some(Path::new("/w/a")));
        assert_eq!(
            tracker.file_changed(Some(Path::new("/w/a"))),
            ProjectUpdate::Unchanged
        );
        assert_eq!(
            tracker.file_changed(Some(Path::new("/w/b"))),
            ProjectUpdate::Changed(Some(ProjectContext::from_root("/w/b")))
        );
    }

    #[test]
    fn test_no_open_file_clears_once() {
        let tracker = ProjectTracker::new();
        assert_eq!(tracker.no_open_file(), ProjectUpdate::Unchanged);

        tracker.activate(&PathBuf::from("/w/demo"));
        assert_eq!(tracker.no_open_file(), ProjectUpdate::Changed(None));
        assert_eq!(tracker.no_open_file(), ProjectUpdate::Unchanged);
        assert!(tracker.current().is_none());
    }
}
