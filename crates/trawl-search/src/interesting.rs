use std::collections::HashSet;

use trawl_core::FileId;

use crate::project::CompiledProject;
use crate::scope::{ScopeRestriction, SearchScope};

/// Narrows a project to the files worth searching for one scope.
///
/// This is a heuristic: files without a match may be returned, but a file with a match is
/// never left out.
pub struct InterestingFileSet;

impl InterestingFileSet {
    /// Candidate files for `scope`, in the project's declaration order, without duplicates.
    pub fn compute<R, P>(scope: &SearchScope<R>, project: &P) -> Vec<FileId>
    where
        P: CompiledProject + ?Sized,
    {
        let candidates: Vec<FileId> = match scope.restriction() {
            // The declaring file is searched even when the project does not list it.
            ScopeRestriction::File(file) => vec![file.clone()],
            ScopeRestriction::Namespace(namespace) => project
                .declared_files()
                .iter()
                .filter(|file| project.can_reach(file, namespace))
                .cloned()
                .collect(),
            ScopeRestriction::Unrestricted => project.declared_files().to_vec(),
        };

        let mut seen = HashSet::with_capacity(candidates.len());
        candidates
            .into_iter()
            .filter(|file| scope.accepts_extension(file))
            .filter(|file| seen.insert(file.clone()))
            .collect()
    }
}
