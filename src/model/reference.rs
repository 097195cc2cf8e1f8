//! The `Ref` entity (§3, §4.4): a named, mutable pointer to a commit.

use serde::{Deserialize, Serialize};

use crate::hash::CommitId;
use crate::model::dataset::DatasetId;

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub dataset_id: DatasetId,
    pub name: String,
    pub commit_id: Option<CommitId>,
}

impl Ref {
    pub fn is_default_branch(&self) -> bool {
        self.name == DEFAULT_BRANCH
    }
}
