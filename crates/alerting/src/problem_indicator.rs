use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProblemFlags {
    pub has_outdated_job_configurations: bool,
    pub has_outdated_job_definitions: bool,
    pub has_stopped_jobs: bool,
    pub is_first_use: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobNotice {
    DefinitionOutdated,
    ConfigurationOutdated,
    Stopped,
    FirstUse,
}

/// Notices to show for `flags`, always in display order.
pub fn problem_notices(flags: &JobProblemFlags) -> Vec<JobNotice> {
    [
        (flags.has_outdated_job_definitions, JobNotice::DefinitionOutdated),
        (flags.has_outdated_job_configurations, JobNotice::ConfigurationOutdated),
        (flags.has_stopped_jobs, JobNotice::Stopped),
        (flags.is_first_use, JobNotice::FirstUse),
    ]
    .into_iter()
    .filter_map(|(set, notice)| set.then_some(notice))
    .collect()
}

pub type RecreateCallback = Arc<dyn Fn() + Send + Sync>;

/// A notice together with the recreate action it offers, if any.
#[derive(Clone)]
pub struct RenderedNotice {
    pub notice: JobNotice,
    recreate: Option<RecreateCallback>,
}

impl RenderedNotice {
    pub fn has_action(&self) -> bool {
        self.recreate.is_some()
    }

    /// Runs the notice's recreate action; returns whether there was one.
    pub fn activate(&self) -> bool {
        match &self.recreate {
            Some(recreate) => {
                recreate();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for RenderedNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedNotice")
            .field("notice", &self.notice)
            .field("has_action", &self.has_action())
            .finish()
    }
}

pub struct ProblemIndicator {
    on_recreate_for_update: RecreateCallback,
    on_recreate_for_reconfiguration: RecreateCallback,
}

impl ProblemIndicator {
    pub fn new(
        on_recreate_for_update: RecreateCallback,
        on_recreate_for_reconfiguration: RecreateCallback,
    ) -> Self {
        Self {
            on_recreate_for_update,
            on_recreate_for_reconfiguration,
        }
    }

    pub fn render(&self, flags: &JobProblemFlags) -> Vec<RenderedNotice> {
        problem_notices(flags)
            .into_iter()
            .map(|notice| RenderedNotice {
                notice,
                recreate: match notice {
                    JobNotice::DefinitionOutdated => Some(self.on_recreate_for_update.clone()),
                    JobNotice::ConfigurationOutdated => {
                        Some(self.on_recreate_for_reconfiguration.clone())
                    }
                    JobNotice::Stopped | JobNotice::FirstUse => None,
                },
            })
            .collect()
    }
}
