//! Job tracking.
//!
//! A [`ClusterJob`] is a lightweight progress record tied to a cluster.
//! Jobs do not influence balancing; they exist so work items can be
//! logged with a consistent `[tag:progress/total]` prefix and, when the
//! cluster is joined to a SQL registry, recorded in the `cluster_job`
//! table. Persistence failures after creation are logged rather than
//! surfaced.

use crate::cluster::Cluster;
use crate::config;
use crate::error::{Error, Result};
use crate::logging::LogLevel;
use crate::registry::sql::JobStore;

/// Lifecycle of a job: `Wait -> Active -> {Complete, Fail}`, with
/// `Active -> Wait` allowed for re-queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Wait,
    Active,
    Complete,
    Fail,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Wait => "WAIT",
            JobStatus::Active => "ACTIVE",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Fail => "FAIL",
        }
    }
}

pub struct ClusterJob {
    cluster: Cluster,
    id: String,
    tag: String,
    name: Option<String>,
    parent: Option<String>,
    progress: i32,
    total: i32,
    status: JobStatus,
}

impl Cluster {
    /// Create a job with a generated 32-character hex ID.
    pub async fn create_job(&self) -> Result<ClusterJob> {
        let id = config::generate_id();
        self.create_job_with_id(&id).await
    }

    /// Create a job with a caller-chosen ID (2-32 alphanumeric
    /// characters). When joined to a SQL registry the record is persisted
    /// immediately; a persistence failure fails the creation.
    pub async fn create_job_with_id(&self, id: &str) -> Result<ClusterJob> {
        if !config::valid_id(id) {
            return Err(Error::Invalid(format!("job ID '{id}'")));
        }
        let job = ClusterJob {
            cluster: self.clone(),
            id: id.to_string(),
            tag: id.to_string(),
            name: None,
            parent: None,
            progress: 0,
            total: 1,
            status: JobStatus::Wait,
        };
        if let Some(store) = job.store() {
            store.create(&job.id, None, job.total).await?;
        }
        job.log(LogLevel::Info, &format!("created job {id}"));
        Ok(job)
    }
}

impl ClusterJob {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn total(&self) -> i32 {
        self.total
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    fn store(&self) -> Option<JobStore> {
        self.cluster.shared().read().job_store.clone()
    }

    /// Make this job a child of `parent`, which must belong to the same
    /// cluster.
    pub async fn set_parent(&mut self, parent: Option<&ClusterJob>) -> Result<()> {
        if let Some(parent) = parent {
            if !self.cluster.same_member(&parent.cluster) {
                return Err(Error::Invalid(
                    "parent job belongs to a different cluster".to_string(),
                ));
            }
        }
        self.set_parent_id(parent.map(|p| p.id.as_str())).await
    }

    pub async fn set_parent_id(&mut self, parent: Option<&str>) -> Result<()> {
        match parent {
            None => {
                self.parent = None;
                self.log(LogLevel::Info, "job no longer has a parent");
            }
            Some(parent_id) => {
                if !config::valid_id(parent_id) {
                    return Err(Error::Invalid(format!("job ID '{parent_id}'")));
                }
                self.parent = Some(parent_id.to_string());
                self.log(
                    LogLevel::Info,
                    &format!("job is now a child of {parent_id}"),
                );
            }
        }
        if let Some(store) = self.store() {
            if let Err(e) = store.set_parent(&self.id, self.parent.as_deref()).await {
                self.log(
                    LogLevel::Warning,
                    &format!("failed to record job parent: {e}"),
                );
            }
        }
        Ok(())
    }

    /// Give the job a new ID. The tag follows the ID until
    /// [`set_tag`](Self::set_tag) overrides it.
    pub fn set_id(&mut self, id: &str) -> Result<()> {
        if !config::valid_id(id) {
            return Err(Error::Invalid(format!("job ID '{id}'")));
        }
        self.log(
            LogLevel::Info,
            &format!("job {} has been given a new ID of {id}", self.id),
        );
        self.id = id.to_string();
        self.tag = id.to_string();
        Ok(())
    }

    /// Set the tag used in this job's log prefix.
    pub fn set_tag(&mut self, tag: &str) {
        self.tag = tag.to_string();
    }

    /// Name the job. A name is only meaningful within the context of a
    /// parent.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if self.parent.is_none() {
            return Err(Error::NotPermitted);
        }
        self.name = Some(name.to_string());
        self.log(LogLevel::Info, &format!("job name set to '{name}'"));
        Ok(())
    }

    pub async fn set_total(&mut self, total: i32) {
        if self.total == total {
            return;
        }
        self.total = total;
        if total < self.progress {
            self.progress = 0;
        }
        self.log(
            LogLevel::Info,
            &format!("job progress {}/{}", self.progress, self.total),
        );
        self.persist_progress().await;
    }

    pub async fn set_progress(&mut self, progress: i32) {
        if progress > self.total {
            self.progress = progress;
            self.total = progress;
        } else if self.progress != progress {
            self.progress = progress;
        } else {
            return;
        }
        self.log(
            LogLevel::Info,
            &format!("job progress {}/{}", self.progress, self.total),
        );
        self.persist_progress().await;
    }

    /// `Wait -> Active`. Records which node picked the job up.
    pub async fn begin(&mut self) -> Result<()> {
        if self.status != JobStatus::Wait {
            return Err(Error::NotPermitted);
        }
        self.status = JobStatus::Active;
        self.log(LogLevel::Info, "+++ job is now in state ACTIVE +++");
        let node = self.cluster.instance_id();
        self.persist_status(Some(&node)).await;
        Ok(())
    }

    /// `Active -> Wait`: put the job back on the queue.
    pub async fn wait(&mut self) -> Result<()> {
        if self.status != JobStatus::Active {
            return Err(Error::NotPermitted);
        }
        self.status = JobStatus::Wait;
        self.log(LogLevel::Info, "--- job is now in state WAIT ---");
        self.persist_status(None).await;
        Ok(())
    }

    /// `Active -> Complete`.
    pub async fn complete(&mut self) -> Result<()> {
        if self.status != JobStatus::Active {
            return Err(Error::NotPermitted);
        }
        self.status = JobStatus::Complete;
        self.log(LogLevel::Info, "--- job is now in state COMPLETE ---");
        let node = self.cluster.instance_id();
        self.persist_status(Some(&node)).await;
        Ok(())
    }

    /// `Active -> Fail`.
    pub async fn fail(&mut self) -> Result<()> {
        if self.status != JobStatus::Active {
            return Err(Error::NotPermitted);
        }
        self.status = JobStatus::Fail;
        self.log(LogLevel::Info, "*** job is now in state FAIL ***");
        let node = self.cluster.instance_id();
        self.persist_status(Some(&node)).await;
        Ok(())
    }

    /// Log a message against this job, prefixed
    /// `[tag:progress+1/total]`.
    pub fn log(&self, level: LogLevel, msg: &str) {
        self.cluster.log(
            level,
            &format!("[{}:{}/{}] {}", self.tag, self.progress + 1, self.total, msg),
        );
    }

    async fn persist_status(&self, node: Option<&str>) {
        if let Some(store) = self.store() {
            if let Err(e) = store.set_status(&self.id, self.status.as_str(), node).await {
                self.log(
                    LogLevel::Warning,
                    &format!("failed to record job status: {e}"),
                );
            }
        }
    }

    async fn persist_progress(&self) {
        if let Some(store) = self.store() {
            if let Err(e) = store.set_progress(&self.id, self.progress, self.total).await {
                self.log(
                    LogLevel::Warning,
                    &format!("failed to record job progress: {e}"),
                );
            }
        }
    }
}
