//! Redis-backed job store.
//!
//! Records are JSON documents. Every mutation runs as one Lua script, so it
//! is atomic on the server; the claim pops the oldest id from a sorted set
//! and flips its status only if the document still says QUEUED.
//!
//! The namespace is wrapped in braces and used as a hash tag, so every key
//! lands in one cluster slot. The claim script builds job keys from ids it
//! reads out of the queued set; the shared slot keeps that valid on a
//! Redis Cluster as well as on a standalone server.
//!
//! ```text
//! {<ns>}:project:<projectId>          project JSON
//! {<ns>}:project:<projectId>:assets   list of asset JSON (upload order)
//! {<ns>}:project:<projectId>:active   id of the QUEUED/PROCESSING job
//! {<ns>}:job:<jobId>                  job JSON
//! {<ns>}:job:<jobId>:artifacts        list of artifact JSON
//! {<ns>}:jobs:queued                  zset of job ids scored by enqueue sequence
//! {<ns>}:jobs:seq                     enqueue sequence counter
//! ```

use async_trait::async_trait;
use beatcut_models::{
    stage, Artifact, Asset, ClaimedJob, Job, JobId, JobStatus, NewArtifact, Project, ProjectId,
};
use chrono::{SecondsFormat, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// Pop ids from the queued set until one is still QUEUED, then claim it.
///
/// Job keys are `ARGV[1] .. id` rather than entries of KEYS, since the id
/// is only known inside the script. ARGV[1] carries the namespace hash tag,
/// so those keys share the slot of KEYS[1].
const CLAIM_SCRIPT: &str = r#"
local prefix = ARGV[1]
while true do
  local ids = redis.call('ZRANGE', KEYS[1], 0, 0)
  if #ids == 0 then
    return false
  end
  local id = ids[1]
  redis.call('ZREM', KEYS[1], id)
  local raw = redis.call('GET', prefix .. id)
  if raw then
    local job = cjson.decode(raw)
    if job.status == 'QUEUED' then
      job.status = 'PROCESSING'
      job.stage = ARGV[3]
      job.progress = 0
      job.startedAt = ARGV[2]
      job.updatedAt = ARGV[2]
      local encoded = cjson.encode(job)
      redis.call('SET', prefix .. id, encoded)
      return encoded
    end
  end
end
"#;

/// Apply a field patch only while the job is PROCESSING.
///
/// Returns `{'ok', job}`, `{'missing'}` or `{'status', actual}`. With
/// ARGV[2] == '1' the project's active-job marker is released.
const UPDATE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return {'missing'}
end
local job = cjson.decode(raw)
if job.status ~= 'PROCESSING' then
  return {'status', job.status}
end
local patch = cjson.decode(ARGV[1])
for k, v in pairs(patch) do
  job[k] = v
end
local encoded = cjson.encode(job)
redis.call('SET', KEYS[1], encoded)
if ARGV[2] == '1' and redis.call('GET', KEYS[2]) == job.id then
  redis.call('DEL', KEYS[2])
end
return {'ok', encoded}
"#;

/// Create a job unless the project has an active one or no video.
///
/// Returns `{'ok'}`, `{'no_project'}`, `{'active', jobId}` or `{'no_video'}`.
const ENQUEUE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {'no_project'}
end
local active = redis.call('GET', KEYS[3])
if active then
  return {'active', active}
end
local has_video = false
for _, raw in ipairs(redis.call('LRANGE', KEYS[2], 0, -1)) do
  if cjson.decode(raw).kind == 'VIDEO' then
    has_video = true
    break
  end
end
if not has_video then
  return {'no_video'}
end
redis.call('SET', KEYS[4], ARGV[1])
redis.call('SET', KEYS[3], ARGV[2])
local seq = redis.call('INCR', KEYS[6])
redis.call('ZADD', KEYS[5], seq, ARGV[2])
return {'ok'}
"#;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "beatcut".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            namespace: std::env::var("STORE_NAMESPACE").unwrap_or_else(|_| "beatcut".to_string()),
        }
    }
}

/// Job store on Redis.
pub struct RedisJobStore {
    client: redis::Client,
    /// Hash-tagged namespace, e.g. `{beatcut}`.
    ns: String,
    claim: Script,
    update: Script,
    enqueue: Script,
}

impl RedisJobStore {
    /// Create a new store. Does not connect yet.
    pub fn new(config: StoreConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            ns: format!("{{{}}}", config.namespace),
            claim: Script::new(CLAIM_SCRIPT),
            update: Script::new(UPDATE_SCRIPT),
            enqueue: Script::new(ENQUEUE_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    /// Round-trip a PING.
    pub async fn check_connectivity(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn job_prefix(&self) -> String {
        format!("{}:job:", self.ns)
    }

    fn job_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}", self.ns, job_id)
    }

    fn artifacts_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}:artifacts", self.ns, job_id)
    }

    fn project_key(&self, project_id: &ProjectId) -> String {
        format!("{}:project:{}", self.ns, project_id)
    }

    fn assets_key(&self, project_id: &ProjectId) -> String {
        format!("{}:project:{}:assets", self.ns, project_id)
    }

    fn active_key(&self, project_id: &ProjectId) -> String {
        format!("{}:project:{}:active", self.ns, project_id)
    }

    fn queued_key(&self) -> String {
        format!("{}:jobs:queued", self.ns)
    }

    fn seq_key(&self) -> String {
        format!("{}:jobs:seq", self.ns)
    }

    /// Run the conditional update script for a PROCESSING job.
    async fn patch_processing(&self, job_id: &JobId, patch: Value, terminal: bool) -> QueueResult<Job> {
        // The active marker lives under the project; read it from the job first.
        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;

        let mut conn = self.conn().await?;
        let reply: Vec<String> = self
            .update
            .key(self.job_key(job_id))
            .key(self.active_key(&job.project_id))
            .arg(patch.to_string())
            .arg(if terminal { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await?;

        match reply.first().map(String::as_str) {
            Some("ok") => {
                let raw = reply
                    .get(1)
                    .ok_or_else(|| QueueError::corrupt("update reply without job"))?;
                Ok(serde_json::from_str(raw)?)
            }
            Some("missing") => Err(QueueError::JobNotFound(job_id.clone())),
            Some("status") => {
                let status = reply
                    .get(1)
                    .and_then(|s| s.parse::<JobStatus>().ok())
                    .ok_or_else(|| QueueError::corrupt(format!("job {} has no status", job_id)))?;
                Err(QueueError::NotProcessing {
                    job_id: job_id.clone(),
                    status,
                })
            }
            _ => Err(QueueError::corrupt(format!("unexpected update reply: {:?}", reply))),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Patch fields shared by progress and terminal updates.
fn base_patch(stage: &str, progress: u8, log_snippet: Option<String>) -> serde_json::Map<String, Value> {
    let mut patch = serde_json::Map::new();
    patch.insert("stage".into(), json!(stage));
    patch.insert("progress".into(), json!(progress.min(100)));
    patch.insert("updatedAt".into(), json!(now_rfc3339()));
    if let Some(snippet) = log_snippet {
        patch.insert("logSnippet".into(), json!(snippet));
    }
    patch
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn claim_next_queued_job(&self) -> QueueResult<Option<ClaimedJob>> {
        let mut conn = self.conn().await?;
        let claimed: Option<String> = self
            .claim
            .key(self.queued_key())
            .arg(self.job_prefix())
            .arg(now_rfc3339())
            .arg(stage::ANALYZE)
            .invoke_async(&mut conn)
            .await?;

        let Some(raw) = claimed else {
            return Ok(None);
        };
        let job: Job = serde_json::from_str(&raw)?;
        debug!(job_id = %job.id, "Claimed job");

        let Some(project) = self.get_project_by_id(&job.project_id).await? else {
            warn!(job_id = %job.id, "Claimed job references a missing project");
            self.mark_job_failed(&job.id, "Project not found", None).await?;
            return Ok(None);
        };
        let assets = self.list_assets_for_project(&job.project_id).await?;

        Ok(Some(ClaimedJob {
            job,
            project,
            assets,
        }))
    }

    async fn update_job_progress(
        &self,
        job_id: &JobId,
        stage: &str,
        progress: u8,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let patch = base_patch(stage, progress, log_snippet);
        self.patch_processing(job_id, Value::Object(patch), false).await
    }

    async fn mark_job_failed(
        &self,
        job_id: &JobId,
        error: &str,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let mut patch = base_patch(stage::FAILED, 100, log_snippet);
        patch.insert("status".into(), json!(JobStatus::Failed.as_str()));
        patch.insert("error".into(), json!(error));
        patch.insert("completedAt".into(), json!(now_rfc3339()));
        let job = self.patch_processing(job_id, Value::Object(patch), true).await?;
        info!(job_id = %job_id, "Job failed: {}", error);
        Ok(job)
    }

    async fn mark_job_completed(
        &self,
        job_id: &JobId,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let mut patch = base_patch(stage::COMPLETED, 100, log_snippet);
        patch.insert("status".into(), json!(JobStatus::Completed.as_str()));
        patch.insert("completedAt".into(), json!(now_rfc3339()));
        let job = self.patch_processing(job_id, Value::Object(patch), true).await?;
        info!(job_id = %job_id, "Job completed");
        Ok(job)
    }

    async fn create_artifact(&self, artifact: NewArtifact) -> QueueResult<Artifact> {
        let artifact = artifact.into_artifact();
        let mut conn = self.conn().await?;
        conn.rpush::<_, _, ()>(
            self.artifacts_key(&artifact.job_id),
            serde_json::to_string(&artifact)?,
        )
        .await?;
        Ok(artifact)
    }

    async fn list_artifacts_for_job(&self, job_id: &JobId) -> QueueResult<Vec<Artifact>> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn.lrange(self.artifacts_key(job_id), 0, -1).await?;
        raw.iter()
            .map(|r| serde_json::from_str(r).map_err(QueueError::from))
            .collect()
    }

    async fn list_assets_for_project(&self, project_id: &ProjectId) -> QueueResult<Vec<Asset>> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn.lrange(self.assets_key(project_id), 0, -1).await?;
        raw.iter()
            .map(|r| serde_json::from_str(r).map_err(QueueError::from))
            .collect()
    }

    async fn get_project_by_id(&self, project_id: &ProjectId) -> QueueResult<Option<Project>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(self.project_key(project_id)).await?;
        raw.map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(QueueError::from)
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(self.job_key(job_id)).await?;
        raw.map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(QueueError::from)
    }

    async fn put_project(&self, project: &Project) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(self.project_key(&project.id), serde_json::to_string(project)?)
            .await?;
        Ok(())
    }

    async fn add_asset(&self, asset: &Asset) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(self.project_key(&asset.project_id)).await?;
        if !exists {
            return Err(QueueError::ProjectNotFound(asset.project_id.clone()));
        }
        conn.rpush::<_, _, ()>(
            self.assets_key(&asset.project_id),
            serde_json::to_string(asset)?,
        )
        .await?;
        Ok(())
    }

    async fn enqueue_job(&self, project_id: &ProjectId) -> QueueResult<Job> {
        let job = Job::queued(project_id.clone());
        let mut conn = self.conn().await?;

        let reply: Vec<String> = self
            .enqueue
            .key(self.project_key(project_id))
            .key(self.assets_key(project_id))
            .key(self.active_key(project_id))
            .key(self.job_key(&job.id))
            .key(self.queued_key())
            .key(self.seq_key())
            .arg(serde_json::to_string(&job)?)
            .arg(job.id.as_str())
            .invoke_async(&mut conn)
            .await?;

        match reply.first().map(String::as_str) {
            Some("ok") => {
                info!(job_id = %job.id, project_id = %project_id, "Enqueued job");
                Ok(job)
            }
            Some("no_project") => Err(QueueError::ProjectNotFound(project_id.clone())),
            Some("no_video") => Err(QueueError::NoVideoAssets(project_id.clone())),
            Some("active") => Err(QueueError::ActiveJobExists {
                project_id: project_id.clone(),
                job_id: JobId::from_string(reply.get(1).cloned().unwrap_or_default()),
            }),
            _ => Err(QueueError::corrupt(format!("unexpected enqueue reply: {:?}", reply))),
        }
    }
}
