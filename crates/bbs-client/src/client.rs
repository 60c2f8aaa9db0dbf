//! `BbsClient`: typed calls over protobuf-on-HTTP.
//!
//! Every call goes through [`BbsClient::do_request`], which retries any
//! execution failure under the client's [`RetryPolicy`]. That includes
//! mutating calls, so a response lost after the server applied a change
//! leads to a second attempt of the same change.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bbs_models::config::ClientConfig;
use bbs_models::proto::{self, EmbeddedError};
use bbs_models::routes as route;
use bbs_models::{
    ActualLrpGroup, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, Error, ErrorKind,
    RetryPolicy, RouteTable,
};
use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use prost::Message;
use tracing::{debug, error};

use crate::error::{ClientError, ClientResult};
use crate::request::RequestGenerator;
use crate::response::interpret;
use crate::sse::EventSource;

pub(crate) type HttpClient = Client<HttpConnector, Full<Bytes>>;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What a cell should do with a container whose evacuation call failed.
pub const KEEP_CONTAINER: bool = true;
pub const DELETE_CONTAINER: bool = false;

/// Narrows an actual LRP group listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualLrpGroupFilter {
    pub domain: String,
    pub cell_id: String,
}

/// Outcome of an evacuation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evacuation {
    pub keep_container: bool,
}

#[derive(Clone)]
pub struct BbsClient {
    http: HttpClient,
    requests: RequestGenerator,
    retry: RetryPolicy,
    stream_retry: RetryPolicy,
    timeout: Duration,
}

impl BbsClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            http,
            requests: RequestGenerator::new(base_url, Arc::new(RouteTable::bbs()))?,
            retry: RetryPolicy::default(),
            stream_retry: RetryPolicy::new(RetryPolicy::DEFAULT_ATTEMPTS, Duration::from_secs(1)),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn from_config(config: &ClientConfig, retry: RetryPolicy) -> ClientResult<Self> {
        Ok(Self::new(&config.url)?
            .with_retry(retry)
            .with_timeout(config.request_timeout()))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry policy for (re)connecting event streams.
    pub fn with_stream_retry(mut self, retry: RetryPolicy) -> Self {
        self.stream_retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.requests.base_url()
    }

    // ── Transport ──────────────────────────────────────────────────

    /// Send `body` to the named route and interpret the answer.
    ///
    /// A request that cannot be built fails at once. Anything that fails
    /// after that (transport errors, timeouts, router errors, unreadable
    /// or failed responses) is retried until the policy is exhausted, and
    /// the last failure is returned. `None` means a successful response
    /// without a protobuf body.
    pub async fn do_request<Req, Resp>(
        &self,
        route_name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: &Req,
    ) -> ClientResult<Option<Resp>>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let payload = Bytes::from(body.encode_to_vec());
        let mut attempt = 1;
        loop {
            debug!(attempt, route = route_name, "creating request");
            let request = self
                .requests
                .create_request(route_name, params, query, payload.clone())
                .inspect_err(|err| error!(error = %err, route = route_name, "failed creating request"))?;
            let path = request.uri().path().to_string();

            let started = Instant::now();
            match self.execute::<Resp>(request).await {
                Ok(response) => {
                    debug!(
                        route = route_name,
                        %path,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "request complete"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    error!(error = %err, route = route_name, %path, attempt, "request failed");
                    if !self.retry.should_retry(attempt) {
                        return Err(err);
                    }
                    tokio::time::sleep(self.retry.pause_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn execute<Resp>(&self, request: Request<Full<Bytes>>) -> ClientResult<Option<Resp>>
    where
        Resp: Message + Default,
    {
        let exchange = async {
            let response = self.http.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| Error::invalid_response(format!("failed to read body: {e}")))?
                .to_bytes();
            Ok::<_, ClientError>(interpret(parts.status, &parts.headers, body)?)
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    /// Call a route whose response embeds a logical error, and surface it.
    async fn call<Req, Resp>(&self, route_name: &str, request: &Req) -> ClientResult<Resp>
    where
        Req: Message,
        Resp: Message + Default + EmbeddedError,
    {
        let response: Resp = self
            .do_request(route_name, &[], &[], request)
            .await?
            .unwrap_or_default();
        match response.embedded_error() {
            Some(err) => Err(err.into()),
            None => Ok(response),
        }
    }

    // ── Ping and domains ───────────────────────────────────────────

    /// Whether the server answers and reports itself available.
    pub async fn ping(&self) -> bool {
        match self.do_request::<_, proto::PingResponse>(route::PING, &[], &[], &()).await {
            Ok(response) => response.is_some_and(|r| r.available),
            Err(_) => false,
        }
    }

    pub async fn domains(&self) -> ClientResult<Vec<String>> {
        let response: proto::DomainsResponse = self.call(route::DOMAINS, &()).await?;
        Ok(response.domains)
    }

    pub async fn upsert_domain(&self, domain: &str, ttl: Duration) -> ClientResult<()> {
        let request = proto::UpsertDomainRequest {
            domain: domain.to_string(),
            ttl: u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX),
        };
        self.call::<_, proto::UpsertDomainResponse>(route::UPSERT_DOMAIN, &request)
            .await?;
        Ok(())
    }

    // ── Actual LRP reads ───────────────────────────────────────────

    pub async fn actual_lrp_groups(
        &self,
        filter: &ActualLrpGroupFilter,
    ) -> ClientResult<Vec<ActualLrpGroup>> {
        let request = proto::ActualLrpGroupsRequest {
            domain: filter.domain.clone(),
            cell_id: filter.cell_id.clone(),
        };
        let response: proto::ActualLrpGroupsResponse =
            self.call(route::ACTUAL_LRP_GROUPS, &request).await?;
        groups(response.actual_lrp_groups)
    }

    pub async fn actual_lrp_groups_by_process_guid(
        &self,
        process_guid: &str,
    ) -> ClientResult<Vec<ActualLrpGroup>> {
        let request = proto::ActualLrpGroupsByProcessGuidRequest {
            process_guid: process_guid.to_string(),
        };
        let response: proto::ActualLrpGroupsResponse = self
            .call(route::ACTUAL_LRP_GROUPS_BY_PROCESS_GUID, &request)
            .await?;
        groups(response.actual_lrp_groups)
    }

    pub async fn actual_lrp_group_by_process_guid_and_index(
        &self,
        process_guid: &str,
        index: i32,
    ) -> ClientResult<ActualLrpGroup> {
        let request = proto::ActualLrpGroupByProcessGuidAndIndexRequest {
            process_guid: process_guid.to_string(),
            index,
        };
        let response: proto::ActualLrpGroupResponse = self
            .call(route::ACTUAL_LRP_GROUP_BY_PROCESS_GUID_AND_INDEX, &request)
            .await?;
        let group = response
            .actual_lrp_group
            .ok_or_else(|| Error::new(ErrorKind::InvalidResponse, "response has no actual lrp group"))?;
        Ok(group.try_into()?)
    }

    // ── Actual LRP lifecycle ───────────────────────────────────────

    pub async fn claim_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> ClientResult<()> {
        let request = proto::ClaimActualLrpRequest {
            process_guid: process_guid.to_string(),
            index,
            actual_lrp_instance_key: Some(instance_key.into()),
        };
        self.lifecycle(route::CLAIM_ACTUAL_LRP, &request).await
    }

    pub async fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ClientResult<()> {
        let request = proto::StartActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
            actual_lrp_net_info: Some(net_info.into()),
        };
        self.lifecycle(route::START_ACTUAL_LRP, &request).await
    }

    pub async fn crash_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        error_message: &str,
    ) -> ClientResult<()> {
        let request = proto::CrashActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
            error_message: error_message.to_string(),
        };
        self.lifecycle(route::CRASH_ACTUAL_LRP, &request).await
    }

    pub async fn fail_actual_lrp(&self, key: &ActualLrpKey, error_message: &str) -> ClientResult<()> {
        let request = proto::FailActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            error_message: error_message.to_string(),
        };
        self.lifecycle(route::FAIL_ACTUAL_LRP, &request).await
    }

    pub async fn remove_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> ClientResult<()> {
        let request = proto::RemoveActualLrpRequest {
            process_guid: process_guid.to_string(),
            index,
            actual_lrp_instance_key: instance_key.map(Into::into),
        };
        self.lifecycle(route::REMOVE_ACTUAL_LRP, &request).await
    }

    pub async fn retire_actual_lrp(&self, key: &ActualLrpKey) -> ClientResult<()> {
        let request = proto::RetireActualLrpRequest {
            actual_lrp_key: Some(key.into()),
        };
        self.lifecycle(route::RETIRE_ACTUAL_LRP, &request).await
    }

    async fn lifecycle<Req: Message>(&self, route_name: &str, request: &Req) -> ClientResult<()> {
        self.call::<_, proto::ActualLrpLifecycleResponse>(route_name, request)
            .await?;
        Ok(())
    }

    // ── Evacuation ─────────────────────────────────────────────────
    //
    // On failure the caller should fall back to the container disposition
    // documented on each method.

    /// Falls back to [`KEEP_CONTAINER`].
    pub async fn evacuate_claimed_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ClientResult<Evacuation> {
        let request = proto::EvacuateClaimedActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
        };
        self.evacuation(route::EVACUATE_CLAIMED_ACTUAL_LRP, &request).await
    }

    /// Falls back to [`KEEP_CONTAINER`].
    pub async fn evacuate_running_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
        ttl: u64,
    ) -> ClientResult<Evacuation> {
        let request = proto::EvacuateRunningActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
            actual_lrp_net_info: Some(net_info.into()),
            ttl,
        };
        self.evacuation(route::EVACUATE_RUNNING_ACTUAL_LRP, &request).await
    }

    /// Falls back to [`DELETE_CONTAINER`].
    pub async fn evacuate_stopped_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ClientResult<Evacuation> {
        let request = proto::EvacuateStoppedActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
        };
        self.evacuation(route::EVACUATE_STOPPED_ACTUAL_LRP, &request).await
    }

    /// Falls back to [`DELETE_CONTAINER`].
    pub async fn evacuate_crashed_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        error_message: &str,
    ) -> ClientResult<Evacuation> {
        let request = proto::EvacuateCrashedActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
            error_message: error_message.to_string(),
        };
        self.evacuation(route::EVACUATE_CRASHED_ACTUAL_LRP, &request).await
    }

    pub async fn remove_evacuating_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ClientResult<()> {
        let request = proto::RemoveEvacuatingActualLrpRequest {
            actual_lrp_key: Some(key.into()),
            actual_lrp_instance_key: Some(instance_key.into()),
        };
        self.lifecycle(route::REMOVE_EVACUATING_ACTUAL_LRP, &request).await
    }

    async fn evacuation<Req: Message>(&self, route_name: &str, request: &Req) -> ClientResult<Evacuation> {
        let response: proto::EvacuationResponse = self.call(route_name, request).await?;
        Ok(Evacuation {
            keep_container: response.keep_container,
        })
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Returns whether the cell should go ahead and run the task.
    pub async fn start_task(&self, task_guid: &str, cell_id: &str) -> ClientResult<bool> {
        let request = proto::StartTaskRequest {
            task_guid: task_guid.to_string(),
            cell_id: cell_id.to_string(),
        };
        let response: proto::StartTaskResponse = self.call(route::START_TASK, &request).await?;
        Ok(response.should_start)
    }

    pub async fn cancel_task(&self, task_guid: &str) -> ClientResult<()> {
        self.task_by_guid(route::CANCEL_TASK, task_guid).await
    }

    pub async fn resolving_task(&self, task_guid: &str) -> ClientResult<()> {
        self.task_by_guid(route::RESOLVING_TASK, task_guid).await
    }

    pub async fn delete_task(&self, task_guid: &str) -> ClientResult<()> {
        self.task_by_guid(route::DELETE_TASK, task_guid).await
    }

    pub async fn fail_task(&self, task_guid: &str, failure_reason: &str) -> ClientResult<()> {
        let request = proto::FailTaskRequest {
            task_guid: task_guid.to_string(),
            failure_reason: failure_reason.to_string(),
        };
        self.task_lifecycle(route::FAIL_TASK, &request).await
    }

    pub async fn complete_task(
        &self,
        task_guid: &str,
        cell_id: &str,
        failed: bool,
        failure_reason: &str,
        result: &str,
    ) -> ClientResult<()> {
        let request = proto::CompleteTaskRequest {
            task_guid: task_guid.to_string(),
            cell_id: cell_id.to_string(),
            failed,
            failure_reason: failure_reason.to_string(),
            result: result.to_string(),
        };
        self.task_lifecycle(route::COMPLETE_TASK, &request).await
    }

    async fn task_by_guid(&self, route_name: &str, task_guid: &str) -> ClientResult<()> {
        let request = proto::TaskGuidRequest {
            task_guid: task_guid.to_string(),
        };
        self.task_lifecycle(route_name, &request).await
    }

    async fn task_lifecycle<Req: Message>(&self, route_name: &str, request: &Req) -> ClientResult<()> {
        self.call::<_, proto::TaskLifecycleResponse>(route_name, request)
            .await?;
        Ok(())
    }

    // ── Subscriptions ──────────────────────────────────────────────

    async fn subscribe(&self, route_name: &str, cell_id: &str) -> ClientResult<EventSource> {
        let filter = proto::EventsByCellId {
            cell_id: cell_id.to_string(),
        };
        let request = self.requests.create_request(
            route_name,
            &[],
            &[],
            Bytes::from(filter.encode_to_vec()),
        )?;
        debug!(route = route_name, cell_id, "subscribing to events");
        EventSource::connect(self.http.clone(), request, self.stream_retry).await
    }

    /// Actual LRP group events.
    pub async fn subscribe_to_events(&self) -> ClientResult<EventSource> {
        self.subscribe(route::EVENT_STREAM_R0, "").await
    }

    pub async fn subscribe_to_events_by_cell_id(&self, cell_id: &str) -> ClientResult<EventSource> {
        self.subscribe(route::EVENT_STREAM_R0, cell_id).await
    }

    /// Instance-keyed actual LRP events; an empty `cell_id` means all cells.
    pub async fn subscribe_to_instance_events(&self, cell_id: &str) -> ClientResult<EventSource> {
        self.subscribe(route::LRP_INSTANCE_EVENT_STREAM_R1, cell_id).await
    }

    pub async fn subscribe_to_task_events(&self) -> ClientResult<EventSource> {
        self.subscribe(route::TASK_EVENT_STREAM_R0, "").await
    }
}

fn groups(wire: Vec<proto::ActualLrpGroup>) -> ClientResult<Vec<ActualLrpGroup>> {
    wire.into_iter()
        .map(|group| group.try_into().map_err(ClientError::from))
        .collect()
}
