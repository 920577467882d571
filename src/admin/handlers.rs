use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::AdminState;
use crate::container::ContainerError;
use crate::descriptor::{
    ApplicationDescriptor, ConcurrencyControlMode, DescriptorError, Dispatch, HandlerDefinition,
};
use crate::routing::{MappingRule, MatchExpression, SelectionMode};
use crate::sip::{Method, NameAddr, SipRequest, SipUri};

impl IntoResponse for ContainerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ContainerError::UnknownApplication(_) => StatusCode::NOT_FOUND,
            ContainerError::Descriptor(DescriptorError::NotFound(_)) => StatusCode::CONFLICT,
            ContainerError::Descriptor(DescriptorError::InvalidTimeout { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ContainerError>;

fn application(state: &AdminState, name: &str) -> ApiResult<Arc<ApplicationDescriptor>> {
    state
        .container
        .get(name)
        .ok_or_else(|| ContainerError::UnknownApplication(name.to_string()))
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub applications: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub name: String,
    pub deployment_id: Uuid,
    pub handlers: usize,
    pub mappings: usize,
    pub listeners: usize,
    pub main_handler_mode: bool,
}

impl From<&ApplicationDescriptor> for ApplicationSummary {
    fn from(app: &ApplicationDescriptor) -> Self {
        Self {
            name: app.name().to_string(),
            deployment_id: app.deployment_id(),
            handlers: app.handlers().len(),
            mappings: app.mappings().len(),
            listeners: app.listeners().len(),
            main_handler_mode: app.is_main_handler_mode(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MappingView {
    pub handler: String,
    pub pattern: MatchExpression,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub deployment_name: String,
    pub display_name: Option<String>,
    pub context_path: String,
    pub default_session_timeout: i64,
    pub distributable: bool,
    pub session_manager_factory: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    pub name: String,
    pub deployment_id: Uuid,
    pub description: Option<String>,
    pub small_icon: Option<String>,
    pub large_icon: Option<String>,
    pub proxy_timeout_secs: Option<u64>,
    pub application_session_timeout_secs: Option<u64>,
    pub concurrency_control: ConcurrencyControlMode,
    pub mode: SelectionMode,
    pub default_handler: Option<String>,
    pub handlers: BTreeMap<String, HandlerDefinition>,
    pub mappings: Vec<MappingView>,
    pub listeners: Vec<String>,
    pub has_application_key: bool,
    pub settings: SettingsView,
}

impl From<&ApplicationDescriptor> for ApplicationDetail {
    fn from(app: &ApplicationDescriptor) -> Self {
        let table = app.mappings();
        let settings = app.settings();
        Self {
            name: app.name().to_string(),
            deployment_id: app.deployment_id(),
            description: app.description().map(str::to_string),
            small_icon: app.small_icon().map(str::to_string),
            large_icon: app.large_icon().map(str::to_string),
            proxy_timeout_secs: app.proxy_timeout().map(|d| d.as_secs()),
            application_session_timeout_secs: app
                .application_session_timeout()
                .map(|d| d.as_secs()),
            concurrency_control: app.concurrency_control_mode(),
            mode: table.mode(),
            default_handler: table.default_handler().map(str::to_string),
            handlers: app
                .handlers()
                .all()
                .iter()
                .map(|(name, def)| (name.to_string(), HandlerDefinition::clone(def)))
                .collect(),
            mappings: table
                .rules()
                .map(|rule| MappingView {
                    handler: rule.handler().to_string(),
                    pattern: rule.pattern().clone(),
                    description: rule.describe(),
                })
                .collect(),
            listeners: app.listeners().to_vec(),
            has_application_key: app.has_application_key(),
            settings: SettingsView {
                deployment_name: settings.deployment_name.clone(),
                display_name: settings.display_name.clone(),
                context_path: settings.context_path.clone(),
                default_session_timeout: settings.default_session_timeout,
                distributable: settings.distributable,
                session_manager_factory: settings.session_manager_factory.name().to_string(),
            },
        }
    }
}

/// Request body for the resolve endpoint. From and To default to the request URI.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub method: Method,
    pub uri: SipUri,
    #[serde(default)]
    pub from: Option<NameAddr>,
    #[serde(default)]
    pub to: Option<NameAddr>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl From<ResolveRequest> for SipRequest {
    fn from(body: ResolveRequest) -> Self {
        let mut builder = SipRequest::builder(body.method, body.uri);
        if let Some(from) = body.from {
            builder = builder.from(from);
        }
        if let Some(to) = body.to {
            builder = builder.to(to);
        }
        for (name, value) in body.headers {
            builder = builder.header(name, value);
        }
        builder.build()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub outcome: String,
    pub handler: Option<String>,
    pub handler_class: Option<String>,
    pub rule_index: Option<usize>,
    pub application_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerRequest {
    pub listener: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConcurrencyRequest {
    pub mode: ConcurrencyControlMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Removed {
    pub removed: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        applications: state.container.len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

pub async fn list_applications(State(state): State<AdminState>) -> Json<Vec<ApplicationSummary>> {
    let summaries = state
        .container
        .names()
        .iter()
        .filter_map(|name| state.container.get(name))
        .map(|app| ApplicationSummary::from(app.as_ref()))
        .collect();
    Json(summaries)
}

pub async fn get_application(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApplicationDetail>> {
    let app = application(&state, &name)?;
    Ok(Json(ApplicationDetail::from(app.as_ref())))
}

pub async fn undeploy_application(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .container
        .undeploy(&name)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ContainerError::UnknownApplication(name))
}

pub async fn resolve(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    let app = application(&state, &name)?;
    let request = SipRequest::from(body);
    let dispatch = app.dispatch(&request)?;

    let (outcome, rule_index) = match &dispatch {
        Dispatch::Matched { rule_index, .. } => ("matched", Some(*rule_index)),
        Dispatch::Default { .. } => ("default", None),
        Dispatch::Unroutable => ("unroutable", None),
    };
    Ok(Json(ResolveResponse {
        outcome: outcome.to_string(),
        handler: dispatch.handler().map(|h| h.name.clone()),
        handler_class: dispatch.handler().map(|h| h.handler_class.clone()),
        rule_index,
        application_key: app.application_key(&request),
    }))
}

pub async fn add_listener(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(body): Json<ListenerRequest>,
) -> ApiResult<(StatusCode, Json<Vec<String>>)> {
    let app = application(&state, &name)?;
    app.add_listener(body.listener);
    Ok((StatusCode::CREATED, Json(app.listeners().to_vec())))
}

pub async fn remove_listener(
    State(state): State<AdminState>,
    Path((name, listener)): Path<(String, String)>,
) -> ApiResult<Json<Removed>> {
    let app = application(&state, &name)?;
    Ok(Json(Removed { removed: app.remove_listener(&listener) }))
}

pub async fn add_mapping(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(rule): Json<MappingRule>,
) -> ApiResult<(StatusCode, Json<ApplicationSummary>)> {
    let app = application(&state, &name)?;
    app.add_mapping(rule);
    Ok((StatusCode::CREATED, Json(ApplicationSummary::from(app.as_ref()))))
}

pub async fn remove_mapping(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(rule): Json<MappingRule>,
) -> ApiResult<Json<Removed>> {
    let app = application(&state, &name)?;
    Ok(Json(Removed { removed: app.remove_mapping(&rule) }))
}

pub async fn set_concurrency(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(body): Json<ConcurrencyRequest>,
) -> ApiResult<Json<ConcurrencyRequest>> {
    let app = application(&state, &name)?;
    app.set_concurrency_control_mode(body.mode);
    Ok(Json(ConcurrencyRequest { mode: app.concurrency_control_mode() }))
}
