use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::auth::{login, retry_with_backoff, BackoffPolicy, Session};
use crate::config::Credentials;
use crate::logger::{record, TrafficLog, TrafficLogMode};
use crate::portal::{
    check_data_session_path, control_change_accepted, control_changeset, control_page_path,
    parse_outdoor_weather, parse_zone_name, zone_list_path, DEFAULT_BASE_URL, SUBMIT_CONTROL_PATH,
    XHR_HEADER,
};
use crate::types::{OutdoorWeather, ZoneRecord};
use crate::zone::Zone;
use crate::{Error, Result};

/// Safety bound on zone-list paging. The portal ends the list with an empty page.
pub const DEFAULT_MAX_ZONE_PAGES: u32 = 5;

pub struct HtccClientBuilder {
    credentials: Credentials,
    base_url: String,
    max_zone_pages: u32,
    backoff: BackoffPolicy,
    log_mode: Option<TrafficLogMode>,
    log_path: Option<String>,
}

impl HtccClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_zone_pages: DEFAULT_MAX_ZONE_PAGES,
            backoff: BackoffPolicy::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_zone_pages(mut self, pages: u32) -> Self {
        self.max_zone_pages = pages;
        self
    }

    pub fn max_auth_attempts(mut self, attempts: u32) -> Self {
        self.backoff.max_attempts = attempts;
        self
    }

    /// Base of the login backoff; attempt `i` waits `unit * 2^i`.
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff.unit = unit;
        self
    }

    pub fn traffic_log(mut self, mode: TrafficLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<HtccClient> {
        let traffic = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(TrafficLog::new(mode, &path)?)),
            _ => None,
        };

        Ok(HtccClient {
            credentials: self.credentials,
            base_url: self.base_url,
            max_zone_pages: self.max_zone_pages,
            backoff: self.backoff,
            session: None,
            device_names: Mutex::new(HashMap::new()),
            traffic,
        })
    }
}

/// Client for one Total Connect Comfort account.
///
/// Owns the portal session and a device-name cache. All reads and writes go
/// through it; [`Zone`] handles borrow it. Not meant to be shared across tasks.
pub struct HtccClient {
    credentials: Credentials,
    base_url: String,
    max_zone_pages: u32,
    backoff: BackoffPolicy,
    session: Option<Session>,
    device_names: Mutex<HashMap<u64, String>>,
    traffic: Option<Mutex<TrafficLog>>,
}

impl HtccClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> HtccClientBuilder {
        HtccClientBuilder::new(Credentials::new(username, password))
    }

    /// Builds a client with default settings and logs in.
    pub async fn login(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let mut client = Self::builder(username, password).build()?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Like [`HtccClient::login`], with credentials from the environment (see [`Credentials::from_env`]).
    pub async fn from_env() -> Result<Self> {
        let mut client = HtccClientBuilder::new(Credentials::from_env()?).build()?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Logs in, backing off exponentially while the portal rate-limits us or
    /// skips the post-login redirect. Wrong credentials fail on the first try.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.session = None;

        let base_url = self.base_url.as_str();
        let credentials = &self.credentials;
        let traffic = self.traffic.as_ref();
        let session = retry_with_backoff(
            &self.backoff,
            |_| login(base_url, credentials, traffic),
            tokio::time::sleep,
        )
        .await?;

        info!(location_id = session.location_id, "logged in to portal");
        self.session = Some(session);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn location_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.location_id)
    }

    /// Every zone on the account, each merged from the zone list, its name,
    /// its data session and the outdoor weather on its control page.
    pub async fn zones_info(&self) -> Result<Vec<ZoneRecord>> {
        let location_id = self.session()?.location_id;

        let mut entries = Vec::new();
        for page in 1..=self.max_zone_pages {
            debug!(location_id, page, "fetching zone list page");
            let body = self
                .request_text(Method::POST, &zone_list_path(location_id, page), true, None)
                .await?;
            let data: Option<Vec<Map<String, Value>>> = decode_json(&body, "GetZoneListData")?;
            match data {
                Some(zones) if !zones.is_empty() => entries.extend(zones),
                _ => {
                    debug!(page, "zone list page is empty");
                    break;
                }
            }
        }

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut record = ZoneRecord::new(entry);
            let device_id = record.device_id()?;

            let name = self.device_name(device_id).await?;
            record.insert("Name", Value::String(name));
            record.merge(self.check_data_session(device_id).await?);
            record.merge(self.outdoor_weather(device_id).await?.into_fields());
            records.push(record);
        }
        Ok(records)
    }

    pub async fn all_zones(&self) -> Result<Vec<Zone<'_>>> {
        self.zones_info()
            .await?
            .into_iter()
            .map(|record| Zone::from_record(self, record))
            .collect()
    }

    pub async fn zone_by_name(&self, name: &str) -> Result<Zone<'_>> {
        let record = self
            .zones_info()
            .await?
            .into_iter()
            .find(|r| r.name() == Some(name))
            .ok_or_else(|| Error::ZoneNameNotFound(name.to_string()))?;
        Zone::from_record(self, record)
    }

    pub async fn zone_by_device_id(&self, device_id: u64) -> Result<Zone<'_>> {
        Zone::from_device_id(self, device_id).await
    }

    /// Posts a control-screen changeset. Keys outside the portal's schema are
    /// refused before anything is sent; unspecified keys go out as null.
    pub async fn submit_raw_control_changes(
        &self,
        device_id: u64,
        changes: &Map<String, Value>,
    ) -> Result<()> {
        let changeset = control_changeset(device_id, changes)?;
        debug!(device_id, ?changeset, "submitting control changes");
        record(self.traffic.as_ref(), |log| log.log_command(device_id));

        let body = self
            .request_text(Method::POST, SUBMIT_CONTROL_PATH, false, Some(&changeset))
            .await?;
        let response: Value = decode_json(&body, "SubmitControlScreenChanges")?;
        if !control_change_accepted(&response) {
            return Err(Error::ControlChangeRejected(response));
        }

        info!(device_id, "control changes accepted");
        Ok(())
    }

    // -- Helpers --

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotAuthenticated)
    }

    fn names(&self) -> MutexGuard<'_, HashMap<u64, String>> {
        self.device_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Zone names are scraped from the control page heading once per device.
    async fn device_name(&self, device_id: u64) -> Result<String> {
        let cached = self.names().get(&device_id).cloned();
        if let Some(name) = cached {
            debug!(device_id, %name, "zone name from cache");
            return Ok(name);
        }

        let html = self
            .request_text(Method::GET, &control_page_path(device_id), false, None)
            .await?;
        let name = parse_zone_name(&html)?;
        debug!(device_id, %name, "zone name from portal");
        self.names().insert(device_id, name.clone());
        Ok(name)
    }

    async fn check_data_session(&self, device_id: u64) -> Result<Map<String, Value>> {
        let body = self
            .request_text(Method::GET, &check_data_session_path(device_id), true, None)
            .await?;
        decode_json(&body, "CheckDataSession")
    }

    async fn outdoor_weather(&self, device_id: u64) -> Result<OutdoorWeather> {
        let html = self
            .request_text(Method::GET, &control_page_path(device_id), false, None)
            .await?;
        Ok(parse_outdoor_weather(&html))
    }

    async fn request_text(
        &self,
        method: Method,
        path: &str,
        xhr: bool,
        json: Option<&Map<String, Value>>,
    ) -> Result<String> {
        let session = self.session()?;
        let url = format!("{}{}", self.base_url, path);
        record(self.traffic.as_ref(), |log| log.log_request(method.as_str(), path, json));

        let mut req = session.request(method, &url);
        if xhr {
            req = req.header(XHR_HEADER.0, XHR_HEADER.1);
        }
        if let Some(body) = json {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let status_err = resp.error_for_status_ref().err();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        record(self.traffic.as_ref(), |log| log.log_response(status, &final_url, &body));

        if let Some(e) = status_err {
            return Err(e.into());
        }
        Ok(body)
    }
}

fn decode_json<T: DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        warn!(endpoint, body, "unable to decode JSON from portal");
        Error::Json(e)
    })
}
