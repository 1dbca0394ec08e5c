use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::client::HtccClient;
use crate::types::{FanMode, RefreshPolicy, SystemMode, ZoneRecord};
use crate::{Error, Result};

const DISP_TEMP: &str = "/DispTemp";
const DISP_TEMP_AVAILABLE: &str = "/DispTempAvailable";
const DISP_UNITS: &str = "/DispUnits";
const HEAT_SETPOINT: &str = "/latestData/uiData/HeatSetpoint";
const COOL_SETPOINT: &str = "/latestData/uiData/CoolSetpoint";
const SYSTEM_SWITCH_POSITION: &str = "/latestData/uiData/SystemSwitchPosition";
const EQUIPMENT_OUTPUT_STATUS: &str = "/latestData/uiData/EquipmentOutputStatus";
const FAN_MODE: &str = "/latestData/fanData/fanMode";
const FAN_IS_RUNNING: &str = "/latestData/fanData/fanIsRunning";
const OUTDOOR_TEMPERATURE: &str = "/OutdoorTemperature";
const OUTDOOR_HUMIDITY: &str = "/OutdoorHumidity";

/// One thermostat. Reads refetch the whole account listing first (unless the
/// policy is [`RefreshPolicy::Cached`]); writes go straight to the portal and
/// are not reflected until the next read.
pub struct Zone<'a> {
    client: &'a HtccClient,
    device_id: u64,
    info: ZoneRecord,
    refresh: RefreshPolicy,
}

impl<'a> Zone<'a> {
    /// Wraps an already fetched record; no request is made.
    pub fn from_record(client: &'a HtccClient, info: ZoneRecord) -> Result<Self> {
        Ok(Self {
            client,
            device_id: info.device_id()?,
            info,
            refresh: RefreshPolicy::default(),
        })
    }

    /// Looks the device up in the current listing.
    pub async fn from_device_id(client: &'a HtccClient, device_id: u64) -> Result<Self> {
        let mut zone = Self {
            client,
            device_id,
            info: ZoneRecord::default(),
            refresh: RefreshPolicy::default(),
        };
        zone.refresh_zone_info().await?;
        Ok(zone)
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = policy;
        self
    }

    pub fn set_refresh_policy(&mut self, policy: RefreshPolicy) {
        self.refresh = policy;
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Name as of the last refresh.
    pub fn name(&self) -> &str {
        self.info.name().unwrap_or_default()
    }

    pub fn info(&self) -> &ZoneRecord {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ZoneRecord {
        &mut self.info
    }

    /// Replaces the cached record with this device's entry from a fresh listing.
    pub async fn refresh_zone_info(&mut self) -> Result<()> {
        let record = self
            .client
            .zones_info()
            .await?
            .into_iter()
            .find(|r| r.device_id().ok() == Some(self.device_id))
            .ok_or(Error::ZoneNotFound(self.device_id))?;

        debug!(device_id = self.device_id, "refreshed zone info");
        self.info = record;
        Ok(())
    }

    async fn current(&mut self) -> Result<&ZoneRecord> {
        if self.refresh == RefreshPolicy::Always {
            self.refresh_zone_info().await?;
        }
        Ok(&self.info)
    }

    fn with_unit(&self, raw: i64) -> String {
        let unit = self
            .info
            .pointer(DISP_UNITS)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        format!("{raw}\u{00b0}{unit}")
    }

    // -- Readings --

    pub async fn current_temperature_raw(&mut self) -> Result<i64> {
        let info = self.current().await?;
        if !info.bool_at(DISP_TEMP_AVAILABLE)? {
            return Err(Error::ValueUnavailable("current temperature"));
        }
        info.int_at(DISP_TEMP)
    }

    pub async fn current_temperature_with_unit(&mut self) -> Result<String> {
        let raw = self.current_temperature_raw().await?;
        Ok(self.with_unit(raw))
    }

    pub async fn heat_setpoint_raw(&mut self) -> Result<i64> {
        self.current().await?.int_at(HEAT_SETPOINT)
    }

    pub async fn heat_setpoint_with_unit(&mut self) -> Result<String> {
        let raw = self.heat_setpoint_raw().await?;
        Ok(self.with_unit(raw))
    }

    pub async fn cool_setpoint_raw(&mut self) -> Result<i64> {
        self.current().await?.int_at(COOL_SETPOINT)
    }

    pub async fn cool_setpoint_with_unit(&mut self) -> Result<String> {
        let raw = self.cool_setpoint_raw().await?;
        Ok(self.with_unit(raw))
    }

    /// Scraped from the control page; unavailable when the page had no reading.
    pub async fn outdoor_temperature_raw(&mut self) -> Result<i64> {
        let info = self.current().await?;
        match info.pointer(OUTDOOR_TEMPERATURE) {
            Some(Value::Null) | None => Err(Error::ValueUnavailable("outdoor temperature")),
            Some(_) => info.int_at(OUTDOOR_TEMPERATURE),
        }
    }

    pub async fn outdoor_temperature_with_unit(&mut self) -> Result<String> {
        let raw = self.outdoor_temperature_raw().await?;
        Ok(self.with_unit(raw))
    }

    pub async fn outdoor_humidity_raw(&mut self) -> Result<i64> {
        let info = self.current().await?;
        match info.pointer(OUTDOOR_HUMIDITY) {
            Some(Value::Null) | None => Err(Error::ValueUnavailable("outdoor humidity")),
            Some(_) => info.int_at(OUTDOOR_HUMIDITY),
        }
    }

    pub async fn system_mode(&mut self) -> Result<SystemMode> {
        let code = self.current().await?.int_at(SYSTEM_SWITCH_POSITION)?;
        Ok(SystemMode::from_code(code))
    }

    pub async fn fan_mode(&mut self) -> Result<FanMode> {
        let code = self.current().await?.int_at(FAN_MODE)?;
        Ok(FanMode::from_code(code))
    }

    pub async fn is_equipment_output_on(&mut self) -> Result<bool> {
        Ok(self.current().await?.int_at(EQUIPMENT_OUTPUT_STATUS)? != 0)
    }

    pub async fn is_calling_for_heat(&mut self) -> Result<bool> {
        Ok(self.current().await?.int_at(EQUIPMENT_OUTPUT_STATUS)? == 1)
    }

    pub async fn is_calling_for_cool(&mut self) -> Result<bool> {
        Ok(self.current().await?.int_at(EQUIPMENT_OUTPUT_STATUS)? == 2)
    }

    pub async fn is_fan_running(&mut self) -> Result<bool> {
        self.current().await?.bool_at(FAN_IS_RUNNING)
    }

    // -- Command methods --

    /// Low-level passthrough to [`HtccClient::submit_raw_control_changes`] for this device.
    pub async fn submit_control_changes(&self, changes: &Map<String, Value>) -> Result<()> {
        self.client
            .submit_raw_control_changes(self.device_id, changes)
            .await
    }

    /// Holds a cool setpoint and switches the system to cool.
    pub async fn set_permanent_cool_setpoint(&self, temp: i64) -> Result<()> {
        info!(device_id = self.device_id, temp, "setting cool on");
        self.submit_control_changes(&changes([
            ("CoolSetpoint", json!(temp)),
            ("StatusHeat", json!(2)),
            ("StatusCool", json!(2)),
            ("SystemSwitch", json!(SystemMode::Cool.code())),
        ]))
        .await
    }

    /// Holds a heat setpoint and switches the system to heat.
    pub async fn set_permanent_heat_setpoint(&self, temp: i64) -> Result<()> {
        info!(device_id = self.device_id, temp, "setting heat on");
        self.submit_control_changes(&changes([
            ("HeatSetpoint", json!(temp)),
            ("StatusHeat", json!(1)),
            ("StatusCool", json!(1)),
            ("SystemSwitch", json!(SystemMode::Heat.code())),
        ]))
        .await
    }

    pub async fn turn_system_off(&self) -> Result<()> {
        info!(device_id = self.device_id, "turning system off");
        self.submit_control_changes(&changes([(
            "SystemSwitch",
            json!(SystemMode::Off.code()),
        )]))
        .await
    }

    pub async fn set_fan_mode(&self, mode: FanMode) -> Result<()> {
        info!(device_id = self.device_id, ?mode, "setting fan mode");
        self.submit_control_changes(&changes([("FanMode", json!(mode.code()))]))
            .await
    }

    pub async fn turn_fan_on(&self) -> Result<()> {
        self.set_fan_mode(FanMode::On).await
    }

    pub async fn turn_fan_auto(&self) -> Result<()> {
        self.set_fan_mode(FanMode::Auto).await
    }

    pub async fn turn_fan_circulate(&self) -> Result<()> {
        self.set_fan_mode(FanMode::Circulate).await
    }
}

fn changes<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
