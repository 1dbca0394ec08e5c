use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::OutdoorWeather;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.mytotalconnectcomfort.com";

pub const LOGIN_PATH: &str = "/portal";
pub const SUBMIT_CONTROL_PATH: &str = "/portal/Device/SubmitControlScreenChanges";

pub const XHR_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

const INVALID_CREDENTIALS_MARKER: &str = "The email or password provided is incorrect";

/// Keys the control screen accepts. Anything else is refused before sending.
pub const CONTROL_KEYS: [&str; 9] = [
    "CoolNextPeriod",
    "CoolSetpoint",
    "DeviceID",
    "FanMode",
    "HeatNextPeriod",
    "HeatSetpoint",
    "StatusCool",
    "StatusHeat",
    "SystemSwitch",
];

static ZONE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id=\s?"ZoneName"\s?>(.*) Control<"#).expect("valid regex"));

static LOCATION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"locationId=(\d+)").expect("valid regex"));

static OUTDOOR_TEMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"outdoorTemp,\s*([^)\s;]+)").expect("valid regex"));

static OUTDOOR_HUMIDITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"outdoorHumidity,\s*([^)\s;]+)").expect("valid regex"));

pub fn zone_list_path(location_id: u64, page: u32) -> String {
    format!("/portal/Device/GetZoneListData?locationId={location_id}&page={page}")
}

pub fn check_data_session_path(device_id: u64) -> String {
    format!("/portal/Device/CheckDataSession/{device_id}")
}

pub fn control_page_path(device_id: u64) -> String {
    format!("/portal/Device/Control/{device_id}?page=1")
}

/// Where the login POST ended up, judged from the final URL and body.
/// Returns the location id on success.
pub fn classify_login(status: u16, url: &str, body: &str) -> Result<u64> {
    if status != 200 {
        return Err(Error::Authentication(format!(
            "login returned HTTP {status}"
        )));
    }
    if body.contains(INVALID_CREDENTIALS_MARKER) {
        return Err(Error::LoginCredentialsInvalid);
    }
    if url.contains("TooManyAttempts") {
        return Err(Error::TooManyAttempts);
    }
    if url.contains("portal/Error") {
        return Err(Error::LoginUnexpected(url.to_string()));
    }
    if !url.contains("portal/") {
        return Err(Error::RedirectDidNotHappen(url.to_string()));
    }
    parse_location_id(url, body)
}

/// `.../portal/<id>/...` in the URL, else `locationId=<id>` anywhere in the page.
pub fn parse_location_id(url: &str, body: &str) -> Result<u64> {
    let from_url = url
        .split_once("portal/")
        .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
        .and_then(|segment| segment.parse().ok());
    if let Some(id) = from_url {
        return Ok(id);
    }

    LOCATION_ID_RE
        .captures(body)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| Error::Parse(format!("no location id in {url} or its page")))
}

pub fn parse_zone_name(html: &str) -> Result<String> {
    ZONE_NAME_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::Parse("zone name heading not found on control page".to_string()))
}

pub fn parse_outdoor_weather(text: &str) -> OutdoorWeather {
    OutdoorWeather {
        temperature: scrape_int(&OUTDOOR_TEMP_RE, text, "outdoor temperature"),
        humidity: scrape_int(&OUTDOOR_HUMIDITY_RE, text, "outdoor humidity"),
    }
}

fn scrape_int(re: &Regex, text: &str, what: &str) -> Option<i64> {
    let Some(caps) = re.captures(text) else {
        warn!("unable to find the {what} on the control page");
        return None;
    };
    match caps[1].parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v.trunc() as i64),
        _ => {
            warn!(raw = &caps[1], "unable to parse the {what}");
            None
        }
    }
}

/// Full changeset for the control screen: every known key defaults to null
/// (no change) and `changes` is laid over it.
pub fn control_changeset(device_id: u64, changes: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut data: Map<String, Value> = CONTROL_KEYS
        .iter()
        .map(|key| (key.to_string(), Value::Null))
        .collect();
    data.insert("DeviceID".to_string(), Value::from(device_id));

    for (key, value) in changes {
        if !CONTROL_KEYS.contains(&key.as_str()) {
            return Err(Error::UnrecognizedKey {
                key: key.clone(),
                valid: CONTROL_KEYS.to_vec(),
            });
        }
        data.insert(key.clone(), value.clone());
    }
    Ok(data)
}

/// The portal answers `{"success": 1}` (sometimes `true`) when it took the change.
pub fn control_change_accepted(response: &Value) -> bool {
    match response.get("success") {
        Some(Value::Bool(b)) => *b,
        Some(v) => v.as_f64() == Some(1.0),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WEATHER_SCRIPT: &str = "        Control.Model.set(Control.Model.Property.isInVacationHoldMode, false);
        Control.Model.set(Control.Model.Property.outdoorHumidity, 47);
        Control.Model.set(Control.Model.Property.outdoorTemp, 74);
        Control.Model.set(Control.Model.Property.schedCoolSp, 78);";

    #[test]
    fn outdoor_weather_from_script() {
        let info = parse_outdoor_weather(WEATHER_SCRIPT);
        assert_eq!(info.temperature, Some(74));
        assert_eq!(info.humidity, Some(47));
    }

    #[test]
    fn outdoor_weather_without_spaces() {
        let info = parse_outdoor_weather("x outdoorTemp,74) y outdoorHumidity, 47)");
        assert_eq!(info, OutdoorWeather { temperature: Some(74), humidity: Some(47) });
    }

    #[test]
    fn outdoor_weather_floats_truncate() {
        let text = "Control.Model.set(Control.Model.Property.outdoorHumidity,  47.0000);
            Control.Model.set(Control.Model.Property.outdoorTemp, 74.0000);
            Control.Model.set(Control.Model.Property.schedCoolSp, 78.0000);";
        let info = parse_outdoor_weather(text);
        assert_eq!(info.temperature, Some(74));
        assert_eq!(info.humidity, Some(47));

        let info = parse_outdoor_weather("outdoorTemp, -3.75)");
        assert_eq!(info.temperature, Some(-3));
    }

    #[test]
    fn outdoor_weather_missing_temperature() {
        let text = "Control.Model.set(Control.Model.Property.outdoorHumidity, 47);
            Control.Model.set(Control.Model.Property.schedCoolSp, 78);";
        let info = parse_outdoor_weather(text);
        assert_eq!(info, OutdoorWeather { temperature: None, humidity: Some(47) });
    }

    #[test]
    fn outdoor_weather_missing_humidity() {
        let text = "Control.Model.set(Control.Model.Property.outdoorTemp, 74);";
        let info = parse_outdoor_weather(text);
        assert_eq!(info, OutdoorWeather { temperature: Some(74), humidity: None });
    }

    #[test]
    fn outdoor_weather_garbage_value_is_none() {
        let info = parse_outdoor_weather("Control.Model.Property.outdoorTemp, null);");
        assert_eq!(info.temperature, None);
    }

    #[test]
    fn zone_name_from_heading() {
        let html = r#"<div class="TitleAndAlerts">
            <div id="ControlScreenHeader">
                <h1 id="ZoneName">DOWNSTAIRS Control</h1>
            </div>"#;
        assert_eq!(parse_zone_name(html).unwrap(), "DOWNSTAIRS");
    }

    #[test]
    fn zone_name_missing_is_error() {
        assert!(matches!(parse_zone_name("<h1>Nope</h1>"), Err(Error::Parse(_))));
    }

    #[test]
    fn location_id_from_url() {
        let id = parse_location_id("https://www.mytotalconnectcomfort.com/portal/90210/Zones", "").unwrap();
        assert_eq!(id, 90210);
        assert_eq!(parse_location_id("portal/12345/", "").unwrap(), 12345);
    }

    #[test]
    fn location_id_from_content() {
        let url = "https://www.mytotalconnectcomfort.com/portal/Device/Control/bleh?page=1";
        let body = "Control.Urls.refreshAlerts = '/portal/Device/Alerts?locationId=902102&deviceId=9999';";
        assert_eq!(parse_location_id(url, body).unwrap(), 902102);
    }

    #[test]
    fn location_id_absent_is_error() {
        assert!(matches!(
            parse_location_id("https://host/portal/Device/Control/1", "<html></html>"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn classify_login_outcomes() {
        assert!(matches!(classify_login(500, "", ""), Err(Error::Authentication(_))));
        assert!(matches!(
            classify_login(200, "", r#"{"The email or password provided is incorrect": 0}"#),
            Err(Error::LoginCredentialsInvalid)
        ));
        assert!(matches!(classify_login(200, "TooManyAttempts", ""), Err(Error::TooManyAttempts)));
        assert!(matches!(classify_login(200, "lol", ""), Err(Error::RedirectDidNotHappen(_))));
        assert!(matches!(
            classify_login(
                200,
                "https://www.mytotalconnectcomfort.com/portal/Error?aspxerrorpath=/portal/",
                ""
            ),
            Err(Error::LoginUnexpected(_))
        ));
        assert_eq!(classify_login(200, "https://host/portal/12345/Zones", "").unwrap(), 12345);
    }

    #[test]
    fn changeset_defaults_to_no_change() {
        let data = control_changeset(1999, &Map::new()).unwrap();
        assert_eq!(data.len(), CONTROL_KEYS.len());
        assert_eq!(data["DeviceID"], 1999);
        assert_eq!(data["CoolSetpoint"], Value::Null);
        assert_eq!(data["SystemSwitch"], Value::Null);
    }

    #[test]
    fn changeset_overlays_changes() {
        let mut changes = Map::new();
        changes.insert("CoolNextPeriod".to_string(), json!(23));
        changes.insert("SystemSwitch".to_string(), json!(5));
        let data = control_changeset(1999, &changes).unwrap();
        assert_eq!(data["CoolNextPeriod"], 23);
        assert_eq!(data["SystemSwitch"], 5);
        assert_eq!(data["HeatSetpoint"], Value::Null);
    }

    #[test]
    fn changeset_rejects_unknown_keys() {
        let mut changes = Map::new();
        changes.insert("KewlDown".to_string(), json!(1));
        let err = control_changeset(0, &changes).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedKey { ref key, .. } if key == "KewlDown"));
    }

    #[test]
    fn success_sentinel() {
        assert!(control_change_accepted(&json!({"success": 1})));
        assert!(control_change_accepted(&json!({"success": true})));
        assert!(!control_change_accepted(&json!({"success": 0})));
        assert!(!control_change_accepted(&json!({"success": false})));
        assert!(!control_change_accepted(&json!({})));
    }
}
