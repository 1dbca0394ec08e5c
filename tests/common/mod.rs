#![allow(dead_code)]

use std::time::Duration;

use htcc::HtccClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOCATION_ID: u64 = 12345;

pub const ZONE_LIST: &str = r#"[{"DeviceID":1234567,"IsLost":false,"GatewayIsLost":false,"DispTempAvailable":true,"DispUnits":"F","DispTemp":75,"IndoorHumiAvailable":true,"IndoorHumi":40,"GatewayUpgrading":false,"Alerts":[],"DemandResponseDatas":[],"EquipmentOutputStatus":2,"IsFanRunning":true},{"DeviceID":123456,"IsLost":false,"GatewayIsLost":false,"DispTempAvailable":true,"DispUnits":"F","DispTemp":73,"IndoorHumiAvailable":true,"IndoorHumi":38,"GatewayUpgrading":false,"Alerts":[],"DemandResponseDatas":[],"EquipmentOutputStatus":2,"IsFanRunning":true}]"#;

pub const DATA_SESSION: &str = r#"{"success":true,"deviceLive":true,"communicationLost":false,"latestData":{"uiData":{"DispTemperature":75,"HeatSetpoint":70,"CoolSetpoint":75,"DisplayUnits":"F","StatusHeat":2,"StatusCool":2,"HoldUntilCapable":true,"ScheduleCapable":true,"VacationHold":0,"DualSetpointStatus":false,"HeatNextPeriod":71,"CoolNextPeriod":71,"HeatLowerSetptLimit":40,"HeatUpperSetptLimit":90,"CoolLowerSetptLimit":50,"CoolUpperSetptLimit":99,"ScheduleHeatSp":70,"ScheduleCoolSp":78,"SwitchAutoAllowed":false,"SwitchCoolAllowed":true,"SwitchOffAllowed":true,"SwitchHeatAllowed":true,"SwitchEmergencyHeatAllowed":false,"SystemSwitchPosition":3,"Deadband":0,"IndoorHumidity":40,"DeviceID":123456,"Commercial":false,"DispTemperatureAvailable":true,"IndoorHumiditySensorAvailable":true,"IndoorHumiditySensorNotFault":true,"VacationHoldUntilTime":0,"TemporaryHoldUntilTime":0,"IsInVacationHoldMode":false,"VacationHoldCancelable":true,"SetpointChangeAllowed":true,"OutdoorTemperature":128,"OutdoorHumidity":128,"OutdoorHumidityAvailable":false,"OutdoorTemperatureAvailable":false,"DispTemperatureStatus":0,"IndoorHumidStatus":0,"OutdoorTempStatus":128,"OutdoorHumidStatus":128,"OutdoorTemperatureSensorNotFault":true,"OutdoorHumiditySensorNotFault":true,"CurrentSetpointStatus":2,"EquipmentOutputStatus":2},"fanData":{"fanMode":0,"fanModeAutoAllowed":true,"fanModeOnAllowed":true,"fanModeCirculateAllowed":true,"fanModeFollowScheduleAllowed":false,"fanIsRunning":true},"hasFan":true,"canControlHumidification":false,"drData":{"CoolSetpLimit":null,"HeatSetpLimit":null,"Phase":-1,"OptOutable":false,"DeltaCoolSP":null,"DeltaHeatSP":null,"Load":null}},"alerts":"\r\n\r\n"}"#;

pub const WEATHER_SCRIPT: &str = "
    <script>
        Control.Model.set(Control.Model.Property.isInVacationHoldMode, false);
        Control.Model.set(Control.Model.Property.outdoorHumidity, 56);
        Control.Model.set(Control.Model.Property.outdoorTemp, 19);
        Control.Model.set(Control.Model.Property.schedCoolSp, 78);
    </script>";

pub fn control_page(zone_name: &str) -> String {
    format!(
        r#"<div class="TitleAndAlerts">
            <div id="ControlScreenHeader">
                <h1 id="ZoneName">{zone_name} Control</h1>
            </div>
            <div id="AlertsPlaceHolder"></div>
        </div>{WEATHER_SCRIPT}"#
    )
}

/// POST /portal redirects into `/portal/<location>/Zones`, which answers 200.
pub async fn mount_login(server: &MockServer, location_id: u64) {
    let zones_path = format!("/portal/{location_id}/Zones");
    Mock::given(method("POST"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", zones_path.as_str()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(zones_path))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>zones</html>"))
        .mount(server)
        .await;
}

/// Two thermostats: 123456 "A" and 1234567 "B", all on page 1.
pub async fn mount_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/portal/Device/GetZoneListData"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ZONE_LIST))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/portal/Device/GetZoneListData"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(server)
        .await;

    for (device_id, name) in [(123456u64, "A"), (1234567, "B")] {
        Mock::given(method("GET"))
            .and(path(format!("/portal/Device/CheckDataSession/{device_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(DATA_SESSION))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/portal/Device/Control/{device_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(control_page(name)))
            .mount(server)
            .await;
    }
}

pub fn test_client(server: &MockServer) -> HtccClient {
    HtccClient::builder("user", "pass")
        .base_url(server.uri())
        .backoff_unit(Duration::ZERO)
        .build()
        .expect("client should build")
}

pub async fn logged_in_client(server: &MockServer) -> HtccClient {
    mount_login(server, LOCATION_ID).await;
    let mut client = test_client(server);
    client.authenticate().await.expect("login should succeed");
    client
}

pub async fn count_requests(server: &MockServer, verb: &str, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == request_path)
        .count()
}
