use api_contract::{ApiResponse, ConnectionDto, RouteDto, ServiceStateDto};
use serde_json::Value;

#[test]
fn service_state_is_camel_case() {
    let state = ServiceStateDto {
        status: "running".to_string(),
        active: true,
        route_count: 2,
        connection_count: 3,
    };
    let value = serde_json::to_value(state).expect("serialize");
    assert_eq!(value.get("status"), Some(&Value::from("running")));
    assert_eq!(value.get("routeCount"), Some(&Value::from(2)));
    assert!(value.get("connectionCount").is_some());
    assert!(value.get("route_count").is_none());
}

#[test]
fn route_dto_lists_destinations() {
    let route = RouteDto {
        plugin_id: "plcA".to_string(),
        address: "TankLevel".to_string(),
        destinations: vec!["mqttB/plant/tank1".to_string()],
        filters: vec!["kalman".to_string()],
    };
    let value = serde_json::to_value(route).expect("serialize");
    assert_eq!(value.get("pluginId"), Some(&Value::from("plcA")));
    assert_eq!(value["destinations"][0], Value::from("mqttB/plant/tank1"));
}

#[test]
fn wrapped_connection_round_trips_through_envelope() {
    let payload = r#"{
        "success": true,
        "data": [{"connectionId":"plcA","kind":"modbus-tcp","capabilities":["source"],"connected":false}],
        "error": null
    }"#;
    let response: ApiResponse<Vec<ConnectionDto>> = serde_json::from_str(payload).expect("parse");
    let data = response.data.expect("data");
    assert_eq!(data[0].connection_id, "plcA");
    assert!(!data[0].connected);
}
