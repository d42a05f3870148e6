//! Integration tests for OpenWeatherClient using wiremock.

use std::time::Duration;

use citycast_core::{FetchError, Units};
use citycast_weather::{OpenWeatherClient, RemoteWeatherClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn client_for(server: &MockServer) -> OpenWeatherClient {
    OpenWeatherClient::with_base_urls(
        &format!("{}/geo/1.0", server.uri()),
        &format!("{}/data/2.5", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn london_candidate() -> serde_json::Value {
    serde_json::json!({
        "name": "London",
        "local_names": {"en": "London"},
        "lat": 51.5074,
        "lon": -0.1278,
        "country": "GB",
        "state": "England"
    })
}

fn london_weather() -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": -0.1278, "lat": 51.5074},
        "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
        "main": {"temp": 16.3, "feels_like": 15.9, "temp_min": 15.0, "temp_max": 17.2, "pressure": 1018, "humidity": 77},
        "visibility": 10000,
        "wind": {"speed": 3.6, "deg": 250},
        "clouds": {"all": 75},
        "dt": 1760800000,
        "sys": {"country": "GB", "sunrise": 1760768935, "sunset": 1760806611},
        "name": "London"
    })
}

#[tokio::test]
async fn test_geocode_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("appid", API_KEY))
        .and(query_param("q", "London"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([london_candidate()])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let locations = client.geocode(API_KEY, "London", 1).await.unwrap();

    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "London");
    assert_eq!(locations[0].country, "GB");
    assert!((locations[0].latitude - 51.5074).abs() < 1e-9);
    assert!((locations[0].longitude + 0.1278).abs() < 1e-9);
}

#[tokio::test]
async fn test_geocode_empty_is_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Nowhereville"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let locations = client.geocode(API_KEY, "Nowhereville", 1).await.unwrap();

    assert!(locations.is_empty());
}

#[tokio::test]
async fn test_geocode_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key."
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.geocode("bad-key", "London", 1).await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Http {
            status: 401,
            message: "Unauthorized".to_string()
        }
    );
    assert_eq!(err.to_string(), "Error: Unauthorized");
}

#[tokio::test]
async fn test_geocode_garbage_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.geocode(API_KEY, "London", 1).await.unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_get_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", API_KEY))
        .and(query_param("lat", "51.5074"))
        .and(query_param("lon", "-0.1278"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let snapshot = client
        .get_weather(API_KEY, 51.5074, -0.1278, Units::Metric)
        .await
        .unwrap();

    assert_eq!(snapshot.city_name, "London");
    assert_eq!(snapshot.country_code, "GB");
    assert_eq!(snapshot.condition_icon, "04d");
    assert_eq!(snapshot.humidity, 77);
    assert!((snapshot.temperature - 16.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_get_weather_passes_units() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_weather()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .get_weather(API_KEY, 51.5074, -0.1278, Units::Imperial)
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_get_weather_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get_weather(API_KEY, 0.0, 0.0, Units::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Http { status: 500, .. }));
    assert_eq!(err.to_string(), "Error: Internal Server Error");
}

#[tokio::test]
async fn test_get_weather_empty_conditions_is_malformed() {
    let mock_server = MockServer::start().await;

    let mut body = london_weather();
    body["weather"] = serde_json::json!([]);

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get_weather(API_KEY, 51.5074, -0.1278, Units::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_failure() {
    let client = OpenWeatherClient::with_base_urls(
        "http://127.0.0.1:1/geo/1.0",
        "http://127.0.0.1:1/data/2.5",
        Duration::from_secs(2),
    )
    .unwrap();

    let err = client.geocode(API_KEY, "London", 1).await.unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)), "got {:?}", err);
    assert!(err.to_string().starts_with("Error: "));
    assert!(!err.to_string().contains(API_KEY));
}
