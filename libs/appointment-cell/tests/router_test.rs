use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::sync::Arc;

use chrono::NaiveDate;
use doctor_cell::services::calendar::ScheduleCalendar;
use shared_utils::clock::FixedClock;

use appointment_cell::{scheduling_routes, SchedulingState};
use shared_utils::test_utils::{MockHospitalResponses, TestConfig};

// The app runs on Friday 2026-10-16.
const MONDAY: &str = "2026-10-19";

fn create_test_app(config: TestConfig) -> Router {
    let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let state = SchedulingState::new(config.to_arc()).with_calendar(ScheduleCalendar::new(Arc::new(FixedClock(friday))));
    scheduling_routes(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer staff-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_slots_endpoint() {
    let app = create_test_app(TestConfig::default());

    let (status, body) = send(app.clone(), get("/slots?start=08:00&end=08:31")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert_eq!(body["slots"], json!(["08:00", "08:10", "08:20", "08:30"]));

    let (_, defaults) = send(app, get("/slots")).await;
    assert_eq!(defaults["count"], 60);
    assert_eq!(defaults["slots"][0], "08:00");
    assert_eq!(defaults["slots"][59], "17:50");
}

#[tokio::test]
async fn test_quantize_endpoint() {
    let app = create_test_app(TestConfig::default());

    let (status, body) = send(app.clone(), get("/time/quantize?time=23:55")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "time": "23:55", "valid": false, "quantized": "23:50" }));

    let (_, body) = send(app, get("/time/quantize?time=garbage")).await;
    assert_eq!(body["quantized"], "08:00");
}

#[tokio::test]
async fn test_malformed_time_rejected_before_backend() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/appointments",
            json!({
                "patient_id": "pat-1",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": MONDAY,
                "appointment_time": "8:00"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("appointment_time"));
}

#[tokio::test]
async fn test_book_appointment_created() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()).without_notifications());

    Mock::given(method("GET"))
        .and(path("/appointments"))
        .and(query_param("doctor_id", "doc-1"))
        .and(query_param("date", MONDAY))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([]))))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockHospitalResponses::envelope(
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:30", "scheduled"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/appointments",
            json!({
                "patient_id": "pat-1",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": MONDAY,
                "appointment_time": "08:30"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "appt-1");
    assert_eq!(body["data"]["appointment_time"], "08:30");
    assert_eq!(body["doctor_notified"], false);
}

#[tokio::test]
async fn test_booking_uses_app_clock_for_past_dates() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/appointments",
            json!({
                "patient_id": "pat-1",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": "2026-10-15",
                "appointment_time": "08:30"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("2026-10-15"));
}

#[tokio::test]
async fn test_book_taken_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()).without_notifications());

    Mock::given(method("GET"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:30", "scheduled"),
        ]))))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/appointments",
            json!({
                "patient_id": "pat-2",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": MONDAY,
                "appointment_time": "08:30"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "This time slot (08:30) has already been booked on Monday, October 19, 2026. Please select a different time."
    );
}

#[tokio::test]
async fn test_reschedule_excludes_edited_appointment() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:30", "scheduled"),
        ]))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments/appt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:30", "confirmed"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/appointments/appt-1"))
        .and(body_partial_json(json!({ "status": "confirmed", "reason": "Follow-up" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:30", "confirmed"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app,
        json_request(
            "PUT",
            "/appointments/appt-1",
            json!({
                "patient_id": "pat-1",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": MONDAY,
                "appointment_time": "08:30",
                "reason": "Follow-up"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "appt-1");
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn test_availability_endpoint() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/appointments"))
        .and(query_param("doctor_id", "doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([
            MockHospitalResponses::appointment("appt-1", "doc-1", MONDAY, "08:10", "scheduled"),
            MockHospitalResponses::appointment("appt-2", "doc-1", MONDAY, "08:20", "cancelled"),
        ]))))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        app.clone(),
        get(&format!("/availability?doctor_id=doc-1&date={}&start=08:00&end=08:30", MONDAY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], json!({ "08:00": true, "08:10": false, "08:20": true }));
    assert_eq!(body["booked"], json!(["08:10"]));
    assert_eq!(body["selectable"], json!(["08:00", "08:20"]));

    let (_, edited) = send(
        app.clone(),
        get(&format!(
            "/availability?doctor_id=doc-1&date={}&start=08:00&end=08:30&exclude_appointment_id=appt-1",
            MONDAY
        )),
    )
    .await;
    assert_eq!(edited["booked"], json!([]));

    let (status, _) = send(app, get("/availability?doctor_id=doc-1&date=soon")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schedule_board_hides_full_schedules() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_backend(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/doctor-schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([
            MockHospitalResponses::schedule("s-full", "doc-1", "Monday", "08:00", "09:00", Some(1)),
            MockHospitalResponses::schedule("s-open", "doc-2", "Monday", "08:00", "09:00", Some(0)),
        ]))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments"))
        .and(query_param("doctor_id", "doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([
            MockHospitalResponses::appointment("appt-1", "doc-1", "2026-10-19", "09:00", "confirmed"),
        ]))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments"))
        .and(query_param("doctor_id", "doc-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::envelope(json!([]))))
        .mount(&mock_server)
        .await;

    let (status, body) = send(app.clone(), get("/schedules")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["schedule"]["id"], "s-open");
    assert_eq!(body["data"][0]["date"], "2026-10-19");

    let (_, all) = send(app.clone(), get("/schedules?include_full=true")).await;
    assert_eq!(all["count"], 2);
    assert_eq!(all["data"][0]["capacity"], json!({ "max_patients": 1, "booked": 1 }));

    // Seen from Monday itself, the schedules move to the following week.
    let (_, next_week) = send(app, get("/schedules?today=2026-10-19&include_full=true")).await;
    assert_eq!(next_week["data"][0]["date"], "2026-10-26");
    assert_eq!(next_week["data"][0]["capacity"]["booked"], 0);
}
