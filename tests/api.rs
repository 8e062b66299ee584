use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, test};
use chrono::{Days, NaiveDate, Utc};
use serde_json::{Value, json};

use leave_desk::advisory::{Advisor, StaticAdvisor};
use leave_desk::auth::session::SessionRegistry;
use leave_desk::config::{Config, DeskSettings};
use leave_desk::gateway::OfflineGateway;
use leave_desk::model::Pin;
use leave_desk::routes;
use leave_desk::store::{LeaveDesk, Seed};

const ADMIN: &str = "Wanjiku";
const ADMIN_PIN: &str = "1234";

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".into(),
        jwt_secret: "test-secret".into(),
        access_token_ttl: 900,
        api_prefix: "/api".into(),
        database_url: None,
        sync_base_url: None,
        fallback_dir: PathBuf::from("data"),
        sync_timeout_secs: 1,
        bootstrap_admin_name: None,
        bootstrap_admin_pin: None,
        advisory_url: None,
        advisory_api_key: None,
        rate_login_per_min: 600,
        rate_register_per_min: 600,
        rate_protected_per_min: 6000,
        desk: DeskSettings::default(),
    }
}

async fn seeded_desk() -> Data<LeaveDesk> {
    let desk = LeaveDesk::bootstrap(
        Arc::new(OfflineGateway),
        None,
        DeskSettings::default(),
        Some(Seed {
            name: ADMIN.into(),
            pin: Pin::parse(ADMIN_PIN).unwrap(),
        }),
    )
    .await
    .unwrap();
    Data::new(desk)
}

fn in_days(n: u64) -> NaiveDate {
    Utc::now().date_naive() + Days::new(n)
}

macro_rules! desk_app {
    ($desk:expr) => {{
        let config = config();
        let settings = DeskSettings::default();
        let advisor: Arc<dyn Advisor> = Arc::new(StaticAdvisor);
        test::init_service(
            App::new()
                .app_data($desk.clone())
                .app_data(Data::new(SessionRegistry::new(
                    settings.session_timeout,
                    settings.session_warning,
                )))
                .app_data(Data::from(advisor))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

macro_rules! login {
    ($app:expr, $name:expr, $pin:expr) => {{
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "name": $name, "pin": $pin }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "login of {}", $name);
        let body: Value = test::read_body_json(resp).await;
        body["access_token"].as_str().unwrap().to_string()
    }};
}

macro_rules! call {
    ($app:expr, $req:expr, $token:expr) => {{
        let req = $req
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request();
        test::call_service(&$app, req).await
    }};
}

#[actix_web::test]
async fn approval_debits_balance_and_notifies_the_applicant() {
    let desk = seeded_desk().await;
    let app = desk_app!(desk);
    let admin = login!(app, ADMIN, ADMIN_PIN);

    let resp = call!(
        app,
        test::TestRequest::post().uri("/api/users").set_json(json!({
            "name": "Otieno",
            "pin": "2468",
            "role": "STAFF",
            "department": "Sales",
            "branch": "NAIVASHA BRANCH"
        })),
        admin
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["balances"]["Annual Leave"], 21);
    assert!(created.get("pin_hash").is_none());

    let clerk = login!(app, "otieno", "2468");
    let resp = call!(
        app,
        test::TestRequest::post().uri("/api/leave").set_json(json!({
            "leave_type": "Annual Leave",
            "start_date": in_days(30),
            "end_date": in_days(32),
            "reason": "Family visit"
        })),
        clerk
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let request: Value = test::read_body_json(resp).await;
    assert_eq!(request["status"], "Pending");
    assert_eq!(request["days"], 3);
    let id = request["id"].as_str().unwrap().to_string();

    // nobody approves their own leave
    let resp = call!(
        app,
        test::TestRequest::put().uri(&format!("/api/leave/{id}/approve")),
        clerk
    );
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = call!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/leave/{id}/approve"))
            .set_json(json!({ "comment": "Enjoy" })),
        admin
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let approved: Value = test::read_body_json(resp).await;
    assert_eq!(approved["status"], "Approved");
    assert_eq!(approved["manager_comment"], "Enjoy");

    let resp = call!(app, test::TestRequest::get().uri("/api/me"), clerk);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["balances"]["Annual Leave"], 18);

    let resp = call!(app, test::TestRequest::get().uri("/api/notifications"), clerk);
    let inbox: Value = test::read_body_json(resp).await;
    assert_eq!(
        inbox[0]["message"],
        "Status Update: Your Annual Leave request has been APPROVED."
    );

    let resp = call!(
        app,
        test::TestRequest::get().uri("/api/audit?action=LEAVE_APPROVED"),
        admin
    );
    let trail: Value = test::read_body_json(resp).await;
    assert_eq!(trail.as_array().unwrap().len(), 1);
    assert_eq!(trail[0]["performedBy"], ADMIN);

    let clerk_id = created["id"].as_str().unwrap().to_string();
    let resp = call!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/users/{clerk_id}/balances"))
            .set_json(json!({
                "balances": { "Annual Leave": i32::MAX },
                "reason": "typo"
            })),
        admin
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call!(
        app,
        test::TestRequest::get().uri("/api/leave?page=18446744073709551615&per_page=100"),
        admin
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["total"], 1);
    assert!(page["data"].as_array().unwrap().is_empty());

    // rejection refunds
    let resp = call!(
        app,
        test::TestRequest::put().uri(&format!("/api/leave/{id}/reject")),
        admin
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = call!(app, test::TestRequest::get().uri("/api/me"), clerk);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["balances"]["Annual Leave"], 21);
}

#[actix_web::test]
async fn self_registration_waits_for_approval() {
    let desk = seeded_desk().await;
    let app = desk_app!(desk);

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .peer_addr(peer())
        .set_json(json!({
            "name": "Njeri",
            "pin": "1357",
            "department": "Sales",
            "branch": "GILGIL BRANCH"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer())
        .set_json(json!({ "name": "Njeri", "pin": "1357" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let admin = login!(app, ADMIN, ADMIN_PIN);
    let resp = call!(
        app,
        test::TestRequest::get().uri("/api/users?status=pending"),
        admin
    );
    let pending: Value = test::read_body_json(resp).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let resp = call!(
        app,
        test::TestRequest::put().uri(&format!("/api/users/{id}/approve")),
        admin
    );
    assert_eq!(resp.status(), StatusCode::OK);

    let _ = login!(app, "Njeri", "1357");
}

#[actix_web::test]
async fn bad_pin_and_missing_token_are_refused() {
    let desk = seeded_desk().await;
    let app = desk_app!(desk);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer())
        .set_json(json!({ "name": ADMIN, "pin": "12a4" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer())
        .set_json(json!({ "name": ADMIN, "pin": "9999" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get()
        .uri("/api/leave")
        .peer_addr(peer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn logout_closes_the_session() {
    let desk = seeded_desk().await;
    let app = desk_app!(desk);
    let admin = login!(app, ADMIN, ADMIN_PIN);

    let resp = call!(app, test::TestRequest::get().uri("/auth/session"), admin);
    assert_eq!(resp.status(), StatusCode::OK);
    let status: Value = test::read_body_json(resp).await;
    assert_eq!(status["phase"], "active");

    let resp = call!(app, test::TestRequest::post().uri("/auth/logout"), admin);
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = call!(app, test::TestRequest::get().uri("/api/leave"), admin);
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn staff_cannot_reach_administration() {
    let desk = seeded_desk().await;
    let app = desk_app!(desk);
    let admin = login!(app, ADMIN, ADMIN_PIN);

    let resp = call!(
        app,
        test::TestRequest::post().uri("/api/users").set_json(json!({
            "name": "Kamau",
            "pin": "8642",
            "role": "STAFF",
            "department": "Drivers",
            "branch": "GILGIL BRANCH"
        })),
        admin
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let driver = login!(app, "Kamau", "8642");

    for req in [
        test::TestRequest::get().uri("/api/users"),
        test::TestRequest::get().uri("/api/audit"),
        test::TestRequest::get().uri("/api/reset-requests"),
        test::TestRequest::post().uri("/api/system/reset"),
    ] {
        let resp = call!(app, req, driver);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    let resp = call!(
        app,
        test::TestRequest::post().uri("/api/leave/evaluate").set_json(json!({
            "leave_type": "Sick Leave",
            "dates": [in_days(10), in_days(12)]
        })),
        driver
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let evaluation: Value = test::read_body_json(resp).await;
    assert_eq!(evaluation["valid"], true);
    assert_eq!(evaluation["requested"], 2);
    assert_eq!(
        evaluation["advice"],
        "Coverage at GILGIL BRANCH for the Drivers team looks standard. Please ensure your tasks are handed over."
    );
}
