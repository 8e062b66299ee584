use crate::{
    api::{audit, leave_request, notifications, resets, system, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(GovernorConfig::default);
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/recover")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::recover)),
            )
            // session timer reads the bearer token itself and must not count as activity
            .service(web::resource("/session").route(web::get().to(handlers::session_status)))
            .service(
                web::resource("/session/extend").route(web::post().to(handlers::session_extend)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::resource("/me")
                    .route(web::get().to(users::get_me))
                    .route(web::put().to(users::update_me)),
            )
            .service(
                web::scope("/users")
                    // /users
                    .service(
                        web::resource("")
                            .route(web::get().to(users::list_users))
                            .route(web::post().to(users::create_user)),
                    )
                    // /users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(users::update_user))
                            .route(web::delete().to(users::terminate_user)),
                    )
                    .service(web::resource("/{id}/approve").route(web::put().to(users::approve_user)))
                    .service(web::resource("/{id}/balances").route(web::put().to(users::set_balances)))
                    .service(web::resource("/{id}/pin").route(web::put().to(users::reset_pin))),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::list_leaves))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // fixed segments before /leave/{id}
                    .service(
                        web::resource("/evaluate").route(web::post().to(leave_request::evaluate_leave)),
                    )
                    .service(
                        web::resource("/bulk-approve")
                            .route(web::put().to(leave_request::bulk_approve)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/dates")
                            .route(web::put().to(leave_request::update_dates)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("").route(web::get().to(notifications::list_notifications)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::delete().to(notifications::clear_notification)),
                    ),
            )
            .service(
                web::scope("/reset-requests")
                    .service(web::resource("").route(web::get().to(resets::list_reset_requests)))
                    .service(
                        web::resource("/{id}/resolve")
                            .route(web::put().to(resets::resolve_reset_request)),
                    ),
            )
            .service(web::resource("/audit").route(web::get().to(audit::list_audit)))
            .service(
                web::scope("/system/reset")
                    .service(
                        web::resource("")
                            .route(web::post().to(system::trigger_reset))
                            .route(web::delete().to(system::cancel_reset)),
                    )
                    .service(web::resource("/pin").route(web::post().to(system::confirm_pin)))
                    .service(web::resource("/token").route(web::post().to(system::confirm_token)))
                    .service(web::resource("/execute").route(web::post().to(system::execute_reset))),
            ),
    );
}

// LOGIN
//  ├─ access_token (bounded by ACCESS_TOKEN_TTL)
//  └─ session timer (10 min idle, last 2 min warning)

// API REQUEST
//  └─ Authorization: Bearer access_token, restarts the timer unless in warning

// WARNING
//  └─ POST /auth/session/extend restarts the timer
