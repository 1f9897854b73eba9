//! One-line-per-request access logging.

use std::time::Instant;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};

/// Request-local start time. A newtype keeps the cache slot distinct from any
/// other `Instant` a handler might stash.
#[derive(Copy, Clone)]
struct StartedAt(Instant);

pub struct AccessLog;

#[rocket::async_trait]
impl Fairing for AccessLog {
    fn info(&self) -> Info {
        Info {
            name: "Access Log",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| StartedAt(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let StartedAt(started) = *request.local_cache(|| StartedAt(Instant::now()));
        let elapsed = started.elapsed();

        log::info!(
            "{} {} -> {} in {:.1}ms",
            request.method(),
            request.uri().path(),
            response.status().code,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}
