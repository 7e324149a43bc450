//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the store answer a query? Failure → pulled from the load-balancer. |

use crate::controller::{SharedStore, blocking};
use crate::{Request, Response, Status};

/// Always `200 OK` with body `"ok"`. Touches nothing.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"` once the store answers a ping, otherwise
/// `503` in the JSON error envelope.
pub async fn readiness(store: SharedStore, _req: Request) -> Response {
    match blocking(&store, |s| s.ping()).await {
        Ok(()) => Response::text("ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            Response::error(Status::ServiceUnavailable, "store unavailable")
        }
    }
}
