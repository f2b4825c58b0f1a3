// ── ZBot Engine: Endpoint Resolution ───────────────────────────────────────
// Derives the backend WebSocket target from the ambient page location.
// Pure function of (scheme, hostname, port) — no side effects, no I/O —
// so the same build works unmodified across local dev, containerized
// same-host deployment behind a reverse proxy, ngrok tunnels, and
// Kubernetes NodePort access.

use crate::atoms::types::{Endpoint, PageLocation, PageScheme, WsScheme};
use std::net::Ipv4Addr;

// ── Deployment constants ───────────────────────────────────────────────────

/// Backend port for local development (Docker or bare uvicorn).
const LOCAL_BACKEND_PORT: u16 = 8000;

/// Frontend dev-server port; the backend is assumed on localhost:8000.
const DEV_FRONTEND_PORT: u16 = 3000;

/// Kubernetes NodePort the frontend is exposed on.
const NODEPORT_FRONTEND: u16 = 30080;

/// Kubernetes NodePort the backend is exposed on.
const NODEPORT_BACKEND: u16 = 30800;

/// Path the backend serves its WebSocket on, in every topology.
const WS_PATH: &str = "/ws";

// ── Resolution ─────────────────────────────────────────────────────────────

/// Resolve the backend endpoint for the given page location.
///
/// Rules are evaluated in order; the first match wins:
///   1. localhost / loopback / file:// page  → fixed local backend
///   2. frontend dev port (3000)             → fixed local backend
///   3. ngrok tunnel hostname                → same host via proxy, `/ws`
///   4. bare IPv4 on the frontend NodePort   → sibling backend NodePort
///   5. default web port (or none)           → same host via proxy, `/ws`
///   6. anything else                        → same host via proxy, `/ws`
pub fn resolve(location: &PageLocation) -> Endpoint {
    let hostname = location.hostname.as_str();

    // Local development (Docker backend or file:// page)
    if hostname == "localhost"
        || hostname == "127.0.0.1"
        || location.scheme == PageScheme::File
    {
        return local_backend();
    }

    // Frontend dev server on 3000, backend on 8000
    if location.port == Some(DEV_FRONTEND_PORT) {
        return local_backend();
    }

    // ngrok tunnel — the proxy forwards /ws to the backend
    if hostname.contains("ngrok") {
        return proxy_endpoint(location);
    }

    // Direct NodePort access by IP: frontend on 30080, backend on 30800
    if hostname.parse::<Ipv4Addr>().is_ok() && location.port == Some(NODEPORT_FRONTEND) {
        return Endpoint {
            scheme: mirror_scheme(location.scheme),
            host: hostname.to_string(),
            port: Some(NODEPORT_BACKEND),
            path: WS_PATH.into(),
        };
    }

    // Standard web ports and the fallback both go through the reverse proxy
    proxy_endpoint(location)
}

fn local_backend() -> Endpoint {
    Endpoint {
        scheme: WsScheme::Ws,
        host: "localhost".into(),
        port: Some(LOCAL_BACKEND_PORT),
        path: WS_PATH.into(),
    }
}

/// Same host, no explicit port, `/ws` path — the reverse proxy in front of
/// the page forwards WebSocket upgrades to the backend.
fn proxy_endpoint(location: &PageLocation) -> Endpoint {
    Endpoint {
        scheme: mirror_scheme(location.scheme),
        host: location.hostname.clone(),
        port: None,
        path: WS_PATH.into(),
    }
}

/// Mirror the page's transport security: https pages must use wss.
fn mirror_scheme(scheme: PageScheme) -> WsScheme {
    match scheme {
        PageScheme::Https => WsScheme::Wss,
        PageScheme::Http | PageScheme::File => WsScheme::Ws,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
