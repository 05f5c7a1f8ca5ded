use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{RemoteError, RemoteResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn build_https_client() -> RemoteResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Ok(Client::builder().build::<_, Body>(connector))
}

/// Sends `request` and returns the body of a successful response.
///
/// 404 maps to [`RemoteError::NotFound`], any other non-2xx status to
/// [`RemoteError::Status`].
pub(crate) async fn send(
    client: &HyperClient,
    request: Request<Body>,
    limit: Duration,
    resource: &str,
) -> RemoteResult<Bytes> {
    let response = timeout(limit, client.request(request))
        .await
        .map_err(|_| RemoteError::transport(format!("request for {resource} timed out")))?
        .map_err(|err| RemoteError::transport(format!("request for {resource} failed: {err}")))?;

    let status = response.status();
    let bytes = to_bytes(response.into_body()).await.map_err(|err| {
        RemoteError::transport(format!("failed to read response for {resource}: {err}"))
    })?;

    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::not_found(resource));
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            reason: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(bytes)
}
