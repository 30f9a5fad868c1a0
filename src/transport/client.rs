//! Transport Wrapper (§4.5): issues the upstream HTTP call, captures
//! `Set-Cookie` headers across any internal redirect chain, and disables
//! server-certificate verification (a process-wide effect, documented
//! here per §9's call to keep it explicit rather than silent).

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use thiserror::Error;

const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum Error {
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("cannot read upstream response body: {0}")]
    Body(hyper::Error),
    #[error("redirect chain exceeded {0} hops")]
    TooManyRedirects(usize),
}

/// Accepts any server certificate. Intercepting TLS-terminated back-ends
/// during development is an explicit goal of this proxy (§4.5); this is a
/// process-wide effect on the outbound client only.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl SkipServerVerification {
    fn new(provider: Arc<CryptoProvider>) -> Arc<Self> {
        Arc::new(Self(provider))
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Thin wrapper over the shared outbound HTTP client.
pub struct TransportClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl TransportClient {
    pub fn new() -> Self {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .expect("ring provider supports the default protocol versions")
            .dangerous()
            .with_custom_certificate_verifier(SkipServerVerification::new(provider))
            .with_no_client_auth();

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        Self {
            inner: Client::builder(TokioExecutor::new()).build(https),
        }
    }

    /// Issues `req`, following any redirect chain, and returns the final
    /// response with the §4.5 T1 cookie-promotion invariant applied.
    pub async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let mut captured_cookies: Vec<HeaderValue> = Vec::new();
        let mut current = req;
        let mut hops = 0usize;

        let mut response = loop {
            let (parts, body) = current.into_parts();
            let hyper_req = Request::from_parts(parts.clone(), Full::new(body.clone()));
            let res = self.inner.request(hyper_req).await?;

            let (res_parts, res_body) = res.into_parts();
            let res_body = res_body.collect().await.map_err(Error::Body)?.to_bytes();

            captured_cookies.extend(res_parts.headers.get_all(http::header::SET_COOKIE).into_iter().cloned());

            let response = Response::from_parts(res_parts, res_body);

            match next_redirect(&response, &Request::from_parts(parts, body)) {
                Some(next) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        return Err(Error::TooManyRedirects(MAX_REDIRECTS));
                    }
                    current = next;
                    continue;
                }
                None => break response,
            }
        };

        apply_cookie_promotion(&mut response, &captured_cookies);
        Ok(response)
    }
}

impl Default for TransportClient {
    fn default() -> Self {
        Self::new()
    }
}

fn next_redirect(response: &Response<Bytes>, previous: &Request<Bytes>) -> Option<Request<Bytes>> {
    if !response.status().is_redirection() {
        return None;
    }

    let location = response.headers().get(http::header::LOCATION)?.to_str().ok()?;
    let next_uri = resolve_location(previous.uri(), location)?;

    let mut builder = Request::builder().method(previous.method().clone()).uri(next_uri);
    for (name, value) in previous.headers() {
        builder = builder.header(name, value.clone());
    }
    builder.body(previous.body().clone()).ok()
}

fn resolve_location(base: &Uri, location: &str) -> Option<Uri> {
    if let Ok(absolute) = location.parse::<Uri>() {
        if absolute.scheme().is_some() {
            return Some(absolute);
        }
    }

    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base.authority()?.as_str();
    format!("{}://{}{}", scheme, authority, location).parse().ok()
}

/// Post-processing invariant T1 (§4.5): if the final response has no
/// `Set-Cookie` but at least one was captured earlier in the chain, the
/// first captured cookie is copied onto the response.
fn apply_cookie_promotion(response: &mut Response<Bytes>, captured: &[HeaderValue]) {
    if response.headers().contains_key(http::header::SET_COOKIE) {
        return;
    }
    if let Some(first) = captured.first() {
        response
            .headers_mut()
            .insert(http::header::SET_COOKIE, first.clone());
    }
}
