mod authentication_scheme;
mod bearer_token;

use crate::configuration;
use crate::registry::token_cache::TokenCache;
use crate::registry::{Error, RegistryContext};
use authentication_scheme::AuthenticationScheme;
use bearer_token::BearerToken;
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, ACCEPT, AUTHORIZATION, LOCATION, WWW_AUTHENTICATE};
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{debug, error, warn};

#[derive(Clone, Debug, Default)]
pub struct HttpClientConfig {
    pub server_ca_bundle: Option<String>,
    pub client_certificate: Option<String>,
    pub client_private_key: Option<String>,
    pub max_redirect: u8,
}

/// HTTP client for registry APIs.
///
/// Handles redirects and the `WWW-Authenticate` challenge flow. Authorization
/// headers obtained from a challenge are cached per registry and token scope,
/// so every concurrent call sharing a scope reuses the same token until it
/// expires.
#[derive(Debug)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    max_redirect: u8,
    token_cache: TokenCache,
}

impl HttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, configuration::Error> {
        let tls_config = build_tls_config(
            config.server_ca_bundle.as_deref(),
            config.client_certificate.as_deref(),
            config.client_private_key.as_deref(),
        )?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            max_redirect: config.max_redirect,
            token_cache: TokenCache::new(),
        })
    }

    /// Sends a request and returns the upstream response whatever its status,
    /// except for authentication failures and forbidden access which are
    /// mapped to errors.
    pub async fn request(
        &self,
        context: &RegistryContext,
        scope: &str,
        method: &Method,
        accepted_types: &[&str],
        location: &str,
    ) -> Result<Response<Incoming>, Error> {
        let cache_key = format!("{}:{scope}", context.registry);
        let mut authorization = self.token_cache.retrieve(&cache_key).await;

        let mut location = location.to_string();
        let mut redirect_count = 0;
        let mut authenticate_count = 0;

        loop {
            debug!("{method} {location}");

            let mut request = Request::builder().method(method.clone()).uri(&location);
            for accepted_type in accepted_types {
                request = request.header(ACCEPT, *accepted_type);
            }
            if let Some(authorization) = &authorization {
                request = request.header(AUTHORIZATION, HeaderValue::from_str(authorization)?);
            }

            let response = self
                .client
                .request(request.body(Empty::new())?)
                .await
                .map_err(|e| {
                    error!("Request to {location} failed: {e:?}");
                    Error::Internal(format!("HTTP request to {location} failed: {e}"))
                })?;

            if response.status().is_redirection() {
                if let Some(new_location) = response.headers().get(LOCATION) {
                    let new_location = new_location.to_str().map_err(|e| {
                        Error::InvalidResponse(format!("Failed to parse Location header: {e}"))
                    })?;

                    redirect_count += 1;
                    if redirect_count > self.max_redirect {
                        error!("Too many redirections from {location}");
                        return Err(Error::Internal(format!(
                            "Too many redirections from {location}"
                        )));
                    }

                    location = resolve_location(&location, new_location)?;
                    continue;
                }
            }

            if response.status() == StatusCode::UNAUTHORIZED {
                if authenticate_count > 0 {
                    return Err(Error::Unauthorized(format!(
                        "Credentials rejected for {location}"
                    )));
                }

                let (token, ttl) = match response.headers().get(WWW_AUTHENTICATE) {
                    Some(header) => self.authenticate(context, header).await?,
                    None => basic_authorization(context)?,
                };

                self.token_cache.store(&cache_key, &token, ttl).await;
                authorization = Some(token);
                authenticate_count += 1;
                continue;
            }

            if response.status() == StatusCode::FORBIDDEN {
                return Err(Error::Denied(location));
            }

            return Ok(response);
        }
    }

    async fn authenticate(
        &self,
        context: &RegistryContext,
        www_authenticate_header: &HeaderValue,
    ) -> Result<(String, u64), Error> {
        let header = www_authenticate_header.to_str().map_err(|e| {
            Error::Unauthorized(format!("Failed to parse WWW-Authenticate header: {e}"))
        })?;

        match AuthenticationScheme::from_www_authenticate_header(header)? {
            AuthenticationScheme::Bearer(realm, parameters) => {
                self.query_bearer_token(context, &realm, &parameters).await
            }
            AuthenticationScheme::Basic => basic_authorization(context),
        }
    }

    async fn query_bearer_token(
        &self,
        context: &RegistryContext,
        realm: &str,
        parameters: &std::collections::HashMap<String, String>,
    ) -> Result<(String, u64), Error> {
        let query = serde_urlencoded::to_string(parameters)?;
        let location = if query.is_empty() {
            realm.to_string()
        } else {
            format!("{realm}?{query}")
        };

        let mut request = Request::builder().method(Method::GET).uri(&location);
        if let Some(credentials) = &context.credentials {
            request = request.header(AUTHORIZATION, credentials.basic_authorization());
        } else {
            debug!("Requesting anonymous token from {realm}");
        }

        let response = self
            .client
            .request(request.body(Empty::new())?)
            .await
            .map_err(|e| {
                error!("Failed to reach token endpoint {realm}: {e:?}");
                Error::Unauthorized(format!("Token request to {realm} failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::Unauthorized(format!(
                "Token acquisition failed: {}",
                response.status()
            )));
        }

        let bearer = BearerToken::from_slice(&read_body(response).await?)?;
        let ttl = bearer.ttl();
        Ok((format!("Bearer {}", bearer.token()?), ttl))
    }
}

fn basic_authorization(context: &RegistryContext) -> Result<(String, u64), Error> {
    match &context.credentials {
        Some(credentials) => Ok((credentials.basic_authorization(), 60)),
        None => Err(Error::Unauthorized(format!(
            "Registry '{}' requires credentials but none are configured",
            context.registry
        ))),
    }
}

fn resolve_location(current: &str, new_location: &str) -> Result<String, Error> {
    if !new_location.starts_with('/') {
        return Ok(new_location.to_string());
    }

    let current: Uri = current.parse()?;
    match (current.scheme_str(), current.authority()) {
        (Some(scheme), Some(authority)) => Ok(format!("{scheme}://{authority}{new_location}")),
        _ => Err(Error::InvalidResponse(format!(
            "Cannot resolve relative redirection to {new_location}"
        ))),
    }
}

pub async fn read_body(response: Response<Incoming>) -> Result<Vec<u8>, Error> {
    Ok(response.into_body().collect().await?.to_bytes().to_vec())
}

pub fn ensure_success<B>(response: &Response<B>, location: &str) -> Result<(), Error> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus {
            status: response.status(),
            location: location.to_string(),
        })
    }
}

fn build_tls_config(
    ca_bundle: Option<&str>,
    client_cert: Option<&str>,
    client_key: Option<&str>,
) -> Result<rustls::ClientConfig, configuration::Error> {
    let mut root_store = RootCertStore::empty();

    let certs = if let Some(bundle) = ca_bundle {
        CertificateDer::pem_file_iter(bundle)?.collect::<Result<Vec<_>, _>>()?
    } else {
        rustls_native_certs::load_native_certs().certs
    };

    root_store.add_parsable_certificates(certs);

    let config = rustls::ClientConfig::builder().with_root_certificates(root_store);

    match (client_cert, client_key) {
        (Some(cert), Some(key)) => {
            let certs = CertificateDer::pem_file_iter(cert)?.collect::<Result<Vec<_>, _>>()?;
            let key = PrivateKeyDer::from_pem_file(key)?;
            Ok(config.with_client_auth_cert(certs, key)?)
        }
        (None, None) => Ok(config.with_no_client_auth()),
        _ => {
            warn!("Client certificate and key must both be provided");
            Ok(config.with_no_client_auth())
        }
    }
}
