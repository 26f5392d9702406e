//! HTTP Digest authentication
//!
//! Cameras guard both the event stream and the alarm endpoint with the
//! standard per-request digest challenge:
//!
//! ```text
//! Client                                   Device
//!   |------- GET (no credentials) -------->|
//!   |<------ 401 + WWW-Authenticate -------|
//!   |------- GET + Authorization --------->|
//!   |<------ 200 + body ------------------>|
//! ```
//!
//! Each request starts fresh; no session or nonce-count state is carried
//! between requests, so `nc` is always `00000001`. Supports MD5 and
//! MD5-sess with `qop="auth"` as well as the legacy no-qop form, which is
//! what the firmware in the field actually offers.

use md5::{Digest, Md5};
use rand::Rng;

use crate::error::Result;

/// Hash algorithm requested by the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Md5,
    Md5Sess,
}

/// A parsed `WWW-Authenticate: Digest …` challenge
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    /// `Some("auth")` when the server offers qop=auth, `None` for legacy
    qop: Option<String>,
    algorithm: Algorithm,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value
    ///
    /// Returns `None` for non-digest schemes and challenges this client
    /// cannot answer (unknown algorithm, qop without `auth`).
    pub fn parse(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        let scheme = trimmed.get(..6)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }
        let params = split_params(&trimmed[6..]);

        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        let realm = get("realm")?;
        let nonce = get("nonce")?;
        let opaque = get("opaque");

        let qop = match get("qop") {
            None => None,
            Some(offered) => {
                if offered.split(',').any(|q| q.trim() == "auth") {
                    Some("auth".to_string())
                } else {
                    // auth-int would require hashing the request body
                    return None;
                }
            }
        };

        let algorithm = match get("algorithm").as_deref() {
            None | Some("MD5") => Algorithm::Md5,
            Some("MD5-sess") => Algorithm::Md5Sess,
            Some(_) => return None,
        };

        Some(Self {
            realm,
            nonce,
            opaque,
            qop,
            algorithm,
        })
    }

    /// Render the `Authorization` header value for one request
    pub fn authorization(&self, username: &str, password: &str, method: &str, uri: &str) -> String {
        let cnonce = hex::encode(rand::thread_rng().gen::<[u8; 8]>());
        self.authorization_with_cnonce(username, password, method, uri, &cnonce, "00000001")
    }

    fn authorization_with_cnonce(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: &str,
    ) -> String {
        let mut ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        if self.algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        let response = match self.qop.as_deref() {
            Some(qop) => md5_hex(&format!(
                "{}:{}:{}:{}:{}:{}",
                ha1, self.nonce, nc, cnonce, qop, ha2
            )),
            None => md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2)),
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            username, self.realm, self.nonce, uri, response
        );
        if let Some(ref qop) = self.qop {
            header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, nc, cnonce));
        }
        if let Some(ref opaque) = self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        match self.algorithm {
            Algorithm::Md5 => header.push_str(", algorithm=MD5"),
            Algorithm::Md5Sess => header.push_str(", algorithm=MD5-sess"),
        }

        header
    }
}

/// GET with a single digest retry on 401
///
/// Sends unauthenticated first; if the server answers 401 with a usable
/// digest challenge and credentials are configured, retries exactly once
/// with the computed `Authorization` header. Any other response (including
/// a second 401) is returned to the caller as-is.
pub async fn get_with_digest(
    client: &reqwest::Client,
    url: &str,
    credentials: Option<(&str, &str)>,
) -> Result<reqwest::Response> {
    let resp = client.get(url).send().await?;
    if resp.status() != reqwest::StatusCode::UNAUTHORIZED {
        return Ok(resp);
    }
    let Some((username, password)) = credentials else {
        return Ok(resp);
    };
    let Some(challenge) = resp
        .headers()
        .get_all(reqwest::header::WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(DigestChallenge::parse)
    else {
        return Ok(resp);
    };

    let uri = request_uri(url);
    let header = challenge.authorization(username, password, "GET", &uri);
    tracing::debug!(url = url, "answering digest challenge");

    let retry = client
        .get(url)
        .header(reqwest::header::AUTHORIZATION, header)
        .send()
        .await?;
    Ok(retry)
}

/// Path-and-query form of a URL, as used in the digest `uri` parameter
fn request_uri(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => {
            let mut uri = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                uri.push('?');
                uri.push_str(query);
            }
            uri
        }
        Err(_) => url.to_string(),
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Split a digest parameter list into lowercased key/value pairs
///
/// Commas inside quoted values do not split parameters.
fn split_params(raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;

    let mut flush = |key: &mut String, value: &mut String| {
        let k = key.trim().to_ascii_lowercase();
        if !k.is_empty() {
            out.push((k, value.trim().to_string()));
        }
        key.clear();
        value.clear();
    };

    for c in raw.chars() {
        if in_quotes {
            if c == '"' {
                in_quotes = false;
            } else {
                value.push(c);
            }
            continue;
        }
        match c {
            '"' if in_value => in_quotes = true,
            '=' if !in_value => in_value = true,
            ',' => {
                flush(&mut key, &mut value);
                in_value = false;
            }
            _ => {
                if in_value {
                    value.push(c);
                } else {
                    key.push(c);
                }
            }
        }
    }
    flush(&mut key, &mut value);

    out
}
