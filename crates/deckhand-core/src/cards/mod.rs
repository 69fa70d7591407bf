//! Card-identity collaborator.
//!
//! Resolves card ids to display names for rendering. Names never take part in
//! diff or merge logic.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::CardId;

const SCRYFALL_HTTP_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("deckhand/", env!("CARGO_PKG_VERSION"));

/// Source of card display names
pub trait CardDirectory: Send + Sync {
    /// Display name for `id`, or `None` when the directory doesn't know it
    fn display_name(&self, id: &CardId) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Fixed in-memory name table
#[derive(Debug, Clone, Default)]
pub struct StaticCardDirectory {
    names: HashMap<CardId, String>,
}

impl StaticCardDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, id: CardId, name: impl Into<String>) -> Self {
        self.insert(id, name);
        self
    }

    pub fn insert(&mut self, id: CardId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }
}

impl CardDirectory for StaticCardDirectory {
    async fn display_name(&self, id: &CardId) -> Result<Option<String>> {
        Ok(self.names.get(id).cloned())
    }
}

/// Looks cards up by Scryfall id
#[derive(Debug, Clone)]
pub struct ScryfallCardDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl ScryfallCardDirectory {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.scryfall.com";

    pub fn new() -> Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SCRYFALL_HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| Error::CardLookup(error.to_string()))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CardDirectory for ScryfallCardDirectory {
    async fn display_name(&self, id: &CardId) -> Result<Option<String>> {
        let url = format!(
            "{}/cards/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| Error::CardLookup(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await.map_err(|error| {
            Error::CardLookup(format!("failed to read response for {id}: {error}"))
        })?;
        if !status.is_success() {
            return Err(Error::CardLookup(parse_api_error(status, &body)));
        }

        parse_card_payload(&body).map(Some)
    }
}

/// Extract the display name from a Scryfall card object
pub fn parse_card_payload(payload: &str) -> Result<String> {
    let card: ScryfallCard = serde_json::from_str(payload)
        .map_err(|error| Error::CardLookup(format!("invalid card payload: {error}")))?;

    let name = card.printed_name.unwrap_or(card.name);
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::CardLookup("card payload has an empty name".to_string()));
    }
    Ok(name.to_string())
}

/// Resolve names for a set of card ids.
///
/// Lookup failures are logged and skipped; callers fall back to the name
/// embedded in the deck.
pub async fn resolve_names<'a, D: CardDirectory>(
    directory: &D,
    ids: impl IntoIterator<Item = &'a CardId>,
) -> HashMap<CardId, String> {
    let ids: BTreeSet<&CardId> = ids.into_iter().collect();
    let mut names = HashMap::with_capacity(ids.len());

    for id in ids {
        match directory.display_name(id).await {
            Ok(Some(name)) => {
                names.insert(id.clone(), name);
            }
            Ok(None) => tracing::debug!(card = %id, "Card not found in directory"),
            Err(error) => tracing::warn!(card = %id, "Card lookup failed: {}", error),
        }
    }

    names
}

#[derive(Debug, Deserialize)]
struct ScryfallCard {
    name: String,
    #[serde(default)]
    printed_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScryfallErrorBody {
    details: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ScryfallErrorBody>(body) {
        if let Some(details) = payload.details {
            return format!("{} ({})", details.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "card directory URL must include http:// or https://: {trimmed}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn id(value: &str) -> CardId {
        CardId::new(value).unwrap()
    }

    #[tokio::test]
    async fn static_directory_resolves_known_cards() {
        let directory = StaticCardDirectory::new().with(id("OGN-001"), "Blazing Scorcher");
        assert_eq!(
            directory.display_name(&id("OGN-001")).await.unwrap(),
            Some("Blazing Scorcher".to_string())
        );
        assert_eq!(directory.display_name(&id("OGN-002")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolve_names_skips_unknown_cards() {
        let directory = StaticCardDirectory::new().with(id("A"), "Alpha");
        let wanted = [id("A"), id("B"), id("A")];
        let names = resolve_names(&directory, &wanted).await;
        assert_eq!(names.len(), 1);
        assert_eq!(names[&id("A")], "Alpha");
    }

    #[test]
    fn parses_card_payload() {
        let payload = r#"{
            "object": "card",
            "id": "bd8fa327-dd41-4737-8f19-2cf5eb1f7cdd",
            "name": "Sol Ring",
            "mana_cost": "{1}"
        }"#;
        assert_eq!(parse_card_payload(payload).unwrap(), "Sol Ring");
    }

    #[test]
    fn printed_name_wins() {
        let payload = r#"{ "name": "Sol Ring", "printed_name": "Anneau solaire" }"#;
        assert_eq!(parse_card_payload(payload).unwrap(), "Anneau solaire");
    }

    #[test]
    fn rejects_malformed_payload() {
        assert!(matches!(
            parse_card_payload(r#"{ "object": "error" }"#),
            Err(Error::CardLookup(_))
        ));
    }

    #[test]
    fn api_error_prefers_details() {
        let message = parse_api_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{ "object": "error", "details": "Slow down" }"#,
        );
        assert_eq!(message, "Slow down (429)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[test]
    fn base_url_requires_scheme() {
        assert!(ScryfallCardDirectory::with_base_url("api.scryfall.com").is_err());
        let directory = ScryfallCardDirectory::with_base_url("https://api.scryfall.com/").unwrap();
        assert_eq!(directory.base_url(), "https://api.scryfall.com");
    }

    /// Answer a single HTTP request on a local port with `response`
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn unreachable_directory_is_a_lookup_error() {
        // Nothing listens on a port that was bound and then released.
        let address = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let directory = ScryfallCardDirectory::with_base_url(format!("http://{address}")).unwrap();
        assert!(matches!(
            directory.display_name(&id("sol-ring")).await,
            Err(Error::CardLookup(_))
        ));
    }

    #[tokio::test]
    async fn served_card_resolves_to_its_name() {
        let base_url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 19\r\nConnection: close\r\n\r\n{\"name\":\"Sol Ring\"}",
        )
        .await;
        let directory = ScryfallCardDirectory::with_base_url(base_url).unwrap();
        assert_eq!(
            directory.display_name(&id("sol-ring")).await.unwrap(),
            Some("Sol Ring".to_string())
        );
    }

    #[tokio::test]
    async fn truncated_body_is_a_lookup_error() {
        let base_url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\nConnection: close\r\n\r\n{\"name\":",
        )
        .await;
        let directory = ScryfallCardDirectory::with_base_url(base_url).unwrap();
        let error = directory.display_name(&id("sol-ring")).await.unwrap_err();
        assert!(
            matches!(&error, Error::CardLookup(message) if message.starts_with("failed to read response")),
            "unexpected error: {error}"
        );
    }
}
