//! PostgREST (Supabase) backed stream store.
//!
//! Talks to `<url>/rest/v1/<table>` with the `streams` row shape. Upserts use
//! `Prefer: resolution=merge-duplicates` with `on_conflict=id`.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{
        Client, RequestBuilder, Response,
        header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, HeaderMap},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{
    Result, StoreError,
    store::StreamStore,
    types::{CacheRecord, StreamId, StreamRow},
};

/// Stream store over a PostgREST HTTP API.
pub struct PostgrestStreamStore {
    client: Client,
    endpoint: String,
    api_key: Option<Secret<String>>,
}

impl PostgrestStreamStore {
    pub fn new(
        base_url: &str,
        table: &str,
        api_key: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{table}", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn from_config(cfg: &snare_config::PostgrestConfig) -> Result<Self> {
        let url = cfg
            .url
            .as_deref()
            .ok_or_else(|| StoreError::message("cache.postgrest.url is not set"))?;
        Self::new(
            url,
            &cfg.table,
            cfg.api_key.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(ACCEPT, "application/json");
        match &self.api_key {
            Some(key) => builder
                .header("apikey", key.expose_secret())
                .header(AUTHORIZATION, format!("Bearer {}", key.expose_secret())),
            None => builder,
        }
    }

    async fn checked(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StreamStore for PostgrestStreamStore {
    async fn get(&self, id: &StreamId) -> Result<Option<CacheRecord>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{id}")),
            ("limit", "1".to_string()),
        ]);
        let response = Self::checked(self.authed(request).send().await?).await?;
        let rows: Vec<StreamRow> = response.json().await?;
        debug!(stream_id = %id, rows = rows.len(), "postgrest lookup");
        rows.into_iter().next().map(StreamRow::into_record).transpose()
    }

    async fn put(&self, record: &CacheRecord) -> Result<()> {
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[StreamRow::from(record)]);
        Self::checked(self.authed(request).send().await?).await?;
        Ok(())
    }

    async fn purge(&self, id: &StreamId) -> Result<bool> {
        let request = self
            .client
            .delete(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let response = Self::checked(self.authed(request).send().await?).await?;
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(!rows.is_empty())
    }

    async fn count(&self) -> Result<u64> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range", "0-0");
        let response = Self::checked(self.authed(request).send().await?).await?;
        total_from_content_range(response.headers())
            .ok_or_else(|| StoreError::message("missing or malformed Content-Range header"))
    }

    fn backend(&self) -> &'static str {
        "postgrest"
    }
}

/// Parse the total out of `Content-Range: 0-0/42` (or `*/0` for an empty table).
fn total_from_content_range(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::{TimeZone, Utc},
        mockito::Matcher,
    };

    fn store(server: &mockito::ServerGuard) -> PostgrestStreamStore {
        PostgrestStreamStore::new(
            &server.url(),
            "streams",
            Some(Secret::new("test-key".into())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn get_parses_first_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "eq.abc123".into()),
                Matcher::UrlEncoded("select".into(), "*".into()),
            ]))
            .match_header("apikey", "test-key")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"abc123","date_time":"2024-03-18T10:30:00+00:00",
                    "stream":"https://cdn/x/manifest.m3u8","subtitle":["https://cdn/x/en.vtt"]}]"#,
            )
            .create_async()
            .await;

        let record = store(&server)
            .get(&StreamId::new("abc123").unwrap())
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.manifest_url, "https://cdn/x/manifest.m3u8");
        assert_eq!(record.subtitle_urls, vec!["https://cdn/x/en.vtt"]);
        assert!(record.is_current(Utc.with_ymd_and_hms(2024, 3, 18, 10, 30, 0).unwrap()));
    }

    #[tokio::test]
    async fn offsetless_date_time_matches_epoch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"abc123","date_time":"2024-03-18T10:30:00",
                    "stream":"https://cdn/x/manifest.m3u8","subtitle":[]}]"#,
            )
            .create_async()
            .await;

        let record = store(&server)
            .get(&StreamId::new("abc123").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_current(Utc.with_ymd_and_hms(2024, 3, 18, 10, 30, 0).unwrap()));
    }

    #[tokio::test]
    async fn get_empty_array_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let got = store(&server)
            .get(&StreamId::new("nope").unwrap())
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn null_subtitle_column_reads_as_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id":"a","date_time":"2024-03-18T10:30:00Z","stream":"m","subtitle":null}]"#)
            .create_async()
            .await;

        let got = store(&server)
            .get(&StreamId::new("a").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(got.subtitle_urls.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_store_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let err = store(&server)
            .get(&StreamId::new("a").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn put_upserts_on_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/streams")
            .match_query(Matcher::UrlEncoded("on_conflict".into(), "id".into()))
            .match_header("prefer", "resolution=merge-duplicates,return=minimal")
            .match_body(Matcher::Json(serde_json::json!([{
                "id": "abc123",
                "date_time": "2024-03-18T10:30:00.000Z",
                "stream": "https://cdn/x/manifest.m3u8",
                "subtitle": ["https://cdn/x/track1.vtt"],
            }])))
            .with_status(201)
            .create_async()
            .await;

        let record = CacheRecord {
            id: StreamId::new("abc123").unwrap(),
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 18, 10, 30, 0).unwrap(),
            manifest_url: "https://cdn/x/manifest.m3u8".into(),
            subtitle_urls: vec!["https://cdn/x/track1.vtt".into()],
        };
        store(&server).put(&record).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/streams")
            .match_query(Matcher::Any)
            .match_header("prefer", "count=exact")
            .with_status(206)
            .with_header("content-range", "0-0/42")
            .with_body("[{\"id\":\"a\"}]")
            .create_async()
            .await;

        assert_eq!(store(&server).count().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn purge_reports_deleted_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/rest/v1/streams")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.a".into()))
            .with_status(200)
            .with_body(r#"[{"id":"a"}]"#)
            .create_async()
            .await;

        assert!(
            store(&server)
                .purge(&StreamId::new("a").unwrap())
                .await
                .unwrap()
        );
    }

    #[test]
    fn content_range_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_RANGE, "*/0".parse().unwrap());
        assert_eq!(total_from_content_range(&headers), Some(0));
        headers.insert(CONTENT_RANGE, "0-9/*".parse().unwrap());
        assert_eq!(total_from_content_range(&headers), None);
    }
}
